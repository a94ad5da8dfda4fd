use serde::{Deserialize, Serialize};

/// Id of the group that is always required, always first in sequence, and
/// the only builtin group allowed to manage plan documents.
pub const SUSTAINABILITY_GROUP_ID: &str = "areas_sostenibilidad";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn sustainability() -> Self {
        Self(SUSTAINABILITY_GROUP_ID.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sustainability(&self) -> bool {
        self.0 == SUSTAINABILITY_GROUP_ID
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static departmental reviewer group. Catalog configuration, never
/// persisted per-request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGroup {
    pub id: GroupId,
    pub name: String,
    /// Role identifiers whose members belong to this group.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Notification addresses for the group inbox(es).
    #[serde(default)]
    pub emails: Vec<String>,
    /// Ascending approval order. The sustainability group owns index 0.
    pub sequence_index: u32,
    /// When set, the group is required only if the request's contracted
    /// services contain this value.
    #[serde(default)]
    pub conditional_service: Option<String>,
    #[serde(default)]
    pub can_upload_plans: bool,
}

impl ApprovalGroup {
    pub fn is_required_for(&self, contracted_services: &[String]) -> bool {
        if self.id.is_sustainability() {
            return true;
        }
        match &self.conditional_service {
            None => true,
            Some(service) => contracted_services.iter().any(|have| have == service),
        }
    }
}
