use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::Actor;
use crate::domain::group::{ApprovalGroup, GroupId};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Overall request lifecycle status. Wire values keep the Spanish keys the
/// rest of the organization's tooling already stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pendiente,
    EnRevision,
    Aprobado,
    Rechazado,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aprobado | Self::Rechazado)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::EnRevision => "en_revision",
            Self::Aprobado => "aprobado",
            Self::Rechazado => "rechazado",
        }
    }
}

/// Per-group record status, same closed set as [`RequestStatus`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Pendiente,
    EnRevision,
    Aprobado,
    Rechazado,
}

impl RecordStatus {
    /// A group still owed a decision: not yet activated, or under review.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pendiente | Self::EnRevision)
    }
}

/// One approval slot per required group, embedded in the request aggregate
/// and mutated only through request updates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_from: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_from_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub needs_document_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_revised_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_by: Option<String>,
}

impl ApprovalRecord {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        Self { status: RecordStatus::EnRevision, ..Self::default() }
    }

    pub fn approved(by: &Actor, at: DateTime<Utc>) -> Self {
        Self {
            status: RecordStatus::Aprobado,
            approved_by: Some(by.user_id.clone()),
            approved_by_name: Some(by.display_name.clone()),
            approved_at: Some(at),
            ..Self::default()
        }
    }

    pub fn rejected(by: &Actor, at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Rechazado,
            rejected_by: Some(by.user_id.clone()),
            rejected_by_name: Some(by.display_name.clone()),
            rejected_at: Some(at),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Record for the sustainability group when a later group rejects and
    /// the flow is sent back for document correction.
    pub fn returned(from: &ApprovalGroup, at: DateTime<Utc>) -> Self {
        Self {
            status: RecordStatus::EnRevision,
            returned_from: Some(from.id.clone()),
            returned_from_name: Some(from.name.clone()),
            returned_at: Some(at),
            needs_document_review: true,
            ..Self::default()
        }
    }
}

/// Most recent rejection; drives the re-approval short-circuit back to the
/// rejecting group once documents are corrected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub by_group: GroupId,
    pub by_group_name: String,
    pub by_user: String,
    pub by_user_name: String,
    pub date: DateTime<Utc>,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub author_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Uploaded floor-plan document attached to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
    pub uploaded_by: String,
    pub uploaded_by_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
}

/// The "solicitud" aggregate. Sole owner of its approval records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub event_name: String,
    pub requester: Requester,
    #[serde(default)]
    pub contracted_services: Vec<String>,
    #[serde(default)]
    pub status: RequestStatus,
    /// Empty until the approval flow is initialized on first read.
    #[serde(default)]
    pub approvals: BTreeMap<GroupId, ApprovalRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rejection: Option<Rejection>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub plans: Vec<PlanDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn new(
        id: RequestId,
        event_name: impl Into<String>,
        requester: Requester,
        contracted_services: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_name: event_name.into(),
            requester,
            contracted_services,
            status: RequestStatus::Pendiente,
            approvals: BTreeMap::new(),
            last_rejection: None,
            comments: Vec::new(),
            plans: Vec::new(),
            approved_by: None,
            approved_by_name: None,
            approved_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn flow_initialized(&self) -> bool {
        !self.approvals.is_empty()
    }

    pub fn record(&self, group: &GroupId) -> Option<&ApprovalRecord> {
        self.approvals.get(group)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{ApprovalRecord, RecordStatus, Request, RequestId, RequestStatus, Requester};
    use crate::domain::actor::Actor;

    fn requester() -> Requester {
        Requester {
            user_id: "u-ana".to_string(),
            display_name: "Ana Torres".to_string(),
            email: "ana@example.com".to_string(),
        }
    }

    #[test]
    fn status_wire_values_keep_spanish_keys() {
        let json = serde_json::to_string(&RequestStatus::EnRevision).expect("serialize");
        assert_eq!(json, "\"en_revision\"");

        let parsed: RecordStatus = serde_json::from_str("\"rechazado\"").expect("deserialize");
        assert_eq!(parsed, RecordStatus::Rechazado);
    }

    #[test]
    fn approval_record_omits_unset_fields() {
        let record = ApprovalRecord::pending();
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["status"], "pendiente");
        assert!(json.get("approved_by").is_none());
        assert!(json.get("returned_from").is_none());
    }

    #[test]
    fn request_without_approvals_is_uninitialized() {
        let request = Request::new(
            RequestId("SOL-001".to_string()),
            "Expo Andina",
            requester(),
            vec!["gastronomia".to_string()],
            Utc::now(),
        );

        assert!(!request.flow_initialized());
        assert_eq!(request.status, RequestStatus::Pendiente);
    }

    #[test]
    fn request_round_trips_through_json() {
        let mut request = Request::new(
            RequestId("SOL-002".to_string()),
            "Congreso Médico",
            requester(),
            vec!["audiovisuales".to_string()],
            Utc::now(),
        );
        let reviewer = Actor::new(
            "u-luis",
            "Luis Vega",
            "luis@example.com",
            vec!["sostenibilidad".to_string()],
        );
        request
            .approvals
            .insert(crate::domain::group::GroupId::sustainability(), ApprovalRecord::approved(&reviewer, Utc::now()));

        let json = serde_json::to_string(&request).expect("serialize");
        let parsed: Request = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, request);
    }

    #[test]
    fn missing_contracted_services_deserializes_as_empty() {
        let raw = r#"{
            "id": "SOL-003",
            "event_name": "Feria Textil",
            "requester": {"user_id": "u-ana", "display_name": "Ana", "email": "ana@example.com"},
            "created_at": "2026-03-01T09:00:00Z",
            "updated_at": "2026-03-01T09:00:00Z"
        }"#;

        let parsed: Request = serde_json::from_str(raw).expect("deserialize");
        assert!(parsed.contracted_services.is_empty());
        assert!(parsed.approvals.is_empty());
        assert_eq!(parsed.status, RequestStatus::Pendiente);
    }
}
