use serde::{Deserialize, Serialize};

use crate::domain::group::GroupId;
use crate::domain::request::{PlanDocument, Request, RequestId};

/// Email-capable recipient of a workflow notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into() }
    }
}

/// Download reference to an uploaded plan document, embedded in
/// final-approval notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLink {
    pub name: String,
    pub url: String,
}

impl From<&PlanDocument> for PlanLink {
    fn from(plan: &PlanDocument) -> Self {
        Self { name: plan.name.clone(), url: plan.url.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Flow initialized; addressed to the requester.
    ApprovalFlowStarted,
    /// A group became the active reviewer.
    StatusUpdate {
        group: GroupId,
        group_name: String,
        /// Set when the activation is a return for document correction.
        returned_for_review: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Every required group approved; addressed to the requester plus the
    /// complete participant audit trail.
    FinalApproval { plan_links: Vec<PlanLink> },
}

/// Post-transition event produced by the workflow engine and consumed by a
/// separate dispatcher. Delivery is best-effort and never gates the
/// transition that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub request_id: RequestId,
    pub event_name: String,
    pub recipients: Vec<Recipient>,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn for_request(request: &Request, recipients: Vec<Recipient>, kind: NotificationKind) -> Self {
        Self {
            request_id: request.id.clone(),
            event_name: request.event_name.clone(),
            recipients,
            kind,
        }
    }
}
