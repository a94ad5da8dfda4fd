pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notifications;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use catalog::{CatalogError, GroupCatalog};
pub use domain::actor::Actor;
pub use domain::group::{ApprovalGroup, GroupId, SUSTAINABILITY_GROUP_ID};
pub use domain::request::{
    ApprovalRecord, Comment, PlanDocument, RecordStatus, Rejection, Request, RequestId,
    RequestStatus, Requester,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notifications::{Notification, NotificationKind, PlanLink, Recipient};
pub use workflow::{TransitionOutcome, WorkflowEngine, WorkflowError};
