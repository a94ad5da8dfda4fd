use async_trait::async_trait;
use thiserror::Error;

use planos_core::audit::AuditEvent;
use planos_core::domain::request::{Request, RequestId, RequestStatus};

pub mod audit;
pub mod memory;
pub mod request;

pub use audit::SqlAuditEventRepository;
pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;

    /// Upsert of the whole aggregate row. Last write wins; the workflow has
    /// no optimistic concurrency token.
    async fn save(&self, request: Request) -> Result<(), RepositoryError>;

    async fn list_by_status(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>, RepositoryError>;
}

#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError>;
}
