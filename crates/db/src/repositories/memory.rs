use std::collections::HashMap;

use tokio::sync::RwLock;

use planos_core::domain::request::{Request, RequestId, RequestStatus};

use super::{RepositoryError, RequestRepository};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, Request>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: Request) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matched: Vec<Request> = requests
            .values()
            .filter(|request| status.map_or(true, |wanted| request.status == wanted))
            .cloned()
            .collect();
        matched.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(matched)
    }
}
