use chrono::{TimeZone, Utc};

use planos_core::catalog::GroupCatalog;
use planos_core::domain::request::{Request, RequestId, Requester};
use planos_core::workflow::WorkflowEngine;

use crate::repositories::{RepositoryError, RequestRepository, SqlRequestRepository};
use crate::DbPool;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: Vec<RequestId>,
    pub skipped: Vec<RequestId>,
}

/// Deterministic demo dataset: one gastronomy-only request with the flow
/// already started, one full-service request still pending initialization.
/// Existing rows are left untouched so reseeding is safe.
pub async fn seed_demo_requests(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let repo = SqlRequestRepository::new(pool.clone());
    let engine = WorkflowEngine::new(GroupCatalog::builtin());
    let mut summary = SeedSummary::default();

    for request in demo_requests(&engine) {
        if repo.find_by_id(&request.id).await?.is_some() {
            summary.skipped.push(request.id.clone());
            continue;
        }
        summary.created.push(request.id.clone());
        repo.save(request).await?;
    }

    Ok(summary)
}

fn demo_requests(engine: &WorkflowEngine) -> Vec<Request> {
    let created_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("fixed timestamp");
    let requester = Requester {
        user_id: "u-demo".to_string(),
        display_name: "Demo Organizador".to_string(),
        email: "organizador@example.com".to_string(),
    };

    let gastronomy = Request::new(
        RequestId("SOL-DEMO-1".to_string()),
        "Festival Gastronómico",
        requester.clone(),
        vec!["gastronomia".to_string()],
        created_at,
    );
    let gastronomy = engine
        .initialize(&gastronomy, created_at)
        .expect("fresh fixture initializes")
        .request;

    let full_service = Request::new(
        RequestId("SOL-DEMO-2".to_string()),
        "Congreso Tecnológico",
        requester,
        vec!["montajes".to_string(), "audiovisuales".to_string(), "gastronomia".to_string()],
        created_at,
    );

    vec![gastronomy, full_service]
}
