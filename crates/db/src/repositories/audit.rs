use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use planos_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use planos_core::domain::request::RequestId;

use super::{AuditEventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditEventRepository {
    pool: DbPool,
}

impl SqlAuditEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn category_as_str(category: &AuditCategory) -> &'static str {
    match category {
        AuditCategory::Workflow => "workflow",
        AuditCategory::Uploads => "uploads",
        AuditCategory::Notification => "notification",
        AuditCategory::Persistence => "persistence",
        AuditCategory::System => "system",
    }
}

fn parse_category(s: &str) -> AuditCategory {
    match s {
        "workflow" => AuditCategory::Workflow,
        "uploads" => AuditCategory::Uploads,
        "notification" => AuditCategory::Notification,
        "persistence" => AuditCategory::Persistence,
        _ => AuditCategory::System,
    }
}

fn outcome_as_str(outcome: &AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Rejected => "rejected",
        AuditOutcome::Failed => "failed",
    }
}

fn parse_outcome(s: &str) -> AuditOutcome {
    match s {
        "success" => AuditOutcome::Success,
        "rejected" => AuditOutcome::Rejected,
        _ => AuditOutcome::Failed,
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let event_id: String =
        row.try_get("event_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let request_id: Option<String> =
        row.try_get("request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let correlation_id: String =
        row.try_get("correlation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let event_type: String =
        row.try_get("event_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor: String =
        row.try_get("actor").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let outcome: String =
        row.try_get("outcome").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_raw: String =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at_raw: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_raw)
        .map_err(|e| RepositoryError::Decode(format!("column `metadata`: {e}")))?;
    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("column `occurred_at`: {e}")))?;

    Ok(AuditEvent {
        event_id,
        request_id: request_id.map(RequestId),
        correlation_id,
        event_type,
        category: parse_category(&category),
        actor,
        outcome: parse_outcome(&outcome),
        metadata,
        occurred_at,
    })
}

#[async_trait::async_trait]
impl AuditEventRepository for SqlAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| RepositoryError::Decode(format!("column `metadata`: {e}")))?;

        sqlx::query(
            "INSERT INTO audit_event (event_id, request_id, correlation_id, event_type,
                                      category, actor, outcome, metadata, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.request_id.as_ref().map(|id| id.0.clone()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(category_as_str(&event.category))
        .bind(&event.actor)
        .bind(outcome_as_str(&event.outcome))
        .bind(metadata)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT event_id, request_id, correlation_id, event_type, category, actor,
                    outcome, metadata, occurred_at
             FROM audit_event WHERE request_id = ? ORDER BY occurred_at ASC",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect::<Result<Vec<_>, _>>()
    }
}
