use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use planos_core::domain::group::GroupId;
use planos_core::domain::request::{
    ApprovalRecord, Comment, PlanDocument, Rejection, Request, RequestId, RequestStatus, Requester,
};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> RequestStatus {
    match s {
        "en_revision" => RequestStatus::EnRevision,
        "aprobado" => RequestStatus::Aprobado,
        "rechazado" => RequestStatus::Rechazado,
        _ => RequestStatus::Pendiente,
    }
}

fn decode<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<Request, RepositoryError> {
    let get = |name: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(name).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let get_opt = |name: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(name)
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    };

    let contracted_services: Vec<String> =
        decode("contracted_services", &get("contracted_services")?)?;
    let approvals: BTreeMap<GroupId, ApprovalRecord> = decode("approvals", &get("approvals")?)?;
    let last_rejection: Option<Rejection> = match get_opt("last_rejection")? {
        Some(raw) => Some(decode("last_rejection", &raw)?),
        None => None,
    };
    let comments: Vec<Comment> = decode("comments", &get("comments")?)?;
    let plans: Vec<PlanDocument> = decode("plans", &get("plans")?)?;

    let approved_at = match get_opt("approved_at")? {
        Some(raw) => Some(parse_timestamp("approved_at", &raw)?),
        None => None,
    };

    Ok(Request {
        id: RequestId(get("id")?),
        event_name: get("event_name")?,
        requester: Requester {
            user_id: get("requester_user_id")?,
            display_name: get("requester_display_name")?,
            email: get("requester_email")?,
        },
        contracted_services,
        status: parse_status(&get("status")?),
        approvals,
        last_rejection,
        comments,
        plans,
        approved_by: get_opt("approved_by")?,
        approved_by_name: get_opt("approved_by_name")?,
        approved_at,
        created_at: parse_timestamp("created_at", &get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", &get("updated_at")?)?,
    })
}

fn encode<T: serde::Serialize>(column: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

const SELECT_COLUMNS: &str = "id, event_name, requester_user_id, requester_display_name, \
     requester_email, contracted_services, status, approvals, last_rejection, comments, plans, \
     approved_by, approved_by_name, approved_at, created_at, updated_at";

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: Request) -> Result<(), RepositoryError> {
        let last_rejection = match &request.last_rejection {
            Some(rejection) => Some(encode("last_rejection", rejection)?),
            None => None,
        };

        sqlx::query(
            "INSERT INTO request (id, event_name, requester_user_id, requester_display_name,
                                  requester_email, contracted_services, status, approvals,
                                  last_rejection, comments, plans, approved_by, approved_by_name,
                                  approved_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 event_name = excluded.event_name,
                 requester_user_id = excluded.requester_user_id,
                 requester_display_name = excluded.requester_display_name,
                 requester_email = excluded.requester_email,
                 contracted_services = excluded.contracted_services,
                 status = excluded.status,
                 approvals = excluded.approvals,
                 last_rejection = excluded.last_rejection,
                 comments = excluded.comments,
                 plans = excluded.plans,
                 approved_by = excluded.approved_by,
                 approved_by_name = excluded.approved_by_name,
                 approved_at = excluded.approved_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(&request.event_name)
        .bind(&request.requester.user_id)
        .bind(&request.requester.display_name)
        .bind(&request.requester.email)
        .bind(encode("contracted_services", &request.contracted_services)?)
        .bind(request.status.as_str())
        .bind(encode("approvals", &request.approvals)?)
        .bind(&last_rejection)
        .bind(encode("comments", &request.comments)?)
        .bind(encode("plans", &request.plans)?)
        .bind(&request.approved_by)
        .bind(&request.approved_by_name)
        .bind(request.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_status(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM request WHERE status = ? ORDER BY created_at ASC"
            ))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM request ORDER BY created_at ASC"
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }
}
