use chrono::{DateTime, Utc};

use crate::domain::actor::Actor;
use crate::domain::group::GroupId;
use crate::domain::request::{PlanDocument, Request};
use crate::workflow::engine::{TransitionOutcome, WorkflowEngine, WorkflowError};

impl WorkflowEngine {
    /// Whether `actor` may attach plan documents to `request`.
    ///
    /// Deliberately independent of the request status: the sustainability
    /// group manages plans even after terminal approval or rejection.
    pub fn can_upload_plans(&self, actor: &Actor, request: &Request) -> bool {
        self.required_groups(Some(request))
            .iter()
            .any(|group| group.can_upload_plans && self.catalog().is_member(actor, &group.id))
    }

    /// Deletion uses the identical predicate as upload.
    pub fn can_delete_files(&self, actor: &Actor, request: &Request) -> bool {
        self.can_upload_plans(actor, request)
    }

    /// Records an uploaded plan document on the aggregate.
    ///
    /// When the sustainability record is flagged for document review after a
    /// rejection, the upload clears the flag and stamps the revision; the
    /// approval state itself never advances here, a reviewer still has to
    /// approve explicitly.
    pub fn record_plan_upload(
        &self,
        request: &Request,
        actor: &Actor,
        plan: PlanDocument,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        if !self.can_upload_plans(actor, request) {
            return Err(WorkflowError::UploadNotPermitted {
                user: actor.user_id.clone(),
                request: request.id.clone(),
            });
        }

        let mut updated = request.clone();
        updated.plans.push(plan);
        clear_document_review(&mut updated, actor, now);
        updated.updated_at = now;

        Ok(TransitionOutcome { request: updated, notifications: Vec::new() })
    }

    /// Removes a previously uploaded plan document by name.
    pub fn record_plan_removal(
        &self,
        request: &Request,
        actor: &Actor,
        plan_name: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        if !self.can_delete_files(actor, request) {
            return Err(WorkflowError::UploadNotPermitted {
                user: actor.user_id.clone(),
                request: request.id.clone(),
            });
        }

        let position = request
            .plans
            .iter()
            .position(|plan| plan.name == plan_name)
            .ok_or_else(|| WorkflowError::UnknownPlanDocument {
                request: request.id.clone(),
                name: plan_name.to_string(),
            })?;

        let mut updated = request.clone();
        updated.plans.remove(position);
        updated.updated_at = now;

        Ok(TransitionOutcome { request: updated, notifications: Vec::new() })
    }
}

fn clear_document_review(request: &mut Request, actor: &Actor, now: DateTime<Utc>) {
    if let Some(record) = request.approvals.get_mut(&GroupId::sustainability()) {
        if record.needs_document_review {
            record.needs_document_review = false;
            record.documents_revised_at = Some(now);
            record.revised_by = Some(actor.user_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::catalog::GroupCatalog;
    use crate::domain::actor::Actor;
    use crate::domain::group::GroupId;
    use crate::domain::request::{
        PlanDocument, Request, RequestId, RequestStatus, Requester,
    };
    use crate::workflow::engine::{WorkflowEngine, WorkflowError};

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(GroupCatalog::builtin())
    }

    fn sustainability_reviewer() -> Actor {
        Actor::new(
            "u-luis",
            "Luis Vega",
            "luis@example.com",
            vec!["sostenibilidad".to_string()],
        )
    }

    fn request() -> Request {
        Request::new(
            RequestId("SOL-200".to_string()),
            "Salón del Automóvil",
            Requester {
                user_id: "u-ana".to_string(),
                display_name: "Ana Torres".to_string(),
                email: "ana@example.com".to_string(),
            },
            vec!["montajes".to_string()],
            Utc::now(),
        )
    }

    fn plan(name: &str) -> PlanDocument {
        PlanDocument {
            name: name.to_string(),
            url: format!("https://files.example/{name}"),
            size: 1024,
            uploaded_by: "u-luis".to_string(),
            uploaded_by_name: "Luis Vega".to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn upload_permission_ignores_request_status() {
        let engine = engine();
        let reviewer = sustainability_reviewer();
        let mut request = request();

        for status in [
            RequestStatus::Pendiente,
            RequestStatus::EnRevision,
            RequestStatus::Aprobado,
            RequestStatus::Rechazado,
        ] {
            request.status = status;
            assert!(engine.can_upload_plans(&reviewer, &request), "status {status:?}");
            assert!(engine.can_delete_files(&reviewer, &request), "status {status:?}");
        }
    }

    #[test]
    fn non_members_cannot_upload() {
        let engine = engine();
        let outsider =
            Actor::new("u-eva", "Eva Díaz", "eva@example.com", vec!["seguridad".to_string()]);

        assert!(!engine.can_upload_plans(&outsider, &request()));

        let error = engine
            .record_plan_upload(&request(), &outsider, plan("plano-general.pdf"), Utc::now())
            .expect_err("outsider upload must fail");
        assert!(matches!(error, WorkflowError::UploadNotPermitted { .. }));
    }

    #[test]
    fn upload_after_rejection_clears_document_review_without_advancing() {
        let engine = engine();
        let reviewer = sustainability_reviewer();
        let rigging =
            Actor::new("u-eva", "Eva Díaz", "eva@example.com", vec!["montajes".to_string()]);

        let initialized = engine.initialize(&request(), Utc::now()).expect("init").request;
        let advanced =
            engine.approve(&initialized, &reviewer, Utc::now()).expect("advance").request;
        let rejected = engine
            .reject(&advanced, &rigging, "plano de montaje desactualizado", Utc::now())
            .expect("reject")
            .request;

        let outcome = engine
            .record_plan_upload(&rejected, &reviewer, plan("plano-corregido.pdf"), Utc::now())
            .expect("upload");

        let record = outcome
            .request
            .record(&GroupId::sustainability())
            .expect("record exists");
        assert!(!record.needs_document_review);
        assert_eq!(record.revised_by.as_deref(), Some("u-luis"));
        assert!(record.documents_revised_at.is_some());

        // Still waiting on a human approval; nothing advanced.
        assert_eq!(outcome.request.status, RequestStatus::EnRevision);
        assert!(outcome.notifications.is_empty());
        assert_eq!(
            engine.current_group(&outcome.request).map(|g| g.id.as_str()),
            Some("areas_sostenibilidad")
        );
    }

    #[test]
    fn removal_requires_an_existing_plan() {
        let engine = engine();
        let reviewer = sustainability_reviewer();
        let base = request();

        let with_plan = engine
            .record_plan_upload(&base, &reviewer, plan("plano-general.pdf"), Utc::now())
            .expect("upload")
            .request;

        let removed = engine
            .record_plan_removal(&with_plan, &reviewer, "plano-general.pdf", Utc::now())
            .expect("removal");
        assert!(removed.request.plans.is_empty());

        let error = engine
            .record_plan_removal(&with_plan, &reviewer, "no-existe.pdf", Utc::now())
            .expect_err("unknown plan must fail");
        assert!(matches!(error, WorkflowError::UnknownPlanDocument { .. }));
    }
}
