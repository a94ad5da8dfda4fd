use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::GroupCatalog;
use crate::domain::actor::Actor;
use crate::domain::group::{ApprovalGroup, GroupId};
use crate::domain::request::{
    ApprovalRecord, RecordStatus, Rejection, Request, RequestId, RequestStatus,
};
use crate::notifications::{Notification, NotificationKind, PlanLink, Recipient};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("approval flow for request `{0}` is already initialized")]
    AlreadyInitialized(RequestId),
    #[error("approval flow for request `{0}` has not been initialized")]
    NotInitialized(RequestId),
    #[error("request `{0}` has no active group; every required group already decided")]
    FlowComplete(RequestId),
    #[error("user `{user}` is not a member of the active group `{group}`")]
    NotAGroupMember { user: String, group: GroupId },
    #[error("group `{group}` is not under review (record status is {status:?})")]
    GroupNotActive { group: GroupId, status: RecordStatus },
    #[error("user `{user}` may not manage plan documents for request `{request}`")]
    UploadNotPermitted { user: String, request: RequestId },
    #[error("request `{request}` has no plan document named `{name}`")]
    UnknownPlanDocument { request: RequestId, name: String },
}

/// Result of a state transition: the updated aggregate plus the
/// notifications the caller must hand to a dispatcher after persisting.
/// The engine never performs I/O itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub request: Request,
    pub notifications: Vec<Notification>,
}

/// Sequential multi-group approval state machine.
///
/// Pure decision logic over in-memory request state; persistence and
/// notification delivery belong to the surrounding collaborators. All
/// functions are deterministic for identical inputs.
#[derive(Clone, Debug)]
pub struct WorkflowEngine {
    catalog: GroupCatalog,
}

impl WorkflowEngine {
    pub fn new(catalog: GroupCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &GroupCatalog {
        &self.catalog
    }

    /// Ordered sequence of groups required for `request`.
    ///
    /// The sustainability group is always included and always first. A group
    /// with a conditional service is kept only when the request contracts
    /// that service; a request without contracted services keeps only the
    /// unconditional groups. `None` yields the sustainability group alone.
    pub fn required_groups(&self, request: Option<&Request>) -> Vec<&ApprovalGroup> {
        let Some(request) = request else {
            return vec![self.catalog.sustainability()];
        };

        let mut kept: Vec<&ApprovalGroup> = self
            .catalog
            .groups()
            .iter()
            .filter(|group| group.is_required_for(&request.contracted_services))
            .collect();
        kept.sort_by_key(|group| group.sequence_index);

        // Catalog validation already guarantees this; guarded anyway since
        // catalogs are operator-supplied configuration.
        if !kept.iter().any(|group| group.id.is_sustainability()) {
            kept.insert(0, self.catalog.sustainability());
            kept.sort_by_key(|group| group.sequence_index);
        }

        kept
    }

    /// First required group still owed a decision, or `None` once every
    /// required group has reached a terminal record.
    pub fn current_group(&self, request: &Request) -> Option<&ApprovalGroup> {
        self.required_groups(Some(request)).into_iter().find(|group| {
            request
                .record(&group.id)
                .map(|record| record.status.is_open())
                .unwrap_or(true)
        })
    }

    /// Group immediately following `after` in required order.
    pub fn next_group(&self, request: &Request, after: &GroupId) -> Option<&ApprovalGroup> {
        let groups = self.required_groups(Some(request));
        let position = groups.iter().position(|group| &group.id == after)?;
        groups.into_iter().nth(position + 1)
    }

    /// Fresh approval map for an uninitialized request: the first group in
    /// sequence is activated, every other required group starts pending.
    pub fn initial_records(&self, request: &Request) -> BTreeMap<GroupId, ApprovalRecord> {
        self.required_groups(Some(request))
            .into_iter()
            .enumerate()
            .map(|(position, group)| {
                let record =
                    if position == 0 { ApprovalRecord::active() } else { ApprovalRecord::pending() };
                (group.id.clone(), record)
            })
            .collect()
    }

    /// Initializes the approval flow. Allowed at most once per request; the
    /// caller guards by only invoking on a request with no approvals yet.
    pub fn initialize(
        &self,
        request: &Request,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        if request.flow_initialized() {
            return Err(WorkflowError::AlreadyInitialized(request.id.clone()));
        }

        let mut updated = request.clone();
        updated.approvals = self.initial_records(request);
        updated.status = RequestStatus::EnRevision;
        updated.updated_at = now;

        let notification = Notification::for_request(
            &updated,
            vec![Recipient::new(
                request.requester.display_name.clone(),
                request.requester.email.clone(),
            )],
            NotificationKind::ApprovalFlowStarted,
        );

        Ok(TransitionOutcome { request: updated, notifications: vec![notification] })
    }

    /// Applies an approval by `actor` on the currently active group.
    ///
    /// Re-approving an already decided group fails the precondition check
    /// rather than silently reapplying; a second identical call is an error,
    /// not a no-op.
    pub fn approve(
        &self,
        request: &Request,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let current = self.active_group_checked(request, actor)?;

        let mut updated = request.clone();
        updated.approvals.insert(current.id.clone(), ApprovalRecord::approved(actor, now));
        updated.updated_at = now;

        // After a rejection the flow resumes at whichever group rejected,
        // skipping groups approved before the documents were corrected.
        let next = if current.id.is_sustainability() && request.last_rejection.is_some() {
            let resume = request
                .last_rejection
                .as_ref()
                .and_then(|rejection| {
                    self.required_groups(Some(request))
                        .into_iter()
                        .find(|group| group.id == rejection.by_group)
                })
                .or_else(|| self.next_group(request, &current.id));
            updated.last_rejection = None;
            resume
        } else {
            self.next_group(request, &current.id)
        };

        let notifications = match next {
            Some(next_group) => {
                updated
                    .approvals
                    .insert(next_group.id.clone(), ApprovalRecord::active());
                updated.status = RequestStatus::EnRevision;

                vec![Notification::for_request(
                    &updated,
                    group_recipients(next_group),
                    NotificationKind::StatusUpdate {
                        group: next_group.id.clone(),
                        group_name: next_group.name.clone(),
                        returned_for_review: false,
                        reason: None,
                    },
                )]
            }
            None => {
                updated.status = RequestStatus::Aprobado;
                updated.approved_by = Some(actor.user_id.clone());
                updated.approved_by_name = Some(actor.display_name.clone());
                updated.approved_at = Some(now);

                vec![Notification::for_request(
                    &updated,
                    self.final_approval_recipients(&updated),
                    NotificationKind::FinalApproval {
                        plan_links: updated.plans.iter().map(PlanLink::from).collect(),
                    },
                )]
            }
        };

        Ok(TransitionOutcome { request: updated, notifications })
    }

    /// Applies a rejection by `actor` on the currently active group.
    ///
    /// Rejection always routes the flow back to the sustainability group for
    /// document correction, regardless of where in the sequence it happened.
    /// Approvals already granted by intermediate groups are left untouched.
    pub fn reject(
        &self,
        request: &Request,
        actor: &Actor,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let current = self.active_group_checked(request, actor)?;
        let reason = reason.into();

        let mut updated = request.clone();
        updated
            .approvals
            .insert(current.id.clone(), ApprovalRecord::rejected(actor, now, reason.clone()));
        updated
            .approvals
            .insert(GroupId::sustainability(), ApprovalRecord::returned(current, now));
        updated.status = RequestStatus::EnRevision;
        updated.last_rejection = Some(Rejection {
            by_group: current.id.clone(),
            by_group_name: current.name.clone(),
            by_user: actor.user_id.clone(),
            by_user_name: actor.display_name.clone(),
            date: now,
            reason: reason.clone(),
        });
        updated.updated_at = now;

        let sustainability = self.catalog.sustainability();
        let notification = Notification::for_request(
            &updated,
            group_recipients(sustainability),
            NotificationKind::StatusUpdate {
                group: sustainability.id.clone(),
                group_name: sustainability.name.clone(),
                returned_for_review: true,
                reason: Some(reason),
            },
        );

        Ok(TransitionOutcome { request: updated, notifications: vec![notification] })
    }

    pub fn approve_with_audit<S>(
        &self,
        request: &Request,
        actor: &Actor,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let current = self.current_group(request).map(|group| group.id.clone());
        let result = self.approve(request, actor, now);
        self.emit_transition_audit(sink, audit, "workflow.approve", current, &result);
        result
    }

    pub fn reject_with_audit<S>(
        &self,
        request: &Request,
        actor: &Actor,
        reason: impl Into<String>,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let current = self.current_group(request).map(|group| group.id.clone());
        let result = self.reject(request, actor, reason, now);
        self.emit_transition_audit(sink, audit, "workflow.reject", current, &result);
        result
    }

    /// Shared §approve/§reject preconditions: flow initialized, an active
    /// group exists, the actor belongs to it, and its record is under review.
    fn active_group_checked(
        &self,
        request: &Request,
        actor: &Actor,
    ) -> Result<&ApprovalGroup, WorkflowError> {
        if !request.flow_initialized() {
            return Err(WorkflowError::NotInitialized(request.id.clone()));
        }

        let current = self
            .current_group(request)
            .ok_or_else(|| WorkflowError::FlowComplete(request.id.clone()))?;

        if !self.catalog.is_member(actor, &current.id) {
            return Err(WorkflowError::NotAGroupMember {
                user: actor.user_id.clone(),
                group: current.id.clone(),
            });
        }

        let status =
            request.record(&current.id).map(|record| record.status).unwrap_or_default();
        if status != RecordStatus::EnRevision {
            return Err(WorkflowError::GroupNotActive { group: current.id.clone(), status });
        }

        Ok(current)
    }

    /// Requester plus every group inbox across the required sequence, one
    /// entry per distinct address.
    fn final_approval_recipients(&self, request: &Request) -> Vec<Recipient> {
        let mut recipients = vec![Recipient::new(
            request.requester.display_name.clone(),
            request.requester.email.clone(),
        )];

        for group in self.required_groups(Some(request)) {
            for email in &group.emails {
                if !recipients.iter().any(|existing| &existing.email == email) {
                    recipients.push(Recipient::new(group.name.clone(), email.clone()));
                }
            }
        }

        recipients
    }

    fn emit_transition_audit<S>(
        &self,
        sink: &S,
        audit: &AuditContext,
        operation: &str,
        current: Option<GroupId>,
        result: &Result<TransitionOutcome, WorkflowError>,
    ) where
        S: AuditSink,
    {
        let from = current.map(|id| id.0).unwrap_or_else(|| "none".to_string());
        match result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        Some(outcome.request.id.clone()),
                        audit.correlation_id.clone(),
                        format!("{operation}_applied"),
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("group", from)
                    .with_metadata("status", outcome.request.status.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        None,
                        audit.correlation_id.clone(),
                        format!("{operation}_rejected"),
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("group", from)
                    .with_metadata("error", error.to_string()),
                );
            }
        }
    }
}

fn group_recipients(group: &ApprovalGroup) -> Vec<Recipient> {
    group
        .emails
        .iter()
        .map(|email| Recipient::new(group.name.clone(), email.clone()))
        .collect()
}
