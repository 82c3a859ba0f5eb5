//! Service layer API for the time-off request workflow
use crate::clock::Clock;
use crate::directory::WorkforceDirectory;
use crate::error::WorkflowError;
use crate::ledger::ApprovalLedger;
use crate::notify;
use crate::notify::Notifier;
use crate::request::{RequestAttributes, RequestKind, RequestStatus, TimeOffRequest};
use crate::store::Store;
use crate::types::{LeaveDate, RequestId, TimeStamp, UserId};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

/// The request workflow engine. Owns requests and their approval ledgers;
/// consults the workforce directory for the approver set and hands
/// finished transitions to the notifier.
pub struct RequestService<S, N, C> {
    store: Arc<S>,
    notifier: N,
    clock: C,
}

impl<S: Store, N: Notifier, C: Clock> RequestService<S, N, C> {
    pub fn new(store: Arc<S>, notifier: N, clock: C) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    /// Create a request on behalf of another user (admin path).
    pub fn create(
        &self,
        attributes: RequestAttributes,
        requester_id: UserId,
        creator_id: UserId,
    ) -> Result<TimeOffRequest, WorkflowError> {
        let _guard = self.store.write_guard();

        if self.store.user(requester_id)?.is_none() {
            return Err(WorkflowError::UserNotFound(requester_id));
        }

        if let Some(conflicting) = self.overlapping_request(
            requester_id,
            attributes.start_date,
            attributes.end_date,
            None,
        )? {
            return Err(WorkflowError::OverlappingRequest {
                requester: requester_id,
                start: conflicting.start_date,
                end: conflicting.end_date,
            });
        }

        let now = TimeStamp::from(self.clock.now());
        let request = TimeOffRequest {
            id: RequestId(self.store.generate_id()?),
            requester: requester_id,
            kind: attributes.kind,
            description: attributes.description,
            start_date: attributes.start_date,
            end_date: attributes.end_date,
            status: RequestStatus::Created,
            created_by: creator_id,
            created_at: now.clone(),
            modified_by: creator_id,
            modified_at: now,
        };
        self.store.put_request(&request)?;

        tracing::info!(request = %request.id, requester = %requester_id, "time-off request created");
        Ok(request)
    }

    /// Create a request for oneself.
    pub fn create_own(
        &self,
        attributes: RequestAttributes,
        creator_id: UserId,
    ) -> Result<TimeOffRequest, WorkflowError> {
        self.create(attributes, creator_id, creator_id)
    }

    /// Move a Created request into the approval flow. Computes the approver
    /// set, auto-approving when it is empty or the request is sick leave.
    pub fn submit(&self, request_id: RequestId) -> Result<TimeOffRequest, WorkflowError> {
        let _guard = self.store.write_guard();
        self.submit_locked(request_id)
    }

    /// Record one approver's approval. The request stays Awaiting until the
    /// last assigned approver responds; that final call flips it to
    /// Approved exactly once, since the whole cycle runs under the guard.
    pub fn approve(
        &self,
        request_id: RequestId,
        approver_id: UserId,
    ) -> Result<TimeOffRequest, WorkflowError> {
        let _guard = self.store.write_guard();

        let mut request = self.load_request(request_id)?;
        if request.status != RequestStatus::Awaiting {
            return Err(WorkflowError::ApproveNotAwaiting);
        }

        let mut ledger = self.store.ledger(request_id)?;
        if ledger.has_processed(approver_id) {
            return Err(WorkflowError::AlreadyResponded(approver_id));
        }
        ledger.mark_processed(request_id, approver_id)?;

        if ledger.all_processed() {
            request.status = RequestStatus::Approved;
            self.store.save_request_with_ledger(&request, &ledger)?;

            tracing::info!(request = %request.id, "time-off request approved by all approvers");
            self.notifier.notify(
                &self.emails([request.requester])?,
                &notify::approved_subject(),
                &request.to_string(),
            );
        } else {
            self.store.put_ledger(request_id, &ledger)?;
            tracing::debug!(request = %request.id, approver = %approver_id, "approval recorded");
        }

        Ok(request)
    }

    /// Record one approver's rejection. A single rejection is final.
    pub fn reject(
        &self,
        request_id: RequestId,
        approver_id: UserId,
    ) -> Result<TimeOffRequest, WorkflowError> {
        let _guard = self.store.write_guard();

        let mut request = self.load_request(request_id)?;
        if request.status != RequestStatus::Awaiting {
            return Err(WorkflowError::RejectNotAwaiting);
        }

        let mut ledger = self.store.ledger(request_id)?;
        if ledger.has_processed(approver_id) {
            return Err(WorkflowError::AlreadyResponded(approver_id));
        }
        ledger.mark_processed(request_id, approver_id)?;

        request.status = RequestStatus::Rejected;
        self.store.save_request_with_ledger(&request, &ledger)?;
        tracing::info!(request = %request.id, approver = %approver_id, "time-off request rejected");

        // the requester and the approvers who did not get to respond
        let mut recipients: Vec<UserId> = ledger
            .approver_ids()
            .filter(|id| *id != approver_id)
            .collect();
        recipients.push(request.requester);
        self.notifier.notify(
            &self.emails(recipients)?,
            &notify::rejected_subject(request.id),
            &request.to_string(),
        );

        Ok(request)
    }

    /// Rewrite a non-terminal request. Any existing approvals are
    /// invalidated and the request re-enters the submit flow.
    pub fn edit(
        &self,
        request_id: RequestId,
        attributes: RequestAttributes,
        modifier_id: UserId,
    ) -> Result<TimeOffRequest, WorkflowError> {
        let _guard = self.store.write_guard();

        let mut request = self.load_request(request_id)?;
        if request.status.is_terminal() {
            return Err(WorkflowError::EditProcessedRequest(request_id));
        }

        if let Some(conflicting) = self.overlapping_request(
            request.requester,
            attributes.start_date,
            attributes.end_date,
            Some(request_id),
        )? {
            return Err(WorkflowError::OverlappingRequest {
                requester: request.requester,
                start: conflicting.start_date,
                end: conflicting.end_date,
            });
        }

        request.kind = attributes.kind;
        request.description = attributes.description;
        request.start_date = attributes.start_date;
        request.end_date = attributes.end_date;
        request.modified_by = modifier_id;
        request.modified_at = TimeStamp::from(self.clock.now());

        let mut ledger = self.store.ledger(request_id)?;
        if ledger.is_empty() {
            self.store.put_request(&request)?;
            tracing::info!(request = %request.id, "time-off request edited");
            return Ok(request);
        }

        // invalidate the collected responses and run submission afresh
        ledger.clear();
        request.status = RequestStatus::Created;
        self.store.save_request_with_ledger(&request, &ledger)?;
        tracing::info!(request = %request.id, "time-off request edited, approvals reset");

        self.submit_locked(request_id)
    }

    /// Remove a request that has not reached a terminal state.
    pub fn delete(&self, request_id: RequestId) -> Result<TimeOffRequest, WorkflowError> {
        let _guard = self.store.write_guard();

        let request = self.load_request(request_id)?;
        if request.status.is_terminal() {
            return Err(WorkflowError::DeleteProcessedRequest(request_id));
        }

        self.store.remove_request(request_id)?;
        tracing::info!(request = %request.id, "time-off request deleted");
        Ok(request)
    }

    pub fn request(&self, request_id: RequestId) -> Result<TimeOffRequest, WorkflowError> {
        self.load_request(request_id)
    }

    pub fn requests_made_by(&self, user_id: UserId) -> Result<Vec<TimeOffRequest>, WorkflowError> {
        if self.store.user(user_id)?.is_none() {
            return Err(WorkflowError::UserNotFound(user_id));
        }
        Ok(self.store.requests_by_requester(user_id)?)
    }

    /// Awaiting requests still waiting on the given approver.
    pub fn requests_to_process(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<TimeOffRequest>, WorkflowError> {
        let directory = WorkforceDirectory::new(self.store.as_ref());
        Ok(directory.awaiting_requests_approvable_by(approver_id)?)
    }

    pub fn requests_by_status(&self, status: &str) -> Result<Vec<TimeOffRequest>, WorkflowError> {
        let status = RequestStatus::from_str(status).map_err(|_| WorkflowError::InvalidStatus)?;
        let mut requests = self.store.requests()?;
        requests.retain(|r| r.status == status);
        Ok(requests)
    }

    /// The current assignment set of a request.
    pub fn ledger(&self, request_id: RequestId) -> Result<ApprovalLedger, WorkflowError> {
        self.load_request(request_id)?;
        Ok(self.store.ledger(request_id)?)
    }

    pub fn is_approver(
        &self,
        request_id: RequestId,
        user_id: UserId,
    ) -> Result<bool, WorkflowError> {
        Ok(self.ledger(request_id)?.contains(user_id))
    }

    pub fn is_requester(
        &self,
        request_id: RequestId,
        user_id: UserId,
    ) -> Result<bool, WorkflowError> {
        Ok(self.load_request(request_id)?.requester == user_id)
    }

    fn submit_locked(&self, request_id: RequestId) -> Result<TimeOffRequest, WorkflowError> {
        let mut request = self.load_request(request_id)?;
        if request.status != RequestStatus::Created {
            return Err(WorkflowError::AlreadySubmitted);
        }

        let directory = WorkforceDirectory::new(self.store.as_ref());
        let approvers =
            directory.available_approvers(request.requester, self.clock.today().into())?;

        let mut ledger = ApprovalLedger::new();
        for approver in &approvers {
            ledger.assign(request_id, approver.id)?;
        }

        if ledger.is_empty() || request.kind == RequestKind::Sick {
            return self.auto_approve(request, ledger);
        }

        request.status = RequestStatus::Awaiting;
        self.store.save_request_with_ledger(&request, &ledger)?;
        tracing::info!(
            request = %request.id,
            approvers = ledger.len(),
            "time-off request submitted, awaiting approval"
        );

        let recipients: Vec<String> = approvers.into_iter().map(|u| u.email).collect();
        self.notifier.notify(
            &recipients,
            &notify::submitted_subject(&request),
            &request.to_string(),
        );

        Ok(request)
    }

    fn auto_approve(
        &self,
        mut request: TimeOffRequest,
        mut ledger: ApprovalLedger,
    ) -> Result<TimeOffRequest, WorkflowError> {
        let recipients = if request.kind == RequestKind::Sick {
            // sick leave is broadcast to every teammate, not just approvers
            let directory = WorkforceDirectory::new(self.store.as_ref());
            let mut members = BTreeSet::new();
            for team in directory.teams_of(request.requester)? {
                members.extend(team.members.iter().copied());
            }
            if members.is_empty() {
                members.insert(request.requester);
            }
            self.emails(members)?
        } else {
            self.emails([request.requester])?
        };

        ledger.mark_all_processed();
        request.status = RequestStatus::Approved;
        self.store.save_request_with_ledger(&request, &ledger)?;
        tracing::info!(request = %request.id, "time-off request auto-approved");

        self.notifier.notify(
            &recipients,
            &notify::submitted_subject(&request),
            &notify::auto_approved_body(&request),
        );

        Ok(request)
    }

    fn load_request(&self, request_id: RequestId) -> Result<TimeOffRequest, WorkflowError> {
        self.store
            .request(request_id)?
            .ok_or(WorkflowError::RequestNotFound(request_id))
    }

    fn overlapping_request(
        &self,
        requester: UserId,
        start: LeaveDate,
        end: LeaveDate,
        exclude: Option<RequestId>,
    ) -> Result<Option<TimeOffRequest>, WorkflowError> {
        let requests = self.store.requests_by_requester(requester)?;
        Ok(requests.into_iter().find(|r| {
            r.status != RequestStatus::Rejected && Some(r.id) != exclude && r.overlaps(start, end)
        }))
    }

    fn emails(
        &self,
        ids: impl IntoIterator<Item = UserId>,
    ) -> Result<Vec<String>, WorkflowError> {
        let mut emails = Vec::new();
        for id in ids {
            if let Some(user) = self.store.user(id)? {
                emails.push(user.email);
            }
        }
        Ok(emails)
    }
}
