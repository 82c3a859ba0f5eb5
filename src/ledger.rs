//! Per-request approval ledger: who must respond, and who already has
use crate::error::WorkflowError;
use crate::types::{RequestId, UserId};

/// One (request, approver) pair. `is_processed` flips when the approver
/// acts, whether they approved or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ApprovalAssignment {
    #[n(0)]
    pub request_id: RequestId,
    #[n(1)]
    pub approver_id: UserId,
    #[n(2)]
    pub is_processed: bool,
}

/// The assignment set of a single request. Loaded from the store, mutated,
/// and saved back as a unit, so a transition observes one consistent set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalLedger {
    assignments: Vec<ApprovalAssignment>,
}

impl ApprovalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assignments(assignments: Vec<ApprovalAssignment>) -> Self {
        Self { assignments }
    }

    /// Registers an unprocessed assignment for the pair. The pair is
    /// unique; re-assigning an existing approver is an error (the edit
    /// path clears the ledger before re-running submission).
    pub fn assign(&mut self, request_id: RequestId, approver_id: UserId) -> Result<(), WorkflowError> {
        if self.contains(approver_id) {
            return Err(WorkflowError::AlreadyAssigned {
                request: request_id,
                approver: approver_id,
            });
        }

        self.assignments.push(ApprovalAssignment {
            request_id,
            approver_id,
            is_processed: false,
        });
        Ok(())
    }

    /// Records that the approver acted on the request.
    pub fn mark_processed(
        &mut self,
        request_id: RequestId,
        approver_id: UserId,
    ) -> Result<(), WorkflowError> {
        let assignment = self
            .assignments
            .iter_mut()
            .find(|a| a.approver_id == approver_id)
            .ok_or(WorkflowError::AssignmentNotFound {
                request: request_id,
                approver: approver_id,
            })?;

        assignment.is_processed = true;
        Ok(())
    }

    /// True iff no unprocessed assignment remains. Vacuously true for an
    /// empty ledger, which is what makes auto-approval fall out naturally.
    pub fn all_processed(&self) -> bool {
        self.assignments.iter().all(|a| a.is_processed)
    }

    pub fn has_processed(&self, approver_id: UserId) -> bool {
        self.assignments
            .iter()
            .any(|a| a.approver_id == approver_id && a.is_processed)
    }

    pub fn contains(&self, approver_id: UserId) -> bool {
        self.assignments.iter().any(|a| a.approver_id == approver_id)
    }

    /// Drops the approver's assignment if present; reports whether one was
    /// removed.
    pub fn remove(&mut self, approver_id: UserId) -> bool {
        let before = self.assignments.len();
        self.assignments.retain(|a| a.approver_id != approver_id);
        before != self.assignments.len()
    }

    /// Flips every assignment back to unprocessed (edit path).
    pub fn reset_all(&mut self) {
        for assignment in &mut self.assignments {
            assignment.is_processed = false;
        }
    }

    /// Marks every assignment processed (auto-approval path).
    pub fn mark_all_processed(&mut self) {
        for assignment in &mut self.assignments {
            assignment.is_processed = true;
        }
    }

    pub fn clear(&mut self) {
        self.assignments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn approver_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.assignments.iter().map(|a| a.approver_id)
    }

    pub fn assignments(&self) -> &[ApprovalAssignment] {
        &self.assignments
    }
}
