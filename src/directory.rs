//! Read-side queries over teams, leaders and pending approvals
use crate::request::{RequestStatus, TimeOffRequest};
use crate::store::{Store, StoreError};
use crate::team::Team;
use crate::types::{LeaveDate, User, UserId};
use std::collections::BTreeMap;

/// Resolves the org-shaped questions the workflow engine asks: which teams
/// a user belongs to, who leads them, and what is waiting on an approver.
pub struct WorkforceDirectory<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> WorkforceDirectory<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn teams_of(&self, user: UserId) -> Result<Vec<Team>, StoreError> {
        let mut teams = self.store.teams()?;
        teams.retain(|t| t.is_member(user));
        Ok(teams)
    }

    pub fn leader_of(&self, team: &Team) -> Result<Option<User>, StoreError> {
        match team.leader {
            Some(id) => self.store.user(id),
            None => Ok(None),
        }
    }

    /// The approver set for a submission by `requester`: the leaders of the
    /// requester's teams, minus the requester, minus any leader who is on
    /// approved leave covering `today`. Deduplicated and ordered by id.
    pub fn available_approvers(
        &self,
        requester: UserId,
        today: LeaveDate,
    ) -> Result<Vec<User>, StoreError> {
        let mut approvers = BTreeMap::new();

        for team in self.teams_of(requester)? {
            let Some(leader_id) = team.leader else {
                continue;
            };
            if leader_id == requester || approvers.contains_key(&leader_id) {
                continue;
            }

            let on_leave = self
                .store
                .requests_by_requester(leader_id)?
                .iter()
                .any(|r| r.status == RequestStatus::Approved && r.is_active_on(today));
            if on_leave {
                continue;
            }

            if let Some(leader) = self.store.user(leader_id)? {
                approvers.insert(leader_id, leader);
            }
        }

        Ok(approvers.into_values().collect())
    }

    /// Awaiting requests on which `approver` still holds an unprocessed
    /// assignment.
    pub fn awaiting_requests_approvable_by(
        &self,
        approver: UserId,
    ) -> Result<Vec<TimeOffRequest>, StoreError> {
        let mut pending = Vec::new();

        for assignment in self.store.assignments_by_approver(approver)? {
            if assignment.is_processed {
                continue;
            }
            if let Some(request) = self.store.request(assignment.request_id)? {
                if request.status == RequestStatus::Awaiting {
                    pending.push(request);
                }
            }
        }

        pending.sort_by_key(|r| r.id);
        Ok(pending)
    }
}
