//! Team record and the membership operations that reshape pending approvals
use crate::clock::Clock;
use crate::error::WorkflowError;
use crate::notify;
use crate::notify::Notifier;
use crate::request::RequestStatus;
use crate::store::Store;
use crate::types::{TeamId, TimeStamp, UserId};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Team {
    #[n(0)]
    pub id: TeamId,
    /// Globally unique, compared case-insensitively.
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub description: String,
    /// A user leads at most one team at a time.
    #[n(3)]
    pub leader: Option<UserId>,
    #[n(4)]
    pub members: Vec<UserId>,
    #[n(5)]
    pub created_by: UserId,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
    #[n(7)]
    pub modified_by: UserId,
    #[n(8)]
    pub modified_at: TimeStamp<Utc>,
}

impl Team {
    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    pub fn is_led_by(&self, user: UserId) -> bool {
        self.leader == Some(user)
    }
}

/// Team management surface. Membership changes invalidate in-flight
/// approvals, so this service mutates the same ledgers the workflow engine
/// does and takes the same store guard.
pub struct TeamService<S, N, C> {
    store: Arc<S>,
    notifier: N,
    clock: C,
}

impl<S: Store, N: Notifier, C: Clock> TeamService<S, N, C> {
    pub fn new(store: Arc<S>, notifier: N, clock: C) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    pub fn create(
        &self,
        title: &str,
        description: &str,
        leader_id: Option<UserId>,
        creator_id: UserId,
    ) -> Result<Team, WorkflowError> {
        let _guard = self.store.write_guard();

        if self.title_taken(title, None)? {
            return Err(WorkflowError::DuplicateTeamTitle(title.to_owned()));
        }

        if let Some(leader_id) = leader_id {
            if self.store.user(leader_id)?.is_none() {
                return Err(WorkflowError::UserNotFound(leader_id));
            }
            if self.leads_a_team(leader_id, None)? {
                return Err(WorkflowError::AlreadyTeamLeader(leader_id));
            }
        }

        let now = TimeStamp::from(self.clock.now());
        let team = Team {
            id: TeamId(self.store.generate_id()?),
            title: title.to_owned(),
            description: description.to_owned(),
            leader: leader_id,
            // the leader is enrolled as a member from the start
            members: leader_id.into_iter().collect(),
            created_by: creator_id,
            created_at: now.clone(),
            modified_by: creator_id,
            modified_at: now,
        };
        self.store.put_team(&team)?;

        tracing::info!(team = %team.id, title = %team.title, "team created");
        Ok(team)
    }

    /// Rename or re-describe a team and optionally hand it a different
    /// leader. Leader changes here do not touch pending approvals; the
    /// transferring path is [`TeamService::promote_to_leader`].
    pub fn edit(
        &self,
        team_id: TeamId,
        title: &str,
        description: &str,
        leader_id: Option<UserId>,
        modifier_id: UserId,
    ) -> Result<Team, WorkflowError> {
        let _guard = self.store.write_guard();

        let mut team = self.load_team(team_id)?;
        if self.title_taken(title, Some(team_id))? {
            return Err(WorkflowError::DuplicateTeamTitle(title.to_owned()));
        }

        if let Some(leader_id) = leader_id {
            if !team.is_member(leader_id) {
                return Err(WorkflowError::NotATeamMember {
                    user: leader_id,
                    team: team_id,
                });
            }
            if !team.is_led_by(leader_id) && self.leads_a_team(leader_id, Some(team_id))? {
                return Err(WorkflowError::AlreadyTeamLeader(leader_id));
            }
        }

        team.title = title.to_owned();
        team.description = description.to_owned();
        team.leader = leader_id;
        team.modified_by = modifier_id;
        team.modified_at = TimeStamp::from(self.clock.now());
        self.store.put_team(&team)?;

        Ok(team)
    }

    /// Dissolve a team. The leader, if any, stops being a stakeholder in
    /// every request they were assigned to approve.
    pub fn delete(&self, team_id: TeamId) -> Result<Team, WorkflowError> {
        let _guard = self.store.write_guard();

        let team = self.load_team(team_id)?;
        if let Some(leader_id) = team.leader {
            self.discard_assignments_of(leader_id)?;
        }
        self.store.remove_team(team_id)?;

        tracing::info!(team = %team.id, title = %team.title, "team deleted");
        Ok(team)
    }

    /// Enroll a user. Their in-flight requests retroactively gain the
    /// team's leader as an additional approver.
    pub fn add_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
        modifier_id: UserId,
    ) -> Result<Team, WorkflowError> {
        let _guard = self.store.write_guard();

        let mut team = self.load_team(team_id)?;
        let member = self
            .store
            .user(user_id)?
            .ok_or(WorkflowError::UserNotFound(user_id))?;
        if team.is_member(user_id) {
            return Err(WorkflowError::AlreadyTeamMember {
                user: user_id,
                team: team_id,
            });
        }

        team.members.push(user_id);

        let mut awaiting = self.store.requests_by_requester(user_id)?;
        awaiting.retain(|r| r.status == RequestStatus::Awaiting);

        if let Some(leader_id) = team.leader {
            for request in &awaiting {
                let mut ledger = self.store.ledger(request.id)?;
                if !ledger.contains(leader_id) {
                    ledger.assign(request.id, leader_id)?;
                    self.store.put_ledger(request.id, &ledger)?;
                }
            }
        }

        team.modified_by = modifier_id;
        team.modified_at = TimeStamp::from(self.clock.now());
        self.store.put_team(&team)?;
        tracing::info!(team = %team.id, user = %user_id, "member added to team");

        if team.members.len() > 1 {
            let others: Vec<UserId> = team
                .members
                .iter()
                .copied()
                .filter(|id| *id != user_id)
                .collect();
            self.notifier.notify(
                &self.emails(others)?,
                &notify::member_added_others_subject(),
                &notify::member_added_others_body(&member.username),
            );
        }

        self.notifier.notify(
            &self.emails([user_id])?,
            &notify::member_added_member_subject(),
            &notify::member_added_member_body(team.id),
        );

        if let Some(leader_id) = team.leader {
            self.notifier.notify(
                &self.emails([leader_id])?,
                &notify::member_added_leader_subject(),
                &notify::member_added_leader_body(&member.username, awaiting.len()),
            );
        }

        Ok(team)
    }

    /// Drop a user from the team. Dropping the leader clears leadership and
    /// every approval still assigned to them; dropping a plain member
    /// releases the leader's stake in that member's in-flight requests.
    pub fn remove_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
        modifier_id: UserId,
    ) -> Result<Team, WorkflowError> {
        let _guard = self.store.write_guard();

        let member = self
            .store
            .user(user_id)?
            .ok_or(WorkflowError::UserNotFound(user_id))?;
        let mut team = self.load_team(team_id)?;
        if !team.is_member(user_id) {
            return Err(WorkflowError::NotATeamMember {
                user: user_id,
                team: team_id,
            });
        }

        if team.is_led_by(user_id) {
            self.discard_assignments_of(user_id)?;
            team.leader = None;
        } else if let Some(leader_id) = team.leader {
            let mut awaiting = self.store.requests_by_requester(user_id)?;
            awaiting.retain(|r| r.status == RequestStatus::Awaiting);

            for request in &awaiting {
                let mut ledger = self.store.ledger(request.id)?;
                if ledger.remove(leader_id) {
                    self.store.put_ledger(request.id, &ledger)?;
                }
            }
        }

        team.members.retain(|id| *id != user_id);
        team.modified_by = modifier_id;
        team.modified_at = TimeStamp::from(self.clock.now());
        self.store.put_team(&team)?;
        tracing::info!(team = %team.id, user = %user_id, "member removed from team");

        if !team.members.is_empty() {
            self.notifier.notify(
                &self.emails(team.members.iter().copied())?,
                &notify::member_removed_others_subject(),
                &notify::member_removed_others_body(&member.username, &team.title),
            );
        }

        self.notifier.notify(
            &self.emails([user_id])?,
            &notify::member_removed_member_subject(),
            &notify::member_removed_member_body(&team.title),
        );

        Ok(team)
    }

    /// Hand team leadership to a member, transferring every pending
    /// approval on the members' in-flight requests from the old leader to
    /// the new one.
    pub fn promote_to_leader(
        &self,
        team_id: TeamId,
        user_id: UserId,
        modifier_id: UserId,
    ) -> Result<Team, WorkflowError> {
        let _guard = self.store.write_guard();

        let mut team = self.load_team(team_id)?;
        if self.store.user(user_id)?.is_none() {
            return Err(WorkflowError::UserNotFound(user_id));
        }
        if self.leads_a_team(user_id, None)? {
            return Err(WorkflowError::AlreadyTeamLeader(user_id));
        }
        if !team.is_member(user_id) {
            return Err(WorkflowError::NotATeamMember {
                user: user_id,
                team: team_id,
            });
        }

        let old_leader = team.leader;
        let members: BTreeSet<UserId> = team.members.iter().copied().collect();
        for member_id in members {
            let mut awaiting = self.store.requests_by_requester(member_id)?;
            awaiting.retain(|r| r.status == RequestStatus::Awaiting);

            for request in &awaiting {
                let mut ledger = self.store.ledger(request.id)?;
                let mut changed = false;
                if let Some(old_leader) = old_leader {
                    changed |= ledger.remove(old_leader);
                }
                if !ledger.contains(user_id) {
                    ledger.assign(request.id, user_id)?;
                    changed = true;
                }
                if changed {
                    self.store.put_ledger(request.id, &ledger)?;
                }
            }
        }

        team.leader = Some(user_id);
        team.modified_by = modifier_id;
        team.modified_at = TimeStamp::from(self.clock.now());
        self.store.put_team(&team)?;

        tracing::info!(team = %team.id, user = %user_id, "team leader promoted");
        Ok(team)
    }

    pub fn team(&self, team_id: TeamId) -> Result<Team, WorkflowError> {
        self.load_team(team_id)
    }

    pub fn teams(&self) -> Result<Vec<Team>, WorkflowError> {
        Ok(self.store.teams()?)
    }

    fn load_team(&self, team_id: TeamId) -> Result<Team, WorkflowError> {
        self.store
            .team(team_id)?
            .ok_or(WorkflowError::TeamNotFound(team_id))
    }

    fn title_taken(&self, title: &str, exclude: Option<TeamId>) -> Result<bool, WorkflowError> {
        let title = title.to_lowercase();
        Ok(self
            .store
            .teams()?
            .iter()
            .any(|t| t.title.to_lowercase() == title && Some(t.id) != exclude))
    }

    fn leads_a_team(&self, user: UserId, exclude: Option<TeamId>) -> Result<bool, WorkflowError> {
        Ok(self
            .store
            .teams()?
            .iter()
            .any(|t| t.is_led_by(user) && Some(t.id) != exclude))
    }

    /// Removes every assignment held by the approver, across all requests.
    fn discard_assignments_of(&self, approver: UserId) -> Result<(), WorkflowError> {
        let touched: BTreeSet<_> = self
            .store
            .assignments_by_approver(approver)?
            .into_iter()
            .map(|a| a.request_id)
            .collect();

        for request_id in touched {
            let mut ledger = self.store.ledger(request_id)?;
            if ledger.remove(approver) {
                self.store.put_ledger(request_id, &ledger)?;
            }
        }
        Ok(())
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
