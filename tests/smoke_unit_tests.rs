//! Smoke Screen Unit tests for the time-off approval components
//!
//! These tests span the codebase, testing behavior in isolation from
//! integration scenarios. They are intended as smoke-screen and generally
//! test the happy-path.

use chrono::NaiveDate;
use leave_approval::{
    clock::{Clock, FixedClock},
    ledger::ApprovalLedger,
    notify::{Notifier, RecordingNotifier},
    request::{RequestDraft, RequestKind, RequestStatus},
    types::{LeaveDate, RequestId, UserId},
};

fn day(year: i32, month: u32, d: u32) -> LeaveDate {
    LeaveDate::from_ymd(year, month, d).unwrap()
}

// REQUEST MODULE TESTS
#[cfg(test)]
mod request_tests {
    use super::*;

    /// Test that only Approved and Rejected are terminal
    #[test]
    fn terminal_statuses() {
        assert!(!RequestStatus::Created.is_terminal());
        assert!(!RequestStatus::Awaiting.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    /// Test that statuses parse case-insensitively, matching the API surface
    #[test]
    fn status_parsing() {
        assert_eq!("awaiting".parse(), Ok(RequestStatus::Awaiting));
        assert_eq!("APPROVED".parse(), Ok(RequestStatus::Approved));
        assert!("pending".parse::<RequestStatus>().is_err());
    }

    /// Test that a fully populated draft builds
    #[test]
    fn draft_happy_path() {
        let today = NaiveDate::from_ymd_opt(2022, 11, 1).unwrap();

        let attrs = RequestDraft::new()
            .set_kind(RequestKind::Paid)
            .set_description("two weeks of winter holidays")
            .set_start_date(day(2022, 12, 12))
            .set_end_date(day(2022, 12, 23))
            .build(today)
            .unwrap();

        assert_eq!(attrs.kind, RequestKind::Paid);
        assert_eq!(attrs.end_date, day(2022, 12, 23));
    }

    /// Test that an incomplete draft is refused
    #[test]
    fn draft_requires_every_field() {
        let today = NaiveDate::from_ymd_opt(2022, 11, 1).unwrap();

        let result = RequestDraft::new()
            .set_kind(RequestKind::Paid)
            .set_start_date(day(2022, 12, 12))
            .set_end_date(day(2022, 12, 23))
            .build(today);

        assert!(result.is_err());
    }
}

// LEDGER MODULE TESTS
#[cfg(test)]
mod ledger_tests {
    use super::*;

    const REQUEST: RequestId = RequestId(1);

    /// Test the single-approver happy path: assign, respond, consensus
    #[test]
    fn single_approver_consensus() {
        let mut ledger = ApprovalLedger::new();
        ledger.assign(REQUEST, UserId(2)).unwrap();
        assert!(!ledger.all_processed());

        ledger.mark_processed(REQUEST, UserId(2)).unwrap();
        assert!(ledger.all_processed());
        assert!(ledger.has_processed(UserId(2)));
    }

    /// Test that approver ids are reported in assignment order
    #[test]
    fn approver_ids_preserve_assignment_order() {
        let mut ledger = ApprovalLedger::new();
        ledger.assign(REQUEST, UserId(5)).unwrap();
        ledger.assign(REQUEST, UserId(3)).unwrap();

        let ids: Vec<UserId> = ledger.approver_ids().collect();
        assert_eq!(ids, vec![UserId(5), UserId(3)]);
    }

    /// Test the auto-approval bulk marking
    #[test]
    fn mark_all_processed_reaches_consensus() {
        let mut ledger = ApprovalLedger::new();
        ledger.assign(REQUEST, UserId(2)).unwrap();
        ledger.assign(REQUEST, UserId(3)).unwrap();

        ledger.mark_all_processed();
        assert!(ledger.all_processed());
    }
}

// CLOCK MODULE TESTS
#[cfg(test)]
mod clock_tests {
    use super::*;

    /// Test that a fixed clock pins both the instant and the day
    #[test]
    fn fixed_clock_is_deterministic() {
        let clock = FixedClock::at_ymd(2022, 11, 1);

        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2022, 11, 1).unwrap());
    }
}

// NOTIFY MODULE TESTS
#[cfg(test)]
mod notify_tests {
    use super::*;

    /// Test that the recording notifier captures messages in order
    #[test]
    fn recording_notifier_captures_messages() {
        let notifier = RecordingNotifier::new();

        notifier.notify(
            &["marta@workforce.test".to_owned()],
            "Request has been APPROVED!",
            "details",
        );
        notifier.notify(&[], "Team membership update!", "details");

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Request has been APPROVED!");
        assert_eq!(sent[1].recipients.len(), 0);
    }
}

// STORE MODULE TESTS
#[cfg(test)]
mod store_tests {
    use super::*;
    use leave_approval::request::TimeOffRequest;
    use leave_approval::store::{SledStore, Store};
    use leave_approval::types::TimeStamp;
    use tempfile::tempdir;

    /// Test that a request and its ledger survive the storage round-trip
    #[test]
    fn request_and_ledger_round_trip() {
        let temp_dir = tempdir().unwrap();
        let store = SledStore::open(temp_dir.path().join("round_trip.db")).unwrap();

        let stamp = TimeStamp::new_with(2022, 11, 1, 9, 0, 0);
        let request = TimeOffRequest {
            id: RequestId(1),
            requester: UserId(2),
            kind: RequestKind::Unpaid,
            description: "unpaid leave for a family visit".into(),
            start_date: day(2022, 12, 12),
            end_date: day(2022, 12, 13),
            status: RequestStatus::Awaiting,
            created_by: UserId(2),
            created_at: stamp.clone(),
            modified_by: UserId(2),
            modified_at: stamp,
        };
        let mut ledger = ApprovalLedger::new();
        ledger.assign(request.id, UserId(3)).unwrap();

        store.save_request_with_ledger(&request, &ledger).unwrap();

        assert_eq!(store.request(request.id).unwrap(), Some(request.clone()));
        assert_eq!(store.ledger(request.id).unwrap(), ledger);

        // removal drops both records
        store.remove_request(request.id).unwrap();
        assert_eq!(store.request(request.id).unwrap(), None);
        assert!(store.ledger(request.id).unwrap().is_empty());
    }

    /// Test that ids are unique and start above zero
    #[test]
    fn generated_ids_are_unique() {
        let temp_dir = tempdir().unwrap();
        let store = SledStore::open(temp_dir.path().join("ids.db")).unwrap();

        let first = store.generate_id().unwrap();
        let second = store.generate_id().unwrap();

        assert!(first >= 1);
        assert_ne!(first, second);
    }
}

// DIRECTORY MODULE TESTS
#[cfg(test)]
mod directory_tests {
    use super::*;
    use leave_approval::directory::WorkforceDirectory;
    use leave_approval::request::TimeOffRequest;
    use leave_approval::store::{SledStore, Store};
    use leave_approval::team::Team;
    use leave_approval::types::{TeamId, TimeStamp, User};
    use tempfile::tempdir;

    fn seeded_store(path: &std::path::Path) -> SledStore {
        let store = SledStore::open(path).unwrap();
        let stamp = TimeStamp::new_with(2022, 1, 1, 9, 0, 0);

        for (id, name) in [(1, "marta"), (2, "boris"), (3, "ina")] {
            store
                .put_user(&User::new(UserId(id), name, format!("{name}@workforce.test")))
                .unwrap();
        }
        store
            .put_team(&Team {
                id: TeamId(10),
                title: "Backend".into(),
                description: "the backend crew".into(),
                leader: Some(UserId(2)),
                members: vec![UserId(1), UserId(2)],
                created_by: UserId(1),
                created_at: stamp.clone(),
                modified_by: UserId(1),
                modified_at: stamp,
            })
            .unwrap();
        store
    }

    /// Test that team membership and leadership resolve through the store
    #[test]
    fn teams_and_leaders_resolve() {
        let temp_dir = tempdir().unwrap();
        let store = seeded_store(&temp_dir.path().join("directory.db"));
        let directory = WorkforceDirectory::new(&store);

        let teams = directory.teams_of(UserId(1)).unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].title, "Backend");
        assert!(directory.teams_of(UserId(3)).unwrap().is_empty());

        let leader = directory.leader_of(&teams[0]).unwrap().unwrap();
        assert_eq!(leader.username, "boris");
    }

    /// Test the approver-set rules: the requester is never their own
    /// approver, and a lead on approved leave today is skipped
    #[test]
    fn available_approvers_exclusions() {
        let temp_dir = tempdir().unwrap();
        let store = seeded_store(&temp_dir.path().join("approvers.db"));
        let directory = WorkforceDirectory::new(&store);
        let today = day(2022, 11, 1);

        let approvers = directory.available_approvers(UserId(1), today).unwrap();
        assert_eq!(approvers.len(), 1);
        assert_eq!(approvers[0].id, UserId(2));

        // the lead approves nothing of their own
        assert!(directory.available_approvers(UserId(2), today).unwrap().is_empty());

        // once the lead is away on approved leave, nobody is left to ask
        let stamp = TimeStamp::new_with(2022, 10, 25, 9, 0, 0);
        store
            .put_request(&TimeOffRequest {
                id: RequestId(50),
                requester: UserId(2),
                kind: RequestKind::Paid,
                description: "a previously granted leave".into(),
                start_date: day(2022, 10, 28),
                end_date: day(2022, 11, 4),
                status: RequestStatus::Approved,
                created_by: UserId(2),
                created_at: stamp.clone(),
                modified_by: UserId(2),
                modified_at: stamp,
            })
            .unwrap();

        assert!(directory.available_approvers(UserId(1), today).unwrap().is_empty());
    }
}
