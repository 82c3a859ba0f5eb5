//! Notification collaborator: narrow, fire-and-forget
use crate::request::TimeOffRequest;
use crate::types::{RequestId, TeamId};
use std::sync::{Arc, Mutex};

/// Outbound notification sink. Delivery is fire-and-forget: implementors
/// deal with their own failures and must never surface them into the
/// workflow, so a lost email cannot roll back a state transition.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipients: &[String], subject: &str, body: &str);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, recipients: &[String], subject: &str, body: &str) {
        (**self).notify(recipients, subject, body)
    }
}

/// Default sink: writes the message to the log instead of delivering it.
/// Real delivery (SMTP or otherwise) belongs to the embedding application.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipients: &[String], subject: &str, body: &str) {
        tracing::info!(
            recipients = %recipients.join(", "),
            subject,
            body,
            "notification dispatched"
        );
    }
}

/// Captures everything that would have been sent. Meant for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipients: &[String], subject: &str, body: &str) {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(SentNotification {
                recipients: recipients.to_vec(),
                subject: subject.to_owned(),
                body: body.to_owned(),
            });
    }
}

// Message catalog. Subjects and bodies mirror the wording users already
// receive from the rest of the product suite.

pub(crate) fn submitted_subject(request: &TimeOffRequest) -> String {
    format!(
        "{} leave request '{}' has been submitted!",
        request.kind, request.id
    )
}

pub(crate) fn approved_subject() -> String {
    "Request has been APPROVED!".to_owned()
}

pub(crate) fn auto_approved_body(request: &TimeOffRequest) -> String {
    format!("{request}\nThe request has been automatically approved!")
}

pub(crate) fn rejected_subject(request_id: RequestId) -> String {
    format!("Request with id '{request_id}' has been rejected!")
}

pub(crate) fn member_added_member_subject() -> String {
    "Team membership update!".to_owned()
}

pub(crate) fn member_added_member_body(team_id: TeamId) -> String {
    format!("You have been added to team '{team_id}'")
}

pub(crate) fn member_added_others_subject() -> String {
    "Team update: new member.".to_owned()
}

pub(crate) fn member_added_others_body(username: &str) -> String {
    format!("User '{username}' has been assigned to your team!")
}

pub(crate) fn member_added_leader_subject() -> String {
    "Team management update!".to_owned()
}

pub(crate) fn member_added_leader_body(username: &str, pending: usize) -> String {
    format!(
        "User '{username}' has been assigned to your team. \
         The user has {pending} requests to be processed by you!"
    )
}

pub(crate) fn member_removed_member_subject() -> String {
    "Team membership update!".to_owned()
}

pub(crate) fn member_removed_member_body(team_title: &str) -> String {
    format!("You have been removed from team '{team_title}'")
}

pub(crate) fn member_removed_others_subject() -> String {
    "Team update: member removed.".to_owned()
}

pub(crate) fn member_removed_others_body(username: &str, team_title: &str) -> String {
    format!("User '{username}' has been removed from your team {team_title}!")
}
