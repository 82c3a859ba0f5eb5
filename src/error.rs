//! Typed failure values for the workflow engine
use crate::store::StoreError;
use crate::types::{LeaveDate, RequestId, TeamId, UserId};

/// Broad failure categories the surrounding application maps onto its own
/// outcomes (HTTP statuses, retries). Obtained via [`WorkflowError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced request, user or team does not exist.
    NotFound,
    /// A uniqueness or terminal-state invariant would be violated.
    Conflict,
    /// A state-machine move that is not valid from the current state.
    InvalidTransition,
    /// The store failed; the triggering operation did not commit.
    Storage,
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("request with id '{0}' does not exist")]
    RequestNotFound(RequestId),
    #[error("user with id '{0}' does not exist")]
    UserNotFound(UserId),
    #[error("team with id '{0}' does not exist")]
    TeamNotFound(TeamId),
    #[error(
        "there is a request from user with id '{requester}' for the period \
         '{start}' - '{end}'. Requests by same user cannot overlap"
    )]
    OverlappingRequest {
        requester: UserId,
        start: LeaveDate,
        end: LeaveDate,
    },
    #[error("request with id '{0}' has already been processed and cannot be edited")]
    EditProcessedRequest(RequestId),
    #[error("request with id '{0}' has already been processed and cannot be deleted")]
    DeleteProcessedRequest(RequestId),
    #[error("you cannot submit a request which has already been submitted")]
    AlreadySubmitted,
    #[error("you can only approve requests that are awaiting")]
    ApproveNotAwaiting,
    #[error("you can only reject requests that are awaiting")]
    RejectNotAwaiting,
    #[error("the request has already been processed by approver '{0}'")]
    AlreadyResponded(UserId),
    #[error("user '{approver}' has no approval assignment for request '{request}'")]
    AssignmentNotFound {
        request: RequestId,
        approver: UserId,
    },
    #[error("user '{approver}' is already assigned to approve request '{request}'")]
    AlreadyAssigned {
        request: RequestId,
        approver: UserId,
    },
    #[error("team with title '{0}' already exists")]
    DuplicateTeamTitle(String),
    #[error("user with id '{0}' is already a team leader. Only one team can be led at the same time")]
    AlreadyTeamLeader(UserId),
    #[error("user with id '{user}' is not part of team '{team}'")]
    NotATeamMember { user: UserId, team: TeamId },
    #[error("user with id '{user}' is already part of team '{team}'")]
    AlreadyTeamMember { user: UserId, team: TeamId },
    #[error("status can be only one of \"Created\", \"Awaiting\", \"Approved\" or \"Rejected\"")]
    InvalidStatus,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        use WorkflowError::*;

        match self {
            RequestNotFound(_) | UserNotFound(_) | TeamNotFound(_) => ErrorKind::NotFound,
            AssignmentNotFound { .. } => ErrorKind::NotFound,
            OverlappingRequest { .. }
            | EditProcessedRequest(_)
            | DeleteProcessedRequest(_)
            | AlreadyAssigned { .. }
            | DuplicateTeamTitle(_)
            | AlreadyTeamLeader(_)
            | NotATeamMember { .. }
            | AlreadyTeamMember { .. }
            | InvalidStatus => ErrorKind::Conflict,
            AlreadySubmitted | ApproveNotAwaiting | RejectNotAwaiting | AlreadyResponded(_) => {
                ErrorKind::InvalidTransition
            }
            Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Rejections raised while finalising a [`crate::request::RequestDraft`].
/// These belong to the input boundary; the engine itself only ever sees
/// drafts that already passed.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DraftError {
    #[error("type of request is required")]
    MissingKind,
    #[error("type must be \"Paid\", \"Unpaid\" or \"Sick\"")]
    UnknownKind,
    #[error("you are required to add a description for your request")]
    MissingDescription,
    #[error("the description must be at least {0} symbols long")]
    DescriptionTooShort(usize),
    #[error("start date is required")]
    MissingStartDate,
    #[error("end date is required")]
    MissingEndDate,
    #[error("start date cannot be after or equal to end date")]
    DatesOutOfOrder,
    #[error("start date should not be in the past")]
    StartDateNotInFuture,
}
