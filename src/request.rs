//! Core time-off request record and the draft builder used at the input boundary
use crate::error::DraftError;
use crate::types::{LeaveDate, RequestId, TimeStamp, UserId};
use chrono::{NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Shortest description accepted at the input boundary.
pub const DESCRIPTION_MIN_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum RequestKind {
    #[n(0)]
    Paid,
    #[n(1)]
    Unpaid,
    #[n(2)]
    Sick,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            RequestKind::Paid => "Paid",
            RequestKind::Unpaid => "Unpaid",
            RequestKind::Sick => "Sick",
        };
        write!(f, "{kind}")
    }
}

impl FromStr for RequestKind {
    type Err = DraftError;

    // the boundary accepts the type name in any casing
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paid" => Ok(RequestKind::Paid),
            "unpaid" => Ok(RequestKind::Unpaid),
            "sick" => Ok(RequestKind::Sick),
            _ => Err(DraftError::UnknownKind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum RequestStatus {
    #[n(0)]
    Created,
    #[n(1)]
    Awaiting,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
}

impl RequestStatus {
    /// Approved and Rejected admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            RequestStatus::Created => "Created",
            RequestStatus::Awaiting => "Awaiting",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        };
        write!(f, "{status}")
    }
}

impl FromStr for RequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(RequestStatus::Created),
            "awaiting" => Ok(RequestStatus::Awaiting),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct TimeOffRequest {
    #[n(0)]
    pub id: RequestId,
    /// The user the leave is for; owns the calendar time.
    #[n(1)]
    pub requester: UserId,
    #[n(2)]
    pub kind: RequestKind,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub start_date: LeaveDate,
    #[n(5)]
    pub end_date: LeaveDate,
    #[n(6)]
    pub status: RequestStatus,
    /// The user who entered the request; may differ from the requester.
    #[n(7)]
    pub created_by: UserId,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub modified_by: UserId,
    #[n(10)]
    pub modified_at: TimeStamp<Utc>,
}

impl TimeOffRequest {
    /// The overlap test used for the one-request-per-period rule. The
    /// boundary is asymmetric: an existing request ending exactly on
    /// `start` does not overlap, while one starting exactly on `end` does.
    pub fn overlaps(&self, start: LeaveDate, end: LeaveDate) -> bool {
        !(self.end_date <= start) && !(self.start_date > end)
    }

    /// Whether the leave period covers the given day, bounds included.
    pub fn is_active_on(&self, day: LeaveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

impl fmt::Display for TimeOffRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} leave request '{}' by user '{}' for the period '{}' - '{}': {}",
            self.kind, self.id, self.requester, self.start_date, self.end_date, self.status
        )
    }
}

/// Validated attributes a draft finalises into. The only way to obtain one
/// is [`RequestDraft::build`], so the engine never sees unchecked input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAttributes {
    pub kind: RequestKind,
    pub description: String,
    pub start_date: LeaveDate,
    pub end_date: LeaveDate,
}

/// Builder for the user-supplied part of a request.
#[derive(Debug, Default, Clone)]
pub struct RequestDraft {
    kind: Option<RequestKind>,
    description: Option<String>,
    start_date: Option<LeaveDate>,
    end_date: Option<LeaveDate>,
}

impl RequestDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_kind(mut self, kind: RequestKind) -> Self {
        self.kind = Some(kind);
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
    pub fn set_start_date(mut self, date: LeaveDate) -> Self {
        self.start_date = Some(date);
        self
    }
    pub fn set_end_date(mut self, date: LeaveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Checks the draft against the boundary rules and finalises it into
    /// attributes the engine accepts. `today` pins the not-in-the-past
    /// check to the caller's clock.
    pub fn build(self, today: NaiveDate) -> Result<RequestAttributes, DraftError> {
        let kind = self.kind.ok_or(DraftError::MissingKind)?;
        let description = self.description.ok_or(DraftError::MissingDescription)?;
        if description.chars().count() < DESCRIPTION_MIN_LEN {
            return Err(DraftError::DescriptionTooShort(DESCRIPTION_MIN_LEN));
        }

        let start_date = self.start_date.ok_or(DraftError::MissingStartDate)?;
        let end_date = self.end_date.ok_or(DraftError::MissingEndDate)?;
        if start_date >= end_date {
            return Err(DraftError::DatesOutOfOrder);
        }
        if start_date.to_naive() <= today {
            return Err(DraftError::StartDateNotInFuture);
        }

        Ok(RequestAttributes {
            kind,
            description,
            start_date,
            end_date,
        })
    }
}
