use chrono::{NaiveDate, Weekday};

use crate::model::{TimeSlot, VisitKind};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The chosen anchor date does not fall on the group's dosing weekday.
    InvalidAnchor { date: NaiveDate, expected: Weekday },
    /// The chosen anchor date falls outside the booking horizon.
    OutsideHorizon { date: NaiveDate },
    /// A requested slot descriptor does not satisfy the configured policy.
    InvalidSlot {
        visit: VisitKind,
        reason: &'static str,
    },
    /// The participant already holds an active booking.
    DuplicateParticipant(String),
    /// The slot is occupied by another active booking.
    SlotTaken {
        visit: VisitKind,
        date: NaiveDate,
        slot: TimeSlot,
    },
    /// Cancellation target has no booking at all.
    NotFound(String),
    /// Cancellation target exists but was already cancelled.
    AlreadyCancelled(String),
    Store(StoreError),
}

impl EngineError {
    /// True for rejections where picking a different slot can help, as
    /// opposed to store failures where retrying the same request can.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateParticipant(_)
                | EngineError::SlotTaken { .. }
                | EngineError::Store(StoreError::Conflict(_))
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidAnchor { date, expected } => {
                write!(f, "anchor date {date} is not a {expected}")
            }
            EngineError::OutsideHorizon { date } => {
                write!(f, "anchor date {date} is outside the booking horizon")
            }
            EngineError::InvalidSlot { visit, reason } => {
                write!(f, "invalid {visit} slot: {reason}")
            }
            EngineError::DuplicateParticipant(id) => {
                write!(f, "participant {id} already has an active booking")
            }
            EngineError::SlotTaken { visit, date, slot } => {
                write!(f, "{visit} slot {slot} on {date} is already booked")
            }
            EngineError::NotFound(id) => write!(f, "no booking found for participant: {id}"),
            EngineError::AlreadyCancelled(id) => {
                write!(f, "booking for participant {id} is already cancelled")
            }
            EngineError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}
