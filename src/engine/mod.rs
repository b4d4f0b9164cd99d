mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{is_available, list_available_slots, slot_candidates};
pub use error::EngineError;

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::config::StudyConfig;
use crate::model::{Group, TimeSlot};
use crate::schedule::VisitSchedule;
use crate::store::BookingStore;

/// Everything the caller supplies to confirm a booking. Dates beyond the
/// anchor are derived, never taken from the caller; the dosing slot is
/// always the whole day.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub name: String,
    pub participant_id: String,
    pub email: String,
    pub group: Group,
    /// Anchor date; must fall on the group's dosing weekday, inside the
    /// booking horizon.
    pub dosing_date: NaiveDate,
    /// Required when the baseline policy is clock-interval; under the
    /// categorical policy the group's label is assigned automatically.
    pub baseline: Option<TimeSlot>,
    pub pre_dosing: TimeSlot,
    pub follow_up: TimeSlot,
    pub notes: String,
}

/// A derived schedule plus the slots still open for each choosable visit,
/// computed from one snapshot. Presented to the participant before `book`.
#[derive(Debug, Clone)]
pub struct ScheduleProposal {
    pub group: Group,
    pub dates: VisitSchedule,
    pub baseline_options: Vec<TimeSlot>,
    pub pre_dosing_options: Vec<TimeSlot>,
    pub follow_up_options: Vec<TimeSlot>,
}

impl ScheduleProposal {
    /// False as soon as any visit has no remaining slot; the caller should
    /// offer a different anchor date.
    pub fn bookable(&self) -> bool {
        !self.baseline_options.is_empty()
            && !self.pre_dosing_options.is_empty()
            && !self.follow_up_options.is_empty()
    }
}

/// The scheduling engine. Holds no booking state of its own: every decision
/// is computed against a snapshot read from the injected store, and the
/// read-check-write sequence of `book`/`cancel` runs under `commit_lock` so
/// that two racing commits can never both pass re-validation.
pub struct Scheduler {
    store: Arc<dyn BookingStore>,
    config: StudyConfig,
    commit_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn BookingStore>, config: StudyConfig) -> Self {
        Self {
            store,
            config,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }
}
