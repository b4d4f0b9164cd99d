use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::{Booking, Group, TimeSlot, VisitKind};
use crate::schedule::{self, VisitSchedule};

use super::availability::{is_available, list_available_slots};
use super::{EngineError, ScheduleProposal, Scheduler};

impl Scheduler {
    /// Anchor dates still open for the group: every date on its dosing
    /// weekday within the horizon, minus dates already held by an active
    /// booking. Chronological; may be empty.
    pub async fn open_anchor_dates(&self, group: Group) -> Result<Vec<NaiveDate>, EngineError> {
        let snapshot = self.store.read_active().await?;
        let booked: HashSet<NaiveDate> = snapshot.iter().map(|b| b.dosing_date).collect();
        Ok(schedule::candidate_anchor_dates(
            group,
            self.config.horizon_start,
            self.config.horizon_end,
            &booked,
        ))
    }

    /// Derive the full schedule for an anchor and report what is still free,
    /// all from one snapshot. Read-only: the result can go stale, which is
    /// why `book` re-validates under the commit lock.
    pub async fn propose(
        &self,
        group: Group,
        anchor: NaiveDate,
    ) -> Result<ScheduleProposal, EngineError> {
        self.validate_anchor(group, anchor)?;
        let dates = VisitSchedule::derive(anchor, group);
        let snapshot = self.store.read_active().await?;

        if !is_available(&snapshot, VisitKind::Dosing, anchor, &TimeSlot::WholeDay) {
            return Err(EngineError::SlotTaken {
                visit: VisitKind::Dosing,
                date: anchor,
                slot: TimeSlot::WholeDay,
            });
        }

        Ok(ScheduleProposal {
            group,
            dates,
            baseline_options: list_available_slots(
                &snapshot,
                VisitKind::Baseline,
                group,
                dates.baseline,
                &self.config,
            ),
            pre_dosing_options: list_available_slots(
                &snapshot,
                VisitKind::PreDosing,
                group,
                dates.pre_dosing,
                &self.config,
            ),
            follow_up_options: list_available_slots(
                &snapshot,
                VisitKind::FollowUp,
                group,
                dates.follow_up,
                &self.config,
            ),
        })
    }

    pub async fn active_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self.store.read_active().await?)
    }

    /// The participant's most recent booking, active or cancelled.
    pub async fn booking_for(
        &self,
        participant_id: &str,
    ) -> Result<Option<Booking>, EngineError> {
        Ok(self
            .store
            .read_all()
            .await?
            .into_iter()
            .filter(|b| b.participant_id == participant_id)
            .next_back())
    }

    /// Every record in the stable 16-column layout, append order preserved.
    pub async fn export_rows(&self) -> Result<Vec<Vec<String>>, EngineError> {
        Ok(self
            .store
            .read_all()
            .await?
            .iter()
            .map(Booking::to_row)
            .collect())
    }
}
