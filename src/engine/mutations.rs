use chrono::Datelike;
use tracing::{info, warn};

use crate::config::SlotPolicy;
use crate::model::{minute_of_day, Booking, BookingStatus, Group, Minutes, TimeSlot, VisitKind};
use crate::observability;
use crate::schedule::VisitSchedule;
use crate::store::StoreError;

use super::availability::grid_offset;
use super::conflict::{check_no_conflict, now};
use super::{BookingRequest, EngineError, Scheduler};

impl Scheduler {
    /// Confirm a booking. Validates the request, derives the dependent
    /// dates, then runs the commit protocol: under the commit lock, re-read
    /// a fresh snapshot, re-check every exclusivity rule, and only then
    /// append. A proposal that looked free when presented can still lose the
    /// race here and is rejected with the violated constraint.
    pub async fn book(&self, request: BookingRequest) -> Result<Booking, EngineError> {
        self.validate_anchor(request.group, request.dosing_date)?;
        let dates = VisitSchedule::derive(request.dosing_date, request.group);
        let booking = self.assemble(&request, dates)?;

        let _guard = self.commit_lock.lock().await;
        let check_started = std::time::Instant::now();
        let snapshot = self.store.read_active().await?;
        let checked = check_no_conflict(&snapshot, &booking);
        metrics::histogram!(observability::COMMIT_CHECK_DURATION_SECONDS)
            .record(check_started.elapsed().as_secs_f64());

        if let Err(e) = checked {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            warn!(participant = %booking.participant_id, "booking rejected: {e}");
            return Err(e);
        }

        if let Err(e) = self.store.append(booking.clone()).await {
            if matches!(e, StoreError::Conflict(_)) {
                metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            }
            warn!(participant = %booking.participant_id, "booking append failed: {e}");
            return Err(e.into());
        }

        metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
        info!(
            participant = %booking.participant_id,
            group = %booking.group,
            dosing = %booking.dosing_date,
            "booking confirmed"
        );
        Ok(booking)
    }

    /// Cancel the participant's active booking, recording the reason and
    /// timestamp. Exactly one `Active → Cancelled` transition; repeating it
    /// fails `AlreadyCancelled` without touching the store.
    pub async fn cancel(&self, participant_id: &str, reason: &str) -> Result<(), EngineError> {
        let _guard = self.commit_lock.lock().await;
        let rows = self.store.read_all().await?;

        let mut seen = false;
        let mut has_active = false;
        for b in rows.iter().filter(|b| b.participant_id == participant_id) {
            seen = true;
            has_active |= b.is_active();
        }
        if !seen {
            return Err(EngineError::NotFound(participant_id.to_string()));
        }
        if !has_active {
            return Err(EngineError::AlreadyCancelled(participant_id.to_string()));
        }

        self.store
            .update_status(participant_id, BookingStatus::Cancelled, reason, now())
            .await?;
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        info!(participant = %participant_id, reason, "booking cancelled");
        Ok(())
    }

    pub(super) fn validate_anchor(
        &self,
        group: Group,
        anchor: chrono::NaiveDate,
    ) -> Result<(), EngineError> {
        if anchor.weekday() != group.anchor_weekday() {
            return Err(EngineError::InvalidAnchor {
                date: anchor,
                expected: group.anchor_weekday(),
            });
        }
        if !self.config.horizon_contains(anchor) {
            return Err(EngineError::OutsideHorizon { date: anchor });
        }
        Ok(())
    }

    /// Check a caller-chosen descriptor against the policy configured for
    /// the visit kind: matching regime, matching session duration, session
    /// fits the group's window, start on the grid.
    fn validate_slot(
        &self,
        kind: VisitKind,
        group: Group,
        slot: &TimeSlot,
    ) -> Result<(), EngineError> {
        match (self.config.policy(kind), slot) {
            (SlotPolicy::Categorical, TimeSlot::Categorical(label)) => {
                if kind == VisitKind::Baseline && *label != group.baseline_label() {
                    return Err(EngineError::InvalidSlot {
                        visit: kind,
                        reason: "label is not assigned to this group",
                    });
                }
                Ok(())
            }
            (
                SlotPolicy::Clock {
                    duration_min,
                    step_min,
                    windows,
                },
                TimeSlot::ClockStart {
                    start,
                    duration_min: requested,
                },
            ) => {
                if requested != duration_min {
                    return Err(EngineError::InvalidSlot {
                        visit: kind,
                        reason: "session duration does not match the configured policy",
                    });
                }
                let window = windows.get(group).span();
                let offset = grid_offset(minute_of_day(*start), window, *duration_min).ok_or(
                    EngineError::InvalidSlot {
                        visit: kind,
                        reason: "session does not fit the allowed window",
                    },
                )?;
                if offset % *step_min as Minutes != 0 {
                    return Err(EngineError::InvalidSlot {
                        visit: kind,
                        reason: "start time is not on the slot grid",
                    });
                }
                Ok(())
            }
            _ => Err(EngineError::InvalidSlot {
                visit: kind,
                reason: "descriptor kind does not match the configured slot policy",
            }),
        }
    }

    fn assemble(
        &self,
        request: &BookingRequest,
        dates: VisitSchedule,
    ) -> Result<Booking, EngineError> {
        let baseline_time = match (&self.config.baseline, request.baseline) {
            (SlotPolicy::Categorical, None) => {
                TimeSlot::Categorical(request.group.baseline_label())
            }
            (SlotPolicy::Clock { .. }, None) => {
                return Err(EngineError::InvalidSlot {
                    visit: VisitKind::Baseline,
                    reason: "a start time is required for the baseline session",
                });
            }
            (_, Some(slot)) => {
                self.validate_slot(VisitKind::Baseline, request.group, &slot)?;
                slot
            }
        };
        self.validate_slot(VisitKind::PreDosing, request.group, &request.pre_dosing)?;
        self.validate_slot(VisitKind::FollowUp, request.group, &request.follow_up)?;

        Ok(Booking {
            name: request.name.clone(),
            participant_id: request.participant_id.clone(),
            email: request.email.clone(),
            group: request.group,
            baseline_date: dates.baseline,
            baseline_time,
            pre_dosing_date: dates.pre_dosing,
            pre_dosing_time: request.pre_dosing,
            dosing_date: dates.dosing,
            dosing_time: TimeSlot::WholeDay,
            follow_up_date: dates.follow_up,
            follow_up_time: request.follow_up,
            status: BookingStatus::Active,
            notes: request.notes.clone(),
            booked_at: now(),
            cancelled_at: None,
        })
    }
}
