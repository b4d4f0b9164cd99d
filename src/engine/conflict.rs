use chrono::NaiveDateTime;

use crate::model::{Booking, VisitKind};

use super::EngineError;

pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Re-validate a fully assembled booking against a fresh snapshot. This is
/// the commit-time check: the caller holds the commit lock and the snapshot
/// was read after acquiring it.
///
/// Checks in order: duplicate participant, then each visit in schedule order,
/// so the reported constraint is the earliest one violated.
pub(crate) fn check_no_conflict(
    snapshot: &[Booking],
    proposed: &Booking,
) -> Result<(), EngineError> {
    let active: Vec<&Booking> = snapshot.iter().filter(|b| b.is_active()).collect();

    if active
        .iter()
        .any(|b| b.participant_id == proposed.participant_id)
    {
        return Err(EngineError::DuplicateParticipant(
            proposed.participant_id.clone(),
        ));
    }

    for kind in VisitKind::ALL {
        let date = proposed.date_for(kind);
        let slot = proposed.slot_for(kind);
        if let Some(holder) = active
            .iter()
            .find(|b| b.date_for(kind) == date && b.slot_for(kind).conflicts_with(&slot))
        {
            tracing::debug!(
                participant = %proposed.participant_id,
                holder = %holder.participant_id,
                visit = %kind,
                %date,
                "slot conflict"
            );
            return Err(EngineError::SlotTaken { visit: kind, date, slot });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingStatus, Group, SlotLabel, TimeSlot};
    use crate::schedule::VisitSchedule;
    use chrono::{NaiveDate, NaiveTime};

    fn booking(pid: &str, anchor: NaiveDate, group: Group, pre_start: (u32, u32)) -> Booking {
        let schedule = VisitSchedule::derive(anchor, group);
        Booking {
            name: pid.to_string(),
            participant_id: pid.to_string(),
            email: format!("{pid}@example.org"),
            group,
            baseline_date: schedule.baseline,
            baseline_time: TimeSlot::Categorical(group.baseline_label()),
            pre_dosing_date: schedule.pre_dosing,
            pre_dosing_time: TimeSlot::ClockStart {
                start: NaiveTime::from_hms_opt(pre_start.0, pre_start.1, 0).unwrap(),
                duration_min: 300,
            },
            dosing_date: schedule.dosing,
            dosing_time: TimeSlot::WholeDay,
            follow_up_date: schedule.follow_up,
            follow_up_time: TimeSlot::ClockStart {
                start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                duration_min: 300,
            },
            status: BookingStatus::Active,
            notes: String::new(),
            booked_at: anchor.and_hms_opt(8, 0, 0).unwrap(),
            cancelled_at: None,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn duplicate_participant_reported_before_slots() {
        let existing = booking("P001", d(2025, 6, 4), Group::Wednesday, (9, 0));
        // Same participant, same anchor: every slot collides too, but the
        // duplicate check must win.
        let proposed = booking("P001", d(2025, 6, 4), Group::Wednesday, (9, 0));
        let err = check_no_conflict(&[existing], &proposed).unwrap_err();
        assert_eq!(err, EngineError::DuplicateParticipant("P001".into()));
    }

    #[test]
    fn same_anchor_reports_baseline_first() {
        let existing = booking("P001", d(2025, 6, 4), Group::Wednesday, (9, 0));
        let proposed = booking("P002", d(2025, 6, 4), Group::Wednesday, (17, 0));
        let err = check_no_conflict(&[existing], &proposed).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SlotTaken {
                visit: VisitKind::Baseline,
                ..
            }
        ));
    }

    #[test]
    fn cross_group_baselines_share_the_monday_without_conflict() {
        // Wed 2025-06-04 and Sat 2025-06-07 both derive baseline Monday
        // 2025-05-12, but carry different categorical labels.
        let existing = booking("P001", d(2025, 6, 4), Group::Wednesday, (9, 0));
        let proposed = booking("P002", d(2025, 6, 7), Group::Saturday, (9, 0));
        assert_eq!(existing.baseline_date, proposed.baseline_date);
        assert!(check_no_conflict(&[existing], &proposed).is_ok());
    }

    #[test]
    fn cancelled_rows_are_ignored() {
        let mut existing = booking("P001", d(2025, 6, 4), Group::Wednesday, (9, 0));
        existing.cancel("withdrew", d(2025, 5, 1).and_hms_opt(12, 0, 0).unwrap());
        let proposed = booking("P002", d(2025, 6, 4), Group::Wednesday, (9, 0));
        assert!(check_no_conflict(&[existing], &proposed).is_ok());
    }

    #[test]
    fn disjoint_schedules_pass() {
        let existing = booking("P001", d(2025, 6, 4), Group::Wednesday, (9, 0));
        let proposed = booking("P002", d(2025, 6, 11), Group::Wednesday, (9, 0));
        assert!(check_no_conflict(&[existing], &proposed).is_ok());
    }
}
