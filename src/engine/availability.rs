use chrono::NaiveDate;

use crate::config::{SlotPolicy, StudyConfig};
use crate::model::{time_from_minute, Booking, Group, Minutes, SlotLabel, TimeSlot, VisitKind};

// ── Availability Algorithm ────────────────────────────────────────

/// All slot descriptors a visit kind offers, before any conflict filtering.
///
/// Categorical baseline slots are fixed per group (the group's own label
/// only); other categorical kinds offer both labels. Clock slots step across
/// the group's window; a start is generated only if the whole session fits.
pub fn slot_candidates(policy: &SlotPolicy, kind: VisitKind, group: Group) -> Vec<TimeSlot> {
    match policy {
        SlotPolicy::Categorical => match kind {
            VisitKind::Baseline => vec![TimeSlot::Categorical(group.baseline_label())],
            _ => SlotLabel::ALL.iter().map(|l| TimeSlot::Categorical(*l)).collect(),
        },
        SlotPolicy::Clock {
            duration_min,
            step_min,
            windows,
        } => {
            let window = windows.get(group).span();
            let mut slots = Vec::new();
            let mut start: Minutes = window.start;
            while start + *duration_min as Minutes <= window.end {
                slots.push(TimeSlot::ClockStart {
                    start: time_from_minute(start),
                    duration_min: *duration_min,
                });
                start += *step_min as Minutes;
            }
            slots
        }
    }
}

/// Whether a proposed (date, slot) pair for a visit kind is free against the
/// snapshot. Cancelled bookings never count. Zero remaining capacity is
/// reported as unavailable, never as an error.
pub fn is_available(
    snapshot: &[Booking],
    kind: VisitKind,
    date: NaiveDate,
    slot: &TimeSlot,
) -> bool {
    !snapshot.iter().any(|b| {
        b.is_active() && b.date_for(kind) == date && b.slot_for(kind).conflicts_with(slot)
    })
}

/// Free slots for a visit kind on a date, in candidate order. May be empty.
///
/// Dosing visits occupy the whole day and are never listed; asking for them
/// panics (`StudyConfig::policy`).
pub fn list_available_slots(
    snapshot: &[Booking],
    kind: VisitKind,
    group: Group,
    date: NaiveDate,
    config: &StudyConfig,
) -> Vec<TimeSlot> {
    slot_candidates(config.policy(kind), kind, group)
        .into_iter()
        .filter(|slot| is_available(snapshot, kind, date, slot))
        .collect()
}

/// Start-of-window helper for request validation: the offset of a clock
/// start within the group's window, if the session fits it at all.
pub(super) fn grid_offset(start: Minutes, window: crate::model::Span, duration_min: u32) -> Option<Minutes> {
    if start < window.start || start + duration_min as Minutes > window.end {
        return None;
    }
    Some(start - window.start)
}
