//! Date derivation: pure calendar arithmetic mapping an anchor (dosing) date
//! to the three dependent visit dates. No availability logic lives here, and
//! none of these functions validate the anchor's weekday; callers enforce
//! that precondition.

use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::model::{Group, VisitKind};

/// Every date in `[horizon_start, horizon_end]` on the group's anchor
/// weekday, minus dates already taken by an active booking. Chronological;
/// may be empty.
pub fn candidate_anchor_dates(
    group: Group,
    horizon_start: NaiveDate,
    horizon_end: NaiveDate,
    booked: &HashSet<NaiveDate>,
) -> Vec<NaiveDate> {
    if horizon_start > horizon_end {
        return Vec::new();
    }
    horizon_start
        .iter_days()
        .take_while(|d| *d <= horizon_end)
        .filter(|d| d.weekday() == group.anchor_weekday())
        .filter(|d| !booked.contains(d))
        .collect()
}

/// The day before the anchor. No weekday constraint.
pub fn pre_dosing_date(anchor: NaiveDate) -> NaiveDate {
    anchor - Days::new(1)
}

/// First date at or after `anchor + 14` on the group's follow-up weekday.
/// Lands within `[anchor + 14, anchor + 20]`.
pub fn follow_up_date(anchor: NaiveDate, group: Group) -> NaiveDate {
    let mut date = anchor + Days::new(14);
    while date.weekday() != group.follow_up_weekday() {
        date = date + Days::new(1);
    }
    date
}

/// First Monday at or before `anchor - 22`. Always at least 22 days out.
pub fn baseline_date(anchor: NaiveDate) -> NaiveDate {
    let mut date = anchor - Days::new(22);
    while date.weekday() != Weekday::Mon {
        date = date - Days::new(1);
    }
    date
}

/// The four visit dates derived from one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitSchedule {
    pub baseline: NaiveDate,
    pub pre_dosing: NaiveDate,
    pub dosing: NaiveDate,
    pub follow_up: NaiveDate,
}

impl VisitSchedule {
    pub fn derive(anchor: NaiveDate, group: Group) -> Self {
        Self {
            baseline: baseline_date(anchor),
            pre_dosing: pre_dosing_date(anchor),
            dosing: anchor,
            follow_up: follow_up_date(anchor, group),
        }
    }

    pub fn date_for(&self, kind: VisitKind) -> NaiveDate {
        match kind {
            VisitKind::Baseline => self.baseline,
            VisitKind::PreDosing => self.pre_dosing,
            VisitKind::Dosing => self.dosing,
            VisitKind::FollowUp => self.follow_up,
        }
    }
}
