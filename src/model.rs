use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Minutes since midnight — the only intra-day time unit.
pub type Minutes = i32;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";
pub const CLOCK_FMT: &str = "%H:%M";

/// Storage field marking a visit that occupies the entire day.
pub const WHOLE_DAY_FIELD: &str = "All Day";

pub fn minute_of_day(t: NaiveTime) -> Minutes {
    (t.num_seconds_from_midnight() / 60) as Minutes
}

pub fn time_from_minute(m: Minutes) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(m as u32 * 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Half-open interval `[start, end)` in minutes-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn from_start(start: NaiveTime, duration_min: u32) -> Self {
        let m = minute_of_day(start);
        Self::new(m, m + duration_min as Minutes)
    }

    pub fn duration_min(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ── Cohorts ──────────────────────────────────────────────────────

/// Cohort selector. Each group binds the anchor (dosing) visit to a fixed
/// weekday and fixes the downstream weekday targets and baseline label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    Wednesday,
    Saturday,
}

impl Group {
    pub fn anchor_weekday(self) -> Weekday {
        match self {
            Group::Wednesday => Weekday::Wed,
            Group::Saturday => Weekday::Sat,
        }
    }

    /// Follow-up visits land on the day after the anchor weekday.
    pub fn follow_up_weekday(self) -> Weekday {
        match self {
            Group::Wednesday => Weekday::Thu,
            Group::Saturday => Weekday::Sun,
        }
    }

    pub fn baseline_label(self) -> SlotLabel {
        match self {
            Group::Wednesday => SlotLabel::Daytime,
            Group::Saturday => SlotLabel::Evening,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Group::Wednesday => "WEDNESDAY",
            Group::Saturday => "SATURDAY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WEDNESDAY" => Some(Group::Wednesday),
            "SATURDAY" => Some(Group::Saturday),
            _ => None,
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Visits ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisitKind {
    Baseline,
    PreDosing,
    Dosing,
    FollowUp,
}

impl VisitKind {
    pub const ALL: [VisitKind; 4] = [
        VisitKind::Baseline,
        VisitKind::PreDosing,
        VisitKind::Dosing,
        VisitKind::FollowUp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VisitKind::Baseline => "baseline",
            VisitKind::PreDosing => "pre-dosing",
            VisitKind::Dosing => "dosing",
            VisitKind::FollowUp => "follow-up",
        }
    }
}

impl std::fmt::Display for VisitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical slot labels. Two per date, mutually exclusive per (date, label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotLabel {
    Daytime,
    Evening,
}

impl SlotLabel {
    pub const ALL: [SlotLabel; 2] = [SlotLabel::Daytime, SlotLabel::Evening];

    pub fn as_str(self) -> &'static str {
        match self {
            SlotLabel::Daytime => "Daytime",
            SlotLabel::Evening => "Evening",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Daytime" => Some(SlotLabel::Daytime),
            "Evening" => Some(SlotLabel::Evening),
            _ => None,
        }
    }
}

// ── Time descriptors ─────────────────────────────────────────────

/// What a visit occupies on its date: a categorical label, a clock interval
/// of fixed duration, or the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSlot {
    Categorical(SlotLabel),
    ClockStart { start: NaiveTime, duration_min: u32 },
    WholeDay,
}

impl TimeSlot {
    pub fn span(&self) -> Option<Span> {
        match self {
            TimeSlot::ClockStart { start, duration_min } => {
                Some(Span::from_start(*start, *duration_min))
            }
            _ => None,
        }
    }

    /// Exclusivity between two descriptors on the same (date, visit kind):
    /// equal labels collide, clock intervals collide iff they overlap, and a
    /// whole-day descriptor collides with everything. Descriptors from
    /// different regimes (possible only across configuration changes) have no
    /// finer comparison and are treated as colliding.
    pub fn conflicts_with(&self, other: &TimeSlot) -> bool {
        match (self, other) {
            (TimeSlot::WholeDay, _) | (_, TimeSlot::WholeDay) => true,
            (TimeSlot::Categorical(a), TimeSlot::Categorical(b)) => a == b,
            (TimeSlot::ClockStart { .. }, TimeSlot::ClockStart { .. }) => {
                match (self.span(), other.span()) {
                    (Some(a), Some(b)) => a.overlaps(&b),
                    _ => true,
                }
            }
            _ => true,
        }
    }

    /// Storage-boundary form: `Daytime`, `Evening`, `HH:MM`, or `All Day`.
    pub fn to_field(&self) -> String {
        match self {
            TimeSlot::Categorical(label) => label.as_str().to_string(),
            TimeSlot::ClockStart { start, .. } => start.format(CLOCK_FMT).to_string(),
            TimeSlot::WholeDay => WHOLE_DAY_FIELD.to_string(),
        }
    }

    /// Parse a storage field. A bare `HH:MM` carries no duration, so the
    /// caller supplies the configured session length for the visit kind.
    pub fn parse_field(field: &str, clock_duration_min: u32) -> Result<Self, RecordError> {
        if field == WHOLE_DAY_FIELD {
            return Ok(TimeSlot::WholeDay);
        }
        if let Some(label) = SlotLabel::parse(field) {
            return Ok(TimeSlot::Categorical(label));
        }
        match NaiveTime::parse_from_str(field, CLOCK_FMT) {
            Ok(start) => Ok(TimeSlot::ClockStart {
                start,
                duration_min: clock_duration_min,
            }),
            Err(_) => Err(RecordError::new("time", field)),
        }
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_field())
    }
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Active,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Active => "Active",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(BookingStatus::Active),
            "Cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// One participant's full visit schedule and lifecycle state. Created
/// atomically at confirmation; transitions `Active → Cancelled` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub name: String,
    pub participant_id: String,
    pub email: String,
    pub group: Group,
    pub baseline_date: NaiveDate,
    pub baseline_time: TimeSlot,
    pub pre_dosing_date: NaiveDate,
    pub pre_dosing_time: TimeSlot,
    pub dosing_date: NaiveDate,
    pub dosing_time: TimeSlot,
    pub follow_up_date: NaiveDate,
    pub follow_up_time: TimeSlot,
    pub status: BookingStatus,
    pub notes: String,
    pub booked_at: NaiveDateTime,
    pub cancelled_at: Option<NaiveDateTime>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    pub fn date_for(&self, kind: VisitKind) -> NaiveDate {
        match kind {
            VisitKind::Baseline => self.baseline_date,
            VisitKind::PreDosing => self.pre_dosing_date,
            VisitKind::Dosing => self.dosing_date,
            VisitKind::FollowUp => self.follow_up_date,
        }
    }

    pub fn slot_for(&self, kind: VisitKind) -> TimeSlot {
        match kind {
            VisitKind::Baseline => self.baseline_time,
            VisitKind::PreDosing => self.pre_dosing_time,
            VisitKind::Dosing => self.dosing_time,
            VisitKind::FollowUp => self.follow_up_time,
        }
    }

    /// Apply the single allowed lifecycle transition. The reason is folded
    /// into `notes` (the record layout carries no separate reason column).
    pub fn cancel(&mut self, reason: &str, at: NaiveDateTime) {
        self.status = BookingStatus::Cancelled;
        self.notes = format!("Cancelled: {reason}");
        self.cancelled_at = Some(at);
    }
}

// ── Columnar record boundary ─────────────────────────────────────

/// Stable field order expected by any columnar export/import.
pub const RECORD_FIELDS: [&str; 16] = [
    "name",
    "participant_id",
    "email",
    "group",
    "baseline_date",
    "baseline_time",
    "pre_dosing_date",
    "pre_dosing_time",
    "dosing_date",
    "dosing_time",
    "follow_up_date",
    "follow_up_time",
    "booking_status",
    "notes",
    "booking_time",
    "cancellation_time",
];

/// Configured session lengths, needed to rehydrate bare `HH:MM` fields.
#[derive(Debug, Clone, Copy)]
pub struct SlotDurations {
    pub baseline_min: u32,
    pub pre_dosing_min: u32,
    pub follow_up_min: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub field: &'static str,
    pub value: String,
}

impl RecordError {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} field: {:?}", self.field, self.value)
    }
}

impl std::error::Error for RecordError {}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, RecordError> {
    NaiveDate::parse_from_str(value, DATE_FMT).map_err(|_| RecordError::new(field, value))
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, RecordError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FMT).map_err(|_| RecordError::new(field, value))
}

impl Booking {
    /// Serialize to the 16-column record layout, all fields as strings.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.participant_id.clone(),
            self.email.clone(),
            self.group.to_string(),
            self.baseline_date.format(DATE_FMT).to_string(),
            self.baseline_time.to_field(),
            self.pre_dosing_date.format(DATE_FMT).to_string(),
            self.pre_dosing_time.to_field(),
            self.dosing_date.format(DATE_FMT).to_string(),
            self.dosing_time.to_field(),
            self.follow_up_date.format(DATE_FMT).to_string(),
            self.follow_up_time.to_field(),
            self.status.as_str().to_string(),
            self.notes.clone(),
            self.booked_at.format(TIMESTAMP_FMT).to_string(),
            self.cancelled_at
                .map(|t| t.format(TIMESTAMP_FMT).to_string())
                .unwrap_or_default(),
        ]
    }

    pub fn from_row(row: &[String], durations: &SlotDurations) -> Result<Self, RecordError> {
        if row.len() != RECORD_FIELDS.len() {
            return Err(RecordError::new("row", &format!("{} fields", row.len())));
        }
        let group = Group::parse(&row[3]).ok_or_else(|| RecordError::new("group", &row[3]))?;
        let status = BookingStatus::parse(&row[12])
            .ok_or_else(|| RecordError::new("booking_status", &row[12]))?;
        let cancelled_at = if row[15].is_empty() {
            None
        } else {
            Some(parse_timestamp("cancellation_time", &row[15])?)
        };
        Ok(Self {
            name: row[0].clone(),
            participant_id: row[1].clone(),
            email: row[2].clone(),
            group,
            baseline_date: parse_date("baseline_date", &row[4])?,
            baseline_time: TimeSlot::parse_field(&row[5], durations.baseline_min)?,
            pre_dosing_date: parse_date("pre_dosing_date", &row[6])?,
            pre_dosing_time: TimeSlot::parse_field(&row[7], durations.pre_dosing_min)?,
            dosing_date: parse_date("dosing_date", &row[8])?,
            dosing_time: TimeSlot::parse_field(&row[9], durations.pre_dosing_min)?,
            follow_up_date: parse_date("follow_up_date", &row[10])?,
            follow_up_time: TimeSlot::parse_field(&row[11], durations.follow_up_min)?,
            status,
            notes: row[13].clone(),
            booked_at: parse_timestamp("booking_time", &row[14])?,
            cancelled_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_booking() -> Booking {
        Booking {
            name: "Ada Lovelace".into(),
            participant_id: "P001".into(),
            email: "ada@example.org".into(),
            group: Group::Wednesday,
            baseline_date: d(2025, 5, 12),
            baseline_time: TimeSlot::Categorical(SlotLabel::Daytime),
            pre_dosing_date: d(2025, 6, 3),
            pre_dosing_time: TimeSlot::ClockStart {
                start: t(9, 0),
                duration_min: 300,
            },
            dosing_date: d(2025, 6, 4),
            dosing_time: TimeSlot::WholeDay,
            follow_up_date: d(2025, 6, 19),
            follow_up_time: TimeSlot::ClockStart {
                start: t(13, 30),
                duration_min: 300,
            },
            status: BookingStatus::Active,
            notes: String::new(),
            booked_at: d(2025, 4, 1).and_hms_opt(10, 30, 0).unwrap(),
            cancelled_at: None,
        }
    }

    #[test]
    fn span_overlap_half_open() {
        let a = Span::new(12 * 60, 17 * 60);
        let b = Span::new(14 * 60, 19 * 60);
        let c = Span::new(17 * 60, 22 * 60);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn span_from_start() {
        let s = Span::from_start(t(9, 30), 300);
        assert_eq!(s.start, 9 * 60 + 30);
        assert_eq!(s.duration_min(), 300);
    }

    #[test]
    fn clock_slots_conflict_iff_intervals_overlap() {
        let noon = TimeSlot::ClockStart {
            start: t(12, 0),
            duration_min: 300,
        };
        let two = TimeSlot::ClockStart {
            start: t(14, 0),
            duration_min: 300,
        };
        let five = TimeSlot::ClockStart {
            start: t(17, 0),
            duration_min: 300,
        };
        assert!(noon.conflicts_with(&two));
        assert!(two.conflicts_with(&noon));
        assert!(!noon.conflicts_with(&five));
    }

    #[test]
    fn categorical_slots_conflict_on_equal_label() {
        let day = TimeSlot::Categorical(SlotLabel::Daytime);
        let eve = TimeSlot::Categorical(SlotLabel::Evening);
        assert!(day.conflicts_with(&day));
        assert!(!day.conflicts_with(&eve));
    }

    #[test]
    fn whole_day_conflicts_with_everything() {
        let all = TimeSlot::WholeDay;
        assert!(all.conflicts_with(&TimeSlot::WholeDay));
        assert!(all.conflicts_with(&TimeSlot::Categorical(SlotLabel::Evening)));
        assert!(
            TimeSlot::ClockStart {
                start: t(9, 0),
                duration_min: 60
            }
            .conflicts_with(&all)
        );
    }

    #[test]
    fn mixed_regimes_conflict() {
        let label = TimeSlot::Categorical(SlotLabel::Daytime);
        let clock = TimeSlot::ClockStart {
            start: t(9, 0),
            duration_min: 180,
        };
        assert!(label.conflicts_with(&clock));
        assert!(clock.conflicts_with(&label));
    }

    #[test]
    fn slot_field_round_trip() {
        let slots = [
            TimeSlot::Categorical(SlotLabel::Daytime),
            TimeSlot::Categorical(SlotLabel::Evening),
            TimeSlot::ClockStart {
                start: t(14, 30),
                duration_min: 300,
            },
            TimeSlot::WholeDay,
        ];
        for slot in slots {
            let parsed = TimeSlot::parse_field(&slot.to_field(), 300).unwrap();
            assert_eq!(parsed, slot);
        }
    }

    #[test]
    fn slot_field_rejects_garbage() {
        assert!(TimeSlot::parse_field("sometime", 300).is_err());
        assert!(TimeSlot::parse_field("25:00", 300).is_err());
    }

    #[test]
    fn group_bindings() {
        assert_eq!(Group::Wednesday.anchor_weekday(), Weekday::Wed);
        assert_eq!(Group::Wednesday.follow_up_weekday(), Weekday::Thu);
        assert_eq!(Group::Wednesday.baseline_label(), SlotLabel::Daytime);
        assert_eq!(Group::Saturday.anchor_weekday(), Weekday::Sat);
        assert_eq!(Group::Saturday.follow_up_weekday(), Weekday::Sun);
        assert_eq!(Group::Saturday.baseline_label(), SlotLabel::Evening);
        assert_eq!(Group::parse("WEDNESDAY"), Some(Group::Wednesday));
        assert_eq!(Group::parse("wednesday"), None);
    }

    #[test]
    fn cancel_transition() {
        let mut b = sample_booking();
        let at = d(2025, 5, 1).and_hms_opt(9, 0, 0).unwrap();
        b.cancel("participant withdrew", at);
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.notes, "Cancelled: participant withdrew");
        assert_eq!(b.cancelled_at, Some(at));
        assert!(!b.is_active());
    }

    #[test]
    fn record_row_round_trip() {
        let durations = SlotDurations {
            baseline_min: 180,
            pre_dosing_min: 300,
            follow_up_min: 300,
        };
        let booking = sample_booking();
        let row = booking.to_row();
        assert_eq!(row.len(), RECORD_FIELDS.len());
        assert_eq!(row[4], "2025-05-12");
        assert_eq!(row[5], "Daytime");
        assert_eq!(row[9], "All Day");
        assert_eq!(row[14], "2025-04-01 10:30:00");
        assert_eq!(row[15], "");

        let parsed = Booking::from_row(&row, &durations).unwrap();
        assert_eq!(parsed, booking);
    }

    #[test]
    fn record_row_round_trip_cancelled() {
        let durations = SlotDurations {
            baseline_min: 180,
            pre_dosing_min: 300,
            follow_up_min: 300,
        };
        let mut booking = sample_booking();
        booking.cancel("scheduling error", d(2025, 5, 2).and_hms_opt(16, 45, 10).unwrap());
        let row = booking.to_row();
        assert_eq!(row[12], "Cancelled");
        assert_eq!(row[15], "2025-05-02 16:45:10");
        let parsed = Booking::from_row(&row, &durations).unwrap();
        assert_eq!(parsed, booking);
    }

    #[test]
    fn record_row_wrong_width_rejected() {
        let durations = SlotDurations {
            baseline_min: 180,
            pre_dosing_min: 300,
            follow_up_min: 300,
        };
        let row = vec!["only".to_string(), "four".into(), "fields".into(), "here".into()];
        assert!(Booking::from_row(&row, &durations).is_err());
    }

    #[test]
    fn booking_serialization_round_trip() {
        let booking = sample_booking();
        let bytes = bincode::serialize(&booking).unwrap();
        let decoded: Booking = bincode::deserialize(&bytes).unwrap();
        assert_eq!(booking, decoded);
    }
}
