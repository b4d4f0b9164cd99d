use chrono::{NaiveDate, NaiveTime};

use crate::model::{minute_of_day, Group, SlotDurations, Span, VisitKind, DATE_FMT};

/// Allowed clock window for a visit. A start time is valid only if the whole
/// session fits: `start + duration <= close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Window {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        debug_assert!(open < close, "window must open before it closes");
        Self { open, close }
    }

    pub fn span(&self) -> Span {
        Span::new(minute_of_day(self.open), minute_of_day(self.close))
    }
}

/// One value per cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerGroup<T> {
    pub wednesday: T,
    pub saturday: T,
}

impl<T> PerGroup<T> {
    pub fn get(&self, group: Group) -> &T {
        match group {
            Group::Wednesday => &self.wednesday,
            Group::Saturday => &self.saturday,
        }
    }
}

impl<T: Clone> PerGroup<T> {
    pub fn uniform(value: T) -> Self {
        Self {
            wednesday: value.clone(),
            saturday: value,
        }
    }
}

/// How a visit kind's slots are described and contested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotPolicy {
    /// Fixed label set, exclusive per (date, label).
    Categorical,
    /// Start times on a fixed grid, exclusive against overlapping intervals.
    Clock {
        duration_min: u32,
        step_min: u32,
        windows: PerGroup<Window>,
    },
}

impl SlotPolicy {
    pub fn clock_duration(&self) -> Option<u32> {
        match self {
            SlotPolicy::Clock { duration_min, .. } => Some(*duration_min),
            SlotPolicy::Categorical => None,
        }
    }
}

/// Deployment-wide scheduling parameters. Constructed by the caller and
/// injected into the engine; nothing here is global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyConfig {
    pub horizon_start: NaiveDate,
    pub horizon_end: NaiveDate,
    pub baseline: SlotPolicy,
    pub pre_dosing: SlotPolicy,
    pub follow_up: SlotPolicy,
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

const SESSION_MIN: u32 = 300;
const BASELINE_SESSION_MIN: u32 = 180;
const SLOT_STEP_MIN: u32 = 30;

impl Default for StudyConfig {
    /// The original deployment: categorical baseline slots, five-hour
    /// pre-dosing/follow-up sessions starting every 30 minutes from 09:00
    /// with the last start at 17:00.
    fn default() -> Self {
        Self {
            horizon_start: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap_or_default(),
            horizon_end: NaiveDate::from_ymd_opt(2025, 11, 29).unwrap_or_default(),
            baseline: SlotPolicy::Categorical,
            pre_dosing: SlotPolicy::Clock {
                duration_min: SESSION_MIN,
                step_min: SLOT_STEP_MIN,
                windows: PerGroup::uniform(Window::new(t(9, 0), t(22, 0))),
            },
            follow_up: SlotPolicy::Clock {
                duration_min: SESSION_MIN,
                step_min: SLOT_STEP_MIN,
                windows: PerGroup::uniform(Window::new(t(9, 0), t(22, 0))),
            },
        }
    }
}

impl StudyConfig {
    /// Variant with clock-interval baseline sessions (three hours) in
    /// group-specific windows instead of the fixed Daytime/Evening labels.
    pub fn flexible_baseline() -> Self {
        Self {
            baseline: SlotPolicy::Clock {
                duration_min: BASELINE_SESSION_MIN,
                step_min: SLOT_STEP_MIN,
                windows: PerGroup {
                    wednesday: Window::new(t(9, 0), t(17, 0)),
                    saturday: Window::new(t(12, 0), t(20, 0)),
                },
            },
            ..Self::default()
        }
    }

    /// Defaults overridden by `VISITPLAN_HORIZON_START` / `VISITPLAN_HORIZON_END`
    /// (`YYYY-MM-DD`). Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(start) = env_date("VISITPLAN_HORIZON_START") {
            config.horizon_start = start;
        }
        if let Some(end) = env_date("VISITPLAN_HORIZON_END") {
            config.horizon_end = end;
        }
        config
    }

    /// Slot policy for a listable visit kind. Dosing visits occupy the whole
    /// day and are never listed; asking for their policy is a contract
    /// violation.
    pub fn policy(&self, kind: VisitKind) -> &SlotPolicy {
        match kind {
            VisitKind::Baseline => &self.baseline,
            VisitKind::PreDosing => &self.pre_dosing,
            VisitKind::FollowUp => &self.follow_up,
            VisitKind::Dosing => panic!("dosing visits are whole-day and carry no slot policy"),
        }
    }

    pub fn durations(&self) -> SlotDurations {
        SlotDurations {
            baseline_min: self.baseline.clock_duration().unwrap_or(BASELINE_SESSION_MIN),
            pre_dosing_min: self.pre_dosing.clock_duration().unwrap_or(SESSION_MIN),
            follow_up_min: self.follow_up.clock_duration().unwrap_or(SESSION_MIN),
        }
    }

    pub fn horizon_contains(&self, date: NaiveDate) -> bool {
        self.horizon_start <= date && date <= self.horizon_end
    }
}

fn env_date(var: &str) -> Option<NaiveDate> {
    std::env::var(var)
        .ok()
        .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok())
}
