//! The persistence collaborator contract. The engine never talks to a
//! concrete backend; it is handed an `Arc<dyn BookingStore>` at construction.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::{Booking, BookingStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or written to. Retryable.
    Unavailable(String),
    /// The backend itself enforces exclusivity and rejected the write.
    Conflict(String),
    /// No matching `Active` record for a status update.
    NotFound(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Conflict(msg) => write!(f, "store rejected conflicting write: {msg}"),
            StoreError::NotFound(id) => write!(f, "no active record for participant: {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Narrow read/write contract over the durable booking record set.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// All records, active and cancelled, reflecting every commit prior to
    /// the call.
    async fn read_all(&self) -> Result<Vec<Booking>, StoreError>;

    /// Snapshot of active records at call time.
    async fn read_active(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(Booking::is_active)
            .collect())
    }

    /// Append one new record.
    async fn append(&self, booking: Booking) -> Result<(), StoreError>;

    /// Transition the participant's `Active` record to `status`, recording
    /// the reason and timestamp. Fails `NotFound` without a matching active
    /// record.
    async fn update_status(
        &self,
        participant_id: &str,
        status: BookingStatus,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<(), StoreError>;
}

/// Sheet-shaped in-memory store: an ordered row list plus an index of active
/// rows by participant id. The index lets `append` enforce the one-active-
/// booking-per-participant rule at the storage layer as well.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Booking>>,
    active_index: DashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from existing rows (e.g. a columnar import). Later rows win the
    /// active index, matching append order.
    pub fn with_rows(rows: Vec<Booking>) -> Self {
        let store = Self::new();
        for (idx, booking) in rows.iter().enumerate() {
            if booking.is_active() {
                store.active_index.insert(booking.participant_id.clone(), idx);
            }
        }
        *store.rows.try_write().expect("unshared at construction") = rows;
        store
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn append(&self, booking: Booking) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if booking.is_active() && self.active_index.contains_key(&booking.participant_id) {
            return Err(StoreError::Conflict(format!(
                "participant {} already has an active record",
                booking.participant_id
            )));
        }
        if booking.is_active() {
            self.active_index
                .insert(booking.participant_id.clone(), rows.len());
        }
        rows.push(booking);
        Ok(())
    }

    async fn update_status(
        &self,
        participant_id: &str,
        status: BookingStatus,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let idx = match self.active_index.get(participant_id) {
            Some(entry) => *entry.value(),
            None => return Err(StoreError::NotFound(participant_id.to_string())),
        };
        match status {
            BookingStatus::Cancelled => {
                rows[idx].cancel(reason, at);
                self.active_index.remove(participant_id);
            }
            BookingStatus::Active => rows[idx].status = BookingStatus::Active,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StudyConfig;
    use crate::model::{Group, SlotLabel, TimeSlot};
    use chrono::NaiveDate;

    fn booking(pid: &str) -> Booking {
        let anchor = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        let schedule = crate::schedule::VisitSchedule::derive(anchor, Group::Wednesday);
        Booking {
            name: format!("Participant {pid}"),
            participant_id: pid.to_string(),
            email: format!("{pid}@example.org"),
            group: Group::Wednesday,
            baseline_date: schedule.baseline,
            baseline_time: TimeSlot::Categorical(SlotLabel::Daytime),
            pre_dosing_date: schedule.pre_dosing,
            pre_dosing_time: TimeSlot::ClockStart {
                start: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                duration_min: 300,
            },
            dosing_date: schedule.dosing,
            dosing_time: TimeSlot::WholeDay,
            follow_up_date: schedule.follow_up,
            follow_up_time: TimeSlot::ClockStart {
                start: chrono::NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                duration_min: 300,
            },
            status: BookingStatus::Active,
            notes: String::new(),
            booked_at: anchor.and_hms_opt(8, 0, 0).unwrap(),
            cancelled_at: None,
        }
    }

    #[tokio::test]
    async fn append_and_read_back() {
        let store = MemoryStore::new();
        store.append(booking("P001")).await.unwrap();
        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].participant_id, "P001");
    }

    #[tokio::test]
    async fn duplicate_active_append_rejected() {
        let store = MemoryStore::new();
        store.append(booking("P001")).await.unwrap();
        let err = store.append(booking("P001")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn cancel_then_rebook_same_participant() {
        let store = MemoryStore::new();
        store.append(booking("P001")).await.unwrap();
        let at = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        store
            .update_status("P001", BookingStatus::Cancelled, "withdrew", at)
            .await
            .unwrap();

        let active = store.read_active().await.unwrap();
        assert!(active.is_empty());

        store.append(booking("P001")).await.unwrap();
        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, BookingStatus::Cancelled);
        assert_eq!(all[0].notes, "Cancelled: withdrew");
        assert_eq!(all[1].status, BookingStatus::Active);
    }

    #[tokio::test]
    async fn update_status_without_active_record_fails() {
        let store = MemoryStore::new();
        let at = NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let err = store
            .update_status("P404", BookingStatus::Cancelled, "typo", at)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("P404".into()));
    }

    #[tokio::test]
    async fn with_rows_round_trips_columnar_import() {
        let durations = StudyConfig::default().durations();
        let rows: Vec<Vec<String>> = vec![booking("P001").to_row(), booking("P002").to_row()];
        let bookings: Vec<Booking> = rows
            .iter()
            .map(|r| Booking::from_row(r, &durations).unwrap())
            .collect();
        let store = MemoryStore::with_rows(bookings);
        assert_eq!(store.read_active().await.unwrap().len(), 2);
    }
}
