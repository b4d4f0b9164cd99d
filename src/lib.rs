pub mod config;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod observability;
pub mod schedule;
pub mod store;

pub use config::{SlotPolicy, StudyConfig};
pub use engine::{BookingRequest, EngineError, ScheduleProposal, Scheduler};
pub use ledger::LedgerStore;
pub use model::{Booking, BookingStatus, Group, SlotLabel, TimeSlot, VisitKind};
pub use schedule::VisitSchedule;
pub use store::{BookingStore, MemoryStore, StoreError};
