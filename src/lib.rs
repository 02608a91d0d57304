//! freebusy — an in-memory, time-bucketed appointment cache.
//!
//! The [`scheduler::Scheduler`] sits in front of a persistent store (any
//! [`store::StoreGateway`]) and keeps a bounded time window of appointments
//! indexed into fixed-width buckets: range queries and free-gap discovery
//! run from memory, cold buckets are loaded lazily, and every successful
//! mutation notifies the in-process [`notify::SubscriberRegistry`].
//!
//! GUI, HTTP and mail layers are callers of this crate, not part of it.

pub mod config;
pub mod model;
pub mod notify;
pub mod observability;
pub mod scheduler;
pub mod store;

pub use config::SchedulerConfig;
pub use model::{
    Appointment, AppointmentDraft, AppointmentId, Customer, CustomerDraft, CustomerId, Gap, Ms,
    Span,
};
pub use notify::{CacheListener, SubscriberRegistry, SubscriptionId};
pub use scheduler::{RangeCursor, ScheduleError, Scheduler, bucket_index, gaps_between};
pub use store::{MemoryStore, StoreError, StoreGateway};
