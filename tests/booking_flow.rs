//! End-to-end booking flow against the public API: bootstrap over a
//! memory store, mutate through the scheduler, and watch change
//! notifications arrive.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use freebusy::{
    AppointmentDraft, CacheListener, CustomerDraft, Gap, MemoryStore, Scheduler, SchedulerConfig,
    Span,
};

const MINUTE: i64 = 60_000;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

struct CountingListener {
    fired: AtomicUsize,
}

impl CacheListener for CountingListener {
    fn on_change(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.fired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingListener;

impl CacheListener for FailingListener {
    fn on_change(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("listener went away".into())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn boot() -> Arc<Scheduler> {
    let mut config = SchedulerConfig::new(0);
    config.preload = DAY;
    Scheduler::bootstrap(config, Arc::new(MemoryStore::new()))
        .await
        .expect("bootstrap over an empty store")
}

#[tokio::test]
async fn mutations_notify_subscribers() {
    init_tracing();
    let scheduler = boot().await;
    let listener = Arc::new(CountingListener {
        fired: AtomicUsize::new(0),
    });
    let subscription = scheduler.subscribe(listener.clone());
    // A broken subscriber must not mute the healthy one.
    scheduler.subscribe(Arc::new(FailingListener));

    let booked = scheduler
        .book(AppointmentDraft::new(9 * HOUR))
        .await
        .unwrap();
    assert_eq!(listener.fired.load(Ordering::SeqCst), 1);

    let mut moved = booked.clone();
    moved.start = 11 * HOUR;
    scheduler.reschedule(booked.id, moved).await.unwrap();
    assert_eq!(listener.fired.load(Ordering::SeqCst), 2);

    scheduler.cancel(booked.id).await.unwrap();
    assert_eq!(listener.fired.load(Ordering::SeqCst), 3);

    assert!(scheduler.unsubscribe(subscription));
    scheduler
        .book(AppointmentDraft::new(14 * HOUR))
        .await
        .unwrap();
    assert_eq!(listener.fired.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn day_of_bookings_and_gap_search() {
    init_tracing();
    let scheduler = boot().await;

    for start in [9 * HOUR, 10 * HOUR, 11 * HOUR + 30 * MINUTE] {
        scheduler
            .book(AppointmentDraft::new(start).with_duration(30 * MINUTE))
            .await
            .unwrap();
    }

    let day = Span::new(8 * HOUR, 18 * HOUR);
    let booked = scheduler.appointments_in_range(day).await.unwrap();
    assert_eq!(booked.len(), 3);
    assert!(booked.windows(2).all(|p| p[0].start < p[1].start));

    let gaps = scheduler
        .free_gaps(Span::new(9 * HOUR, 12 * HOUR), 30 * MINUTE)
        .await
        .unwrap();
    assert_eq!(
        gaps,
        vec![
            Gap {
                start: 9 * HOUR + 30 * MINUTE,
                length: 30 * MINUTE
            },
            Gap {
                start: 10 * HOUR + 30 * MINUTE,
                length: HOUR
            },
        ]
    );
}

#[tokio::test]
async fn customer_lifecycle_through_the_scheduler() {
    init_tracing();
    let scheduler = boot().await;

    let customer = scheduler
        .create_customer(CustomerDraft::new("Jürgen", "Müller"))
        .await
        .unwrap();
    let appointment = scheduler
        .book(AppointmentDraft::new(10 * HOUR).with_customer(customer.id))
        .await
        .unwrap();
    assert_eq!(appointment.customer_id, Some(customer.id));

    let hits = scheduler.find_customers("muller").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, customer.id);

    scheduler.delete_customer(customer.id).await.unwrap();
    let detached = scheduler
        .appointment_at(10 * HOUR)
        .await
        .unwrap()
        .expect("appointment survives its customer");
    assert_eq!(detached.customer_id, None);
}
