//! Concurrency smoke test: many tasks booking into the same bucket while
//! readers sweep the range. The cache must come out exactly-once and
//! ordered.

use std::collections::HashSet;
use std::sync::Arc;

use freebusy::{AppointmentDraft, MemoryStore, Scheduler, SchedulerConfig, Span};

const MINUTE: i64 = 60_000;
const HOUR: i64 = 60 * MINUTE;

const TASKS: i64 = 32;

#[tokio::test]
async fn concurrent_bookings_stay_consistent() {
    let mut config = SchedulerConfig::new(0);
    config.preload = 24 * HOUR;
    let scheduler = Scheduler::bootstrap(config, Arc::new(MemoryStore::new()))
        .await
        .unwrap();

    // All slots land in the [8:00, 10:00) bucket, spaced so no pair
    // overlaps even for the same employee.
    let mut writers = Vec::new();
    for n in 0..TASKS {
        let scheduler = scheduler.clone();
        writers.push(tokio::spawn(async move {
            let start = 8 * HOUR + n * 2 * MINUTE;
            scheduler
                .book(AppointmentDraft::new(start).with_duration(MINUTE))
                .await
                .unwrap()
                .id
        }));
    }
    let mut readers = Vec::new();
    for _ in 0..4 {
        let scheduler = scheduler.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..16 {
                let partial = scheduler
                    .appointments_in_range(Span::new(8 * HOUR, 10 * HOUR))
                    .await
                    .unwrap();
                // Whatever a reader sees mid-flight is ordered and unique.
                assert!(partial.windows(2).all(|p| p[0].start < p[1].start));
                let ids: HashSet<i64> = partial.iter().map(|a| a.id).collect();
                assert_eq!(ids.len(), partial.len());
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut ids = HashSet::new();
    for writer in writers {
        ids.insert(writer.await.unwrap());
    }
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(ids.len() as i64, TASKS);

    let booked = scheduler
        .appointments_in_range(Span::new(8 * HOUR, 10 * HOUR))
        .await
        .unwrap();
    assert_eq!(booked.len() as i64, TASKS);
    assert!(booked.windows(2).all(|p| p[0].start < p[1].start));
    assert!(booked.iter().all(|a| ids.contains(&a.id)));
    assert_eq!(scheduler.cached_len().await, TASKS as usize);
    assert_eq!(scheduler.max_seen_id(), *ids.iter().max().unwrap());
}
