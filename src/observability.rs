// Metric name constants, recorded through the `metrics` facade. Wiring an
// exporter is the embedding application's job.

/// Counter: bucket lookups answered from memory.
pub const CACHE_HITS_TOTAL: &str = "freebusy_cache_hits_total";

/// Counter: bucket lookups that had to consult the store.
pub const CACHE_MISSES_TOTAL: &str = "freebusy_cache_misses_total";

/// Counter: range loads issued against the store gateway.
pub const STORE_LOADS_TOTAL: &str = "freebusy_store_loads_total";

/// Histogram: store range-load latency in seconds.
pub const LOAD_DURATION_SECONDS: &str = "freebusy_load_duration_seconds";

/// Counter: successful cache mutations (book/reschedule/cancel). Labels: op.
pub const MUTATIONS_TOTAL: &str = "freebusy_mutations_total";

/// Counter: listeners that returned an error from notify.
pub const NOTIFY_FAILURES_TOTAL: &str = "freebusy_notify_failures_total";
