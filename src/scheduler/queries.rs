use crate::model::*;

use super::{ScheduleError, Scheduler, now_ms};

/// Forward-only cursor over the buckets a query span touches. Lazy: each
/// bucket is fetched — and store-loaded if cold — only when the cursor
/// reaches it. Restart by constructing a new cursor via
/// [`Scheduler::iterate`].
pub struct RangeCursor<'a> {
    scheduler: &'a Scheduler,
    span: Span,
    next_bucket: i64,
    last_bucket: i64,
    pending: std::vec::IntoIter<Appointment>,
    exhausted: bool,
}

impl<'a> RangeCursor<'a> {
    fn new(scheduler: &'a Scheduler, span: Span) -> Self {
        let exhausted = span.start >= span.end;
        let first = scheduler.bucket_of(span.start);
        // Inclusive of the bucket containing `end`, so a bucket straddling
        // the boundary is still visited; the filter below trims the rest.
        let last = scheduler.bucket_of(span.end);
        Self {
            scheduler,
            span,
            next_bucket: first,
            last_bucket: last,
            pending: Vec::new().into_iter(),
            exhausted,
        }
    }

    /// Next appointment intersecting the span, in start order. `None` once
    /// the range is exhausted.
    pub async fn next(&mut self) -> Result<Option<Appointment>, ScheduleError> {
        loop {
            if let Some(appointment) = self.pending.next() {
                return Ok(Some(appointment));
            }
            if self.exhausted || self.next_bucket > self.last_bucket {
                self.exhausted = true;
                return Ok(None);
            }
            let index = self.next_bucket;
            self.next_bucket += 1;
            let span = self.span;
            let hits: Vec<Appointment> = self
                .scheduler
                .bucket(index)
                .await?
                .into_iter()
                .filter(|a| a.span().overlaps(&span))
                .collect();
            self.pending = hits.into_iter();
        }
    }
}

/// Gaps of at least `min_gap` between consecutive appointments, assumed
/// sorted by start.
///
/// With fewer than two qualifying appointments there is nothing to measure
/// between, so the result is the single fallback suggestion
/// `(now, default_duration)` — callers always get something actionable to
/// offer. Overlapping pairs produce a negative difference and are skipped.
pub fn gaps_between(
    appointments: &[Appointment],
    min_gap: Ms,
    now: Ms,
    default_duration: Ms,
) -> Vec<Gap> {
    if appointments.len() < 2 {
        return vec![Gap {
            start: now,
            length: default_duration,
        }];
    }
    let mut gaps = Vec::new();
    for pair in appointments.windows(2) {
        let length = pair[1].start - pair[0].end();
        if length >= min_gap {
            gaps.push(Gap {
                start: pair[0].end(),
                length,
            });
        }
    }
    gaps
}

impl Scheduler {
    /// Lazy cursor over appointments intersecting `span`, in start order.
    pub fn iterate(&self, span: Span) -> RangeCursor<'_> {
        RangeCursor::new(self, span)
    }

    /// Eagerly materialized, ordered list of appointments intersecting
    /// `span`. An empty range is an empty list, never an error.
    pub async fn appointments_in_range(
        &self,
        span: Span,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let mut cursor = self.iterate(span);
        let mut out = Vec::new();
        while let Some(appointment) = cursor.next().await? {
            out.push(appointment);
        }
        Ok(out)
    }

    /// Free stretches of at least `min_gap` between consecutive
    /// appointments in `span`. An appointment that starts before the span
    /// but reaches into it still counts as the previous boundary; see
    /// [`gaps_between`] for the fewer-than-two fallback.
    pub async fn free_gaps(&self, span: Span, min_gap: Ms) -> Result<Vec<Gap>, ScheduleError> {
        let appointments = self.appointments_in_range(span).await?;
        Ok(gaps_between(
            &appointments,
            min_gap,
            now_ms(),
            self.config.default_duration,
        ))
    }

    /// Exact-start lookup: the warm cache first, the store otherwise.
    pub async fn appointment_at(&self, start: Ms) -> Result<Option<Appointment>, ScheduleError> {
        {
            let cache = self.cache.read().await;
            let index = cache.bucket_of(start);
            if let Some(bucket) = cache.bucket_if_warm(index) {
                return Ok(bucket.into_iter().find(|a| a.start == start));
            }
        }
        Ok(self.store.find_by_date(start).await?)
    }

    /// Appointments starting within the configured alert lead of `now`
    /// whose reminder has not gone out yet. The notifier collaborator
    /// pairs this with [`Scheduler::mark_alerted`].
    pub async fn appointments_needing_alert(
        &self,
        now: Ms,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let horizon = Span::new(now, now + self.config.alert_lead);
        let upcoming = self.appointments_in_range(horizon).await?;
        Ok(upcoming
            .into_iter()
            .filter(|a| !a.is_alerted && a.start >= now)
            .collect())
    }

    // ── Customers — read straight from the store ────────────────────

    pub async fn customer(&self, id: CustomerId) -> Result<Option<Customer>, ScheduleError> {
        Ok(self.store.customer_by_id(id).await?)
    }

    /// Case/accent-insensitive search over customer names.
    pub async fn find_customers(&self, query: &str) -> Result<Vec<Customer>, ScheduleError> {
        let all = self.store.customers().await?;
        Ok(all.into_iter().filter(|c| c.matches(query)).collect())
    }
}
