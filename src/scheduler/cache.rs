use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{Appointment, AppointmentId, CustomerId, Ms, Span};

use super::ScheduleError;

/// Bucket index for a timestamp. Floor division, so times before the anchor
/// land in negative buckets instead of rounding toward zero. Callers that
/// align external timestamps to the cache's scheme must use this exact
/// function to avoid drift.
pub fn bucket_index(ts: Ms, anchor: Ms, period: Ms) -> i64 {
    (ts - anchor).div_euclid(period)
}

/// In-memory mirror of a bounded time window of appointments.
///
/// Appointments live in a flat arena keyed by id; buckets hold ids only.
/// Every mutation funnels through this type's methods, so there are no
/// aliased references into bucket lists to keep in sync.
///
/// Purely in-memory and non-blocking — the surrounding [`super::Scheduler`]
/// owns the store round-trips and the locking.
pub struct BucketCache {
    anchor: Ms,
    period: Ms,
    arena: HashMap<AppointmentId, Appointment>,
    /// Bucket index → ids, sorted by start. Only non-empty buckets have an
    /// entry; emptiness after a load is recorded in `warm` alone.
    buckets: BTreeMap<i64, Vec<AppointmentId>>,
    /// Reverse map; always agrees with bucket contents.
    bucket_of_id: HashMap<AppointmentId, i64>,
    /// Buckets whose span has been fetched from the store at least once.
    warm: HashSet<i64>,
    /// `[min_loaded, max_loaded)` bounds over everything ever loaded. The
    /// warm set is the precise per-bucket record; these are only bounds.
    window: Option<(Ms, Ms)>,
}

impl BucketCache {
    pub fn new(anchor: Ms, period: Ms) -> Result<Self, ScheduleError> {
        if period <= 0 {
            return Err(ScheduleError::Config("bucket period must be positive"));
        }
        Ok(Self {
            anchor,
            period,
            arena: HashMap::new(),
            buckets: BTreeMap::new(),
            bucket_of_id: HashMap::new(),
            warm: HashSet::new(),
            window: None,
        })
    }

    pub fn bucket_of(&self, ts: Ms) -> i64 {
        bucket_index(ts, self.anchor, self.period)
    }

    /// The half-open time span bucket `index` covers.
    pub fn bucket_span(&self, index: i64) -> Span {
        let start = self.anchor + index * self.period;
        Span::new(start, start + self.period)
    }

    pub fn is_warm(&self, index: i64) -> bool {
        self.warm.contains(&index)
    }

    pub fn window(&self) -> Option<(Ms, Ms)> {
        self.window
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: AppointmentId) -> bool {
        self.bucket_of_id.contains_key(&id)
    }

    pub fn appointment(&self, id: AppointmentId) -> Option<&Appointment> {
        self.arena.get(&id)
    }

    /// Bucket contents, sorted by start — `None` while the bucket is cold.
    /// A warm bucket with nothing in it answers `Some(vec![])` quickly; it
    /// is a valid empty result, not a miss.
    pub fn bucket_if_warm(&self, index: i64) -> Option<Vec<Appointment>> {
        if !self.warm.contains(&index) {
            return None;
        }
        let list = match self.buckets.get(&index) {
            Some(ids) => ids.iter().map(|id| self.arena[id].clone()).collect(),
            None => Vec::new(),
        };
        Some(list)
    }

    /// Insert under the bucket derived from `start`, keeping the bucket
    /// sorted. An id already cached is moved, not duplicated. Returns
    /// whether the bucket already existed, for diagnostics.
    pub fn add(&mut self, appointment: Appointment) -> bool {
        let id = appointment.id;
        if self.bucket_of_id.contains_key(&id) {
            self.remove(id);
        }
        let index = self.bucket_of(appointment.start);
        let start = appointment.start;
        let hit = self.buckets.contains_key(&index);
        self.arena.insert(id, appointment);
        let arena = &self.arena;
        let list = self.buckets.entry(index).or_default();
        let pos = list.partition_point(|other| arena[other].start <= start);
        list.insert(pos, id);
        self.bucket_of_id.insert(id, index);
        hit
    }

    /// Remove by id from its bucket and the reverse map. Returns false when
    /// the id is not cached — callers may race another deleter, so this is
    /// never an error.
    pub fn remove(&mut self, id: AppointmentId) -> bool {
        let Some(index) = self.bucket_of_id.remove(&id) else {
            return false;
        };
        if let Some(list) = self.buckets.get_mut(&index) {
            list.retain(|other| *other != id);
            if list.is_empty() {
                self.buckets.remove(&index);
            }
        }
        self.arena.remove(&id);
        true
    }

    /// Move an appointment to the bucket derived from its new start. The
    /// old bucket is resolved through the reverse map, so a caller holding
    /// a stale `start` cannot strand the entry. Returns false when the id
    /// was not cached.
    pub fn replace(&mut self, id: AppointmentId, updated: Appointment) -> bool {
        debug_assert_eq!(id, updated.id, "replace must keep the id");
        if !self.bucket_of_id.contains_key(&id) {
            return false;
        }
        self.remove(id);
        self.add(updated);
        true
    }

    /// Merge a store load result covering `span` (bucket-aligned). Rows
    /// already cached are skipped, so re-loading a range never duplicates
    /// entries; all covered buckets become warm and the window widens.
    pub fn absorb(&mut self, span: Span, rows: Vec<Appointment>) {
        for row in rows {
            if self.bucket_of_id.contains_key(&row.id) {
                continue;
            }
            self.add(row);
        }
        if span.start < span.end {
            let first = self.bucket_of(span.start);
            let last = self.bucket_of(span.end - 1);
            for index in first..=last {
                self.warm.insert(index);
            }
            self.window = Some(match self.window {
                Some((lo, hi)) => (lo.min(span.start), hi.max(span.end)),
                None => (span.start, span.end),
            });
        }
    }

    /// Clear the foreign reference on every cached appointment of a deleted
    /// customer. Returns how many entries changed.
    pub fn detach_customer(&mut self, customer_id: CustomerId) -> usize {
        let mut changed = 0;
        for appointment in self.arena.values_mut() {
            if appointment.customer_id == Some(customer_id) {
                appointment.customer_id = None;
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppointmentDraft, HOUR, MINUTE};

    const PERIOD: Ms = 2 * HOUR;

    fn cache() -> BucketCache {
        BucketCache::new(0, PERIOD).unwrap()
    }

    fn appt(id: AppointmentId, start: Ms) -> Appointment {
        Appointment::from_draft(id, &AppointmentDraft::new(start))
    }

    #[test]
    fn invalid_period_rejected() {
        assert!(matches!(
            BucketCache::new(0, 0),
            Err(ScheduleError::Config(_))
        ));
        assert!(BucketCache::new(0, -1).is_err());
    }

    #[test]
    fn bucket_index_floors_toward_negative_infinity() {
        assert_eq!(bucket_index(0, 0, PERIOD), 0);
        assert_eq!(bucket_index(PERIOD - 1, 0, PERIOD), 0);
        assert_eq!(bucket_index(PERIOD, 0, PERIOD), 1);
        assert_eq!(bucket_index(-1, 0, PERIOD), -1);
        assert_eq!(bucket_index(-PERIOD, 0, PERIOD), -1);
        assert_eq!(bucket_index(-PERIOD - 1, 0, PERIOD), -2);
        // Anchor offsets shift the grid, not the arithmetic.
        assert_eq!(bucket_index(9 * HOUR, 9 * HOUR, PERIOD), 0);
        assert_eq!(bucket_index(9 * HOUR - 1, 9 * HOUR, PERIOD), -1);
    }

    #[test]
    fn bucket_span_round_trips_index() {
        let c = cache();
        for index in [-3, -1, 0, 1, 7] {
            let span = c.bucket_span(index);
            assert_eq!(c.bucket_of(span.start), index);
            assert_eq!(c.bucket_of(span.end - 1), index);
            assert_eq!(c.bucket_of(span.end), index + 1);
        }
    }

    #[test]
    fn add_then_lookup_contains_exactly_once() {
        let mut c = cache();
        let a = appt(1, 9 * HOUR);
        c.add(a.clone());
        c.absorb(c.bucket_span(c.bucket_of(9 * HOUR)), vec![]);

        let bucket = c.bucket_if_warm(c.bucket_of(a.start)).unwrap();
        assert_eq!(bucket.iter().filter(|x| x.id == 1).count(), 1);
        assert_eq!(bucket[0], a);
    }

    #[test]
    fn add_reports_bucket_hit() {
        let mut c = cache();
        assert!(!c.add(appt(1, 9 * HOUR)));
        // Same bucket (9:00 and 9:30 both land in [8:00, 10:00)).
        assert!(c.add(appt(2, 9 * HOUR + 30 * MINUTE)));
        // Different bucket.
        assert!(!c.add(appt(3, 11 * HOUR)));
    }

    #[test]
    fn buckets_stay_sorted_by_start() {
        let mut c = cache();
        c.add(appt(1, 9 * HOUR + 30 * MINUTE));
        c.add(appt(2, 8 * HOUR + 10 * MINUTE));
        c.add(appt(3, 9 * HOUR));
        c.absorb(c.bucket_span(4), vec![]);

        let starts: Vec<Ms> = c
            .bucket_if_warm(4)
            .unwrap()
            .iter()
            .map(|a| a.start)
            .collect();
        assert_eq!(
            starts,
            vec![8 * HOUR + 10 * MINUTE, 9 * HOUR, 9 * HOUR + 30 * MINUTE]
        );
    }

    #[test]
    fn cold_bucket_is_a_miss_not_empty() {
        let c = cache();
        assert!(c.bucket_if_warm(0).is_none());
    }

    #[test]
    fn warm_empty_bucket_answers_empty() {
        let mut c = cache();
        c.absorb(c.bucket_span(0), vec![]);
        assert_eq!(c.bucket_if_warm(0), Some(vec![]));
    }

    #[test]
    fn add_remove_round_trip_restores_state() {
        let mut c = cache();
        c.add(appt(1, HOUR));
        let before_len = c.len();
        let before_bucket_exists = c.bucket_if_warm(0).is_some();

        c.add(appt(2, 9 * HOUR));
        assert!(c.contains(2));
        assert!(c.remove(2));

        assert_eq!(c.len(), before_len);
        assert!(!c.contains(2));
        assert_eq!(c.bucket_if_warm(0).is_some(), before_bucket_exists);
        // The bucket created for id 2 is gone again, not left empty.
        c.absorb(c.bucket_span(4), vec![]);
        assert_eq!(c.bucket_if_warm(4), Some(vec![]));
    }

    #[test]
    fn remove_absent_id_is_silent() {
        let mut c = cache();
        assert!(!c.remove(99));
    }

    #[test]
    fn replace_moves_across_buckets() {
        let mut c = cache();
        let old = appt(7, 9 * HOUR);
        c.add(old.clone());
        let old_ix = c.bucket_of(old.start);

        let mut updated = old.clone();
        updated.start = 15 * HOUR;
        assert!(c.replace(7, updated.clone()));

        c.absorb(c.bucket_span(old_ix), vec![]);
        let new_ix = c.bucket_of(updated.start);
        c.absorb(c.bucket_span(new_ix), vec![]);
        assert_ne!(old_ix, new_ix);

        assert!(c.bucket_if_warm(old_ix).unwrap().iter().all(|a| a.id != 7));
        let in_new: Vec<_> = c.bucket_if_warm(new_ix).unwrap();
        assert_eq!(in_new.len(), 1);
        assert_eq!(in_new[0], updated);
    }

    #[test]
    fn replace_uncached_returns_false() {
        let mut c = cache();
        assert!(!c.replace(5, appt(5, HOUR)));
    }

    #[test]
    fn re_adding_same_id_moves_instead_of_duplicating() {
        let mut c = cache();
        c.add(appt(1, 9 * HOUR));
        let mut moved = appt(1, 15 * HOUR);
        moved.is_alerted = true;
        c.add(moved);

        assert_eq!(c.len(), 1);
        let old_ix = c.bucket_of(9 * HOUR);
        c.absorb(c.bucket_span(old_ix), vec![]);
        assert_eq!(c.bucket_if_warm(old_ix), Some(vec![]));
    }

    #[test]
    fn absorb_twice_never_duplicates() {
        let mut c = cache();
        let span = Span::new(0, 2 * PERIOD);
        let rows = vec![appt(1, HOUR), appt(2, 3 * HOUR)];
        c.absorb(span, rows.clone());
        c.absorb(span, rows);

        assert_eq!(c.len(), 2);
        for index in 0..2 {
            let ids: Vec<AppointmentId> = c
                .bucket_if_warm(index)
                .unwrap()
                .iter()
                .map(|a| a.id)
                .collect();
            let mut dedup = ids.clone();
            dedup.dedup();
            assert_eq!(ids, dedup);
            assert_eq!(ids.len(), 1);
        }
    }

    #[test]
    fn absorb_widens_window_but_not_the_gap() {
        let mut c = cache();
        c.absorb(Span::new(0, PERIOD), vec![]);
        c.absorb(Span::new(10 * PERIOD, 11 * PERIOD), vec![]);

        assert_eq!(c.window(), Some((0, 11 * PERIOD)));
        assert!(c.is_warm(0));
        assert!(c.is_warm(10));
        // The never-loaded stretch between the two requests stays cold.
        assert!(!c.is_warm(5));
    }

    #[test]
    fn detach_customer_clears_references() {
        let mut c = cache();
        let mut a = appt(1, HOUR);
        a.customer_id = Some(40);
        let mut b = appt(2, 9 * HOUR);
        b.customer_id = Some(41);
        c.add(a);
        c.add(b);

        assert_eq!(c.detach_customer(40), 1);
        assert_eq!(c.appointment(1).unwrap().customer_id, None);
        assert_eq!(c.appointment(2).unwrap().customer_id, Some(41));
    }
}
