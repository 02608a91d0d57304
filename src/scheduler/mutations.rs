use tracing::{error, info};

use crate::model::*;
use crate::observability;

use super::{ScheduleError, Scheduler};

impl Scheduler {
    /// Persist a new appointment and mirror it into the cache.
    ///
    /// The same-employee overlap guard runs against the store, not just the
    /// warm window, so a conflict outside the cache is still caught. After
    /// the insert the row is read back under its assigned id; a store that
    /// claims success but cannot serve the row has diverged and the error
    /// says so loudly.
    pub async fn book(&self, draft: AppointmentDraft) -> Result<Appointment, ScheduleError> {
        if draft.duration < 0 {
            return Err(ScheduleError::Invalid("duration must be non-negative"));
        }

        let mut cache = self.cache.write().await;

        let neighbours = self.store.find_in_range(draft.span()).await?;
        if let Some(existing) = neighbours
            .iter()
            .find(|a| a.employee_id == draft.employee_id && a.span().overlaps(&draft.span()))
        {
            return Err(ScheduleError::Overlap {
                existing: existing.id,
                span: draft.span(),
            });
        }

        let id = self.store.insert(&draft).await?;
        let persisted = match self.store.find_by_id(id).await? {
            Some(row) => row,
            None => {
                error!(id, "store assigned an id but cannot serve the row back");
                return Err(ScheduleError::Inconsistent(format!(
                    "inserted appointment {id} not readable back"
                )));
            }
        };

        let hit = cache.add(persisted.clone());
        self.record_assigned_id(id);
        drop(cache);

        metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "book").increment(1);
        info!(id, start = persisted.start, bucket_hit = hit, "booked appointment");
        self.subscribers.notify_all();
        Ok(persisted)
    }

    /// Edit or move an existing appointment, in the store and in the cache.
    /// The cache resolves the old bucket through its reverse map, so a
    /// stale `start` in the caller's copy cannot strand the entry.
    pub async fn reschedule(
        &self,
        id: AppointmentId,
        updated: Appointment,
    ) -> Result<(), ScheduleError> {
        if updated.id != id {
            return Err(ScheduleError::Invalid("appointment id mismatch"));
        }
        if updated.duration < 0 {
            return Err(ScheduleError::Invalid("duration must be non-negative"));
        }

        let mut cache = self.cache.write().await;

        let neighbours = self.store.find_in_range(updated.span()).await?;
        if let Some(existing) = neighbours
            .iter()
            .find(|a| a.id != id && a.employee_id == updated.employee_id && a.span().overlaps(&updated.span()))
        {
            return Err(ScheduleError::Overlap {
                existing: existing.id,
                span: updated.span(),
            });
        }

        self.store.update(id, &updated).await?;
        if !cache.replace(id, updated.clone()) {
            // The row was outside the warm window; adopt it now.
            cache.add(updated.clone());
        }
        drop(cache);

        metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "reschedule").increment(1);
        info!(id, start = updated.start, "rescheduled appointment");
        self.subscribers.notify_all();
        Ok(())
    }

    /// Delete from the store and the cache. A store miss reports
    /// `NotFound`; an id the cache never saw is not an error at the cache
    /// layer.
    pub async fn cancel(&self, id: AppointmentId) -> Result<(), ScheduleError> {
        let mut cache = self.cache.write().await;
        self.store.delete(id).await?;
        let was_cached = cache.remove(id);
        drop(cache);

        metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "cancel").increment(1);
        info!(id, was_cached, "cancelled appointment");
        self.subscribers.notify_all();
        Ok(())
    }

    /// Flag a reminder as sent so the notifier never sends it twice.
    pub async fn mark_alerted(&self, id: AppointmentId) -> Result<(), ScheduleError> {
        let mut cache = self.cache.write().await;
        let mut row = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(ScheduleError::NotFound(id))?;
        if row.is_alerted {
            return Ok(());
        }
        row.is_alerted = true;
        self.store.update(id, &row).await?;
        if !cache.replace(id, row.clone()) {
            cache.add(row);
        }
        drop(cache);

        metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "mark_alerted").increment(1);
        self.subscribers.notify_all();
        Ok(())
    }

    // ── Customers — never cached, straight through to the store ─────

    pub async fn create_customer(&self, draft: CustomerDraft) -> Result<Customer, ScheduleError> {
        if draft.name.trim().is_empty() {
            return Err(ScheduleError::Invalid("customer name must not be empty"));
        }
        let id = self.store.insert_customer(&draft).await?;
        let customer = self.store.customer_by_id(id).await?.ok_or_else(|| {
            error!(id, "store assigned a customer id but cannot serve the row back");
            ScheduleError::Inconsistent(format!("inserted customer {id} not readable back"))
        })?;
        info!(id, "created customer");
        Ok(customer)
    }

    pub async fn update_customer(
        &self,
        id: CustomerId,
        customer: &Customer,
    ) -> Result<(), ScheduleError> {
        if customer.name.trim().is_empty() {
            return Err(ScheduleError::Invalid("customer name must not be empty"));
        }
        self.store.update_customer(id, customer).await?;
        Ok(())
    }

    /// Deleting a customer never cascades to appointments: every
    /// appointment referencing it keeps existing with the reference
    /// cleared, in the store and in any cached copy.
    pub async fn delete_customer(&self, id: CustomerId) -> Result<(), ScheduleError> {
        let mut cache = self.cache.write().await;
        let orphaned = self.store.appointments_for_customer(id).await?;
        // Detach before deleting the customer row: a failure mid-loop
        // leaves the customer in place and the operation retryable, never
        // appointments dangling on a deleted row.
        for mut appointment in orphaned {
            appointment.customer_id = None;
            self.store.update(appointment.id, &appointment).await?;
        }
        self.store.delete_customer(id).await?;
        let detached = cache.detach_customer(id);
        drop(cache);

        info!(id, detached, "deleted customer");
        if detached > 0 {
            self.subscribers.notify_all();
        }
        Ok(())
    }
}
