use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::*;

/// Failures reported by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row with this id. An ordinary outcome for update/delete.
    NotFound(i64),
    /// A uniqueness or validity constraint was violated.
    Constraint(String),
    /// The round-trip to the store failed.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Constraint(msg) => write!(f, "constraint violated: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The narrow contract the cache consumes. Implementations own the actual
/// connection; the cache never assumes exclusive access to the underlying
/// store and never retries on its own.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    async fn find_by_id(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError>;

    /// Exact match on `start`.
    async fn find_by_date(&self, start: Ms) -> Result<Option<Appointment>, StoreError>;

    /// Appointments whose interval intersects `span`, ordered by start.
    async fn find_in_range(&self, span: Span) -> Result<Vec<Appointment>, StoreError>;

    /// Atomic: either persists and returns the assigned id, or fails entirely.
    async fn insert(&self, draft: &AppointmentDraft) -> Result<AppointmentId, StoreError>;

    async fn update(&self, id: AppointmentId, appointment: &Appointment) -> Result<(), StoreError>;

    async fn delete(&self, id: AppointmentId) -> Result<(), StoreError>;

    /// Highest id ever assigned; 0 when nothing was ever inserted.
    async fn max_id(&self) -> Result<AppointmentId, StoreError>;

    // Customers are never cached; the scheduler reads them through here on
    // demand.

    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn insert_customer(&self, draft: &CustomerDraft) -> Result<CustomerId, StoreError>;

    async fn update_customer(&self, id: CustomerId, customer: &Customer) -> Result<(), StoreError>;

    async fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError>;

    async fn customers(&self) -> Result<Vec<Customer>, StoreError>;

    /// Appointments referencing a customer; used to detach them on delete.
    async fn appointments_for_customer(
        &self,
        id: CustomerId,
    ) -> Result<Vec<Appointment>, StoreError>;
}

/// In-memory reference store. Backs the test suite and small deployments
/// that do not need durability.
pub struct MemoryStore {
    appointments: DashMap<AppointmentId, Appointment>,
    customers: DashMap<CustomerId, Customer>,
    next_appointment_id: AtomicI64,
    next_customer_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            appointments: DashMap::new(),
            customers: DashMap::new(),
            next_appointment_id: AtomicI64::new(1),
            next_customer_id: AtomicI64::new(1),
        }
    }

    fn start_taken(&self, start: Ms, except: Option<AppointmentId>) -> bool {
        self.appointments
            .iter()
            .any(|e| e.value().start == start && Some(e.value().id) != except)
    }

    fn contact_taken(&self, draft_email: &Option<String>, draft_phone: &Option<String>, except: Option<CustomerId>) -> Option<&'static str> {
        for entry in self.customers.iter() {
            let c = entry.value();
            if Some(c.id) == except {
                continue;
            }
            if draft_email.is_some() && c.email == *draft_email {
                return Some("email already registered");
            }
            if draft_phone.is_some() && c.phone == *draft_phone {
                return Some("phone already registered");
            }
        }
        None
    }
}

#[async_trait]
impl StoreGateway for MemoryStore {
    async fn find_by_id(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.get(&id).map(|e| e.value().clone()))
    }

    async fn find_by_date(&self, start: Ms) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .appointments
            .iter()
            .find(|e| e.value().start == start)
            .map(|e| e.value().clone()))
    }

    async fn find_in_range(&self, span: Span) -> Result<Vec<Appointment>, StoreError> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|e| e.value().span().overlaps(&span))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|a| a.start);
        Ok(rows)
    }

    async fn insert(&self, draft: &AppointmentDraft) -> Result<AppointmentId, StoreError> {
        if draft.duration < 0 {
            return Err(StoreError::Constraint("negative duration".into()));
        }
        if self.start_taken(draft.start, None) {
            return Err(StoreError::Constraint(format!(
                "start {} already taken",
                draft.start
            )));
        }
        let id = self.next_appointment_id.fetch_add(1, Ordering::SeqCst);
        self.appointments
            .insert(id, Appointment::from_draft(id, draft));
        Ok(id)
    }

    async fn update(&self, id: AppointmentId, appointment: &Appointment) -> Result<(), StoreError> {
        if !self.appointments.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if appointment.duration < 0 {
            return Err(StoreError::Constraint("negative duration".into()));
        }
        if self.start_taken(appointment.start, Some(id)) {
            return Err(StoreError::Constraint(format!(
                "start {} already taken",
                appointment.start
            )));
        }
        let mut row = appointment.clone();
        row.id = id;
        self.appointments.insert(id, row);
        Ok(())
    }

    async fn delete(&self, id: AppointmentId) -> Result<(), StoreError> {
        match self.appointments.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn max_id(&self) -> Result<AppointmentId, StoreError> {
        Ok(self.next_appointment_id.load(Ordering::SeqCst) - 1)
    }

    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_customer(&self, draft: &CustomerDraft) -> Result<CustomerId, StoreError> {
        if draft.name.trim().is_empty() {
            return Err(StoreError::Constraint("customer name must not be empty".into()));
        }
        if let Some(msg) = self.contact_taken(&draft.email, &draft.phone, None) {
            return Err(StoreError::Constraint(msg.into()));
        }
        let id = self.next_customer_id.fetch_add(1, Ordering::SeqCst);
        self.customers.insert(id, Customer::from_draft(id, draft));
        Ok(id)
    }

    async fn update_customer(&self, id: CustomerId, customer: &Customer) -> Result<(), StoreError> {
        if !self.customers.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        if customer.name.trim().is_empty() {
            return Err(StoreError::Constraint("customer name must not be empty".into()));
        }
        if let Some(msg) = self.contact_taken(&customer.email, &customer.phone, Some(id)) {
            return Err(StoreError::Constraint(msg.into()));
        }
        let mut row = customer.clone();
        row.id = id;
        self.customers.insert(id, row);
        Ok(())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError> {
        match self.customers.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn customers(&self) -> Result<Vec<Customer>, StoreError> {
        let mut rows: Vec<Customer> = self.customers.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    async fn appointments_for_customer(
        &self,
        id: CustomerId,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|e| e.value().customer_id == Some(id))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|a| a.start);
        Ok(rows)
    }
}
