use serde::{Deserialize, Serialize};

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub const MINUTE: Ms = 60_000;
pub const HOUR: Ms = 60 * MINUTE;
pub const DAY: Ms = 24 * HOUR;

/// Appointment length used when the caller does not pick one.
pub const DEFAULT_DURATION: Ms = 20 * MINUTE;

/// Assigned by the store on insert; never reused.
pub type AppointmentId = i64;
pub type CustomerId = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Set intersection on half-open intervals. An empty span covers no
    /// instant, so it overlaps nothing, including when it sits inside the
    /// other interval.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < self.end
            && other.start < other.end
            && self.start < other.end
            && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// An appointment the store has not seen yet. The id-less state is a
/// separate type, so a persisted [`Appointment`] always carries its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub start: Ms,
    pub duration: Ms,
    pub is_alerted: bool,
    pub customer_id: Option<CustomerId>,
    /// Reserved for multi-employee support; 0 until then.
    pub employee_id: i64,
}

impl AppointmentDraft {
    pub fn new(start: Ms) -> Self {
        Self {
            start,
            duration: DEFAULT_DURATION,
            is_alerted: false,
            customer_id: None,
            employee_id: 0,
        }
    }

    pub fn with_duration(mut self, duration: Ms) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_employee(mut self, employee_id: i64) -> Self {
        self.employee_id = employee_id;
        self
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.start + self.duration)
    }
}

/// A persisted appointment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub start: Ms,
    pub duration: Ms,
    /// Whether a reminder has already gone out.
    pub is_alerted: bool,
    pub customer_id: Option<CustomerId>,
    pub employee_id: i64,
}

impl Appointment {
    pub fn from_draft(id: AppointmentId, draft: &AppointmentDraft) -> Self {
        Self {
            id,
            start: draft.start,
            duration: draft.duration,
            is_alerted: draft.is_alerted,
            customer_id: draft.customer_id,
            employee_id: draft.employee_id,
        }
    }

    pub fn end(&self) -> Ms {
        self.start + self.duration
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end())
    }

    /// Two distinct appointments overlap iff their half-open intervals
    /// intersect. An appointment never overlaps itself.
    pub fn overlaps(&self, other: &Appointment) -> bool {
        self.id != other.id && self.span().overlaps(&other.span())
    }
}

/// Lowercase and strip the diacritics that show up in customer names. The
/// folded form is only ever used for matching, never stored as data.
pub fn fold_for_search(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        for lc in c.to_lowercase() {
            out.push(match lc {
                'à'..='å' | 'ā' | 'ă' => 'a',
                'è'..='ë' | 'ē' | 'ė' => 'e',
                'ì'..='ï' | 'ī' => 'i',
                'ò'..='ö' | 'ō' | 'ø' => 'o',
                'ù'..='ü' | 'ū' => 'u',
                'ý' | 'ÿ' => 'y',
                'ñ' | 'ń' => 'n',
                'ç' | 'ć' | 'č' => 'c',
                'š' | 'ś' => 's',
                'ž' | 'ź' | 'ż' => 'z',
                other => other,
            });
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub name: String,
    pub surname: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CustomerDraft {
    pub fn new(name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
            email: None,
            phone: None,
        }
    }
}

/// A customer record. Customers are never cached; the scheduler reads them
/// from the store on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub surname: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Customer {
    pub fn from_draft(id: CustomerId, draft: &CustomerDraft) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            surname: draft.surname.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
        }
    }

    /// Derived, case/accent-folded form of the name fields.
    pub fn search_key(&self) -> String {
        let mut key = fold_for_search(&self.name);
        key.push(' ');
        key.push_str(&fold_for_search(&self.surname));
        key
    }

    pub fn matches(&self, query: &str) -> bool {
        self.search_key().contains(&fold_for_search(query))
    }
}

/// A free stretch between two consecutive appointments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Where the free time begins (the previous appointment's end).
    pub start: Ms,
    pub length: Ms,
}
