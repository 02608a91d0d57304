use crate::model::{DAY, DEFAULT_DURATION, HOUR, Ms};
use crate::scheduler::ScheduleError;

/// Construction-time settings for the scheduler. Validated once at
/// bootstrap; a bad config never yields a partially-usable cache.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Reference timestamp bucket indices are computed from, typically
    /// "today at opening hour". Fixed for the cache's lifetime.
    pub anchor: Ms,
    /// Bucket width. Must be positive.
    pub bucket_period: Ms,
    /// Half-width of the window eagerly loaded around the anchor at
    /// bootstrap.
    pub preload: Ms,
    /// Length of the fallback gap suggestion.
    pub default_duration: Ms,
    /// How far before an appointment's start a reminder becomes due.
    pub alert_lead: Ms,
}

impl SchedulerConfig {
    pub fn new(anchor: Ms) -> Self {
        Self {
            anchor,
            bucket_period: 2 * HOUR,
            preload: 7 * DAY,
            default_duration: DEFAULT_DURATION,
            alert_lead: HOUR,
        }
    }

    /// Environment overrides on top of the defaults. Unparsable values are
    /// ignored rather than guessed at; validation still runs at bootstrap.
    pub fn from_env(anchor: Ms) -> Self {
        let mut config = Self::new(anchor);
        if let Some(v) = env_ms("FREEBUSY_BUCKET_PERIOD_MS") {
            config.bucket_period = v;
        }
        if let Some(v) = env_ms("FREEBUSY_PRELOAD_MS") {
            config.preload = v;
        }
        if let Some(v) = env_ms("FREEBUSY_DEFAULT_DURATION_MS") {
            config.default_duration = v;
        }
        if let Some(v) = env_ms("FREEBUSY_ALERT_LEAD_MS") {
            config.alert_lead = v;
        }
        config
    }

    pub(crate) fn validate(&self) -> Result<(), ScheduleError> {
        if self.bucket_period <= 0 {
            return Err(ScheduleError::Config("bucket period must be positive"));
        }
        if self.preload < 0 {
            return Err(ScheduleError::Config("preload window must not be negative"));
        }
        if self.default_duration <= 0 {
            return Err(ScheduleError::Config("default duration must be positive"));
        }
        if self.alert_lead < 0 {
            return Err(ScheduleError::Config("alert lead must not be negative"));
        }
        Ok(())
    }
}

fn env_ms(key: &str) -> Option<Ms> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
