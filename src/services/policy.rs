//! Time-window policy gates
//!
//! Public-facing operations are only accepted inside configured windows
//! anchored to the activity schedule. The numbers come from configuration
//! and can be overridden at runtime through `app_settings`; overrides are
//! read through a short-lived in-process cache, so a change may take one
//! TTL to be visible. `refresh` bypasses the cache for operations that need
//! the latest values immediately.

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::Settings;
use crate::database::repositories::SettingRepository;
use crate::models::activity::Activity;
use crate::utils::errors::{Result, SigeaError};
use crate::utils::helpers::format_timestamp;
use crate::utils::logging::log_policy_denial;

/// `app_settings` keys recognized as policy overrides
pub const SELF_REGISTER_GRACE_KEY: &str = "policy.self_register_grace_minutes";
pub const CONFIRM_WINDOW_KEY: &str = "policy.public_confirm_window_days";
pub const PAUSE_FROM_KEY: &str = "policy.public_pause_available_from_seconds";
pub const PAUSE_UNTIL_KEY: &str = "policy.public_pause_available_until_after_end_minutes";

/// Outcome of a gate check. A denial names the window that was missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied {
        reason: String,
        opens_at: Option<DateTime<Utc>>,
        closes_at: Option<DateTime<Utc>>,
    },
}

impl GateDecision {
    /// Convert a denial into the corresponding error.
    pub fn into_result(self, operation: &str) -> Result<()> {
        match self {
            GateDecision::Allowed => Ok(()),
            GateDecision::Denied {
                opens_at, closes_at, ..
            } => Err(SigeaError::WindowClosed {
                operation: operation.to_string(),
                opens_at,
                closes_at,
            }),
        }
    }
}

/// Effective policy numbers after applying overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyNumbers {
    pub self_register_grace_minutes: i64,
    pub public_confirm_window_days: i64,
    pub public_pause_available_from_seconds: i64,
    pub public_pause_available_until_after_end_minutes: i64,
}

#[derive(Debug, Clone, Copy)]
struct CachedNumbers {
    numbers: PolicyNumbers,
    loaded_at: Instant,
}

#[derive(Clone)]
pub struct PolicyGate {
    setting_repository: SettingRepository,
    settings: Settings,
    cache: Arc<RwLock<Option<CachedNumbers>>>,
}

impl PolicyGate {
    pub fn new(setting_repository: SettingRepository, settings: Settings) -> Self {
        Self {
            setting_repository,
            settings,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    fn defaults(&self) -> PolicyNumbers {
        let policy = &self.settings.policy;
        PolicyNumbers {
            self_register_grace_minutes: policy.self_register_grace_minutes,
            public_confirm_window_days: policy.public_confirm_window_days,
            public_pause_available_from_seconds: policy.public_pause_available_from_seconds,
            public_pause_available_until_after_end_minutes: policy
                .public_pause_available_until_after_end_minutes,
        }
    }

    fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.settings.policy.settings_cache_ttl_seconds)
    }

    async fn load_numbers(&self) -> PolicyNumbers {
        let mut numbers = self.defaults();

        let stored = match self.setting_repository.list_all().await {
            Ok(stored) => stored,
            Err(err) => {
                // Policy is advisory configuration; falling back to the
                // config defaults keeps the gates functional when the
                // settings table is unreachable.
                warn!(error = %err, "Failed to load policy overrides, using defaults");
                return numbers;
            }
        };

        for setting in stored {
            let Some(value) = setting.value.as_i64() else {
                if matches!(
                    setting.key.as_str(),
                    SELF_REGISTER_GRACE_KEY
                        | CONFIRM_WINDOW_KEY
                        | PAUSE_FROM_KEY
                        | PAUSE_UNTIL_KEY
                ) {
                    warn!(key = %setting.key, "Ignoring non-integer policy override");
                }
                continue;
            };
            match setting.key.as_str() {
                SELF_REGISTER_GRACE_KEY => numbers.self_register_grace_minutes = value,
                CONFIRM_WINDOW_KEY => numbers.public_confirm_window_days = value,
                PAUSE_FROM_KEY => numbers.public_pause_available_from_seconds = value,
                PAUSE_UNTIL_KEY => {
                    numbers.public_pause_available_until_after_end_minutes = value
                }
                _ => {}
            }
        }

        numbers
    }

    /// Effective numbers, served from the cache while it is fresh.
    pub async fn current_numbers(&self) -> PolicyNumbers {
        {
            let cached = self.cache.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.loaded_at.elapsed() < self.cache_ttl() {
                    return entry.numbers;
                }
            }
        }

        let mut cached = self.cache.write().await;
        if let Some(entry) = cached.as_ref() {
            if entry.loaded_at.elapsed() < self.cache_ttl() {
                return entry.numbers;
            }
        }

        let numbers = self.load_numbers().await;
        *cached = Some(CachedNumbers {
            numbers,
            loaded_at: Instant::now(),
        });
        numbers
    }

    /// Reload overrides immediately, bypassing the cache.
    pub async fn refresh(&self) -> PolicyNumbers {
        let numbers = self.load_numbers().await;
        let mut cached = self.cache.write().await;
        *cached = Some(CachedNumbers {
            numbers,
            loaded_at: Instant::now(),
        });
        numbers
    }

    /// Self-registration stays open until the activity start plus a grace
    /// period.
    pub async fn self_register_gate(&self, activity: &Activity, now: DateTime<Utc>) -> GateDecision {
        let numbers = self.current_numbers().await;
        let closes_at = activity.start_dt + Duration::minutes(numbers.self_register_grace_minutes);

        if now <= closes_at {
            return GateDecision::Allowed;
        }

        let reason = format!("self-registration closed at {}", format_timestamp(closes_at));
        log_policy_denial("self_register", activity.id, &reason);
        GateDecision::Denied {
            reason,
            opens_at: None,
            closes_at: Some(closes_at),
        }
    }

    /// Public confirmation stays open until the activity end plus a number
    /// of days.
    pub async fn public_confirm_gate(&self, activity: &Activity, now: DateTime<Utc>) -> GateDecision {
        if !self.settings.features.public_kiosk {
            let reason = "public kiosk operations are disabled".to_string();
            log_policy_denial("public_confirm", activity.id, &reason);
            return GateDecision::Denied {
                reason,
                opens_at: None,
                closes_at: None,
            };
        }

        let numbers = self.current_numbers().await;
        let closes_at = activity.end_dt + Duration::days(numbers.public_confirm_window_days);

        if now <= closes_at {
            return GateDecision::Allowed;
        }

        let reason = format!("confirmation closed at {}", format_timestamp(closes_at));
        log_policy_denial("public_confirm", activity.id, &reason);
        GateDecision::Denied {
            reason,
            opens_at: None,
            closes_at: Some(closes_at),
        }
    }

    /// Public pause/resume is a Magistral-only window around the scheduled
    /// activity.
    pub async fn public_pause_gate(&self, activity: &Activity, now: DateTime<Utc>) -> GateDecision {
        if !self.settings.features.public_kiosk {
            let reason = "public kiosk operations are disabled".to_string();
            log_policy_denial("public_pause", activity.id, &reason);
            return GateDecision::Denied {
                reason,
                opens_at: None,
                closes_at: None,
            };
        }

        if !activity.activity_type.supports_live_tracking() {
            let reason = format!(
                "pause/resume does not apply to {} activities",
                activity.activity_type
            );
            log_policy_denial("public_pause", activity.id, &reason);
            return GateDecision::Denied {
                reason,
                opens_at: None,
                closes_at: None,
            };
        }

        let numbers = self.current_numbers().await;
        let opens_at =
            activity.start_dt + Duration::seconds(numbers.public_pause_available_from_seconds);
        let closes_at = activity.end_dt
            + Duration::minutes(numbers.public_pause_available_until_after_end_minutes);

        if now < opens_at {
            let reason = format!("pause/resume opens at {}", format_timestamp(opens_at));
            log_policy_denial("public_pause", activity.id, &reason);
            return GateDecision::Denied {
                reason,
                opens_at: Some(opens_at),
                closes_at: Some(closes_at),
            };
        }

        if now > closes_at {
            let reason = format!("pause/resume closed at {}", format_timestamp(closes_at));
            log_policy_denial("public_pause", activity.id, &reason);
            return GateDecision::Denied {
                reason,
                opens_at: Some(opens_at),
                closes_at: Some(closes_at),
            };
        }

        GateDecision::Allowed
    }
}
