//! Session policy configuration.

use chrono::Duration;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 2 * 60 * 60;
const DEFAULT_REMEMBER_ACCESS_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_OTP_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_REVERIFY_AFTER_SECONDS: i64 = 2 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_ttl_seconds: i64,
    remember_access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    otp_ttl_seconds: i64,
    otp_max_attempts: u32,
    reset_token_ttl_seconds: i64,
    reverify_after_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            remember_access_ttl_seconds: DEFAULT_REMEMBER_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            reverify_after_seconds: DEFAULT_REVERIFY_AFTER_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_remember_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.remember_access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_max_attempts(mut self, attempts: u32) -> Self {
        self.otp_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reverify_after_seconds(mut self, seconds: i64) -> Self {
        self.reverify_after_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Access token lifetime depending on the remember-me opt-in.
    #[must_use]
    pub fn access_ttl(&self, remember_me: bool) -> Duration {
        if remember_me {
            Duration::seconds(self.remember_access_ttl_seconds)
        } else {
            Duration::seconds(self.access_ttl_seconds)
        }
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_ttl_seconds)
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        Duration::seconds(self.otp_ttl_seconds)
    }

    #[must_use]
    pub fn otp_max_attempts(&self) -> u32 {
        self.otp_max_attempts
    }

    #[must_use]
    pub fn reset_token_ttl(&self) -> Duration {
        Duration::seconds(self.reset_token_ttl_seconds)
    }

    /// How stale `last_otp_verified_at` may be before a refresh without
    /// remember-me forces a fresh challenge.
    #[must_use]
    pub fn reverify_after(&self) -> Duration {
        Duration::seconds(self.reverify_after_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new("https://app.halcyon.health".to_string());
        assert_eq!(config.access_ttl(false), Duration::hours(2));
        assert_eq!(config.access_ttl(true), Duration::days(7));
        assert_eq!(config.refresh_ttl(), Duration::days(7));
        assert_eq!(config.otp_ttl(), Duration::minutes(10));
        assert_eq!(config.otp_max_attempts(), 5);
        assert_eq!(config.reset_token_ttl(), Duration::hours(1));
        assert_eq!(config.reverify_after(), Duration::hours(2));

        let config = config
            .with_access_ttl_seconds(60)
            .with_remember_access_ttl_seconds(120)
            .with_refresh_ttl_seconds(180)
            .with_otp_ttl_seconds(30)
            .with_otp_max_attempts(3)
            .with_reset_token_ttl_seconds(90)
            .with_reverify_after_seconds(45);
        assert_eq!(config.access_ttl(false), Duration::seconds(60));
        assert_eq!(config.access_ttl(true), Duration::seconds(120));
        assert_eq!(config.refresh_ttl(), Duration::seconds(180));
        assert_eq!(config.otp_ttl(), Duration::seconds(30));
        assert_eq!(config.otp_max_attempts(), 3);
        assert_eq!(config.reset_token_ttl(), Duration::seconds(90));
        assert_eq!(config.reverify_after(), Duration::seconds(45));
        assert_eq!(config.frontend_base_url(), "https://app.halcyon.health");
    }
}
