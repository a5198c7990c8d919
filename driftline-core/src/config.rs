use std::{env, time::Duration};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// The configuration of the coordination service
#[derive(Debug, Clone)]
pub struct Config {
    /// The port the request/response surface listens on
    pub port: u16,
    /// The application id of the external RTC provider
    pub rtc_app_id: String,
    /// The secret used to sign capability tokens. Tokens cannot be issued without it.
    pub rtc_certificate: Option<String>,
    /// Base url of the document-store mirror, if any
    pub mirror_url: Option<String>,
    /// Url of the push notification webhook, if any
    pub push_url: Option<String>,

    /// The shortest lifetime a capability token can have, in seconds
    pub min_token_ttl_secs: u64,
    /// The longest lifetime a capability token can have, in seconds
    pub max_token_ttl_secs: u64,
    /// Token lifetime for a host starting a free session
    pub host_token_ttl_secs: u64,
    /// Token lifetime for a guest accepted into a room
    pub guest_token_ttl_secs: u64,
    /// Token lifetime for co-hosts and transferred hosts
    pub cohost_token_ttl_secs: u64,
    /// Token lifetime for pass holders of a chartered drift
    pub pass_token_ttl_secs: u64,

    /// How long an ended session lingers before it is purged
    pub end_grace: Duration,
    /// How long an empty room lingers before it can be collected
    pub room_idle_grace: Duration,
    /// How long a join request stays pending before it is declined
    pub request_ttl: Duration,
    /// Used when a mute is requested without a duration
    pub default_mute_secs: u64,
    /// Used when a timeout is requested without a duration
    pub default_timeout_mins: u64,
    /// How many sessions the recent list returns when no limit is given
    pub recent_limit: usize,
}

impl Config {
    /// Reads the configuration from `DRIFTLINE_*` environment variables,
    /// falling back to the defaults for anything that is missing or malformed.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env::var("DRIFTLINE_SERVER_PORT")
                .ok()
                .and_then(|x| x.parse().ok())
                .unwrap_or(defaults.port),
            rtc_app_id: env::var("DRIFTLINE_RTC_APP_ID").unwrap_or(defaults.rtc_app_id),
            rtc_certificate: non_empty_var("DRIFTLINE_RTC_CERTIFICATE"),
            mirror_url: non_empty_var("DRIFTLINE_MIRROR_URL"),
            push_url: non_empty_var("DRIFTLINE_PUSH_URL"),
            ..defaults
        }
    }

    /// Clamps a requested token lifetime into the allowed range
    pub fn clamp_ttl(&self, ttl_secs: u64) -> u64 {
        ttl_secs.clamp(self.min_token_ttl_secs, self.max_token_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rtc_app_id: "driftline".to_string(),
            rtc_certificate: None,
            mirror_url: None,
            push_url: None,

            min_token_ttl_secs: 60,
            // A week
            max_token_ttl_secs: 60 * 60 * 24 * 7,
            host_token_ttl_secs: 60 * 60,
            guest_token_ttl_secs: 60 * 60,
            cohost_token_ttl_secs: 60 * 60 * 2,
            pass_token_ttl_secs: 60 * 60 * 2,

            end_grace: Duration::from_secs(5 * 60),
            room_idle_grace: Duration::from_secs(60),
            request_ttl: Duration::from_secs(2 * 60),
            default_mute_secs: 5 * 60,
            default_timeout_mins: 5,
            recent_limit: 4,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp_ttl() {
        let config = Config::default();

        assert_eq!(config.clamp_ttl(0), 60, "short lifetimes are raised");
        assert_eq!(config.clamp_ttl(3600), 3600);
        assert_eq!(
            config.clamp_ttl(u64::MAX),
            60 * 60 * 24 * 7,
            "lifetimes longer than a week are capped"
        );
    }
}
