//! Retry, timeout and validation policy.

use std::collections::HashMap;
use std::time::Duration;

use reel_models::Provider;

use crate::error::Backoff;

/// Attempts per provider before moving on.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay after a transient failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Delay after a provider-side server error.
pub const DEFAULT_SERVER_ERROR_DELAY: Duration = Duration::from_secs(10);

/// Wall-clock bound on one attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Free TTS endpoints answer quickly or not at all.
pub const GTTS_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Motion jobs are polled for up to this long.
pub const MOTION_MAX_WAIT: Duration = Duration::from_secs(300);

/// Interval between motion task polls.
pub const MOTION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Smallest image accepted as a real render.
pub const MIN_IMAGE_BYTES: u64 = 1000;

/// Timeouts and retry delays applied by the chain.
#[derive(Debug, Clone)]
pub struct ChainPolicy {
    pub retry_delay: Duration,
    pub server_error_delay: Duration,
    pub default_attempt_timeout: Duration,
    pub attempt_timeouts: HashMap<Provider, Duration>,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        let attempt_timeouts = HashMap::from([
            (Provider::Gtts, GTTS_ATTEMPT_TIMEOUT),
            // polling window plus the download
            (Provider::Runway, MOTION_MAX_WAIT + DEFAULT_ATTEMPT_TIMEOUT),
        ]);

        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            server_error_delay: DEFAULT_SERVER_ERROR_DELAY,
            default_attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            attempt_timeouts,
        }
    }
}

impl ChainPolicy {
    /// Policy without delays, for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            server_error_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_retry_delays(mut self, retry_delay: Duration, server_error_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self.server_error_delay = server_error_delay;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_attempt_timeout = timeout;
        self
    }

    pub fn with_attempt_timeout(mut self, provider: Provider, timeout: Duration) -> Self {
        self.attempt_timeouts.insert(provider, timeout);
        self
    }

    pub fn attempt_timeout(&self, provider: Provider) -> Duration {
        self.attempt_timeouts
            .get(&provider)
            .copied()
            .unwrap_or(self.default_attempt_timeout)
    }

    pub fn delay_for(&self, backoff: Backoff) -> Duration {
        match backoff {
            Backoff::Standard => self.retry_delay,
            Backoff::ServerError => self.server_error_delay,
        }
    }
}

/// Acceptance rules for generated artifacts.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub min_image_bytes: u64,
    /// Measure audio with ffprobe and require a positive duration
    pub measure_audio: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_image_bytes: MIN_IMAGE_BYTES,
            measure_audio: true,
        }
    }
}
