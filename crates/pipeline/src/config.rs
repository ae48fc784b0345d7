use std::time::Duration;

/// Longest processing timeout accepted from configuration.
pub const MAX_PROCESSING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Worker pool, deadline and sweeper settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Dispatches allowed to run at once.
    pub max_concurrent_jobs: usize,
    /// Upper bound on one clip or montage processing step.
    pub processing_timeout: Duration,
    /// How often the sweeper looks for jobs past their deadline.
    pub sweep_interval: Duration,
    /// Processing attempts before the sweeper gives up on a job.
    pub max_job_attempts: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            processing_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            max_job_attempts: 3,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `MAX_CONCURRENT_JOBS`     | `2`     |
    /// | `PROCESSING_TIMEOUT_SECS` | `600`   |
    /// | `SWEEP_INTERVAL_SECS`     | `60`    |
    /// | `MAX_JOB_ATTEMPTS`        | `3`     |
    ///
    /// Unparseable values fall back to the default with a warning, as does
    /// a processing timeout of zero or above [`MAX_PROCESSING_TIMEOUT`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs).max(1),
            processing_timeout: checked_timeout(
                env_or("PROCESSING_TIMEOUT_SECS", defaults.processing_timeout.as_secs()),
                defaults.processing_timeout,
            ),
            sweep_interval: Duration::from_secs(
                env_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs()).max(1),
            ),
            max_job_attempts: env_or("MAX_JOB_ATTEMPTS", defaults.max_job_attempts).max(1),
        }
    }
}

fn checked_timeout(secs: u64, default: Duration) -> Duration {
    let timeout = Duration::from_secs(secs);
    if timeout.is_zero() || timeout > MAX_PROCESSING_TIMEOUT {
        tracing::warn!(
            value = secs,
            max = MAX_PROCESSING_TIMEOUT.as_secs(),
            default = default.as_secs(),
            "PROCESSING_TIMEOUT_SECS out of range, using default"
        );
        return default;
    }
    timeout
}

fn env_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}
