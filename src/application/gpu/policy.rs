//! Environment-derived GPU access policy.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "BULWARK_GPU_";

/// Options forwarded to the GPU-bound inference runtime with each request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeOptions {
    /// Parallel requests the runtime itself is configured to serve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_parallel: Option<u32>,
    /// How long the runtime keeps the model resident (e.g. `"5m"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_gpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_thread: Option<u32>,
}

/// GPU access policy, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuPolicy {
    /// Requested in-process concurrency bound.
    pub max_concurrency: usize,
    /// Settling time after a slot is released.
    pub cooldown: Duration,
    /// Waits at or above this are logged.
    pub wait_log_threshold: Duration,
    /// Directory used as the cross-process mutex.
    pub lock_path: PathBuf,
    /// Sleep between attempts to create the lock directory.
    pub lock_poll_interval: Duration,
    /// Whether cross-process locking was requested.
    pub cross_process_lock: bool,
    pub runtime: RuntimeOptions,
}

impl Default for GpuPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            cooldown: Duration::ZERO,
            wait_log_threshold: Duration::from_secs(1),
            lock_path: std::env::temp_dir().join("bulwark-gpu.lock"),
            lock_poll_interval: Duration::from_millis(250),
            cross_process_lock: true,
            runtime: RuntimeOptions::default(),
        }
    }
}

impl GpuPolicy {
    /// Read the policy from `BULWARK_GPU_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the policy from an arbitrary key lookup.
    ///
    /// Keys are the full variable names, e.g. `BULWARK_GPU_COOLDOWN_SECS`.
    /// Unset or blank keys fall back to [`GpuPolicy::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let defaults = Self::default();

        let max_concurrency = env
            .parse::<usize>("MAX_CONCURRENCY")?
            .unwrap_or(defaults.max_concurrency);
        if max_concurrency == 0 {
            return Err(invalid("MAX_CONCURRENCY", "must be at least 1"));
        }

        Ok(Self {
            max_concurrency,
            cooldown: env.secs("COOLDOWN_SECS")?.unwrap_or(defaults.cooldown),
            wait_log_threshold: env
                .secs("WAIT_LOG_THRESHOLD_SECS")?
                .unwrap_or(defaults.wait_log_threshold),
            lock_path: env
                .get("LOCK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.lock_path),
            lock_poll_interval: env
                .secs("LOCK_POLL_SECS")?
                .unwrap_or(defaults.lock_poll_interval),
            cross_process_lock: env
                .flag("CROSS_PROCESS_LOCK")?
                .unwrap_or(defaults.cross_process_lock),
            runtime: RuntimeOptions {
                num_parallel: env.parse("NUM_PARALLEL")?,
                keep_alive: env.get("KEEP_ALIVE"),
                num_ctx: env.parse("NUM_CTX")?,
                num_gpu: env.parse("NUM_GPU")?,
                num_thread: env.parse("NUM_THREAD")?,
            },
        })
    }

    /// Cross-process locking applies only when a single slot is in effect.
    #[must_use]
    pub fn cross_process_enabled(&self) -> bool {
        self.cross_process_lock && self.effective_concurrency() == 1
    }

    /// In-process bound after accounting for the runtime's own parallelism.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        match self.runtime.num_parallel {
            Some(n) if n > 0 => self.max_concurrency.min(n as usize),
            _ => self.max_concurrency,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            effective_concurrency: self.effective_concurrency(),
            max_concurrency: self.max_concurrency,
            cooldown_secs: self.cooldown.as_secs_f64(),
            wait_log_threshold_secs: self.wait_log_threshold.as_secs_f64(),
            lock_path: self.lock_path.display().to_string(),
            lock_poll_interval_secs: self.lock_poll_interval.as_secs_f64(),
            cross_process_lock: self.cross_process_enabled(),
            runtime_options: self.runtime.clone(),
        }
    }
}

/// Read-only view of the resolved policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySnapshot {
    pub effective_concurrency: usize,
    pub max_concurrency: usize,
    pub cooldown_secs: f64,
    pub wait_log_threshold_secs: f64,
    pub lock_path: String,
    pub lock_poll_interval_secs: f64,
    pub cross_process_lock: bool,
    pub runtime_options: RuntimeOptions,
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(&format!("{ENV_PREFIX}{key}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| raw.parse::<T>().map_err(|e| invalid(key, e)))
            .transpose()
    }

    fn secs(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        self.parse::<f64>(key)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(|e| invalid(key, e)))
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get(key)
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(key, format!("expected a boolean, got '{other}'"))),
            })
            .transpose()
    }
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field: format!("{ENV_PREFIX}{key}"),
        reason: reason.to_string(),
    }
}
