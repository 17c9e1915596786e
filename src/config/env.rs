//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "TESTAUTO";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Timeout from TESTAUTO_TIMEOUT, unparsed
    pub timeout: Option<String>,
    /// Concurrency from TESTAUTO_PARALLEL, unparsed
    pub parallel: Option<String>,
    /// Stop strategy from TESTAUTO_STOP_STRATEGY
    pub stop_strategy: Option<String>,
    /// Retry strategy from TESTAUTO_RETRY_STRATEGY
    pub retry_strategy: Option<String>,
    /// Config file from TESTAUTO_CONFIG
    pub config_file: Option<String>,
    /// Log level from TESTAUTO_LOG
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            timeout: get_env("TIMEOUT"),
            parallel: get_env("PARALLEL"),
            stop_strategy: get_env("STOP_STRATEGY"),
            retry_strategy: get_env("RETRY_STRATEGY"),
            config_file: get_env("CONFIG"),
            log_level: get_env("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.timeout.is_some()
            || self.parallel.is_some()
            || self.stop_strategy.is_some()
            || self.retry_strategy.is_some()
            || self.config_file.is_some()
            || self.log_level.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_TIMEOUT:         {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_PARALLEL:        {:?}", ENV_PREFIX, self.parallel);
        println!("  {}_STOP_STRATEGY:   {:?}", ENV_PREFIX, self.stop_strategy);
        println!("  {}_RETRY_STRATEGY:  {:?}", ENV_PREFIX, self.retry_strategy);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_LOG:             {:?}", ENV_PREFIX, self.log_level);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub(crate) struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_TIMEOUT"), timeout.to_string()));
        self
    }

    pub fn stop_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_STOP_STRATEGY"), strategy.into()));
        self
    }

    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_CONFIG"), path.into()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

#[cfg(test)]
impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub(crate) struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all TESTAUTO environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_TIMEOUT          Per-case timeout in seconds");
    println!("  {ENV_PREFIX}_PARALLEL         Number of cases run at once");
    println!("  {ENV_PREFIX}_STOP_STRATEGY    all-completed, first-not-pass, first-p0-not-pass");
    println!("  {ENV_PREFIX}_RETRY_STRATEGY   not-rerun, rerun-now, rerun-last");
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!("  {ENV_PREFIX}_LOG              Log level (trace, debug, info, warn, error)");
    println!("  RUST_LOG                  Full tracing filter, overrides {ENV_PREFIX}_LOG");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_PARALLEL=4");
    println!("  export {ENV_PREFIX}_STOP_STRATEGY=first-p0-not-pass");
    println!("  testauto run demo");
}
