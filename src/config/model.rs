// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [timing]
/// heartbeat_interval_ms = 5000
/// idle_check_interval_ms = 2000
/// kill_grace_ms = 500
///
/// [stream]
/// max_line_bytes = 1000000
///
/// [protocol]
/// handshake = true
///
/// [deploy]
/// api_base = "https://api.netlify.com/api/v1"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub timing: TimingSection,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub protocol: ProtocolSection,

    #[serde(default)]
    pub deploy: DeploySection,
}

/// `[timing]` section: every timer the supervisor runs.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingSection {
    /// Interval between `status` heartbeats.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// How often the idle watchdog compares the activity clock.
    #[serde(default = "default_idle_check_interval_ms")]
    pub idle_check_interval_ms: u64,

    /// Delay between SIGTERM and SIGKILL when terminating a process group.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Upper bound on waiting for output readers after the child is gone.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Exit code reported when the hard deadline fires.
    #[serde(default = "default_timeout_exit_code")]
    pub timeout_exit_code: i32,
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_idle_check_interval_ms() -> u64 {
    2_000
}

fn default_kill_grace_ms() -> u64 {
    500
}

fn default_drain_timeout_ms() -> u64 {
    2_000
}

fn default_timeout_exit_code() -> i32 {
    124
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            idle_check_interval_ms: default_idle_check_interval_ms(),
            kill_grace_ms: default_kill_grace_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            timeout_exit_code: default_timeout_exit_code(),
        }
    }
}

impl TimingSection {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// `[stream]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSection {
    /// Longest accepted output line, excluding the line terminator.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// Value of the `action` field on every emitted event.
    #[serde(default = "default_action_tag")]
    pub action_tag: String,
}

fn default_max_line_bytes() -> usize {
    1_000_000
}

fn default_action_tag() -> String {
    "opd".to_string()
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
            action_tag: default_action_tag(),
        }
    }
}

/// `[protocol]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolSection {
    /// Emit the `hello` event before reading the request.
    #[serde(default = "default_handshake")]
    pub handshake: bool,
}

fn default_handshake() -> bool {
    true
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            handshake: default_handshake(),
        }
    }
}

/// `[deploy]` section used by `netlify-deploy-dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploySection {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of status polls before the deploy is reported as stuck.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_api_base() -> String {
    "https://api.netlify.com/api/v1".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_500
}

fn default_poll_attempts() -> u32 {
    120
}

fn default_token_env() -> String {
    "NETLIFY_AUTH_TOKEN".to_string()
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_attempts: default_poll_attempts(),
            token_env: default_token_env(),
        }
    }
}

impl DeploySection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Read the API token from the configured environment variable.
    pub fn token_from_env(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}
