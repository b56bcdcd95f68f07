use std::collections::BTreeMap;
use std::time::Duration;

use opd_supervisor::engine::SupervisorSettings;
use opd_supervisor::protocol::{ExecutionRequest, Request, Transport};

/// Builder for `ExecutionRequest` to simplify test setup.
pub struct ExecutionRequestBuilder {
    req: ExecutionRequest,
}

impl ExecutionRequestBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            req: ExecutionRequest::new(cmd),
        }
    }

    pub fn timeout_sec(mut self, secs: i64) -> Self {
        self.req.timeout_sec = secs;
        self
    }

    pub fn idle_timeout_sec(mut self, secs: i64) -> Self {
        self.req.idle_timeout_sec = secs;
        self
    }

    pub fn cwd(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.req.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.req
            .env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn pty(mut self, cols: u16, rows: u16) -> Self {
        self.req.transport = Transport::Pty { cols, rows };
        self
    }

    pub fn build(self) -> ExecutionRequest {
        self.req
    }
}

/// Builder for collaborator `Request`s.
pub struct RequestBuilder {
    req: Request,
}

impl RequestBuilder {
    pub fn new(action: &str) -> Self {
        Self {
            req: Request {
                action: action.to_string(),
                ..Request::default()
            },
        }
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.req.src = Some(src.into());
        self
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.req.dest = Some(dest.into());
        self
    }

    pub fn algo(mut self, algo: &str) -> Self {
        self.req.algo = Some(algo.to_string());
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.req.prefix = Some(prefix.to_string());
        self
    }

    pub fn targz(mut self, targz: bool) -> Self {
        self.req.targz = Some(targz);
        self
    }

    pub fn site(mut self, site: &str) -> Self {
        self.req.site = Some(site.to_string());
        self
    }

    pub fn prod(mut self, prod: bool) -> Self {
        self.req.prod = Some(prod);
        self
    }

    pub fn build(self) -> Request {
        self.req
    }
}

/// Settings with short timers so watchdog tests finish quickly.
pub fn fast_settings() -> SupervisorSettings {
    SupervisorSettings {
        heartbeat_interval: Duration::from_secs(60),
        idle_check_interval: Duration::from_millis(100),
        kill_grace: Duration::from_millis(200),
        drain_timeout: Duration::from_secs(2),
        ..SupervisorSettings::default()
    }
}
