// src/actions/deploy.rs

//! Direct-API site deploy (`netlify-deploy-dir`).
//!
//! Digest-based upload: every file is hashed up front, the deploy is created
//! with the full `path -> sha1` manifest, and only the files the remote side
//! reports as `required` are uploaded. The deploy is then polled until it is
//! `ready` or `error`.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::actions::archive::entry_name;
use crate::actions::{conclude, fail};
use crate::config::ConfigFile;
use crate::protocol::{EventWriter, Extra, Outcome, Request};

/// Endpoint and polling policy for one deploy.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub api_base: String,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    /// Exit code reported when the deploy never becomes live.
    pub timeout_exit_code: i32,
}

impl From<&ConfigFile> for DeploySettings {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            api_base: cfg.deploy.api_base.clone(),
            poll_interval: cfg.deploy.poll_interval(),
            poll_attempts: cfg.deploy.poll_attempts,
            timeout_exit_code: cfg.timing.timeout_exit_code,
        }
    }
}

/// Errors from the deploy API layer.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("deploy API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The deploy reached the remote `error` state.
    #[error("deploy {id} failed: {message}")]
    Failed { id: String, message: String },

    #[error("deploy {id} not ready after {attempts} status checks")]
    NotReady { id: String, attempts: u32 },

    #[error("invalid deploy API url: {0}")]
    Url(String),

    #[error(transparent)]
    Local(#[from] anyhow::Error),
}

impl DeployError {
    /// Whether the API rejected our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, DeployError::Api { status: 401 | 403, .. })
    }

    /// Transient failures a status poll may retry.
    fn is_retryable(&self) -> bool {
        match self {
            DeployError::Request(_) => true,
            DeployError::Api { .. } => !self.is_auth(),
            _ => false,
        }
    }
}

/// Deploy record as returned by create and status calls.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployResponse {
    pub id: String,
    #[serde(default)]
    pub state: Option<String>,
    /// SHA-1 digests the remote side does not have yet.
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub ssl_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub deploy_ssl_url: Option<String>,
    #[serde(default)]
    pub deploy_url: Option<String>,
    #[serde(default)]
    pub admin_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl DeployResponse {
    /// Public URL: the site URL for production, the deploy preview otherwise.
    pub fn public_url(&self, prod: bool) -> Option<String> {
        if prod {
            self.ssl_url.clone().or_else(|| self.url.clone())
        } else {
            self.deploy_ssl_url
                .clone()
                .or_else(|| self.deploy_url.clone())
        }
    }

    pub fn logs_url(&self) -> Option<String> {
        self.admin_url
            .as_deref()
            .map(|admin| format!("{}/deploys/{}", admin.trim_end_matches('/'), self.id))
    }
}

/// A local file and its digest, keyed by its `/`-rooted site path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployFile {
    pub path: PathBuf,
    pub name: String,
    pub sha1: String,
}

/// Hash every regular file under `src`.
pub fn hash_tree(src: &Path) -> anyhow::Result<Vec<DeployFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {:?}", src))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{:?} is not under {:?}", entry.path(), src))?;
        files.push(DeployFile {
            path: entry.path().to_path_buf(),
            name: format!("/{}", entry_name("", rel)),
            sha1: sha1_file(entry.path())?,
        });
    }

    Ok(files)
}

fn sha1_file(path: &Path) -> anyhow::Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {:?}", path))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// HTTP client for the deploy API.
pub struct DeployClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl DeployClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// `POST /sites/{site}/deploys` with the full digest manifest.
    pub async fn create_deploy(
        &self,
        site: &str,
        files: &[DeployFile],
        prod: bool,
    ) -> Result<DeployResponse, DeployError> {
        let manifest: BTreeMap<&str, &str> = files
            .iter()
            .map(|f| (f.name.as_str(), f.sha1.as_str()))
            .collect();
        let body = json!({
            "files": manifest,
            "draft": !prod,
        });

        let response = self
            .client
            .post(format!("{}/sites/{}/deploys", self.api_base, site))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `PUT /deploys/{id}/files/{path}` with the raw file contents.
    pub async fn upload_file(&self, deploy_id: &str, file: &DeployFile) -> Result<(), DeployError> {
        let mut url = reqwest::Url::parse(&format!("{}/deploys/{}/files", self.api_base, deploy_id))
            .map_err(|e| DeployError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| DeployError::Url(self.api_base.clone()))?
            .extend(file.name.trim_start_matches('/').split('/'));

        let contents = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("reading {:?}", file.path))?;

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(contents)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// `GET /deploys/{id}`.
    pub async fn get_deploy(&self, deploy_id: &str) -> Result<DeployResponse, DeployError> {
        let response = self
            .client
            .get(format!("{}/deploys/{}", self.api_base, deploy_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Poll until the deploy is live (Ok) or `error` (Err).
    ///
    /// `ready` and `current` both count as live. Network failures and non-2xx
    /// answers other than 401/403 only cost one attempt.
    pub async fn wait_ready(
        &self,
        deploy_id: &str,
        interval: Duration,
        attempts: u32,
    ) -> Result<DeployResponse, DeployError> {
        for attempt in 1..=attempts {
            match self.get_deploy(deploy_id).await {
                Ok(deploy) => {
                    debug!(deploy_id, attempt, state = ?deploy.state, "polled deploy state");
                    match deploy.state.as_deref() {
                        Some("ready" | "current") => return Ok(deploy),
                        Some("error") => {
                            return Err(DeployError::Failed {
                                id: deploy.id.clone(),
                                message: deploy
                                    .error_message
                                    .unwrap_or_else(|| "deploy entered error state".to_string()),
                            });
                        }
                        _ => {}
                    }
                }
                Err(err) if err.is_retryable() => {
                    warn!(deploy_id, attempt, error = %err, "deploy status poll failed; retrying");
                }
                Err(err) => return Err(err),
            }

            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(DeployError::NotReady {
            id: deploy_id.to_string(),
            attempts,
        })
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DeployError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), DeployError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// `netlify-deploy-dir`: deploy `src` to `site`.
///
/// `token` comes from the environment; it is passed in so the flow does not
/// read process-global state itself.
pub async fn run(
    req: &Request,
    settings: &DeploySettings,
    token: Option<String>,
    writer: &EventWriter,
) -> Outcome {
    let (Some(src), Some(site)) = (req.src(), req.site()) else {
        return fail(writer, "netlify-deploy-dir requires src and site", Outcome::invalid_args());
    };
    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        return fail(writer, "missing deploy API token", Outcome::auth());
    };
    let prod = req.prod.unwrap_or(false);

    match deploy(src, site, prod, settings, &token, writer).await {
        Ok(extra) => conclude(writer, Outcome::success_with(extra)),
        Err(err) => {
            warn!(site, error = %err, "deploy failed");
            let outcome = match &err {
                e if e.is_auth() => Outcome::auth(),
                DeployError::NotReady { .. } => Outcome::timed_out(settings.timeout_exit_code),
                _ => Outcome::failure(),
            };
            fail(writer, err.to_string(), outcome)
        }
    }
}

async fn deploy(
    src: &str,
    site: &str,
    prod: bool,
    settings: &DeploySettings,
    token: &str,
    writer: &EventWriter,
) -> Result<Extra, DeployError> {
    writer.status("hashing");
    let root = PathBuf::from(src);
    let files = tokio::task::spawn_blocking(move || hash_tree(&root))
        .await
        .context("hashing task panicked")??;
    debug!(files = files.len(), "hashed deploy tree");

    let client = DeployClient::new(&settings.api_base, token);

    writer.status("creating");
    let created = client.create_deploy(site, &files, prod).await?;
    info!(deploy_id = %created.id, required = created.required.len(), "deploy created");

    let required: HashSet<&str> = created.required.iter().map(String::as_str).collect();
    let pending: Vec<&DeployFile> = files
        .iter()
        .filter(|f| required.contains(f.sha1.as_str()))
        .collect();

    writer.status(format!("uploading {}", pending.len()));
    for file in pending {
        debug!(deploy_id = %created.id, file = %file.name, "uploading file");
        client.upload_file(&created.id, file).await?;
    }

    writer.status("finalizing");
    let ready = client
        .wait_ready(&created.id, settings.poll_interval, settings.poll_attempts)
        .await?;

    let url = ready.public_url(prod).or_else(|| created.public_url(prod));
    let logs_url = ready.logs_url().or_else(|| created.logs_url());

    let mut extra = Extra::new();
    extra.insert("url".into(), json!(url));
    extra.insert("logsUrl".into(), json!(logs_url));
    extra.insert("deployId".into(), json!(ready.id));
    Ok(extra)
}
