// src/actions/checksum.rs

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::actions::{conclude, fail};
use crate::protocol::{EventWriter, Extra, Outcome, Request};

/// Hash algorithms accepted in `algo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha256,
    Blake3,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Blake3 => "blake3",
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "sha256" | "sha-256" => Ok(Algorithm::Sha256),
            "blake3" => Ok(Algorithm::Blake3),
            other => Err(format!(
                "unsupported checksum algorithm \"{other}\" (expected sha256 or blake3)"
            )),
        }
    }
}

/// Stream the file through the hasher and return the lowercase hex digest.
pub fn digest_file(path: &Path, algo: Algorithm) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = vec![0u8; 64 * 1024];

    let digest = match algo {
        Algorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            format!("{:x}", hasher.finalize())
        }
        Algorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            hasher.finalize().to_hex().to_string()
        }
    };

    debug!(path = ?path, algo = algo.name(), digest = %digest, "computed file digest");
    Ok(digest)
}

/// `checksum-file`: hash `src` with `algo` (default sha256).
pub async fn run(req: &Request, writer: &EventWriter) -> Outcome {
    let Some(src) = req.src().map(str::to_owned) else {
        return fail(writer, "checksum-file requires src", Outcome::invalid_args());
    };

    let algo: Algorithm = match req.algo.as_deref().unwrap_or("sha256").parse() {
        Ok(algo) => algo,
        Err(msg) => return fail(writer, msg, Outcome::invalid_args()),
    };

    let path = src.clone();
    let res = tokio::task::spawn_blocking(move || digest_file(Path::new(&path), algo))
        .await
        .context("checksum task panicked")
        .and_then(|r| r);

    match res {
        Ok(digest) => {
            info!(src = %src, algo = algo.name(), "checksum computed");
            let mut extra = Extra::new();
            extra.insert("algo".into(), json!(algo.name()));
            extra.insert("digest".into(), json!(digest));
            conclude(writer, Outcome::success_with(extra))
        }
        Err(err) => fail(writer, format!("{err:#}"), Outcome::failure()),
    }
}
