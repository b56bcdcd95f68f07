// src/actions/archive.rs

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::actions::{conclude, fail};
use crate::protocol::{EventWriter, Extra, Outcome, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    fn action_name(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip-dir",
            ArchiveFormat::Tar | ArchiveFormat::TarGz => "tar-dir",
        }
    }
}

/// One entry to place in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path on disk.
    pub path: PathBuf,
    /// `/`-separated name inside the archive, already under the prefix.
    pub name: String,
    pub is_dir: bool,
}

/// Build the in-archive name for `rel` under `prefix`.
pub fn entry_name(prefix: &str, rel: &Path) -> String {
    let rel: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let rel = rel.join("/");

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        rel
    } else {
        format!("{prefix}/{rel}")
    }
}

/// Every directory and regular file under `src`, in a stable order.
///
/// `exclude` (typically the archive being written) is skipped. Symlinks are
/// not followed and not archived.
pub fn collect_entries(src: &Path, prefix: &str, exclude: Option<&Path>) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {:?}", src))?;
        let path = entry.path();
        if exclude.is_some_and(|ex| ex == path) {
            continue;
        }

        let file_type = entry.file_type();
        if !file_type.is_dir() && !file_type.is_file() {
            debug!(path = ?path, "skipping non-regular entry");
            continue;
        }

        let rel = path
            .strip_prefix(src)
            .with_context(|| format!("{:?} is not under {:?}", path, src))?;
        entries.push(ArchiveEntry {
            path: path.to_path_buf(),
            name: entry_name(prefix, rel),
            is_dir: file_type.is_dir(),
        });
    }

    Ok(entries)
}

/// Write the archive for `src` to `dest`, returning the number of entries.
pub fn write_archive(src: &Path, dest: &Path, prefix: &str, format: ArchiveFormat) -> Result<usize> {
    let src = fs::canonicalize(src).with_context(|| format!("resolving source {:?}", src))?;
    if !src.is_dir() {
        bail!("source {:?} is not a directory", src);
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
    }
    let file = File::create(dest).with_context(|| format!("creating archive {:?}", dest))?;
    let dest_abs = fs::canonicalize(dest).ok();

    let entries = collect_entries(&src, prefix, dest_abs.as_deref())?;
    let out = BufWriter::new(file);

    match format {
        ArchiveFormat::Zip => write_zip(out, &entries)?,
        ArchiveFormat::Tar => {
            let mut out = write_tar(out, &entries)?;
            out.flush()?;
        }
        ArchiveFormat::TarGz => {
            let encoder = write_tar(GzEncoder::new(out, Compression::default()), &entries)?;
            encoder.finish()?.flush()?;
        }
    }

    Ok(entries.len())
}

fn write_zip<W: Write + io::Seek>(out: W, entries: &[ArchiveEntry]) -> Result<()> {
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        if entry.is_dir {
            zip.add_directory(entry.name.as_str(), options)?;
        } else {
            zip.start_file(entry.name.as_str(), options)?;
            let mut file = File::open(&entry.path)
                .with_context(|| format!("opening {:?}", entry.path))?;
            io::copy(&mut file, &mut zip)?;
        }
    }

    let mut out = zip.finish()?;
    out.flush()?;
    Ok(())
}

fn write_tar<W: Write>(out: W, entries: &[ArchiveEntry]) -> Result<W> {
    let mut builder = tar::Builder::new(out);
    builder.follow_symlinks(false);

    for entry in entries {
        if entry.is_dir {
            builder
                .append_dir(&entry.name, &entry.path)
                .with_context(|| format!("adding directory {:?}", entry.path))?;
        } else {
            builder
                .append_path_with_name(&entry.path, &entry.name)
                .with_context(|| format!("adding file {:?}", entry.path))?;
        }
    }

    Ok(builder.into_inner()?)
}

/// `zip-dir` / `tar-dir`: archive `src` into `dest` under `prefix`.
pub async fn run(req: &Request, format: ArchiveFormat, writer: &EventWriter) -> Outcome {
    let (Some(src), Some(dest)) = (req.src(), req.dest()) else {
        return fail(
            writer,
            format!("{} requires src and dest", format.action_name()),
            Outcome::invalid_args(),
        );
    };

    writer.status(format!("archiving {src}"));

    let (src, dest, prefix) = (PathBuf::from(src), PathBuf::from(dest), req.prefix().to_owned());
    let task_dest = dest.clone();
    let task_src = src.clone();
    let res = tokio::task::spawn_blocking(move || {
        write_archive(&task_src, &task_dest, &prefix, format)
    })
    .await
    .context("archive task panicked")
    .and_then(|r| r);

    match res {
        Ok(count) => {
            info!(src = ?src, dest = ?dest, entries = count, ?format, "archive written");
            let mut extra = Extra::new();
            extra.insert("dest".into(), json!(dest.to_string_lossy()));
            conclude(writer, Outcome::success_with(extra))
        }
        Err(err) => fail(writer, format!("{err:#}"), Outcome::failure()),
    }
}
