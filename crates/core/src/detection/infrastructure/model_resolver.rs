//! Locates the face detection model on disk, downloading it on request.
//!
//! No download location is built in: the model is looked up in the per-user
//! cache and an optional bundled directory, and fetched only when the caller
//! supplies a URL. Downloads land in the cache under a `.part` name and are
//! renamed into place only once they are complete and look like ONNX.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

/// Serialized ONNX `ModelProto`s open with field 1 (`ir_version`, varint).
const ONNX_FIRST_BYTE: u8 = 0x08;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model {name} not found (searched {})", display_paths(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("transfer from {url} into {path} failed: {source}")]
    Transfer {
        url: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download from {url} stopped at {received} of {expected} bytes")]
    Incomplete {
        url: String,
        received: u64,
        expected: u64,
    },
    #[error("{url} did not return an ONNX model")]
    NotOnnx { url: String },
    #[error("failed to move model into {path}: {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where a model may be found, in lookup order after the user cache.
#[derive(Debug, Clone, Copy)]
pub struct ModelSource<'a> {
    pub name: &'a str,
    /// Directory shipped alongside the binary or passed by the user.
    pub bundled_dir: Option<&'a Path>,
    /// Fetched into the cache when no local copy exists.
    pub url: Option<&'a str>,
}

/// Resolves `source` to a model file path.
///
/// Lookup order: user cache, bundled directory, then a download when a URL
/// is given. Without one, a missing model is [`ModelResolveError::NotFound`].
pub fn resolve(
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(
        &model_cache_dir()?,
        source,
        &reqwest::blocking::Client::new(),
        progress,
    )
}

fn resolve_in(
    cache_dir: &Path,
    source: &ModelSource<'_>,
    client: &reqwest::blocking::Client,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let mut searched = vec![cache_dir.join(source.name)];
    if let Some(dir) = source.bundled_dir {
        searched.push(dir.join(source.name));
    }
    if let Some(found) = searched.iter().find(|p| p.is_file()) {
        log::debug!("Using model {}", found.display());
        return Ok(found.clone());
    }

    let Some(url) = source.url else {
        return Err(ModelResolveError::NotFound {
            name: source.name.to_string(),
            searched,
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    let dest = cache_dir.join(source.name);
    log::info!("Downloading {} from {url}", source.name);
    fetch(client, url, &dest, progress)?;
    Ok(dest)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceCapture/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceCapture/models/` or `~/.cache/FaceCapture/models/`
/// - Windows: `%LOCALAPPDATA%/FaceCapture/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Downloads `url` to `dest`; nothing is left behind on failure.
fn fetch(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let part = dest.with_extension("part");
    let result = fetch_to_part(client, url, &part, progress).and_then(|()| {
        fs::rename(&part, dest).map_err(|e| ModelResolveError::Install {
            path: dest.to_path_buf(),
            source: e,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn fetch_to_part(
    client: &reqwest::blocking::Client,
    url: &str,
    part: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let download_err = |e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    };
    let transfer_err = |e| ModelResolveError::Transfer {
        url: url.to_string(),
        path: part.to_path_buf(),
        source: e,
    };

    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let expected = response.content_length().unwrap_or(0);

    let file = fs::File::create(part).map_err(transfer_err)?;
    let mut sink = ProgressWriter {
        inner: file,
        written: 0,
        total: expected,
        first_byte: None,
        progress,
    };
    io::copy(&mut response, &mut sink).map_err(transfer_err)?;
    sink.flush().map_err(transfer_err)?;

    if expected > 0 && sink.written != expected {
        return Err(ModelResolveError::Incomplete {
            url: url.to_string(),
            received: sink.written,
            expected,
        });
    }
    if sink.first_byte != Some(ONNX_FIRST_BYTE) {
        return Err(ModelResolveError::NotOnnx {
            url: url.to_string(),
        });
    }
    Ok(())
}

/// Counts bytes on their way to disk and reports them to the progress callback.
struct ProgressWriter<W: Write> {
    inner: W,
    written: u64,
    total: u64,
    first_byte: Option<u8>,
    progress: Option<ProgressFn>,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if self.first_byte.is_none() && n > 0 {
            self.first_byte = Some(buf[0]);
        }
        self.written += n as u64;
        if let Some(cb) = &self.progress {
            cb(self.written, self.total);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
