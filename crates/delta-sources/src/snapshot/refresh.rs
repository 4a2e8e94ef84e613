//! Snapshot refresh: conditional archive download with ETag caching.
//!
//! An archive is only downloaded when the server's ETag differs from the one
//! recorded for its URL. Downloaded archives are extracted into the cache
//! directory and removed afterwards.

use crate::error::SnapshotError;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::{header, Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Name of the ETag store inside the cache directory.
const ETAG_FILE: &str = "etag.json";

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// A downloadable snapshot of a third-party repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSpec {
    /// Friendly name for log lines
    pub name: &'static str,
    /// Zip archive URL
    pub archive_url: &'static str,
    /// Top-level directory the archive unpacks to
    pub dir_name: &'static str,
    /// Only entries under this archive path are extracted
    pub extract_prefix: Option<&'static str>,
}

impl SnapshotSpec {
    /// Nuclei scanner templates.
    pub const NUCLEI_TEMPLATES: Self = Self {
        name: "Nuclei Templates",
        archive_url: "https://github.com/projectdiscovery/nuclei-templates/archive/refs/heads/main.zip",
        dir_name: "nuclei-templates-main",
        extract_prefix: None,
    };

    /// PoC-in-GitHub repository index.
    pub const POC_IN_GITHUB: Self = Self {
        name: "PoC in GitHub",
        archive_url: "https://github.com/nomi-sec/PoC-in-GitHub/archive/refs/heads/master.zip",
        dir_name: "PoC-in-GitHub-master",
        extract_prefix: None,
    };

    /// Metasploit framework modules.
    pub const METASPLOIT: Self = Self {
        name: "Metasploit",
        archive_url: "https://github.com/rapid7/metasploit-framework/archive/refs/heads/master.zip",
        dir_name: "metasploit-framework-master",
        extract_prefix: Some("metasploit-framework-master/modules/"),
    };

    /// Local directory of this snapshot under `cache_dir`.
    #[must_use]
    pub fn local_dir(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.dir_name)
    }
}

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Server reported no change
    UpToDate,
    /// A new archive was downloaded and extracted
    Updated,
}

/// Brings a local snapshot up to date.
#[async_trait]
pub trait SnapshotRefresher: Send + Sync {
    /// Refresh one snapshot.
    ///
    /// # Errors
    /// Returns error if the download or extraction fails.
    async fn refresh(&self, spec: &SnapshotSpec) -> Result<RefreshOutcome, SnapshotError>;
}

/// Downloads zip archives over HTTP and unpacks them into the cache directory.
pub struct ArchiveRefresher {
    client: Client,
    cache_dir: PathBuf,
    progress: bool,
}

impl ArchiveRefresher {
    /// Create a refresher writing into `cache_dir`.
    #[must_use]
    pub fn new(client: Client, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            cache_dir: cache_dir.into(),
            progress: false,
        }
    }

    /// Draw a byte-count progress bar on stderr while archives download.
    #[must_use]
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Cache directory snapshots are extracted into.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn load_etags(&self) -> Result<BTreeMap<String, String>, SnapshotError> {
        let path = self.cache_dir.join(ETAG_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_etag(&self, url: &str, etag: &str) -> Result<(), SnapshotError> {
        let mut etags = self.load_etags().await?;
        etags.insert(url.to_string(), etag.to_string());
        let contents = serde_json::to_string_pretty(&etags)?;
        tokio::fs::write(self.cache_dir.join(ETAG_FILE), contents).await?;
        Ok(())
    }

    /// Stream the response body into `path`. Returns the bytes written.
    async fn download(
        &self,
        spec: &SnapshotSpec,
        mut response: Response,
        path: &Path,
    ) -> Result<u64, SnapshotError> {
        let bar = download_bar(spec.name, response.content_length(), self.progress);

        let result = async {
            let mut file = tokio::fs::File::create(path).await?;
            let mut written: u64 = 0;
            while let Some(chunk) =
                response.chunk().await.map_err(|source| SnapshotError::Download {
                    name: spec.name.to_string(),
                    source,
                })?
            {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
                bar.inc(chunk.len() as u64);
            }
            file.flush().await?;
            Ok::<_, SnapshotError>(written)
        }
        .await;

        bar.finish_and_clear();
        result
    }
}

fn download_bar(name: &str, len: Option<u64>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::with_draw_target(len, ProgressDrawTarget::stderr());
    let template = if len.is_some() {
        "{spinner:.cyan} {msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})"
    } else {
        "{spinner:.cyan} {msg} {bytes} ({bytes_per_sec})"
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=> ").tick_chars(TICK_CHARS));
    }
    bar.set_message(format!("Downloading {name}"));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Remove a downloaded archive. A missing file is not an error.
async fn discard_archive(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "archive removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove archive"),
    }
}

#[async_trait]
impl SnapshotRefresher for ArchiveRefresher {
    async fn refresh(&self, spec: &SnapshotSpec) -> Result<RefreshOutcome, SnapshotError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let etags = self.load_etags().await?;
        let mut request = self.client.get(spec.archive_url);
        if let Some(etag) = etags.get(spec.archive_url) {
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(|source| SnapshotError::Download {
            name: spec.name.to_string(),
            source,
        })?;

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                info!(snapshot = spec.name, "no updates found, skipping download");
                return Ok(RefreshOutcome::UpToDate);
            }
            StatusCode::OK => {}
            status => {
                return Err(SnapshotError::Status {
                    name: spec.name.to_string(),
                    status: status.as_u16(),
                });
            }
        }

        let new_etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        info!(snapshot = spec.name, "update found, downloading archive");
        let archive_path = self.cache_dir.join(format!("{}.zip", spec.dir_name));
        let written = match self.download(spec, response, &archive_path).await {
            Ok(written) => written,
            Err(e) => {
                discard_archive(&archive_path).await;
                return Err(e);
            }
        };
        debug!(snapshot = spec.name, bytes = written, "archive downloaded");

        let name = spec.name.to_string();
        let prefix = spec.extract_prefix.map(str::to_string);
        let cache_dir = self.cache_dir.clone();
        let archive = archive_path.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            extract_archive(&archive, prefix.as_deref(), &cache_dir).map_err(|source| {
                SnapshotError::Archive { name, source }
            })
        })
        .await;

        discard_archive(&archive_path).await;
        let extracted = extracted??;

        if let Some(etag) = new_etag {
            self.save_etag(spec.archive_url, &etag).await?;
        }

        info!(
            snapshot = spec.name,
            files = extracted,
            dir = %self.cache_dir.display(),
            "download and extraction completed"
        );
        Ok(RefreshOutcome::Updated)
    }
}

/// Extract entries of `archive` under `prefix` into `dest`.
///
/// Entries whose names would escape `dest` are skipped. Returns the number of
/// files written.
pub fn extract_archive(
    archive: &Path,
    prefix: Option<&str>,
    dest: &Path,
) -> Result<usize, zip::result::ZipError> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut written = 0;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;

        if let Some(prefix) = prefix {
            if !entry.name().starts_with(prefix) {
                continue;
            }
        }

        let Some(relative) = entry.enclosed_name() else {
            debug!(entry = entry.name(), "skipping archive entry outside destination");
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
            written += 1;
        }
    }

    Ok(written)
}
