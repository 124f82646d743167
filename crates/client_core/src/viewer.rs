use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{info, warn};
use uuid::Uuid;

use crate::transport::BackendResponse;

const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// The generated report, owned by whoever presents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ReportDocument {
    /// `owner` names the person the report was generated for and only feeds
    /// the fallback filename.
    pub fn from_response(response: BackendResponse, owner: &str, now: DateTime<Local>) -> Self {
        let content_type = response
            .content_type
            .as_deref()
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let filename = response
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| default_filename(owner, &content_type, now));

        Self {
            filename,
            content_type,
            bytes: response.body,
        }
    }
}

pub fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = header.split(';').map(str::trim).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"'))
    })?;

    // Keep only the last path component so a server cannot steer the write.
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

pub fn default_filename(owner: &str, content_type: &str, now: DateTime<Local>) -> String {
    let slug: String = owner
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let extension = mime_guess::get_mime_extensions_str(content_type)
        .and_then(|extensions| extensions.first())
        .copied()
        .unwrap_or("pdf");
    let stamp = now.format("%Y%m%d-%H%M%S");

    if slug.is_empty() {
        format!("relatorio-{stamp}.{extension}")
    } else {
        format!("relatorio-{slug}-{stamp}.{extension}")
    }
}

/// Where a presented report ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewHandle {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub location: Option<PathBuf>,
}

impl ViewHandle {
    pub fn for_document(document: &ReportDocument, location: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: document.filename.clone(),
            content_type: document.content_type.clone(),
            size_bytes: document.bytes.len(),
            location,
        }
    }

    pub fn describe(&self) -> String {
        match &self.location {
            Some(path) => path.display().to_string(),
            None => self.filename.clone(),
        }
    }
}

#[async_trait]
pub trait DocumentViewer: Send + Sync {
    async fn open(&self, document: ReportDocument) -> Result<ViewHandle>;
}

/// Saves reports into a directory and optionally hands them to the platform
/// viewer.
pub struct DirectoryViewer {
    dir: PathBuf,
    launch_external: bool,
}

impl DirectoryViewer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            launch_external: false,
        }
    }

    pub fn launching_external_viewer(mut self, launch: bool) -> Self {
        self.launch_external = launch;
        self
    }

    async fn free_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !path_exists(&candidate).await {
            return candidate;
        }

        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("relatorio");
        let extension = path.extension().and_then(|ext| ext.to_str());
        let mut counter = 1u32;
        loop {
            let name = match extension {
                Some(ext) => format!("{stem}-{counter}.{ext}"),
                None => format!("{stem}-{counter}"),
            };
            let candidate = self.dir.join(name);
            if !path_exists(&candidate).await {
                return candidate;
            }
            counter += 1;
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[async_trait]
impl DocumentViewer for DirectoryViewer {
    async fn open(&self, document: ReportDocument) -> Result<ViewHandle> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create output directory '{}'", self.dir.display()))?;

        let path = self.free_path(&document.filename).await;
        tokio::fs::write(&path, &document.bytes)
            .await
            .with_context(|| format!("failed to write report to '{}'", path.display()))?;
        info!(path = %path.display(), bytes = document.bytes.len(), "saved report");

        if self.launch_external {
            if let Err(err) = open_in_external_viewer(&path) {
                warn!(path = %path.display(), "failed to open external viewer: {err}");
            }
        }

        Ok(ViewHandle::for_document(&document, Some(path)))
    }
}

fn open_in_external_viewer(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    let result = std::process::Command::new("cmd")
        .args(["/C", "start", "", &path.to_string_lossy()])
        .spawn();

    #[cfg(target_os = "macos")]
    let result = std::process::Command::new("open").arg(path).spawn();

    #[cfg(all(unix, not(target_os = "macos")))]
    let result = std::process::Command::new("xdg-open").arg(path).spawn();

    result.map(|_| ())
}

#[cfg(test)]
#[path = "tests/viewer_tests.rs"]
mod tests;
