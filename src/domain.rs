use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Status given to an application the first time its folder is seen.
pub const DEFAULT_STATUS: &str = "Applied";

/// Timestamp layout used for the `created_at` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A `root/Company/Role` directory that the store should track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationFolder {
    pub company: String,
    pub role: String,
    pub path: PathBuf,
}

impl ApplicationFolder {
    /// Classifies `candidate` against `root`.
    ///
    /// Returns `Some` only when the candidate currently exists as a directory
    /// exactly two levels below the root. The root itself, company folders,
    /// anything nested inside a role folder, and paths that have vanished
    /// all yield `None`.
    ///
    /// Both paths are canonicalized first, so `path` on the result is the
    /// canonical form used as the store key.
    pub fn classify(root: &Path, candidate: &Path) -> Option<ApplicationFolder> {
        let root = dunce::canonicalize(root).ok()?;
        let folder = dunce::canonicalize(candidate).ok()?;
        if !folder.is_dir() {
            return None;
        }

        let relative = folder.strip_prefix(&root).ok()?;
        let mut segments = relative.components().map(|c| match c {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        });

        let (Some(Some(company)), Some(Some(role)), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            return None;
        };

        Some(ApplicationFolder {
            company: company.to_owned(),
            role: role.to_owned(),
            path: folder,
        })
    }

    /// Creation time of the folder, falling back to its modification time on
    /// filesystems that do not record birth time.
    pub fn created_at(&self) -> io::Result<DateTime<Utc>> {
        let meta = fs::metadata(&self.path)?;
        let stamp = meta.created().or_else(|_| meta.modified())?;
        Ok(DateTime::<Utc>::from(stamp))
    }
}

/// A row of the application store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub id: i64,
    pub company: String,
    pub role: String,
    pub folder_path: PathBuf,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
}

/// Relative depth of `path` below `root`, or `None` if it lies outside.
pub fn depth_below(root: &Path, path: &Path) -> Option<usize> {
    path.strip_prefix(root)
        .ok()
        .map(|relative| relative.components().count())
}

pub fn format_timestamp(stamp: &DateTime<Utc>) -> String {
    stamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

/// Writes `data` to a temporary file next to `path` and renames it into place,
/// so readers never observe a half-written file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
