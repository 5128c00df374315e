//! Templated document generation for new application folders.
//!
//! Copies the user's CV and cover-letter templates into the role folder
//! under role-specific names. Existing documents are never overwritten.
//! Text cover letters get their `{Date}`, `{Company}` and `{Role}`
//! placeholders filled in right after they are copied.

use crate::config::ConfigService;
use crate::domain::write_atomic;
use crate::error::TrackResult;
use async_trait::async_trait;
use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_USER_NAME: &str = "User";

const COPY_ATTEMPTS: u32 = 3;
const COPY_RETRY_DELAY: Duration = Duration::from_secs(1);

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate_documents(&self, company: &str, role: &str, target: &Path)
    -> TrackResult<()>;
}

/// Copies templates named in the workspace configuration.
pub struct TemplateDocuments {
    config: Arc<ConfigService>,
    retry_delay: Duration,
}

/// What happened to a single target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Created,
    AlreadyExists,
    TemplateMissing,
}

impl TemplateDocuments {
    pub fn new(config: Arc<ConfigService>) -> Self {
        TemplateDocuments {
            config,
            retry_delay: COPY_RETRY_DELAY,
        }
    }

    /// Overrides the wait between copy attempts on a locked file.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Copies `source` to `dest` unless `dest` already exists.
    ///
    /// I/O failures are retried, since the destination is often briefly
    /// locked by a word processor or sync client.
    async fn copy_template(&self, source: &Path, dest: &Path) -> io::Result<CopyOutcome> {
        if !tokio::fs::try_exists(source).await? {
            warn!(path = %source.display(), "template file not found");
            return Ok(CopyOutcome::TemplateMissing);
        }

        let mut attempt = 1;
        loop {
            match copy_if_absent(source, dest).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < COPY_ATTEMPTS => {
                    warn!(
                        path = %dest.display(),
                        attempt,
                        error = %e,
                        "file locked, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl DocumentGenerator for TemplateDocuments {
    async fn generate_documents(
        &self,
        company: &str,
        role: &str,
        target: &Path,
    ) -> TrackResult<()> {
        let workspace = self.config.workspace();
        let (Some(cv_template), Some(cl_template)) = (
            workspace.cv_template_path.as_deref(),
            workspace.cover_letter_template_path.as_deref(),
        ) else {
            warn!("template paths are not configured, skipping document generation");
            return Ok(());
        };

        let user = workspace.user_name.as_deref().unwrap_or(DEFAULT_USER_NAME);
        let names = DocumentNames::new(user, role, cv_template, cl_template);
        let cv_dest = target.join(&names.cv);
        let cl_dest = target.join(&names.cover_letter);

        let cv = self.copy_template(cv_template, &cv_dest).await;
        if let Ok(CopyOutcome::Created) = cv {
            info!(file = %names.cv, "generated document");
        }

        let cl = match self.copy_template(cl_template, &cl_dest).await {
            Ok(CopyOutcome::Created) => {
                info!(file = %names.cover_letter, "generated document");
                fill_placeholders(&cl_dest, company, role).await
            }
            other => other.map(|_| ()),
        };

        if let Err(e) = &cv {
            error!(path = %cv_dest.display(), error = %e, "failed to generate document");
        }
        if let Err(e) = &cl {
            error!(path = %cl_dest.display(), error = %e, "failed to generate document");
        }

        cv?;
        cl?;
        Ok(())
    }
}

/// File names of the generated documents for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNames {
    pub cv: String,
    pub cover_letter: String,
}

impl DocumentNames {
    pub fn new(user: &str, role: &str, cv_template: &Path, cl_template: &Path) -> Self {
        let role = clean_role(role);
        DocumentNames {
            cv: format!("{user}_CV_{role}{}", extension_of(cv_template)),
            cover_letter: format!("{user}_Cover Letter_{role}{}", extension_of(cl_template)),
        }
    }
}

/// Keeps only characters that are safe in a file name on every platform.
pub fn clean_role(role: &str) -> String {
    role.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .trim()
        .to_string()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

async fn copy_if_absent(source: &Path, dest: &Path) -> io::Result<CopyOutcome> {
    if tokio::fs::try_exists(dest).await? {
        return Ok(CopyOutcome::AlreadyExists);
    }
    tokio::fs::copy(source, dest).await?;
    Ok(CopyOutcome::Created)
}

/// Replaces placeholders in a freshly copied text document.
///
/// Binary formats are left as copied.
async fn fill_placeholders(path: &Path, company: &str, role: &str) -> io::Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let Ok(text) = String::from_utf8(bytes) else {
        debug!(path = %path.display(), "cover letter is not plain text, leaving placeholders");
        return Ok(());
    };

    let date = Local::now().format("%-d, %B %Y").to_string();
    let filled = substitute(&text, &date, company, role);
    if filled == text {
        return Ok(());
    }

    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, filled.as_bytes()))
        .await
        .map_err(io::Error::other)??;
    info!("updated placeholders in cover letter");
    Ok(())
}

pub fn substitute(text: &str, date: &str, company: &str, role: &str) -> String {
    text.replace("{Date}", date)
        .replace("{Company}", company)
        .replace("{Role}", role)
}
