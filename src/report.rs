use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::batch::ResultRecord;

pub const TITLE_WIDTH: usize = 50;
pub const SUMMARY_WIDTH: usize = 80;

const HEADER: &str = "\
| Paper Title | ArXiv URL | GitHub URL | Valid | Codebase Summary | Relevance |
|---|---|---|---|---|---|
";

/// Append-only markdown table on disk. Each append opens, writes, and closes
/// the file, so rows already written survive a mid-run interruption.
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ReportWriter { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with its header only if it does not already exist.
    pub fn ensure_header(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.path, HEADER)?;
        Ok(())
    }

    pub fn append(&self, result: &ResultRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_row(result).as_bytes())?;
        Ok(())
    }

    /// Data rows currently in the report (header and separator excluded).
    pub fn row_count(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(raw.lines().count().saturating_sub(2))
    }
}

fn format_row(result: &ResultRecord) -> String {
    let title = clip(&result.title, TITLE_WIDTH);
    let summary = clip(&result.analysis.summary, SUMMARY_WIDTH);
    let github = result.analysis.github_url.as_deref().unwrap_or("-");
    let valid = if result.analysis.github_valid { "yes" } else { "no" };
    format!(
        "| {} | {} | {} | {} | {} | {:.1} |\n",
        title,
        cell(&result.arxiv_url),
        cell(github),
        valid,
        summary,
        result.analysis.score,
    )
}

/// Sanitize then cut to at most `width` chars. Sanitizing first keeps the
/// cut width exact.
fn clip(s: &str, width: usize) -> String {
    cell(s).chars().take(width).collect()
}

// Pipes and newlines would break the table geometry.
fn cell(s: &str) -> String {
    s.replace('|', "/").replace('\n', " ")
}

// ── Tests ──
