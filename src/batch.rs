use anyhow::Result;
use tracing::warn;

use crate::extract::ReferenceRecord;

pub const PENDING_SUMMARY: &str = "Pending analysis";

/// The delegate's response shape for one record.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub github_url: Option<String>,
    pub github_valid: bool,
    pub summary: String,
    pub score: f32,
}

impl Default for Analysis {
    fn default() -> Self {
        Analysis {
            github_url: None,
            github_valid: false,
            summary: PENDING_SUMMARY.to_string(),
            score: 0.0,
        }
    }
}

/// Boundary to the external analysis agent. One call per record.
pub trait Analyzer {
    fn analyze(&self, record: &ReferenceRecord) -> Result<Analysis>;
}

/// Stands in until a live agent backend is wired to the boundary; every
/// record gets the placeholder analysis.
pub struct PendingAnalyzer;

impl Analyzer for PendingAnalyzer {
    fn analyze(&self, _record: &ReferenceRecord) -> Result<Analysis> {
        Ok(Analysis::default())
    }
}

/// One dataset row in the making: a record's identity plus its analysis.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub title: String,
    pub arxiv_url: String,
    pub identifier: String,
    pub analysis: Analysis,
}

/// Analyze one batch, in order, one result per input. A delegate failure
/// degrades that record to the placeholder analysis; it never aborts the
/// batch, and the caller still marks the record completed afterwards.
pub fn process_batch(records: &[ReferenceRecord], analyzer: &dyn Analyzer) -> Vec<ResultRecord> {
    records
        .iter()
        .map(|record| {
            let analysis = match analyzer.analyze(record) {
                Ok(analysis) => analysis,
                Err(err) => {
                    warn!(
                        identifier = %record.identifier,
                        error = %err,
                        "analysis delegate failed, recording placeholder"
                    );
                    Analysis::default()
                }
            };
            ResultRecord {
                title: record.title.clone(),
                arxiv_url: record.arxiv_url.clone(),
                identifier: record.identifier.clone(),
                analysis,
            }
        })
        .collect()
}

// ── Tests ──
