use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::batch::{self, Analyzer};
use crate::extract::{self, ReferenceRecord};
use crate::progress::{ProgressState, ProgressStore};
use crate::report::ReportWriter;

pub struct RunOptions {
    pub docs: Vec<PathBuf>,
    pub batch_size: usize,
    pub max_papers: Option<usize>,
    pub batch_delay: Duration,
}

#[derive(Debug)]
pub struct RunSummary {
    pub new_records: usize,
    pub batches: usize,
    pub completed_total: usize,
}

impl RunSummary {
    pub fn print(&self) {
        println!(
            "Processed {} new papers in {} batches ({} completed total).",
            self.new_records, self.batches, self.completed_total,
        );
    }
}

/// Full pipeline over injected stores: load progress, extract new records,
/// batch through the analyzer, append rows, persist progress per batch.
pub fn run(
    opts: &RunOptions,
    store: &ProgressStore,
    report: &ReportWriter,
    analyzer: &dyn Analyzer,
) -> Result<RunSummary> {
    ensure!(opts.batch_size > 0, "batch size must be at least 1");

    let mut state = store
        .load()
        .with_context(|| format!("loading progress from {}", store.path().display()))?;

    let mut records = collect_new_records(&opts.docs, &state)?;
    if let Some(cap) = opts.max_papers {
        records.truncate(cap);
    }

    if records.is_empty() {
        println!(
            "Nothing new to process ({} already completed).",
            state.completed.len()
        );
        return Ok(RunSummary {
            new_records: 0,
            batches: 0,
            completed_total: state.completed.len(),
        });
    }

    report.ensure_header()?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let n_batches = records.len().div_ceil(opts.batch_size);
    for (i, chunk) in records.chunks(opts.batch_size).enumerate() {
        let results = batch::process_batch(chunk, analyzer);
        for result in &results {
            report.append(result)?;
            state.mark_completed(&result.identifier);
        }
        state.last_batch += 1;
        store.save(&state)?;
        pb.inc(chunk.len() as u64);

        // Courtesy pacing for the delegate; skipped after the final batch.
        if i + 1 < n_batches && !opts.batch_delay.is_zero() {
            thread::sleep(opts.batch_delay);
        }
    }
    pb.finish_and_clear();

    println!("Completed identifiers: {}", state.completed.len());
    Ok(RunSummary {
        new_records: records.len(),
        batches: n_batches,
        completed_total: state.completed.len(),
    })
}

/// Extract from every listed document, skipping identifiers already
/// completed and repeats within this run. Order follows the doc list.
fn collect_new_records(docs: &[PathBuf], state: &ProgressState) -> Result<Vec<ReferenceRecord>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    for path in docs {
        let Some(text) = read_source_doc(path)? else {
            continue;
        };
        for record in extract::extract_records(&text) {
            if state.is_completed(&record.identifier) || !seen.insert(record.identifier.clone()) {
                continue;
            }
            records.push(record);
        }
    }
    Ok(records)
}

/// A missing document is skipped with a log line, not an error.
pub fn read_source_doc(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "source document missing, skipping");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Analysis, PendingAnalyzer};
    use anyhow::anyhow;
    use std::fs;

    struct FailingAnalyzer;

    impl Analyzer for FailingAnalyzer {
        fn analyze(&self, _record: &ReferenceRecord) -> Result<Analysis> {
            Err(anyhow!("agent backend unavailable"))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        docs: Vec<PathBuf>,
        store: ProgressStore,
        report: ReportWriter,
    }

    fn fixture(doc_contents: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs: Vec<PathBuf> = doc_contents
            .iter()
            .enumerate()
            .map(|(i, contents)| {
                let path = dir.path().join(format!("doc{i}.md"));
                fs::write(&path, contents).unwrap();
                path
            })
            .collect();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        let report = ReportWriter::new(dir.path().join("dataset.md"));
        Fixture {
            _dir: dir,
            docs,
            store,
            report,
        }
    }

    fn opts(docs: &[PathBuf], batch_size: usize) -> RunOptions {
        RunOptions {
            docs: docs.to_vec(),
            batch_size,
            max_papers: None,
            batch_delay: Duration::ZERO,
        }
    }

    #[test]
    fn single_paper_end_to_end() {
        let fx = fixture(&[
            "[Paper A](https://arxiv.org/abs/2401.00001)\n\n---\n\nNo link in this section.\n",
        ]);

        let summary = run(&opts(&fx.docs, 10), &fx.store, &fx.report, &PendingAnalyzer).unwrap();
        assert_eq!(summary.new_records, 1);
        assert_eq!(summary.batches, 1);

        let state = fx.store.load().unwrap();
        assert!(state.is_completed("2401.00001"));
        assert_eq!(state.completed.len(), 1);
        assert_eq!(state.last_batch, 1);

        let raw = fs::read_to_string(fx.report.path()).unwrap();
        assert!(raw.contains("| Paper A |"));
        assert_eq!(fx.report.row_count().unwrap(), 1);
    }

    #[test]
    fn second_run_appends_nothing() {
        let fx = fixture(&[
            "[Paper A](https://arxiv.org/abs/2401.00001)\n---\n[Paper B](https://arxiv.org/abs/2402.00002)\n",
        ]);
        let opts = opts(&fx.docs, 10);

        run(&opts, &fx.store, &fx.report, &PendingAnalyzer).unwrap();
        assert_eq!(fx.report.row_count().unwrap(), 2);

        let summary = run(&opts, &fx.store, &fx.report, &PendingAnalyzer).unwrap();
        assert_eq!(summary.new_records, 0);
        assert_eq!(fx.report.row_count().unwrap(), 2);
    }

    #[test]
    fn batching_covers_all_records_in_order() {
        let sections: Vec<String> = (1..=5)
            .map(|i| format!("[Paper {i}](https://arxiv.org/abs/240{i}.0000{i})"))
            .collect();
        let doc = sections.join("\n---\n");
        let fx = fixture(&[&doc]);

        let summary = run(&opts(&fx.docs, 2), &fx.store, &fx.report, &PendingAnalyzer).unwrap();
        assert_eq!(summary.new_records, 5);
        assert_eq!(summary.batches, 3); // ceil(5 / 2)

        let state = fx.store.load().unwrap();
        assert_eq!(state.last_batch, 3);
        assert_eq!(state.completed.len(), 5);

        let raw = fs::read_to_string(fx.report.path()).unwrap();
        let rows: Vec<&str> = raw.lines().skip(2).collect();
        assert_eq!(rows.len(), 5);
        for (i, row) in rows.iter().enumerate() {
            assert!(row.contains(&format!("Paper {}", i + 1)), "row {i}: {row}");
        }
    }

    #[test]
    fn limit_caps_new_records() {
        let fx = fixture(&[
            "[A](https://arxiv.org/abs/2401.00001)\n---\n[B](https://arxiv.org/abs/2402.00002)\n",
        ]);
        let mut opts = opts(&fx.docs, 10);
        opts.max_papers = Some(1);

        let summary = run(&opts, &fx.store, &fx.report, &PendingAnalyzer).unwrap();
        assert_eq!(summary.new_records, 1);
        assert_eq!(fx.report.row_count().unwrap(), 1);
    }

    #[test]
    fn missing_doc_contributes_zero_records() {
        let fx = fixture(&["[A](https://arxiv.org/abs/2401.00001)\n"]);
        let mut docs = vec![fx.docs[0].parent().unwrap().join("absent.md")];
        docs.extend(fx.docs.iter().cloned());

        let summary = run(&opts(&docs, 10), &fx.store, &fx.report, &PendingAnalyzer).unwrap();
        assert_eq!(summary.new_records, 1);
    }

    #[test]
    fn duplicate_identifier_across_docs_kept_once() {
        let fx = fixture(&[
            "[A](https://arxiv.org/abs/2401.00001)\n",
            "[A again](https://arxiv.org/abs/2401.00001)\n",
        ]);
        let summary = run(&opts(&fx.docs, 10), &fx.store, &fx.report, &PendingAnalyzer).unwrap();
        assert_eq!(summary.new_records, 1);
    }

    #[test]
    fn failed_delegate_still_marks_completed() {
        let fx = fixture(&["[A](https://arxiv.org/abs/2401.00001)\n"]);

        run(&opts(&fx.docs, 10), &fx.store, &fx.report, &FailingAnalyzer).unwrap();
        let state = fx.store.load().unwrap();
        assert!(state.is_completed("2401.00001"));

        let raw = fs::read_to_string(fx.report.path()).unwrap();
        assert!(raw.contains("Pending analysis"));
    }

    #[test]
    fn corrupt_progress_store_is_fatal() {
        let fx = fixture(&["[A](https://arxiv.org/abs/2401.00001)\n"]);
        fs::write(fx.store.path(), "{not json").unwrap();

        let err = run(&opts(&fx.docs, 10), &fx.store, &fx.report, &PendingAnalyzer).unwrap_err();
        assert!(format!("{err:#}").contains("corrupt"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let fx = fixture(&["[A](https://arxiv.org/abs/2401.00001)\n"]);
        assert!(run(&opts(&fx.docs, 0), &fx.store, &fx.report, &PendingAnalyzer).is_err());
    }
}
