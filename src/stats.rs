//! Per-run statistics and the end-of-run summary.

use std::path::PathBuf;

use crate::aggregator::PipelineOutput;
use crate::fetcher::SourceResult;
use crate::selected::SelectedOutcome;
use crate::upload::UploadReport;
use crate::utils::format_count;

const RULE_WIDTH: usize = 50;

/// Statistics for a single source
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    pub label: String,
    pub url: String,
    pub candidates: usize,
    pub bytes: usize,
    pub error: Option<String>,
}

impl From<&SourceResult> for SourceStats {
    fn from(result: &SourceResult) -> Self {
        Self {
            label: result.label.clone(),
            url: result.url.clone(),
            candidates: result.candidates.len(),
            bytes: result.bytes,
            error: result.error.clone(),
        }
    }
}

/// Everything reported at the end of an `update` run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub sources: Vec<SourceStats>,
    /// Candidates downloaded across all sources
    pub downloaded: usize,
    pub unique: usize,
    pub exact_duplicates: usize,
    pub identity_duplicates: usize,
    pub unidentified: usize,
    pub whitelisted: usize,
    pub files: Vec<PathBuf>,
    pub uploads: Vec<UploadReport>,
    pub selected: Option<SelectedOutcome>,
}

impl RunSummary {
    pub fn from_sources(results: &[SourceResult]) -> Self {
        let sources: Vec<SourceStats> = results.iter().map(SourceStats::from).collect();
        Self {
            downloaded: sources.iter().map(|s| s.candidates).sum(),
            sources,
            ..Default::default()
        }
    }

    pub fn record_pipeline(&mut self, output: &PipelineOutput) {
        self.unique = output.merged.len();
        self.whitelisted = output.whitelist.len();
        self.exact_duplicates = output.exact_duplicates;
        self.identity_duplicates = output.identity_duplicates;
        self.unidentified = output.unidentified;
    }

    pub fn duplicates(&self) -> usize {
        self.exact_duplicates + self.identity_duplicates
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    /// Summary block as display lines.
    pub fn lines(&self) -> Vec<String> {
        let rule = "=".repeat(RULE_WIDTH);
        let mut lines = vec![rule.clone(), "SUMMARY:".to_string()];

        let failed = self.failed_sources();
        if failed > 0 {
            lines.push(format!(
                "   Sources: {} ({} failed)",
                self.sources.len(),
                failed
            ));
        } else {
            lines.push(format!("   Sources: {}", self.sources.len()));
        }
        lines.push(format!("   Downloaded: {}", format_count(self.downloaded)));
        lines.push(format!("   Unique: {}", format_count(self.unique)));
        lines.push(format!(
            "   Duplicates: {} (exact {}, identity {})",
            format_count(self.duplicates()),
            self.exact_duplicates,
            self.identity_duplicates
        ));
        if self.unidentified > 0 {
            lines.push(format!("   Without endpoint: {}", self.unidentified));
        }
        lines.push(format!("   Whitelisted: {}", format_count(self.whitelisted)));

        if let Some(selected) = &self.selected {
            lines.push(format!(
                "   Selected: {} kept, {} dropped",
                selected.kept, selected.dropped
            ));
        }
        for file in &self.files {
            lines.push(format!("   File: {}", file.display()));
        }
        for report in &self.uploads {
            let status = match &report.result {
                Ok(outcome) => outcome.to_string(),
                Err(_) => "FAILED".to_string(),
            };
            lines.push(format!(
                "   Upload: {} {} {}",
                report.destination, report.remote_path, status
            ));
        }

        lines.push(rule);
        lines
    }
}
