//! Update command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::aggregator::{Pipeline, PipelineOutput};
use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::lock::LockGuard;
use crate::output::{HeaderInfo, OutputKind};
use crate::readme::{refresh_readme, ReadmeStatus, StatusRow};
use crate::runlog::RunLog;
use crate::selected::rewrite_selected_file;
use crate::stats::RunSummary;
use crate::upload::{
    build_uploaders, upload_all, GitContentsUploader, UploadFile, UPLOAD_TIMEOUT_SECS,
};
use crate::utils::{format_count, format_timestamp, moscow_now};

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Stop after the in-memory stages
    pub dry_run: bool,
    /// Write local files but skip remote destinations
    pub no_upload: bool,
}

/// Run the update command
pub async fn run(dry_run: bool, no_upload: bool, config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let log = RunLog::new();
    let result = execute(&config, UpdateOptions { dry_run, no_upload }, &log).await;

    // The log is printed even when the run stops early
    println!();
    println!("Run log ({}):", format_timestamp(&moscow_now()));
    for line in log.lines() {
        println!("  {}", line);
    }
    println!();

    let summary = result?;
    for line in summary.lines() {
        println!("{}", line);
    }

    Ok(())
}

/// Fetch → Extract → Dedup+Classify → Numbering → Persist → Upload → README.
///
/// Only a run without any candidate fails; fetch, selected-list and upload
/// problems are recorded in `log` and the run continues.
pub async fn execute(config: &Config, options: UpdateOptions, log: &RunLog) -> Result<RunSummary> {
    let updated = format_timestamp(&moscow_now());
    log.push(format!("Run started: {}", updated));

    let _lock = if options.dry_run {
        None
    } else {
        Some(LockGuard::acquire(&config.output_dir)?)
    };

    let whitelist = config.whitelist()?;
    let renumberer = config.renumberer();
    let pipeline = Pipeline::new(config.dedup, whitelist, renumberer.clone());

    log.push(format!(
        "Fetching {} sources with {} workers",
        config.sources.len(),
        config.max_workers.min(config.sources.len()).max(1)
    ));
    let fetcher = Fetcher::new(config.fetch_settings())?;
    let results = fetcher.fetch_all(&config.sources, log).await;

    let mut summary = RunSummary::from_sources(&results);
    let candidates: Vec<String> = results.into_iter().flat_map(|r| r.candidates).collect();
    log.push(format!(
        "Downloaded {} candidates ({} bytes)",
        format_count(candidates.len()),
        format_count(fetcher.total_downloaded())
    ));

    let output = pipeline.run(&candidates, log)?;
    summary.record_pipeline(&output);

    if options.dry_run {
        log.push("Dry run: skipping file writes and uploads");
        return Ok(summary);
    }

    let merged_info = HeaderInfo {
        sources: Some(config.sources.len()),
        updated: updated.clone(),
        whitelist_subnets: None,
    };
    let wl_info = HeaderInfo {
        whitelist_subnets: Some(pipeline.whitelist().len()),
        ..merged_info.clone()
    };

    let merged_path = output.merged.write_to(&config.output_dir, &merged_info)?;
    log.push(format!("Saved {} configs to {}", output.merged.len(), merged_path.display()));
    let wl_path = output.whitelist.write_to(&config.output_dir, &wl_info)?;
    log.push(format!("Saved {} configs to {}", output.whitelist.len(), wl_path.display()));
    summary.files.push(merged_path);
    summary.files.push(wl_path);

    match rewrite_selected_file(&config.selected_file, config.dedup, renumberer.as_ref(), &updated) {
        Ok(Some(outcome)) => {
            log.push(format!(
                "Selected: {} kept, {} duplicates removed",
                outcome.kept, outcome.dropped
            ));
            summary.selected = Some(outcome);
        }
        Ok(None) => info!("No selected file at {:?}, skipping", config.selected_file),
        Err(e) => log.warn(format!("Failed to rewrite selected file: {:#}", e)),
    }

    if options.no_upload {
        log.push("Uploads disabled for this run");
        return Ok(summary);
    }
    if config.uploads.is_empty() {
        log.push("No upload destinations configured");
        return Ok(summary);
    }

    let files = upload_files(config, &output, &merged_info, &wl_info);
    let uploaders = build_uploaders(&config.uploads)?;
    summary.uploads = upload_all(&uploaders, &files, log).await;

    if config.readme {
        update_readme(config, &output, &updated, log).await;
    }

    Ok(summary)
}

fn upload_files(
    config: &Config,
    output: &PipelineOutput,
    merged_info: &HeaderInfo,
    wl_info: &HeaderInfo,
) -> Vec<UploadFile> {
    let mut files = vec![
        UploadFile {
            remote_path: config.remote_path(OutputKind::Merged),
            content: output.merged.render(merged_info),
        },
        UploadFile {
            remote_path: config.remote_path(OutputKind::Whitelist),
            content: output.whitelist.render(wl_info),
        },
    ];

    if let Ok(content) = std::fs::read_to_string(&config.selected_file) {
        files.push(UploadFile {
            remote_path: config.remote_path(OutputKind::Selected),
            content,
        });
    }

    files
}

async fn update_readme(config: &Config, output: &PipelineOutput, updated: &str, log: &RunLog) {
    let Some(github) = &config.uploads.github else {
        return;
    };

    let uploader =
        match GitContentsUploader::github(github, Duration::from_secs(UPLOAD_TIMEOUT_SECS)) {
            Ok(uploader) => uploader,
            Err(e) => {
                log.warn(format!("README update skipped: {:#}", e));
                return;
            }
        };

    let status = ReadmeStatus {
        repository: github.repository.clone(),
        branch: github.branch.clone(),
        sources: config.sources.len(),
        updated: updated.to_string(),
        rows: vec![
            StatusRow {
                kind: OutputKind::Merged,
                remote_path: config.remote_path(OutputKind::Merged),
                count: output.merged.len(),
            },
            StatusRow {
                kind: OutputKind::Whitelist,
                remote_path: config.remote_path(OutputKind::Whitelist),
                count: output.whitelist.len(),
            },
        ],
    };

    match refresh_readme(&uploader, &status).await {
        Ok(outcome) => log.push(format!("README {}", outcome)),
        Err(e) => log.warn(format!("README update failed: {:#}", e)),
    }
}
