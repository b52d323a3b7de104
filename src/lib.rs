//! # wlmerge - Proxy Config List Aggregator
//!
//! A batch tool that collects proxy share links (vmess, vless, trojan, ss,
//! ssr, tuic, hysteria) from public list URLs, removes duplicates, picks out
//! the links whose server sits on whitelisted IPv4 subnets and republishes
//! the results to git hosts and S3-compatible storage.
//!
//! ## Features
//!
//! - **Tolerant Parsing** - Concatenated links are split, malformed ones are kept, never fatal
//! - **Two Identity Axes** - Deduplicate by `(host, port)` or by credentials + transport parameters
//! - **Whitelist Classification** - CIDR membership for literal IPv4 hosts, no DNS
//! - **Renumbering** - Positional display names with flag emoji and watermark
//! - **Resilient Fetching** - Bounded concurrency with an explicit attempt-policy ladder
//! - **Hand-Picked Lists** - The selected file keeps its comments across rewrites
//! - **Multiple Destinations** - GitHub and Gitea contents APIs, S3 (SigV4)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        wlmerge                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: update, selected, check, subnets, version  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml + environment)                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fetcher (reqwest + rustls)                                 │
//! │    └── AttemptPolicy ladder: verify → no-verify → http      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Link / Identity                                            │
//! │    ├── ParsedLink (per-protocol payload)                    │
//! │    └── extract_host_port, generate_config_key               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Aggregator                                                 │
//! │    ├── Dedup (exact + identity key)                         │
//! │    ├── Whitelist (ipnet)                                    │
//! │    └── Renumberer                                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Output: merged.txt, wl.txt, selected.txt                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Uploaders (Uploader trait)                                 │
//! │    ├── GitHub / Gitea contents API                          │
//! │    └── S3-compatible (SigV4)                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use wlmerge::aggregator::Pipeline;
//! use wlmerge::config::Config;
//! use wlmerge::fetcher::Fetcher;
//! use wlmerge::runlog::RunLog;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::resolve("wlmerge.yaml")?;
//!     let log = RunLog::new();
//!
//!     // Fetch every source concurrently
//!     let fetcher = Fetcher::new(config.fetch_settings())?;
//!     let results = fetcher.fetch_all(&config.sources, &log).await;
//!     let candidates: Vec<String> = results.into_iter().flat_map(|r| r.candidates).collect();
//!
//!     // Dedup, classify and renumber
//!     let pipeline = Pipeline::new(config.dedup, config.whitelist()?, config.renumberer());
//!     let output = pipeline.run(&candidates, &log)?;
//!     println!("{} unique, {} whitelisted", output.merged.len(), output.whitelist.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`aggregator`] - Deduplication, whitelist classification and the run pipeline
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing, environment overrides and validation
//! - [`error`] - Typed errors
//! - [`fetcher`] - HTTP client for downloading source lists
//! - [`identity`] - Endpoint extraction and identity keys
//! - [`link`] - Share-link parsing and candidate extraction
//! - [`lock`] - File locking for concurrent execution prevention
//! - [`output`] - Output files and their headers
//! - [`readme`] - README status section
//! - [`renumber`] - Display-name rewriting
//! - [`runlog`] - Per-run diagnostic collector
//! - [`selected`] - The hand-curated selected list
//! - [`stats`] - Run summary
//! - [`upload`] - Remote destinations
//! - [`utils`] - Common utility functions (formatting, timestamps)
//! - [`validation`] - Input validation
//! - [`whitelist`] - Whitelist subnet set

pub mod aggregator;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod link;
pub mod lock;
pub mod output;
pub mod readme;
pub mod renumber;
pub mod runlog;
pub mod selected;
pub mod stats;
pub mod upload;
pub mod utils;
pub mod validation;
pub mod whitelist;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{LinkError, WlmergeError};
