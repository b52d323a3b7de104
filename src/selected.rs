//! The hand-curated selected list.
//!
//! The file mixes user comments with links. It is parsed once into a
//! [`SelectedDocument`], only the [`Node::Entry`] nodes are deduplicated and
//! renumbered, and everything else is written back in its original order.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::aggregator::{Admission, Deduplicator};
use crate::identity::DedupStrategy;
use crate::link::is_candidate;
use crate::output::{render_header, write_atomic, HeaderInfo, OutputKind};
use crate::renumber::Renumberer;

/// Minimum run of `#` that closes the managed header block.
const HEADER_RULE_MIN: usize = 10;

/// One line-level element of the selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Managed header block; regenerated on write.
    Header(Vec<String>),
    /// A `#` comment or any other non-link text, kept verbatim.
    Comment(String),
    Blank,
    /// A link, trimmed.
    Entry(String),
}

/// Counts from [`SelectedDocument::process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectedOutcome {
    pub kept: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedDocument {
    nodes: Vec<Node>,
}

/// First line of the header written by [`SelectedDocument::render`].
fn header_title() -> String {
    format!("# {}", OutputKind::Selected.title())
}

fn is_rule(line: &str) -> bool {
    let line = line.trim();
    line.len() >= HEADER_RULE_MIN && line.chars().all(|c| c == '#')
}

impl SelectedDocument {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut nodes = Vec::new();
        let mut rest = &lines[..];

        // Leading `#` block that starts with our title and is closed by a
        // rule line is the managed header
        let leading = lines
            .iter()
            .take_while(|line| line.trim_start().starts_with('#'))
            .count();
        let managed = lines
            .first()
            .is_some_and(|line| line.trim() == header_title());
        let rule = lines[..leading].iter().position(|line| is_rule(line));
        if let Some(rule) = rule.filter(|_| managed) {
            let header_len = rule + 1;
            nodes.push(Node::Header(
                lines[..header_len].iter().map(|l| l.to_string()).collect(),
            ));
            rest = &lines[header_len..];
            // The blank line the header is rendered with
            if rest.first().is_some_and(|line| line.trim().is_empty()) {
                rest = &rest[1..];
            }
        }

        for line in rest {
            let trimmed = line.trim();
            let node = if trimmed.is_empty() {
                Node::Blank
            } else if is_candidate(trimmed) {
                Node::Entry(trimmed.to_string())
            } else {
                Node::Comment(line.to_string())
            };
            nodes.push(node);
        }

        Self { nodes }
    }

    /// Load from disk; `None` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("Selected file {} not found, skipping", path.display());
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selected file: {:?}", path))?;
        Ok(Some(Self::parse(&text)))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn entries(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Entry(link) => Some(link.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drop duplicate entries and renumber the survivors 1..n.
    ///
    /// Non-entry nodes keep their position.
    pub fn process(
        &mut self,
        strategy: DedupStrategy,
        renumberer: Option<&Renumberer>,
    ) -> SelectedOutcome {
        let mut dedup = Deduplicator::new(strategy);
        let mut outcome = SelectedOutcome::default();

        self.nodes.retain(|node| match node {
            Node::Entry(link) => {
                let kept = dedup.admit(link) == Admission::Kept;
                if kept {
                    outcome.kept += 1;
                } else {
                    outcome.dropped += 1;
                }
                kept
            }
            _ => true,
        });

        if let Some(renumberer) = renumberer {
            let mut number = 0;
            for node in &mut self.nodes {
                if let Node::Entry(link) = node {
                    number += 1;
                    *link = renumberer.renumber_one(link, number);
                }
            }
        }

        outcome
    }

    /// Serialize with a freshly rendered header.
    pub fn render(&self, updated: &str) -> String {
        let info = HeaderInfo {
            sources: None,
            updated: updated.to_string(),
            whitelist_subnets: None,
        };
        let mut out = render_header(OutputKind::Selected, self.entries().len(), &info);
        for node in &self.nodes {
            match node {
                Node::Header(_) => continue,
                Node::Comment(text) => out.push_str(text),
                Node::Blank => {}
                Node::Entry(link) => out.push_str(link),
            }
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path, updated: &str) -> Result<()> {
        write_atomic(path, &self.render(updated))
    }
}

/// Load, process and write back the selected file in place.
///
/// Returns `None` when the file does not exist.
pub fn rewrite_selected_file(
    path: &Path,
    strategy: DedupStrategy,
    renumberer: Option<&Renumberer>,
    updated: &str,
) -> Result<Option<SelectedOutcome>> {
    let Some(mut doc) = SelectedDocument::load(path)? else {
        return Ok(None);
    };
    let outcome = doc.process(strategy, renumberer);
    doc.save(path, updated)?;
    Ok(Some(outcome))
}
