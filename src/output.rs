//! Output sets and the text files they are written to.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Width of the `#` rule closing every header block.
pub const HEADER_RULE_WIDTH: usize = 50;

/// Which file an [`OutputSet`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// All unique links.
    Merged,
    /// Links whose host is a whitelisted IPv4 address.
    Whitelist,
    /// The hand-curated selected list.
    Selected,
}

impl OutputKind {
    pub fn file_name(self) -> &'static str {
        match self {
            OutputKind::Merged => "merged.txt",
            OutputKind::Whitelist => "wl.txt",
            OutputKind::Selected => "selected.txt",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            OutputKind::Merged => "Merged configs",
            OutputKind::Whitelist => "Whitelist configs",
            OutputKind::Selected => "Selected configs",
        }
    }

    /// Short description used in the README status table.
    pub fn description(self) -> &'static str {
        match self {
            OutputKind::Merged => "All unique configs",
            OutputKind::Whitelist => "Configs on whitelisted subnets",
            OutputKind::Selected => "Hand-picked configs",
        }
    }
}

/// Values shown in a file header besides the count.
#[derive(Debug, Clone, Default)]
pub struct HeaderInfo {
    /// Number of configured sources, when the file is built from sources.
    pub sources: Option<usize>,
    /// Formatted update timestamp.
    pub updated: String,
    /// Number of whitelist subnets, for `wl.txt`.
    pub whitelist_subnets: Option<usize>,
}

/// Render the managed header block, including the trailing blank line.
pub fn render_header(kind: OutputKind, total: usize, info: &HeaderInfo) -> String {
    let mut out = match info.sources {
        Some(sources) => format!("# {} (sources: {})\n", kind.title(), sources),
        None => format!("# {}\n", kind.title()),
    };
    out.push_str(&format!("# Updated: {}\n", info.updated));
    out.push_str(&format!("# Total configs: {}\n", total));
    if let Some(subnets) = info.whitelist_subnets {
        out.push_str(&format!("# Whitelist subnets: {}\n", subnets));
    }
    out.push_str(&"#".repeat(HEADER_RULE_WIDTH));
    out.push_str("\n\n");
    out
}

/// An ordered list of links destined for one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSet {
    kind: OutputKind,
    links: Vec<String>,
}

impl OutputSet {
    pub fn new(kind: OutputKind, links: Vec<String>) -> Self {
        Self { kind, links }
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Full file content: header followed by one link per line.
    pub fn render(&self, info: &HeaderInfo) -> String {
        let mut out = render_header(self.kind, self.links.len(), info);
        for link in &self.links {
            out.push_str(link);
            out.push('\n');
        }
        out
    }

    /// Render and atomically write into `dir`, returning the file path.
    pub fn write_to(&self, dir: &Path, info: &HeaderInfo) -> Result<PathBuf> {
        let path = dir.join(self.kind.file_name());
        write_atomic(&path, &self.render(info))?;
        debug!("Wrote {} links to {}", self.links.len(), path.display());
        Ok(path)
    }
}

/// Write `content` to `path` via a temp file in the same directory.
///
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("Failed to create directory: {:?}", parent_dir))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .context("Failed to create temporary output file")?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist output file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn info() -> HeaderInfo {
        HeaderInfo {
            sources: Some(2),
            updated: "12:30 | 01.02.2026".to_string(),
            whitelist_subnets: None,
        }
    }

    #[test]
    fn test_merged_header() {
        let header = render_header(OutputKind::Merged, 5, &info());
        let expected = format!(
            "# Merged configs (sources: 2)\n# Updated: 12:30 | 01.02.2026\n# Total configs: 5\n{}\n\n",
            "#".repeat(50)
        );
        assert_eq!(header, expected);
    }

    #[test]
    fn test_whitelist_header_lists_subnets() {
        let mut info = info();
        info.whitelist_subnets = Some(27);
        let header = render_header(OutputKind::Whitelist, 1, &info);
        assert!(header.starts_with("# Whitelist configs (sources: 2)\n"));
        assert!(header.contains("# Total configs: 1\n# Whitelist subnets: 27\n"));
    }

    #[test]
    fn test_selected_header_without_sources() {
        let header = render_header(
            OutputKind::Selected,
            0,
            &HeaderInfo {
                sources: None,
                updated: "t".to_string(),
                whitelist_subnets: None,
            },
        );
        assert!(header.starts_with("# Selected configs\n# Updated: t\n"));
    }

    #[test]
    fn test_render_body() {
        let set = OutputSet::new(
            OutputKind::Merged,
            vec!["vless://a@h:1".to_string(), "trojan://b@h:2".to_string()],
        );
        let content = set.render(&info());
        assert!(content.ends_with("\n\nvless://a@h:1\ntrojan://b@h:2\n"));
    }

    #[test]
    fn test_write_to_creates_dir() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("confs");
        let set = OutputSet::new(OutputKind::Whitelist, vec!["x".to_string()]);

        let path = set.write_to(&out_dir, &info()).unwrap();
        assert_eq!(path, out_dir.join("wl.txt"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("x\n"));
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
