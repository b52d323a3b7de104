//! README status section kept in the GitHub destination.
//!
//! The section starts at [`STATUS_HEADING`] and runs until the next
//! level-two heading or the end of the file. It is replaced in place, or
//! appended when missing; the rest of the README is left alone.

use anyhow::Result;
use tracing::debug;

use crate::output::OutputKind;
use crate::upload::{UploadOutcome, Uploader};

pub const README_PATH: &str = "README.md";
pub const STATUS_HEADING: &str = "## 📊 Update status";

/// Used when the repository has no README yet.
const DEFAULT_README: &str = "# Merged VPN configs\n";

/// One output file listed in the status table.
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub kind: OutputKind,
    pub remote_path: String,
    pub count: usize,
}

/// Everything the status section shows.
#[derive(Debug, Clone)]
pub struct ReadmeStatus {
    pub repository: String,
    pub branch: String,
    pub sources: usize,
    /// `HH:MM | DD.MM.YYYY`
    pub updated: String,
    pub rows: Vec<StatusRow>,
}

impl ReadmeStatus {
    fn raw_url(&self, remote_path: &str) -> String {
        format!(
            "https://github.com/{}/raw/{}/{}",
            self.repository, self.branch, remote_path
        )
    }

    /// Markdown for the whole section, ending with a newline.
    pub fn render(&self) -> String {
        let (time, date) = self
            .updated
            .split_once(" | ")
            .unwrap_or((self.updated.as_str(), ""));

        let mut out = format!("{}\n\n", STATUS_HEADING);
        out.push_str("| File | Description | Configs | Update time | Date |\n");
        out.push_str("|------|-------------|---------|-------------|------|\n");
        for row in &self.rows {
            let name = row.kind.file_name();
            let description = match row.kind {
                OutputKind::Merged => format!("{} from {} sources", row.kind.description(), self.sources),
                _ => row.kind.description().to_string(),
            };
            out.push_str(&format!(
                "| [`{}`]({}) | {} | {} | {} | {} |\n",
                name,
                self.raw_url(&row.remote_path),
                description,
                row.count,
                time,
                date
            ));
        }

        let links: Vec<String> = self
            .rows
            .iter()
            .map(|row| format!("[{}]({})", row.kind.file_name(), self.raw_url(&row.remote_path)))
            .collect();
        if !links.is_empty() {
            out.push_str(&format!("\n**Download:** {}\n", links.join(" · ")));
        }
        out
    }
}

/// Replace the status section of `readme` with `section`, or append it.
pub fn update_status_section(readme: Option<&str>, section: &str) -> String {
    let readme = readme.unwrap_or(DEFAULT_README);
    let section = section.trim_end();

    let Some(start) = readme.find(STATUS_HEADING) else {
        return format!("{}\n\n{}\n", readme.trim_end(), section);
    };

    let body_start = start + STATUS_HEADING.len();
    match readme[body_start..].find("\n## ") {
        Some(offset) => {
            let next = body_start + offset + 1;
            format!("{}{}\n\n{}", &readme[..start], section, &readme[next..])
        }
        None => format!("{}{}\n", &readme[..start], section),
    }
}

/// Fetch the README from `uploader`, refresh its status section and upload it.
pub async fn refresh_readme(uploader: &dyn Uploader, status: &ReadmeStatus) -> Result<UploadOutcome> {
    let current = uploader.fetch(README_PATH).await?;
    let updated = update_status_section(current.as_deref(), &status.render());
    if current.as_deref() == Some(updated.as_str()) {
        debug!("README status section already current");
        return Ok(UploadOutcome::Unchanged);
    }
    uploader.upload(&updated, README_PATH).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::MockUploader;

    fn status() -> ReadmeStatus {
        ReadmeStatus {
            repository: "owner/repo".to_string(),
            branch: "main".to_string(),
            sources: 2,
            updated: "12:30 | 01.02.2026".to_string(),
            rows: vec![
                StatusRow {
                    kind: OutputKind::Merged,
                    remote_path: "confs/merged.txt".to_string(),
                    count: 120,
                },
                StatusRow {
                    kind: OutputKind::Whitelist,
                    remote_path: "confs/wl.txt".to_string(),
                    count: 7,
                },
            ],
        }
    }

    #[test]
    fn test_render_table() {
        let section = status().render();
        assert!(section.starts_with("## 📊 Update status\n\n| File |"));
        assert!(section.contains(
            "| [`merged.txt`](https://github.com/owner/repo/raw/main/confs/merged.txt) | All unique configs from 2 sources | 120 | 12:30 | 01.02.2026 |"
        ));
        assert!(section.contains("| 7 | 12:30 | 01.02.2026 |"));
        assert!(section.contains("**Download:** [merged.txt]("));
        assert!(!section.contains("\n## "));
    }

    #[test]
    fn test_append_when_missing() {
        let out = update_status_section(Some("# Title\n\nIntro\n"), "## 📊 Update status\n\nT\n");
        assert_eq!(out, "# Title\n\nIntro\n\n## 📊 Update status\n\nT\n");
    }

    #[test]
    fn test_missing_readme() {
        let out = update_status_section(None, "## 📊 Update status\n\nT\n");
        assert_eq!(out, "# Merged VPN configs\n\n## 📊 Update status\n\nT\n");
    }

    #[test]
    fn test_replace_keeps_following_sections() {
        let readme = "# Title\n\n## 📊 Update status\n\nold table\n\n## Usage\n\nImport the link.\n";
        let out = update_status_section(Some(readme), "## 📊 Update status\n\nnew table\n");
        assert_eq!(
            out,
            "# Title\n\n## 📊 Update status\n\nnew table\n\n## Usage\n\nImport the link.\n"
        );
    }

    #[test]
    fn test_replace_at_end() {
        let readme = "# Title\n\n## 📊 Update status\n\nold\n";
        let out = update_status_section(Some(readme), "## 📊 Update status\n\nnew\n");
        assert_eq!(out, "# Title\n\n## 📊 Update status\n\nnew\n");
    }

    #[test]
    fn test_update_is_stable() {
        let section = status().render();
        let once = update_status_section(Some("# T\n\n## Usage\n\nx\n"), &section);
        let twice = update_status_section(Some(&once), &section);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_refresh_uploads_changed_readme() {
        let mut uploader = MockUploader::new();
        uploader
            .expect_fetch()
            .returning(|_| Ok(Some("# Repo\n".to_string())));
        uploader
            .expect_upload()
            .withf(|content, path| path == README_PATH && content.contains(STATUS_HEADING))
            .times(1)
            .returning(|_, _| Ok(UploadOutcome::Updated));

        let outcome = refresh_readme(&uploader, &status()).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Updated);
    }

    #[tokio::test]
    async fn test_refresh_skips_current_readme() {
        let current = update_status_section(Some("# Repo\n"), &status().render());
        let mut uploader = MockUploader::new();
        uploader
            .expect_fetch()
            .returning(move |_| Ok(Some(current.clone())));
        uploader.expect_upload().times(0);

        let outcome = refresh_readme(&uploader, &status()).await.unwrap();
        assert_eq!(outcome, UploadOutcome::Unchanged);
    }
}
