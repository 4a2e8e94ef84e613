//! Terminal rendering of report trees.

use console::Style;
use delta_core::{DisplayConfig, Highlight, NodeKind, ReportNode, ReportTree, Severity};
use delta_sources::{RefreshOutcome, Section, SnapshotError};
use std::fmt::Write;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const GUIDE: &str = "│   ";
const BLANK: &str = "    ";

/// Where a section's data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Read from a snapshot on disk.
    Local,
    /// Fetched from a web service at search time.
    Remote,
}

impl Origin {
    /// Origin of a section, from the kind of source behind it.
    pub fn of(section: &Section) -> Self {
        if section.source().is_snapshot_backed() {
            Origin::Local
        } else {
            Origin::Remote
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Origin::Local => "📂",
            Origin::Remote => "🌐",
        }
    }
}

/// How reports are styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    color: bool,
    icons: bool,
}

impl Theme {
    /// Theme from the display settings.
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self {
            color: config.color,
            icons: config.icons,
        }
    }

    /// Unstyled output without icons.
    pub fn plain() -> Self {
        Self {
            color: false,
            icons: false,
        }
    }

    fn style(&self, style: Style) -> Style {
        if self.color {
            style
        } else {
            Style::new()
        }
    }

    fn section(&self) -> Style {
        self.style(Style::new().bold().cyan())
    }

    fn record(&self) -> Style {
        self.style(Style::new().green())
    }

    fn group(&self) -> Style {
        self.style(Style::new().bold())
    }

    fn notice(&self) -> Style {
        self.style(Style::new().yellow())
    }

    fn error(&self) -> Style {
        self.style(Style::new().red())
    }

    fn dim(&self) -> Style {
        self.style(Style::new().dim())
    }

    fn highlight(&self, highlight: Option<&Highlight>) -> Style {
        let style = match highlight {
            None => Style::new(),
            Some(Highlight::Strong) => Style::new().magenta().bold(),
            Some(Highlight::Subtle) => Style::new().yellow(),
            Some(Highlight::Severity(severity)) => match severity {
                Severity::Critical => Style::new().magenta(),
                Severity::High => Style::new().red(),
                Severity::Medium => Style::new().yellow(),
                Severity::Low => Style::new().green(),
                Severity::Other(_) => Style::new().cyan(),
            },
        };
        self.style(style)
    }

    fn icon(&self, label: &str) -> Option<&'static str> {
        if !self.icons {
            return None;
        }
        match label {
            "Author" => Some("👤"),
            "Description" | "Submission" | "Short Description" => Some("📝"),
            "Products" => Some("📦"),
            "Summary" => Some("📕"),
            "References" => Some("🔗"),
            _ => None,
        }
    }
}

/// Render one section as text, trailing newline included.
pub fn render_tree(tree: &ReportTree, origin: Origin, theme: &Theme) -> String {
    let mut out = String::new();
    let title = theme.section().apply_to(tree.title());
    if theme.icons {
        let _ = writeln!(out, "{} {title}", origin.icon());
    } else {
        let _ = writeln!(out, "{title}");
    }
    render_children(&mut out, tree.root(), "", theme);
    out.push('\n');
    out
}

fn render_children(out: &mut String, parent: &ReportNode, prefix: &str, theme: &Theme) {
    let width = parent
        .children()
        .iter()
        .filter(|c| c.kind() == NodeKind::Field)
        .map(|c| c.label().chars().count())
        .max()
        .unwrap_or(0);

    let count = parent.children().len();
    for (index, child) in parent.children().iter().enumerate() {
        let last = index + 1 == count;
        let (branch, guide) = if last {
            (LAST_BRANCH, BLANK)
        } else {
            (BRANCH, GUIDE)
        };
        let child_prefix = format!("{prefix}{guide}");

        let line = render_label(child, width, theme);
        let mut lines = line.lines();
        let _ = writeln!(out, "{prefix}{branch}{}", lines.next().unwrap_or_default());
        for continuation in lines {
            let _ = writeln!(out, "{child_prefix}{continuation}");
        }

        render_children(out, child, &child_prefix, theme);
    }
}

fn render_label(node: &ReportNode, width: usize, theme: &Theme) -> String {
    match node.kind() {
        NodeKind::Section => theme.section().apply_to(node.label()).to_string(),
        NodeKind::Record => theme.record().apply_to(node.label()).to_string(),
        NodeKind::Field => {
            let value = node.value().unwrap_or_default();
            format!(
                "{:<width$} : {}",
                node.label(),
                theme.highlight(node.highlight()).apply_to(value),
            )
        }
        NodeKind::Group => {
            let label = theme.group().apply_to(node.label());
            match theme.icon(node.label()) {
                Some(icon) => format!("{icon} {label}"),
                None => label.to_string(),
            }
        }
        NodeKind::Text => node.label().to_string(),
        NodeKind::Notice => theme.notice().apply_to(node.label()).to_string(),
        NodeKind::Error => theme.error().apply_to(node.label()).to_string(),
    }
}

/// One status line for a snapshot refresh.
pub fn render_update(
    title: &str,
    outcome: &Result<RefreshOutcome, SnapshotError>,
    theme: &Theme,
) -> String {
    match outcome {
        Ok(RefreshOutcome::UpToDate) => format!(
            "{} {title}: {}",
            theme.record().apply_to("✓"),
            theme.dim().apply_to("no updates found, skipping download")
        ),
        Ok(RefreshOutcome::Updated) => format!(
            "{} {title}: download and extraction completed",
            theme.record().apply_to("✓")
        ),
        Err(e) => format!(
            "{} {title}: {}",
            theme.error().apply_to("✗"),
            theme.error().apply_to(e)
        ),
    }
}

/// Program banner.
pub fn banner(theme: &Theme) -> String {
    format!(
        "{} {}\n{}\n",
        theme.section().apply_to("Delta"),
        theme.dim().apply_to(concat!("v", env!("CARGO_PKG_VERSION"))),
        theme
            .dim()
            .apply_to("Vulnerability intelligence across exploits, templates and advisories"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_core::{NetworkConfig, ReportBuilder, SearchConfig, VulnerabilityRecord};
    use delta_sources::{build_http_client, default_sections, ArchiveRefresher};
    use std::sync::Arc;

    #[test]
    fn test_notice_tree() {
        let tree = ReportTree::not_detected("CISA", "CVE or CWE not detected");
        assert_eq!(
            render_tree(&tree, Origin::Remote, &Theme::plain()),
            "CISA\n└── CVE or CWE not detected\n\n"
        );
    }

    #[test]
    fn test_error_tree() {
        let tree = ReportTree::error("Score", "Error: 503");
        assert_eq!(
            render_tree(&tree, Origin::Remote, &Theme::plain()),
            "Score\n└── Error: 503\n\n"
        );
    }

    #[test]
    fn test_record_fields_are_aligned() {
        let mut report = ReportBuilder::new("CVE GitHub", "CVE not detected");
        report.push_record(
            &VulnerabilityRecord::new("CVE-2021-44228")
                .with_severity(Some(Severity::Critical))
                .with_text("Published", Some("2021-12-10"))
                .with_description(Some("line one\nline two")),
        );
        let rendered = render_tree(&report.build(), Origin::Remote, &Theme::plain());

        let expected = "\
CVE GitHub
└── CVE-2021-44228
    ├── Severity  : critical
    ├── Published : 2021-12-10
    └── Description
        └── line one
            line two

";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_nested_guides() {
        let mut report = ReportBuilder::new("POC in GitHub", "Exploit not detected");
        report
            .push_record(&VulnerabilityRecord::new("a/one").with_title(Some("one")))
            .push_record(&VulnerabilityRecord::new("b/two").with_title(Some("two")));
        let rendered = render_tree(&report.build(), Origin::Local, &Theme::plain());

        let expected = "\
POC in GitHub
├── a/one
│   └── Name : one
└── b/two
    └── Name : two

";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_icons_follow_theme() {
        let node = ReportNode::group("Author");
        let with_icons = Theme {
            color: false,
            icons: true,
        };
        assert_eq!(render_label(&node, 0, &with_icons), "👤 Author");
        assert_eq!(render_label(&node, 0, &Theme::plain()), "Author");
    }

    #[test]
    fn test_section_title_icon_follows_origin() {
        let tree = ReportTree::not_detected("Metasploit", "Exploit not detected");
        let with_icons = Theme {
            color: false,
            icons: true,
        };
        assert_eq!(
            render_tree(&tree, Origin::Local, &with_icons),
            "📂 Metasploit\n└── Exploit not detected\n\n"
        );
        assert_eq!(
            render_tree(&tree, Origin::Remote, &with_icons),
            "🌐 Metasploit\n└── Exploit not detected\n\n"
        );
        assert!(render_tree(&tree, Origin::Local, &Theme::plain()).starts_with("Metasploit\n"));
    }

    #[test]
    fn test_origin_from_source_kind() {
        let client = build_http_client(&NetworkConfig::default()).expect("build client");
        let cache_dir = std::env::temp_dir();
        let refresher = Arc::new(ArchiveRefresher::new(client.clone(), &cache_dir));
        let sections = default_sections(&SearchConfig::default(), &cache_dir, &client, refresher);

        let local: Vec<&str> = sections
            .iter()
            .filter(|s| Origin::of(s) == Origin::Local)
            .map(Section::title)
            .collect();
        assert_eq!(local, vec!["Nuclei Templates", "POC in GitHub", "Metasploit"]);
        assert_eq!(Origin::of(&sections[sections.len() - 1]), Origin::Remote);
    }

    #[test]
    fn test_theme_from_config() {
        let config = DisplayConfig {
            color: false,
            icons: true,
        };
        let theme = Theme::from_config(&config);
        assert!(!theme.color);
        assert!(theme.icons);
    }

    #[test]
    fn test_update_lines() {
        let theme = Theme::plain();
        assert_eq!(
            render_update("Metasploit", &Ok(RefreshOutcome::UpToDate), &theme),
            "✓ Metasploit: no updates found, skipping download"
        );
        let failed = Err(SnapshotError::Status {
            name: "Metasploit".to_string(),
            status: 500,
        });
        assert!(render_update("Metasploit", &failed, &theme).starts_with("✗ Metasploit: "));
    }
}
