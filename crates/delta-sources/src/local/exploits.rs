//! Exploit-framework modules (Metasploit, Ruby source).

use super::extract::{extract_all, Extracted};
use super::{read_snapshot_file, LocalSnapshot, EXPLOIT_NOT_DETECTED};
use crate::error::SnapshotError;
use crate::snapshot::{RefreshOutcome, SnapshotRefresher, SnapshotSpec};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use delta_core::{FieldValue, ReportBuilder, ReportTree, SearchTerm, VulnerabilityRecord};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Metadata pulled out of one module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploitModule {
    /// Module path without extension, e.g. `exploits/multi/http/log4shell_header_injection`
    pub path: String,
    fields: HashMap<&'static str, Extracted>,
}

impl ExploitModule {
    /// Extract metadata from module source.
    #[must_use]
    pub fn parse(path: impl Into<String>, source: &str) -> Self {
        Self {
            path: path.into(),
            fields: extract_all(source).into_iter().collect(),
        }
    }

    /// Raw extracted value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Extracted> {
        self.fields.get(key)
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(Extracted::to_text)
    }

    fn into_record(self) -> VulnerabilityRecord {
        let description = self.text("Description").map(|d| {
            d.lines()
                .map(str::trim_start)
                .collect::<Vec<_>>()
                .join("\n")
        });

        VulnerabilityRecord::new(&self.path)
            .with_authors(self.get("Author").map(Extracted::to_list).unwrap_or_default())
            .with_text("Name", self.text("Name"))
            .with_text("Encoder", self.text("EncoderType"))
            .with_text("License", self.text("License"))
            .with_text("Date", self.text("DisclosureDate"))
            .with_text("Platform", self.text("Platform"))
            .with_extra(
                "References",
                FieldValue::List(
                    self.get("References")
                        .map(Extracted::to_list)
                        .unwrap_or_default(),
                ),
            )
            .with_description(description)
    }
}

/// Searches a local snapshot of the Metasploit module tree.
pub struct ExploitModuleSource {
    snapshot: LocalSnapshot,
}

impl ExploitModuleSource {
    /// Create a source reading `<cache_dir>/metasploit-framework-master`.
    #[must_use]
    pub fn new(cache_dir: &Path, refresher: Arc<dyn SnapshotRefresher>) -> Self {
        Self {
            snapshot: LocalSnapshot::new(SnapshotSpec::METASPLOIT, cache_dir, refresher),
        }
    }

    /// Read modules from `root` instead of the cache layout.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.snapshot.set_root(root.into());
        self
    }

    /// Set how many modules are parsed at once.
    #[must_use]
    pub fn with_parse_concurrency(mut self, n: usize) -> Self {
        self.snapshot.set_parse_concurrency(n);
        self
    }

    /// Matching modules in walk order.
    pub async fn find(&self, term: &SearchTerm) -> Vec<ExploitModule> {
        let root = self.snapshot.root().to_path_buf();
        let paths = self.snapshot.matching_files(term.as_str(), "rb").await;
        debug!(candidates = paths.len(), "module candidates found");

        self.snapshot
            .parse_each(paths, |path| {
                let root = root.clone();
                async move {
                    match read_snapshot_file(&path).await {
                        Ok(source) => vec![ExploitModule::parse(module_id(&root, &path), &source)],
                        Err(e) => {
                            warn!(error = %e, "skipping unreadable module");
                            Vec::new()
                        }
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl SourceAdapter for ExploitModuleSource {
    fn source_id(&self) -> &'static str {
        "metasploit"
    }

    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree {
        let mut report = ReportBuilder::new(title, EXPLOIT_NOT_DETECTED);
        for module in self.find(term).await {
            report.push_record(&module.into_record());
        }
        report.build()
    }

    fn is_snapshot_backed(&self) -> bool {
        true
    }

    async fn update(&self) -> Result<RefreshOutcome, SnapshotError> {
        self.snapshot.refresh().await
    }
}

/// Module id: path below `<root>/modules` (or `<root>`), no extension, `/`-separated.
fn module_id(root: &Path, path: &Path) -> String {
    let modules = root.join("modules");
    let relative = path
        .strip_prefix(&modules)
        .or_else(|_| path.strip_prefix(root))
        .unwrap_or(path);

    relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::testing::{write, CountingRefresher};
    use delta_core::NodeKind;
    use tempfile::TempDir;

    const LOG4SHELL: &str = r"
class MetasploitModule < Msf::Exploit::Remote
  def initialize(_info = {})
    super(
      update_info(
        _info,
        'Name' => 'Log4Shell HTTP Header Injection',
        'Description' => %q{
          Versions of Apache Log4j2 impacted by CVE-2021-44228 which allow JNDI features used in configuration,
          log messages, and parameters, do not protect against attacker controlled LDAP.
        },
        'Author' => [
          'Michael Schierl', # Technical guidance
          'Spencer McIntyre', # Metasploit module
        ],
        'References' => [
          [ 'CVE', '2021-44228' ],
        ],
        'DisclosureDate' => '2021-12-09',
        'License' => MSF_LICENSE,
        'Platform' => 'java'
      )
    )
  end
end
";

    fn source(root: &Path) -> ExploitModuleSource {
        ExploitModuleSource::new(root, Arc::new(CountingRefresher::default())).with_root(root)
    }

    #[test]
    fn test_module_id() {
        let root = Path::new("/cache/metasploit-framework-master");
        assert_eq!(
            module_id(
                root,
                &root.join("modules/exploits/multi/http/log4shell_header_injection.rb")
            ),
            "exploits/multi/http/log4shell_header_injection"
        );
        assert_eq!(
            module_id(root, &root.join("tools/dev/check.rb")),
            "tools/dev/check"
        );
    }

    #[test]
    fn test_record_field_order() {
        let module = ExploitModule::parse("exploits/multi/http/log4shell", LOG4SHELL);
        let node = module.into_record().to_node();

        let labels: Vec<&str> = node.children().iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Author",
                "Name",
                "License",
                "Date",
                "Platform",
                "References",
                "Description"
            ]
        );

        let author = node.child("Author").expect("author group");
        assert_eq!(author.kind(), NodeKind::Group);
        assert_eq!(author.children()[1].label(), "Spencer McIntyre");
        assert_eq!(
            node.field_value("Name"),
            Some("Log4Shell HTTP Header Injection")
        );
        assert_eq!(node.field_value("License"), Some("MSF_LICENSE"));
        assert_eq!(node.field_value("Platform"), Some("java"));
    }

    #[test]
    fn test_description_lines_are_left_trimmed() {
        let module = ExploitModule::parse("m", LOG4SHELL);
        let record = module.into_record();
        let description = record.description.expect("description");
        assert!(description
            .lines()
            .all(|line| !line.starts_with(char::is_whitespace)));
        assert!(description.starts_with("Versions of Apache Log4j2"));
    }

    #[tokio::test]
    async fn test_search_uses_module_path() {
        let tmp = TempDir::new().expect("create temp dir");
        write(
            tmp.path(),
            "modules/exploits/multi/http/log4shell_header_injection.rb",
            LOG4SHELL,
        );
        write(tmp.path(), "modules/auxiliary/scanner/http/unrelated.rb", "'Name' => 'x'");

        let term = SearchTerm::new("CVE-2021-44228").expect("term");
        let tree = source(tmp.path()).search(&term, "Metasploit").await;

        let ids: Vec<&str> = tree.records().map(|r| r.label()).collect();
        assert_eq!(ids, vec!["exploits/multi/http/log4shell_header_injection"]);
    }

    #[tokio::test]
    async fn test_missing_snapshot_yields_notice() {
        let tmp = TempDir::new().expect("create temp dir");
        let term = SearchTerm::new("CVE-2021-44228").expect("term");
        let tree = source(&tmp.path().join("absent"))
            .search(&term, "Metasploit")
            .await;
        assert!(tree.is_not_detected());
    }
}
