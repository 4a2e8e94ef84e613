mod common;

use common::{CannedResponse, CannedServer};
use delta_core::SearchTerm;
use delta_sources::{
    ArchiveRefresher, ExploitModuleSource, RefreshOutcome, SnapshotRefresher, SnapshotSpec,
    SourceAdapter, TemplateSource,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const ETAG: &str = "\"snapshot-v1\"";

const TEMPLATE: &str = "\
id: CVE-2021-44228

info:
  name: Apache Log4j2 Remote Code Injection
  author: melbadry9
  severity: critical
  tags: cve,log4j
";

const MODULE: &str = "\
'Name' => 'Log4Shell HTTP Header Injection',
'Description' => %q{CVE-2021-44228},
'License' => MSF_LICENSE,
";

fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        zip.write_all(contents.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish archive").into_inner()
}

/// Serves `body` with an ETag, answering 304 once the client presents it.
async fn archive_server(body: Vec<u8>) -> CannedServer {
    CannedServer::start(move |request| {
        if request.header("if-none-match") == Some(ETAG) {
            CannedResponse::bytes(304, Vec::new())
        } else {
            CannedResponse::bytes(200, body.clone()).with_header("ETag", ETAG)
        }
    })
    .await
}

fn spec_for(server: &CannedServer, base: SnapshotSpec) -> SnapshotSpec {
    let url: &'static str = Box::leak(server.url("/archive.zip").into_boxed_str());
    SnapshotSpec {
        archive_url: url,
        ..base
    }
}

#[tokio::test]
async fn test_refresh_downloads_then_skips_unchanged() {
    let body = archive(&[("nuclei-templates-main/http/cves/2021/CVE-2021-44228.yaml", TEMPLATE)]);
    let server = archive_server(body).await;
    let spec = spec_for(&server, SnapshotSpec::NUCLEI_TEMPLATES);

    let cache = TempDir::new().expect("create temp dir");
    let refresher = ArchiveRefresher::new(reqwest::Client::new(), cache.path()).with_progress(true);

    let first = refresher.refresh(&spec).await.expect("first refresh");
    assert_eq!(first, RefreshOutcome::Updated);
    assert!(cache
        .path()
        .join("nuclei-templates-main/http/cves/2021/CVE-2021-44228.yaml")
        .exists());
    assert!(!cache.path().join("nuclei-templates-main.zip").exists());

    let etags = std::fs::read_to_string(cache.path().join("etag.json")).expect("etag store");
    assert!(etags.contains("snapshot-v1"));

    let second = refresher.refresh(&spec).await.expect("second refresh");
    assert_eq!(second, RefreshOutcome::UpToDate);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].header("if-none-match"), None);
    assert_eq!(requests[1].header("if-none-match"), Some(ETAG));
}

#[tokio::test]
async fn test_refresh_failure_status() {
    let server = CannedServer::always(CannedResponse::text(503, "unavailable")).await;
    let spec = spec_for(&server, SnapshotSpec::POC_IN_GITHUB);

    let cache = TempDir::new().expect("create temp dir");
    let refresher = ArchiveRefresher::new(reqwest::Client::new(), cache.path());

    let err = refresher.refresh(&spec).await.expect_err("503 fails");
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_corrupt_archive_is_removed() {
    let server = CannedServer::always(
        CannedResponse::bytes(200, b"not a zip archive".to_vec()).with_header("ETag", ETAG),
    )
    .await;
    let spec = spec_for(&server, SnapshotSpec::NUCLEI_TEMPLATES);

    let cache = TempDir::new().expect("create temp dir");
    let refresher = ArchiveRefresher::new(reqwest::Client::new(), cache.path());

    refresher.refresh(&spec).await.expect_err("corrupt archive fails");
    assert!(!cache.path().join("nuclei-templates-main.zip").exists());
    assert!(!cache.path().join("etag.json").exists());

    // Without a stored ETag the next refresh downloads again
    refresher.refresh(&spec).await.expect_err("still corrupt");
    assert_eq!(server.requests()[1].header("if-none-match"), None);
}

#[tokio::test]
async fn test_refreshed_snapshots_are_searchable() {
    let body = archive(&[
        ("metasploit-framework-master/README.md", "CVE-2021-44228"),
        (
            "metasploit-framework-master/modules/exploits/multi/http/log4shell_header_injection.rb",
            MODULE,
        ),
        ("nuclei-templates-main/http/cves/2021/CVE-2021-44228.yaml", TEMPLATE),
    ]);
    let server = archive_server(body).await;

    let cache = TempDir::new().expect("create temp dir");
    let refresher: Arc<dyn SnapshotRefresher> =
        Arc::new(ArchiveRefresher::new(reqwest::Client::new(), cache.path()));

    refresher
        .refresh(&spec_for(&server, SnapshotSpec::METASPLOIT))
        .await
        .expect("metasploit refresh");
    assert!(!cache
        .path()
        .join("metasploit-framework-master/README.md")
        .exists());

    let term = SearchTerm::new("CVE-2021-44228").expect("term");

    let modules = ExploitModuleSource::new(cache.path(), refresher.clone())
        .search(&term, "Metasploit")
        .await;
    let ids: Vec<&str> = modules.records().map(|r| r.label()).collect();
    assert_eq!(ids, vec!["exploits/multi/http/log4shell_header_injection"]);

    let templates = TemplateSource::new(cache.path(), refresher)
        .search(&term, "Nuclei Templates")
        .await;
    assert!(templates.is_not_detected());
}
