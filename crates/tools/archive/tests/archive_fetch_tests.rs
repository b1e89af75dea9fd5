//! Extraction tests against archives built on the fly.

use bootkit_core::{ArchiveRequest, ArchiveSource, EnvironmentOverlay, FetchContext, Fetcher};
use bootkit_tools_archive::ArchiveFetcher;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn append_file(builder: &mut tar::Builder<Vec<u8>>, name: &str, body: &str) {
    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, body.as_bytes()).unwrap();
}

fn append_dangling_hard_link(builder: &mut tar::Builder<Vec<u8>>, name: &str) {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Link);
    header.set_size(0);
    header.set_mode(0o644);
    builder
        .append_link(&mut header, name, "chromium-1.0/does/not/exist")
        .unwrap();
}

fn tar_xz_bytes(build: impl FnOnce(&mut tar::Builder<Vec<u8>>)) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    build(&mut builder);
    let tar_bytes = builder.into_inner().unwrap();

    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

fn write_tar_xz(path: &Path, build: impl FnOnce(&mut tar::Builder<Vec<u8>>)) {
    std::fs::write(path, tar_xz_bytes(build)).unwrap();
}

/// Serves one HTTP/1.1 response on a loopback port and returns its base URL.
async fn serve_once(status: &'static str, body: Vec<u8>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;

        let header = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/x-xz\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        // The client may hang up early on error statuses.
        let _ = socket.write_all(header.as_bytes()).await;
        let _ = socket.write_all(&body).await;
        let _ = socket.flush().await;
    });

    (format!("http://{address}"), handle)
}

#[tokio::test]
async fn test_extracts_valid_entries_and_skips_broken_link() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("chromium-1.0.tar.xz");
    write_tar_xz(&archive, |builder| {
        for i in 0..5 {
            append_file(builder, &format!("chromium-1.0/base/file{i}.cc"), "int x;");
        }
        append_dangling_hard_link(builder, "chromium-1.0/base/broken_link");
        for i in 0..4 {
            append_file(builder, &format!("chromium-1.0/tools/script{i}.py"), "pass");
        }
    });

    let fetcher = ArchiveFetcher::with_client(reqwest::Client::new());
    let dest = temp.path().join("out");
    let summary = fetcher
        .fetch_archive(&ArchiveSource::Path(archive), &dest)
        .await
        .unwrap();

    assert_eq!(summary.extracted, 9);
    assert_eq!(summary.skipped, 1);
    assert!(dest.join("chromium-1.0/base/file4.cc").is_file());
    assert!(dest.join("chromium-1.0/tools/script3.py").is_file());
    assert!(!dest.join("chromium-1.0/base/broken_link").exists());
}

#[tokio::test]
async fn test_progress_callback_and_relative_paths() {
    let temp = tempfile::tempdir().unwrap();
    write_tar_xz(&temp.path().join("pkg.tar.xz"), |builder| {
        for i in 0..10 {
            append_file(builder, &format!("pkg/f{i}"), "x");
        }
    });

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let fetcher = ArchiveFetcher::with_client(reqwest::Client::new()).with_progress(
        4,
        Arc::new(move |n| sink.lock().unwrap().push(n)),
    );

    let request = ArchiveRequest {
        source: ArchiveSource::parse("pkg.tar.xz"),
        destination: "unpacked".into(),
    };
    let env = EnvironmentOverlay::empty();
    let ctx = FetchContext {
        env: &env,
        work_dir: temp.path(),
    };
    let summary = fetcher.fetch(&request, ctx).await.unwrap();

    assert_eq!(summary.extracted, 10);
    assert_eq!(*reports.lock().unwrap(), vec![4, 8]);
    assert!(temp.path().join("unpacked/pkg/f9").is_file());
    assert_eq!(fetcher.name(), "archive");
}

#[tokio::test]
async fn test_missing_local_archive_fails() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = ArchiveFetcher::with_client(reqwest::Client::new());
    let err = fetcher
        .fetch_archive(
            &ArchiveSource::Path(temp.path().join("absent.tar.xz")),
            temp.path(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        bootkit_core::Error::ArchiveExtractionFailed { .. }
    ));
}

#[tokio::test]
async fn test_corrupt_archive_fails() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("bad.tar.xz");
    std::fs::write(&archive, b"this is not xz data at all").unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&calls);
    let fetcher = ArchiveFetcher::with_client(reqwest::Client::new())
        .with_progress(1, Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
    let err = fetcher
        .fetch_archive(&ArchiveSource::Path(archive), &temp.path().join("out"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        bootkit_core::Error::ArchiveExtractionFailed { .. }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_streams_remote_tarball() {
    let body = tar_xz_bytes(|builder| {
        for i in 0..10 {
            append_file(builder, &format!("chromium-1.0/chrome/f{i}.cc"), "int y;");
        }
    });
    let (base, server) = serve_once("200 OK", body).await;

    let temp = tempfile::tempdir().unwrap();
    let fetcher = ArchiveFetcher::with_client(reqwest::Client::new());
    let summary = fetcher
        .fetch_archive(
            &ArchiveSource::parse(&format!("{base}/1.0/chromium-1.0.tar.xz")),
            temp.path(),
        )
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(summary.extracted, 10);
    assert_eq!(summary.skipped, 0);
    assert!(temp.path().join("chromium-1.0/chrome/f9.cc").is_file());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remote_error_status_fails() {
    let (base, server) = serve_once("404 Not Found", b"no such revision".to_vec()).await;

    let temp = tempfile::tempdir().unwrap();
    let fetcher = ArchiveFetcher::with_client(reqwest::Client::new());
    let err = fetcher
        .fetch_archive(
            &ArchiveSource::parse(&format!("{base}/9.9/chromium-9.9.tar.xz")),
            &temp.path().join("out"),
        )
        .await
        .unwrap_err();
    server.await.unwrap();

    assert!(matches!(
        err,
        bootkit_core::Error::ArchiveExtractionFailed { .. }
    ));
    assert!(err.to_string().contains("404"));
    assert!(!temp.path().join("out").exists());
}
