//! Pin reader behavior against a fake manifest query tool.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use bootkit_core::{
    CommandRunner, EnvironmentOverlay, Error, FetchContext, Invocation, ProcessOutput, Result,
};
use bootkit_deps::{ObjectPin, Pin, PinReader, search_manifest};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Answers `getdep` queries from a `key = value` manifest, like gclient would.
#[derive(Default)]
struct FakeGetdep {
    calls: Mutex<Vec<Invocation>>,
}

#[async_trait]
impl CommandRunner for FakeGetdep {
    async fn run(&self, invocation: &Invocation, _env: &EnvironmentOverlay) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let flag = |name: &str| {
            let idx = invocation.args.iter().position(|a| a == name).unwrap();
            invocation.args[idx + 1].clone()
        };
        let manifest = invocation.cwd.as_ref().unwrap().join(flag("--deps-file"));
        let key = flag("-r");

        let content = std::fs::read_to_string(manifest).unwrap();
        let value = content.lines().find_map(|line| {
            let (k, v) = line.split_once(" = ")?;
            (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
        });
        Ok(match value {
            Some(v) => ProcessOutput::success(format!("{v}\n")),
            None => ProcessOutput::failure(1, format!("Could not find any dependency called {key}")),
        })
    }
}

fn write_manifest(dir: &Path) {
    std::fs::write(
        dir.join("DEPS"),
        concat!(
            "key = \"1.2.3\"\n",
            "node = {object_name: \"abc\", output_file: \"x.tar.gz\"}\n",
            "broken = [{'object_name': 'abc'\n",
            "# pinned to chromium-nodejs/20.11.0 for remote actions\n",
        ),
    )
    .unwrap();
}

fn reader(runner: &Arc<FakeGetdep>) -> PinReader {
    PinReader::new(runner.clone(), "python3")
}

#[tokio::test]
async fn reads_scalar_pin() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path());
    let runner = Arc::new(FakeGetdep::default());
    let env = EnvironmentOverlay::empty();
    let ctx = FetchContext { env: &env, work_dir: temp.path() };

    let pin = reader(&runner).read_pin(Path::new("DEPS"), "key", ctx).await.unwrap();
    assert_eq!(pin, Pin::Version("1.2.3".to_string()));

    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "python3");
    assert_eq!(
        calls[0].args,
        vec![
            Path::new("third_party").join("depot_tools").join("gclient.py").to_string_lossy().to_string(),
            "getdep".to_string(),
            "--deps-file".to_string(),
            "DEPS".to_string(),
            "-r".to_string(),
            "key".to_string(),
        ]
    );
}

#[tokio::test]
async fn reads_structured_pin() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path());
    let runner = Arc::new(FakeGetdep::default());
    let env = EnvironmentOverlay::empty();
    let ctx = FetchContext { env: &env, work_dir: temp.path() };

    let pin = reader(&runner).read_pin(Path::new("DEPS"), "node", ctx).await.unwrap();
    assert_eq!(
        pin,
        Pin::Object(ObjectPin {
            object_name: "abc".to_string(),
            output_file: "x.tar.gz".to_string(),
        })
    );
}

#[tokio::test]
async fn missing_key_is_pin_not_found() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path());
    let runner = Arc::new(FakeGetdep::default());
    let env = EnvironmentOverlay::empty();
    let ctx = FetchContext { env: &env, work_dir: temp.path() };

    let err = reader(&runner)
        .read_pin(Path::new("DEPS"), "src/third_party/missing", ctx)
        .await
        .unwrap_err();
    match err {
        Error::PinNotFound { key, output, .. } => {
            assert_eq!(key, "src/third_party/missing");
            assert!(output.contains("Could not find any dependency"));
        }
        other => panic!("expected PinNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_value_is_malformed() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path());
    let runner = Arc::new(FakeGetdep::default());
    let env = EnvironmentOverlay::empty();
    let ctx = FetchContext { env: &env, work_dir: temp.path() };

    let err = reader(&runner)
        .read_pin(Path::new("DEPS"), "broken", ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedPinFormat { .. }));
}

#[tokio::test]
async fn search_manifest_returns_first_capture() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path());
    let version = search_manifest(&temp.path().join("DEPS"), r"chromium-nodejs/([0-9.]*)")
        .await
        .unwrap();
    assert_eq!(version, "20.11.0");
}

#[tokio::test]
async fn search_manifest_without_match() {
    let temp = TempDir::new().unwrap();
    write_manifest(temp.path());
    let err = search_manifest(&temp.path().join("DEPS"), r"esbuild/([0-9.]+)")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PinNotFound { .. }));

    let err = search_manifest(&temp.path().join("DEPS"), r"no-group")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}
