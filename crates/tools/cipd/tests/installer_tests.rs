use async_trait::async_trait;
use bootkit_core::{
    CommandRunner, EnvironmentOverlay, Error, FetchContext, Fetcher, Invocation, Os,
    PackageRequest, ProcessOutput, Result,
};
use bootkit_tools_cipd::PackageInstaller;
use std::path::Path;
use std::sync::{Arc, Mutex};

struct ScriptedRunner {
    reply: ProcessOutput,
    calls: Mutex<Vec<(Invocation, Option<String>)>>,
}

impl ScriptedRunner {
    fn new(reply: ProcessOutput) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation, env: &EnvironmentOverlay) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push((
            invocation.clone(),
            env.get("DEPOT_TOOLS_UPDATE").map(str::to_string),
        ));
        Ok(self.reply.clone())
    }
}

#[tokio::test]
async fn test_ensure_passes_overlay_and_request() {
    let runner = ScriptedRunner::new(ProcessOutput::success("Deployed"));
    let installer = PackageInstaller::new(runner.clone(), Os::Linux);

    let mut env = EnvironmentOverlay::empty();
    env.set("DEPOT_TOOLS_UPDATE", "0");
    let request = PackageRequest {
        root: "buildtools/reclient".into(),
        package: "infra/rbe/client/${platform}".into(),
        version: "re_client_version:0.150".into(),
    };
    installer
        .fetch(
            &request,
            FetchContext {
                env: &env,
                work_dir: Path::new("/work/src"),
            },
        )
        .await
        .unwrap();

    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (inv, overlay_value) = &calls[0];
    assert_eq!(inv.args[2], "buildtools/reclient");
    assert_eq!(
        inv.stdin.as_deref(),
        Some("infra/rbe/client/${platform} re_client_version:0.150")
    );
    assert_eq!(overlay_value.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_failure_carries_transcript() {
    let runner = ScriptedRunner::new(ProcessOutput::failure(1, "no such package"));
    let installer = PackageInstaller::new(runner, Os::Mac);
    let env = EnvironmentOverlay::empty();

    let err = installer
        .ensure_package(
            Path::new("third_party/ninja"),
            "infra/3pp/tools/ninja/${platform}",
            "version:bogus",
            FetchContext {
                env: &env,
                work_dir: Path::new("."),
            },
        )
        .await
        .unwrap_err();

    match err {
        Error::PackageInstallFailed {
            package,
            version,
            status,
            output,
            ..
        } => {
            assert_eq!(package, "infra/3pp/tools/ninja/${platform}");
            assert_eq!(version, "version:bogus");
            assert_eq!(status, "exit code 1");
            assert_eq!(output, "no such package");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
