use async_trait::async_trait;
use bootkit_build::{BuildConfig, BuildRequest, GenRequest, GnGenerator, NinjaBuilder};
use bootkit_core::{
    CommandRunner, Cpu, EnvironmentOverlay, Error, Invocation, Os, Platform, ProcessOutput, Result,
};
use std::sync::{Arc, Mutex};

struct FakeRunner {
    reply: ProcessOutput,
    seen: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    fn replying(reply: ProcessOutput) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<Invocation> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation, _env: &EnvironmentOverlay) -> Result<ProcessOutput> {
        self.seen.lock().unwrap().push(invocation.clone());
        Ok(self.reply.clone())
    }
}

#[tokio::test]
async fn test_gen_runs_gn_per_config_in_src() {
    let src = tempfile::tempdir().unwrap();
    let runner = FakeRunner::replying(ProcessOutput::success(
        "src/.gclient_entries missing\nDone. Made 42 targets\n",
    ));
    let generator = GnGenerator::new(runner.clone(), Os::Win);
    let request = GenRequest {
        target: Some(Platform::new(Os::Win, Cpu::X64)),
        configs: vec![BuildConfig::Debug],
        ..Default::default()
    };

    let results = generator
        .generate(&request, src.path(), &EnvironmentOverlay::empty())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1, "Done. Made 42 targets");
    let seen = runner.seen();
    assert_eq!(seen[0].program, "gn.bat");
    assert_eq!(
        seen[0].args,
        [
            "gen",
            "out/Debug",
            "--args=target_cpu=\"x64\" target_os=\"win\" enable_nacl=false is_component_build=true is_debug=true",
        ]
    );
    assert_eq!(seen[0].cwd.as_deref(), Some(src.path()));
}

#[tokio::test]
async fn test_gen_failure_stops_at_first_config() {
    let src = tempfile::tempdir().unwrap();
    let runner = FakeRunner::replying(ProcessOutput::failure(1, "ERROR at //BUILD.gn"));
    let generator = GnGenerator::new(runner.clone(), Os::Linux);

    let err = generator
        .generate(&GenRequest::default(), src.path(), &EnvironmentOverlay::empty())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BuildToolFailed { code: Some(1), .. }));
    assert_eq!(runner.seen().len(), 1);
}

#[tokio::test]
async fn test_build_adds_jobs_for_remote_execution() {
    let src = tempfile::tempdir().unwrap();
    let out = src.path().join("out/Component");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("args.gn"), "use_remoteexec = true\n").unwrap();

    let runner = FakeRunner::replying(ProcessOutput::success(""));
    let builder = NinjaBuilder::new(runner.clone(), Os::Linux);
    let request = BuildRequest {
        extra_args: vec!["-k".to_string(), "0".to_string()],
        ..Default::default()
    };
    builder
        .build(&request, src.path(), &EnvironmentOverlay::empty())
        .await
        .unwrap();

    let seen = runner.seen();
    assert_eq!(seen[0].program, "autoninja");
    assert_eq!(
        seen[0].args,
        ["-C", "out/Component", "-j", "200", "-k", "0", "views_examples"]
    );
    assert!(seen[0].inherit_output);
}

#[tokio::test]
async fn test_build_passes_exit_code_through() {
    let src = tempfile::tempdir().unwrap();
    let out = src.path().join("out/Release");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("args.gn"), "is_debug = false\n").unwrap();

    let runner = FakeRunner::replying(ProcessOutput::failure(3, ""));
    let builder = NinjaBuilder::new(runner.clone(), Os::Mac);
    let request = BuildRequest {
        out_dir: "out/Release".into(),
        targets: vec!["chrome".to_string()],
        extra_args: Vec::new(),
    };
    let err = builder
        .build(&request, src.path(), &EnvironmentOverlay::empty())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BuildToolFailed { code: Some(3), .. }));
    assert_eq!(runner.seen()[0].args, ["-C", "out/Release", "chrome"]);
}

#[tokio::test]
async fn test_build_without_generated_dir_is_io_error() {
    let src = tempfile::tempdir().unwrap();
    let runner = FakeRunner::replying(ProcessOutput::success(""));
    let builder = NinjaBuilder::new(runner.clone(), Os::Linux);

    let err = builder
        .build(&BuildRequest::default(), src.path(), &EnvironmentOverlay::empty())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert!(runner.seen().is_empty());
}
