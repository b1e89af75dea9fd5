//! Tests for error types

use bootkit_core::Error;
use miette::Diagnostic;
use std::path::Path;

#[test]
fn test_unsupported_platform_error() {
    let error = Error::unsupported_platform("freebsd");
    assert_eq!(error.to_string(), "Unsupported platform: freebsd");
    assert!(error.help().is_some());
}

#[test]
fn test_unrecognized_architecture_error() {
    let error = Error::unrecognized_architecture("mips");
    assert_eq!(error.to_string(), "Unrecognized CPU architecture: mips");
}

#[test]
fn test_package_install_failed_carries_output() {
    let error = Error::PackageInstallFailed {
        package: "infra/3pp/tools/ninja/${platform}".to_string(),
        version: "version:2@1.12.1".to_string(),
        root: Path::new("third_party/ninja").into(),
        status: "exit code 1".to_string(),
        output: "Errors:\n  failed to resolve package".to_string(),
    };
    let message = error.to_string();
    assert!(message.starts_with(
        "Installing infra/3pp/tools/ninja/${platform} version:2@1.12.1 into third_party/ninja failed (exit code 1)"
    ));
    assert!(message.contains("failed to resolve package"));
}

#[test]
fn test_blob_contract_error() {
    let error = Error::blob_contract("chromium-nodejs", "neither was given");
    assert_eq!(
        error.to_string(),
        "Invalid blob request for bucket chromium-nodejs: neither was given"
    );
    assert_eq!(
        error.code().map(|c| c.to_string()).as_deref(),
        Some("bootkit::blob::contract")
    );
}

#[test]
fn test_pin_not_found_error() {
    let error = Error::PinNotFound {
        key: "src/third_party/ninja".to_string(),
        manifest: Path::new("DEPS").into(),
        output: "Could not find any dependency called src/third_party/ninja".to_string(),
    };
    assert!(error.to_string().starts_with("Pin 'src/third_party/ninja' not found in DEPS"));
}

#[test]
fn test_destination_conflict_error() {
    let error = Error::destination_conflict("/work/chromium-1.0", "/work/src");
    assert_eq!(
        error.to_string(),
        "Unable to extract source tarball: /work/chromium-1.0 already exists and would not become /work/src"
    );
    assert!(error.help().is_some());
}

#[test]
fn test_configuration_error() {
    let error = Error::configuration("config is invalid");
    assert_eq!(error.to_string(), "Configuration error: config is invalid");
    assert!(error.help().is_none());

    let error = Error::configuration_with_help("missing revision", "pass --revision");
    assert_eq!(
        error.help().map(|h| h.to_string()).as_deref(),
        Some("pass --revision")
    );
}

#[test]
fn test_io_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error = Error::io(io_error, Some(Path::new("/tmp/x")), "read");
    assert_eq!(error.to_string(), "I/O error during read: file not found");
    match error {
        Error::Io { path, .. } => assert_eq!(path.as_deref(), Some(Path::new("/tmp/x"))),
        other => panic!("expected Io, got {other:?}"),
    }
}

#[test]
fn test_json_error_converts() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_err.into();
    assert!(matches!(error, Error::Serialization { .. }));
}

#[test]
fn test_build_tool_failed_keeps_exit_code() {
    let error = Error::BuildToolFailed {
        tool: "autoninja -C out/Component".to_string(),
        status: "exit code 1".to_string(),
        code: Some(1),
    };
    assert_eq!(error.to_string(), "autoninja -C out/Component failed (exit code 1)");
    assert_eq!(
        error.code().map(|c| c.to_string()).as_deref(),
        Some("bootkit::build::tool_failed")
    );
}
