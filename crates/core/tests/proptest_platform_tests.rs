//! Property-based tests for platform token resolution.
//!
//! - Idempotence: normalizing a token's own name returns the same token
//! - Totality: every string either maps to exactly one token or fails

use bootkit_core::{Cpu, Error, Os};
use proptest::prelude::*;

fn cpu_alias_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("amd64".to_string()),
        Just("x86_64".to_string()),
        Just("x64".to_string()),
        Just("arm64".to_string()),
        Just("aarch64".to_string()),
        "arm[a-z0-9]{0,6}".prop_map(String::from),
    ]
}

proptest! {
    /// Contract: normalize(normalize(x).to_string()) == normalize(x)
    #[test]
    fn cpu_normalization_is_idempotent(alias in cpu_alias_strategy()) {
        let cpu = Cpu::normalize(&alias).unwrap();
        prop_assert_eq!(Cpu::normalize(&cpu.to_string()).unwrap(), cpu);
    }

    /// Contract: matching ignores case
    #[test]
    fn cpu_normalization_ignores_case(alias in cpu_alias_strategy()) {
        prop_assert_eq!(
            Cpu::normalize(&alias.to_uppercase()).unwrap(),
            Cpu::normalize(&alias).unwrap()
        );
    }

    /// Contract: strings outside the alias set never silently default
    #[test]
    fn cpu_unknown_strings_fail(arch in "[b-z][a-z0-9_]{0,10}") {
        prop_assume!(!matches!(arch.as_str(), "x64" | "x86_64"));
        let is_unrecognized = matches!(
            Cpu::normalize(&arch),
            Err(Error::UnrecognizedArchitecture { .. })
        );
        prop_assert!(is_unrecognized);
    }

    /// Contract: an OS identifier maps to one token or fails with UnsupportedPlatform
    #[test]
    fn os_resolution_is_total(id in "[a-z0-9]{0,12}") {
        match Os::from_platform_id(&id) {
            Ok(os) => {
                let expected = if id.starts_with("linux") {
                    Os::Linux
                } else if id.starts_with("win") {
                    Os::Win
                } else {
                    Os::Mac
                };
                prop_assert_eq!(os, expected);
            }
            Err(err) => {
                let is_unsupported = matches!(err, Error::UnsupportedPlatform { .. });
                prop_assert!(is_unsupported);
            }
        }
    }
}

#[test]
fn x86_aliases_converge() {
    let tokens: Vec<Cpu> = ["amd64", "x86_64", "x64"]
        .iter()
        .map(|a| Cpu::normalize(a).unwrap())
        .collect();
    assert!(tokens.iter().all(|t| *t == Cpu::X64));
}
