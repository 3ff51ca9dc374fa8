//! Tests for building checker invocations.

use hushcheck::checker::{Invocation, InvocationFlags};
use hushcheck::config::{CheckConfig, FlagConfig, FlagKind};

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn plain_run_has_no_flags() {
    let invocation = Invocation::new("pyright", args(&["src/"]), &FlagConfig::default());
    assert_eq!(invocation.flags(), InvocationFlags::default());
    assert_eq!(invocation.program(), "pyright");
    assert_eq!(invocation.args(), ["src/"]);
}

#[test]
fn structured_output_flags_enable_passthrough() {
    let table = FlagConfig::default();
    for flag in ["--outputjson", "--verifytypes", "--dependencies", "--stats", "--version"] {
        let invocation = Invocation::new("pyright", args(&[flag]), &table);
        assert!(invocation.flags().passthrough, "{flag}");
    }
}

#[test]
fn long_flag_with_value_is_detected() {
    let flags = InvocationFlags::from_args(&["--verifytypes=mypkg"], &FlagConfig::default());
    assert!(flags.passthrough);

    let flags =
        InvocationFlags::from_args(&["--project=pyrightconfig.json"], &FlagConfig::default());
    assert!(flags.has(FlagKind::ExplicitProject));
}

#[test]
fn short_flag_prefix_is_not_a_match() {
    let flags = InvocationFlags::from_args(&["-pfoo", "-wx"], &FlagConfig::default());
    assert!(!flags.explicit_project);
    assert!(!flags.watch);
}

#[test]
fn watch_project_and_verbose_flags() {
    let flags = InvocationFlags::from_args(
        &["-w", "-p", "pyrightconfig.json", "--verbose"],
        &FlagConfig::default(),
    );
    assert!(flags.has(FlagKind::Watch));
    assert!(flags.has(FlagKind::ExplicitProject));
    assert!(flags.has(FlagKind::Verbose));
    assert!(!flags.passthrough);
}

#[test]
fn arguments_after_double_dash_are_files() {
    let flags = InvocationFlags::from_args(&["--", "--outputjson"], &FlagConfig::default());
    assert!(!flags.passthrough);
}

#[test]
fn configured_args_come_first() {
    let config: CheckConfig = toml::from_str(
        r#"
            program = "basedpyright"
            inject_args = ["--outputjson"]
        "#,
    )
    .unwrap();

    let invocation = Invocation::from_config(&config, args(&["src/"]));
    assert_eq!(invocation.program(), "basedpyright");
    assert_eq!(invocation.args(), ["--outputjson", "src/"]);
    assert!(invocation.flags().passthrough);
}

#[test]
fn custom_flag_table() {
    let table: FlagConfig = toml::from_str(
        r#"
            passthrough = ["--json"]
            watch = ["--live"]
        "#,
    )
    .unwrap();

    let flags = InvocationFlags::from_args(&["--json", "--live"], &table);
    assert!(flags.passthrough);
    assert!(flags.watch);

    let flags = InvocationFlags::from_args(&["--outputjson"], &table);
    assert!(!flags.passthrough);
}
