//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::output::StreamTag;

/// Default checker executable.
pub const DEFAULT_PROGRAM: &str = "pyright";

/// Default head start, in milliseconds, given to stderr before stdout is read.
pub const DEFAULT_STDOUT_DELAY_MS: u64 = 300;

/// How colored output is requested from the checker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Force colors when our own stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Checker executable, looked up on `PATH` when not a path.
    pub program: String,
    /// Arguments inserted before the user's own arguments.
    pub inject_args: Vec<String>,
    /// Color request policy for the checker.
    pub color: ColorMode,
    /// Delay before stdout is read, so early stderr messages print first.
    pub stdout_delay_ms: u64,
    /// Grace period between a termination request and a forced kill.
    pub terminate_timeout_secs: u64,
    /// Flag spellings that change filtering behavior.
    pub flags: FlagConfig,
    /// Noise filter settings.
    pub filter: FilterConfig,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            inject_args: Vec::new(),
            color: ColorMode::Auto,
            stdout_delay_ms: DEFAULT_STDOUT_DELAY_MS,
            terminate_timeout_secs: 5,
            flags: FlagConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl CheckConfig {
    #[must_use]
    pub fn stdout_delay(&self) -> Duration {
        Duration::from_millis(self.stdout_delay_ms)
    }

    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_secs(self.terminate_timeout_secs)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(program) = std::env::var("HUSHCHECK_PROGRAM") {
            if !program.trim().is_empty() {
                self.program = program;
            }
        }
    }
}

/// Command-line flags of the checker that influence filtering.
///
/// A flag matches an argument either exactly or as `--flag=value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagConfig {
    /// Flags requesting machine-oriented output; any of them disables filtering.
    pub passthrough: Vec<String>,
    /// Flags naming an explicit project or configuration file.
    pub project: Vec<String>,
    /// Flags requesting watch mode.
    pub watch: Vec<String>,
    /// Flags requesting verbose diagnostics.
    pub verbose: Vec<String>,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            passthrough: to_strings(&[
                "--outputjson",
                "--verifytypes",
                "--dependencies",
                "--stats",
                "--version",
            ]),
            project: to_strings(&["-p", "--project"]),
            watch: to_strings(&["-w", "--watch"]),
            verbose: to_strings(&["--verbose"]),
        }
    }
}

/// Noise filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Include the built-in noise rules ahead of the custom ones.
    pub default_rules: bool,
    /// Additional rules, evaluated after the built-in ones.
    pub rules: Vec<RuleConfig>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            default_rules: true,
            rules: Vec::new(),
        }
    }
}

/// A flag condition a rule can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    ExplicitProject,
    Watch,
    Verbose,
}

/// A user-defined filter rule as written in the config file.
///
/// Exactly one of `exact`, `prefix` or `pattern` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub name: Option<String>,
    pub exact: Option<String>,
    pub prefix: Option<String>,
    pub pattern: Option<String>,
    /// Restrict the rule to one stream.
    pub stream: Option<StreamTag>,
    /// Skip the rule when this flag was given.
    pub unless: Option<FlagKind>,
    /// Only apply the rule once an interruption was forwarded.
    pub after_interrupt: bool,
    /// Also drop a blank line directly following the matched line.
    pub separator: bool,
    /// Keep dropping lines until one matches this prefix.
    pub until: Option<String>,
    /// Drop the terminating line as well.
    pub until_inclusive: bool,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
