//! The checker command line and the flags derived from it.

use std::ffi::{OsStr, OsString};

use crate::config::{CheckConfig, FlagConfig, FlagKind};

/// Flags extracted from the checker's argument vector that affect filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationFlags {
    /// Machine-oriented output was requested; nothing is filtered.
    pub passthrough: bool,
    /// The checker keeps running and re-reports on file changes.
    pub watch: bool,
    /// A project or configuration file was named explicitly.
    pub explicit_project: bool,
    /// Verbose diagnostics were requested.
    pub verbose: bool,
}

impl InvocationFlags {
    /// Derive flags from checker arguments.
    ///
    /// Scanning stops at a bare `--`, after which everything is a file name.
    /// Arguments that are not valid UTF-8 are never flags.
    #[must_use]
    pub fn from_args<S: AsRef<OsStr>>(args: &[S], table: &FlagConfig) -> Self {
        let mut flags = Self::default();
        for arg in args.iter().map(AsRef::as_ref) {
            if arg == "--" {
                break;
            }
            let Some(arg) = arg.to_str() else {
                continue;
            };
            flags.passthrough |= matches_any(arg, &table.passthrough);
            flags.watch |= matches_any(arg, &table.watch);
            flags.explicit_project |= matches_any(arg, &table.project);
            flags.verbose |= matches_any(arg, &table.verbose);
        }
        flags
    }

    /// Whether a rule condition flag is set.
    #[must_use]
    pub fn has(&self, kind: FlagKind) -> bool {
        match kind {
            FlagKind::ExplicitProject => self.explicit_project,
            FlagKind::Watch => self.watch,
            FlagKind::Verbose => self.verbose,
        }
    }
}

fn matches_any(arg: &str, spellings: &[String]) -> bool {
    spellings.iter().any(|flag| {
        arg == flag
            || arg
                .strip_prefix(flag.as_str())
                .is_some_and(|rest| rest.starts_with('=') && flag.starts_with("--"))
    })
}

/// A single run of the checker: what to execute and how to filter it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
    flags: InvocationFlags,
}

impl Invocation {
    /// Build an invocation from a program and its full argument vector.
    #[must_use]
    pub fn new<I, A>(program: impl Into<String>, args: I, table: &FlagConfig) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let flags = InvocationFlags::from_args(&args, table);
        Self {
            program: program.into(),
            args,
            flags,
        }
    }

    /// Build an invocation from the wrapper's own arguments.
    ///
    /// Configured `inject_args` go first, then the user's arguments exactly
    /// as given, `--` and non-UTF-8 paths included.
    #[must_use]
    pub fn from_config<I, A>(config: &CheckConfig, user_args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        let args = config
            .inject_args
            .iter()
            .map(OsString::from)
            .chain(user_args.into_iter().map(Into::into));
        Self::new(config.program.clone(), args, &config.flags)
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    #[must_use]
    pub fn flags(&self) -> InvocationFlags {
        self.flags
    }
}
