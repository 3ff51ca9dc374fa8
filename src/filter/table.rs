//! The ordered rule table and the line classifier.

use std::borrow::Cow;

use crate::checker::InvocationFlags;
use crate::config::{FilterConfig, FlagKind};
use crate::output::StreamTag;

use super::{
    Condition, Decision, FilterRule, Matcher, RuleAction, RuleError, StreamContext, SuppressState,
    Terminator,
};

/// Prefixes of configuration-discovery chatter, kept when `--verbose` is given.
const DISCOVERY_PREFIXES: &[&str] = &[
    "Assuming ",
    "Auto-excluding ",
    "Loading ",
    "No include entries ",
    "No pyproject.toml ",
    "Searching ",
    "pyproject.toml file found ",
    "stubPath ",
];

/// Prefixes of lines that are never worth showing.
const ROUTINE_PREFIXES: &[&str] = &["Completed in ", "No source "];

/// An ordered, read-only list of filter rules. First match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<FilterRule>,
}

impl RuleTable {
    /// Create an empty table, which keeps every line.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a table with the built-in noise rules.
    #[must_use]
    pub fn with_default_rules() -> Self {
        let rules = Self::default_rules()
            .into_iter()
            .filter_map(|result| match result {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to compile default filter rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Build the table described by the filter config.
    ///
    /// Built-in rules, when enabled, come before the custom ones.
    ///
    /// # Errors
    ///
    /// Returns `RuleError` for the first custom rule that fails to build.
    pub fn from_config(config: &FilterConfig) -> Result<Self, RuleError> {
        let mut table = if config.default_rules {
            Self::with_default_rules()
        } else {
            Self::new()
        };
        for rule in &config.rules {
            table.add_rule(FilterRule::from_config(rule)?);
        }
        Ok(table)
    }

    /// Append a rule; it is consulted after all existing rules.
    pub fn add_rule(&mut self, rule: FilterRule) {
        self.rules.push(rule);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Classify one raw line, line ending included.
    ///
    /// The result depends only on the table, the line, `flags` and the
    /// state held in `ctx`, which is updated for the next line.
    pub fn classify<'a>(
        &self,
        line: &'a [u8],
        ctx: &mut StreamContext,
        flags: &InvocationFlags,
    ) -> Decision<'a> {
        if flags.passthrough {
            return Decision::Keep(line);
        }

        let decoded = decode(line);
        let text = decoded.trim_end_matches(['\n', '\r']);

        match ctx.take_state() {
            SuppressState::Normal => {}
            SuppressState::AfterNoise => {
                if text.trim().is_empty() {
                    return Decision::Drop;
                }
            }
            SuppressState::SuppressingUntil(terminator) => {
                if !terminator.matcher.matches(text) {
                    ctx.transition(SuppressState::SuppressingUntil(terminator));
                    return Decision::Drop;
                }
                if terminator.inclusive {
                    return Decision::Drop;
                }
            }
        }

        let stream = ctx.stream();
        let interrupted = ctx.interrupted();
        let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.is_eligible(stream, flags, interrupted) && rule.matches(text))
        else {
            return Decision::Keep(line);
        };

        tracing::trace!(rule = rule.name(), %stream, "Dropping noise line");
        match rule.action() {
            RuleAction::Drop => {}
            RuleAction::DropWithSeparator => ctx.transition(SuppressState::AfterNoise),
            RuleAction::DropBlock(terminator) => {
                ctx.transition(SuppressState::SuppressingUntil(terminator.clone()));
            }
        }
        Decision::Drop
    }

    /// Build the built-in noise rules.
    fn default_rules() -> Vec<Result<FilterRule, RuleError>> {
        let mut rules = vec![Ok(FilterRule::prefix("No configuration ")
            .when(Condition::Unless(FlagKind::ExplicitProject)))];

        rules.extend(DISCOVERY_PREFIXES.iter().map(|prefix| {
            Ok(FilterRule::prefix(prefix).when(Condition::Unless(FlagKind::Verbose)))
        }));
        rules.extend(ROUTINE_PREFIXES.iter().map(|prefix| Ok(FilterRule::prefix(prefix))));

        rules.extend([
            Matcher::pattern(r"^pyright \d+\.\d+\.\d+")
                .map(|m| FilterRule::new("version banner", m)),
            Ok(FilterRule::prefix("WARNING: there is a new pyright")
                .with_action(RuleAction::DropWithSeparator)),
            Ok(FilterRule::prefix("Please install the new version")
                .with_action(RuleAction::DropWithSeparator)),
            Ok(FilterRule::new(
                "interrupt traceback",
                Matcher::Prefix("Traceback (most recent call last):".to_string()),
            )
            .on_stream(StreamTag::Stderr)
            .when(Condition::AfterInterrupt)
            .with_action(RuleAction::DropBlock(Terminator {
                matcher: Matcher::Prefix("KeyboardInterrupt".to_string()),
                inclusive: true,
            }))),
        ]);

        rules
    }
}

fn decode(line: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(line)
}
