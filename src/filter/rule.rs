//! Filter rules for checker output lines.

use regex::Regex;

use crate::checker::InvocationFlags;
use crate::config::{FlagKind, RuleConfig};
use crate::output::StreamTag;

/// Error type for filter rule construction.
#[derive(thiserror::Error, Debug)]
pub enum RuleError {
    /// Invalid regex pattern.
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A configured rule names no matcher, or more than one.
    #[error("Rule {name} must set exactly one of exact, prefix or pattern")]
    AmbiguousMatcher { name: String },
}

/// How a rule recognizes a line.
///
/// Lines are matched without their trailing line ending.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Prefix(String),
    Pattern(Regex),
}

impl Matcher {
    /// Build a regex matcher.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidPattern` if the regex is invalid.
    pub fn pattern(pattern: &str) -> Result<Self, RuleError> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(expected) => text == expected,
            Self::Prefix(prefix) => text.starts_with(prefix.as_str()),
            Self::Pattern(regex) => regex.is_match(text),
        }
    }

    /// Get the matcher source (for debugging/display).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(s) | Self::Prefix(s) => s,
            Self::Pattern(regex) => regex.as_str(),
        }
    }
}

/// Line that ends a suppressed block.
#[derive(Debug, Clone)]
pub struct Terminator {
    pub matcher: Matcher,
    /// Drop the terminating line too; otherwise it is classified normally.
    pub inclusive: bool,
}

/// What happens to a matched line.
#[derive(Debug, Clone)]
pub enum RuleAction {
    /// Drop the line.
    Drop,
    /// Drop the line and a blank separator line directly after it.
    DropWithSeparator,
    /// Drop the line and everything after it up to the terminator.
    DropBlock(Terminator),
}

/// When a rule is eligible at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Eligible only when the flag was not given.
    Unless(FlagKind),
    /// Eligible only after an interruption was forwarded to the checker.
    AfterInterrupt,
}

/// A single filter rule.
#[derive(Debug, Clone)]
pub struct FilterRule {
    name: String,
    matcher: Matcher,
    action: RuleAction,
    stream: Option<StreamTag>,
    condition: Condition,
}

impl FilterRule {
    /// Create an unconditional drop rule that applies to both streams.
    #[must_use]
    pub fn new(name: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            name: name.into(),
            matcher,
            action: RuleAction::Drop,
            stream: None,
            condition: Condition::Always,
        }
    }

    /// Shorthand for a prefix rule.
    #[must_use]
    pub fn prefix(prefix: &str) -> Self {
        Self::new(prefix.trim_end(), Matcher::Prefix(prefix.to_string()))
    }

    #[must_use]
    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn on_stream(mut self, stream: StreamTag) -> Self {
        self.stream = Some(stream);
        self
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Build a rule from its config file form.
    ///
    /// # Errors
    ///
    /// Returns `RuleError` if the matcher is missing, ambiguous or an invalid regex.
    pub fn from_config(config: &RuleConfig) -> Result<Self, RuleError> {
        let matcher = match (&config.exact, &config.prefix, &config.pattern) {
            (Some(exact), None, None) => Matcher::Exact(exact.clone()),
            (None, Some(prefix), None) => Matcher::Prefix(prefix.clone()),
            (None, None, Some(pattern)) => Matcher::pattern(pattern)?,
            _ => {
                return Err(RuleError::AmbiguousMatcher {
                    name: config.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                })
            }
        };

        let action = match (&config.until, config.separator) {
            (Some(until), _) => RuleAction::DropBlock(Terminator {
                matcher: Matcher::Prefix(until.clone()),
                inclusive: config.until_inclusive,
            }),
            (None, true) => RuleAction::DropWithSeparator,
            (None, false) => RuleAction::Drop,
        };

        let condition = match (config.unless, config.after_interrupt) {
            (_, true) => Condition::AfterInterrupt,
            (Some(flag), false) => Condition::Unless(flag),
            (None, false) => Condition::Always,
        };

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| matcher.as_str().to_string());

        Ok(Self {
            name,
            matcher,
            action,
            stream: config.stream,
            condition,
        })
    }

    /// Whether the rule may fire for this stream, flag set and interruption state.
    #[must_use]
    pub fn is_eligible(
        &self,
        stream: StreamTag,
        flags: &InvocationFlags,
        interrupted: bool,
    ) -> bool {
        if self.stream.is_some_and(|s| s != stream) {
            return false;
        }
        match self.condition {
            Condition::Always => true,
            Condition::Unless(flag) => !flags.has(flag),
            Condition::AfterInterrupt => interrupted,
        }
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.matches(text)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn action(&self) -> &RuleAction {
        &self.action
    }

    #[must_use]
    pub fn condition(&self) -> Condition {
        self.condition
    }

    #[must_use]
    pub fn stream(&self) -> Option<StreamTag> {
        self.stream
    }
}
