use regex::Regex;
use thiserror::Error;

use ringcat_types::{LogEntry, LogPriority};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filterspec '{0}'")]
    InvalidSpec(String),

    #[error("invalid regex")]
    Regex(#[from] regex::Error),
}

/// Tag and priority rules deciding which entries get printed
#[derive(Clone)]
pub struct FilterRules {
    /// Minimum priority for tags without a rule of their own
    default_priority: LogPriority,

    /// Per-tag minimum priorities, later rules shadowing earlier ones
    tags: Vec<(String, LogPriority)>,

    /// Message pattern an entry must also match
    regex: Option<Regex>,
}

impl FilterRules {
    pub fn new() -> Self {
        Self {
            default_priority: LogPriority::Verbose,
            tags: Vec::new(),
            regex: None,
        }
    }

    /// Add whitespace separated `<tag>[:priority]` rules.
    ///
    /// `*` sets the default. A bare tag means verbose, a bare `*` means debug.
    pub fn add_spec(&mut self, spec: &str) -> Result<(), FilterError> {
        for rule in spec.split_whitespace() {
            self.add_rule(rule)?;
        }
        Ok(())
    }

    fn add_rule(&mut self, rule: &str) -> Result<(), FilterError> {
        let invalid = || FilterError::InvalidSpec(rule.to_string());

        let (tag, priority) = match rule.split_once(':') {
            Some((tag, level)) => {
                let mut chars = level.chars();
                let priority = match (chars.next(), chars.next()) {
                    (Some(c), None) => LogPriority::from_char(c).ok_or_else(invalid)?,
                    _ => return Err(invalid()),
                };
                (tag, priority)
            }
            None if rule == "*" => (rule, LogPriority::Debug),
            None => (rule, LogPriority::Verbose),
        };
        if tag.is_empty() {
            return Err(invalid());
        }

        if tag == "*" {
            self.default_priority = priority;
        } else {
            self.tags.retain(|(existing, _)| existing != tag);
            self.tags.push((tag.to_string(), priority));
        }
        Ok(())
    }

    /// Equivalent to `*:S`
    pub fn silence_all(&mut self) {
        self.default_priority = LogPriority::Silent;
    }

    pub fn with_regex(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.regex = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Minimum priority that applies to `tag`
    pub fn priority_for(&self, tag: &str) -> LogPriority {
        self.tags
            .iter()
            .rev()
            .find(|(name, _)| name == tag)
            .map(|(_, priority)| *priority)
            .unwrap_or(self.default_priority)
    }

    pub fn should_print(&self, tag: &str, priority: LogPriority) -> bool {
        priority >= self.priority_for(tag) && priority != LogPriority::Silent
    }

    /// Check if an entry passes both the tag rules and the message pattern
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.should_print(&entry.tag, entry.priority) {
            return false;
        }
        match &self.regex {
            Some(re) => re.is_match(&entry.message),
            None => true,
        }
    }
}

impl Default for FilterRules {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRules")
            .field("default_priority", &self.default_priority)
            .field("tags", &self.tags)
            .field("regex", &self.regex.as_ref().map(Regex::as_str))
            .finish()
    }
}
