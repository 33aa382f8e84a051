//! Parsed command-line flags keyed by their short name (`"-z"`, `"-b"`, ...).

use std::fmt;

/// Value attached to a flag on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    /// Boolean switch such as `-z`
    Present,
    /// Flag taking a single value such as `-b mydb`
    Single(String),
    /// Flag taking one or more values such as `-e a@x b@y`
    Multi(Vec<String>),
}

impl FlagValue {
    /// First value, if the flag carries any
    pub fn first(&self) -> Option<&str> {
        match self {
            FlagValue::Present => None,
            FlagValue::Single(value) => Some(value),
            FlagValue::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// All values, empty for boolean switches
    pub fn values(&self) -> Vec<&str> {
        match self {
            FlagValue::Present => Vec::new(),
            FlagValue::Single(value) => vec![value.as_str()],
            FlagValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Present => Ok(()),
            FlagValue::Single(value) => write!(f, "{}", value),
            FlagValue::Multi(values) => write!(f, "{}", values.join(" ")),
        }
    }
}

/// Insertion-ordered set of flags. Built once and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    entries: Vec<(String, FlagValue)>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a boolean switch
    pub fn with_switch(mut self, name: &str) -> Self {
        self.insert(name, FlagValue::Present);
        self
    }

    /// Add a single-valued flag
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, FlagValue::Single(value.into()));
        self
    }

    /// Add a multi-valued flag
    pub fn with_values<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, FlagValue::Multi(values.into_iter().map(Into::into).collect()));
        self
    }

    /// Insert a flag, replacing the value in place if it is already present
    pub fn insert(&mut self, name: &str, value: FlagValue) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// First value of a flag; `None` when absent or a bare switch
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FlagValue::first)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reorder entries by a key derived from the flag name. The sort is
    /// stable, so equal keys keep their insertion order.
    pub fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(&str) -> K) {
        self.entries.sort_by_key(|(name, _)| key(name));
    }
}
