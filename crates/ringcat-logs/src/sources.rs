use thiserror::Error;

use ringcat_types::LogId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("buffer '{0}' requested more than once")]
    Duplicate(String),

    #[error("unknown log buffer '{0}'")]
    Unknown(String),
}

/// A buffer records are read from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    name: String,
    /// Wire source id
    lid: u32,
    binary: bool,
    /// A banner for this source has been considered at least once
    printed: bool,
}

impl Source {
    fn new(name: &str, lid: u32, binary: bool) -> Self {
        Self {
            name: name.to_string(),
            lid,
            binary,
            printed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lid(&self) -> u32 {
        self.lid
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn printed(&self) -> bool {
        self.printed
    }

    pub fn mark_printed(&mut self) {
        self.printed = true;
    }
}

/// Handle to a source resolved by [`SourceSet::resolve`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRef {
    Registered(usize),
    /// Shared placeholder for records from buffers nobody asked for
    Unexpected,
}

/// Ordered set of requested buffers
#[derive(Clone, Debug)]
pub struct SourceSet {
    sources: Vec<Source>,
    unexpected: Source,
    unexpected_seen: bool,
}

impl SourceSet {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            unexpected: Source::new("unexpected", u32::MAX, false),
            unexpected_seen: false,
        }
    }

    /// The buffers read when none are requested
    pub fn with_defaults() -> Self {
        Self::from_ids(LogId::DEFAULTS)
    }

    /// Every known buffer
    pub fn all() -> Self {
        Self::from_ids(LogId::ALL)
    }

    fn from_ids(ids: impl IntoIterator<Item = LogId>) -> Self {
        let mut set = Self::new();
        for id in ids {
            set.sources.push(Source::new(id.name(), id.as_raw(), id.is_binary()));
        }
        set
    }

    /// Append a buffer. Registering the same buffer twice is an error.
    pub fn register(&mut self, id: LogId) -> Result<(), SourceError> {
        if self.sources.iter().any(|s| s.lid == id.as_raw()) {
            return Err(SourceError::Duplicate(id.name().to_string()));
        }
        self.sources.push(Source::new(id.name(), id.as_raw(), id.is_binary()));
        Ok(())
    }

    pub fn register_name(&mut self, name: &str) -> Result<(), SourceError> {
        let id = LogId::from_name(name).ok_or_else(|| SourceError::Unknown(name.to_string()))?;
        self.register(id)
    }

    /// Find the source a record arrived on.
    ///
    /// Records from unregistered buffers map to the shared "unexpected"
    /// source, which switches the set into multi-source mode for the rest of
    /// the run.
    pub fn resolve(&mut self, lid: u32) -> SourceRef {
        if let Some(index) = self.sources.iter().position(|s| s.lid == lid) {
            return SourceRef::Registered(index);
        }
        self.unexpected_seen = true;
        self.unexpected.lid = lid;
        self.unexpected.binary = LogId::from_raw(lid).is_some_and(|id| id.is_binary());
        SourceRef::Unexpected
    }

    pub fn get(&self, source: SourceRef) -> &Source {
        match source {
            SourceRef::Registered(index) => &self.sources[index],
            SourceRef::Unexpected => &self.unexpected,
        }
    }

    pub fn get_mut(&mut self, source: SourceRef) -> &mut Source {
        match source {
            SourceRef::Registered(index) => &mut self.sources[index],
            SourceRef::Unexpected => &mut self.unexpected,
        }
    }

    /// Number of registered sources
    pub fn count(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// More than one source is, or has been, in play
    pub fn is_multiple(&self) -> bool {
        self.sources.len() > 1 || self.unexpected_seen
    }

    /// Buffers to request from a session, in registration order
    pub fn ids(&self) -> Vec<LogId> {
        self.sources
            .iter()
            .filter_map(|s| LogId::from_raw(s.lid))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }
}

impl Default for SourceSet {
    fn default() -> Self {
        Self::new()
    }
}
