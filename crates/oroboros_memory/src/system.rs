//! # Memory System
//!
//! Owner of every context. Holds the state that would otherwise be global:
//! the context-ID counter, the optional seeded generator, and the contexts
//! themselves.
//!
//! ```rust,ignore
//! let mut memory = MemorySystem::from_config(&MemoryConfig::default())?;
//! let physics = memory.context_by_name_mut("physics").unwrap();
//! let page = physics.alloc_page(4096)?;
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{ConfigError, IdMode, MemoryConfig};
use crate::constants::MAX_CONTEXTS;
use crate::context::Context;
use crate::debug::DebugLayout;
use crate::error::{MemoryError, MemoryResult};
use crate::key::ContextId;

/// Registry of contexts.
#[derive(Debug)]
pub struct MemorySystem {
    contexts: Vec<Context>,
    mode: IdMode,
    next_id: u16,
    rng: Option<ChaCha8Rng>,
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySystem {
    /// Creates an empty system with monotonic context IDs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            contexts: Vec::new(),
            mode: IdMode::Monotonic,
            next_id: 0,
            rng: None,
        }
    }

    /// Creates an empty system that draws context IDs from a seeded
    /// generator. Call [`MemorySystem::seed`] before creating contexts.
    #[must_use]
    pub const fn with_seeded_ids() -> Self {
        Self {
            contexts: Vec::new(),
            mode: IdMode::Seeded,
            next_id: 0,
            rng: None,
        }
    }

    /// Seeds the ID generator. Resets it if it was already seeded.
    pub fn seed(&mut self, seed: u64) {
        self.rng = Some(ChaCha8Rng::seed_from_u64(seed));
    }

    /// Builds a system and every context described by `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the config fails validation or a context
    /// cannot be created.
    pub fn from_config(config: &MemoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut system = match config.identity.mode {
            IdMode::Monotonic => Self::new(),
            IdMode::Seeded => Self::with_seeded_ids(),
        };
        if let Some(seed) = config.identity.seed {
            system.seed(seed);
        }

        for entry in &config.contexts {
            let created = if entry.debug {
                let layout = entry.layout()?;
                system.create_debug_context(entry.capacity, layout, entry.event_capacity)
            } else {
                system.create_context(entry.capacity)
            };
            let id = created.map_err(|err| {
                ConfigError::Invalid(format!("context '{}': {err}", entry.name))
            })?;
            if let Some(context) = system.context_mut(id) {
                context.set_name(&entry.name);
            }
        }

        tracing::info!(
            "Memory system ready: {} contexts ({:?} ids)",
            system.contexts.len(),
            system.mode
        );
        Ok(system)
    }

    fn next_context_id(&mut self) -> MemoryResult<ContextId> {
        if self.contexts.len() >= MAX_CONTEXTS {
            return Err(MemoryError::TooManyObjects {
                limit: MAX_CONTEXTS,
            });
        }

        match self.mode {
            IdMode::Monotonic => {
                let id = ContextId::new(self.next_id);
                if id.is_null() {
                    return Err(MemoryError::TooManyObjects {
                        limit: MAX_CONTEXTS,
                    });
                }
                self.next_id += 1;
                Ok(id)
            }
            IdMode::Seeded => {
                let rng = self.rng.as_mut().ok_or(MemoryError::RandomNotSeeded)?;
                loop {
                    let id = ContextId::new(rng.gen());
                    if !id.is_null() && !self.contexts.iter().any(|c| c.id() == id) {
                        return Ok(id);
                    }
                }
            }
        }
    }

    /// Creates a plain context of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ZeroParameter`] if `capacity` is zero
    /// - [`MemoryError::TooManyObjects`] if the ID space is exhausted
    /// - [`MemoryError::RandomNotSeeded`] in seeded mode without a seed
    /// - [`MemoryError::FailedAllocation`] if the heap cannot be reserved
    pub fn create_context(&mut self, capacity: usize) -> MemoryResult<ContextId> {
        if capacity == 0 {
            return Err(MemoryError::ZeroParameter("context capacity"));
        }
        let id = self.next_context_id()?;
        self.contexts.push(Context::new(id, capacity)?);
        Ok(id)
    }

    /// Creates a debug context split according to `layout`.
    ///
    /// # Errors
    ///
    /// As [`MemorySystem::create_context`], plus
    /// [`MemoryError::InvalidLayout`].
    pub fn create_debug_context(
        &mut self,
        capacity: usize,
        layout: DebugLayout,
        event_capacity: usize,
    ) -> MemoryResult<ContextId> {
        if capacity == 0 {
            return Err(MemoryError::ZeroParameter("context capacity"));
        }
        let id = self.next_context_id()?;
        self.contexts
            .push(Context::with_debug(id, capacity, layout, event_capacity)?);
        Ok(id)
    }

    /// Destroys a context and everything allocated in it.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NullParameter`] for the null ID,
    /// [`MemoryError::IndexOutOfRange`] if no such context exists.
    pub fn destroy_context(&mut self, id: ContextId) -> MemoryResult<()> {
        if id.is_null() {
            return Err(MemoryError::NullParameter("context id"));
        }
        let position = self
            .contexts
            .iter()
            .position(|c| c.id() == id)
            .ok_or(MemoryError::IndexOutOfRange {
                index: usize::from(id.raw()),
                len: self.contexts.len(),
            })?;
        self.contexts.remove(position);
        tracing::debug!("Context {} destroyed", id.raw());
        Ok(())
    }

    /// Looks up a context.
    #[must_use]
    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.iter().find(|c| c.id() == id)
    }

    /// Looks up a context mutably.
    pub fn context_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.contexts.iter_mut().find(|c| c.id() == id)
    }

    /// Looks up a context by subsystem name.
    #[must_use]
    pub fn context_by_name(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name() == Some(name))
    }

    /// Looks up a context mutably by subsystem name.
    pub fn context_by_name_mut(&mut self, name: &str) -> Option<&mut Context> {
        self.contexts.iter_mut().find(|c| c.name() == Some(name))
    }

    /// Number of live contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no context exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Iterates over all contexts in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.contexts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextConfig, IdentityConfig};

    #[test]
    fn test_monotonic_ids() {
        let mut memory = MemorySystem::new();
        let a = memory.create_context(64).unwrap();
        let b = memory.create_context(64).unwrap();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);

        memory.destroy_context(a).unwrap();
        let c = memory.create_context(64).unwrap();
        assert_eq!(c.raw(), 2);
        assert!(memory.context(a).is_none());
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_seeded_ids_require_seed() {
        let mut memory = MemorySystem::with_seeded_ids();
        assert_eq!(memory.create_context(64), Err(MemoryError::RandomNotSeeded));

        memory.seed(1234);
        let first = memory.create_context(64).unwrap();
        assert!(!first.is_null());
    }

    #[test]
    fn test_seeded_ids_are_reproducible_and_distinct() {
        let ids = |seed| {
            let mut memory = MemorySystem::with_seeded_ids();
            memory.seed(seed);
            (0..32)
                .map(|_| memory.create_context(8).unwrap())
                .collect::<Vec<_>>()
        };
        let first = ids(99);
        assert_eq!(first, ids(99));

        let mut sorted: Vec<u16> = first.iter().map(|id| id.raw()).collect();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 32);
    }

    #[test]
    fn test_zero_capacity_context() {
        let mut memory = MemorySystem::new();
        assert_eq!(
            memory.create_context(0),
            Err(MemoryError::ZeroParameter("context capacity"))
        );
        assert!(memory.is_empty());
    }

    #[test]
    fn test_from_config_names_contexts() {
        let config = MemoryConfig {
            identity: IdentityConfig {
                mode: IdMode::Seeded,
                seed: Some(5),
            },
            contexts: vec![ContextConfig::plain("physics", 4096), {
                let mut debug = ContextConfig::plain("graphics", 8192);
                debug.debug = true;
                debug.label_bytes = 256;
                debug.safe_ptr_bytes = 256;
                debug
            }],
        };
        let memory = MemorySystem::from_config(&config).unwrap();

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.context_by_name("physics").unwrap().capacity(), 4096);
        let graphics = memory.context_by_name("graphics").unwrap();
        assert!(graphics.is_debug());
        assert_eq!(graphics.layout().user().start, 512);
        assert!(memory.context_by_name("input").is_none());
    }

    #[test]
    fn test_destroy_unknown_context() {
        let mut memory = MemorySystem::new();
        assert!(memory.destroy_context(ContextId::new(3)).is_err());
        assert_eq!(
            memory.destroy_context(ContextId::NULL),
            Err(MemoryError::NullParameter("context id"))
        );
    }
}
