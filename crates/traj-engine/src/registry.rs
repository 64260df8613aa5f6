use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use traj_core::error::{TrajError, TrajResult};

use crate::action::{Action, Analysis, Capabilities};

/// Anything a registry can hand out and describe ahead of a run.
pub trait Describe {
    fn describe(&self) -> Capabilities;
}

impl Describe for dyn Action {
    fn describe(&self) -> Capabilities {
        self.capabilities()
    }
}

impl Describe for dyn Analysis {
    fn describe(&self) -> Capabilities {
        Capabilities::NONE
    }
}

struct Entry<T: ?Sized> {
    ctor: Box<dyn Fn() -> TrajResult<Box<T>> + Send + Sync>,
    capabilities: Capabilities,
}

/// Name-keyed catalog of constructors, collected before `build`.
pub struct RegistryBuilder<T: ?Sized> {
    kind: &'static str,
    entries: BTreeMap<String, Entry<T>>,
}

impl<T: ?Sized + Describe> RegistryBuilder<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Adds `key`, constructing one instance up front to capture its capabilities.
    ///
    /// On failure the builder is left exactly as it was.
    pub fn register<F>(&mut self, key: &str, ctor: F) -> TrajResult<()>
    where
        F: Fn() -> TrajResult<Box<T>> + Send + Sync + 'static,
    {
        if self.entries.contains_key(key) {
            return Err(TrajError::DuplicateKey(key.to_string()));
        }
        let capabilities = ctor()?.describe();
        self.entries.insert(
            key.to_string(),
            Entry {
                ctor: Box::new(ctor),
                capabilities,
            },
        );
        debug!(kind = self.kind, key, "registered");
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn build(self) -> Registry<T> {
        Registry {
            kind: self.kind,
            entries: self.entries,
        }
    }
}

/// Immutable catalog handing out a fresh instance per lookup.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: BTreeMap<String, Entry<T>>,
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("keys", &self.keys())
            .finish()
    }
}

impl<T: ?Sized> Registry<T> {
    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn get(&self, key: &str) -> TrajResult<Box<T>> {
        (self.entry(key)?.ctor)()
    }

    pub fn capabilities(&self, key: &str) -> TrajResult<Capabilities> {
        Ok(self.entry(key)?.capabilities)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, key: &str) -> TrajResult<&Entry<T>> {
        self.entries
            .get(key)
            .ok_or_else(|| TrajError::NotFound(format!("{} '{key}'", self.kind)))
    }
}

pub type ActionRegistry = Registry<dyn Action>;
pub type AnalysisRegistry = Registry<dyn Analysis>;

impl Registry<dyn Action> {
    pub fn builder() -> RegistryBuilder<dyn Action> {
        RegistryBuilder::new("action")
    }

    /// Builder preloaded with the built-in actions, for extending.
    pub fn builtin_builder() -> TrajResult<RegistryBuilder<dyn Action>> {
        let mut builder = Self::builder();
        crate::actions::register_builtins(&mut builder)?;
        Ok(builder)
    }

    pub fn with_builtins() -> TrajResult<Self> {
        Ok(Self::builtin_builder()?.build())
    }
}

impl Registry<dyn Analysis> {
    pub fn builder() -> RegistryBuilder<dyn Analysis> {
        RegistryBuilder::new("analysis")
    }

    pub fn builtin_builder() -> TrajResult<RegistryBuilder<dyn Analysis>> {
        let mut builder = Self::builder();
        crate::analysis::register_builtins(&mut builder)?;
        Ok(builder)
    }

    pub fn with_builtins() -> TrajResult<Self> {
        Ok(Self::builtin_builder()?.build())
    }
}
