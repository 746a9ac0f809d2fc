//! Shared key/value context passed to every step of a run
//!
//! Values are stored as `dyn Any`, so any `Send + Sync` type can be placed in
//! the context. Steps agree on key names and value types among themselves; the
//! typed getters only check the type at the moment of access.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

use crate::error::ContextError;

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// String-keyed store shared by the steps of one scenario run.
#[derive(Default)]
pub struct ScenarioContext {
    entries: HashMap<String, Entry>,
}

impl ScenarioContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn set<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(
            key.into(),
            Entry {
                value: Box::new(value),
                type_name: type_name::<T>(),
            },
        );
    }

    /// Borrow the value under `key` as a `T`.
    pub fn get<T: Any>(&self, key: &str) -> Result<&T, ContextError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ContextError::MissingKey(key.to_string()))?;
        entry
            .value
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(key, entry.type_name))
    }

    /// Mutably borrow the value under `key` as a `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Result<&mut T, ContextError> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| ContextError::MissingKey(key.to_string()))?;
        let actual = entry.type_name;
        entry
            .value
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(key, actual))
    }

    /// Like [`get`](Self::get) but returns `None` for a missing key or a
    /// value of another type.
    pub fn try_get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.value.downcast_ref::<T>()
    }

    /// Take the value under `key` out of the context.
    ///
    /// On a type mismatch the value is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Result<T, ContextError> {
        let actual = match self.entries.get(key) {
            None => return Err(ContextError::MissingKey(key.to_string())),
            Some(entry) if entry.value.is::<T>() => entry.type_name,
            Some(entry) => return Err(mismatch::<T>(key, entry.type_name)),
        };
        let entry = self
            .entries
            .remove(key)
            .ok_or_else(|| ContextError::MissingKey(key.to_string()))?;
        entry
            .value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| mismatch::<T>(key, actual))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn mismatch<T>(key: &str, actual: &'static str) -> ContextError {
    ContextError::TypeMismatch {
        key: key.to_string(),
        expected: type_name::<T>(),
        actual,
    }
}

impl fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, e)| (k, e.type_name)))
            .finish()
    }
}
