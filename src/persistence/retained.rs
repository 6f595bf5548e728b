use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Type-keyed holder for objects that outlive a single node instance, such
/// as view models. Each type appears at most once per scope; clones share
/// the same storage.
#[derive(Clone, Default)]
pub struct RetainedScope {
    inner: Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl RetainedScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_arc<T>(&self, value: Arc<T>) -> Result<(), RetainedScopeError>
    where
        T: Send + Sync + 'static,
    {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| RetainedScopeError::Poisoned)?;
        let type_id = TypeId::of::<T>();
        if guard.contains_key(&type_id) {
            return Err(RetainedScopeError::AlreadyExists);
        }
        guard.insert(type_id, Box::new(value));
        Ok(())
    }

    pub fn get<T>(&self) -> Result<Arc<T>, RetainedScopeError>
    where
        T: Send + Sync + 'static,
    {
        let guard = self
            .inner
            .read()
            .map_err(|_| RetainedScopeError::Poisoned)?;
        let boxed = guard
            .get(&TypeId::of::<T>())
            .ok_or(RetainedScopeError::Missing)?;
        boxed
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(RetainedScopeError::TypeMismatch)
    }

    pub fn get_or_insert_with<T, F>(&self, make: F) -> Result<Arc<T>, RetainedScopeError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Ok(value) = self.get::<T>() {
            return Ok(value);
        }
        let mut guard = self
            .inner
            .write()
            .map_err(|_| RetainedScopeError::Poisoned)?;
        let slot = guard
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Arc::new(make())));
        slot.downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(RetainedScopeError::TypeMismatch)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every held object. Clones of the scope observe the empty state.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
        }
    }
}

impl std::fmt::Debug for RetainedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetainedScope")
            .field("len", &self.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RetainedScopeError {
    #[error("retained object already exists")]
    AlreadyExists,
    #[error("retained object missing")]
    Missing,
    #[error("retained object type mismatch")]
    TypeMismatch,
    #[error("retained scope poisoned")]
    Poisoned,
}
