//! # Step registry - type-keyed factories for lazy steps.
//!
//! [`Registry`] maps a type to a factory producing instances of it. Pipelines consult
//! it when running (or validating) steps added with
//! [`Pipeline::add_lazy_step`](crate::Pipeline::add_lazy_step).
//!
//! ## Architecture
//! ```text
//! build phase:   registry.register::<UploadStep>(|| Ok(UploadStep::new(..)))
//!                          │
//!                 Arc<Registry> ──► Pipeline::with_registry
//!                          │
//! run phase:     LazyStep::run ──► registry.resolve::<UploadStep>()
//!                                     ├─► Ok(Arc<UploadStep>)
//!                                     └─► Err(ResolveError::NotRegistered | Factory)
//! ```
//!
//! ## Rules
//! - Registration happens before the registry is shared (`&mut self`)
//! - Resolution is synchronous and never panics on a missing registration
//! - Every `resolve` calls the factory again (no instance caching)

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ResolveError;

type Factory = Box<dyn Fn() -> Result<Arc<dyn Any + Send + Sync>, ResolveError> + Send + Sync>;

/// Type-keyed factory registry.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<TypeId, Factory>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fallible factory for `T`, replacing any previous one.
    pub fn register<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, String> + Send + Sync + 'static,
    {
        let factory: Factory = Box::new(move || {
            factory()
                .map(|value| Arc::new(value) as Arc<dyn Any + Send + Sync>)
                .map_err(|reason| ResolveError::Factory {
                    type_name: std::any::type_name::<T>(),
                    reason,
                })
        });
        self.factories.insert(TypeId::of::<T>(), factory);
        self
    }

    /// Registers an infallible factory for `T`.
    pub fn register_with<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register::<T, _>(move || Ok(factory()))
    }

    /// Registers `T` built by [`Default`].
    pub fn register_default<T>(&mut self) -> &mut Self
    where
        T: Default + Send + Sync + 'static,
    {
        self.register_with::<T, _>(T::default)
    }

    /// Returns `true` if a factory for `T` exists.
    pub fn contains<T: 'static>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Produces a fresh instance of `T`.
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolveError>
    where
        T: Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let factory = self
            .factories
            .get(&TypeId::of::<T>())
            .ok_or(ResolveError::NotRegistered { type_name })?;

        factory()?
            .downcast::<T>()
            .map_err(|_| ResolveError::Factory {
                type_name,
                reason: "factory produced a value of another type".to_string(),
            })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("registrations", &self.factories.len())
            .finish()
    }
}
