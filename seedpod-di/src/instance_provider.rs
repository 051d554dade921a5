//! Access to pod instances from within pod constructors.

use crate::dependency::{DependencyDescriptor, DependencyKind};
use crate::error::PodInstanceProviderError;
use crate::pod::{Injectable, PodInstanceAnyPtr, PodInstancePtr, TypeKey};
use crate::pod_registry::PodDefinition;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::any::type_name;
use std::error::Error;
use std::sync::Arc;

/// Shared pointer to errors coming from user code.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// All pods providing `T`, keyed by pod name.
pub type PodMap<T> = FxHashMap<String, PodInstancePtr<T>>;

/// A type-erased pod instance along with its definition.
#[derive(Clone, Debug)]
pub struct PodInstance {
    pub definition: Arc<PodDefinition>,
    pub instance: PodInstanceAnyPtr,
}

impl PodInstance {
    pub fn new(definition: Arc<PodDefinition>, instance: PodInstanceAnyPtr) -> Self {
        Self {
            definition,
            instance,
        }
    }

    /// Casts the instance to one of the types in the capability set of its pod.
    pub fn cast<T: ?Sized + 'static>(&self) -> Result<PodInstancePtr<T>, PodInstanceProviderError> {
        let incompatible = || PodInstanceProviderError::IncompatiblePod {
            pod: self.definition.name.clone(),
            type_name: type_name::<T>(),
        };

        let capability = self
            .definition
            .capability(TypeKey::of::<T>())
            .ok_or_else(incompatible)?;

        (capability.cast)(self.instance.clone())
            .ok()
            .and_then(|instance| instance.downcast::<PodInstancePtr<T>>().ok())
            .map(|instance| *instance)
            .ok_or_else(incompatible)
    }

    /// Like [PodInstance::cast], but returns `None` for types outside the capability set.
    #[inline]
    pub fn try_cast<T: ?Sized + 'static>(&self) -> Option<PodInstancePtr<T>> {
        if self.definition.is_family_with::<T>() {
            self.cast().ok()
        } else {
            None
        }
    }
}

/// Resolves dependencies of the pod currently being constructed.
#[cfg_attr(test, automock)]
pub trait PodInstanceProvider {
    /// Resolves a scalar dependency. Returns `None` only for dependencies which are optional or
    /// have a fallback.
    fn resolve_single(
        &mut self,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<PodInstance>, PodInstanceProviderError>;

    /// Resolves all candidates for a collection dependency, in registration order.
    fn resolve_many(
        &mut self,
        dependency: &DependencyDescriptor,
    ) -> Result<Vec<PodInstance>, PodInstanceProviderError>;
}

/// Types which can be injected as constructor parameters.
pub trait Injected: Sized {
    /// Creates the descriptor for a parameter of this type.
    fn describe(parameter: &str) -> DependencyDescriptor;

    /// Resolves the value for given parameter.
    fn inject(
        instance_provider: &mut dyn PodInstanceProvider,
        dependency: &DependencyDescriptor,
    ) -> Result<Self, PodInstanceProviderError>;
}

impl<T: Injectable + ?Sized> Injected for PodInstancePtr<T> {
    fn describe(parameter: &str) -> DependencyDescriptor {
        DependencyDescriptor::new(parameter, TypeKey::of::<T>(), DependencyKind::Single)
    }

    fn inject(
        instance_provider: &mut dyn PodInstanceProvider,
        dependency: &DependencyDescriptor,
    ) -> Result<Self, PodInstanceProviderError> {
        instance_provider
            .resolve_single(dependency)?
            .ok_or_else(|| PodInstanceProviderError::NoSuchPod {
                type_name: dependency.type_key.name(),
                name: dependency.name.clone(),
            })?
            .cast()
    }
}

impl<T: Injectable + ?Sized> Injected for Option<PodInstancePtr<T>> {
    fn describe(parameter: &str) -> DependencyDescriptor {
        DependencyDescriptor::new(parameter, TypeKey::of::<T>(), DependencyKind::Optional)
    }

    fn inject(
        instance_provider: &mut dyn PodInstanceProvider,
        dependency: &DependencyDescriptor,
    ) -> Result<Self, PodInstanceProviderError> {
        instance_provider
            .resolve_single(dependency)?
            .map(|instance| instance.cast())
            .transpose()
    }
}

impl<T: Injectable + ?Sized> Injected for Vec<PodInstancePtr<T>> {
    fn describe(parameter: &str) -> DependencyDescriptor {
        DependencyDescriptor::new(parameter, TypeKey::of::<T>(), DependencyKind::List)
    }

    fn inject(
        instance_provider: &mut dyn PodInstanceProvider,
        dependency: &DependencyDescriptor,
    ) -> Result<Self, PodInstanceProviderError> {
        instance_provider
            .resolve_many(dependency)?
            .iter()
            .map(PodInstance::cast)
            .collect()
    }
}

impl<T: Injectable + ?Sized> Injected for PodMap<T> {
    fn describe(parameter: &str) -> DependencyDescriptor {
        DependencyDescriptor::new(parameter, TypeKey::of::<T>(), DependencyKind::Map)
    }

    fn inject(
        instance_provider: &mut dyn PodInstanceProvider,
        dependency: &DependencyDescriptor,
    ) -> Result<Self, PodInstanceProviderError> {
        instance_provider
            .resolve_many(dependency)?
            .iter()
            .map(|instance| {
                instance
                    .cast()
                    .map(|pod| (instance.definition.name.clone(), pod))
            })
            .collect()
    }
}
