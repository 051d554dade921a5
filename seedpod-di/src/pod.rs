//! One of the basic blocks of dependency injection is a [Pod]. Pods are injectable objects, which
//! themselves can contain dependencies to other pods.
//!
//! ## Declaring pods
//!
//! Any type which wants to be managed by the container needs to implement `Pod`. For convenience,
//! the trait can be automatically derived with all infrastructure if the `derive` feature is
//! enabled:
//!
//! ```
//! use seedpod_di::instance_provider::PodMap;
//! use seedpod_di::pod::PodInstancePtr;
//! use seedpod_di::{injectable, pod_alias, Pod};
//!
//! #[injectable]
//! trait Repository {}
//!
//! #[derive(Pod)]
//! struct MemoryRepository;
//!
//! #[pod_alias]
//! impl Repository for MemoryRepository {}
//!
//! #[derive(Pod)]
//! #[pod(name = "user_service", scope = "PROTOTYPE")]
//! struct UserService {
//!     // concrete type dependency
//!     repository: PodInstancePtr<MemoryRepository>,
//!     // primary dyn Trait dependency
//!     primary: PodInstancePtr<dyn Repository + Send + Sync>,
//!     // optional dependency - resolves to None when nothing matches
//!     optional: Option<PodInstancePtr<MemoryRepository>>,
//!     // all matching pods, in registration order
//!     all: Vec<PodInstancePtr<dyn Repository + Send + Sync>>,
//!     // all matching pods, keyed by pod name
//!     by_name: PodMap<dyn Repository + Send + Sync>,
//!     #[pod(default)]
//!     retries: u8,
//! }
//! ```
//!
//! ### Supported `#[pod]` struct configuration
//!
//! * `name = "name"` - use the given name instead of the snake_case type name
//! * `scope = "SINGLETON" | "PROTOTYPE" | "CONTEXT"` - lifetime of instances; see [PodScope]
//! * `lazy` - don't instantiate the pod when the context starts
//! * `primary` - prefer this pod when multiple candidates provide the requested type
//! * `order = number` - ordering among pods of the same kind, e.g. post-processors (lower is first)
//! * `constructor = "expr"` - call `expr(dependencies...)` to construct the pod instead of using
//! standard struct construction; `expr` returns `Result<Self, ErrorPtr>` and non-injected fields
//! can be skipped with `#[pod(ignore)]`
//!
//! ### Supported `#[pod]` field configuration
//!
//! * `name = "name"` - inject the pod with the given name
//! * `qualifier = "expr"` - narrow candidates with `expr(&PodDefinition) -> bool`; can be repeated
//! * `fallback = "expr"` - call `expr()` when nothing can be injected
//! * `default` - use `Default::default()` initialization
//! * `default = "expr"` - call `expr()` for initialization
//! * `ignore` - ignore the field when using a custom constructor
//!
//! ## Capabilities
//!
//! A pod can be requested by its concrete type and by any `dyn Trait` registered with
//! `#[pod_alias]`. Together these form the capability set of the pod. Generic traits are
//! supported, since each instantiation has a distinct [TypeKey].

use crate::dependency::DependencyDescriptor;
use crate::error::PodCreationError;
use crate::instance_provider::PodInstanceProvider;
use std::any::{type_name, Any, TypeId};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

pub type PodInstancePtr<T> = Arc<T>;

pub type PodInstanceAnyPtr = PodInstancePtr<dyn Any + Send + Sync + 'static>;

/// Function casting a type-erased instance to a `Box<PodInstancePtr<T>>` for a specific `T`. On
/// failure, the source instance is returned back.
pub type CastFunction = fn(instance: PodInstanceAnyPtr) -> Result<Box<dyn Any>, PodInstanceAnyPtr>;

/// Type-erased pod constructor.
pub type Constructor =
    fn(instance_provider: &mut dyn PodInstanceProvider) -> Result<PodInstanceAnyPtr, PodCreationError>;

/// Base trait for pods managed by the container.
///
/// Pods might depend on other pods, which forms the basis for dependency injection. Pod
/// instances are always wrapped in a [PodInstancePtr]. Please see the module-level documentation
/// for more information.
pub trait Pod: PodDowncast<Self> + Sized + Send + Sync {
    /// Describes the constructor parameters, in the order they are resolved.
    fn dependencies() -> Vec<DependencyDescriptor>;

    /// Creates an instance of this pod using dependencies from given [PodInstanceProvider].
    fn create(instance_provider: &mut dyn PodInstanceProvider) -> Result<Self, PodCreationError>;
}

/// Helper trait for types which can be obtained from an instance of the concrete type `C`, thus
/// allowing injection of pods based on `dyn Trait` types. Typically derived with `#[pod_alias]`.
pub trait PodDowncast<C: 'static>: Injectable {
    fn downcast(source: PodInstanceAnyPtr) -> Result<PodInstancePtr<Self>, PodInstanceAnyPtr>;
}

/// Marker trait for injectable types - pods and their capabilities.
pub trait Injectable: 'static {}

/// Type-erased [Pod::create].
pub fn construct<P: Pod>(
    instance_provider: &mut dyn PodInstanceProvider,
) -> Result<PodInstanceAnyPtr, PodCreationError> {
    P::create(instance_provider).map(|pod| PodInstancePtr::new(pod) as PodInstanceAnyPtr)
}

/// [CastFunction] for capability `T` of concrete type `C`.
pub fn cast<T: PodDowncast<C> + ?Sized, C: 'static>(
    instance: PodInstanceAnyPtr,
) -> Result<Box<dyn Any>, PodInstanceAnyPtr> {
    T::downcast(instance).map(|pod| Box::new(pod) as Box<dyn Any>)
}

/// [CastFunction] for a concrete type, which doesn't need to implement [Pod] (e.g. a factory
/// return type).
pub fn cast_concrete<C: Send + Sync + 'static>(
    instance: PodInstanceAnyPtr,
) -> Result<Box<dyn Any>, PodInstanceAnyPtr> {
    instance
        .downcast::<C>()
        .map(|pod| Box::new(pod) as Box<dyn Any>)
}

/// Reified type used as a lookup key. Equality and hashing only consider the [TypeId], while the
/// name is kept for diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Caching policy for pod instances. See [crate::scope] for details.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum PodScope {
    /// One instance for the lifetime of the container.
    #[default]
    Singleton,
    /// New instance on every request.
    Prototype,
    /// One instance per context id (thread, task or explicitly cleared unit of work).
    Context,
}

impl FromStr for PodScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SINGLETON" => Ok(Self::Singleton),
            "PROTOTYPE" => Ok(Self::Prototype),
            "CONTEXT" => Ok(Self::Context),
            _ => Err(format!("Unrecognized scope: {value}")),
        }
    }
}

impl Display for PodScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Singleton => "SINGLETON",
            Self::Prototype => "PROTOTYPE",
            Self::Context => "CONTEXT",
        })
    }
}
