//! Pod instances are contained in [Scope]s - containers which decide when to reuse or create an
//! instance. Each [PodScope] has a corresponding [ScopeFactory], and scopes are created on first
//! use and dropped when the container shuts down.
//!
//! Note: scope resolution happens at pod instantiation time, which can lead to unexpected
//! consequences if incompatible scopes are mixed together, e.g. a singleton pod can depend on a
//! prototype one. In such case when creating the singleton, a new instance of the dependency will
//! be created, but then that single instance will live as long as the singleton lives.

use crate::context_id::ContextId;
use crate::pod::PodInstanceAnyPtr;
use crate::pod_registry::{PodDefinition, PodId};
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;

pub type ScopePtr = Box<dyn Scope + Send + Sync>;

pub type ScopeFactoryPtr = Box<dyn ScopeFactory + Send + Sync>;

/// A scope containing pod instances. See module documentation for information on scopes.
#[cfg_attr(test, automock)]
pub trait Scope {
    /// Gets an instance requested for the given definition, if available in this scope.
    fn instance(&self, definition: &PodDefinition, context_id: ContextId)
        -> Option<PodInstanceAnyPtr>;

    /// Stores given instance in the scope. The scope might not support storing instances and ignore
    /// it.
    fn store_instance(
        &mut self,
        definition: &PodDefinition,
        context_id: ContextId,
        instance: PodInstanceAnyPtr,
    );

    /// Drops all instances tied to given context.
    fn clear_context(&mut self, _context_id: ContextId) {}

    /// Drops all instances.
    fn clear(&mut self);
}

/// Scope for instances shared between pods. Stateless pods are good candidates to be stored in
/// the singleton scope.
#[derive(Default)]
pub struct SingletonScope {
    instances: FxHashMap<PodId, PodInstanceAnyPtr>,
}

impl Scope for SingletonScope {
    #[inline]
    fn instance(
        &self,
        definition: &PodDefinition,
        _context_id: ContextId,
    ) -> Option<PodInstanceAnyPtr> {
        self.instances.get(&definition.id).cloned()
    }

    #[inline]
    fn store_instance(
        &mut self,
        definition: &PodDefinition,
        _context_id: ContextId,
        instance: PodInstanceAnyPtr,
    ) {
        self.instances.insert(definition.id, instance);
    }

    fn clear(&mut self) {
        self.instances.clear();
    }
}

/// A scope which creates a new instance of a given pod on each request. Stateful pods usually
/// should be stored in a prototype scope.
#[derive(Default, Copy, Clone, Eq, PartialEq)]
pub struct PrototypeScope;

impl Scope for PrototypeScope {
    #[inline]
    fn instance(
        &self,
        _definition: &PodDefinition,
        _context_id: ContextId,
    ) -> Option<PodInstanceAnyPtr> {
        None
    }

    #[inline]
    fn store_instance(
        &mut self,
        _definition: &PodDefinition,
        _context_id: ContextId,
        _instance: PodInstanceAnyPtr,
    ) {
    }

    fn clear(&mut self) {}
}

/// Scope keeping one instance per [ContextId], e.g. per request or message.
#[derive(Default)]
pub struct ContextScope {
    instances: FxHashMap<(ContextId, PodId), PodInstanceAnyPtr>,
}

impl Scope for ContextScope {
    #[inline]
    fn instance(
        &self,
        definition: &PodDefinition,
        context_id: ContextId,
    ) -> Option<PodInstanceAnyPtr> {
        self.instances.get(&(context_id, definition.id)).cloned()
    }

    #[inline]
    fn store_instance(
        &mut self,
        definition: &PodDefinition,
        context_id: ContextId,
        instance: PodInstanceAnyPtr,
    ) {
        self.instances.insert((context_id, definition.id), instance);
    }

    fn clear_context(&mut self, context_id: ContextId) {
        self.instances.retain(|(id, _), _| *id != context_id);
    }

    fn clear(&mut self) {
        self.instances.clear();
    }
}

/// Factory for [Scope]s.
#[cfg_attr(test, automock)]
pub trait ScopeFactory {
    fn create_scope(&self) -> ScopePtr;
}

#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct SingletonScopeFactory;

impl ScopeFactory for SingletonScopeFactory {
    fn create_scope(&self) -> ScopePtr {
        Box::<SingletonScope>::default()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct PrototypeScopeFactory;

impl ScopeFactory for PrototypeScopeFactory {
    fn create_scope(&self) -> ScopePtr {
        Box::<PrototypeScope>::default()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct ContextScopeFactory;

impl ScopeFactory for ContextScopeFactory {
    fn create_scope(&self) -> ScopePtr {
        Box::<ContextScope>::default()
    }
}

#[cfg(test)]
mod tests {
    use crate::context_id::ContextId;
    use crate::error::PodCreationError;
    use crate::instance_provider::PodInstanceProvider;
    use crate::pod::{cast_concrete, PodInstanceAnyPtr, PodInstancePtr, TypeKey};
    use crate::pod_registry::{PodDefinition, PodDefinitionBuilder};
    use crate::scope::{
        ContextScopeFactory, PrototypeScopeFactory, ScopeFactory, SingletonScopeFactory,
    };

    fn test_constructor(
        _instance_provider: &mut dyn PodInstanceProvider,
    ) -> Result<PodInstanceAnyPtr, PodCreationError> {
        Ok(PodInstancePtr::new(0u8) as PodInstanceAnyPtr)
    }

    fn create_definition() -> PodDefinition {
        PodDefinitionBuilder::new(
            "test",
            TypeKey::of::<u8>(),
            test_constructor,
            cast_concrete::<u8>,
        )
        .build()
    }

    #[test]
    fn should_support_singletons() {
        let definition = create_definition();
        let factory = SingletonScopeFactory;
        let mut scope = factory.create_scope();

        let instance = PodInstancePtr::new(0) as PodInstanceAnyPtr;
        scope.store_instance(&definition, ContextId::new(), instance);

        assert!(scope.instance(&definition, ContextId::new()).is_some());

        scope.clear();
        assert!(scope.instance(&definition, ContextId::new()).is_none());
    }

    #[test]
    fn should_support_prototypes() {
        let definition = create_definition();
        let factory = PrototypeScopeFactory;
        let mut scope = factory.create_scope();

        let context_id = ContextId::new();
        let instance = PodInstancePtr::new(0) as PodInstanceAnyPtr;
        scope.store_instance(&definition, context_id, instance);

        assert!(scope.instance(&definition, context_id).is_none());
    }

    #[test]
    fn should_support_contexts() {
        let definition = create_definition();
        let factory = ContextScopeFactory;
        let mut scope = factory.create_scope();

        let first = ContextId::new();
        let second = ContextId::new();
        scope.store_instance(&definition, first, PodInstancePtr::new(1) as PodInstanceAnyPtr);
        scope.store_instance(&definition, second, PodInstancePtr::new(2) as PodInstanceAnyPtr);

        assert!(scope.instance(&definition, first).is_some());
        assert!(scope.instance(&definition, ContextId::new()).is_none());

        scope.clear_context(first);
        assert!(scope.instance(&definition, first).is_none());
        assert!(scope.instance(&definition, second).is_some());
    }
}
