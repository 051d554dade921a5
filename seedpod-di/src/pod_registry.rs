//! Functionality related to registering definitions of pods. The [PodFactory](crate::factory::PodFactory)
//! creates pod instances based on those definitions, which can be declared statically with the
//! derive macros or assembled manually with a [PodDefinitionBuilder].

pub mod type_index;

use crate::dependency::DependencyDescriptor;
use crate::error::PodRegistryError;
use crate::pod::{
    cast, construct, CastFunction, Constructor, Pod, PodScope, TypeKey,
};
use crate::pod_registry::internal::{
    PodAliasDefinition, PodAliasRegisterer, PodDefinitionRegisterer, TypedPodDefinition,
};
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet, FxHasher};
use itertools::Itertools;
use std::any::TypeId;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Unique identifier of a pod, derived from its name and declared type. Registering a definition
/// with an already known id is a no-op.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PodId(u64);

impl PodId {
    pub fn new(name: &str, declared_type: TypeKey) -> Self {
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        declared_type.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl Display for PodId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A type which a pod can be requested as, along with a way to cast to it.
#[derive(Derivative, Clone, Copy)]
#[derivative(Debug)]
pub struct Capability {
    pub type_key: TypeKey,

    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
}

/// Definition for a [Pod] registered in a [PodRegistry].
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct PodDefinition {
    pub id: PodId,

    /// Unique name, which can be used to request a specific instance. Derive-based pods have their
    /// name generated from type name by converting it to snake case.
    pub name: String,

    /// Concrete type created by the constructor.
    pub declared_type: TypeKey,

    /// All types this pod can be requested as, including the declared type.
    pub capabilities: Vec<Capability>,

    pub scope: PodScope,

    /// With multiple pods registered for a given type, one of them can be marked as primary and
    /// returned when requesting a single instance.
    pub is_primary: bool,

    /// Lazy pods are not created when the context starts.
    pub is_lazy: bool,

    /// Ordering among pods of the same kind, e.g. post-processors. Lower goes first.
    pub order: i32,

    pub dependencies: Vec<DependencyDescriptor>,

    #[derivative(Debug = "ignore")]
    pub constructor: Constructor,
}

impl PodDefinition {
    #[inline]
    pub fn capability(&self, type_key: TypeKey) -> Option<&Capability> {
        self.capabilities
            .iter()
            .find(|capability| capability.type_key == type_key)
    }

    /// Checks if this pod can be requested as given type.
    #[inline]
    pub fn provides(&self, type_key: TypeKey) -> bool {
        self.capability(type_key).is_some()
    }

    /// Typed version of [PodDefinition::provides].
    #[inline]
    pub fn is_family_with<T: ?Sized + 'static>(&self) -> bool {
        self.provides(TypeKey::of::<T>())
    }
}

/// Builder for [PodDefinition]s, used both by generated code and for manual registration.
#[derive(Clone, Debug)]
pub struct PodDefinitionBuilder {
    definition: PodDefinition,
}

impl PodDefinitionBuilder {
    /// Creates a new builder. The declared type is automatically added as a capability.
    pub fn new<T: ToString>(
        name: T,
        declared_type: TypeKey,
        constructor: Constructor,
        cast: CastFunction,
    ) -> Self {
        let name = name.to_string();
        Self {
            definition: PodDefinition {
                id: PodId::new(&name, declared_type),
                name,
                declared_type,
                capabilities: vec![Capability {
                    type_key: declared_type,
                    cast,
                }],
                scope: PodScope::default(),
                is_primary: false,
                is_lazy: false,
                order: 0,
                dependencies: vec![],
                constructor,
            },
        }
    }

    /// Creates a builder for a [Pod] implementation.
    pub fn for_pod<P: Pod, T: ToString>(name: T) -> Self {
        Self::new(name, TypeKey::of::<P>(), construct::<P>, cast::<P, P>)
            .with_dependencies(P::dependencies())
    }

    pub fn with_scope(mut self, scope: PodScope) -> Self {
        self.definition.scope = scope;
        self
    }

    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.definition.is_primary = is_primary;
        self
    }

    pub fn with_lazy(mut self, is_lazy: bool) -> Self {
        self.definition.is_lazy = is_lazy;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.definition.order = order;
        self
    }

    /// Adds a type this pod can be requested as. Duplicate capabilities are ignored.
    pub fn with_capability(mut self, type_key: TypeKey, cast: CastFunction) -> Self {
        if !self.definition.provides(type_key) {
            self.definition
                .capabilities
                .push(Capability { type_key, cast });
        }
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyDescriptor) -> Self {
        self.definition.dependencies.push(dependency);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<DependencyDescriptor>) -> Self {
        self.definition.dependencies = dependencies;
        self
    }

    #[inline]
    pub fn declared_type(&self) -> TypeKey {
        self.definition.declared_type
    }

    pub fn build(self) -> PodDefinition {
        self.definition
    }
}

/// Registry of pod definitions, kept in registration order.
#[derive(Default, Clone, Debug)]
pub struct PodRegistry {
    definitions: Vec<Arc<PodDefinition>>,
    ids: FxHashMap<PodId, usize>,
    names: FxHashMap<String, usize>,
}

impl PodRegistry {
    /// Adds a new definition and returns its registration index. Returns `None` when a definition
    /// with the same id already exists, in which case the registry is left untouched.
    pub fn add(&mut self, definition: PodDefinition) -> Result<Option<usize>, PodRegistryError> {
        if self.ids.contains_key(&definition.id) {
            debug!(pod = %definition.name, "Pod already registered.");
            return Ok(None);
        }

        Self::validate(&definition)?;

        if self.names.contains_key(&definition.name) {
            return Err(PodRegistryError::DuplicatePodName(definition.name));
        }

        let index = self.definitions.len();
        self.ids.insert(definition.id, index);
        self.names.insert(definition.name.clone(), index);
        self.definitions.push(Arc::new(definition));

        Ok(Some(index))
    }

    fn validate(definition: &PodDefinition) -> Result<(), PodRegistryError> {
        let malformed = |reason: &str| PodRegistryError::MalformedPod {
            name: definition.name.clone(),
            reason: reason.to_string(),
        };

        if definition.name.is_empty() || definition.name.chars().any(char::is_whitespace) {
            return Err(malformed("name must be non-empty and contain no whitespace"));
        }

        if !definition.provides(definition.declared_type) {
            return Err(malformed("declared type is missing from the capability set"));
        }

        let mut parameters = FxHashSet::default();
        for dependency in &definition.dependencies {
            if dependency.parameter.is_empty() {
                return Err(malformed("constructor parameters must be named"));
            }

            if !parameters.insert(dependency.parameter.as_str()) {
                return Err(malformed(&format!(
                    "duplicate constructor parameter '{}'",
                    dependency.parameter
                )));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Arc<PodDefinition>> {
        self.definitions.get(index)
    }

    #[inline]
    pub fn get_by_id(&self, id: PodId) -> Option<&Arc<PodDefinition>> {
        self.ids.get(&id).and_then(|index| self.definitions.get(*index))
    }

    #[inline]
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<PodDefinition>> {
        self.names
            .get(name)
            .and_then(|index| self.definitions.get(*index))
    }

    #[inline]
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterates over definitions in registration order, along with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<PodDefinition>)> {
        self.definitions.iter().enumerate()
    }
}

/// Pods declared statically with the derive macros, along with their aliases.
#[derive(Default, Clone, Debug)]
pub struct PodDeclarations {
    sources: FxHashMap<TypeId, TypedPodDefinition>,
    aliases: FxHashMap<TypeId, Vec<PodAliasDefinition>>,
}

impl PodDeclarations {
    /// Returns all declarations from the current binary.
    pub fn global() -> &'static Self {
        static DECLARATIONS: OnceLock<PodDeclarations> = OnceLock::new();
        DECLARATIONS.get_or_init(Self::collect)
    }

    fn collect() -> Self {
        let sources = inventory::iter::<PodDefinitionRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .map(|definition| (definition.source, definition))
            .collect();

        let aliases = inventory::iter::<PodAliasRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .into_group_map_by(|alias| alias.target_type)
            .into_iter()
            .collect();

        Self { sources, aliases }
    }

    /// Returns the definition declared for given source, with all aliases of its declared type.
    pub fn definition(&self, source: TypeId) -> Option<PodDefinition> {
        self.sources
            .get(&source)
            .map(|declaration| self.with_aliases(declaration.definition.clone()))
    }

    /// Returns all declared definitions, sorted by name.
    pub fn definitions(&self) -> Vec<PodDefinition> {
        self.sources
            .values()
            .map(|declaration| self.with_aliases(declaration.definition.clone()))
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }

    fn with_aliases(&self, builder: PodDefinitionBuilder) -> PodDefinition {
        let target = builder.declared_type().id();
        self.aliases
            .get(&target)
            .into_iter()
            .flatten()
            .fold(builder, |builder, alias| {
                builder.with_capability(alias.alias_type, alias.cast)
            })
            .build()
    }
}

#[doc(hidden)]
pub mod internal {
    use crate::pod::{CastFunction, TypeKey};
    use crate::pod_registry::PodDefinitionBuilder;
    use inventory::collect;
    pub use inventory::submit;
    use std::any::TypeId;

    /// Returns the [TypeId] of a value's type, e.g. a function item.
    pub fn source_type_id<T: 'static>(_source: &T) -> TypeId {
        TypeId::of::<T>()
    }

    #[derive(Clone, Debug)]
    pub struct TypedPodDefinition {
        pub source: TypeId,
        pub definition: PodDefinitionBuilder,
    }

    pub struct PodDefinitionRegisterer {
        pub register: fn() -> TypedPodDefinition,
    }

    #[derive(Clone, Copy, Debug)]
    pub struct PodAliasDefinition {
        pub alias_type: TypeKey,
        pub target_type: TypeId,
        pub cast: CastFunction,
    }

    pub struct PodAliasRegisterer {
        pub register: fn() -> PodAliasDefinition,
    }

    collect!(PodDefinitionRegisterer);
    collect!(PodAliasRegisterer);
}

#[cfg(test)]
mod tests {
    use crate::dependency::{DependencyDescriptor, DependencyKind};
    use crate::error::{PodCreationError, PodRegistryError};
    use crate::instance_provider::PodInstanceProvider;
    use crate::pod::{cast_concrete, PodInstanceAnyPtr, PodInstancePtr, TypeKey};
    use crate::pod_registry::{PodDefinition, PodDefinitionBuilder, PodId, PodRegistry};

    trait TestTrait {}

    fn constructor(
        _instance_provider: &mut dyn PodInstanceProvider,
    ) -> Result<PodInstanceAnyPtr, PodCreationError> {
        Ok(PodInstancePtr::new(0u8) as PodInstanceAnyPtr)
    }

    fn create_definition(name: &str) -> PodDefinition {
        PodDefinitionBuilder::new(name, TypeKey::of::<u8>(), constructor, cast_concrete::<u8>)
            .build()
    }

    #[test]
    fn should_register_definition() {
        let mut registry = PodRegistry::default();
        assert_eq!(registry.add(create_definition("name")).unwrap(), Some(0));

        assert_eq!(registry.get_by_name("name").unwrap().name, "name");
        assert!(registry.contains_name("name"));
        assert_eq!(
            registry
                .get_by_id(PodId::new("name", TypeKey::of::<u8>()))
                .unwrap()
                .name,
            "name"
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_ignore_re_registration() {
        let mut registry = PodRegistry::default();
        registry.add(create_definition("name")).unwrap();

        assert_eq!(registry.add(create_definition("name")).unwrap(), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_not_register_duplicate_name() {
        let mut registry = PodRegistry::default();
        registry.add(create_definition("name")).unwrap();

        let definition = PodDefinitionBuilder::new(
            "name",
            TypeKey::of::<i8>(),
            constructor,
            cast_concrete::<i8>,
        )
        .build();

        assert_eq!(
            registry.add(definition).unwrap_err(),
            PodRegistryError::DuplicatePodName("name".to_string())
        );
    }

    #[test]
    fn should_reject_malformed_definitions() {
        let mut registry = PodRegistry::default();

        assert!(matches!(
            registry.add(create_definition("")).unwrap_err(),
            PodRegistryError::MalformedPod { .. }
        ));

        let mut definition = create_definition("no_capabilities");
        definition.capabilities.clear();
        assert!(matches!(
            registry.add(definition).unwrap_err(),
            PodRegistryError::MalformedPod { .. }
        ));

        let dependency =
            DependencyDescriptor::new("dependency", TypeKey::of::<i8>(), DependencyKind::Single);
        let definition =
            PodDefinitionBuilder::new("twice", TypeKey::of::<u8>(), constructor, cast_concrete::<u8>)
                .with_dependency(dependency.clone())
                .with_dependency(dependency)
                .build();
        assert!(matches!(
            registry.add(definition).unwrap_err(),
            PodRegistryError::MalformedPod { .. }
        ));

        assert!(registry.is_empty());
    }

    #[test]
    fn should_add_capabilities_once() {
        let definition =
            PodDefinitionBuilder::new("name", TypeKey::of::<u8>(), constructor, cast_concrete::<u8>)
                .with_capability(TypeKey::of::<dyn TestTrait>(), cast_concrete::<u8>)
                .with_capability(TypeKey::of::<dyn TestTrait>(), cast_concrete::<u8>)
                .build();

        assert_eq!(definition.capabilities.len(), 2);
        assert!(definition.is_family_with::<dyn TestTrait>());
        assert!(definition.is_family_with::<u8>());
        assert!(!definition.is_family_with::<i8>());
    }

    #[test]
    fn should_keep_registration_order() {
        let mut registry = PodRegistry::default();
        registry.add(create_definition("b")).unwrap();
        registry.add(create_definition("a")).unwrap();

        let names: Vec<_> = registry
            .iter()
            .map(|(_, definition)| definition.name.as_str())
            .collect();
        assert_eq!(names, ["b", "a"]);
    }
}
