//! Core functionality for creating [Pod](crate::pod::Pod) instances.
//!
//! The [PodFactory] owns the registry of pod definitions, the index of requestable types and the
//! [scopes](crate::scope) holding created instances. Every request creates a short-lived
//! instantiation session, which tracks the chain of pods under construction for cycle detection,
//! so concurrent requests never observe each other's in-flight state.

use crate::context_id::{self, ContextId};
use crate::dependency::{DependencyDescriptor, Qualifier};
use crate::error::{PodCreationError, PodInstanceProviderError, PodRegistryError};
use crate::instance_provider::{PodInstance, PodInstanceProvider};
use crate::pod::{Injectable, PodInstanceAnyPtr, PodInstancePtr, PodScope, TypeKey};
use crate::pod_registry::internal::source_type_id;
use crate::pod_registry::type_index::TypeIndex;
use crate::pod_registry::{PodDeclarations, PodDefinition, PodRegistry};
use crate::post_processor::{PostProcessor, PostProcessorPtr};
use crate::resolver::DependencyResolver;
use crate::scope::{
    ContextScopeFactory, PrototypeScopeFactory, ScopeFactoryPtr, ScopePtr, SingletonScopeFactory,
};
use fxhash::FxHashMap;
use itertools::Itertools;
use parking_lot::{ReentrantMutex, RwLock};
use std::any::{type_name, TypeId};
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub type ScopeFactoryRegistry = FxHashMap<PodScope, ScopeFactoryPtr>;

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

/// Request for a single pod or all pods of a given type.
#[derive(Clone, Debug)]
pub struct PodRequest {
    pub type_key: TypeKey,

    /// Request the pod with this exact name.
    pub name: Option<String>,

    pub qualifiers: Vec<Qualifier>,

    /// Use this context instead of the one associated with the current thread or task.
    pub context_id: Option<ContextId>,
}

impl PodRequest {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_key: TypeKey::of::<T>(),
            name: None,
            qualifiers: vec![],
            context_id: None,
        }
    }

    pub fn with_name<T: ToString>(mut self, name: T) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn in_context(mut self, context_id: ContextId) -> Self {
        self.context_id = Some(context_id);
        self
    }
}

/// Builder for [PodFactory] with sensible defaults, for easy construction.
pub struct PodFactoryBuilder {
    scope_factories: ScopeFactoryRegistry,
    post_processors: Vec<(i32, PostProcessorPtr)>,
}

impl Default for PodFactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PodFactoryBuilder {
    /// Creates a new builder with factories for all built-in scopes.
    pub fn new() -> Self {
        Self {
            scope_factories: [
                (
                    PodScope::Singleton,
                    Box::<SingletonScopeFactory>::default() as ScopeFactoryPtr,
                ),
                (
                    PodScope::Prototype,
                    Box::<PrototypeScopeFactory>::default() as ScopeFactoryPtr,
                ),
                (
                    PodScope::Context,
                    Box::<ContextScopeFactory>::default() as ScopeFactoryPtr,
                ),
            ]
            .into_iter()
            .collect(),
            post_processors: vec![],
        }
    }

    /// Sets new scope factories.
    pub fn with_scope_factories(mut self, scope_factories: ScopeFactoryRegistry) -> Self {
        self.scope_factories = scope_factories;
        self
    }

    /// Replaces the scope factory for given scope.
    pub fn with_scope_factory(mut self, scope: PodScope, factory: ScopeFactoryPtr) -> Self {
        self.scope_factories.insert(scope, factory);
        self
    }

    pub fn with_post_processor(mut self, order: i32, post_processor: PostProcessorPtr) -> Self {
        self.post_processors.push((order, post_processor));
        self
    }

    /// Builds resulting [PodFactory].
    pub fn build(self) -> PodFactory {
        let factory = PodFactory::new(self.scope_factories);
        for (order, post_processor) in self.post_processors {
            factory.add_post_processor(order, post_processor);
        }

        factory
    }
}

#[derive(Default)]
struct FactoryState {
    registry: PodRegistry,
    type_index: TypeIndex,
}

#[derive(Clone)]
struct OrderedPostProcessor {
    order: i32,
    post_processor: PostProcessorPtr,
}

// compares data pointers only, since vtable pointers of the same type can differ
fn same_instance(first: &PostProcessorPtr, second: &PostProcessorPtr) -> bool {
    Arc::as_ptr(first) as *const () == Arc::as_ptr(second) as *const ()
}

/// Generic factory for [Pod](crate::pod::Pod) instances. Uses registered definitions and
/// [scopes](crate::scope) to create and store instances for reuse. All operations take `&self`, so
/// the factory can be shared between threads and tasks.
pub struct PodFactory {
    id: u64,
    state: RwLock<FactoryState>,
    scope_factories: ScopeFactoryRegistry,
    scopes: RwLock<FxHashMap<PodScope, ScopePtr>>,
    singleton_lock: ReentrantMutex<()>,
    post_processors: RwLock<Vec<OrderedPostProcessor>>,
}

impl PodFactory {
    /// Creates a new factory with given scope factories. The map should contain factories for all
    /// scopes used by registered pods. See [PodFactoryBuilder] for a default setup.
    pub fn new(scope_factories: ScopeFactoryRegistry) -> Self {
        Self {
            id: NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed),
            state: Default::default(),
            scope_factories,
            scopes: Default::default(),
            singleton_lock: ReentrantMutex::new(()),
            post_processors: Default::default(),
        }
    }

    /// Registers the pod declared for type `T`. Returns `false` if it was already registered.
    pub fn add<T: ?Sized + 'static>(&self) -> Result<bool, PodRegistryError> {
        self.add_declared(TypeId::of::<T>(), type_name::<T>())
    }

    /// Registers the pod declared by given `#[pod_factory]` function.
    pub fn add_factory<F: 'static>(&self, factory: F) -> Result<bool, PodRegistryError> {
        self.add_declared(source_type_id(&factory), type_name::<F>())
    }

    fn add_declared(&self, source: TypeId, source_name: &str) -> Result<bool, PodRegistryError> {
        let definition = PodDeclarations::global()
            .definition(source)
            .ok_or_else(|| PodRegistryError::CannotRegisterNonPodObject(source_name.to_string()))?;

        self.add_definition(definition)
    }

    /// Registers a manually built definition.
    pub fn add_definition(&self, definition: PodDefinition) -> Result<bool, PodRegistryError> {
        let capabilities = definition
            .capabilities
            .iter()
            .map(|capability| capability.type_key)
            .collect_vec();
        let name = definition.name.clone();

        let mut state = self.state.write();
        match state.registry.add(definition)? {
            Some(index) => {
                state.type_index.register(index, capabilities);
                debug!(pod = %name, "Registered pod.");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Registers all pods declared in the binary, ordered by name. Returns the number of newly
    /// registered pods.
    pub fn scan(&self) -> Result<usize, PodRegistryError> {
        PodDeclarations::global()
            .definitions()
            .into_iter()
            .map(|definition| self.add_definition(definition))
            .fold_ok(0, |count, added| count + usize::from(added))
    }

    /// Returns the unique pod providing `T`.
    pub fn get<T: Injectable + ?Sized>(
        &self,
    ) -> Result<PodInstancePtr<T>, PodInstanceProviderError> {
        self.get_instance(&PodRequest::of::<T>())?.cast()
    }

    /// Returns the pod named `name`, which needs to provide `T`.
    pub fn get_named<T: Injectable + ?Sized>(
        &self,
        name: &str,
    ) -> Result<PodInstancePtr<T>, PodInstanceProviderError> {
        self.get_instance(&PodRequest::of::<T>().with_name(name))?
            .cast()
    }

    /// Returns the unique pod providing `T` among those matching all qualifiers.
    pub fn get_qualified<T: Injectable + ?Sized>(
        &self,
        qualifiers: &[Qualifier],
    ) -> Result<PodInstancePtr<T>, PodInstanceProviderError> {
        let request = PodRequest {
            qualifiers: qualifiers.to_vec(),
            ..PodRequest::of::<T>()
        };

        self.get_instance(&request)?.cast()
    }

    /// Returns all pods providing `T`, in registration order. An empty result is not an error.
    pub fn get_all<T: Injectable + ?Sized>(
        &self,
    ) -> Result<Vec<PodInstancePtr<T>>, PodInstanceProviderError> {
        self.get_all_instances(&PodRequest::of::<T>())?
            .iter()
            .map(PodInstance::cast)
            .collect()
    }

    /// Type-erased single pod lookup.
    pub fn get_instance(&self, request: &PodRequest) -> Result<PodInstance, PodInstanceProviderError> {
        let state = self.state.read_recursive();
        let resolver = DependencyResolver::new(&state.registry, &state.type_index);

        let definition = match &request.name {
            Some(name) => resolver.by_name(request.type_key, name)?,
            None => resolver
                .resolve_unique(request.type_key, &request.qualifiers)?
                .ok_or_else(|| PodInstanceProviderError::NoSuchPod {
                    type_name: request.type_key.name(),
                    name: None,
                })?,
        };

        InstantiationSession::new(self, resolver, request.context_id).instantiate_pod(definition)
    }

    /// Type-erased lookup of all pods matching the request.
    pub fn get_all_instances(
        &self,
        request: &PodRequest,
    ) -> Result<Vec<PodInstance>, PodInstanceProviderError> {
        let state = self.state.read_recursive();
        let resolver = DependencyResolver::new(&state.registry, &state.type_index);
        let mut session = InstantiationSession::new(self, resolver, request.context_id);

        resolver
            .candidates(request.type_key, &request.qualifiers)
            .into_iter()
            .filter(|definition| {
                request
                    .name
                    .as_ref()
                    .map(|name| definition.name == *name)
                    .unwrap_or(true)
            })
            .map(|definition| session.instantiate_pod(definition))
            .collect()
    }

    /// Checks if any pod provides `T`.
    #[inline]
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_type(TypeKey::of::<T>())
    }

    /// Checks if a pod named `name` provides `T`.
    pub fn contains_named<T: ?Sized + 'static>(&self, name: &str) -> bool {
        let state = self.state.read_recursive();
        DependencyResolver::new(&state.registry, &state.type_index)
            .by_name(TypeKey::of::<T>(), name)
            .is_ok()
    }

    pub fn contains_type(&self, type_key: TypeKey) -> bool {
        self.state.read_recursive().type_index.contains(type_key)
    }

    /// Instantiates all pods whose definition satisfies the predicate, in registration order.
    pub fn find<P: Fn(&PodDefinition) -> bool>(
        &self,
        predicate: P,
    ) -> Result<Vec<PodInstance>, PodInstanceProviderError> {
        let state = self.state.read_recursive();
        let resolver = DependencyResolver::new(&state.registry, &state.type_index);
        let mut session = InstantiationSession::new(self, resolver, None);

        state
            .registry
            .iter()
            .filter(|(_, definition)| predicate(definition))
            .map(|(_, definition)| session.instantiate_pod(definition))
            .collect()
    }

    /// Returns all registered definitions, in registration order.
    pub fn pods(&self) -> Vec<Arc<PodDefinition>> {
        self.state
            .read_recursive()
            .registry
            .iter()
            .map(|(_, definition)| definition.clone())
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.state.read_recursive().registry.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the context id for the current thread or task, creating it if absent. Only tasks
    /// wrapped with [scope](Self::scope) get an id of their own; other tasks use the id of the
    /// worker thread polling them, which can change between `.await` points.
    #[inline]
    pub fn context_id(&self) -> ContextId {
        context_id::current(self.id)
    }

    /// Drops context-scoped instances of the current context and discards its id, so the next
    /// request gets a fresh one.
    pub fn clear_context(&self) {
        if let Some(context_id) = context_id::clear(self.id) {
            self.evict_context(context_id);
        }
    }

    /// Drops context-scoped instances of given context.
    pub fn evict_context(&self, context_id: ContextId) {
        debug!(%context_id, "Clearing context.");
        for scope in self.scopes.write().values_mut() {
            scope.clear_context(context_id);
        }
    }

    /// Runs given future with its own context id. Tasks which should not share context-scoped
    /// instances need to be wrapped with this function.
    pub fn scope<F: Future>(&self, future: F) -> impl Future<Output = F::Output> {
        context_id::scope(future)
    }

    /// Adds a post-processor run for every created instance. Post-processors with the same order
    /// run in the order they were added. An instance which is already installed is skipped and
    /// `false` is returned.
    pub fn add_post_processor(&self, order: i32, post_processor: PostProcessorPtr) -> bool {
        let mut post_processors = self.post_processors.write();
        if post_processors
            .iter()
            .any(|installed| same_instance(&installed.post_processor, &post_processor))
        {
            return false;
        }

        post_processors.push(OrderedPostProcessor {
            order,
            post_processor,
        });
        post_processors.sort_by_key(|post_processor| post_processor.order);
        true
    }

    /// Instantiates pods providing `dyn PostProcessor` and installs them, ordered by their
    /// [order](PodDefinition::order). Returns the number of newly installed post-processors, so
    /// calling it again only picks up ones registered in the meantime.
    pub fn install_post_processor_pods(&self) -> Result<usize, PodInstanceProviderError> {
        let post_processors = self
            .get_all_instances(&PodRequest::of::<dyn PostProcessor + Send + Sync>())?
            .into_iter()
            .sorted_by_key(|pod| pod.definition.order)
            .map(|pod| {
                pod.cast::<dyn PostProcessor + Send + Sync>()
                    .map(|post_processor| (pod.definition.order, post_processor))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(post_processors
            .into_iter()
            .filter(|(order, post_processor)| {
                self.add_post_processor(*order, post_processor.clone())
            })
            .count())
    }

    /// Creates all non-lazy singletons, in registration order.
    pub fn instantiate_eager_singletons(&self) -> Result<(), PodInstanceProviderError> {
        let state = self.state.read_recursive();
        let resolver = DependencyResolver::new(&state.registry, &state.type_index);
        let mut session = InstantiationSession::new(self, resolver, None);

        for (_, definition) in state.registry.iter() {
            if definition.scope == PodScope::Singleton && !definition.is_lazy {
                session.instantiate(definition)?;
            }
        }

        Ok(())
    }

    /// Rebuilds the type index from all registered definitions.
    pub fn rebuild_type_index(&self) {
        let mut state = self.state.write();
        let FactoryState {
            registry,
            type_index,
        } = &mut *state;

        type_index.clear();
        for (index, definition) in registry.iter() {
            type_index.register(
                index,
                definition
                    .capabilities
                    .iter()
                    .map(|capability| capability.type_key),
            );
        }
    }

    /// Drops all cached instances and clears the type index. Definitions stay registered, but
    /// nothing can be requested until the index is rebuilt.
    pub fn shutdown(&self) {
        let scopes = std::mem::take(&mut *self.scopes.write());
        for (_, mut scope) in scopes {
            scope.clear();
        }

        self.state.write().type_index.clear();
        debug!("Pod factory shut down.");
    }

    fn cached_instance(
        &self,
        definition: &PodDefinition,
        context_id: ContextId,
    ) -> Option<PodInstanceAnyPtr> {
        self.scopes
            .read()
            .get(&definition.scope)
            .and_then(|scope| scope.instance(definition, context_id))
    }

    fn store_instance(
        &self,
        definition: &PodDefinition,
        context_id: ContextId,
        instance: PodInstanceAnyPtr,
    ) -> Result<(), PodInstanceProviderError> {
        let mut scopes = self.scopes.write();
        let scope = match scopes.entry(definition.scope) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let factory = self.scope_factories.get(&definition.scope).ok_or_else(|| {
                    PodInstanceProviderError::UnrecognizedScope {
                        pod: definition.name.clone(),
                        scope: definition.scope,
                    }
                })?;

                entry.insert(factory.create_scope())
            }
        };

        scope.store_instance(definition, context_id, instance);
        Ok(())
    }

    fn post_process(&self, pod: PodInstance) -> Result<PodInstanceAnyPtr, PodInstanceProviderError> {
        let post_processors = self.post_processors.read().clone();
        post_processors
            .iter()
            .try_fold(pod, |pod, post_processor| {
                post_processor
                    .post_processor
                    .post_process(&pod)
                    .map(|instance| PodInstance::new(pod.definition.clone(), instance))
                    .map_err(|source| PodInstanceProviderError::PostProcessingFailed {
                        pod: pod.definition.name.clone(),
                        source,
                    })
            })
            .map(|pod| pod.instance)
    }
}

/// State of a single request: the chain of pods under construction and the context used for
/// context-scoped pods.
struct InstantiationSession<'a> {
    factory: &'a PodFactory,
    resolver: DependencyResolver<'a>,
    context_id: Option<ContextId>,
    stack: Vec<Arc<PodDefinition>>,
}

impl<'a> InstantiationSession<'a> {
    fn new(
        factory: &'a PodFactory,
        resolver: DependencyResolver<'a>,
        context_id: Option<ContextId>,
    ) -> Self {
        Self {
            factory,
            resolver,
            context_id,
            stack: vec![],
        }
    }

    fn context_id(&mut self) -> ContextId {
        let owner = self.factory.id;
        *self
            .context_id
            .get_or_insert_with(|| context_id::current(owner))
    }

    fn current_pod(&self) -> String {
        self.stack
            .last()
            .map(|definition| definition.name.clone())
            .unwrap_or_default()
    }

    fn instantiate_pod(
        &mut self,
        definition: &Arc<PodDefinition>,
    ) -> Result<PodInstance, PodInstanceProviderError> {
        self.instantiate(definition)
            .map(|instance| PodInstance::new(definition.clone(), instance))
    }

    fn instantiate(
        &mut self,
        definition: &Arc<PodDefinition>,
    ) -> Result<PodInstanceAnyPtr, PodInstanceProviderError> {
        if self.stack.iter().any(|pod| pod.id == definition.id) {
            return Err(PodInstanceProviderError::CircularDependencyGraphDetected {
                path: self
                    .stack
                    .iter()
                    .map(|pod| pod.name.clone())
                    .chain([definition.name.clone()])
                    .collect(),
            });
        }

        let factory = self.factory;
        let context_id = self.context_id();
        if let Some(instance) = factory.cached_instance(definition, context_id) {
            return Ok(instance);
        }

        // concurrent first requests for a singleton must end up with the same instance
        let _guard = if definition.scope == PodScope::Singleton {
            let guard = factory.singleton_lock.lock();
            if let Some(instance) = factory.cached_instance(definition, context_id) {
                return Ok(instance);
            }

            Some(guard)
        } else {
            None
        };

        self.stack.push(definition.clone());
        let instance = self.construct(definition);
        self.stack.pop();

        let instance = instance?;
        factory.store_instance(definition, context_id, instance.clone())?;

        Ok(instance)
    }

    fn construct(
        &mut self,
        definition: &Arc<PodDefinition>,
    ) -> Result<PodInstanceAnyPtr, PodInstanceProviderError> {
        debug!(pod = %definition.name, scope = %definition.scope, "Creating pod instance.");

        let instance = (definition.constructor)(self).map_err(|error| match error {
            PodCreationError::Dependency(error) => error,
            PodCreationError::Constructor(source) => {
                PodInstanceProviderError::PodInstantiationFailed {
                    pod: definition.name.clone(),
                    source,
                }
            }
        })?;

        self.factory
            .post_process(PodInstance::new(definition.clone(), instance))
    }
}

impl PodInstanceProvider for InstantiationSession<'_> {
    fn resolve_single(
        &mut self,
        dependency: &DependencyDescriptor,
    ) -> Result<Option<PodInstance>, PodInstanceProviderError> {
        let definition = match &dependency.name {
            Some(name) => match self.resolver.by_name(dependency.type_key, name) {
                Ok(definition) => Some(definition),
                Err(_) if self.resolver.contains_name(name) => {
                    return Err(PodInstanceProviderError::UnexpectedNameInjected {
                        pod: self.current_pod(),
                        parameter: dependency.parameter.clone(),
                        name: name.clone(),
                        type_name: dependency.type_key.name(),
                    });
                }
                Err(_) => None,
            },
            None => self
                .resolver
                .resolve_unique(dependency.type_key, &dependency.qualifiers)?,
        };

        match definition {
            Some(definition) => self.instantiate_pod(definition).map(Some),
            None if dependency.is_optional() => Ok(None),
            None => Err(PodInstanceProviderError::UnexpectedDependencyTypeInjected {
                pod: self.current_pod(),
                parameter: dependency.parameter.clone(),
                type_name: dependency.type_key.name(),
            }),
        }
    }

    fn resolve_many(
        &mut self,
        dependency: &DependencyDescriptor,
    ) -> Result<Vec<PodInstance>, PodInstanceProviderError> {
        let candidates = self
            .resolver
            .candidates(dependency.type_key, &dependency.qualifiers);

        if candidates.is_empty() {
            return Err(PodInstanceProviderError::PodInstantiationFailed {
                pod: self.current_pod(),
                source: Arc::new(PodInstanceProviderError::NoSuchPod {
                    type_name: dependency.type_key.name(),
                    name: None,
                }),
            });
        }

        candidates
            .into_iter()
            .map(|definition| self.instantiate_pod(definition))
            .collect()
    }
}
