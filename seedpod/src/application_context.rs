//! Lifecycle container owning a [PodFactory] and the supporting infrastructure.
//!
//! The context moves through `CREATED -> STARTING -> STARTED -> STOPPING -> STOPPED`. Starting it
//! creates post-processor pods, then all eager singletons, then starts discovered
//! [services](crate::service). Stopping it signals the shared stop token, stops the started
//! services and drops all cached instances.

use crate::aware::AwarePostProcessor;
use crate::config::{ApplicationConfig, ApplicationConfigProvider, DefaultApplicationConfigProvider};
use crate::service::{ServicePostProcessor, ServiceRegistry};
use derive_more::Display;
use futures::future::join_all;
use parking_lot::Mutex;
use seedpod_di::context_id::ContextId;
use seedpod_di::factory::{PodFactory, PodFactoryBuilder};
use seedpod_di::instance_provider::{ErrorPtr, PodInstance};
use seedpod_di::pod::{Injectable, PodInstancePtr};
use seedpod_di::pod_registry::PodDefinition;
use seedpod_di::{PodInstanceProviderError, PodRegistryError};
use std::future::Future;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Error, Clone, Debug)]
pub enum ApplicationContextError {
    #[error("Application context has already been started")]
    AlreadyStarted,
    #[error("Application context has already been stopped")]
    AlreadyStopped,
    #[error("Application context has not been started")]
    NotStarted,
    #[error(transparent)]
    Registry(#[from] PodRegistryError),
    #[error(transparent)]
    Provider(#[from] PodInstanceProviderError),
    #[error("Error retrieving application config: {0}")]
    Configuration(ErrorPtr),
    #[error("Error creating async runtime: {0}")]
    Runtime(ErrorPtr),
    #[error("Service '{service}' failed to start: {source}")]
    Service { service: String, source: ErrorPtr },
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Display)]
pub enum ContextState {
    #[display(fmt = "CREATED")]
    Created,
    #[display(fmt = "STARTING")]
    Starting,
    #[display(fmt = "STARTED")]
    Started,
    #[display(fmt = "STOPPING")]
    Stopping,
    #[display(fmt = "STOPPED")]
    Stopped,
}

/// Order of the built-in aware post-processor.
pub const AWARE_POST_PROCESSOR_ORDER: i32 = i32::MIN;

/// Order of the built-in service post-processor.
pub const SERVICE_POST_PROCESSOR_ORDER: i32 = i32::MAX;

/// Main entrypoint for the application. Bootstraps the container, runs services and gives access to
/// pods.
pub struct ApplicationContext {
    factory: Arc<PodFactory>,
    config: ApplicationConfig,
    state: Mutex<ContextState>,
    services: Arc<ServiceRegistry>,
    stop_token: CancellationToken,
    runtime: Mutex<Option<Runtime>>,
}

impl ApplicationContext {
    /// Creates a context for given factory. If no [ApplicationConfigProvider] is registered, the
    /// default one is added, reading the config from the environment.
    pub fn new(factory: PodFactory) -> Result<Arc<Self>, ApplicationContextError> {
        if !factory.contains::<dyn ApplicationConfigProvider + Send + Sync>() {
            factory.add_definition(DefaultApplicationConfigProvider::definition())?;
        }

        let config = factory
            .get::<dyn ApplicationConfigProvider + Send + Sync>()?
            .config()
            .cloned()
            .map_err(ApplicationContextError::Configuration)?;

        Ok(Self::with_config(factory, config))
    }

    /// Creates a context with all pods declared in the binary.
    pub fn from_declarations() -> Result<Arc<Self>, ApplicationContextError> {
        let factory = PodFactoryBuilder::new().build();
        factory.scan()?;
        Self::new(factory)
    }

    /// Creates a context with explicit config, bypassing config providers.
    pub fn with_config(factory: PodFactory, config: ApplicationConfig) -> Arc<Self> {
        if config.install_tracing_logger {
            // fails if a global subscriber is already installed, which is fine
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .try_init();
        }

        let factory = Arc::new(factory);
        let services = Arc::new(ServiceRegistry::default());
        let stop_token = CancellationToken::new();

        Arc::new_cyclic(|context: &Weak<Self>| {
            factory.add_post_processor(
                AWARE_POST_PROCESSOR_ORDER,
                Arc::new(AwarePostProcessor::new(
                    config.application_name.clone(),
                    Arc::downgrade(&factory),
                    context.clone(),
                )),
            );
            factory.add_post_processor(
                SERVICE_POST_PROCESSOR_ORDER,
                Arc::new(ServicePostProcessor::new(
                    services.clone(),
                    stop_token.clone(),
                )),
            );

            Self {
                factory,
                config,
                state: Mutex::new(ContextState::Created),
                services,
                stop_token,
                runtime: Mutex::new(None),
            }
        })
    }

    #[inline]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    #[inline]
    pub fn factory(&self) -> &Arc<PodFactory> {
        &self.factory
    }

    #[inline]
    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    /// Token cancelled when the context stops.
    #[inline]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop_token.clone()
    }

    /// Starts the context: installs post-processor pods, creates eager singletons and starts
    /// services. Async services run on a runtime owned by the context. The state is `STARTING`
    /// while pods are created, and returns to `CREATED` if starting fails, so it can be retried.
    pub fn start(&self) -> Result<(), ApplicationContextError> {
        self.transition(ContextState::Starting)?;
        info!(application = %self.config.application_name, "Starting application context...");

        match self.start_pods_and_services() {
            Ok(()) => {
                *self.state.lock() = ContextState::Started;
                info!(application = %self.config.application_name, "Application context started.");
                Ok(())
            }
            Err(error) => {
                *self.state.lock() = ContextState::Created;
                warn!(
                    application = %self.config.application_name,
                    %error,
                    "Application context failed to start."
                );
                Err(error)
            }
        }
    }

    // Moves to a transient state. The lock is not held afterwards, so pods created meanwhile can
    // query the context.
    fn transition(&self, target: ContextState) -> Result<(), ApplicationContextError> {
        let mut state = self.state.lock();
        match (*state, target) {
            (ContextState::Created, ContextState::Starting)
            | (ContextState::Started, ContextState::Stopping) => {
                *state = target;
                Ok(())
            }
            (ContextState::Stopping | ContextState::Stopped, _) => {
                Err(ApplicationContextError::AlreadyStopped)
            }
            (_, ContextState::Starting) => Err(ApplicationContextError::AlreadyStarted),
            _ => Err(ApplicationContextError::NotStarted),
        }
    }

    fn start_pods_and_services(&self) -> Result<(), ApplicationContextError> {
        self.factory.rebuild_type_index();
        let post_processors = self.factory.install_post_processor_pods()?;
        debug!(post_processors, "Installed post-processor pods.");

        self.factory.instantiate_eager_singletons()?;
        self.start_services()
    }

    fn start_services(&self) -> Result<(), ApplicationContextError> {
        let services = self.services.services();
        for (index, (name, service)) in services.iter().enumerate() {
            debug!(service = %name, "Starting service.");
            if let Err(source) = service.start() {
                for (name, service) in services[..index].iter().rev() {
                    if let Err(error) = service.stop() {
                        warn!(service = %name, %error, "Error stopping service.");
                    }
                }

                return Err(ApplicationContextError::Service {
                    service: name.clone(),
                    source,
                });
            }
        }

        let async_services = self.services.async_services();
        if !async_services.is_empty() {
            let runtime = match Builder::new_multi_thread()
                .worker_threads(self.config.async_worker_threads.max(1))
                .thread_name(format!("{}-service", self.config.application_name))
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(error) => {
                    for (name, service) in services.iter().rev() {
                        if let Err(error) = service.stop() {
                            warn!(service = %name, %error, "Error stopping service.");
                        }
                    }

                    return Err(ApplicationContextError::Runtime(Arc::new(error)));
                }
            };

            for (name, service) in async_services {
                debug!(service = %name, "Spawning async service.");
                runtime.spawn(seedpod_di::context_id::scope(async move {
                    if let Err(error) = service.start_async().await {
                        warn!(service = %name, %error, "Async service failed.");
                    }
                }));
            }

            *self.runtime.lock() = Some(runtime);
        }

        // only the services started above get stopped
        self.services.close();
        Ok(())
    }

    /// Stops the context: cancels the stop token, stops services started by [start](Self::start)
    /// and drops all instances. Errors from services are logged, but don't interrupt stopping.
    /// Blocks until async services are stopped, so it cannot be called from within an async
    /// context.
    pub fn stop(&self) -> Result<(), ApplicationContextError> {
        self.transition(ContextState::Stopping)?;

        info!(application = %self.config.application_name, "Stopping application context...");
        self.stop_token.cancel();

        for (name, service) in self.services.services().into_iter().rev() {
            debug!(service = %name, "Stopping service.");
            if let Err(error) = service.stop() {
                warn!(service = %name, %error, "Error stopping service.");
            }
        }

        if let Some(runtime) = self.runtime.lock().take() {
            let async_services = self.services.async_services();
            let results = runtime.block_on(join_all(
                async_services
                    .iter()
                    .map(|(_, service)| service.stop_async()),
            ));

            for ((name, _), result) in async_services.iter().zip(results) {
                if let Err(error) = result {
                    warn!(service = %name, %error, "Error stopping async service.");
                }
            }

            runtime.shutdown_background();
        }

        self.services.clear();
        self.factory.shutdown();

        *self.state.lock() = ContextState::Stopped;
        info!(application = %self.config.application_name, "Application context stopped.");

        Ok(())
    }

    /// Registers the pod declared for type `T`.
    #[inline]
    pub fn add<T: ?Sized + 'static>(&self) -> Result<bool, ApplicationContextError> {
        Ok(self.factory.add::<T>()?)
    }

    /// Registers the pod declared by given `#[pod_factory]` function.
    #[inline]
    pub fn add_factory<F: 'static>(&self, factory: F) -> Result<bool, ApplicationContextError> {
        Ok(self.factory.add_factory(factory)?)
    }

    #[inline]
    pub fn get<T: Injectable + ?Sized>(
        &self,
    ) -> Result<PodInstancePtr<T>, PodInstanceProviderError> {
        self.factory.get()
    }

    #[inline]
    pub fn get_named<T: Injectable + ?Sized>(
        &self,
        name: &str,
    ) -> Result<PodInstancePtr<T>, PodInstanceProviderError> {
        self.factory.get_named(name)
    }

    #[inline]
    pub fn get_all<T: Injectable + ?Sized>(
        &self,
    ) -> Result<Vec<PodInstancePtr<T>>, PodInstanceProviderError> {
        self.factory.get_all()
    }

    #[inline]
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.factory.contains::<T>()
    }

    #[inline]
    pub fn contains_named<T: ?Sized + 'static>(&self, name: &str) -> bool {
        self.factory.contains_named::<T>(name)
    }

    /// Instantiates all pods whose definition satisfies the predicate.
    #[inline]
    pub fn find<P: Fn(&PodDefinition) -> bool>(
        &self,
        predicate: P,
    ) -> Result<Vec<PodInstance>, PodInstanceProviderError> {
        self.factory.find(predicate)
    }

    #[inline]
    pub fn context_id(&self) -> ContextId {
        self.factory.context_id()
    }

    #[inline]
    pub fn clear_context(&self) {
        self.factory.clear_context()
    }

    /// Runs given future with its own context id. Spawned tasks using context-scoped pods need
    /// this, otherwise they share the id of whichever worker thread polls them.
    #[inline]
    pub fn scope<F: Future>(&self, future: F) -> impl Future<Output = F::Output> {
        self.factory.scope(future)
    }
}

impl Drop for ApplicationContext {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            self.stop_token.cancel();
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::application_context::{ApplicationContext, ApplicationContextError, ContextState};
    use crate::config::ApplicationConfig;
    use crate::service::{MockService, Service};
    use seedpod_di::factory::PodFactoryBuilder;
    use seedpod_di::instance_provider::{ErrorPtr, PodInstanceProvider};
    use seedpod_di::pod::{PodInstanceAnyPtr, PodInstancePtr, TypeKey};
    use seedpod_di::pod_registry::PodDefinitionBuilder;
    use seedpod_di::PodCreationError;
    use std::any::Any;
    use std::io;
    use std::sync::Arc;

    fn config() -> ApplicationConfig {
        ApplicationConfig::default().with_tracing_logger(false)
    }

    fn failing_service(
        _instance_provider: &mut dyn PodInstanceProvider,
    ) -> Result<PodInstanceAnyPtr, PodCreationError> {
        let mut service = MockService::new();
        service.expect_set_stop_token().returning(|_| ());
        service
            .expect_start()
            .returning(|| Err(Arc::new(io::Error::from(io::ErrorKind::AddrInUse)) as ErrorPtr));
        service.expect_stop().never();
        Ok(Arc::new(service))
    }

    fn cast_mock(instance: PodInstanceAnyPtr) -> Result<Box<dyn Any>, PodInstanceAnyPtr> {
        instance
            .downcast::<MockService>()
            .map(|pod| Box::new(pod) as Box<dyn Any>)
    }

    fn cast_service(instance: PodInstanceAnyPtr) -> Result<Box<dyn Any>, PodInstanceAnyPtr> {
        instance
            .downcast::<MockService>()
            .map(|pod| Box::new(pod as PodInstancePtr<dyn Service + Send + Sync>) as Box<dyn Any>)
    }

    #[test]
    fn should_follow_lifecycle() {
        let context = ApplicationContext::with_config(PodFactoryBuilder::new().build(), config());
        assert_eq!(context.state(), ContextState::Created);

        assert!(matches!(
            context.stop().unwrap_err(),
            ApplicationContextError::NotStarted
        ));

        context.start().unwrap();
        assert_eq!(context.state(), ContextState::Started);
        assert!(matches!(
            context.start().unwrap_err(),
            ApplicationContextError::AlreadyStarted
        ));

        context.stop().unwrap();
        assert_eq!(context.state(), ContextState::Stopped);
        assert!(context.stop_token().is_cancelled());
        assert!(matches!(
            context.stop().unwrap_err(),
            ApplicationContextError::AlreadyStopped
        ));
        assert!(matches!(
            context.start().unwrap_err(),
            ApplicationContextError::AlreadyStopped
        ));
    }

    #[test]
    fn should_report_failing_service() {
        let factory = PodFactoryBuilder::new().build();
        factory
            .add_definition(
                PodDefinitionBuilder::new(
                    "failing_service",
                    TypeKey::of::<MockService>(),
                    failing_service,
                    cast_mock,
                )
                .with_capability(TypeKey::of::<dyn Service + Send + Sync>(), cast_service)
                .build(),
            )
            .unwrap();

        let context = ApplicationContext::with_config(factory, config());
        let error = context.start().unwrap_err();

        assert!(matches!(
            error,
            ApplicationContextError::Service { ref service, .. } if service == "failing_service"
        ));
        assert_eq!(context.state(), ContextState::Created);
    }
}
