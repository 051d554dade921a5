//! Framework configuration is based on injecting an [ApplicationConfigProvider], which can later
//! be used to retrieve [ApplicationConfig]. [ApplicationContext](crate::application_context::ApplicationContext)
//! uses this config to configure itself, but it can also be injected into any other pod.
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by environment variables prefixed with `SEEDPOD_` or `seedpod.json` file. A custom provider can
//! be registered before the context is created, in which case the default one is skipped.

use config::{Config, ConfigError, Environment, File};
use seedpod_di::instance_provider::{ErrorPtr, PodInstanceProvider};
use seedpod_di::pod::{cast_concrete, PodInstanceAnyPtr, PodInstancePtr, TypeKey};
use seedpod_di::pod_registry::{PodDefinition, PodDefinitionBuilder};
use seedpod_di::{injectable, PodCreationError};
use serde::Deserialize;
use std::any::Any;
use std::sync::Arc;

const CONFIG_ENV_PREFIX: &str = "SEEDPOD";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "seedpod.json";

/// Framework configuration which can be provided by an [ApplicationConfigProvider].
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct ApplicationConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
    /// Name used as the root of logger spans handed out to pods.
    pub application_name: String,
    /// Number of worker threads of the runtime running async services.
    pub async_worker_threads: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            application_name: "seedpod".to_string(),
            async_worker_threads: 1,
        }
    }
}

impl From<OptionalApplicationConfig> for ApplicationConfig {
    fn from(value: OptionalApplicationConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            application_name: value
                .application_name
                .unwrap_or(default.application_name),
            async_worker_threads: value
                .async_worker_threads
                .unwrap_or(default.async_worker_threads),
        }
    }
}

impl ApplicationConfig {
    /// Loads the config from [CONFIG_FILE] and `SEEDPOD_*` environment variables.
    pub fn from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalApplicationConfig>())
            .map(|config| config.into())
    }

    pub fn with_tracing_logger(mut self, install_tracing_logger: bool) -> Self {
        self.install_tracing_logger = install_tracing_logger;
        self
    }

    pub fn with_application_name<T: ToString>(mut self, application_name: T) -> Self {
        self.application_name = application_name.to_string();
        self
    }

    pub fn with_async_worker_threads(mut self, async_worker_threads: usize) -> Self {
        self.async_worker_threads = async_worker_threads;
        self
    }
}

/// Provider for [ApplicationConfig]. The primary instance of the provider will be used to retrieve
/// application configuration.
#[injectable]
pub trait ApplicationConfigProvider {
    fn config(&self) -> Result<&ApplicationConfig, ErrorPtr>;
}

/// Provider reading the config from the environment. Registered by hand, so that scanning declared
/// pods only finds user-provided ones.
pub(crate) struct DefaultApplicationConfigProvider {
    // cached init result
    config: Result<ApplicationConfig, ErrorPtr>,
}

impl DefaultApplicationConfigProvider {
    pub(crate) fn definition() -> PodDefinition {
        PodDefinitionBuilder::new(
            "default_application_config_provider",
            TypeKey::of::<Self>(),
            Self::construct,
            cast_concrete::<Self>,
        )
        .with_capability(
            TypeKey::of::<dyn ApplicationConfigProvider + Send + Sync>(),
            cast_provider,
        )
        .with_lazy(true)
        .build()
    }

    fn construct(
        _instance_provider: &mut dyn PodInstanceProvider,
    ) -> Result<PodInstanceAnyPtr, PodCreationError> {
        let provider = Self {
            config: ApplicationConfig::from_environment()
                .map_err(|error| Arc::new(error) as ErrorPtr),
        };

        Ok(Arc::new(provider))
    }
}

fn cast_provider(instance: PodInstanceAnyPtr) -> Result<Box<dyn Any>, PodInstanceAnyPtr> {
    instance
        .downcast::<DefaultApplicationConfigProvider>()
        .map(|provider| {
            Box::new(provider as PodInstancePtr<dyn ApplicationConfigProvider + Send + Sync>)
                as Box<dyn Any>
        })
}

impl ApplicationConfigProvider for DefaultApplicationConfigProvider {
    fn config(&self) -> Result<&ApplicationConfig, ErrorPtr> {
        match &self.config {
            Ok(config) => Ok(config),
            Err(error) => Err(error.clone()),
        }
    }
}

#[derive(Deserialize)]
struct OptionalApplicationConfig {
    install_tracing_logger: Option<bool>,
    application_name: Option<String>,
    async_worker_threads: Option<usize>,
}
