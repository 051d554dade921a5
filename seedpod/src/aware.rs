//! Callbacks giving pods access to framework infrastructure. A pod opts in by implementing one of
//! the aware traits with `#[pod_alias]`, so the trait becomes part of its capability set. Every
//! freshly created instance is then checked by [AwarePostProcessor], which calls the matching
//! setters before the instance is handed out.
//!
//! Setters take `&self`, since instances are already shared at that point, so pods need interior
//! mutability to store what they receive:
//!
//! ```
//! use parking_lot::Mutex;
//! use seedpod::aware::LoggerAware;
//! use seedpod_di::{pod_alias, Pod};
//! use tracing::Span;
//!
//! #[derive(Pod)]
//! struct Worker {
//!     #[pod(default)]
//!     logger: Mutex<Option<Span>>,
//! }
//!
//! #[pod_alias]
//! impl LoggerAware for Worker {
//!     fn set_logger(&self, logger: Span) {
//!         *self.logger.lock() = Some(logger);
//!     }
//! }
//! ```

use crate::application_context::ApplicationContext;
use seedpod_di::factory::PodFactory;
use seedpod_di::injectable;
use seedpod_di::instance_provider::{ErrorPtr, PodInstance};
use seedpod_di::pod::PodInstanceAnyPtr;
use seedpod_di::post_processor::PostProcessor;
use std::sync::Weak;
use tracing::{info_span, Span};

/// Receives a logger span dedicated to the pod.
#[injectable]
pub trait LoggerAware {
    fn set_logger(&self, logger: Span);
}

/// Receives a reference to the container which created the pod.
#[injectable]
pub trait ContainerAware {
    fn set_container(&self, container: Weak<PodFactory>);
}

/// Receives a reference to the owning application context.
#[injectable]
pub trait ApplicationContextAware {
    fn set_application_context(&self, context: Weak<ApplicationContext>);
}

/// Post-processor invoking aware callbacks. Installed by the application context with the lowest
/// order, so other post-processors see fully initialized instances.
pub struct AwarePostProcessor {
    application_name: String,
    container: Weak<PodFactory>,
    context: Weak<ApplicationContext>,
}

impl AwarePostProcessor {
    pub fn new(
        application_name: String,
        container: Weak<PodFactory>,
        context: Weak<ApplicationContext>,
    ) -> Self {
        Self {
            application_name,
            container,
            context,
        }
    }
}

impl PostProcessor for AwarePostProcessor {
    fn post_process(&self, pod: &PodInstance) -> Result<PodInstanceAnyPtr, ErrorPtr> {
        if let Some(aware) = pod.try_cast::<dyn LoggerAware + Send + Sync>() {
            aware.set_logger(info_span!(
                "pod",
                application = %self.application_name,
                name = %pod.definition.name
            ));
        }

        if let Some(aware) = pod.try_cast::<dyn ContainerAware + Send + Sync>() {
            aware.set_container(self.container.clone());
        }

        if let Some(aware) = pod.try_cast::<dyn ApplicationContextAware + Send + Sync>() {
            aware.set_application_context(self.context.clone());
        }

        Ok(pod.instance.clone())
    }
}

#[cfg(test)]
mod tests {
    use crate::aware::{AwarePostProcessor, ContainerAware, LoggerAware};
    use parking_lot::Mutex;
    use seedpod_di::factory::PodFactory;
    use seedpod_di::instance_provider::{PodInstance, PodInstanceProvider};
    use seedpod_di::pod::{PodInstanceAnyPtr, PodInstancePtr, TypeKey};
    use seedpod_di::pod_registry::PodDefinitionBuilder;
    use seedpod_di::post_processor::PostProcessor;
    use seedpod_di::PodCreationError;
    use std::any::Any;
    use std::sync::{Arc, Weak};
    use tracing::Span;

    #[derive(Default)]
    struct Observer {
        logger: Mutex<Option<Span>>,
        container: Mutex<Option<Weak<PodFactory>>>,
    }

    impl LoggerAware for Observer {
        fn set_logger(&self, logger: Span) {
            *self.logger.lock() = Some(logger);
        }
    }

    impl ContainerAware for Observer {
        fn set_container(&self, container: Weak<PodFactory>) {
            *self.container.lock() = Some(container);
        }
    }

    fn construct_observer(
        _instance_provider: &mut dyn PodInstanceProvider,
    ) -> Result<PodInstanceAnyPtr, PodCreationError> {
        Ok(Arc::new(Observer::default()))
    }

    fn cast_observer(instance: PodInstanceAnyPtr) -> Result<Box<dyn Any>, PodInstanceAnyPtr> {
        instance
            .downcast::<Observer>()
            .map(|pod| Box::new(pod) as Box<dyn Any>)
    }

    fn cast_logger_aware(instance: PodInstanceAnyPtr) -> Result<Box<dyn Any>, PodInstanceAnyPtr> {
        instance.downcast::<Observer>().map(|pod| {
            Box::new(pod as PodInstancePtr<dyn LoggerAware + Send + Sync>) as Box<dyn Any>
        })
    }

    fn observer_pod(instance: Arc<Observer>) -> PodInstance {
        let definition = PodDefinitionBuilder::new(
            "observer",
            TypeKey::of::<Observer>(),
            construct_observer,
            cast_observer,
        )
        .with_capability(
            TypeKey::of::<dyn LoggerAware + Send + Sync>(),
            cast_logger_aware,
        )
        .build();

        PodInstance::new(Arc::new(definition), instance)
    }

    #[test]
    fn should_call_declared_callbacks_only() {
        let observer = Arc::new(Observer::default());
        let post_processor =
            AwarePostProcessor::new("test".to_string(), Weak::new(), Weak::new());

        let result = post_processor
            .post_process(&observer_pod(observer.clone()))
            .unwrap();

        assert!(result.downcast::<Observer>().is_ok());
        assert!(observer.logger.lock().is_some());
        // ContainerAware is implemented, but not part of the capability set
        assert!(observer.container.lock().is_none());
    }
}
