//! Background services started and stopped along with the
//! [ApplicationContext](crate::application_context::ApplicationContext).
//!
//! A pod becomes a service by exposing [Service] or [AsyncService] with `#[pod_alias]`. Services
//! are discovered when their instances are created, so a lazy service is only started if
//! something requested it before the context started.

use futures::future::BoxFuture;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use seedpod_di::injectable;
use seedpod_di::instance_provider::{ErrorPtr, PodInstance};
use seedpod_di::pod::{PodInstanceAnyPtr, PodInstancePtr};
use seedpod_di::post_processor::PostProcessor;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type ServicePtr = PodInstancePtr<dyn Service + Send + Sync>;
pub type AsyncServicePtr = PodInstancePtr<dyn AsyncService + Send + Sync>;

/// Synchronous service. `start()` should return once the service is running; long-running work
/// belongs on a separate thread, which should observe the stop token.
#[injectable]
#[cfg_attr(test, automock)]
pub trait Service {
    /// Receives the token cancelled when the context stops, before the service starts.
    fn set_stop_token(&self, _token: CancellationToken) {}

    fn start(&self) -> Result<(), ErrorPtr>;

    fn stop(&self) -> Result<(), ErrorPtr>;
}

/// Asynchronous service, run as a task on the runtime owned by the context. The start future can
/// run for the whole lifetime of the service.
#[injectable]
#[cfg_attr(test, automock)]
pub trait AsyncService {
    /// Receives the token cancelled when the context stops, before the service starts.
    fn set_stop_token(&self, _token: CancellationToken) {}

    fn start_async(&self) -> BoxFuture<'_, Result<(), ErrorPtr>>;

    fn stop_async(&self) -> BoxFuture<'_, Result<(), ErrorPtr>>;
}

/// Services discovered before the context started, in creation order. Once closed, the registry
/// ignores new instances, so services created after start are neither started nor stopped.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Mutex<Vec<(String, ServicePtr)>>,
    async_services: Mutex<Vec<(String, AsyncServicePtr)>>,
    closed: AtomicBool,
}

impl ServiceRegistry {
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops accepting new services. Called once the registered ones have been started.
    #[inline]
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn services(&self) -> Vec<(String, ServicePtr)> {
        self.services.lock().clone()
    }

    pub fn async_services(&self) -> Vec<(String, AsyncServicePtr)> {
        self.async_services.lock().clone()
    }

    pub fn clear(&self) {
        self.services.lock().clear();
        self.async_services.lock().clear();
    }
}

/// Post-processor registering service instances and handing them the stop token. Installed by the
/// application context with the highest order, so it sees the final instances.
pub struct ServicePostProcessor {
    registry: PodInstancePtr<ServiceRegistry>,
    stop_token: CancellationToken,
}

impl ServicePostProcessor {
    pub fn new(registry: PodInstancePtr<ServiceRegistry>, stop_token: CancellationToken) -> Self {
        Self {
            registry,
            stop_token,
        }
    }
}

impl PostProcessor for ServicePostProcessor {
    fn post_process(&self, pod: &PodInstance) -> Result<PodInstanceAnyPtr, ErrorPtr> {
        let name = &pod.definition.name;

        if self.registry.is_closed() {
            return Ok(pod.instance.clone());
        }

        if let Some(service) = pod.try_cast::<dyn Service + Send + Sync>() {
            debug!(service = %name, "Found service.");
            service.set_stop_token(self.stop_token.clone());
            self.registry.services.lock().push((name.clone(), service));
        }

        if let Some(service) = pod.try_cast::<dyn AsyncService + Send + Sync>() {
            debug!(service = %name, "Found async service.");
            service.set_stop_token(self.stop_token.clone());
            self.registry
                .async_services
                .lock()
                .push((name.clone(), service));
        }

        Ok(pod.instance.clone())
    }
}
