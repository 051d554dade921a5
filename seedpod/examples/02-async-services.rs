// note: this example assumes you've analyzed the previous ones

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use seedpod::application_context::ApplicationContext;
use seedpod::aware::LoggerAware;
use seedpod::service::AsyncService;
use seedpod_di::instance_provider::ErrorPtr;
use seedpod_di::{pod_alias, Pod};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Span};

// async services run on a runtime owned by the application context, until it's stopped
#[derive(Pod)]
struct Heartbeat {
    // the stop token is given to every service before it's started
    #[pod(default)]
    stop_token: Mutex<Option<CancellationToken>>,
    // aware pods get access to framework infrastructure, e.g. a dedicated logger
    #[pod(default)]
    logger: Mutex<Option<Span>>,
}

#[pod_alias]
impl LoggerAware for Heartbeat {
    fn set_logger(&self, logger: Span) {
        *self.logger.lock() = Some(logger);
    }
}

#[pod_alias]
impl AsyncService for Heartbeat {
    fn set_stop_token(&self, token: CancellationToken) {
        *self.stop_token.lock() = Some(token);
    }

    fn start_async(&self) -> BoxFuture<'_, Result<(), ErrorPtr>> {
        async {
            let stop_token = self.stop_token.lock().clone().unwrap_or_default();
            let logger = self.logger.lock().clone().unwrap_or_else(Span::none);

            loop {
                tokio::select! {
                    _ = stop_token.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        logger.in_scope(|| info!("Beat"));
                    }
                }
            }

            Ok(())
        }
        .boxed()
    }

    fn stop_async(&self) -> BoxFuture<'_, Result<(), ErrorPtr>> {
        async {
            println!("Heartbeat stopped");
            Ok(())
        }
        .boxed()
    }
}

fn main() {
    let context =
        ApplicationContext::from_declarations().expect("unable to create application context");

    // logs "Beat" a few times, with the pod name and application name attached
    context.start().expect("error starting application");
    thread::sleep(Duration::from_millis(350));

    // prints "Heartbeat stopped"
    context.stop().expect("error stopping application");
}
