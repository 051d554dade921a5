use seedpod_di::factory::{PodFactory, PodFactoryBuilder};
use seedpod_di::Pod;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static REQUESTS: AtomicUsize = AtomicUsize::new(0);

fn next_request() -> usize {
    REQUESTS.fetch_add(1, Ordering::Relaxed)
}

#[derive(Pod)]
#[pod(scope = "CONTEXT")]
struct RequestContext {
    #[pod(default = "next_request")]
    id: usize,
}

async fn handle(factory: Arc<PodFactory>, name: &'static str) {
    let context = factory
        .get::<RequestContext>()
        .expect("error creating RequestContext");

    tokio::task::yield_now().await;

    // the same task sees the same context across await points
    let same = factory
        .get::<RequestContext>()
        .expect("error creating RequestContext");
    println!("{name}: {} / {}", context.id, same.id);
}

#[tokio::main]
async fn main() {
    let factory = Arc::new(PodFactoryBuilder::new().build());
    factory
        .add::<RequestContext>()
        .expect("error registering RequestContext");

    // each task wrapped in a scope gets its own context id, regardless of the thread polling it
    let first = tokio::spawn(factory.scope(handle(factory.clone(), "first")));
    let second = tokio::spawn(factory.scope(handle(factory.clone(), "second")));

    first.await.expect("first task failed");
    second.await.expect("second task failed");
}
