use seedpod_di::factory::PodFactoryBuilder;
use seedpod_di::pod::PodInstancePtr;
use seedpod_di::Pod;
use std::sync::atomic::{AtomicUsize, Ordering};

static CREATED: AtomicUsize = AtomicUsize::new(0);

fn next_id() -> usize {
    CREATED.fetch_add(1, Ordering::Relaxed)
}

// singletons are created once per container - this is the default scope
#[derive(Pod)]
struct Shared;

// prototypes are created on each request
#[derive(Pod)]
#[pod(scope = "PROTOTYPE")]
struct Fresh {
    #[pod(default = "next_id")]
    id: usize,
}

// context pods live as long as the current context, e.g. a request being handled
#[derive(Pod)]
#[pod(scope = "CONTEXT")]
struct RequestState {
    #[pod(default = "next_id")]
    id: usize,
    // a singleton injected into a shorter-lived pod is still shared
    _shared: PodInstancePtr<Shared>,
}

fn main() {
    let factory = PodFactoryBuilder::new().build();
    factory.scan().expect("error scanning pods");

    let first = factory.get::<Fresh>().expect("error creating Fresh");
    let second = factory.get::<Fresh>().expect("error creating Fresh");
    println!("Prototypes: {} and {}", first.id, second.id);

    let state = factory
        .get::<RequestState>()
        .expect("error creating RequestState");
    let same_state = factory
        .get::<RequestState>()
        .expect("error creating RequestState");
    println!("Same context: {} and {}", state.id, same_state.id);

    // clearing the context drops its pods and starts a new one
    factory.clear_context();
    let new_state = factory
        .get::<RequestState>()
        .expect("error creating RequestState");
    println!("New context: {}", new_state.id);
}
