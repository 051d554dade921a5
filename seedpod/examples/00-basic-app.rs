use seedpod::application_context::ApplicationContext;
use seedpod::service::Service;
use seedpod_di::instance_provider::ErrorPtr;
use seedpod_di::{pod_alias, Pod};

// this is a service, which will be started along with the application context; the context will
// automatically discover it when its instance is created
#[derive(Pod)]
struct HelloWorldService;

#[pod_alias]
impl Service for HelloWorldService {
    fn start(&self) -> Result<(), ErrorPtr> {
        println!("Hello world!");
        Ok(())
    }

    fn stop(&self) -> Result<(), ErrorPtr> {
        println!("Goodbye world!");
        Ok(())
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // create our application context with all declared pods
    let context =
        ApplicationContext::from_declarations().expect("unable to create application context");

    // prints "Hello world!"
    context.start().expect("error starting application");

    // prints "Goodbye world!"
    context.stop().expect("error stopping application");
}
