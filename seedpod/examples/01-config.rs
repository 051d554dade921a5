// note: this example assumes you've analyzed the previous one

use seedpod::application_context::ApplicationContext;
use seedpod::config::{ApplicationConfig, ApplicationConfigProvider};
use seedpod::service::Service;
use seedpod_di::instance_provider::ErrorPtr;
use seedpod_di::pod::PodInstancePtr;
use seedpod_di::{pod_alias, Pod};

// application config is provided by an ApplicationConfigProvider, which by default, uses
// environment variables and a configuration file (see module documentation)
// to provide your own, register a pod implementing this trait, and it will be used instead of the
// default one
#[derive(Pod)]
#[pod(constructor = "MyApplicationConfigProvider::new")]
struct MyApplicationConfigProvider {
    // this is the cached custom config
    #[pod(ignore)]
    config: ApplicationConfig,
}

impl MyApplicationConfigProvider {
    // using a custom constructor allows for caching the config for later use
    fn new() -> Result<Self, ErrorPtr> {
        // start with a default config and override what's needed
        let config = ApplicationConfig::default()
            .with_tracing_logger(false)
            .with_application_name("configured");

        Ok(Self { config })
    }
}

// register MyApplicationConfigProvider as an ApplicationConfigProvider
#[pod_alias]
impl ApplicationConfigProvider for MyApplicationConfigProvider {
    fn config(&self) -> Result<&ApplicationConfig, ErrorPtr> {
        Ok(&self.config)
    }
}

// this simple service will print a part of application config to prove everything works
#[derive(Pod)]
struct ConfigPrinter {
    application_config_provider: PodInstancePtr<dyn ApplicationConfigProvider + Send + Sync>,
}

#[pod_alias]
impl Service for ConfigPrinter {
    fn start(&self) -> Result<(), ErrorPtr> {
        let config = self.application_config_provider.config()?;
        println!("Running {}", config.application_name);
        Ok(())
    }

    fn stop(&self) -> Result<(), ErrorPtr> {
        Ok(())
    }
}

fn main() {
    let context =
        ApplicationContext::from_declarations().expect("unable to create application context");

    // prints "Running configured"
    context.start().expect("error starting application");
    context.stop().expect("error stopping application");
}
