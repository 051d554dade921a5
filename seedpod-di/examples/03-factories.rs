use seedpod_di::factory::PodFactoryBuilder;
use seedpod_di::instance_provider::ErrorPtr;
use seedpod_di::pod::PodInstancePtr;
use seedpod_di::{injectable, pod_factory, Pod};

#[derive(Pod)]
struct Settings {
    #[pod(default = "default_url")]
    url: String,
}

fn default_url() -> String {
    "memory://users".to_string()
}

// types which are not pods themselves can be created by factory functions
#[injectable]
struct Connection {
    url: String,
}

// the function name becomes the pod name, unless overridden with `name = "..."`; parameters are
// injected just like struct fields
#[pod_factory]
fn connection(settings: PodInstancePtr<Settings>) -> Connection {
    Connection {
        url: settings.url.clone(),
    }
}

// custom constructors can be used for pods which need some logic during creation
#[derive(Pod)]
#[pod(constructor = "UserRepository::new")]
struct UserRepository {
    connection: PodInstancePtr<Connection>,
    #[pod(ignore)]
    table: String,
}

impl UserRepository {
    fn new(connection: PodInstancePtr<Connection>) -> Result<Self, ErrorPtr> {
        Ok(Self {
            connection,
            table: "users".to_string(),
        })
    }
}

fn main() {
    let factory = PodFactoryBuilder::new().build();
    factory.add::<Settings>().expect("error registering Settings");
    factory
        .add_factory(connection)
        .expect("error registering connection");
    factory
        .add::<UserRepository>()
        .expect("error registering UserRepository");

    let repository = factory
        .get::<UserRepository>()
        .expect("error creating UserRepository");

    // prints "Reading users from memory://users"
    println!(
        "Reading {} from {}",
        repository.table, repository.connection.url
    );
}
