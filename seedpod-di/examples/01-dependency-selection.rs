// note: this example assumes you've analyzed the previous one

use seedpod_di::factory::PodFactoryBuilder;
use seedpod_di::instance_provider::PodMap;
use seedpod_di::pod::PodInstancePtr;
use seedpod_di::pod_registry::PodDefinition;
use seedpod_di::{injectable, pod_alias, Pod};

#[injectable]
trait TestTrait {
    fn foo(&self);
}

// if the same trait is implemented for multiple types, one can be marked as primary to allow the
// container to inject a single instance
#[derive(Pod)]
#[pod(primary)]
struct TestDependency1;

#[pod_alias]
impl TestTrait for TestDependency1 {
    fn foo(&self) {
        println!("Hello world from 1!");
    }
}

// pods have names which can be referenced to inject a specific one; if not specified, a default
// one is generated from the struct name by converting it to snake_case
#[derive(Pod)]
#[pod(name = "second_dependency")]
struct TestDependency2;

#[pod_alias]
impl TestTrait for TestDependency2 {
    fn foo(&self) {
        println!("Hello world from 2!");
    }
}

// qualifiers are arbitrary predicates narrowing down the candidates
fn is_second(definition: &PodDefinition) -> bool {
    definition.name.starts_with("second")
}

#[derive(Pod)]
struct TestPod {
    // since there are several candidates implementing dyn TestTrait, the container needs to decide
    // which to inject - if no specification is present, the primary pod is injected
    dependency_1: PodInstancePtr<dyn TestTrait + Send + Sync>,
    // it's possible to manually specify which pod to inject
    #[pod(name = "second_dependency")]
    dependency_2: PodInstancePtr<dyn TestTrait + Send + Sync>,
    // or select it with a qualifier
    #[pod(qualifier = "is_second")]
    dependency_3: PodInstancePtr<dyn TestTrait + Send + Sync>,
    // all candidates can be injected as well, either as a list or keyed by name
    all: Vec<PodInstancePtr<dyn TestTrait + Send + Sync>>,
    by_name: PodMap<dyn TestTrait + Send + Sync>,
}

impl TestPod {
    fn call_foo(&self) {
        self.dependency_1.foo();
        self.dependency_2.foo();
        self.dependency_3.foo();

        println!("{} candidates", self.all.len());
        self.by_name["second_dependency"].foo();
    }
}

fn main() {
    let factory = PodFactoryBuilder::new().build();

    // scan() registers all pods declared in the binary
    factory.scan().expect("error scanning pods");

    let pod = factory.get::<TestPod>().expect("error creating TestPod");

    // prints "Hello world from 1!" "Hello world from 2!" "Hello world from 2!" "2 candidates"
    // "Hello world from 2!"
    pod.call_foo();
}
