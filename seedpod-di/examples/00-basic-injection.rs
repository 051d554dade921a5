use seedpod_di::factory::PodFactoryBuilder;
use seedpod_di::pod::PodInstancePtr;
use seedpod_di::{injectable, pod_alias, Pod};

// this is a trait we would like to use in our pod
#[injectable]
trait TestTrait {
    fn foo(&self);
}

// this is a dependency which implements the above trait and also is an injectable pod
#[derive(Pod)]
struct TestDependency;

// we're telling the container to provide TestDependency when asked for dyn TestTrait
#[pod_alias]
impl TestTrait for TestDependency {
    fn foo(&self) {
        println!("Hello world!");
    }
}

// this is another pod, but with a dependency
#[derive(Pod)]
struct TestPod {
    // the container will know how to inject dyn TestTrait, when asked for TestPod
    dependency: PodInstancePtr<dyn TestTrait + Send + Sync>,
    // alternatively, you can inject the concrete type
    // dependency: PodInstancePtr<TestDependency>,
}

impl TestPod {
    fn call_foo(&self) {
        self.dependency.foo();
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // pods are created by a PodFactory, which needs to know which pods are available
    let factory = PodFactoryBuilder::new().build();
    factory
        .add::<TestDependency>()
        .expect("error registering TestDependency");
    factory.add::<TestPod>().expect("error registering TestPod");

    let pod = factory.get::<TestPod>().expect("error creating TestPod");

    // prints "Hello world!"
    pod.call_foo();
}
