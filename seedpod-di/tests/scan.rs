#[cfg(feature = "derive")]
mod scan_test {
    use seedpod_di::factory::PodFactoryBuilder;
    use seedpod_di::pod::PodInstancePtr;
    use seedpod_di::{injectable, pod_factory, Pod};

    #[derive(Pod)]
    struct Zebra;

    #[derive(Pod)]
    struct Aardvark {
        _zebra: PodInstancePtr<Zebra>,
    }

    #[injectable]
    struct Config {
        name: &'static str,
    }

    #[pod_factory]
    fn config() -> Config {
        Config { name: "scanned" }
    }

    #[test]
    fn should_register_all_declared_pods_by_name() {
        let factory = PodFactoryBuilder::new().build();
        assert_eq!(factory.scan().unwrap(), 3);

        let names: Vec<_> = factory
            .pods()
            .iter()
            .map(|definition| definition.name.clone())
            .collect();
        assert_eq!(names, ["aardvark", "config", "zebra"]);

        assert_eq!(factory.scan().unwrap(), 0);
        factory.instantiate_eager_singletons().unwrap();
        assert_eq!(factory.get::<Config>().unwrap().name, "scanned");
    }
}
