mod application_context_test {
    use futures::future::{BoxFuture, FutureExt};
    use parking_lot::Mutex;
    use seedpod::application_context::{ApplicationContext, ApplicationContextError, ContextState};
    use seedpod::aware::{ApplicationContextAware, ContainerAware, LoggerAware};
    use seedpod::config::{ApplicationConfig, ApplicationConfigProvider};
    use seedpod::service::{AsyncService, Service};
    use seedpod_di::factory::{PodFactory, PodFactoryBuilder};
    use seedpod_di::instance_provider::{ErrorPtr, PodInstance};
    use seedpod_di::pod::{PodInstanceAnyPtr, PodInstancePtr};
    use seedpod_di::post_processor::PostProcessor;
    use seedpod_di::{pod_alias, Pod, PodInstanceProviderError};
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};
    use std::thread;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tracing::Span;

    fn config() -> ApplicationConfig {
        ApplicationConfig::default()
            .with_tracing_logger(false)
            .with_application_name("test")
    }

    fn create_context(setup: impl FnOnce(&PodFactory)) -> Arc<ApplicationContext> {
        let factory = PodFactoryBuilder::new().build();
        setup(&factory);
        ApplicationContext::with_config(factory, config())
    }

    #[derive(Pod, Debug)]
    struct A;

    #[derive(Pod)]
    struct B;

    #[derive(Pod)]
    struct C {
        a: PodInstancePtr<A>,
        b: PodInstancePtr<B>,
    }

    static EAGER_CREATED: AtomicUsize = AtomicUsize::new(0);
    static LAZY_CREATED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Pod)]
    #[pod(constructor = "Eager::new")]
    struct Eager;

    impl Eager {
        fn new() -> Result<Self, ErrorPtr> {
            EAGER_CREATED.fetch_add(1, Ordering::SeqCst);
            Ok(Self)
        }
    }

    #[derive(Pod)]
    #[pod(lazy, constructor = "Lazy::new")]
    struct Lazy;

    impl Lazy {
        fn new() -> Result<Self, ErrorPtr> {
            LAZY_CREATED.fetch_add(1, Ordering::SeqCst);
            Ok(Self)
        }
    }

    #[derive(Pod)]
    struct CycleX {
        _y: PodInstancePtr<CycleY>,
    }

    #[derive(Pod)]
    struct CycleY {
        _x: PodInstancePtr<CycleX>,
    }

    #[derive(Pod)]
    struct Observer {
        #[pod(default)]
        logger: Mutex<Option<Span>>,
        #[pod(default)]
        container: Mutex<Weak<PodFactory>>,
        #[pod(default)]
        context: Mutex<Weak<ApplicationContext>>,
    }

    #[pod_alias]
    impl LoggerAware for Observer {
        fn set_logger(&self, logger: Span) {
            *self.logger.lock() = Some(logger);
        }
    }

    #[pod_alias]
    impl ContainerAware for Observer {
        fn set_container(&self, container: Weak<PodFactory>) {
            *self.container.lock() = container;
        }
    }

    #[pod_alias]
    impl ApplicationContextAware for Observer {
        fn set_application_context(&self, context: Weak<ApplicationContext>) {
            *self.context.lock() = context;
        }
    }

    #[derive(Pod)]
    struct Journal {
        #[pod(default)]
        entries: Mutex<Vec<String>>,
    }

    #[derive(Pod)]
    #[pod(order = 2)]
    struct SecondProcessor {
        journal: PodInstancePtr<Journal>,
    }

    #[pod_alias]
    impl PostProcessor for SecondProcessor {
        fn post_process(&self, pod: &PodInstance) -> Result<PodInstanceAnyPtr, ErrorPtr> {
            self.journal
                .entries
                .lock()
                .push(format!("second:{}", pod.definition.name));
            Ok(pod.instance.clone())
        }
    }

    #[derive(Pod)]
    #[pod(order = 1)]
    struct FirstProcessor {
        journal: PodInstancePtr<Journal>,
    }

    #[pod_alias]
    impl PostProcessor for FirstProcessor {
        fn post_process(&self, pod: &PodInstance) -> Result<PodInstanceAnyPtr, ErrorPtr> {
            self.journal
                .entries
                .lock()
                .push(format!("first:{}", pod.definition.name));
            Ok(pod.instance.clone())
        }
    }

    #[derive(Pod)]
    struct Server {
        #[pod(default)]
        token: Mutex<Option<CancellationToken>>,
        #[pod(default)]
        started: AtomicBool,
        #[pod(default)]
        stopped_after_cancel: AtomicBool,
    }

    #[pod_alias]
    impl Service for Server {
        fn set_stop_token(&self, token: CancellationToken) {
            *self.token.lock() = Some(token);
        }

        fn start(&self) -> Result<(), ErrorPtr> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), ErrorPtr> {
            let cancelled = self
                .token
                .lock()
                .as_ref()
                .map(CancellationToken::is_cancelled)
                .unwrap_or(false);
            self.stopped_after_cancel.store(cancelled, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Pod)]
    struct Worker {
        #[pod(default)]
        token: Mutex<Option<CancellationToken>>,
        #[pod(default)]
        running: AtomicBool,
        #[pod(default)]
        finished: AtomicBool,
        #[pod(default)]
        stopped: AtomicBool,
    }

    #[pod_alias]
    impl AsyncService for Worker {
        fn set_stop_token(&self, token: CancellationToken) {
            *self.token.lock() = Some(token);
        }

        fn start_async(&self) -> BoxFuture<'_, Result<(), ErrorPtr>> {
            async move {
                let token = self.token.lock().clone();
                self.running.store(true, Ordering::SeqCst);

                if let Some(token) = token {
                    token.cancelled().await;
                }

                self.finished.store(true, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }

        fn stop_async(&self) -> BoxFuture<'_, Result<(), ErrorPtr>> {
            async move {
                tokio::task::yield_now().await;
                self.stopped.store(true, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[derive(Pod)]
    #[pod(scope = "PROTOTYPE")]
    struct Proto;

    #[derive(Pod)]
    struct Tally {
        #[pod(default)]
        processed: AtomicUsize,
    }

    #[derive(Pod)]
    struct ProtoCounter {
        tally: PodInstancePtr<Tally>,
    }

    #[pod_alias]
    impl PostProcessor for ProtoCounter {
        fn post_process(&self, pod: &PodInstance) -> Result<PodInstanceAnyPtr, ErrorPtr> {
            if pod.definition.name == "proto" {
                self.tally.processed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(pod.instance.clone())
        }
    }

    #[derive(Pod)]
    struct FlakyServer {
        #[pod(default)]
        attempted: AtomicBool,
    }

    #[pod_alias]
    impl Service for FlakyServer {
        fn start(&self) -> Result<(), ErrorPtr> {
            if self.attempted.swap(true, Ordering::SeqCst) {
                Ok(())
            } else {
                Err(Arc::new(io::Error::from(io::ErrorKind::AddrInUse)) as ErrorPtr)
            }
        }

        fn stop(&self) -> Result<(), ErrorPtr> {
            Ok(())
        }
    }

    static PROTO_SERVICE_STARTS: AtomicUsize = AtomicUsize::new(0);
    static PROTO_SERVICE_STOPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Pod)]
    #[pod(scope = "PROTOTYPE")]
    struct ProtoService;

    #[pod_alias]
    impl Service for ProtoService {
        fn start(&self) -> Result<(), ErrorPtr> {
            PROTO_SERVICE_STARTS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), ErrorPtr> {
            PROTO_SERVICE_STOPS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Pod)]
    struct StateRecorder {
        #[pod(default)]
        context: Mutex<Weak<ApplicationContext>>,
        #[pod(default)]
        states: Mutex<Vec<ContextState>>,
    }

    impl StateRecorder {
        fn record(&self) {
            let context = self.context.lock().upgrade();
            if let Some(context) = context {
                self.states.lock().push(context.state());
            }
        }
    }

    #[pod_alias]
    impl ApplicationContextAware for StateRecorder {
        fn set_application_context(&self, context: Weak<ApplicationContext>) {
            *self.context.lock() = context;
            self.record();
        }
    }

    #[pod_alias]
    impl Service for StateRecorder {
        fn start(&self) -> Result<(), ErrorPtr> {
            self.record();
            Ok(())
        }

        fn stop(&self) -> Result<(), ErrorPtr> {
            self.record();
            Ok(())
        }
    }

    #[derive(Pod)]
    struct StaticConfigProvider {
        #[pod(default = "custom_config")]
        config: ApplicationConfig,
    }

    fn custom_config() -> ApplicationConfig {
        config().with_application_name("custom").with_async_worker_threads(2)
    }

    #[pod_alias]
    impl ApplicationConfigProvider for StaticConfigProvider {
        fn config(&self) -> Result<&ApplicationConfig, ErrorPtr> {
            Ok(&self.config)
        }
    }

    #[test]
    fn should_share_singletons_after_start() {
        let context = create_context(|factory| {
            factory.add::<A>().unwrap();
            factory.add::<B>().unwrap();
            factory.add::<C>().unwrap();
        });
        context.start().unwrap();

        let c = context.get::<C>().unwrap();
        assert!(Arc::ptr_eq(&c.a, &context.get::<A>().unwrap()));
        assert!(Arc::ptr_eq(&c.b, &context.get::<B>().unwrap()));

        context.stop().unwrap();
    }

    #[test]
    fn should_create_eager_singletons_only() {
        let context = create_context(|factory| {
            factory.add::<Eager>().unwrap();
            factory.add::<Lazy>().unwrap();
        });
        context.start().unwrap();

        assert_eq!(EAGER_CREATED.load(Ordering::SeqCst), 1);
        assert_eq!(LAZY_CREATED.load(Ordering::SeqCst), 0);

        context.get::<Eager>().unwrap();
        context.get::<Lazy>().unwrap();
        context.get::<Lazy>().unwrap();

        assert_eq!(EAGER_CREATED.load(Ordering::SeqCst), 1);
        assert_eq!(LAZY_CREATED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_detect_cycles_on_start() {
        let context = create_context(|factory| {
            factory.add::<CycleX>().unwrap();
            factory.add::<CycleY>().unwrap();
        });

        let error = context.start().unwrap_err();
        assert!(matches!(
            error,
            ApplicationContextError::Provider(
                PodInstanceProviderError::CircularDependencyGraphDetected { ref path }
            ) if path == &["cycle_x", "cycle_y", "cycle_x"]
        ));
    }

    #[test]
    fn should_forget_pods_after_stop() {
        let context = create_context(|factory| {
            factory.add::<A>().unwrap();
        });
        context.start().unwrap();
        assert!(context.contains::<A>());
        assert!(context.contains_named::<A>("a"));

        context.stop().unwrap();
        assert!(!context.contains::<A>());
        assert!(matches!(
            context.get::<A>().unwrap_err(),
            PodInstanceProviderError::NoSuchPod { .. }
        ));
    }

    #[test]
    fn should_call_aware_callbacks() {
        let context = create_context(|factory| {
            factory.add::<Observer>().unwrap();
        });
        context.start().unwrap();

        let observer = context.get::<Observer>().unwrap();
        assert!(observer.logger.lock().is_some());

        let container = observer.container.lock().upgrade().unwrap();
        assert!(Arc::ptr_eq(&container, context.factory()));

        let owner = observer.context.lock().upgrade().unwrap();
        assert!(Arc::ptr_eq(&owner, &context));
    }

    #[test]
    fn should_run_post_processor_pods_in_order() {
        let context = create_context(|factory| {
            factory.add::<Journal>().unwrap();
            factory.add::<SecondProcessor>().unwrap();
            factory.add::<FirstProcessor>().unwrap();
            factory.add::<A>().unwrap();
        });
        context.start().unwrap();

        let journal = context.get::<Journal>().unwrap();
        let entries = journal.entries.lock().clone();
        assert_eq!(entries, ["first:a", "second:a"]);
    }

    #[test]
    fn should_find_matching_pods() {
        let context = create_context(|factory| {
            factory.add::<A>().unwrap();
            factory.add::<B>().unwrap();
            factory.add::<Journal>().unwrap();
        });
        context.start().unwrap();

        let found = context
            .find(|definition| definition.name.len() == 1)
            .unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|pod| pod.definition.name.as_str())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn should_start_and_stop_services() {
        let context = create_context(|factory| {
            factory.add::<Server>().unwrap();
        });
        context.start().unwrap();

        let server = context.get::<Server>().unwrap();
        assert!(server.started.load(Ordering::SeqCst));

        context.stop().unwrap();
        assert!(server.stopped_after_cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn should_keep_post_processors_single_after_failed_start() {
        let context = create_context(|factory| {
            factory.add::<Tally>().unwrap();
            factory.add::<ProtoCounter>().unwrap();
            factory.add::<FlakyServer>().unwrap();
            factory.add::<Proto>().unwrap();
        });

        assert!(matches!(
            context.start().unwrap_err(),
            ApplicationContextError::Service { ref service, .. } if service == "flaky_server"
        ));
        assert_eq!(context.state(), ContextState::Created);

        context.start().unwrap();
        context.get::<Proto>().unwrap();

        let tally = context.get::<Tally>().unwrap();
        assert_eq!(tally.processed.load(Ordering::SeqCst), 1);

        context.stop().unwrap();
    }

    #[test]
    fn should_not_stop_services_created_after_start() {
        let context = create_context(|factory| {
            factory.add::<Server>().unwrap();
            factory.add::<ProtoService>().unwrap();
        });
        context.start().unwrap();

        for _ in 0..5 {
            context.get::<ProtoService>().unwrap();
        }

        let server = context.get::<Server>().unwrap();
        context.stop().unwrap();

        assert!(server.stopped_after_cancel.load(Ordering::SeqCst));
        assert_eq!(PROTO_SERVICE_STARTS.load(Ordering::SeqCst), 0);
        assert_eq!(PROTO_SERVICE_STOPS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn should_expose_transient_states_to_pods() {
        let context = create_context(|factory| {
            factory.add::<StateRecorder>().unwrap();
        });
        context.start().unwrap();
        assert_eq!(context.state(), ContextState::Started);

        let recorder = context.get::<StateRecorder>().unwrap();
        context.stop().unwrap();

        assert_eq!(
            *recorder.states.lock(),
            [
                ContextState::Starting,
                ContextState::Starting,
                ContextState::Stopping
            ]
        );
        assert_eq!(context.state(), ContextState::Stopped);
    }

    #[test]
    fn should_run_async_services_until_stopped() {
        let context = create_context(|factory| {
            factory.add::<Worker>().unwrap();
        });
        context.start().unwrap();

        let worker = context.get::<Worker>().unwrap();
        for _ in 0..100 {
            if worker.running.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(worker.running.load(Ordering::SeqCst));
        assert!(!worker.stopped.load(Ordering::SeqCst));

        context.stop().unwrap();
        assert!(worker.stopped.load(Ordering::SeqCst));
        assert!(context.stop_token().is_cancelled());
    }

    #[test]
    fn should_use_registered_config_provider() {
        let factory = PodFactoryBuilder::new().build();
        factory.add::<StaticConfigProvider>().unwrap();

        let context = ApplicationContext::new(factory).unwrap();
        assert_eq!(context.config().application_name, "custom");
        assert_eq!(context.config().async_worker_threads, 2);
    }

    #[test]
    fn should_register_default_config_provider() {
        let context = ApplicationContext::new(PodFactoryBuilder::new().build()).unwrap();
        assert!(context.contains::<dyn ApplicationConfigProvider + Send + Sync>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_separate_contexts_of_scoped_tasks() {
        let context = create_context(|_| {});

        let first = tokio::spawn(context.scope({
            let context = context.clone();
            async move { context.context_id() }
        }));
        let second = tokio::spawn(context.scope({
            let context = context.clone();
            async move { context.context_id() }
        }));

        assert_ne!(first.await.unwrap(), second.await.unwrap());
    }
}
