use fibre_di::{
  injectable, Bound, Container, EntryState, Environment, Inject, Params, Tagged, WireError,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

// --- Test Fixtures ---

trait Store: Send + Sync {
  fn name(&self) -> &'static str;
}

struct MemoryStore;
impl Store for MemoryStore {
  fn name(&self) -> &'static str {
    "memory"
  }
}

trait Handler: Send + Sync {
  fn route(&self) -> &'static str;
}

struct Health;
impl Handler for Health {
  fn route(&self) -> &'static str {
    "/health"
  }
}

struct Metrics;
impl Handler for Metrics {
  fn route(&self) -> &'static str {
    "/metrics"
  }
}

injectable! {
  #[derive(Default)]
  struct Left {
    #[inject]
    right: Inject<Right>,
  }
}

injectable! {
  #[derive(Default)]
  struct Right {
    #[inject]
    left: Inject<Left>,
  }
}

injectable! {
  #[derive(Default)]
  struct Narcissus {
    #[inject]
    me: Inject<Narcissus>,
  }
}

injectable! {
  #[derive(Default)]
  struct Router {
    #[inject = "handlers"]
    handlers: Tagged<dyn Handler>,
    #[inject = "middleware"]
    middleware: Tagged<dyn Handler>,
  }
}

injectable! {
  #[derive(Default)]
  struct Repository {
    #[inject]
    store: Bound<dyn Store>,
  }
}

injectable! {
  #[derive(Default, Clone)]
  struct Config {
    name: String,
  }
}

injectable! {
  #[derive(Default)]
  struct App {
    #[inject]
    config: Inject<Config>,
  }
}

injectable! {
  #[derive(Default)]
  struct Introspector {
    #[inject]
    container: Bound<Container>,
    #[inject]
    environment: Bound<dyn Environment>,
  }
}

struct Report {
  config: Arc<Config>,
}

struct Ping;
struct Pong;

struct Tracker {
  drops: Arc<AtomicUsize>,
}

impl Drop for Tracker {
  fn drop(&mut self) {
    self.drops.fetch_add(1, Ordering::SeqCst);
  }
}

// --- Advanced Tests ---

#[test]
fn test_mutual_dependencies_share_single_instances() {
  // Arrange
  let container = Container::new();
  container.set_default::<Left>();

  // Act
  container.compile().unwrap();
  let left = container.require::<Left>().unwrap();
  let right = container.require::<Right>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(left.right.get().unwrap(), &right));
  assert!(Arc::ptr_eq(right.left.get().unwrap(), &left));
}

#[test]
fn test_self_dependency_receives_itself() {
  let container = Container::new();
  container.set_default::<Narcissus>();
  container.compile().unwrap();

  let narcissus = container.require::<Narcissus>().unwrap();

  assert!(Arc::ptr_eq(narcissus.me.get().unwrap(), &narcissus));
  // Break the reference cycle.
  container.destroy();
}

#[test]
fn test_tagged_services_are_collected_in_registration_order() {
  // Arrange
  let container = Container::new();
  container
    .set_instance(Health)
    .tag("handlers")
    .alias(|h| h as Arc<dyn Handler>);
  container.set_instance(String::from("not tagged"));
  container
    .set_instance(Metrics)
    .tags(["handlers", "admin"])
    .alias(|h| h as Arc<dyn Handler>);
  container.set_default::<Router>();

  // Act
  container.compile().unwrap();
  let router = container.require::<Router>().unwrap();

  // Assert
  let routes: Vec<_> = router.handlers.iter().map(|h| h.route()).collect();
  assert_eq!(routes, vec!["/health", "/metrics"]);
  assert!(router.middleware.is_empty());
  assert_eq!(container.get_by_tag("admin").unwrap().len(), 1);
}

#[test]
fn test_tagged_service_without_the_requested_type_fails() {
  let container = Container::new();
  container.set_instance(Health).tag("handlers");
  container.set_default::<Router>();

  let result = container.compile();

  assert!(matches!(result, Err(WireError::IncompatibleTag { .. })));
  assert!(!container.is_compiled());
}

#[test]
fn test_missing_binding_fails_then_alias_fixes_it() {
  // Arrange
  let container = Container::new();
  container.set_default::<Repository>();

  // Act
  let first = container.compile();

  // Assert
  match first {
    Err(WireError::MissingBinding { field, .. }) => assert_eq!(field, "store"),
    other => panic!("expected a missing binding, got {other:?}"),
  }
  assert!(!container.is_compiled());
  assert_eq!(container.state::<Repository>(), Some(EntryState::Unbuilt));

  container
    .set_instance(MemoryStore)
    .alias(|s| s as Arc<dyn Store>);
  container.compile().unwrap();
  assert_eq!(container.require::<Repository>().unwrap().store.name(), "memory");
}

#[test]
fn test_unregistered_dependency_is_auto_registered() {
  let container = Container::new();
  container.set_default::<App>();
  assert!(!container.has::<Config>());

  container.compile().unwrap();

  assert!(container.has::<Config>());
  assert_eq!(container.state::<Config>(), Some(EntryState::Built));
  let app = container.require::<App>().unwrap();
  assert!(Arc::ptr_eq(app.config.get().unwrap(), &container.require::<Config>().unwrap()));
}

#[test]
fn test_container_and_environment_are_injectable_after_compile() {
  // Arrange
  let params = Params::isolated();
  params.set("REGION", "eu-west");
  let container = Container::with_environment(params);
  container.set_default::<Introspector>();
  assert!(!container.has::<Container>());

  // Act
  container.compile().unwrap();
  let introspector = container.require::<Introspector>().unwrap();

  // Assert
  assert_eq!(introspector.environment.get_param("REGION"), "eu-west");
  assert!(introspector.container.has::<Introspector>());
  assert!(container.has::<dyn Environment>());

  container.destroy();
}

#[test]
fn test_build_wires_without_registering() {
  let container = Container::new();
  container.set_default::<Config>();

  let app = container.build(App::default()).unwrap();

  assert!(app.config.is_wired());
  assert!(Arc::ptr_eq(app.config.get().unwrap(), &container.require::<Config>().unwrap()));
  assert!(!container.has::<App>());
}

#[test]
fn test_factories_may_resolve_other_services() {
  let container = Container::new();
  container.set_factory(|c| {
    Ok(Report {
      config: c.require::<Config>()?,
    })
  });
  container.set_default::<Config>();

  container.compile().unwrap();
  let report = container.require::<Report>().unwrap();

  assert!(Arc::ptr_eq(&report.config, &container.require::<Config>().unwrap()));
}

#[test]
fn test_factory_cycle_is_unresolved() {
  let container = Container::new();
  container.set_factory(|c| {
    c.require::<Pong>()?;
    Ok(Ping)
  });
  container.set_factory(|c| {
    c.require::<Ping>()?;
    Ok(Pong)
  });

  let result = container.compile();

  assert!(matches!(result, Err(WireError::Unresolved { .. })));
  assert_eq!(container.state::<Ping>(), Some(EntryState::Unbuilt));
  assert_eq!(container.state::<Pong>(), Some(EntryState::Unbuilt));
}

#[test]
fn test_failed_compile_tears_down_built_services() {
  // Arrange
  let container = Container::new();
  container.set_default::<Config>();
  container.set_factory(|_| -> fibre_di::Result<Report> {
    Err(WireError::resolver::<Report>("database offline"))
  });

  // Act
  let result = container.compile();

  // Assert
  let err = result.unwrap_err();
  assert!(err.to_string().contains("database offline"));
  assert!(!container.is_compiled());
  assert_eq!(container.state::<Config>(), Some(EntryState::Unbuilt));
  assert_eq!(container.state::<Report>(), Some(EntryState::Unbuilt));
}

#[test]
fn test_destroy_then_compile_builds_fresh_instances() {
  let container = Container::new();
  container.set_default::<App>();
  container.compile().unwrap();
  let first = container.require::<App>().unwrap();

  container.destroy();
  assert!(!container.is_compiled());
  assert!(container.all().is_empty());
  container.compile().unwrap();
  let second = container.require::<App>().unwrap();

  assert!(!Arc::ptr_eq(&first, &second));
  assert!(!Arc::ptr_eq(first.config.get().unwrap(), second.config.get().unwrap()));
}

#[test]
fn test_registered_value_is_rebuilt_after_destroy() {
  let container = Container::new();
  container.set(Config {
    name: "prod".to_string(),
  });
  container.compile().unwrap();
  let first = container.require::<Config>().unwrap();

  container.destroy();
  container.compile().unwrap();
  let second = container.require::<Config>().unwrap();

  assert!(!Arc::ptr_eq(&first, &second));
  assert_eq!(second.name, "prod");
}

#[test]
fn test_dropping_a_compiled_container_releases_its_services() {
  // Arrange
  let drops = Arc::new(AtomicUsize::new(0));
  let container = Container::new();
  container.set_instance(Tracker {
    drops: drops.clone(),
  });
  container.set_default::<App>();
  container.compile().unwrap();
  assert!(container.has::<Container>());

  // Act
  drop(container);

  // Assert
  assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_compile_builds_each_service_once() {
  // Arrange
  static FACTORY_EXECUTION_COUNT: AtomicUsize = AtomicUsize::new(0);
  struct Slow;

  let container = Container::new();
  container.set_factory(|_| {
    FACTORY_EXECUTION_COUNT.fetch_add(1, Ordering::SeqCst);
    // Widen the window for a racing second build.
    thread::sleep(std::time::Duration::from_millis(50));
    Ok(Slow)
  });

  // Act
  thread::scope(|s| {
    for _ in 0..16 {
      s.spawn(|| {
        container.compile().unwrap();
        assert!(container.is_compiled());
        container.require::<Slow>().unwrap();
      });
    }
  });

  // Assert
  assert_eq!(FACTORY_EXECUTION_COUNT.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_lazy_get_returns_one_instance() {
  let container = Container::new();
  container.set_default::<App>();

  let apps: Vec<Arc<App>> = thread::scope(|s| {
    let handles: Vec<_> = (0..8)
      .map(|_| s.spawn(|| container.require::<App>().unwrap()))
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  assert!(apps.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}
