use fibre_di::{injectable, CompilePhase, Constructable, Container, Destructible, Inject};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

injectable! {
  #[lifecycle(constructor, destructor)]
  #[derive(Default)]
  struct Pool {
    opened: AtomicUsize,
    closed: AtomicUsize,
  }
}

impl Constructable for Pool {
  fn constructor(&self) {
    self.opened.fetch_add(1, Ordering::SeqCst);
  }
}

impl Destructible for Pool {
  fn destructor(&self) {
    self.closed.fetch_add(1, Ordering::SeqCst);
  }
}

injectable! {
  #[derive(Default)]
  struct Worker {
    #[inject]
    pool: Inject<Pool>,
  }
}

/// Not injectable; its capabilities are opted into at registration.
#[derive(Default)]
struct Ledger {
  opened: AtomicUsize,
  closed: Arc<AtomicUsize>,
}

impl Constructable for Ledger {
  fn constructor(&self) {
    self.opened.fetch_add(1, Ordering::SeqCst);
  }
}

impl Destructible for Ledger {
  fn destructor(&self) {
    self.closed.fetch_add(1, Ordering::SeqCst);
  }
}

// --- Lifecycle Tests ---

#[test]
fn test_constructor_and_destructor_run_once_per_build() {
  // Arrange
  let container = Container::new();
  container.set_default::<Pool>();
  container.set_default::<Worker>();

  // Act
  container.compile().unwrap();
  container.compile().unwrap();
  let worker = container.require::<Worker>().unwrap();
  let pool = container.require::<Pool>().unwrap();

  // Assert
  assert!(Arc::ptr_eq(worker.pool.get().unwrap(), &pool));
  assert_eq!(pool.opened.load(Ordering::SeqCst), 1);
  assert_eq!(pool.closed.load(Ordering::SeqCst), 0);

  container.destroy();
  container.destroy();
  assert_eq!(pool.closed.load(Ordering::SeqCst), 1);

  container.compile().unwrap();
  let rebuilt = container.require::<Pool>().unwrap();
  assert!(!Arc::ptr_eq(&rebuilt, &pool));
  assert_eq!(rebuilt.opened.load(Ordering::SeqCst), 1);
  assert_eq!(pool.opened.load(Ordering::SeqCst), 1);
}

#[test]
fn test_auto_registered_dependency_runs_its_lifecycle() {
  // Arrange
  let container = Container::new();
  container.set_default::<Worker>();

  // Act
  container.compile().unwrap();
  let pool = container.require::<Worker>().unwrap().pool.get().unwrap().clone();

  // Assert
  assert_eq!(pool.opened.load(Ordering::SeqCst), 1);
  container.destroy();
  assert_eq!(pool.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_registration_opts_factories_into_lifecycle() {
  let closed = Arc::new(AtomicUsize::new(0));
  let container = Container::new();
  let counter = closed.clone();
  container
    .set_factory(move |_| {
      Ok(Ledger {
        closed: counter.clone(),
        ..Default::default()
      })
    })
    .constructor()
    .destructor();

  container.compile().unwrap();
  let ledger = container.require::<Ledger>().unwrap();
  assert_eq!(ledger.opened.load(Ordering::SeqCst), 1);

  container.destroy();
  assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_one_off_build_runs_its_constructor() {
  let container = Container::new();

  let pool = container.build(Pool::default()).unwrap();

  assert_eq!(pool.opened.load(Ordering::SeqCst), 1);
  assert!(!container.has::<Pool>());
}

#[test]
fn test_construct_hook_sees_wired_fields() {
  let seen = Arc::new(Mutex::new(None));
  let container = Container::new();
  let slot = seen.clone();
  container
    .set_default::<Worker>()
    .on_construct(move |worker| *slot.lock() = Some(worker.pool.is_wired()));

  container.compile().unwrap();

  assert_eq!(*seen.lock(), Some(true));
}

#[test]
fn test_compile_events_run_by_importance() {
  // Arrange
  let log = Arc::new(Mutex::new(Vec::new()));
  let container = Container::new();

  for (importance, name) in [(10, "late"), (-5, "early"), (0, "middle")] {
    let log = log.clone();
    container.on_pre_compile(importance, move |event| {
      assert_eq!(event.phase(), CompilePhase::Before);
      log.lock().push(name);
    });
  }
  let after = log.clone();
  container.on_post_compile(0, move |event| {
    assert!(event.container().is_compiled());
    after.lock().push("after");
  });

  // Act
  container.compile().unwrap();
  container.compile().unwrap();

  // Assert
  assert_eq!(
    *log.lock(),
    vec!["early", "middle", "late", "after", "early", "middle", "late", "after"]
  );
}

#[test]
fn test_stopped_event_skips_remaining_handlers() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let container = Container::new();

  let first = log.clone();
  container.on_pre_compile(1, move |event| {
    first.lock().push("stopper");
    event.stop_propagation();
  });
  let second = log.clone();
  container.on_pre_compile(2, move |_| second.lock().push("skipped"));

  container.compile().unwrap();

  assert_eq!(*log.lock(), vec!["stopper"]);
}

#[test]
fn test_pre_compile_handler_can_register_services() {
  let container = Container::new();
  container.on_pre_compile(0, |event| {
    event.container().set_default::<Pool>();
  });

  container.compile().unwrap();

  assert!(container.has::<Pool>());
  assert!(container.require::<Pool>().is_ok());
}

#[test]
fn test_post_compile_handlers_skip_failed_compilation() {
  injectable! {
    #[derive(Default)]
    struct Broken {
      #[inject = "workers"]
      pool: Inject<Pool>,
    }
  }

  let log = Arc::new(Mutex::new(Vec::new()));
  let container = Container::new();
  container.set_default::<Broken>();
  let before = log.clone();
  container.on_pre_compile(0, move |_| before.lock().push("before"));
  let after = log.clone();
  container.on_post_compile(0, move |_| after.lock().push("after"));

  assert!(container.compile().is_err());
  assert!(container.compile().is_err());

  assert_eq!(*log.lock(), vec!["before", "before"]);
  assert!(!container.is_compiled());
}
