use fibre_di::{injectable, Container, Env, Inject};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

static CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

injectable! {
  #[derive(Default)]
  struct DatabaseConnection {
    #[env = "DATABASE_URL:-postgres://localhost/app"]
    url: Env<String>,
  }
}

injectable! {
  #[derive(Default)]
  struct UserRepository {
    #[inject]
    database: Inject<DatabaseConnection>,
  }
}

injectable! {
  #[derive(Default)]
  struct OrderRepository {
    #[inject]
    database: Inject<DatabaseConnection>,
  }
}

fn main() -> fibre_di::Result<()> {
  // RUST_LOG=fibre_di=trace shows every build step.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let container = Container::new();

  // The connection would be registered on demand; registering it here adds a hook.
  container.set_default::<UserRepository>();
  container.set_default::<OrderRepository>();
  container
    .set_default::<DatabaseConnection>()
    .on_construct(|db| {
      CONNECTIONS.fetch_add(1, Ordering::SeqCst);
      println!("Connecting to {}", db.url.as_str());
    });

  container.compile()?;

  let users = container.require::<UserRepository>()?;
  let orders = container.require::<OrderRepository>()?;

  // Both repositories share the one connection.
  assert!(Arc::ptr_eq(
    users.database.get().unwrap(),
    orders.database.get().unwrap()
  ));
  assert_eq!(CONNECTIONS.load(Ordering::SeqCst), 1);
  println!("One connection shared by {} services.", container.all().len());

  container.destroy();
  Ok(())
}
