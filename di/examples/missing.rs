use fibre_di::{injectable, Bound, Container, WireError};
use std::sync::Arc;

trait Mailer: Send + Sync {
  fn send(&self, to: &str);
}

struct SmtpMailer;
impl Mailer for SmtpMailer {
  fn send(&self, to: &str) {
    println!("Sending mail to {to}");
  }
}

injectable! {
  #[derive(Default)]
  struct Signup {
    #[inject]
    mailer: Bound<dyn Mailer>,
  }
}

struct UnregisteredService;

fn main() {
  let container = Container::new();

  // --- Lookups never build unknown types ---
  println!("Looking up a service that was never registered...");
  match container.get::<UnregisteredService>() {
    Ok(None) => println!("Correctly received `None` for the missing service."),
    _ => panic!("Should not have found the service!"),
  }

  // --- Trait fields fail closed ---
  container.set_default::<Signup>();
  match container.compile() {
    Err(err @ WireError::MissingBinding { .. }) => println!("Compilation refused: {err}"),
    other => panic!("expected a missing binding, got {other:?}"),
  }
  assert!(!container.is_compiled());

  // Binding an implementation fixes it.
  container
    .set_instance(SmtpMailer)
    .alias(|mailer| mailer as Arc<dyn Mailer>);
  container.compile().expect("mailer is bound now");

  let signup = container.require::<Signup>().expect("signup is built");
  signup.mailer.send("new-user@example.org");
}
