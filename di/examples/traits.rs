use fibre_di::{injectable, Bound, Container};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define a concrete implementation
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

// 3. Define a service that depends on the abstraction
injectable! {
  #[derive(Default)]
  struct ReportService {
    #[inject]
    logger: Bound<dyn Logger>,
  }
}

impl ReportService {
  fn generate_report(&self) {
    self.logger.log("Starting report generation.");
    self.logger.log("Finished report generation.");
  }
}

fn main() -> fibre_di::Result<()> {
  let container = Container::new();

  // --- Registration ---

  // The container stores Arc<ConsoleLogger> and also serves it as Arc<dyn Logger>.
  container
    .set_instance(ConsoleLogger)
    .alias(|logger| logger as Arc<dyn Logger>);

  // ReportService never creates its logger; the container fills the field.
  container.set_default::<ReportService>();
  container.compile()?;

  // --- Resolution and Usage ---
  println!("Resolving the high-level service...");
  let report_service = container.require::<ReportService>()?;

  println!("Using the service...");
  report_service.generate_report();
  Ok(())
}
