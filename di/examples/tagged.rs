use fibre_di::{injectable, Container, Tagged};
use std::sync::Arc;

trait Command: Send + Sync {
  fn name(&self) -> &'static str;
  fn run(&self);
}

struct Migrate;
impl Command for Migrate {
  fn name(&self) -> &'static str {
    "migrate"
  }

  fn run(&self) {
    println!("running migrations");
  }
}

struct Serve;
impl Command for Serve {
  fn name(&self) -> &'static str {
    "serve"
  }

  fn run(&self) {
    println!("serving requests");
  }
}

injectable! {
  #[derive(Default)]
  struct Cli {
    #[inject = "commands"]
    commands: Tagged<dyn Command>,
  }
}

fn main() -> fibre_di::Result<()> {
  let container = Container::new();
  container
    .set_instance(Migrate)
    .tag("commands")
    .alias(|c| c as Arc<dyn Command>);
  container
    .set_instance(Serve)
    .tag("commands")
    .alias(|c| c as Arc<dyn Command>);
  container.set_default::<Cli>();
  container.compile()?;

  let cli = container.require::<Cli>()?;
  for command in cli.commands.iter() {
    println!("> {}", command.name());
    command.run();
  }
  Ok(())
}
