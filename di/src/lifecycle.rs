//! Lifecycle capabilities and compile events.

use crate::container::Container;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A service that initializes itself once its dependencies are wired.
///
/// Opt in at registration with [`Registration::constructor`](crate::Registration::constructor).
pub trait Constructable {
  fn constructor(&self);
}

/// A service that releases resources when the container is destroyed.
///
/// Opt in at registration with [`Registration::destructor`](crate::Registration::destructor).
pub trait Destructible {
  fn destructor(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePhase {
  Before,
  After,
}

/// Passed to compile handlers. Any handler may stop the remaining ones.
pub struct CompileEvent<'a> {
  container: &'a Container,
  phase: CompilePhase,
  stopped: AtomicBool,
}

impl<'a> CompileEvent<'a> {
  fn new(container: &'a Container, phase: CompilePhase) -> Self {
    Self {
      container,
      phase,
      stopped: AtomicBool::new(false),
    }
  }

  pub fn container(&self) -> &'a Container {
    self.container
  }

  pub fn phase(&self) -> CompilePhase {
    self.phase
  }

  pub fn stop_propagation(&self) {
    self.stopped.store(true, Ordering::Release);
  }

  pub fn can_propagate(&self) -> bool {
    !self.stopped.load(Ordering::Acquire)
  }
}

pub(crate) type CompileHandler = Arc<dyn Fn(&CompileEvent<'_>) + Send + Sync>;

/// Compile handlers per phase, ordered by ascending importance.
#[derive(Default)]
pub(crate) struct CompileHooks {
  before: Mutex<BTreeMap<i32, Vec<CompileHandler>>>,
  after: Mutex<BTreeMap<i32, Vec<CompileHandler>>>,
}

impl CompileHooks {
  pub(crate) fn add(&self, phase: CompilePhase, importance: i32, handler: CompileHandler) {
    self
      .handlers(phase)
      .lock()
      .entry(importance)
      .or_default()
      .push(handler);
  }

  /// Runs the handlers of one phase. Returns how many ran.
  pub(crate) fn dispatch(&self, phase: CompilePhase, container: &Container) -> usize {
    // Handlers may register more handlers, so run them outside the lock.
    let handlers: Vec<CompileHandler> = self
      .handlers(phase)
      .lock()
      .values()
      .flatten()
      .cloned()
      .collect();

    let event = CompileEvent::new(container, phase);
    let mut ran = 0;
    for handler in handlers {
      if !event.can_propagate() {
        break;
      }
      handler(&event);
      ran += 1;
    }
    ran
  }

  fn handlers(&self, phase: CompilePhase) -> &Mutex<BTreeMap<i32, Vec<CompileHandler>>> {
    match phase {
      CompilePhase::Before => &self.before,
      CompilePhase::After => &self.after,
    }
  }
}
