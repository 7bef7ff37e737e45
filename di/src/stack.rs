//! The build stack: descriptors currently under construction in the active
//! resolution call chain.

use crate::core::{Entry, TypeKey};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::sync::Arc;

/// The build session. One thread at a time walks the graph; resolvers re-enter
/// it on the same thread.
pub(crate) type Session = ReentrantMutex<RefCell<BuildStack>>;

#[derive(Default)]
pub(crate) struct BuildStack {
  entries: Vec<Arc<Entry>>,
}

impl BuildStack {
  pub(crate) fn push(&mut self, entry: Arc<Entry>) {
    self.entries.push(entry);
  }

  pub(crate) fn pop(&mut self) -> Option<Arc<Entry>> {
    self.entries.pop()
  }

  pub(crate) fn contains(&self, entry: &Arc<Entry>) -> bool {
    self.entries.iter().any(|item| Arc::ptr_eq(item, entry))
  }

  /// The innermost in-flight descriptor bound to `key`.
  pub(crate) fn find(&self, key: TypeKey) -> Option<Arc<Entry>> {
    self
      .entries
      .iter()
      .rev()
      .find(|item| item.satisfies(key))
      .cloned()
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  pub(crate) fn clear(&mut self) {
    self.entries.clear();
  }
}

/// An RAII guard that keeps a descriptor on the build stack.
///
/// When created, it pushes the descriptor. When dropped, including on an early
/// error return, it pops it again.
pub(crate) struct StackGuard<'a> {
  session: ReentrantMutexGuard<'a, RefCell<BuildStack>>,
}

impl<'a> StackGuard<'a> {
  pub(crate) fn new(session: ReentrantMutexGuard<'a, RefCell<BuildStack>>, entry: Arc<Entry>) -> Self {
    session.borrow_mut().push(entry);
    Self { session }
  }
}

impl Drop for StackGuard<'_> {
  fn drop(&mut self) {
    self.session.borrow_mut().pop();
  }
}
