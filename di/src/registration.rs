//! Options applied to a service right after it is registered.

use crate::core::{Entry, EntryState, Hook, Instance, TypeBinding, TypeKey};
use crate::lifecycle::{Constructable, Destructible};

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// Handle returned by the container's `set*` methods.
///
/// The service is registered as soon as the handle exists; the methods only add
/// tags, type aliases and lifecycle hooks to it.
pub struct Registration<T> {
  entry: Arc<Entry>,
  _service: PhantomData<fn() -> T>,
}

fn erase<T: Any + Send + Sync>(hook: impl Fn(&T) + Send + Sync + 'static) -> Hook {
  Arc::new(move |instance: &Instance| {
    if let Some(service) = (**instance).downcast_ref::<T>() {
      hook(service);
    }
  })
}

impl<T: Any + Send + Sync> Registration<T> {
  pub(crate) fn new(entry: Arc<Entry>) -> Self {
    Self {
      entry,
      _service: PhantomData,
    }
  }

  /// The primary key of the registered service.
  pub fn key(&self) -> TypeKey {
    TypeKey::of::<T>()
  }

  /// Adds the service to the collection labelled `tag`.
  pub fn tag(self, tag: impl Into<String>) -> Self {
    if self.entry.state() == EntryState::Built {
      warn!(
        service = type_name::<T>(),
        "tagging an already built service; collections wired earlier miss it"
      );
    }
    self.entry.add_tag(tag.into());
    self
  }

  /// Adds the service to every collection in `tags`.
  pub fn tags<I>(self, tags: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<String>,
  {
    tags.into_iter().fold(self, |registration, tag| registration.tag(tag))
  }

  /// Also binds the service under `I`, usually a trait object:
  ///
  /// ```ignore
  /// container.set_default::<MemoryStore>().alias(|s| s as Arc<dyn Store>);
  /// ```
  pub fn alias<I>(self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
  where
    I: ?Sized + Any + Send + Sync,
  {
    let primary = TypeBinding::primary::<T>();
    self
      .entry
      .add_binding(TypeBinding::alias::<T, I, _>(&primary, cast));
    self
  }

  /// Calls [`Constructable::constructor`] once the service is built and wired.
  ///
  /// For factories and pre-built values. Structs declared with
  /// [`injectable!`](crate::injectable) name their capabilities in a
  /// `#[lifecycle(...)]` attribute instead and get them on every registration path.
  pub fn constructor(self) -> Self
  where
    T: Constructable,
  {
    self.on_construct(T::constructor)
  }

  /// Calls [`Destructible::destructor`] when the container is destroyed.
  pub fn destructor(self) -> Self
  where
    T: Destructible,
  {
    self.on_destroy(T::destructor)
  }

  /// Adds a hook run after each build, following any lifecycle callbacks.
  pub fn on_construct(self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
    self.entry.add_on_construct(erase(hook));
    self
  }

  /// Adds a hook run when a built service is destroyed.
  pub fn on_destroy(self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
    self.entry.add_on_destroy(erase(hook));
    self
  }
}

impl<T> fmt::Debug for Registration<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Registration").field(&self.entry).finish()
  }
}
