//! The main `Container` struct and its associated methods.

use crate::core::{Entry, EntryState, Instance, Resolver, TypeBinding, TypeKey};
use crate::env::{Environment, Params};
use crate::error::{Result, WireError};
use crate::lifecycle::{CompileEvent, CompileHooks, CompilePhase};
use crate::registration::Registration;
use crate::stack::{BuildStack, Session, StackGuard};
use crate::wiring::{Injectable, Wiring};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// The service registry.
///
/// Services are registered with the `set*` methods, then built by [`compile`](Self::compile)
/// or on first lookup. Every service is a singleton for the life of a compilation;
/// [`destroy`](Self::destroy) tears the graph down so it can be compiled again.
///
/// `Container` is a cheap handle: clones share the same registry.
#[derive(Clone)]
pub struct Container {
  inner: Arc<Inner>,
}

struct Inner {
  entries: RwLock<Vec<Arc<Entry>>>,
  session: Session,
  compiled: AtomicBool,
  // Set by the first compile; `Container` and `dyn Environment` resolve to this container.
  self_bound: AtomicBool,
  environment: Arc<dyn Environment>,
  hooks: CompileHooks,
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

/// Every build, rebuilds after `destroy` included, wires a fresh value from `seed`.
fn wired<T, F>(seed: F) -> Resolver
where
  T: Injectable,
  F: Fn() -> T + Send + Sync + 'static,
{
  Box::new(move |container: &Container, entry: &Entry| wire_shell(container, entry, seed()))
}

fn with_lifecycle<T: Injectable>(entry: &Entry) {
  entry.add_on_construct(Arc::new(|instance: &Instance| {
    if let Some(service) = (**instance).downcast_ref::<T>() {
      service.constructed();
    }
  }));
  entry.add_on_destroy(Arc::new(|instance: &Instance| {
    if let Some(service) = (**instance).downcast_ref::<T>() {
      service.destroyed();
    }
  }));
}

fn wire_shell<T: Injectable>(container: &Container, entry: &Entry, service: T) -> Result<Instance> {
  let shell = Arc::new(service);
  entry.publish(shell.clone() as Instance);
  shell.wire(&Wiring::new(container, type_name::<T>()))?;
  Ok(shell as Instance)
}

impl Container {
  /// Creates an empty container reading parameters from the process environment.
  pub fn new() -> Self {
    Self::with_environment(Params::new())
  }

  /// Creates an empty container with its own parameter source.
  pub fn with_environment(environment: impl Environment + 'static) -> Self {
    Self {
      inner: Arc::new(Inner {
        entries: RwLock::new(Vec::new()),
        session: ReentrantMutex::new(RefCell::new(BuildStack::default())),
        compiled: AtomicBool::new(false),
        self_bound: AtomicBool::new(false),
        environment: Arc::new(environment),
        hooks: CompileHooks::default(),
      }),
    }
  }

  // --- PRIVATE HELPERS ---

  fn register<T: Any + Send + Sync>(&self, resolver: Resolver) -> Registration<T> {
    let entry = Arc::new(Entry::new(TypeBinding::primary::<T>(), resolver));
    self.inner.entries.write().push(entry.clone());
    Registration::new(entry)
  }

  fn register_wired<T, F>(&self, seed: F) -> Registration<T>
  where
    T: Injectable,
    F: Fn() -> T + Send + Sync + 'static,
  {
    let entry = Arc::new(Entry::new(TypeBinding::primary::<T>(), wired(seed)));
    with_lifecycle::<T>(&entry);
    self.inner.entries.write().push(entry.clone());
    Registration::new(entry)
  }

  /// First registered descriptor bound to `key`.
  fn find_entry(&self, key: TypeKey) -> Option<Arc<Entry>> {
    self
      .inner
      .entries
      .read()
      .iter()
      .find(|entry| entry.satisfies(key))
      .cloned()
  }

  /// In-flight descriptors win over registered ones, so reentrant lookups during
  /// a cycle land on the peer being built.
  fn lookup(&self, key: TypeKey) -> Option<Arc<Entry>> {
    let in_flight = self.inner.session.lock().borrow().find(key);
    in_flight.or_else(|| self.find_entry(key))
  }

  fn tagged_entries(&self, tag: &str) -> Vec<Arc<Entry>> {
    self
      .inner
      .entries
      .read()
      .iter()
      .filter(|entry| entry.has_tag(tag))
      .cloned()
      .collect()
  }

  pub(crate) fn is_building(&self, entry: &Arc<Entry>) -> bool {
    self.inner.session.lock().borrow().contains(entry)
  }

  pub(crate) fn enter(&self, entry: Arc<Entry>) -> StackGuard<'_> {
    StackGuard::new(self.inner.session.lock(), entry)
  }

  /// Registers an unregistered struct met during wiring.
  pub(crate) fn autowire<T: Injectable + Default>(&self) {
    debug!(service = type_name::<T>(), "auto-registering");
    self.register_wired(T::default);
  }

  fn is_self_key(&self, key: TypeKey) -> bool {
    self.inner.self_bound.load(Ordering::Acquire)
      && (key == TypeKey::of::<Container>() || key == TypeKey::of::<dyn Environment>())
  }

  /// A fresh handle on this container, viewed as `T`. Never cached, so the
  /// registry does not keep itself alive.
  fn self_reference<T: ?Sized + Any>(&self) -> Option<Arc<T>> {
    let key = TypeKey::of::<T>();
    if !self.is_self_key(key) {
      return None;
    }

    let handle: Box<dyn Any> = if key == TypeKey::of::<Container>() {
      Box::new(Arc::new(self.clone()))
    } else {
      Box::new(Arc::new(self.clone()) as Arc<dyn Environment>)
    };
    handle.downcast::<Arc<T>>().ok().map(|typed| *typed)
  }

  /// Builds every descriptor. Walks by index so descriptors auto-registered
  /// along the way are built too.
  fn build_all(&self) -> Result<usize> {
    let mut index = 0;
    loop {
      let Some(entry) = self.inner.entries.read().get(index).cloned() else {
        break;
      };
      entry.build(self)?;
      index += 1;
    }
    Ok(index)
  }

  fn teardown(&self) -> usize {
    let entries: Vec<Arc<Entry>> = self.inner.entries.read().clone();
    let mut destroyed = 0;
    for entry in &entries {
      if entry.destroy() {
        destroyed += 1;
      }
    }
    destroyed
  }

  // --- PUBLIC API ---

  // --- Registration ---

  /// Registers a struct whose directive fields are populated when it is built.
  ///
  /// `service` is kept as a template: each build, the first one and every rebuild
  /// after [`destroy`](Self::destroy), wires a clone of it.
  pub fn set<T: Injectable + Clone>(&self, service: T) -> Registration<T> {
    self.register_wired(move || service.clone())
  }

  /// Registers a struct built from `T::default()`.
  pub fn set_default<T: Injectable + Default>(&self) -> Registration<T> {
    self.register_wired(T::default)
  }

  /// Registers a factory. It may look up other services through the container.
  pub fn set_factory<T, F>(&self, factory: F) -> Registration<T>
  where
    T: Any + Send + Sync,
    F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
  {
    self.register::<T>(Box::new(move |container: &Container, _: &Entry| {
      factory(container).map(|service| Arc::new(service) as Instance)
    }))
  }

  /// Registers a pre-built value. The same instance is served across rebuilds.
  pub fn set_instance<T: Any + Send + Sync>(&self, instance: T) -> Registration<T> {
    let instance: Instance = Arc::new(instance);
    self.register::<T>(Box::new(move |_: &Container, _: &Entry| Ok(instance.clone())))
  }

  /// Exposes the service registered for `T` under `I` as well. Lookups by
  /// either type return the same instance.
  pub fn append_types<T, I>(&self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Result<()>
  where
    T: ?Sized + Any + Send + Sync,
    I: ?Sized + Any + Send + Sync,
  {
    let key = TypeKey::of::<T>();
    let not_found = || WireError::EntryNotFound {
      type_name: key.type_name(),
    };
    let entry = self.find_entry(key).ok_or_else(not_found)?;
    let base = entry.binding(key).ok_or_else(not_found)?;
    entry.add_binding(TypeBinding::alias::<T, I, _>(&base, cast));
    debug!(service = entry.type_name(), alias = type_name::<I>(), "appended type");
    Ok(())
  }

  // --- Resolution ---

  /// Returns the singleton for `T`, building it if needed, or `None` when nothing
  /// is bound to `T`.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
    let _session = self.inner.session.lock();
    let Some(entry) = self.lookup(TypeKey::of::<T>()) else {
      return Ok(self.self_reference::<T>());
    };
    Ok(entry.build(self)?.and_then(|instance| entry.cast::<T>(&instance)))
  }

  /// Like [`get`](Self::get), but a missing binding is an error.
  pub fn require<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    match self.get::<T>()? {
      Some(service) => Ok(service),
      None if self.has::<T>() => Err(WireError::Unresolved {
        type_name: type_name::<T>(),
      }),
      None => Err(WireError::EntryNotFound {
        type_name: type_name::<T>(),
      }),
    }
  }

  /// Builds and returns every service tagged `tag`, in registration order.
  pub fn get_by_tag(&self, tag: &str) -> Result<Vec<Instance>> {
    let _session = self.inner.session.lock();
    let mut instances = Vec::new();
    for entry in self.tagged_entries(tag) {
      if let Some(instance) = entry.build(self)? {
        instances.push(instance);
      }
    }
    Ok(instances)
  }

  /// Builds every service tagged `tag` and views each as `T`.
  pub fn get_tagged<T: ?Sized + Any + Send + Sync>(&self, tag: &str) -> Result<Vec<Arc<T>>> {
    let _session = self.inner.session.lock();
    let mut items = Vec::new();
    for entry in self.tagged_entries(tag) {
      let Some(instance) = entry.build(self)? else {
        continue;
      };
      let item = entry
        .cast::<T>(&instance)
        .ok_or_else(|| WireError::IncompatibleTag {
          tag: tag.to_string(),
          service: entry.type_name(),
          expected: type_name::<T>(),
        })?;
      items.push(item);
    }
    Ok(items)
  }

  /// Whether anything is bound to `T`. Never builds.
  pub fn has<T: ?Sized + Any>(&self) -> bool {
    self.has_key(TypeKey::of::<T>())
  }

  /// Whether anything is bound to `key`. Never builds.
  pub fn has_key(&self, key: TypeKey) -> bool {
    self.find_entry(key).is_some()
      || self.is_self_key(key)
      || self.inner.session.lock().borrow().find(key).is_some()
  }

  /// Every built service, in registration order.
  pub fn all(&self) -> Vec<Instance> {
    self
      .inner
      .entries
      .read()
      .iter()
      .filter(|entry| entry.state() == EntryState::Built)
      .filter_map(|entry| entry.resolved())
      .collect()
  }

  /// Build state of the service registered for `T`.
  pub fn state<T: ?Sized + Any>(&self) -> Option<EntryState> {
    self.find_entry(TypeKey::of::<T>()).map(|entry| entry.state())
  }

  /// Number of registered services, auto-registered ones included.
  pub fn len(&self) -> usize {
    self.inner.entries.read().len()
  }

  /// Whether no service is registered.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  // --- Lifecycle ---

  /// Builds every registered service once.
  ///
  /// Repeated or concurrent calls return after the first compilation finishes.
  /// Compile handlers run on every call, repeats included. On failure every
  /// service built during the attempt is torn down again and the container can
  /// be compiled anew.
  pub fn compile(&self) -> Result<()> {
    let _session = self.inner.session.lock();
    let ran = self.inner.hooks.dispatch(CompilePhase::Before, self);
    trace!(ran, "pre-compile handlers done");

    if self.inner.compiled.swap(true, Ordering::AcqRel) {
      trace!("container already compiled");
      self.inner.hooks.dispatch(CompilePhase::After, self);
      return Ok(());
    }

    debug!(entries = self.len(), "compiling container");
    self.inner.self_bound.store(true, Ordering::Release);

    let result = self.build_all();
    self.inner.session.lock().borrow_mut().clear();

    match result {
      Ok(built) => {
        debug!(built, "container compiled");
        let ran = self.inner.hooks.dispatch(CompilePhase::After, self);
        trace!(ran, "post-compile handlers done");
        Ok(())
      }
      Err(err) => {
        let destroyed = self.teardown();
        self.inner.compiled.store(false, Ordering::Release);
        debug!(error = %err, destroyed, "container compilation failed");
        Err(err)
      }
    }
  }

  /// Whether the last compilation succeeded and the container was not destroyed since.
  pub fn is_compiled(&self) -> bool {
    self.inner.compiled.load(Ordering::Acquire)
  }

  /// Constructs a one-off instance of `T`, wiring its fields from the container
  /// without registering it. [`Injectable::constructed`] runs once it is wired.
  pub fn build<T: Injectable>(&self, service: T) -> Result<Arc<T>> {
    let _session = self.inner.session.lock();
    let seed = Mutex::new(Some(service));
    let entry = Arc::new(Entry::new(
      TypeBinding::primary::<T>(),
      Box::new(move |container: &Container, entry: &Entry| {
        let service = seed.lock().take().ok_or(WireError::Unresolved {
          type_name: type_name::<T>(),
        })?;
        wire_shell(container, entry, service)
      }),
    ));
    with_lifecycle::<T>(&entry);

    entry
      .build(self)?
      .and_then(|instance| entry.cast::<T>(&instance))
      .ok_or(WireError::Unresolved {
        type_name: type_name::<T>(),
      })
  }

  /// Runs destroy hooks of every built service and clears all cached instances.
  pub fn destroy(&self) {
    let _session = self.inner.session.lock();
    let destroyed = self.teardown();
    self.inner.compiled.store(false, Ordering::Release);
    debug!(destroyed, "container destroyed");
  }

  /// Adds a handler run at the start of every [`compile`](Self::compile) call.
  /// Lower importance runs first.
  pub fn on_pre_compile(
    &self,
    importance: i32,
    handler: impl Fn(&CompileEvent<'_>) + Send + Sync + 'static,
  ) {
    self
      .inner
      .hooks
      .add(CompilePhase::Before, importance, Arc::new(handler));
  }

  /// Adds a handler run at the end of every successful [`compile`](Self::compile)
  /// call, repeats included. Lower importance runs first.
  pub fn on_post_compile(
    &self,
    importance: i32,
    handler: impl Fn(&CompileEvent<'_>) + Send + Sync + 'static,
  ) {
    self
      .inner
      .hooks
      .add(CompilePhase::After, importance, Arc::new(handler));
  }
}

impl Environment for Container {
  fn get_param(&self, name: &str) -> String {
    self.inner.environment.get_param(name)
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("entries", &self.len())
      .field("compiled", &self.is_compiled())
      .finish()
  }
}
