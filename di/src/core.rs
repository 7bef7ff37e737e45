//! Core, non-public data structures for the container: type identity and the
//! service descriptor with its build protocol.

use crate::container::Container;
use crate::error::Result;

use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::trace;

/// A built service, erased to its concrete type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A stable, comparable identity for a type, usable as a registry key.
///
/// Two keys are equal iff they were derived from the same type. Services are
/// always handed out as `Arc<T>`, and keys are always taken from `T` itself.
#[derive(Clone, Copy)]
pub struct TypeKey {
  type_id: TypeId,
  type_name: &'static str,
}

impl TypeKey {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: type_name::<T>(),
    }
  }

  pub fn type_id(&self) -> TypeId {
    self.type_id
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }
}

impl PartialEq for TypeKey {
  fn eq(&self, other: &Self) -> bool {
    self.type_id == other.type_id
  }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.type_id.hash(state);
  }
}

impl fmt::Debug for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeKey({})", self.type_name)
  }
}

// Turns the erased primary instance into a boxed `Arc<I>` for one key.
type Caster = Arc<dyn Fn(&Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

pub(crate) type Resolver = Box<dyn Fn(&Container, &Entry) -> Result<Instance> + Send + Sync>;
pub(crate) type Hook = Arc<dyn Fn(&Instance) + Send + Sync>;

/// One type identity a descriptor satisfies, with the view that produces it.
#[derive(Clone)]
pub(crate) struct TypeBinding {
  key: TypeKey,
  cast: Caster,
}

impl TypeBinding {
  pub(crate) fn primary<T: Any + Send + Sync>() -> Self {
    Self {
      key: TypeKey::of::<T>(),
      cast: Arc::new(|instance: &Instance| {
        instance
          .clone()
          .downcast::<T>()
          .ok()
          .map(|typed| Box::new(typed) as Box<dyn Any + Send + Sync>)
      }),
    }
  }

  /// A view of `base` (which yields `Arc<T>`) as `Arc<I>`.
  pub(crate) fn alias<T, I, F>(base: &TypeBinding, cast: F) -> Self
  where
    T: ?Sized + Any + Send + Sync,
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
  {
    let base = base.cast.clone();
    Self {
      key: TypeKey::of::<I>(),
      cast: Arc::new(move |instance: &Instance| {
        let typed = base(instance)?.downcast::<Arc<T>>().ok()?;
        Some(Box::new(cast(*typed)) as Box<dyn Any + Send + Sync>)
      }),
    }
  }

  pub(crate) fn key(&self) -> TypeKey {
    self.key
  }
}

const UNBUILT: u8 = 0;
const BUILDING: u8 = 1;
const BUILT: u8 = 2;

/// Build state of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
  Unbuilt,
  Building,
  Built,
}

/// A registered unit of construction for one or more type identities.
pub(crate) struct Entry {
  types: RwLock<Vec<TypeBinding>>,
  tags: RwLock<Vec<String>>,
  resolver: Resolver,
  resolved: RwLock<Option<Instance>>,
  state: AtomicU8,
  on_construct: RwLock<Vec<Hook>>,
  on_destroy: RwLock<Vec<Hook>>,
}

impl Entry {
  pub(crate) fn new(primary: TypeBinding, resolver: Resolver) -> Self {
    Self {
      types: RwLock::new(vec![primary]),
      tags: RwLock::new(Vec::new()),
      resolver,
      resolved: RwLock::new(None),
      state: AtomicU8::new(UNBUILT),
      on_construct: RwLock::new(Vec::new()),
      on_destroy: RwLock::new(Vec::new()),
    }
  }

  pub(crate) fn type_name(&self) -> &'static str {
    self.types.read()[0].key.type_name()
  }

  pub(crate) fn satisfies(&self, key: TypeKey) -> bool {
    self.types.read().iter().any(|binding| binding.key == key)
  }

  pub(crate) fn binding(&self, key: TypeKey) -> Option<TypeBinding> {
    self
      .types
      .read()
      .iter()
      .find(|binding| binding.key == key)
      .cloned()
  }

  pub(crate) fn add_binding(&self, binding: TypeBinding) {
    let mut types = self.types.write();
    if !types.iter().any(|existing| existing.key == binding.key) {
      types.push(binding);
    }
  }

  pub(crate) fn has_tag(&self, tag: &str) -> bool {
    self.tags.read().iter().any(|t| t == tag)
  }

  pub(crate) fn add_tag(&self, tag: String) {
    self.tags.write().push(tag);
  }

  /// Hooks run in the order they were added.
  pub(crate) fn add_on_construct(&self, hook: Hook) {
    self.on_construct.write().push(hook);
  }

  pub(crate) fn add_on_destroy(&self, hook: Hook) {
    self.on_destroy.write().push(hook);
  }

  pub(crate) fn state(&self) -> EntryState {
    match self.state.load(Ordering::Acquire) {
      UNBUILT => EntryState::Unbuilt,
      BUILDING => EntryState::Building,
      _ => EntryState::Built,
    }
  }

  pub(crate) fn resolved(&self) -> Option<Instance> {
    self.resolved.read().clone()
  }

  /// Makes a not-yet-populated shell visible to cyclic peers.
  pub(crate) fn publish(&self, shell: Instance) {
    *self.resolved.write() = Some(shell);
  }

  /// Views a built instance as `Arc<T>`, if this descriptor is bound to `T`.
  pub(crate) fn cast<T: ?Sized + Any + Send + Sync>(&self, instance: &Instance) -> Option<Arc<T>> {
    let binding = self.binding(TypeKey::of::<T>())?;
    let boxed = (binding.cast)(instance)?;
    boxed.downcast::<Arc<T>>().ok().map(|typed| *typed)
  }

  /// Returns the singleton, constructing it at most once.
  ///
  /// A descriptor already on the build stack short-circuits to whatever it has
  /// published so far, which is how dependency cycles terminate.
  pub(crate) fn build(self: &Arc<Self>, container: &Container) -> Result<Option<Instance>> {
    if container.is_building(self) {
      trace!(service = self.type_name(), "cycle short-circuit");
      return Ok(self.resolved());
    }

    let _guard = container.enter(self.clone());

    if self
      .state
      .compare_exchange(UNBUILT, BUILDING, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
    {
      match (self.resolver)(container, self) {
        Ok(instance) => {
          *self.resolved.write() = Some(instance.clone());
          self.state.store(BUILT, Ordering::Release);
          trace!(service = self.type_name(), "built");

          let hooks = self.on_construct.read().clone();
          for hook in &hooks {
            hook(&instance);
          }
        }
        Err(err) => {
          self.reset();
          return Err(err);
        }
      }
    }

    Ok(self.resolved())
  }

  /// Runs the destroy hook of a built descriptor and returns it to `Unbuilt`.
  /// Returns whether anything was torn down.
  pub(crate) fn destroy(&self) -> bool {
    if self.state() != EntryState::Built {
      self.reset();
      return false;
    }

    let instance = self.resolved.write().take();
    if let Some(instance) = instance.as_ref() {
      let hooks = self.on_destroy.read().clone();
      for hook in &hooks {
        hook(instance);
      }
    }
    self.state.store(UNBUILT, Ordering::Release);
    true
  }

  fn reset(&self) {
    *self.resolved.write() = None;
    self.state.store(UNBUILT, Ordering::Release);
  }
}

impl fmt::Debug for Entry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let types: Vec<TypeKey> = self.types.read().iter().map(TypeBinding::key).collect();
    f.debug_struct("Entry")
      .field("types", &types)
      .field("tags", &*self.tags.read())
      .field("state", &self.state())
      .finish()
  }
}
