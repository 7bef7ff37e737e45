//! Field population for struct-shaped services.
//!
//! A struct describes its own dependencies through [`Injectable::wire`], usually
//! generated by [`injectable!`](crate::injectable). Each wired field is a slot that
//! is filled exactly once through `&self`, which lets a shell instance be shared
//! with cyclic peers before it is fully populated.

use crate::container::Container;
use crate::env::{EnvValue, Environment};
use crate::error::{Result, WireError};

use once_cell::sync::OnceCell;
use std::any::{type_name, Any};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::trace;

/// Directive kind for dependency fields.
pub const INJECT: &str = "inject";
/// Directive kind for environment fields.
pub const ENV: &str = "env";
/// Separates a parameter name from its literal default in `env` directives.
pub const DEFAULT_SEPARATOR: &str = ":-";

/// A parsed per-field directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
  /// `inject = ""`: one dependency, resolved by the field's type.
  Inject,
  /// `inject = "<label>"`: every service tagged `<label>`.
  Collect(&'a str),
  /// `env = "<NAME>"` or `env = "<NAME>:-<default>"`.
  Env {
    name: &'a str,
    default: Option<&'a str>,
  },
}

impl<'a> Directive<'a> {
  /// Parses one field attribute. Kinds other than `inject` and `env` are not
  /// directives and yield `None`.
  pub fn parse(kind: &str, payload: &'a str) -> std::result::Result<Option<Self>, &'static str> {
    match kind {
      INJECT if payload.is_empty() => Ok(Some(Directive::Inject)),
      INJECT => Ok(Some(Directive::Collect(payload))),
      ENV => {
        let mut parts = payload.split(DEFAULT_SEPARATOR);
        let name = parts.next().unwrap_or_default();
        let default = parts.next();
        if parts.next().is_some() {
          return Err("more than one default separator");
        }
        if name.is_empty() {
          return Err("missing parameter name");
        }
        Ok(Some(Directive::Env { name, default }))
      }
      _ => Ok(None),
    }
  }
}

impl fmt::Display for Directive<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Directive::Inject => write!(f, "{INJECT}"),
      Directive::Collect(label) => write!(f, "{INJECT} = {label:?}"),
      Directive::Env { name, default: None } => write!(f, "{ENV} = {name:?}"),
      Directive::Env {
        name,
        default: Some(default),
      } => write!(f, "{ENV} = \"{name}{DEFAULT_SEPARATOR}{default}\""),
    }
  }
}

/// A struct whose fields the container can populate.
///
/// The lifecycle methods are called by the container on every registration path,
/// auto-registration included. [`injectable!`](crate::injectable) forwards them to
/// [`Constructable`](crate::Constructable) and [`Destructible`](crate::Destructible)
/// when the struct carries `#[lifecycle(constructor, destructor)]`.
pub trait Injectable: Send + Sync + 'static {
  /// Binds every directive-carrying field, in declaration order.
  fn wire(&self, wiring: &Wiring<'_>) -> Result<()>;

  /// Runs once after the instance is built and wired.
  fn constructed(&self) {}

  /// Runs once when the container destroys the instance.
  fn destroyed(&self) {}
}

/// The wiring pass for one instance.
pub struct Wiring<'a> {
  container: &'a Container,
  owner: &'static str,
}

impl<'a> Wiring<'a> {
  pub(crate) fn new(container: &'a Container, owner: &'static str) -> Self {
    Self { container, owner }
  }

  pub fn container(&self) -> &'a Container {
    self.container
  }

  /// Name of the type being wired.
  pub fn owner(&self) -> &'static str {
    self.owner
  }

  /// Interprets one `kind = payload` attribute for the field `name`.
  pub fn field<S: Slot + ?Sized>(
    &self,
    name: &'static str,
    slot: &S,
    kind: &str,
    payload: &str,
  ) -> Result<()> {
    let directive = match Directive::parse(kind, payload) {
      Ok(Some(directive)) => directive,
      Ok(None) => return Ok(()),
      Err(reason) => {
        return Err(WireError::Directive {
          owner: self.owner,
          field: name,
          kind: kind.to_string(),
          payload: payload.to_string(),
          reason,
        })
      }
    };

    trace!(owner = self.owner, field = name, %directive, "binding field");
    slot.bind(
      &directive,
      &Field {
        container: self.container,
        owner: self.owner,
        name,
      },
    )
  }
}

/// The field a slot is being bound for.
pub struct Field<'a> {
  container: &'a Container,
  owner: &'static str,
  name: &'static str,
}

impl<'a> Field<'a> {
  pub fn container(&self) -> &'a Container {
    self.container
  }

  pub fn owner(&self) -> &'static str {
    self.owner
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn shape_error(&self, reason: impl Into<String>) -> WireError {
    WireError::BindingShape {
      owner: self.owner,
      field: self.name,
      reason: reason.into(),
    }
  }

  fn already_wired(&self) -> WireError {
    WireError::AlreadyWired {
      owner: self.owner,
      field: self.name,
    }
  }
}

/// A field type that knows how to take its value from a directive.
pub trait Slot {
  fn bind(&self, directive: &Directive<'_>, field: &Field<'_>) -> Result<()>;
}

fn unwired<T: ?Sized>() -> ! {
  panic!(
    "`{}` dependency used before wiring completed",
    type_name::<T>()
  )
}

/// A singleton dependency on a concrete struct.
///
/// If nothing is registered for `T`, the container registers it on demand and
/// wires a default instance.
pub struct Inject<T: ?Sized> {
  cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Inject<T> {
  pub fn get(&self) -> Option<&Arc<T>> {
    self.cell.get()
  }

  pub fn is_wired(&self) -> bool {
    self.cell.get().is_some()
  }
}

impl<T: ?Sized> Default for Inject<T> {
  fn default() -> Self {
    Self {
      cell: OnceCell::new(),
    }
  }
}

impl<T: ?Sized> Clone for Inject<T> {
  fn clone(&self) -> Self {
    Self {
      cell: self.cell.clone(),
    }
  }
}

impl<T: ?Sized> From<Arc<T>> for Inject<T> {
  fn from(value: Arc<T>) -> Self {
    Self {
      cell: OnceCell::with_value(value),
    }
  }
}

impl<T: ?Sized> Deref for Inject<T> {
  type Target = T;

  fn deref(&self) -> &T {
    match self.cell.get() {
      Some(value) => &**value,
      None => unwired::<T>(),
    }
  }
}

impl<T: ?Sized> fmt::Debug for Inject<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Inject")
      .field("type", &type_name::<T>())
      .field("wired", &self.is_wired())
      .finish()
  }
}

impl<T: Injectable + Default> Slot for Inject<T> {
  fn bind(&self, directive: &Directive<'_>, field: &Field<'_>) -> Result<()> {
    if *directive != Directive::Inject {
      return Err(field.shape_error(format!(
        "`{directive}` needs a collection field, found a singleton"
      )));
    }

    let container = field.container();
    if !container.has::<T>() {
      container.autowire::<T>();
    }
    let value = container.get::<T>()?.ok_or(WireError::Unresolved {
      type_name: type_name::<T>(),
    })?;
    self.cell.set(value).map_err(|_| field.already_wired())
  }
}

/// A singleton dependency that must already be bound, typically a trait object
/// (`Bound<dyn Store>`) or a value produced by a factory.
pub struct Bound<T: ?Sized> {
  cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Bound<T> {
  pub fn get(&self) -> Option<&Arc<T>> {
    self.cell.get()
  }

  pub fn is_wired(&self) -> bool {
    self.cell.get().is_some()
  }
}

impl<T: ?Sized> Default for Bound<T> {
  fn default() -> Self {
    Self {
      cell: OnceCell::new(),
    }
  }
}

impl<T: ?Sized> Clone for Bound<T> {
  fn clone(&self) -> Self {
    Self {
      cell: self.cell.clone(),
    }
  }
}

impl<T: ?Sized> From<Arc<T>> for Bound<T> {
  fn from(value: Arc<T>) -> Self {
    Self {
      cell: OnceCell::with_value(value),
    }
  }
}

impl<T: ?Sized> Deref for Bound<T> {
  type Target = T;

  fn deref(&self) -> &T {
    match self.cell.get() {
      Some(value) => &**value,
      None => unwired::<T>(),
    }
  }
}

impl<T: ?Sized> fmt::Debug for Bound<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Bound")
      .field("type", &type_name::<T>())
      .field("wired", &self.is_wired())
      .finish()
  }
}

impl<T: ?Sized + Any + Send + Sync> Slot for Bound<T> {
  fn bind(&self, directive: &Directive<'_>, field: &Field<'_>) -> Result<()> {
    if *directive != Directive::Inject {
      return Err(field.shape_error(format!(
        "`{directive}` needs a collection field, found a singleton"
      )));
    }

    let container = field.container();
    if !container.has::<T>() {
      return Err(WireError::MissingBinding {
        owner: field.owner(),
        field: field.name(),
        type_name: type_name::<T>(),
      });
    }
    let value = container.get::<T>()?.ok_or(WireError::Unresolved {
      type_name: type_name::<T>(),
    })?;
    self.cell.set(value).map_err(|_| field.already_wired())
  }
}

/// Every service carrying a tag, in registration order.
pub struct Tagged<T: ?Sized> {
  cell: OnceCell<Vec<Arc<T>>>,
}

impl<T: ?Sized> Tagged<T> {
  pub fn is_wired(&self) -> bool {
    self.cell.get().is_some()
  }
}

impl<T: ?Sized> Default for Tagged<T> {
  fn default() -> Self {
    Self {
      cell: OnceCell::new(),
    }
  }
}

impl<T: ?Sized> Clone for Tagged<T> {
  fn clone(&self) -> Self {
    Self {
      cell: self.cell.clone(),
    }
  }
}

impl<T: ?Sized> Deref for Tagged<T> {
  type Target = [Arc<T>];

  fn deref(&self) -> &[Arc<T>] {
    self.cell.get().map(Vec::as_slice).unwrap_or_default()
  }
}

impl<T: ?Sized> fmt::Debug for Tagged<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Tagged")
      .field("type", &type_name::<T>())
      .field("len", &self.len())
      .finish()
  }
}

impl<T: ?Sized + Any + Send + Sync> Slot for Tagged<T> {
  fn bind(&self, directive: &Directive<'_>, field: &Field<'_>) -> Result<()> {
    let Directive::Collect(label) = *directive else {
      return Err(field.shape_error(format!(
        "`{directive}` on a collection field needs a tag label"
      )));
    };

    let items = field.container().get_tagged::<T>(label)?;
    self.cell.set(items).map_err(|_| field.already_wired())
  }
}

/// A scalar taken from an environment parameter.
pub struct Env<T> {
  cell: OnceCell<T>,
}

impl<T> Env<T> {
  pub fn get(&self) -> Option<&T> {
    self.cell.get()
  }
}

impl<T> Default for Env<T> {
  fn default() -> Self {
    Self {
      cell: OnceCell::new(),
    }
  }
}

impl<T: Clone> Clone for Env<T> {
  fn clone(&self) -> Self {
    Self {
      cell: self.cell.clone(),
    }
  }
}

impl<T> Deref for Env<T> {
  type Target = T;

  fn deref(&self) -> &T {
    match self.cell.get() {
      Some(value) => value,
      None => unwired::<T>(),
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for Env<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.cell.get() {
      Some(value) => f.debug_tuple("Env").field(value).finish(),
      None => f.write_str("Env(<unwired>)"),
    }
  }
}

impl<T: EnvValue> Slot for Env<T> {
  fn bind(&self, directive: &Directive<'_>, field: &Field<'_>) -> Result<()> {
    let Directive::Env { name, default } = *directive else {
      return Err(field.shape_error(format!(
        "`{directive}` on an environment field"
      )));
    };

    let mut raw = field.container().get_param(name);
    if raw.is_empty() {
      raw = default.unwrap_or_default().to_string();
    }

    let value = if raw.is_empty() {
      T::default()
    } else {
      T::decode(&raw).map_err(|reason| WireError::Parse {
        param: name.to_string(),
        value: raw.clone(),
        target: type_name::<T>(),
        reason,
      })?
    };
    self.cell.set(value).map_err(|_| field.already_wired())
  }
}
