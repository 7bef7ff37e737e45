//! Public macros for declaring injectable structs.

/// Declares a struct and implements [`Injectable`](crate::Injectable) for it.
///
/// Field attributes are the wiring directives:
///
/// - `#[inject]` or `#[inject = ""]` on an [`Inject`](crate::Inject) or
///   [`Bound`](crate::Bound) field resolves one dependency by the field's type.
/// - `#[inject = "label"]` on a [`Tagged`](crate::Tagged) field collects every
///   service tagged `label`.
/// - `#[env = "NAME"]` or `#[env = "NAME:-default"]` on an [`Env`](crate::Env)
///   field decodes the named parameter.
///
/// Fields without a directive are left as constructed. Other field attributes,
/// doc comments included, are dropped from the generated struct. Fields are
/// wired in declaration order.
///
/// A leading `#[lifecycle(constructor, destructor)]` attribute (either or both)
/// forwards [`Injectable::constructed`](crate::Injectable::constructed) and
/// [`Injectable::destroyed`](crate::Injectable::destroyed) to the struct's
/// [`Constructable`](crate::Constructable) and [`Destructible`](crate::Destructible)
/// impls. They then run however the struct was registered, automatically included.
///
/// # Examples
///
/// ```
/// use fibre_di::{injectable, Container, Env, Inject};
///
/// injectable! {
///   #[derive(Default)]
///   pub struct Clock {}
/// }
///
/// injectable! {
///   #[derive(Default)]
///   pub struct Server {
///     #[inject]
///     clock: Inject<Clock>,
///     #[env = "SERVER_PORT:-8080"]
///     port: Env<u16>,
///     /// Not wired.
///     requests: u64,
///   }
/// }
///
/// let container = Container::new();
/// container.set_default::<Server>();
/// container.compile().unwrap();
///
/// let server = container.require::<Server>().unwrap();
/// assert!(server.clock.is_wired());
/// assert_eq!(server.requests, 0);
/// ```
///
/// With lifecycle callbacks:
///
/// ```
/// use fibre_di::{injectable, Constructable, Container};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// injectable! {
///   #[lifecycle(constructor)]
///   #[derive(Default)]
///   pub struct Cache {
///     warm: AtomicBool,
///   }
/// }
///
/// impl Constructable for Cache {
///   fn constructor(&self) {
///     self.warm.store(true, Ordering::SeqCst);
///   }
/// }
///
/// let container = Container::new();
/// container.set_default::<Cache>();
/// container.compile().unwrap();
/// assert!(container.require::<Cache>().unwrap().warm.load(Ordering::SeqCst));
/// ```
#[macro_export]
macro_rules! injectable {
  (
    @hooks [$($hook:ident)*]
    $(#[$meta:meta])*
    $vis:vis struct $name:ident {
      $(
        $(#[$kind:ident $($directive:tt)*])*
        $field_vis:vis $field:ident : $field_ty:ty
      ),* $(,)?
    }
  ) => {
    $(#[$meta])*
    $vis struct $name {
      $($field_vis $field: $field_ty,)*
    }

    impl $crate::Injectable for $name {
      #[allow(unused_variables)]
      fn wire(&self, wiring: &$crate::Wiring<'_>) -> $crate::Result<()> {
        $($(
          $crate::__wire_field!(wiring, $field, &self.$field, $kind $($directive)*);
        )*)*
        Ok(())
      }

      $($crate::__lifecycle_hook!($hook);)*
    }
  };
  (@hooks $($rest:tt)*) => {
    compile_error!("expected a struct with named fields");
  };
  (
    #[lifecycle($($hook:ident),* $(,)?)]
    $($rest:tt)*
  ) => {
    $crate::injectable!(@hooks [$($hook)*] $($rest)*);
  };
  ($($rest:tt)*) => {
    $crate::injectable!(@hooks [] $($rest)*);
  };
}

/// Expands one `#[lifecycle(...)]` capability into its `Injectable` method.
#[doc(hidden)]
#[macro_export]
macro_rules! __lifecycle_hook {
  (constructor) => {
    fn constructed(&self) {
      $crate::Constructable::constructor(self)
    }
  };
  (destructor) => {
    fn destroyed(&self) {
      $crate::Destructible::destructor(self)
    }
  };
  ($other:ident) => {
    compile_error!(concat!(
      "unknown lifecycle capability `", stringify!($other), "`; expected constructor or destructor"
    ));
  };
}

/// Expands one field attribute into a [`Wiring::field`](crate::Wiring::field) call.
#[doc(hidden)]
#[macro_export]
macro_rules! __wire_field {
  ($wiring:ident, $field:ident, $slot:expr, inject) => {
    $wiring.field(stringify!($field), $slot, $crate::INJECT, "")?
  };
  ($wiring:ident, $field:ident, $slot:expr, inject = $payload:literal) => {
    $wiring.field(stringify!($field), $slot, $crate::INJECT, $payload)?
  };
  ($wiring:ident, $field:ident, $slot:expr, env = $payload:literal) => {
    $wiring.field(stringify!($field), $slot, $crate::ENV, $payload)?
  };
  ($wiring:ident, $field:ident, $slot:expr, inject $($rest:tt)*) => {
    compile_error!(concat!(
      "`", stringify!($field), "`: expected #[inject] or #[inject = \"label\"]"
    ))
  };
  ($wiring:ident, $field:ident, $slot:expr, env $($rest:tt)*) => {
    compile_error!(concat!(
      "`", stringify!($field), "`: expected #[env = \"NAME\"] or #[env = \"NAME:-default\"]"
    ))
  };
  ($wiring:ident, $field:ident, $slot:expr, $other:ident $($rest:tt)*) => {};
}
