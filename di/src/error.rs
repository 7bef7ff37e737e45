use thiserror::Error;

/// Every way wiring, resolution or compilation of a container can fail.
#[derive(Debug, Error)]
pub enum WireError {
  #[error("field `{owner}.{field}` cannot take this directive: {reason}")]
  BindingShape {
    owner: &'static str,
    field: &'static str,
    reason: String,
  },

  #[error(
    "interface type without bound value: `{owner}.{field}` needs `{type_name}`. Remove the inject directive or bind a value to this type"
  )]
  MissingBinding {
    owner: &'static str,
    field: &'static str,
    type_name: &'static str,
  },

  #[error("entry not found for type `{type_name}`")]
  EntryNotFound { type_name: &'static str },

  #[error("cannot decode parameter `{param}` = {value:?} as `{target}`: {reason}")]
  Parse {
    param: String,
    value: String,
    target: &'static str,
    reason: String,
  },

  #[error("malformed directive `{kind} = {payload:?}` on `{owner}.{field}`: {reason}")]
  Directive {
    owner: &'static str,
    field: &'static str,
    kind: String,
    payload: String,
    reason: &'static str,
  },

  #[error("service `{service}` tagged '{tag}' cannot be injected as `{expected}`")]
  IncompatibleTag {
    tag: String,
    service: &'static str,
    expected: &'static str,
  },

  #[error("field `{owner}.{field}` was already wired")]
  AlreadyWired {
    owner: &'static str,
    field: &'static str,
  },

  #[error("building `{type_name}` produced no instance (does it depend on itself?)")]
  Unresolved { type_name: &'static str },

  #[error("resolver for `{type_name}` failed: {source}")]
  Resolver {
    type_name: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl WireError {
  /// Wraps a factory's own failure so it can be returned from a resolver.
  pub fn resolver<T: ?Sized>(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    WireError::Resolver {
      type_name: std::any::type_name::<T>(),
      source: source.into(),
    }
  }
}

/// A specialized `Result` type for container operations.
pub type Result<T, E = WireError> = std::result::Result<T, E>;
