//! # Fibre DI
//!
//! A thread-safe dependency-resolution engine. Services are registered once,
//! built lazily and at most once, and wired together through typed fields.
//!
//! ## Core Concepts
//!
//! - **Container**: The registry. Every service in it is a singleton until the
//!   container is destroyed.
//! - **Field wiring**: Structs declared with [`injectable!`] describe their
//!   dependencies with `#[inject]` and `#[env]` field directives.
//! - **Type aliases**: A service can be looked up by further types, usually the
//!   trait objects it implements.
//! - **Tags**: Services sharing a tag can be injected as one collection.
//! - **Cycles**: Mutually dependent structs are supported. Each side receives the
//!   other's single instance.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{injectable, Bound, Container, Env, Inject};
//! use std::sync::Arc;
//!
//! pub trait Store: Send + Sync {
//!   fn name(&self) -> &'static str;
//! }
//!
//! #[derive(Default)]
//! pub struct MemoryStore;
//!
//! impl Store for MemoryStore {
//!   fn name(&self) -> &'static str {
//!     "memory"
//!   }
//! }
//!
//! injectable! {
//!   #[derive(Default)]
//!   pub struct Repository {
//!     #[inject]
//!     store: Bound<dyn Store>,
//!   }
//! }
//!
//! injectable! {
//!   #[derive(Default)]
//!   pub struct Api {
//!     #[inject]
//!     repository: Inject<Repository>,
//!     #[env = "API_PORT:-8080"]
//!     port: Env<u16>,
//!   }
//! }
//!
//! fn main() -> fibre_di::Result<()> {
//!   let container = Container::new();
//!   container
//!     .set_instance(MemoryStore)
//!     .alias(|store| store as Arc<dyn Store>);
//!   container.set_default::<Api>();
//!   container.compile()?;
//!
//!   let api = container.require::<Api>()?;
//!   assert_eq!(api.repository.store.name(), "memory");
//!   // Repository was registered on demand and is shared.
//!   assert!(Arc::ptr_eq(api.repository.get().unwrap(), &container.require::<Repository>()?));
//!   Ok(())
//! }
//! ```

mod container;
mod core;
mod env;
mod error;
mod lifecycle;
mod macros;
mod registration;
mod stack;
mod wiring;

pub use container::Container;
pub use crate::core::{EntryState, Instance, TypeKey};
pub use env::{Complex, Complex32, Complex64, EnvValue, Environment, Params};
pub use error::{Result, WireError};
pub use lifecycle::{CompileEvent, CompilePhase, Constructable, Destructible};
pub use registration::Registration;
pub use wiring::{
  Bound, Directive, Env, Field, Inject, Injectable, Slot, Tagged, Wiring, DEFAULT_SEPARATOR, ENV,
  INJECT,
};
