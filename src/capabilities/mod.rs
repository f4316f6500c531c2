//! # Capability Registry
//!
//! A capability is a named, answerable intent: a keyword predicate, an
//! argument extractor and an async handler. Capabilities are registered
//! once at startup into an ordered [`CapabilityRegistry`]; the order is
//! the precedence the intent matcher uses.
//!
//! ```text
//! builtin_capabilities(store) ─► RegistryBuilder::register ─► CapabilityRegistry
//!                                                                │
//!                                       IntentMatcher::from_registry ◄┘
//! ```

pub mod builtin;
pub mod capability;
pub mod registry;

pub use builtin::{builtin_capabilities, builtin_registry};
pub use capability::{
    ArgSchema, Capability, CapabilityArgs, CapabilityDescriptor, CapabilityHandler, FnHandler,
    HandlerError,
};
pub use registry::{CapabilityRegistry, RegistryBuilder, RegistryError};
