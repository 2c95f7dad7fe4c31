//! # Vesper Core
//!
//! Core types and primitives shared across all Vesper engine components:
//!
//! - **Value System**: NaN-boxed tagged representation of JavaScript values
//! - **Property Keys**: tagged keys (name / index / symbol) with cached hashes
//! - **Interning**: string and symbol interning for O(1) identity equality
//! - **Error Handling**: the unified engine result and error definitions

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod intern;
pub mod key;
pub mod value;

pub use error::{EngineError, EngineResult};
pub use intern::{InternedStr, StringInterner, Symbol, SymbolRegistry};
pub use key::PropertyKey;
pub use value::Value;

/// Vesper engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
