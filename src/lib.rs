//! Scope descriptors and register bytecode for a JavaScript-style function
//! compiler.
//!
//! - [`scope_info`] packs a function's variable layout into a flat descriptor.
//! - [`bytecode`] emits and finishes accumulator-machine bytecode.
//! - [`runtime`] runs a subset of that bytecode.

pub mod bytecode;
pub mod config;
pub mod lang;
pub mod runtime;
pub mod scope_info;
pub mod snapshot;
