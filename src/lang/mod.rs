//! # Front-end data model
//!
//! Interned names, runtime values and lexical scopes. These are what the
//! scope-info encoder and the bytecode builder consume.

pub mod name;
pub mod scope;
pub mod value;
