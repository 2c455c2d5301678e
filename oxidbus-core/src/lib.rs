//! Core types for the D-Bus wire protocol.
//!
//! This crate is split out so that the signature parser and the raw type
//! codes it drives can be shared without pulling in the async runtime or
//! the rest of the codec.

#![allow(clippy::module_inception)]

#[macro_use]
mod macros;

#[doc(hidden)]
pub mod proto;

#[doc(hidden)]
pub mod signature;
