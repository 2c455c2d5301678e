#[macro_use]
mod stack;

#[cfg(test)]
mod tests;

pub use self::iter::{Iter, Type};
mod iter;

use self::validation::validate;
mod validation;

pub use self::signature::Signature;
mod signature;

pub use self::signature_buf::SignatureBuf;
mod signature_buf;

pub use self::signature_error::SignatureError;
use self::signature_error::SignatureErrorKind;
mod signature_error;

/// Maximum recursion depth for a single kind of container (arrays, or
/// structs), per the D-Bus specification.
#[doc(hidden)]
pub const MAX_CONTAINER_DEPTH: usize = 32;

/// Maximum total container depth across both arrays and structs.
#[doc(hidden)]
pub const MAX_DEPTH: usize = MAX_CONTAINER_DEPTH * 2;
