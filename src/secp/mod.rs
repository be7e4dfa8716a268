//! secp256k1 primitives: base-field arithmetic, scalar arithmetic and
//! affine group operations, sized for the batched search loop.

pub mod field;
pub mod point;
pub mod scalar;

pub use field::{batch_inverse, FieldElement};
pub use point::{parse_public_key, public_key, Point, BETA, BETA2, G};
pub use scalar::{Scalar, LAMBDA, LAMBDA2};
