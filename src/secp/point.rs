//! secp256k1 group operations in affine coordinates.
//!
//! The group engine only ever needs affine add/double plus the two
//! endomorphism X-multiplications; full scalar multiplication is delegated
//! to k256 since it only runs at cursor setup and hit verification.

use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::PrimeField;

use super::field::FieldElement;
use super::scalar::Scalar;

/// Affine point, with a distinguished infinity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: FieldElement,
    pub y: FieldElement,
    pub infinity: bool,
}

/// Generator point G.
pub const G: Point = Point {
    x: FieldElement::new([
        0x59F2815B16F81798,
        0x029BFCDB2DCE28D9,
        0x55A06295CE870B07,
        0x79BE667EF9DCBBAC,
    ]),
    y: FieldElement::new([
        0x9C47D08FFB10D4B8,
        0xFD17B448A6855419,
        0x5DA4FBFC0E1108A8,
        0x483ADA7726A3C465,
    ]),
    infinity: false,
};

/// β: non-trivial cube root of 1 mod p. (β·x, y) = λ·k·G for (x, y) = k·G.
pub const BETA: FieldElement = FieldElement::new([
    0xC1396C28719501EE,
    0x9CF0497512F58995,
    0x6E64479EAC3434E9,
    0x7AE96A2B657C0710,
]);

/// β² = β⁻¹ mod p
pub const BETA2: FieldElement = FieldElement::new([
    0x3EC693D68E6AFA40,
    0x630FB68AED0A766A,
    0x919BB86153CBCB16,
    0x851695D49A83F8EF,
]);

impl Point {
    pub const INFINITY: Self = Self {
        x: FieldElement::ZERO,
        y: FieldElement::ZERO,
        infinity: true,
    };

    #[inline]
    pub const fn new(x: FieldElement, y: FieldElement) -> Self {
        Self { x, y, infinity: false }
    }

    #[inline]
    pub fn is_infinity(&self) -> bool {
        self.infinity
    }

    pub fn add(&self, other: &Self) -> Self {
        if self.infinity {
            return *other;
        }
        if other.infinity {
            return *self;
        }
        if self.x == other.x {
            if self.y == other.y {
                return self.double();
            }
            return Self::INFINITY;
        }

        let s = other.y.sub(&self.y).mul(&other.x.sub(&self.x).inv());
        let x3 = s.sqr().sub(&self.x).sub(&other.x);
        let y3 = s.mul(&self.x.sub(&x3)).sub(&self.y);
        Self::new(x3, y3)
    }

    pub fn double(&self) -> Self {
        if self.infinity || self.y.is_zero() {
            return Self::INFINITY;
        }
        // s = 3x² / 2y (a = 0 on secp256k1)
        let x_sq = self.x.sqr();
        let num = x_sq.add(&x_sq).add(&x_sq);
        let s = num.mul(&self.y.add(&self.y).inv());
        let x3 = s.sqr().sub(&self.x).sub(&self.x);
        let y3 = s.mul(&self.x.sub(&x3)).sub(&self.y);
        Self::new(x3, y3)
    }

    pub fn neg(&self) -> Self {
        if self.infinity {
            Self::INFINITY
        } else {
            Self::new(self.x, self.y.neg())
        }
    }

    /// P + G, the next consecutive key's point.
    #[inline]
    pub fn next(&self) -> Self {
        self.add(&G)
    }

    /// (x, y) -> (β·x, y); equivalent to multiplying the scalar by λ.
    #[inline]
    pub fn endomorphism1(&self) -> Self {
        Self::new(self.x.mul(&BETA), self.y)
    }

    /// (x, y) -> (β²·x, y); equivalent to multiplying the scalar by λ².
    #[inline]
    pub fn endomorphism2(&self) -> Self {
        Self::new(self.x.mul(&BETA2), self.y)
    }

    /// SEC1 compressed serialization (0x02/0x03 || X).
    pub fn to_compressed(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = if self.y.is_odd() { 0x03 } else { 0x02 };
        out[1..33].copy_from_slice(&self.x.to_bytes());
        out
    }

    /// SEC1 uncompressed serialization (0x04 || X || Y).
    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&self.x.to_bytes());
        out[33..65].copy_from_slice(&self.y.to_bytes());
        out
    }
}

/// k·G via k256. Off the hot path (cursor setup, hit verification);
/// correctness trumps speed here.
pub fn public_key(k: &Scalar) -> Point {
    let repr: k256::FieldBytes = k.to_bytes().into();
    let s = match k256::Scalar::from_repr_vartime(repr) {
        Some(s) => s,
        None => return Point::INFINITY, // k >= n cannot happen for reduced scalars
    };
    let affine = (k256::ProjectivePoint::GENERATOR * s).to_affine();
    let enc = affine.to_encoded_point(false);
    match (enc.x(), enc.y()) {
        (Some(x), Some(y)) => {
            let xb: [u8; 32] = x.as_slice().try_into().expect("SEC1 x is 32 bytes");
            let yb: [u8; 32] = y.as_slice().try_into().expect("SEC1 y is 32 bytes");
            Point::new(FieldElement::from_bytes(&xb), FieldElement::from_bytes(&yb))
        }
        _ => Point::INFINITY, // identity encodes without coordinates
    }
}

/// Parse a SEC1 public key (compressed 33 or uncompressed 65 bytes).
pub fn parse_public_key(bytes: &[u8]) -> Option<Point> {
    let enc = k256::EncodedPoint::from_bytes(bytes).ok()?;
    let affine = Option::<k256::AffinePoint>::from(k256::AffinePoint::from_encoded_point(&enc))?;
    let enc = affine.to_encoded_point(false);
    let (x, y) = (enc.x()?, enc.y()?);
    let xb: [u8; 32] = x.as_slice().try_into().ok()?;
    let yb: [u8; 32] = y.as_slice().try_into().ok()?;
    Some(Point::new(
        FieldElement::from_bytes(&xb),
        FieldElement::from_bytes(&yb),
    ))
}
