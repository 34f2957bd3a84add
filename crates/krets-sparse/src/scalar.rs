//! Scalar arithmetic required by the LU factorization.

use num_complex::Complex;
use num_traits::Zero;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Element type usable by [`crate::SparseMatrix`] and [`crate::LuSolver`].
///
/// `magnitude` drives pivot stability comparisons; `recip` is the value
/// stored on factored diagonals.
pub trait Scalar:
    Copy
    + PartialEq
    + Zero
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + std::fmt::Debug
{
    /// Magnitude used for pivot comparisons.
    fn magnitude(self) -> f64;

    /// Multiplicative inverse.
    fn recip(self) -> Self;
}

impl Scalar for f64 {
    fn magnitude(self) -> f64 {
        self.abs()
    }

    fn recip(self) -> Self {
        1.0 / self
    }
}

impl Scalar for Complex<f64> {
    /// Cheap L1 magnitude; avoids the square root of the true modulus while
    /// staying within a factor sqrt(2) of it, which is all pivot selection
    /// needs.
    fn magnitude(self) -> f64 {
        self.re.abs() + self.im.abs()
    }

    /// Numerically stable reciprocal. Branches on the dominant part so the
    /// intermediate ratio stays below one and cannot overflow.
    fn recip(self) -> Self {
        if (self.re >= self.im && self.re > -self.im)
            || (self.re < self.im && self.re <= -self.im)
        {
            let r = self.im / self.re;
            let re = 1.0 / (self.re + r * self.im);
            Complex::new(re, -r * re)
        } else {
            let r = self.re / self.im;
            let im = -1.0 / (self.im + r * self.re);
            Complex::new(-r * im, im)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_recip() {
        assert_eq!(Scalar::recip(4.0), 0.25);
    }

    #[test]
    fn test_complex_recip_matches_division() {
        let values = [
            Complex::new(3.0, 4.0),
            Complex::new(-2.0, 0.5),
            Complex::new(1e-3, -7.0),
            Complex::new(-1e8, 1e-8),
        ];
        for v in values {
            let inv = Scalar::recip(v);
            let product = v * inv;
            assert!(
                (product.re - 1.0).abs() < 1e-12 && product.im.abs() < 1e-12,
                "recip({v}) * {v} = {product}"
            );
        }
    }

    #[test]
    fn test_complex_recip_large_magnitude() {
        // Naive (re*re + im*im) would overflow here
        let v = Complex::new(1e200, 1e200);
        let inv = Scalar::recip(v);
        assert!(inv.re.is_finite() && inv.im.is_finite());
        let product = v * inv;
        assert!((product.re - 1.0).abs() < 1e-12);
    }
}
