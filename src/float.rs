use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Tape multipliers, adjoints and captured gradient snapshots are stored in
/// this type. Only primitive float types implement it; AD wrapper types do not.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
    /// Logistic sigmoid `1 / (1 + e^-x)`.
    ///
    /// Split on the sign of `x` so that neither tail overflows `exp`.
    #[inline]
    fn logistic(self) -> Self {
        if self >= Self::zero() {
            Self::one() / (Self::one() + (-self).exp())
        } else {
            let e = self.exp();
            e / (Self::one() + e)
        }
    }

    /// Inverse of [`logistic`](Float::logistic) on `(0, 1)`.
    #[inline]
    fn logit(self) -> Self {
        (self / (Self::one() - self)).ln()
    }

    /// Cube root of machine epsilon, the base step of the adaptive
    /// sixth-order finite-difference stencil.
    #[inline]
    fn cbrt_epsilon() -> Self {
        Self::epsilon().cbrt()
    }
}

impl Float for f32 {}
impl Float for f64 {}
