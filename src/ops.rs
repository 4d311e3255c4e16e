//! Operators and elementary functions on [`Reverse`].
//!
//! Each operation computes its value eagerly and records the local partial
//! derivatives on the active tape. Operations whose operands are all constants
//! produce a constant without touching the tape, so plain arithmetic on
//! constants works even when no tape is active.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::float::Float;
use crate::reverse::Reverse;
use crate::tape::{self, TapeThreadLocal, CONSTANT};

#[inline]
fn unary<F: Float + TapeThreadLocal>(value: F, operand: u32, mult: F) -> Reverse<F> {
    if operand == CONSTANT {
        return Reverse::constant(value);
    }
    let index = tape::with_active_tape(|t| t.push_unary(operand, mult));
    Reverse { value, index }
}

#[inline]
fn binary<F: Float + TapeThreadLocal>(
    value: F,
    lhs: u32,
    lhs_mult: F,
    rhs: u32,
    rhs_mult: F,
) -> Reverse<F> {
    if lhs == CONSTANT && rhs == CONSTANT {
        return Reverse::constant(value);
    }
    let index = tape::with_active_tape(|t| t.push_binary(lhs, lhs_mult, rhs, rhs_mult));
    Reverse { value, index }
}

impl<F: Float + TapeThreadLocal> Add for Reverse<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        binary(self.value + rhs.value, self.index, F::one(), rhs.index, F::one())
    }
}

impl<F: Float + TapeThreadLocal> Sub for Reverse<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        binary(self.value - rhs.value, self.index, F::one(), rhs.index, -F::one())
    }
}

impl<F: Float + TapeThreadLocal> Mul for Reverse<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        binary(self.value * rhs.value, self.index, rhs.value, rhs.index, self.value)
    }
}

impl<F: Float + TapeThreadLocal> Div for Reverse<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = F::one() / rhs.value;
        binary(
            self.value * inv,
            self.index,
            inv,
            rhs.index,
            -self.value * inv * inv,
        )
    }
}

impl<F: Float + TapeThreadLocal> Neg for Reverse<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        unary(-self.value, self.index, -F::one())
    }
}

impl<F: Float + TapeThreadLocal> AddAssign for Reverse<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: Float + TapeThreadLocal> SubAssign for Reverse<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: Float + TapeThreadLocal> MulAssign for Reverse<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: Float + TapeThreadLocal> DivAssign for Reverse<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

// Mixed ops: Reverse<F> with primitive floats.
macro_rules! impl_reverse_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for Reverse<$f> {
            type Output = Reverse<$f>;
            #[inline]
            fn add(self, rhs: $f) -> Reverse<$f> {
                unary(self.value + rhs, self.index, 1.0)
            }
        }

        impl Add<Reverse<$f>> for $f {
            type Output = Reverse<$f>;
            #[inline]
            fn add(self, rhs: Reverse<$f>) -> Reverse<$f> {
                unary(self + rhs.value, rhs.index, 1.0)
            }
        }

        impl Sub<$f> for Reverse<$f> {
            type Output = Reverse<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> Reverse<$f> {
                unary(self.value - rhs, self.index, 1.0)
            }
        }

        impl Sub<Reverse<$f>> for $f {
            type Output = Reverse<$f>;
            #[inline]
            fn sub(self, rhs: Reverse<$f>) -> Reverse<$f> {
                unary(self - rhs.value, rhs.index, -1.0)
            }
        }

        impl Mul<$f> for Reverse<$f> {
            type Output = Reverse<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> Reverse<$f> {
                unary(self.value * rhs, self.index, rhs)
            }
        }

        impl Mul<Reverse<$f>> for $f {
            type Output = Reverse<$f>;
            #[inline]
            fn mul(self, rhs: Reverse<$f>) -> Reverse<$f> {
                unary(self * rhs.value, rhs.index, self)
            }
        }

        impl Div<$f> for Reverse<$f> {
            type Output = Reverse<$f>;
            #[inline]
            fn div(self, rhs: $f) -> Reverse<$f> {
                let inv: $f = 1.0 / rhs;
                unary(self.value * inv, self.index, inv)
            }
        }

        impl Div<Reverse<$f>> for $f {
            type Output = Reverse<$f>;
            #[inline]
            fn div(self, rhs: Reverse<$f>) -> Reverse<$f> {
                let inv: $f = 1.0 / rhs.value;
                unary(self * inv, rhs.index, -self * inv * inv)
            }
        }
    };
}

impl_reverse_scalar_ops!(f32);
impl_reverse_scalar_ops!(f64);

impl<F: Float> PartialEq for Reverse<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Reverse<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

// Elementals used by objective code written against `Scalar`.
impl<F: Float + TapeThreadLocal> Reverse<F> {
    #[inline]
    pub fn exp(self) -> Self {
        let e = self.value.exp();
        unary(e, self.index, e)
    }

    #[inline]
    pub fn ln(self) -> Self {
        unary(self.value.ln(), self.index, self.value.recip())
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        let s = self.value.sqrt();
        let two = F::one() + F::one();
        unary(s, self.index, (two * s).recip())
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        let d = match n {
            0 => F::zero(),
            _ => F::from_i32(n).unwrap_or_else(F::zero) * self.value.powi(n - 1),
        };
        unary(self.value.powi(n), self.index, d)
    }

    #[inline]
    pub fn sin(self) -> Self {
        unary(self.value.sin(), self.index, self.value.cos())
    }

    #[inline]
    pub fn cos(self) -> Self {
        unary(self.value.cos(), self.index, -self.value.sin())
    }
}
