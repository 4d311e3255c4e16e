use std::fmt::{self, Display};

use crate::tape::CONSTANT;
use crate::Float;

/// Reverse-mode AD variable.
///
/// Just a value and a tape index, 12 bytes for `f64`. `Copy` because the
/// tape lives in a thread-local, not inside this struct. A `Reverse` is only
/// meaningful for the forward/backward cycle of the tape that issued its index.
#[derive(Clone, Copy, Debug)]
pub struct Reverse<F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
}

impl<F: Float> Reverse<F> {
    /// Create a constant (not tracked on tape).
    #[inline]
    pub fn constant(value: F) -> Self {
        Reverse {
            value,
            index: CONSTANT,
        }
    }

    /// Create a reverse variable from a tape allocation.
    /// Typically only used internally by the API layer and tests.
    #[inline]
    pub fn from_tape(value: F, index: u32) -> Self {
        Reverse { value, index }
    }

    /// Primal value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Get the tape index (for advanced usage / testing).
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// `true` if this value is not recorded on any tape.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }
}

impl<F: Float> Display for Reverse<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Reverse<F> {
    fn default() -> Self {
        Reverse::constant(F::zero())
    }
}

/// Adjoint vector produced by one reverse sweep.
///
/// Indexed by the `Reverse` values of the cycle that produced it; constants
/// read as zero.
#[derive(Clone, Debug)]
pub struct Adjoints<F: Float> {
    values: Vec<F>,
}

impl<F: Float> Adjoints<F> {
    pub(crate) fn new(values: Vec<F>) -> Self {
        Adjoints { values }
    }

    /// Adjoint of `var`, i.e. the partial derivative of the seeded output
    /// with respect to it.
    pub fn get(&self, var: &Reverse<F>) -> F {
        if var.is_constant() {
            F::zero()
        } else {
            self.values[var.index as usize]
        }
    }

    /// Adjoints of a slice of variables, in order.
    pub fn gather(&self, vars: &[Reverse<F>]) -> Vec<F> {
        vars.iter().map(|v| self.get(v)).collect()
    }

    /// Raw adjoint storage, indexed by tape slot.
    pub fn as_slice(&self) -> &[F] {
        &self.values
    }
}
