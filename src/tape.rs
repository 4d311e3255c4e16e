//! Adept-style two-stack tape for reverse-mode AD, extended with callback nodes.
//!
//! Ordinary operations store precomputed partial derivatives (multipliers) and
//! operand indices during the forward pass; the reverse sweep for them is a
//! single multiply-accumulate loop with zero-adjoint skipping.
//!
//! A callback node instead stores a boxed backward closure together with its
//! operand indices. The closure is the only owner of whatever it captured
//! (input snapshots, gradient snapshots, host handles) and lives exactly as
//! long as the tape, or until [`Tape::clear`]. Used internally by
//! [`crate::Reverse`] and [`crate::node`].

use std::cell::Cell;
use std::fmt;

use crate::error::Result;
use crate::Float;

/// Sentinel index indicating a constant (not recorded on tape).
pub const CONSTANT: u32 = u32::MAX;

/// Sentinel in [`Statement::callback`] for statements without a closure.
const NO_CALLBACK: u32 = u32::MAX;

/// Deferred adjoint contribution of a callback node.
///
/// Called with the incoming adjoint of the node and a zeroed buffer holding one
/// slot per operand. The closure adds its contribution into that buffer; the
/// tape scatters it into the global adjoint vector afterwards.
pub type BackwardFn<F> = Box<dyn Fn(F, &mut [F]) -> Result<()>>;

/// A recorded operation: its result lives at `lhs_index`, and its operands'
/// multipliers/indices span `[prev.end_plus_one .. self.end_plus_one)`.
/// Callback statements have an empty span and point into `callbacks`.
#[derive(Clone, Copy, Debug)]
struct Statement {
    lhs_index: u32,
    end_plus_one: u32,
    callback: u32,
}

struct Callback<F: Float> {
    operands: Vec<u32>,
    backward: BackwardFn<F>,
}

/// Adept-style two-stack tape for reverse-mode AD.
///
/// Records precomputed partial derivatives (multipliers) and operand indices
/// during the forward sweep, plus any number of lazily evaluated callback
/// nodes. The reverse sweep visits statements in reverse order and skips every
/// statement whose adjoint is zero, so a callback whose result does not feed
/// the seeded output is never invoked.
pub struct Tape<F: Float> {
    statements: Vec<Statement>,
    multipliers: Vec<F>,
    indices: Vec<u32>,
    callbacks: Vec<Callback<F>>,
    num_variables: u32,
}

impl<F: Float> Default for Tape<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> fmt::Debug for Tape<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape")
            .field("statements", &(self.statements.len() - 1))
            .field("callbacks", &self.callbacks.len())
            .field("num_variables", &self.num_variables)
            .finish()
    }
}

impl<F: Float> Tape<F> {
    /// Create an empty tape.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a tape with pre-allocated capacity.
    pub fn with_capacity(est_ops: usize) -> Self {
        let mut tape = Tape {
            statements: Vec::with_capacity(est_ops + 1),
            multipliers: Vec::with_capacity(est_ops * 2),
            indices: Vec::with_capacity(est_ops * 2),
            callbacks: Vec::new(),
            num_variables: 0,
        };
        // Sentinel statement at index 0 so that `statements[i-1].end_plus_one`
        // is always valid for i >= 1.
        tape.push_sentinel();
        tape
    }

    fn push_sentinel(&mut self) {
        self.statements.push(Statement {
            lhs_index: 0,
            end_plus_one: 0,
            callback: NO_CALLBACK,
        });
    }

    /// Drop every recorded statement and callback, keeping the allocations.
    ///
    /// This is the cycle boundary: snapshots captured by callback nodes are
    /// released here, and any `Reverse` created before the call is invalid
    /// afterwards.
    pub fn clear(&mut self) {
        self.statements.clear();
        self.multipliers.clear();
        self.indices.clear();
        self.callbacks.clear();
        self.num_variables = 0;
        self.push_sentinel();
    }

    /// Number of tape slots allocated so far (inputs and results).
    pub fn num_variables(&self) -> usize {
        self.num_variables as usize
    }

    /// Number of callback nodes registered since the last [`clear`](Self::clear).
    pub fn num_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Register a new independent variable. Returns `(gradient_index, value)`.
    ///
    /// No statement is pushed for input variables: they are leaf nodes
    /// whose adjoints should not be zeroed during the reverse sweep.
    #[inline]
    pub fn new_variable(&mut self, value: F) -> (u32, F) {
        let idx = self.num_variables;
        self.num_variables += 1;
        (idx, value)
    }

    #[inline]
    fn push_statement(&mut self, callback: u32) -> u32 {
        let result_idx = self.num_variables;
        self.num_variables += 1;
        self.statements.push(Statement {
            lhs_index: result_idx,
            end_plus_one: self.multipliers.len() as u32,
            callback,
        });
        result_idx
    }

    /// Record a unary operation: `result = f(operand)` with precomputed `multiplier = df/d(operand)`.
    #[inline]
    pub fn push_unary(&mut self, operand_idx: u32, multiplier: F) -> u32 {
        if operand_idx != CONSTANT {
            self.multipliers.push(multiplier);
            self.indices.push(operand_idx);
        }
        self.push_statement(NO_CALLBACK)
    }

    /// Record a binary operation with precomputed partial derivatives.
    #[inline]
    pub fn push_binary(&mut self, lhs_idx: u32, lhs_mult: F, rhs_idx: u32, rhs_mult: F) -> u32 {
        if lhs_idx != CONSTANT {
            self.multipliers.push(lhs_mult);
            self.indices.push(lhs_idx);
        }
        if rhs_idx != CONSTANT {
            self.multipliers.push(rhs_mult);
            self.indices.push(rhs_idx);
        }
        self.push_statement(NO_CALLBACK)
    }

    /// Record a callback node over `operands`.
    ///
    /// The node's value is produced by the caller now; `backward` runs during
    /// the reverse sweep, at most once per sweep, and only if the node's
    /// adjoint is non-zero. Constant operands receive a buffer slot like any
    /// other, but their contributions are discarded.
    pub fn push_callback(&mut self, operands: Vec<u32>, backward: BackwardFn<F>) -> u32 {
        let cb_idx = self.callbacks.len() as u32;
        assert!(cb_idx != NO_CALLBACK, "too many callback nodes");
        self.callbacks.push(Callback { operands, backward });
        self.push_statement(cb_idx)
    }

    /// Run the reverse sweep, seeding the adjoint of `seed_index` with 1.
    /// Returns the full adjoint vector.
    ///
    /// Fails with the first error raised by a callback node; the adjoints
    /// accumulated so far are discarded.
    pub fn reverse(&self, seed_index: u32) -> Result<Vec<F>> {
        self.reverse_seeded(&[(seed_index, F::one())])
    }

    /// Run the reverse sweep with custom adjoint seeds.
    pub fn reverse_seeded(&self, seeds: &[(u32, F)]) -> Result<Vec<F>> {
        let mut adjoints = vec![F::zero(); self.num_variables as usize];
        for &(idx, seed) in seeds {
            if idx != CONSTANT {
                adjoints[idx as usize] = adjoints[idx as usize] + seed;
            }
        }

        for i in (1..self.statements.len()).rev() {
            let stmt = self.statements[i];
            let a = adjoints[stmt.lhs_index as usize];
            if a == F::zero() {
                continue;
            }
            adjoints[stmt.lhs_index as usize] = F::zero();

            if stmt.callback != NO_CALLBACK {
                let cb = &self.callbacks[stmt.callback as usize];
                let mut contrib = vec![F::zero(); cb.operands.len()];
                (cb.backward)(a, &mut contrib)?;
                for (&idx, &c) in cb.operands.iter().zip(contrib.iter()) {
                    if idx != CONSTANT {
                        adjoints[idx as usize] = adjoints[idx as usize] + c;
                    }
                }
                continue;
            }

            let start = self.statements[i - 1].end_plus_one as usize;
            let end = stmt.end_plus_one as usize;
            for j in start..end {
                adjoints[self.indices[j] as usize] =
                    adjoints[self.indices[j] as usize] + self.multipliers[j] * a;
            }
        }
        Ok(adjoints)
    }
}

// Thread-local active tape pointer.
thread_local! {
    static TAPE_F32: Cell<*mut Tape<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_F64: Cell<*mut Tape<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Trait to select the correct thread-local for a given float type.
pub trait TapeThreadLocal: Float {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>>;
}

impl TapeThreadLocal for f32 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F32
    }
}

impl TapeThreadLocal for f64 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F64
    }
}

/// Whether a tape is currently active on this thread.
pub fn has_active_tape<F: TapeThreadLocal>() -> bool {
    F::cell().with(|cell| !cell.get().is_null())
}

/// Access the active tape for the current thread. Panics if no tape is active.
///
/// `f` must not re-enter `with_active_tape`; backward closures are run by the
/// sweep, not from inside this accessor.
#[inline]
pub fn with_active_tape<F: TapeThreadLocal, R>(f: impl FnOnce(&mut Tape<F>) -> R) -> R {
    F::cell().with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "No active tape. Use boundgrad::grad() or similar API."
        );
        // SAFETY: The TapeGuard guarantees the pointer is valid for the
        // duration of the closure-based API scope, and only one mutable
        // reference exists at a time (single-threaded access via thread-local).
        let tape = unsafe { &mut *ptr };
        f(tape)
    })
}

/// RAII guard that sets a tape as the thread-local active tape and restores
/// the previous one on drop.
pub struct TapeGuard<F: TapeThreadLocal> {
    prev: *mut Tape<F>,
}

impl<F: TapeThreadLocal> TapeGuard<F> {
    /// Activate `tape` as the thread-local tape. Returns a guard that restores
    /// the previous tape on drop.
    pub fn new(tape: &mut Tape<F>) -> Self {
        let prev = F::cell().with(|cell| {
            let prev = cell.get();
            cell.set(tape as *mut Tape<F>);
            prev
        });
        TapeGuard { prev }
    }
}

impl<F: TapeThreadLocal> Drop for TapeGuard<F> {
    fn drop(&mut self) {
        F::cell().with(|cell| {
            cell.set(self.prev);
        });
    }
}
