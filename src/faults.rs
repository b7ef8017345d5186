//! IEEE floating point fault classification.
//!
//! Rust exposes no portable access to the hardware exception flags, so every
//! primitive operation in the evaluator classifies its own result and records
//! the outcome in the [`FaultFlags`] of the active evaluation context. The rules
//! follow IEEE 754:
//!
//! - NaN produced from non-NaN operands is an invalid operation
//! - an infinity produced from finite operands at a pole (`x/0`, `log(0)`, ...)
//!   is a division by zero
//! - any other infinity produced from finite operands is an overflow
//! - a non-zero subnormal result from normal operands, or a zero produced by a
//!   magnitude-shrinking operation on non-zero operands, is an underflow
//! - an ordered comparison (`<`, `<=`, `>`, `>=`) with a NaN operand is invalid
//!
//! Flags only accumulate; `SafeMaths` is the sole consumer and clears them around
//! the subtree it guards.

use bitflags::bitflags;

use crate::errors::FaultKind;

bitflags! {
    /// Accumulated floating point fault state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaultFlags: u8 {
        const DIVIDE_BY_ZERO = 0b0001;
        const INVALID = 0b0010;
        const OVERFLOW = 0b0100;
        const UNDERFLOW = 0b1000;
    }
}

/// How an operation may legitimately shrink a result to zero or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// The operation never underflows to zero and has no poles
    Plain,
    /// The operation hits a pole (infinite result from finite input) for this evaluation
    Pole,
    /// The operation can flush a non-zero result to zero (products, quotients, exp)
    Shrinking,
    /// Subnormal results are exact and never signal underflow (sums, differences, min/max)
    Exact,
    /// Ordered comparison: a NaN operand is an invalid operation
    Ordered,
}

impl FaultFlags {
    /// Classifies `result` computed from `operands`.
    pub(crate) fn probe(operands: &[f64], result: f64, probe: Probe) -> FaultFlags {
        let any_nan = operands.iter().any(|v| v.is_nan());
        let all_finite = operands.iter().all(|v| v.is_finite());

        if probe == Probe::Ordered {
            return if any_nan {
                FaultFlags::INVALID
            } else {
                FaultFlags::empty()
            };
        }

        if result.is_nan() {
            return if any_nan {
                FaultFlags::empty()
            } else {
                FaultFlags::INVALID
            };
        }
        if result.is_infinite() {
            if !all_finite {
                return FaultFlags::empty();
            }
            return match probe {
                Probe::Pole => FaultFlags::DIVIDE_BY_ZERO,
                _ => FaultFlags::OVERFLOW,
            };
        }
        if probe == Probe::Exact {
            return FaultFlags::empty();
        }
        if result.is_subnormal() && !operands.iter().any(|v| v.is_subnormal()) {
            return FaultFlags::UNDERFLOW;
        }
        if result == 0.0
            && probe == Probe::Shrinking
            && all_finite
            && operands.iter().all(|v| *v != 0.0)
        {
            return FaultFlags::UNDERFLOW;
        }
        FaultFlags::empty()
    }

    /// The most significant fault present, in IEEE reporting priority.
    pub fn first_fault(&self) -> Option<FaultKind> {
        if self.contains(FaultFlags::DIVIDE_BY_ZERO) {
            Some(FaultKind::DivideByZero)
        } else if self.contains(FaultFlags::INVALID) {
            Some(FaultKind::Invalid)
        } else if self.contains(FaultFlags::OVERFLOW) {
            Some(FaultKind::Overflow)
        } else if self.contains(FaultFlags::UNDERFLOW) {
            Some(FaultKind::Underflow)
        } else {
            None
        }
    }
}

impl From<FaultKind> for FaultFlags {
    fn from(kind: FaultKind) -> Self {
        match kind {
            FaultKind::DivideByZero => FaultFlags::DIVIDE_BY_ZERO,
            FaultKind::Invalid => FaultFlags::INVALID,
            FaultKind::Overflow => FaultFlags::OVERFLOW,
            FaultKind::Underflow => FaultFlags::UNDERFLOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_divide_by_zero() {
        let flags = FaultFlags::probe(&[1.0, 0.0], 1.0 / 0.0, Probe::Pole);
        assert_eq!(flags, FaultFlags::DIVIDE_BY_ZERO);
        assert_eq!(flags.first_fault(), Some(FaultKind::DivideByZero));
    }

    #[test]
    fn test_probe_invalid() {
        let flags = FaultFlags::probe(&[-1.0], (-1.0f64).sqrt(), Probe::Plain);
        assert_eq!(flags, FaultFlags::INVALID);
        // NaN propagated from a NaN operand is not a new fault
        let flags = FaultFlags::probe(&[f64::NAN, 1.0], f64::NAN + 1.0, Probe::Plain);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_probe_ordered_comparison() {
        let flags = FaultFlags::probe(&[f64::NAN, 1.0], 0.0, Probe::Ordered);
        assert_eq!(flags, FaultFlags::INVALID);
        let flags = FaultFlags::probe(&[f64::INFINITY, 1.0], 0.0, Probe::Ordered);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_probe_overflow_and_underflow() {
        let flags = FaultFlags::probe(&[1e308, 10.0], 1e308 * 10.0, Probe::Shrinking);
        assert_eq!(flags, FaultFlags::OVERFLOW);

        let flags = FaultFlags::probe(&[1e-308, 1e-10], 1e-308 * 1e-10, Probe::Shrinking);
        assert_eq!(flags, FaultFlags::UNDERFLOW);

        let flags = FaultFlags::probe(&[1e-300, 1e-300], 1e-300 * 1e-300, Probe::Shrinking);
        assert_eq!(flags, FaultFlags::UNDERFLOW);

        // exact zeros are not underflow
        let flags = FaultFlags::probe(&[0.0, 5.0], 0.0, Probe::Shrinking);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_exact_subnormal_difference() {
        let a = f64::MIN_POSITIVE * 1.5;
        let b = f64::MIN_POSITIVE;
        let flags = FaultFlags::probe(&[a, b], a - b, Probe::Exact);
        assert!(flags.is_empty());
        let flags = FaultFlags::probe(&[f64::MAX, f64::MAX], f64::MAX + f64::MAX, Probe::Exact);
        assert_eq!(flags, FaultFlags::OVERFLOW);
    }

    #[test]
    fn test_infinite_operands_do_not_fault() {
        let flags = FaultFlags::probe(&[f64::INFINITY, 1.0], f64::INFINITY, Probe::Plain);
        assert!(flags.is_empty());
    }
}
