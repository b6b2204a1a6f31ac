//! Piecewise-linear curve evaluation.
//!
//! Fee curves and bonus/malus curves are monotonic-breakpoint piecewise
//! linear functions of the collateral ratio. Breakpoints and values live in
//! one ordered container so the two can never drift out of length-sync.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Query coordinate, typically a BASE-scaled collateral ratio.
    pub x: u64,
    /// BASE-scaled value at `x`. Values need not be monotonic.
    pub y: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiecewiseCurve {
    points: Vec<CurvePoint>,
}

impl PiecewiseCurve {
    /// Build a curve from parallel breakpoint and value slices.
    ///
    /// Fails with `EmptyCurve` if either slice is empty, `LengthMismatch` if
    /// they differ in length, and `NonAscendingBreakpoints` unless `xs` is
    /// strictly ascending.
    pub fn new(xs: &[u64], ys: &[u64]) -> Result<Self> {
        if xs.is_empty() || ys.is_empty() {
            return Err(ProtocolError::EmptyCurve);
        }
        if xs.len() != ys.len() {
            return Err(ProtocolError::LengthMismatch);
        }
        for pair in xs.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ProtocolError::NonAscendingBreakpoints);
            }
        }

        let points = xs
            .iter()
            .zip(ys.iter())
            .map(|(&x, &y)| CurvePoint { x, y })
            .collect();

        Ok(Self { points })
    }

    /// Shorthand for a curve that evaluates to `y` everywhere.
    pub fn flat(y: u64) -> Self {
        Self {
            points: vec![CurvePoint { x: 0, y }],
        }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Evaluate the curve at `x`.
    ///
    /// Outside the breakpoint range the curve is clamped flat to the first
    /// or last value - deliberately not an extrapolated slope, so extreme
    /// collateral ratios can never push a fee outside its configured band.
    pub fn evaluate(&self, x: u64) -> u64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }

        // Binary-search the bracketing segment: hi is the first point with
        // x strictly greater than the query (exists, since x < last.x).
        let hi_idx = self.points.partition_point(|p| p.x <= x);
        let lo = self.points[hi_idx - 1];
        let hi = self.points[hi_idx];

        let dx = hi.x - lo.x;
        let run = x - lo.x;

        // Interpolate downward explicitly for descending segments so no
        // signed arithmetic is involved. run < dx, so the widened product
        // divided by dx stays below the segment's y-difference.
        if hi.y >= lo.y {
            let rise = ((hi.y - lo.y) as u128 * run as u128 / dx as u128) as u64;
            lo.y + rise
        } else {
            let fall = ((lo.y - hi.y) as u128 * run as u128 / dx as u128) as u64;
            lo.y - fall
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::BASE;

    fn curve() -> PiecewiseCurve {
        PiecewiseCurve::new(
            &[BASE, 2 * BASE, 3 * BASE],
            &[500_000_000, 100_000_000, 300_000_000],
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_and_mismatched_input() {
        assert_eq!(PiecewiseCurve::new(&[], &[]), Err(ProtocolError::EmptyCurve));
        assert_eq!(
            PiecewiseCurve::new(&[1, 2], &[1]),
            Err(ProtocolError::LengthMismatch)
        );
        assert_eq!(
            PiecewiseCurve::new(&[1, 1], &[0, 0]),
            Err(ProtocolError::NonAscendingBreakpoints)
        );
        assert_eq!(
            PiecewiseCurve::new(&[2, 1], &[0, 0]),
            Err(ProtocolError::NonAscendingBreakpoints)
        );
    }

    #[test]
    fn clamps_flat_outside_breakpoints() {
        let c = curve();
        assert_eq!(c.evaluate(0), 500_000_000);
        assert_eq!(c.evaluate(BASE - 1), 500_000_000);
        assert_eq!(c.evaluate(3 * BASE), 300_000_000);
        assert_eq!(c.evaluate(u64::MAX), 300_000_000);
    }

    #[test]
    fn exact_at_every_breakpoint() {
        let c = curve();
        for p in c.points() {
            assert_eq!(c.evaluate(p.x), p.y);
        }
    }

    #[test]
    fn interpolates_descending_segment() {
        let c = curve();
        // Midway between (BASE, 0.5) and (2*BASE, 0.1).
        assert_eq!(c.evaluate(BASE + BASE / 2), 300_000_000);
    }

    #[test]
    fn interpolates_ascending_segment() {
        let c = curve();
        // Midway between (2*BASE, 0.1) and (3*BASE, 0.3).
        assert_eq!(c.evaluate(2 * BASE + BASE / 2), 200_000_000);
    }

    #[test]
    fn single_point_curve_is_constant() {
        let c = PiecewiseCurve::flat(42);
        assert_eq!(c.evaluate(0), 42);
        assert_eq!(c.evaluate(u64::MAX), 42);
    }

    #[test]
    fn huge_values_do_not_overflow() {
        let c = PiecewiseCurve::new(&[0, u64::MAX], &[0, u64::MAX]).unwrap();
        assert_eq!(c.evaluate(u64::MAX / 2), u64::MAX / 2);
    }
}
