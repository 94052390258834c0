//! Logicle (biexponential) transform.
//!
//! The logicle scale is linear near zero and logarithmic for large values,
//! so it can display the negative and near-zero events that a log scale
//! would discard.
//!
//! References:
//! - Parks, Roederer, Moore. "A new Logicle display method avoids deceptive
//!   effects of logarithmic scaling for low signals and compensated data",
//!   Cytometry A 69 (2006).
//! - Moore, Parks. "Update for the logicle data scale including operational
//!   code implementations", Cytometry A 81 (2012).

use crate::error::{CytoflowError, Result};
use crate::utils::stats::percentile;

/// Default number of decades at the top of the scale.
pub const DEFAULT_M: f64 = 4.5;
/// Default width of the linear region when the data has no negative events.
pub const DEFAULT_W: f64 = 0.5;
/// Percentile of the negative events used to pick the linear width.
const NEGATIVE_PERCENTILE: usize = 5;

const MAX_ITER: usize = 200;
const TOLERANCE: f64 = 1e-12;

/// A fitted logicle transform.
///
/// Maps data values to scale coordinates where `0` maps to `x1` (a small
/// positive offset determined by `W`) and `T` maps to `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Logicle {
    t: f64,
    w: f64,
    m: f64,
    a_param: f64,
    // biexponential coefficients: value = a*e^(b*y) - c*e^(-d*y) + f
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    f: f64,
    x1: f64,
}

/// Solve 2*(ln(d) - ln(b)) + w*(b + d) = 0 for d by bisection.
fn solve_d(b: f64, w: f64) -> f64 {
    if w == 0.0 {
        return b;
    }

    let g = |d: f64| 2.0 * (d.ln() - b.ln()) + w * (b + d);

    let mut lo = 0.0;
    let mut hi = b;
    for _ in 0..MAX_ITER {
        let mid = 0.5 * (lo + hi);
        if g(mid) > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
        if hi - lo < TOLERANCE * b {
            break;
        }
    }
    0.5 * (lo + hi)
}

impl Logicle {
    /// Create a logicle transform from its parameters.
    ///
    /// # Arguments
    /// * `t` - top of the data range (maps to 1.0)
    /// * `w` - width of the linear region, in decades
    /// * `m` - number of decades the scale spans
    /// * `a` - additional negative decades
    pub fn new(t: f64, w: f64, m: f64, a: f64) -> Result<Self> {
        if !(t.is_finite() && t > 0.0) {
            return Err(CytoflowError::InvalidParameter(format!(
                "logicle T must be positive, got {t}"
            )));
        }
        if !(m.is_finite() && m > 0.0) {
            return Err(CytoflowError::InvalidParameter(format!(
                "logicle M must be positive, got {m}"
            )));
        }
        if !(w >= 0.0 && 2.0 * w <= m) {
            return Err(CytoflowError::InvalidParameter(format!(
                "logicle W must be in [0, M/2], got {w}"
            )));
        }
        if !(a >= -w && a + w <= m - w) {
            return Err(CytoflowError::InvalidParameter(format!(
                "logicle A must be in [-W, M - 2W], got {a}"
            )));
        }

        let w_frac = w / (m + a);
        let x2 = a / (m + a);
        let x1 = x2 + w_frac;
        let x0 = x2 + 2.0 * w_frac;
        let b = (m + a) * std::f64::consts::LN_10;
        let d = solve_d(b, w_frac);

        let c_a = (x0 * (b + d)).exp();
        let mf_a = (b * x1).exp() - c_a / (d * x1).exp();
        let coef_a = t / ((b.exp() - mf_a) - c_a / d.exp());

        Ok(Self {
            t,
            w,
            m,
            a_param: a,
            a: coef_a,
            b,
            c: c_a * coef_a,
            d,
            f: -mf_a * coef_a,
            x1,
        })
    }

    /// Fit a logicle transform to a channel's values.
    ///
    /// `range` is the channel's declared range; without it, the largest
    /// finite value is used. `W` is derived from the 5th percentile of the
    /// negative values, or defaults to 0.5 when there are none.
    pub fn fit(values: &[f64], range: Option<f64>) -> Result<Self> {
        let t = match range {
            Some(r) => r,
            None => values
                .iter()
                .copied()
                .filter(|x| x.is_finite())
                .fold(f64::NEG_INFINITY, f64::max),
        };
        if !(t.is_finite() && t > 0.0) {
            return Err(CytoflowError::InvalidParameter(
                "logicle scale needs a declared range or positive data".to_string(),
            ));
        }

        let negative: Vec<f64> = values
            .iter()
            .copied()
            .filter(|x| x.is_finite() && *x < 0.0)
            .collect();

        let w = if negative.is_empty() {
            DEFAULT_W
        } else {
            let r = percentile(&negative, NEGATIVE_PERCENTILE).abs();
            let w = (DEFAULT_M - (t / r).log10()) / 2.0;
            if w.is_finite() {
                w.clamp(0.0, DEFAULT_M / 2.0)
            } else {
                DEFAULT_W
            }
        };

        Self::new(t, w, DEFAULT_M, 0.0)
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn w(&self) -> f64 {
        self.w
    }

    pub fn m(&self) -> f64 {
        self.m
    }

    pub fn a(&self) -> f64 {
        self.a_param
    }

    /// Scale coordinate of the data value zero.
    pub fn zero_point(&self) -> f64 {
        self.x1
    }

    /// Biexponential for scale coordinates at or above `x1`.
    fn biexp(&self, y: f64) -> f64 {
        self.a * (self.b * y).exp() - self.c * (-self.d * y).exp() + self.f
    }

    fn biexp_slope(&self, y: f64) -> f64 {
        self.a * self.b * (self.b * y).exp() + self.c * self.d * (-self.d * y).exp()
    }

    /// Map a scale coordinate back to a data value.
    pub fn inverse(&self, y: f64) -> f64 {
        if !y.is_finite() {
            return f64::NAN;
        }
        if y < self.x1 {
            -self.biexp(2.0 * self.x1 - y)
        } else {
            self.biexp(y)
        }
    }

    /// Map a data value to its scale coordinate.
    pub fn forward(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return f64::NAN;
        }
        if value == 0.0 {
            return self.x1;
        }

        let target = value.abs();

        // bracket the root above x1; the biexponential is increasing there
        let lo_start = self.x1;
        let mut hi = self.x1 + 1.0;
        let mut expansions = 0;
        while self.biexp(hi) < target && expansions < 64 {
            hi = self.x1 + 2.0 * (hi - self.x1);
            expansions += 1;
        }

        let mut lo = lo_start;
        let mut y = 0.5 * (lo + hi);
        for _ in 0..MAX_ITER {
            let fy = self.biexp(y) - target;
            if fy > 0.0 {
                hi = y;
            } else {
                lo = y;
            }

            let slope = self.biexp_slope(y);
            let newton = y - fy / slope;
            let next = if slope > 0.0 && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };

            if (next - y).abs() <= TOLERANCE * (1.0 + y.abs()) {
                y = next;
                break;
            }
            y = next;
        }

        if value < 0.0 {
            2.0 * self.x1 - y
        } else {
            y
        }
    }
}
