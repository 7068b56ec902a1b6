//! Interval algebra over closed subintervals of `[0, 1]` (spec §3, §4.1, C1).

use serde::{Serialize, Serializer};

/// A closed interval `[l, u]` with `0 <= l <= u <= 1`.
///
/// Construction always clamps into range. An interval that would collapse
/// (`l > u` after clamping) silently becomes [`Interval::FULL`] -- the
/// "no information" state -- rather than panicking or narrowing (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    l: f64,
    u: f64,
}

/// Comparison operator carried by a clause threshold (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `=`
    Eq,
}

impl Interval {
    /// The "no information" interval, `[0, 1]`.
    pub const FULL: Interval = Interval { l: 0.0, u: 1.0 };

    pub fn new(l: f64, u: f64) -> Self {
        let l = clamp01(l);
        let u = clamp01(u);
        if l > u {
            Interval::FULL
        } else {
            Interval { l, u }
        }
    }

    pub fn point(x: f64) -> Self {
        Interval::new(x, x)
    }

    pub fn lower(self) -> f64 {
        self.l
    }

    pub fn upper(self) -> f64 {
        self.u
    }

    pub fn width(self) -> f64 {
        self.u - self.l
    }

    /// Set intersection, clamped back into `[0, 1]` interval space. Two
    /// disjoint intervals meet to [`Interval::FULL`] rather than an empty
    /// set -- there is no representable "contradiction" interval (spec §3).
    pub fn meet(a: Interval, b: Interval) -> Interval {
        let l = a.l.max(b.l);
        let u = a.u.min(b.u);
        if l > u {
            Interval::FULL
        } else {
            Interval { l, u }
        }
    }

    /// `true` iff `a` is narrower than `b`. Ties are broken deterministically
    /// by smaller width, then smaller lower bound, then smaller upper bound;
    /// an interval is never narrower than itself (spec §3).
    pub fn narrower(a: Interval, b: Interval) -> bool {
        let (wa, wb) = (round6(a.width()), round6(b.width()));
        if wa != wb {
            return wa < wb;
        }
        let (la, lb) = (round6(a.l), round6(b.l));
        if la != lb {
            return la < lb;
        }
        round6(a.u) < round6(b.u)
    }

    /// Evaluate a clause threshold against this interval (spec §4.6).
    ///
    /// `>=` tests the lower bound, `<=` tests the upper bound, `=` requires
    /// both bounds to equal the target -- i.e. the interval must already be
    /// the degenerate point `x`.
    pub fn contains_threshold(self, op: ThresholdOp, x: f64) -> bool {
        let x = round6(x);
        match op {
            ThresholdOp::Ge => round6(self.l) >= x,
            ThresholdOp::Le => round6(self.u) <= x,
            ThresholdOp::Eq => round6(self.l) == x && round6(self.u) == x,
        }
    }

    /// The two bounds rounded half-to-even to six fractional digits -- the
    /// canonical representation used for equality and for export (spec §6).
    pub fn rounded(self) -> (f64, f64) {
        (round6(self.l), round6(self.u))
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.rounded() == other.rounded()
    }
}
impl Eq for Interval {}

impl Default for Interval {
    fn default() -> Self {
        Interval::FULL
    }
}

impl Serialize for Interval {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeTuple;
        let (l, u) = self.rounded();
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&l)?;
        tup.serialize_element(&u)?;
        tup.end()
    }
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Round `x` to six fractional digits using round-half-to-even, operating
/// on micro-units (1e-6) to keep the tie-break exact for the values this
/// engine deals in (spec §6: "6 decimal digits, half-to-even").
fn round6_to_micros(x: f64) -> i64 {
    let scaled = x * 1_000_000.0;
    let floor = scaled.floor();
    let diff = scaled - floor;
    let floor_i = floor as i64;
    const EPS: f64 = 1e-7;
    if (diff - 0.5).abs() < EPS {
        if floor_i % 2 == 0 {
            floor_i
        } else {
            floor_i + 1
        }
    } else if diff > 0.5 {
        floor_i + 1
    } else {
        floor_i
    }
}

pub fn round6(x: f64) -> f64 {
    round6_to_micros(x) as f64 / 1_000_000.0
}

/// Render `x` (assumed in `[0, 1]`) as a fixed six-decimal string, e.g.
/// `"0.510000"`. Used by the interpretation exporter for byte-exact output.
pub fn format_6dp(x: f64) -> String {
    let micros = round6_to_micros(x).clamp(0, 1_000_000);
    format!("{}.{:06}", micros / 1_000_000, micros % 1_000_000)
}
