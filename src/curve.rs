//! Geometry primitives: breakpoints, resolved points and ordered curves.

use std::cmp::Ordering;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::{interp, intersection};
use crate::model::Model;

/// One coordinate of a breakpoint: either a literal number or the current
/// value of another variable, resolved at evaluation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Coord {
    Literal(f64),
    Reference(String),
}

impl Coord {
    pub fn resolve(&self, model: &Model) -> Result<f64> {
        match self {
            Coord::Literal(value) => Ok(*value),
            Coord::Reference(name) => model.value_of(name),
        }
    }

    pub fn literal(&self) -> Option<f64> {
        match self {
            Coord::Literal(value) => Some(*value),
            Coord::Reference(_) => None,
        }
    }
}

impl From<f64> for Coord {
    fn from(value: f64) -> Self {
        Coord::Literal(value)
    }
}

impl From<&str> for Coord {
    fn from(name: &str) -> Self {
        Coord::Reference(name.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub x: Coord,
    pub y: Coord,
}

impl Breakpoint {
    pub fn new(x: impl Into<Coord>, y: impl Into<Coord>) -> Self {
        Self { x: x.into(), y: y.into() }
    }

    pub fn resolve(&self, model: &Model) -> Result<Point> {
        Ok(Point {
            x: self.x.resolve(model)?,
            y: self.y.resolve(model)?,
        })
    }
}

impl From<(f64, f64)> for Breakpoint {
    fn from((x, y): (f64, f64)) -> Self {
        Breakpoint::new(x, y)
    }
}

/// A breakpoint with both coordinates resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A piecewise-linear curve whose points are in non-decreasing x order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve(Vec<Point>);

impl Curve {
    /// Builds a curve, returning the index of the first point that breaks
    /// the x ordering on failure.
    pub fn new(points: Vec<Point>) -> std::result::Result<Self, usize> {
        match first_out_of_order(points.iter().map(|p| p.x)) {
            Some(index) => Err(index),
            None => Ok(Self(points)),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    pub fn max_value(&self) -> Option<f64> {
        self.0.iter().map(|p| p.y).reduce(f64::max)
    }

    /// Unclamped curve value at `x`. `None` only for an empty curve.
    pub fn value_at(&self, x: f64) -> Option<f64> {
        interp(x, self.0.iter().map(|p| (p.x, p.y)))
    }

    /// The line this curve follows strictly between `lo` and `hi`, given as
    /// its values at both ends. No breakpoint may lie strictly inside.
    pub(crate) fn segment_over(&self, lo: f64, hi: f64) -> Option<(Point, Point)> {
        let last = self.0.last()?;
        let flat = |y| Some((Point::new(lo, y), Point::new(hi, y)));

        match self.0.iter().rposition(|p| p.x <= lo) {
            None => flat(self.0[0].y),
            Some(i) if i + 1 == self.0.len() => flat(last.y),
            Some(i) => {
                let (p0, p1) = (self.0[i], self.0[i + 1]);
                let at = |x: f64| p0.y + (x - p0.x) / (p1.x - p0.x) * (p1.y - p0.y);

                Some((Point::new(lo, at(lo)), Point::new(hi, at(hi))))
            },
        }
    }

    /// Values the curve approaches at `x` from the left and from the right.
    /// They differ only across a vertical step. `None` for an empty curve.
    pub(crate) fn limits(&self, x: f64) -> Option<(f64, f64)> {
        let (first, last) = (self.0.first()?, self.0.last()?);
        let along = |p0: Point, p1: Point| p0.y + (x - p0.x) / (p1.x - p0.x) * (p1.y - p0.y);

        let left = match self.0.iter().rposition(|p| p.x < x) {
            None => first.y,
            Some(i) if i + 1 == self.0.len() => last.y,
            Some(i) if self.0[i + 1].x == x => self.0[i + 1].y,
            Some(i) => along(self.0[i], self.0[i + 1]),
        };
        let right = match self.0.iter().position(|p| p.x > x) {
            None => last.y,
            Some(0) => first.y,
            Some(j) if self.0[j - 1].x == x => self.0[j - 1].y,
            Some(j) => along(self.0[j - 1], self.0[j]),
        };

        Some((left, right))
    }

    /// Area under the curve, with flat rectangles extending a positive first
    /// point back to the start of `range` and a positive last point out to
    /// its end.
    pub fn area(&self, range: &RangeInclusive<f64>) -> f64 {
        let (Some(first), Some(last)) = (self.0.first(), self.0.last()) else {
            return 0.;
        };
        let mut area = 0.;

        if first.y > 0. {
            area += (first.x - range.start()).max(0.) * first.y;
        }

        for pair in self.0.windows(2) {
            area += trapezoid(pair[0], pair[1]);
        }

        if last.y > 0. && last.x < *range.end() {
            area += (range.end() - last.x) * last.y;
        }

        area
    }

    /// Locates the x that splits `total_area` (as computed by [`Curve::area`])
    /// into two equal halves. The result is clamped into `range`.
    pub fn center(&self, range: &RangeInclusive<f64>, total_area: f64) -> Option<f64> {
        let clamp = |x: f64| x.max(*range.start()).min(*range.end());
        let (first, last) = (self.0.first()?, self.0.last()?);

        if self.0.len() == 1 {
            return Some(first.x);
        }

        let half = total_area / 2.;
        let mut sum = 0.;

        if first.y > 0. && first.x > *range.start() {
            let lead = (first.x - range.start()) * first.y;

            if lead >= half {
                return Some(clamp(range.start() + half / first.y));
            }
            sum += lead;
        }

        for pair in self.0.windows(2) {
            let (p0, p1) = (pair[0], pair[1]);
            let run = p1.x - p0.x;

            if run <= 0. {
                continue;
            }

            let area = trapezoid(p0, p1);

            if sum + area >= half {
                let remaining = half - sum;

                if remaining <= 0. {
                    return Some(clamp(p0.x));
                }

                let rise = p1.y - p0.y;
                let dist = match rise.partial_cmp(&0.) {
                    Some(Ordering::Equal) => remaining / p0.y,
                    // Rising and falling edges: solve y0*t + rise/(2*run)*t^2 = remaining
                    Some(Ordering::Greater) | Some(Ordering::Less) => {
                        let base = p0.y * run;
                        let disc = (base * base + 2. * rise * remaining * run).max(0.);

                        2. * remaining * run / (base + disc.sqrt())
                    },
                    None => return None,
                };

                return Some(clamp(p0.x + dist.min(run)));
            }
            sum += area;
        }

        if last.y > 0. && last.x < *range.end() {
            return Some(clamp(last.x + (half - sum) / last.y));
        }

        Some(clamp(last.x))
    }

    /// Caps the curve at `level`, inserting the exact crossing point wherever
    /// a segment passes through it, and extends a positive first/last point
    /// flatly out to the bounds of `range`.
    ///
    /// A curve that never rises above zero clips to an empty curve.
    pub fn clip(&self, level: f64, range: &RangeInclusive<f64>) -> Curve {
        let (Some(first), Some(last)) = (self.0.first(), self.0.last()) else {
            return Curve::default();
        };

        if self.0.iter().all(|p| p.y <= 0.) {
            return Curve::default();
        }

        let mut clipped = Vec::with_capacity(self.0.len() + 4);

        if first.y > 0. && first.x > *range.start() {
            clipped.push(Point::new(*range.start(), first.y.min(level)));
        }

        for (i, point) in self.0.iter().enumerate() {
            if let Some(prev) = i.checked_sub(1).map(|j| self.0[j]) {
                let crosses = prev.x != point.x
                    && ((prev.y < level && point.y > level) || (prev.y > level && point.y < level));

                if crosses {
                    let x = prev.x + (level - prev.y) * (point.x - prev.x) / (point.y - prev.y);

                    clipped.push(Point::new(x, level));
                }
            }

            clipped.push(Point::new(point.x, point.y.min(level)));
        }

        if last.y > 0. && last.x < *range.end() {
            clipped.push(Point::new(*range.end(), last.y.min(level)));
        }

        Curve(clipped)
    }
}

/// Index of the first x that is smaller than its predecessor, or NaN.
pub(crate) fn first_out_of_order(xs: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut prev = f64::NEG_INFINITY;

    for (i, x) in xs.into_iter().enumerate() {
        if x.is_nan() || x < prev {
            return Some(i);
        }
        prev = x;
    }

    None
}

fn trapezoid(p0: Point, p1: Point) -> f64 {
    let run = p1.x - p0.x;

    if run <= 0. {
        return 0.;
    }

    f64::min(p0.y, p1.y) * run + (p1.y - p0.y).abs() * run / 2.
}

/// Merges several curves into their pointwise maximum.
///
/// Sweeps left to right over every breakpoint of every curve. Whenever the
/// curve holding the maximum changes between two consecutive abscissas, the
/// exact crossing where it is first overtaken is emitted. A vertical step in
/// the maximum is emitted as two points sharing an x. On ties the previous
/// owner keeps ownership, otherwise the earliest curve wins.
pub(crate) fn envelope(curves: &[&Curve], end: f64) -> Curve {
    let mut points = Vec::new();
    let mut previous_x = f64::NEG_INFINITY;
    let mut owner: Option<usize> = None;

    while previous_x < end {
        let next = curves
            .iter()
            .flat_map(|c| c.points())
            .map(|p| p.x)
            .filter(|x| *x > previous_x)
            .min_by(f64::total_cmp);
        let Some(x) = next else {
            break;
        };
        let (lefts, rights): (Vec<f64>, Vec<f64>) = curves
            .iter()
            .map(|c| c.limits(x).unwrap_or((f64::NEG_INFINITY, f64::NEG_INFINITY)))
            .unzip();
        let left = leader(&lefts, owner);

        if let Some(prev) = owner.filter(|prev| *prev != left && previous_x.is_finite()) {
            let overtaken = (0..curves.len())
                .filter(|c| *c != prev)
                .filter_map(|c| crossing(curves[prev], curves[c], previous_x, x).map(|p| (c, p)))
                .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x));

            if let Some((c, point)) = overtaken {
                points.push(point);
                previous_x = point.x;
                owner = Some(c);
                continue;
            }
        }

        let right = leader(&rights, Some(left));

        points.push(Point::new(x, lefts[left]));
        if rights[right] != lefts[left] {
            points.push(Point::new(x, rights[right]));
        }

        owner = Some(right);
        previous_x = x;
    }

    Curve(points)
}

/// Index of the largest value. `current` keeps the lead on a tie, otherwise
/// the earliest index wins.
fn leader(values: &[f64], current: Option<usize>) -> usize {
    let maximum = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    match current {
        Some(i) if values.get(i) == Some(&maximum) => i,
        _ => values.iter().position(|v| *v == maximum).unwrap_or(0),
    }
}

/// Where `b` overtakes `a` over `(lo, hi)`, if strictly inside that
/// interval. Parallel segments never cross.
fn crossing(a: &Curve, b: &Curve, lo: f64, hi: f64) -> Option<Point> {
    let (a0, a1) = a.segment_over(lo, hi)?;
    let (b0, b1) = b.segment_over(lo, hi)?;

    if b1.y <= a1.y {
        return None;
    }

    let (x, y) = intersection((a0.x, a0.y), (a1.x, a1.y), (b0.x, b0.y), (b1.x, b1.y))?;

    (x > lo && x < hi).then_some(Point::new(x, y))
}

#[cfg(test)]
fn curve(points: &[(f64, f64)]) -> Curve {
    Curve::new(points.iter().map(|(x, y)| Point::new(*x, *y)).collect()).unwrap()
}

#[test]
fn test_symmetric_triangle_area_and_center() {
    let triangle = curve(&[(0., 0.), (5., 1.), (10., 0.)]);
    let range = 0. ..=10.;
    let area = triangle.area(&range);

    assert_eq!(area, 5.0);
    assert_eq!(triangle.center(&range, area), Some(5.0));
}

#[test]
fn test_ordering_is_checked() {
    let err = Curve::new(vec![Point::new(0., 0.), Point::new(5., 1.), Point::new(4., 0.)]).unwrap_err();

    assert_eq!(err, 2);
    assert_eq!(first_out_of_order([0., 0., 1.]), None);
    assert_eq!(first_out_of_order([0., f64::NAN]), Some(1));
}

#[test]
fn test_clip_inserts_crossings() {
    let clipped = curve(&[(25., 0.), (50., 1.), (75., 0.)]).clip(0.5, &(0. ..=100.));

    assert_eq!(
        clipped,
        curve(&[(25., 0.), (37.5, 0.5), (50., 0.5), (62.5, 0.5), (75., 0.)])
    );
}

#[test]
fn test_clip_extends_to_range() {
    let clipped = curve(&[(2., 0.8), (6., 0.8), (8., 0.)]).clip(0.5, &(0. ..=10.));

    assert_eq!(
        clipped,
        curve(&[(0., 0.5), (2., 0.5), (6., 0.5), (6.75, 0.5), (8., 0.)])
    );

    let area = clipped.area(&(0. ..=10.));

    assert_eq!(area, 3.6875);
    assert_eq!(clipped.center(&(0. ..=10.), area), Some(3.6875));
    assert!(curve(&[(0., 0.), (5., 0.)]).clip(0.5, &(0. ..=10.)).is_empty());
}

#[test]
fn test_area_extension_rectangles() {
    let plateau = curve(&[(2., 0.5), (6., 0.5)]);
    let range = 0. ..=10.;
    let area = plateau.area(&range);

    assert_eq!(area, 5.0);
    assert_eq!(plateau.center(&range, area), Some(5.0));
}

#[test]
fn test_single_point_center() {
    let single = curve(&[(3., 0.4)]);

    assert_eq!(single.center(&(0. ..=10.), 1.), Some(3.));
}

#[test]
fn test_envelope_emits_exact_intersection() {
    let range = 0. ..=15.;
    let low = curve(&[(0., 0.), (5., 1.), (10., 0.)]).clip(0.3, &range);
    let high = curve(&[(5., 0.), (10., 1.), (15., 0.)]).clip(0.6, &range);
    let merged = envelope(&[&low, &high], *range.end());

    assert!(merged.points().iter().all(|p| p.y <= 0.6));

    let crossing = merged
        .points()
        .iter()
        .find(|p| p.x > 5. && p.x < 8.)
        .unwrap();

    assert!((crossing.x - 6.5).abs() < 1e-6);
    assert!((crossing.y - 0.3).abs() < 1e-6);
    assert_eq!(merged.len(), 9);
    assert_eq!(merged.last(), Some(&Point::new(15., 0.)));
}

#[test]
fn test_segment_over() {
    let ramp = curve(&[(0., 0.), (10., 1.)]);

    assert_eq!(
        ramp.segment_over(2., 4.),
        Some((Point::new(2., 0.2), Point::new(4., 0.4)))
    );
    assert_eq!(
        ramp.segment_over(12., 14.),
        Some((Point::new(12., 1.), Point::new(14., 1.)))
    );
    assert_eq!(
        ramp.segment_over(-4., -2.),
        Some((Point::new(-4., 0.), Point::new(-2., 0.)))
    );
}

#[test]
fn test_clip_vertical_step() {
    let step = curve(&[(50., 0.), (50., 1.), (100., 1.)]).clip(0.6, &(0. ..=100.));

    assert_eq!(step, curve(&[(50., 0.), (50., 0.6), (100., 0.6)]));
    assert_eq!(step.limits(50.), Some((0., 0.6)));
    assert_eq!(step.value_at(50.), Some(0.6));
}

#[test]
fn test_envelope_across_vertical_step() {
    let range = 0. ..=100.;
    let low = curve(&[(0., 1.), (50., 1.), (60., 0.)]).clip(0.3, &range);
    let high = curve(&[(50., 0.), (50., 1.), (100., 1.)]).clip(0.6, &range);
    let merged = envelope(&[&low, &high], *range.end());

    assert_eq!(
        merged,
        curve(&[(0., 0.3), (50., 0.3), (50., 0.6), (57., 0.6), (60., 0.6), (100., 0.6)])
    );

    let area = merged.area(&range);

    assert!((area - 45.).abs() < 1e-9);
    assert!((merged.center(&range, area).unwrap() - 62.5).abs() < 1e-9);

    // Stepping down keeps both levels too.
    let drop = curve(&[(0., 0.), (20., 0.8), (20., 0.2), (40., 0.2)]).clip(1., &range);
    let merged = envelope(&[&drop], *range.end());

    assert_eq!(
        merged,
        curve(&[(0., 0.), (20., 0.8), (20., 0.2), (40., 0.2), (100., 0.2)])
    );
}

#[test]
fn test_envelope_of_three_way_crossing() {
    // The middle curve peaks above both outer ones between their breakpoints.
    let range = 0. ..=10.;
    let rising = curve(&[(0., 0.), (10., 1.)]);
    let falling = curve(&[(0., 1.), (10., 0.)]);
    let flat = curve(&[(0., 0.7), (10., 0.7)]);
    let merged = envelope(&[&falling, &rising, &flat], *range.end());

    assert_eq!(merged.len(), 4);
    assert!((merged.points()[1].x - 3.).abs() < 1e-9);
    assert!((merged.points()[2].x - 7.).abs() < 1e-9);
    assert!(merged.points().iter().all(|p| p.y >= 0.7 - 1e-9));
}

#[test]
fn test_envelope_of_random_curves() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0xc0ffee);
    let range = 0. ..=100.;

    for _ in 0..400 {
        let mut clipped = Vec::new();
        let mut top: f64 = 0.;

        for _ in 0..rng.gen_range(1..=4) {
            let mut x: f64 = rng.gen_range(0.0..60.0);
            let mut points = Vec::new();

            for _ in 0..rng.gen_range(1..=6) {
                // Leaving x unchanged yields vertical steps and spikes.
                if rng.gen_bool(0.7) {
                    x += rng.gen_range(0.0..25.0);
                }

                let y = if rng.gen_bool(0.2) { 0. } else { rng.gen_range(0.0..=1.0) };

                points.push(Point::new(x.min(100.), y));
            }

            let level = rng.gen_range(0.05..=1.0);
            let curve = Curve::new(points).unwrap().clip(level, &range);

            if !curve.is_empty() {
                top = top.max(level);
                clipped.push(curve);
            }
        }

        if clipped.is_empty() {
            continue;
        }

        let refs: Vec<&Curve> = clipped.iter().collect();
        let merged = envelope(&refs, *range.end());

        assert!(merged.points().windows(2).all(|w| w[0].x <= w[1].x), "{merged:?}");
        assert!(merged.points().iter().all(|p| p.y >= -1e-9 && p.y <= top + 1e-9), "{merged:?}");

        for _ in 0..25 {
            let x = rng.gen_range(0.0..100.0);
            let expected = clipped
                .iter()
                .filter_map(|c| c.value_at(x))
                .fold(f64::NEG_INFINITY, f64::max);
            let actual = merged.value_at(x).unwrap();

            assert!((actual - expected).abs() < 1e-7, "at {x}: {actual} != {expected} for {clipped:?}");
        }

        let area = merged.area(&range);

        assert!(area >= 0.);
        if area > 0. {
            assert!(range.contains(&merged.center(&range, area).unwrap()));
        }
    }
}
