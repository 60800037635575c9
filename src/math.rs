use num::Float;

/// Similar to numpy.interp, for a single abscissa.
///
/// `low` is the last breakpoint with `xp <= x` and `high` the first with
/// `xp >= x`. Past either end of the curve the end value holds. A point
/// shared by both bounds yields the larger of the two degrees.
///
/// Returns `None` if no breakpoint bounds `x` from either side.
pub(crate) fn interp<F: Float>(x: F, coords: impl IntoIterator<Item = (F, F)>) -> Option<F> {
    let mut low: Option<(F, F)> = None;
    let mut high: Option<(F, F)> = None;

    for (xp, fp) in coords {
        if xp <= x && low.map_or(true, |(xl, _)| xp >= xl) {
            low = Some((xp, fp));
        }
        if xp >= x && high.map_or(true, |(xh, _)| xp < xh) {
            high = Some((xp, fp));
        }
    }

    match (low, high) {
        (Some((xl, yl)), Some((xh, yh))) if xl == xh => Some(yl.max(yh)),
        (Some((xl, yl)), Some((xh, yh))) => Some(yl + (x - xl).abs() / (xh - xl).abs() * (yh - yl)),
        (Some((_, yl)), None) => Some(yl),
        (None, Some((_, yh))) => Some(yh),
        (None, None) => None,
    }
}

pub(crate) fn clamp01<F: Float>(value: F) -> F {
    value.max(F::zero()).min(F::one())
}

/// Intersection of the line through `a0`/`a1` with the line through `b0`/`b1`.
///
/// `None` when the lines are parallel.
pub(crate) fn intersection<F: Float>(a0: (F, F), a1: (F, F), b0: (F, F), b1: (F, F)) -> Option<(F, F)> {
    let ((x1, y1), (x2, y2)) = (a0, a1);
    let ((x3, y3), (x4, y4)) = (b0, b1);
    let den = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);

    if den == F::zero() {
        return None;
    }

    let a = x1 * y2 - y1 * x2;
    let b = x3 * y4 - y3 * x4;
    let x = (a * (x3 - x4) - (x1 - x2) * b) / den;
    let y = (a * (y3 - y4) - (y1 - y2) * b) / den;

    Some((x, y))
}

#[test]
fn test_interp() {
    let x = [0., 1., 1.5, 2.72, 3.24];
    let xs = [1., 2., 3.];
    let ys = [3., 2., 0.];
    let interped: Vec<_> = x
        .iter()
        .map(|x| interp(*x, xs.into_iter().zip(ys)).unwrap())
        .collect();

    assert_eq!(interped, vec![3., 3., 2.5, 0.5599999999999996, 0.]);

    let x = [2.5, -1., 7.5];
    let xs = [0., 1., 2., 3., 4.5];
    let ys = [0., 2., 5., 3., 2.];
    let interped: Vec<_> = x
        .iter()
        .map(|x| interp(*x, xs.into_iter().zip(ys)).unwrap())
        .collect();

    assert_eq!(interped, vec![4., 0., 2.]);
}

#[test]
fn test_interp_step_and_empty() {
    // Vertical step at x = 5: the shared point takes the larger degree,
    // either side takes the adjacent level.
    let step = [(0., 0.2), (5., 0.2), (5., 0.9), (10., 0.9)];

    assert_eq!(interp(5., step), Some(0.9));
    assert_eq!(interp(4., step), Some(0.2));
    assert_eq!(interp(6., step), Some(0.9));
    assert_eq!(interp(1., std::iter::empty::<(f64, f64)>()), None);
    assert_eq!(interp(f64::NAN, step), None);
}

#[test]
fn test_intersection() {
    let (x, y) = intersection((0., 0.), (10., 1.), (0., 1.), (10., 0.)).unwrap();

    assert!((x - 5.).abs() < 1e-12);
    assert!((y - 0.5).abs() < 1e-12);
    assert_eq!(intersection((0., 0.), (1., 1.), (0., 1.), (1., 2.)), None);
    assert_eq!(clamp01(1.5), 1.);
    assert_eq!(clamp01(-0.5), 0.);
}
