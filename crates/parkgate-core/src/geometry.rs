//! Polygon utilities used to turn edge contours into plate quadrilaterals.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates.
///
/// `width`/`height` count pixels, so a single point has a 1x1 box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Grow the box by `margin` pixels on every side (negative shrinks).
    pub fn inflate(&self, margin: i32) -> Self {
        let w = (self.width as i64 + 2 * margin as i64).max(0) as u32;
        let h = (self.height as i64 + 2 * margin as i64).max(0) as u32;
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: w,
            height: h,
        }
    }

    /// Intersect with an image of `width x height`.
    ///
    /// Returns `None` if nothing of the box lies inside the image.
    pub fn clip(&self, width: u32, height: u32) -> Option<Self> {
        let x0 = self.x.max(0) as i64;
        let y0 = self.y.max(0) as i64;
        let x1 = (self.x as i64 + self.width as i64).min(width as i64);
        let y1 = (self.y as i64 + self.height as i64).min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Smallest axis-aligned box containing every point.
pub fn bounding_rect(points: &[Point2<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// Enclosed area of a closed polygon (shoelace formula, orientation ignored).
pub fn polygon_area(points: &[Point2<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    twice.abs() as f64 * 0.5
}

/// Length of a polyline; `closed` adds the segment from the last point back to the first.
pub fn arc_length(points: &[Point2<i32>], closed: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut len: f64 = points.windows(2).map(|w| dist(w[0], w[1])).sum();
    if closed {
        len += dist(points[points.len() - 1], points[0]);
    }
    len
}

/// True when every turn of the closed polygon goes the same way.
///
/// Collinear vertices are tolerated; fewer than 3 vertices is never convex.
pub fn is_convex(points: &[Point2<i32>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64 - (b.y - a.y) as i64 * (c.x - b.x) as i64;
        if cross == 0 {
            continue;
        }
        let s = cross.signum();
        if sign == 0 {
            sign = s;
        } else if s != sign {
            return false;
        }
    }
    sign != 0
}

/// Douglas-Peucker polygon approximation.
///
/// Every returned vertex is one of the input points, in input order. For
/// closed curves the recursion starts from a pair of mutually distant points,
/// and a final pass drops vertices that sit on an almost straight run, so the
/// arbitrary start of a traced contour does not survive as an extra vertex.
/// `imageproc::geometry::approximate_polygon_dp` always keeps the first
/// point of a closed curve, which turns a rectangle traced from mid-edge
/// into a pentagon.
pub fn approx_poly_dp(curve: &[Point2<i32>], epsilon: f64, closed: bool) -> Vec<Point2<i32>> {
    let n = curve.len();
    if n < 3 || epsilon <= 0.0 {
        return curve.to_vec();
    }

    let mut keep = vec![false; n];
    if closed {
        let Some((lo, hi)) = initial_split(curve) else {
            return vec![curve[0]];
        };
        keep[lo] = true;
        keep[hi] = true;
        simplify_ring(curve, lo, hi, epsilon, &mut keep);
        simplify_ring(curve, hi, lo + n, epsilon, &mut keep);
    } else {
        keep[0] = true;
        keep[n - 1] = true;
        simplify_ring(curve, 0, n - 1, epsilon, &mut keep);
    }

    let approx: Vec<Point2<i32>> = curve
        .iter()
        .zip(&keep)
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect();

    if closed {
        drop_straight_runs(approx, epsilon)
    } else {
        approx
    }
}

/// Order four corners as `[top-left, top-right, bottom-right, bottom-left]`.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the smallest `y - x`, bottom-left the largest. Ties resolve to the
/// lexicographically smallest `(x, y)`, so the result does not depend on the
/// input order. Valid for convex quads within roughly 45 degrees of upright.
pub fn order_corners(points: &[Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let sum = |p: &Point2<f32>| p.x + p.y;
    let diff = |p: &Point2<f32>| p.y - p.x;
    [
        extreme_by(points, sum, false),
        extreme_by(points, diff, false),
        extreme_by(points, sum, true),
        extreme_by(points, diff, true),
    ]
}

/// Four-vertex polygon describing a plate region in image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    /// Build a quad from an integer polygon with exactly four vertices.
    pub fn from_polygon(points: &[Point2<i32>]) -> Option<Self> {
        let pts: &[Point2<i32>; 4] = points.try_into().ok()?;
        Some(Self::new(pts.map(|p| Point2::new(p.x as f32, p.y as f32))))
    }

    /// Corners as `[TL, TR, BR, BL]`, see [`order_corners`].
    pub fn ordered(&self) -> [Point2<f32>; 4] {
        order_corners(&self.corners)
    }
}

fn extreme_by(
    points: &[Point2<f32>; 4],
    key: impl Fn(&Point2<f32>) -> f32,
    want_max: bool,
) -> Point2<f32> {
    let mut best = points[0];
    for p in &points[1..] {
        let (kp, kb) = (key(p), key(&best));
        let better = if want_max { kp > kb } else { kp < kb };
        let tie_wins = kp == kb && (p.x, p.y) < (best.x, best.y);
        if better || tie_wins {
            best = *p;
        }
    }
    best
}

#[inline]
fn dist(a: Point2<i32>, b: Point2<i32>) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Distance from `p` to the infinite line through `a` and `b`.
fn line_distance(p: Point2<i32>, a: Point2<i32>, b: Point2<i32>) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-12 {
        return dist(p, a);
    }
    (((p.x - a.x) as f64) * dy - ((p.y - a.y) as f64) * dx).abs() / len
}

fn farthest_from(curve: &[Point2<i32>], from: usize) -> Option<usize> {
    let origin = curve[from];
    let mut best = None;
    let mut best_d = 0.0;
    for (i, p) in curve.iter().enumerate() {
        let d = dist(origin, *p);
        if d > best_d {
            best_d = d;
            best = Some(i);
        }
    }
    best
}

fn initial_split(curve: &[Point2<i32>]) -> Option<(usize, usize)> {
    let mut a = 0;
    let mut b = farthest_from(curve, a)?;
    for _ in 0..2 {
        let next = farthest_from(curve, b)?;
        a = b;
        b = next;
    }
    Some((a.min(b), a.max(b)))
}

/// Simplify the ring segment `start..=end`; indices wrap modulo the curve length.
fn simplify_ring(curve: &[Point2<i32>], start: usize, end: usize, eps: f64, keep: &mut [bool]) {
    let n = curve.len();
    let mut stack = vec![(start, end)];
    while let Some((s, e)) = stack.pop() {
        if e <= s + 1 {
            continue;
        }
        let (a, b) = (curve[s % n], curve[e % n]);
        let mut max_d = 0.0;
        let mut max_k = s;
        for k in (s + 1)..e {
            let d = line_distance(curve[k % n], a, b);
            if d > max_d {
                max_d = d;
                max_k = k;
            }
        }
        if max_d > eps {
            keep[max_k % n] = true;
            stack.push((s, max_k));
            stack.push((max_k, e));
        }
    }
}

/// One circular pass removing vertices that lie between their neighbours
/// within `eps / sqrt(2)` of the line joining them.
fn drop_straight_runs(poly: Vec<Point2<i32>>, eps: f64) -> Vec<Point2<i32>> {
    let n = poly.len();
    if n <= 3 {
        return poly;
    }
    let mut removed = vec![false; n];
    let mut remaining = n;
    let mut prev = n - 1;
    for i in 0..n {
        if remaining <= 3 {
            break;
        }
        let Some(next) = (1..n).map(|k| (i + k) % n).find(|&j| !removed[j]) else {
            break;
        };
        let (start, pt, end) = (poly[prev], poly[i], poly[next]);
        let dx = (end.x - start.x) as f64;
        let dy = (end.y - start.y) as f64;
        let cross = ((pt.x - start.x) as f64) * dy - ((pt.y - start.y) as f64) * dx;
        let inner = ((pt.x - start.x) as f64) * ((end.x - pt.x) as f64)
            + ((pt.y - start.y) as f64) * ((end.y - pt.y) as f64);
        let straight = cross * cross <= 0.5 * eps * eps * (dx * dx + dy * dy);
        if straight && dx != 0.0 && dy != 0.0 && inner >= 0.0 {
            removed[i] = true;
            remaining -= 1;
        } else {
            prev = i;
        }
    }
    poly.into_iter()
        .zip(removed)
        .filter_map(|(p, r)| (!r).then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Dense boundary of an axis-aligned rectangle, traced clockwise from the top-left.
    fn rect_contour(x0: i32, y0: i32, w: i32, h: i32) -> Vec<Point2<i32>> {
        let mut pts = Vec::new();
        for x in x0..x0 + w {
            pts.push(Point2::new(x, y0));
        }
        for y in y0..y0 + h {
            pts.push(Point2::new(x0 + w, y));
        }
        for x in (x0 + 1..=x0 + w).rev() {
            pts.push(Point2::new(x, y0 + h));
        }
        for y in (y0 + 1..=y0 + h).rev() {
            pts.push(Point2::new(x0, y));
        }
        pts
    }

    #[test]
    fn area_and_length_of_rectangle() {
        let c = rect_contour(10, 20, 40, 10);
        assert_relative_eq!(polygon_area(&c), 400.0);
        assert_relative_eq!(arc_length(&c, true), 100.0);
        assert_relative_eq!(arc_length(&c, false), 99.0);
    }

    #[test]
    fn bounding_rect_counts_pixels() {
        let c = rect_contour(3, 4, 5, 6);
        let bb = bounding_rect(&c).expect("non-empty");
        assert_eq!(
            bb,
            BoundingBox {
                x: 3,
                y: 4,
                width: 6,
                height: 7
            }
        );
        assert!(bounding_rect(&[]).is_none());
    }

    #[test]
    fn clip_and_inflate() {
        let bb = BoundingBox {
            x: 2,
            y: 2,
            width: 10,
            height: 4,
        };
        let grown = bb.inflate(4);
        assert_eq!((grown.x, grown.y, grown.width, grown.height), (-2, -2, 18, 12));
        let clipped = grown.clip(8, 8).expect("overlaps");
        assert_eq!((clipped.x, clipped.y, clipped.width, clipped.height), (0, 0, 8, 8));
        assert!(bb.clip(1, 1).is_none());
    }

    #[test]
    fn approximation_collapses_rectangle_to_four_corners() {
        let c = rect_contour(0, 0, 120, 30);
        for frac in [0.025, 0.07] {
            let eps = frac * arc_length(&c, true);
            let approx = approx_poly_dp(&c, eps, true);
            assert_eq!(approx.len(), 4, "eps fraction {frac}: {approx:?}");
            assert!(is_convex(&approx));
        }
    }

    #[test]
    fn approximation_keeps_triangle_as_three_vertices() {
        let corners = [Point2::new(0, 0), Point2::new(60, 0), Point2::new(30, 50)];
        let mut c = Vec::new();
        for i in 0..3 {
            let (a, b) = (corners[i], corners[(i + 1) % 3]);
            for t in 0..20 {
                c.push(Point2::new(
                    a.x + (b.x - a.x) * t / 20,
                    a.y + (b.y - a.y) * t / 20,
                ));
            }
        }
        let eps = 0.07 * arc_length(&c, true);
        assert_eq!(approx_poly_dp(&c, eps, true).len(), 3);
    }

    #[test]
    fn convexity() {
        let square = [
            Point2::new(0, 0),
            Point2::new(10, 0),
            Point2::new(10, 10),
            Point2::new(0, 10),
        ];
        assert!(is_convex(&square));
        let dart = [
            Point2::new(0, 0),
            Point2::new(10, 0),
            Point2::new(3, 3),
            Point2::new(0, 10),
        ];
        assert!(!is_convex(&dart));
        assert!(!is_convex(&square[..2]));
    }

    #[test]
    fn corner_order_is_independent_of_input_order() {
        let quad = [
            Point2::new(102.0_f32, 48.0),
            Point2::new(311.0, 61.0),
            Point2::new(305.0, 130.0),
            Point2::new(97.0, 118.0),
        ];
        let expected = order_corners(&quad);
        assert_eq!(expected, quad);

        for shift in 0..4 {
            let mut rotated = quad;
            rotated.rotate_left(shift);
            assert_eq!(order_corners(&rotated), expected, "rotation {shift}");

            let mut mirrored = rotated;
            mirrored.reverse();
            assert_eq!(order_corners(&mirrored), expected, "mirror {shift}");
        }
    }

    #[test]
    fn quad_from_polygon_requires_four_vertices() {
        let tri = [Point2::new(0, 0), Point2::new(4, 0), Point2::new(0, 4)];
        assert!(Quad::from_polygon(&tri).is_none());
        let q = Quad::from_polygon(&[
            Point2::new(0, 0),
            Point2::new(0, 5),
            Point2::new(9, 5),
            Point2::new(9, 0),
        ])
        .expect("four vertices");
        assert_eq!(q.ordered()[0], Point2::new(0.0, 0.0));
        assert_eq!(q.ordered()[2], Point2::new(9.0, 5.0));
    }
}
