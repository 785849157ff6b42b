//! 幾何プリミティブ
//!
//! 点・多角形と、可視性判定に使う線分交差テストを提供します。

pub mod point;
pub mod polygon;

pub use point::{Point, LATITUDE_CONVERSION_FACTOR, LONGITUDE_CONVERSION_FACTOR};
pub use polygon::{Bounds, Polygon, SHRINK_DISTANCE};

/// 幾何判定の許容誤差
pub const EPSILON: f64 = 1e-12;

/// 3点の向き: 正なら反時計回り、負なら時計回り、0なら同一直線上
fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    (*b - *a).cross(&(*c - *a))
}

/// 同一直線上の点 p が線分 a-b の範囲内にあるか
fn within_segment_box(a: &Point, b: &Point, p: &Point) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// 点 p が線分 a-b 上にあるか（端点を含む）
pub fn point_on_segment(a: &Point, b: &Point, p: &Point) -> bool {
    orientation(a, b, p).abs() <= EPSILON * (1.0 + (*b - *a).length()) && within_segment_box(a, b, p)
}

/// 線分 p1-p2 と p3-p4 が交差または接触するか
pub fn segments_intersect(p1: &Point, p2: &Point, p3: &Point, p4: &Point) -> bool {
    let d1 = orientation(p3, p4, p1);
    let d2 = orientation(p3, p4, p2);
    let d3 = orientation(p1, p2, p3);
    let d4 = orientation(p1, p2, p4);

    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }

    (d1.abs() <= EPSILON && within_segment_box(p3, p4, p1))
        || (d2.abs() <= EPSILON && within_segment_box(p3, p4, p2))
        || (d3.abs() <= EPSILON && within_segment_box(p1, p2, p3))
        || (d4.abs() <= EPSILON && within_segment_box(p1, p2, p4))
}

/// 線分 a-b 上で p に最も近い点
pub fn closest_point_on_segment(a: &Point, b: &Point, p: &Point) -> Point {
    let ab = *b - *a;
    let len_sq = ab.dot(&ab);
    if len_sq <= EPSILON {
        return *a;
    }
    let t = ((*p - *a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a.lerp(b, t)
}

/// 閉じたリングに対する内外判定（レイキャスト、境界上は含む）
pub fn ring_contains(ring: &[Point], p: &Point) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&ring[i], &ring[j]);
        if point_on_segment(a, b, p) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// 線分がリング（内部を含む）と交わるか
pub fn segment_intersects_ring(ring: &[Point], a: &Point, b: &Point) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let j = (i + 1) % n;
        if segments_intersect(a, b, &ring[i], &ring[j]) {
            return true;
        }
    }
    // 完全に内部に収まる線分
    ring_contains(ring, a) || ring_contains(ring, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]
    }

    #[test]
    fn test_segments_intersect_crossing_and_touching() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(2.0, 2.0);
        assert!(segments_intersect(&a, &b, &Point::new(0.0, 2.0), &Point::new(2.0, 0.0)));
        // 端点での接触
        assert!(segments_intersect(&a, &b, &Point::new(2.0, 2.0), &Point::new(3.0, 0.0)));
        // 平行で離れている
        assert!(!segments_intersect(&a, &b, &Point::new(1.0, 0.0), &Point::new(3.0, 2.0)));
        // 同一直線上で重ならない
        assert!(!segments_intersect(&a, &Point::new(1.0, 1.0), &Point::new(1.5, 1.5), &b));
    }

    #[test]
    fn test_ring_contains_is_boundary_inclusive() {
        let ring = square();
        assert!(ring_contains(&ring, &Point::new(1.0, 1.0)));
        assert!(ring_contains(&ring, &Point::new(0.0, 1.0)));
        assert!(ring_contains(&ring, &Point::new(2.0, 2.0)));
        assert!(!ring_contains(&ring, &Point::new(2.0001, 1.0)));
    }

    #[test]
    fn test_segment_inside_ring_counts_as_intersection() {
        let ring = square();
        assert!(segment_intersects_ring(&ring, &Point::new(0.5, 0.5), &Point::new(1.5, 1.5)));
        assert!(!segment_intersects_ring(&ring, &Point::new(3.0, 0.0), &Point::new(3.0, 3.0)));
    }

    #[test]
    fn test_closest_point_on_segment_clamps() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(2.0, 0.0);
        assert_eq!(closest_point_on_segment(&a, &b, &Point::new(1.0, 5.0)), Point::new(1.0, 0.0));
        assert_eq!(closest_point_on_segment(&a, &b, &Point::new(-3.0, 1.0)), a);
    }
}
