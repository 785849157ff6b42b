use serde::{Deserialize, Serialize};

use super::{closest_point_on_segment, ring_contains, segment_intersects_ring, Point, EPSILON};
use crate::error::{SimError, SimResult};

/// 可視性判定用に多角形を内側へ縮小する距離（度）
pub const SHRINK_DISTANCE: f64 = 0.01;

/// 縮小時の頂点移動量の上限（縮小距離に対する倍率）
const MAX_MITER_RATIO: f64 = 10.0;

/// 軸平行な外接矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self { min_x, max_x, min_y, max_y }
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut bounds = Self::new(f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for p in points {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        bounds
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.min_x - margin,
            self.max_x + margin,
            self.min_y - margin,
            self.max_y + margin,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// 閉じた多角形
///
/// 連続する重複点を持たず、外接矩形と内側に縮小したリングをキャッシュします。
/// 構築後は [`Polygon::clamp_to_bounds`] を除き変更されません。
#[derive(Debug, Clone)]
pub struct Polygon {
    pub name: String,
    points: Vec<Point>,
    bounds: Bounds,
    shrunk: Vec<Point>,
}

impl Polygon {
    pub fn new(name: impl Into<String>, points: Vec<Point>) -> SimResult<Self> {
        let name = name.into();
        let points = dedup_ring(points);
        if points.len() < 3 {
            return Err(SimError::Config(format!(
                "多角形 '{}' の頂点数が不足しています ({})",
                name,
                points.len()
            )));
        }
        let bounds = Bounds::from_points(&points);
        let shrunk = shrink_ring(&points, SHRINK_DISTANCE);
        Ok(Self { name, points, bounds, shrunk })
    }

    /// 軸平行な矩形多角形
    pub fn rectangle(name: impl Into<String>, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> SimResult<Self> {
        Self::new(
            name,
            vec![
                Point::new(min_x, min_y),
                Point::new(max_x, min_y),
                Point::new(max_x, max_y),
                Point::new(min_x, max_y),
            ],
        )
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn shrunk(&self) -> &[Point] {
        &self.shrunk
    }

    /// 境界を含む内外判定
    pub fn contains(&self, p: &Point) -> bool {
        self.bounds.contains(p) && ring_contains(&self.points, p)
    }

    /// 線分が縮小リング（内部を含む）と交わるか
    pub fn blocks_segment(&self, a: &Point, b: &Point) -> bool {
        let segment_bounds = Bounds::from_points(&[*a, *b]);
        if !segment_bounds.overlaps(&self.bounds) {
            return false;
        }
        segment_intersects_ring(&self.shrunk, a, b)
    }

    /// 他の多角形の頂点がひとつでも内部にあるか
    pub fn overlaps(&self, other: &Polygon) -> bool {
        if !self.bounds.overlaps(&other.bounds) {
            return false;
        }
        other.points.iter().any(|p| self.contains(p)) || self.points.iter().any(|p| other.contains(p))
    }

    /// 境界上で p に最も近い点
    pub fn nearest_boundary_point(&self, p: &Point) -> Point {
        let n = self.points.len();
        let mut best = self.points[0];
        let mut best_distance = f64::INFINITY;
        for i in 0..n {
            let candidate = closest_point_on_segment(&self.points[i], &self.points[(i + 1) % n], p);
            let distance = candidate.planar_distance(p);
            if distance < best_distance {
                best_distance = distance;
                best = candidate;
            }
        }
        best
    }

    /// 内部の点を最寄りの境界のわずか外側へ移す
    pub fn snap_outside(&self, p: &Point) -> Point {
        let boundary = self.nearest_boundary_point(p);
        let outward = (boundary - *p).normalize();
        if outward.length() <= EPSILON {
            return boundary;
        }
        boundary + outward * SHRINK_DISTANCE
    }

    /// 頂点を領域境界から margin 内側へ収め、重複点を除去して再計算
    pub fn clamp_to_bounds(&mut self, area: &Bounds, margin: f64) -> SimResult<()> {
        let clamped: Vec<Point> = self
            .points
            .iter()
            .map(|p| {
                Point::new(
                    p.x.clamp(area.min_x + margin, area.max_x - margin),
                    p.y.clamp(area.min_y + margin, area.max_y - margin),
                )
            })
            .collect();
        *self = Polygon::new(self.name.clone(), clamped)?;
        Ok(())
    }

    /// 符号付き面積（反時計回りで正）
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points)
    }
}

fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].cross(&points[(i + 1) % n]))
        .sum::<f64>()
        / 2.0
}

/// 連続重複点と閉じ点を除去
fn dedup_ring(mut points: Vec<Point>) -> Vec<Point> {
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// 各辺を内側へ distance だけ平行移動し、隣接辺のオフセット直線の交点を新しい頂点とする
fn shrink_ring(points: &[Point], distance: f64) -> Vec<Point> {
    let n = points.len();
    let orientation = if signed_area(points) >= 0.0 { 1.0 } else { -1.0 };

    let inward_normal = |a: &Point, b: &Point| -> Point {
        let d = (*b - *a).normalize();
        Point::new(-d.y, d.x) * orientation
    };

    (0..n)
        .map(|i| {
            let prev = points[(i + n - 1) % n];
            let curr = points[i];
            let next = points[(i + 1) % n];

            let n1 = inward_normal(&prev, &curr);
            let n2 = inward_normal(&curr, &next);

            // オフセット直線 L1: prev' + t * d1, L2: curr'' + s * d2
            let p1 = prev + n1 * distance;
            let d1 = curr - prev;
            let p2 = curr + n2 * distance;
            let d2 = next - curr;

            let denom = d1.cross(&d2);
            let fallback = curr + (n1 + n2).normalize() * distance;
            if denom.abs() <= EPSILON {
                return curr + n1 * distance;
            }
            let t = (p2 - p1).cross(&d2) / denom;
            let candidate = p1 + d1 * t;
            if candidate.planar_distance(&curr) > distance * MAX_MITER_RATIO {
                fallback
            } else {
                candidate
            }
        })
        .collect()
}
