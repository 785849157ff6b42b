//! # Zones モジュール
//!
//! 交戦規定の評価単位となる名前付き地理ゾーンを管理します。
//!
//! ゾーンは優先順（最も限定的なものが先頭、全域を覆うものが末尾）に並べられ、
//! 地点の所属ゾーンは「その地点を含む最初のゾーン」で決まります。
//! 各ゾーンは障害物（重なる陸地）を避けた哨戒点集合を起動時に一度だけ生成します。

use std::f64::consts::{SQRT_2, TAU};
use tracing::{debug, info};

use crate::error::{SimError, SimResult};
use crate::geometry::{Bounds, Point, Polygon};
use crate::random::SimRng;
use crate::scenario::ZoneConfig;

/// 哨戒点サンプリングの候補生成回数（Bridson法）
const POISSON_DISK_ATTEMPTS: usize = 30;

/// カバレッジ検証の格子間隔（度）
const COVERAGE_STEP: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub polygon: Polygon,
    /// ゾーンと重なる陸地
    pub obstacles: Vec<Polygon>,
    pub patrol_locations: Vec<Point>,
    /// 待機（ホールディング）ゾーンかどうか
    pub holding: bool,
}

impl Zone {
    pub fn contains(&self, point: &Point) -> bool {
        self.polygon.contains(point)
    }

    pub fn sample_patrol_location(&self, rng: &mut SimRng) -> Option<Point> {
        rng.choose(&self.patrol_locations).copied()
    }

    /// 指定多角形内の哨戒点を除去
    pub fn clear_patrol_in(&mut self, polygon: &Polygon) {
        self.patrol_locations.retain(|p| !polygon.contains(p));
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// 優先順に並んだゾーン集合
#[derive(Debug, Clone)]
pub struct ZoneSet {
    zones: Vec<Zone>,
    area: Bounds,
}

impl ZoneSet {
    /// 設定からゾーン集合を構築し、哨戒点の生成・切り抜き・カバレッジ検証を行う
    pub fn build(
        configs: &[ZoneConfig],
        landmasses: &[Polygon],
        area: Bounds,
        spacing: f64,
        rng: &mut SimRng,
    ) -> SimResult<Self> {
        let mut zones = Vec::with_capacity(configs.len());
        for config in configs {
            let points = config.points.iter().map(|[x, y]| Point::new(*x, *y)).collect();
            let mut polygon = Polygon::new(config.id.clone(), points)?;
            polygon.clamp_to_bounds(&area, 0.0)?;

            let obstacles: Vec<Polygon> = landmasses
                .iter()
                .filter(|landmass| polygon.overlaps(landmass))
                .cloned()
                .collect();
            let patrol_locations = poisson_disk_sample(&polygon, &obstacles, spacing, rng);

            debug!(
                zone = %config.id,
                obstacles = obstacles.len(),
                patrol_locations = patrol_locations.len(),
                "ZONE_BUILT: ゾーンを構築しました"
            );

            zones.push(Zone {
                id: config.id.clone(),
                name: config.name.clone().unwrap_or_else(|| config.id.clone()),
                polygon,
                obstacles,
                patrol_locations,
                holding: config.holding,
            });
        }

        let mut set = Self { zones, area };
        set.apply_carve_outs(configs)?;
        set.validate_coverage()?;

        info!(
            zones = set.zones.len(),
            patrol_locations = set.zones.iter().map(|z| z.patrol_locations.len()).sum::<usize>(),
            "ZONES_READY: ゾーン集合を構築しました"
        );
        Ok(set)
    }

    fn apply_carve_outs(&mut self, configs: &[ZoneConfig]) -> SimResult<()> {
        for config in configs {
            for nested in &config.carve_out {
                let polygon = self
                    .get(nested)
                    .map(|z| z.polygon.clone())
                    .ok_or_else(|| SimError::Config(format!("切り抜き対象のゾーン '{}' が未定義です", nested)))?;
                if let Some(zone) = self.zones.iter_mut().find(|z| z.id == config.id) {
                    zone.clear_patrol_in(&polygon);
                }
            }
        }
        Ok(())
    }

    /// 作戦領域内の格子点がすべていずれかのゾーンに属することを検証
    pub fn validate_coverage(&self) -> SimResult<()> {
        let nx = (self.area.width() / COVERAGE_STEP).ceil() as usize;
        let ny = (self.area.height() / COVERAGE_STEP).ceil() as usize;
        for i in 0..=nx {
            for j in 0..=ny {
                let p = Point::new(
                    (self.area.min_x + i as f64 * COVERAGE_STEP).min(self.area.max_x),
                    (self.area.min_y + j as f64 * COVERAGE_STEP).min(self.area.max_y),
                );
                self.zone_of(&p)?;
            }
        }
        Ok(())
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn area(&self) -> &Bounds {
        &self.area
    }

    pub fn get(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|z| z.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.id == id)
    }

    /// 地点を含む最優先ゾーン
    pub fn current_zone(&self, point: &Point) -> Option<&Zone> {
        self.zones.iter().find(|z| z.contains(point))
    }

    /// 地点の所属ゾーン。どのゾーンにも属さなければ設定不備としてエラー
    pub fn zone_of(&self, point: &Point) -> SimResult<&Zone> {
        self.current_zone(point)
            .ok_or(SimError::NoZone { x: point.x, y: point.y })
    }

    pub fn holding_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| z.holding)
    }
}

/// 障害物を避けた Poisson-disk サンプリング（Bridson法）
///
/// 多角形の外接矩形で点を生成し、多角形内かつどの障害物にも含まれない点だけを残します。
/// 点間距離は座標平面上で `radius` 以上です。
pub fn poisson_disk_sample(polygon: &Polygon, obstacles: &[Polygon], radius: f64, rng: &mut SimRng) -> Vec<Point> {
    let bounds = *polygon.bounds();
    if radius <= 0.0 || bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Vec::new();
    }

    let cell = radius / SQRT_2;
    let cols = (bounds.width() / cell).ceil() as usize + 1;
    let rows = (bounds.height() / cell).ceil() as usize + 1;
    let mut grid: Vec<Option<usize>> = vec![None; cols * rows];
    let cell_of = |p: &Point| -> (usize, usize) {
        (
            (((p.x - bounds.min_x) / cell) as usize).min(cols - 1),
            (((p.y - bounds.min_y) / cell) as usize).min(rows - 1),
        )
    };

    let mut samples: Vec<Point> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    let first = Point::new(
        rng.range(bounds.min_x, bounds.max_x),
        rng.range(bounds.min_y, bounds.max_y),
    );
    let (cx, cy) = cell_of(&first);
    grid[cy * cols + cx] = Some(0);
    samples.push(first);
    active.push(0);

    while let Some(slot) = rng.index(active.len()) {
        let base = samples[active[slot]];
        let mut accepted = false;

        for _ in 0..POISSON_DISK_ATTEMPTS {
            let angle = rng.range(0.0, TAU);
            let distance = rng.range(radius, 2.0 * radius);
            let candidate = base + Point::new(angle.cos(), angle.sin()) * distance;
            if !bounds.contains(&candidate) {
                continue;
            }

            let (gx, gy) = cell_of(&candidate);
            let far_enough = (gy.saturating_sub(2)..=(gy + 2).min(rows - 1)).all(|y| {
                (gx.saturating_sub(2)..=(gx + 2).min(cols - 1)).all(|x| match grid[y * cols + x] {
                    Some(i) => samples[i].planar_distance(&candidate) >= radius,
                    None => true,
                })
            });
            if far_enough {
                grid[gy * cols + gx] = Some(samples.len());
                active.push(samples.len());
                samples.push(candidate);
                accepted = true;
                break;
            }
        }

        if !accepted {
            active.swap_remove(slot);
        }
    }

    samples
        .into_iter()
        .filter(|p| polygon.contains(p) && !obstacles.iter().any(|o| o.contains(p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_zone(id: &str, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> ZoneConfig {
        ZoneConfig {
            id: id.to_string(),
            name: None,
            points: vec![[min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y]],
            holding: false,
            carve_out: Vec::new(),
        }
    }

    fn nested_configs() -> Vec<ZoneConfig> {
        let mut outer = rect_zone("B", 2.0, 2.0, 8.0, 8.0);
        outer.carve_out = vec!["C".to_string()];
        let mut all = rect_zone("A", 0.0, 0.0, 10.0, 10.0);
        all.carve_out = vec!["B".to_string(), "C".to_string()];
        vec![rect_zone("C", 4.0, 4.0, 6.0, 6.0), outer, all]
    }

    fn build(configs: &[ZoneConfig], landmasses: &[Polygon]) -> ZoneSet {
        let mut rng = SimRng::new(11);
        ZoneSet::build(configs, landmasses, Bounds::new(0.0, 10.0, 0.0, 10.0), 0.5, &mut rng).unwrap()
    }

    #[test]
    fn test_current_zone_is_most_specific() {
        let zones = build(&nested_configs(), &[]);
        let mut rng = SimRng::new(3);
        for _ in 0..500 {
            let p = Point::new(rng.range(0.0, 10.0), rng.range(0.0, 10.0));
            let current = zones.current_zone(&p).unwrap();
            let expected = zones.zones().iter().position(|z| z.contains(&p)).unwrap();
            assert_eq!(zones.index_of(&current.id), Some(expected));
        }
        assert_eq!(zones.zone_of(&Point::new(5.0, 5.0)).unwrap().id, "C");
        assert_eq!(zones.zone_of(&Point::new(3.0, 3.0)).unwrap().id, "B");
        assert_eq!(zones.zone_of(&Point::new(9.0, 1.0)).unwrap().id, "A");
    }

    #[test]
    fn test_missing_coverage_is_config_error() {
        let configs = vec![rect_zone("C", 4.0, 4.0, 6.0, 6.0)];
        let mut rng = SimRng::new(1);
        let result = ZoneSet::build(&configs, &[], Bounds::new(0.0, 10.0, 0.0, 10.0), 0.5, &mut rng);
        assert!(matches!(result, Err(SimError::NoZone { .. })));
    }

    #[test]
    fn test_patrol_points_respect_spacing_and_obstacles() {
        let island = Polygon::rectangle("island", 1.0, 1.0, 3.0, 3.0).unwrap();
        let zones = build(&nested_configs(), std::slice::from_ref(&island));
        let all = zones.get("A").unwrap();
        assert_eq!(all.obstacles.len(), 1);
        assert!(!all.patrol_locations.is_empty());
        for (i, a) in all.patrol_locations.iter().enumerate() {
            assert!(!island.contains(a));
            for b in &all.patrol_locations[i + 1..] {
                assert!(a.planar_distance(b) >= 0.5 - 1e-9);
            }
        }
    }

    #[test]
    fn test_carve_out_removes_nested_patrol_points() {
        let zones = build(&nested_configs(), &[]);
        let inner = zones.get("C").unwrap().polygon.clone();
        let middle = zones.get("B").unwrap().polygon.clone();
        assert!(zones.get("B").unwrap().patrol_locations.iter().all(|p| !inner.contains(p)));
        assert!(zones.get("A").unwrap().patrol_locations.iter().all(|p| !middle.contains(p)));
        assert!(!zones.get("C").unwrap().patrol_locations.is_empty());
    }

    #[test]
    fn test_unknown_carve_out_is_rejected() {
        let mut configs = nested_configs();
        configs[2].carve_out.push("Z".to_string());
        let mut rng = SimRng::new(1);
        let result = ZoneSet::build(&configs, &[], Bounds::new(0.0, 10.0, 0.0, 10.0), 0.5, &mut rng);
        assert!(matches!(result, Err(SimError::Config(_))));
    }
}
