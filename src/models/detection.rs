//! 探知モデル
//!
//! 距離表による決定的探知と、レーダー方程式型の確率的探知を提供します。
//! 距離の境界は `distance <= range` で探知成立とします。

use serde::{Deserialize, Serialize};

use crate::models::common::{Domain, SizeClass, Skill};
use crate::models::traits::{Detector, Observable};
use crate::random::SimRng;
use crate::weather::{sea_state_attenuation, DEFAULT_SEA_STATE_ATTENUATION};

/// 大きさ区分ごとの探知距離 (km)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRanges {
    pub large: f64,
    pub medium: f64,
    pub small: f64,
    pub vsmall: f64,
    pub stealthy: f64,
}

impl SizeRanges {
    pub const fn new(large: f64, medium: f64, small: f64, vsmall: f64, stealthy: f64) -> Self {
        Self { large, medium, small, vsmall, stealthy }
    }

    pub fn get(&self, size: SizeClass) -> f64 {
        match size {
            SizeClass::Large => self.large,
            SizeClass::Medium => self.medium,
            SizeClass::Small => self.small,
            SizeClass::VerySmall => self.vsmall,
            SizeClass::Stealthy => self.stealthy,
        }
    }
}

/// 技能水準ごとの距離表
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeTable {
    pub basic: SizeRanges,
    pub advanced: SizeRanges,
}

impl RangeTable {
    pub fn range(&self, skill: Skill, size: SizeClass) -> f64 {
        match skill {
            Skill::Basic => self.basic.get(size),
            Skill::Advanced => self.advanced.get(size),
        }
    }
}

/// 探知方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Table,
    Radar,
}

/// レーダー方程式の定数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarSettings {
    pub k_basic: f64,
    pub k_advanced: f64,
    /// 高度係数
    pub height: f64,
    /// この距離を超える目標には試行しない (km)
    pub cutoff: f64,
    /// 大きさ区分ごとのレーダー断面積係数
    pub rcs: SizeRanges,
}

impl Default for RadarSettings {
    fn default() -> Self {
        Self {
            k_basic: 2747.0,
            k_advanced: 39633.0,
            height: 10.0,
            cutoff: 300.0,
            rcs: SizeRanges::new(1.5, 1.25, 1.0, 0.5, 0.25),
        }
    }
}

impl RadarSettings {
    pub fn k(&self, skill: Skill) -> f64 {
        match skill {
            Skill::Basic => self.k_basic,
            Skill::Advanced => self.k_advanced,
        }
    }
}

/// 対象区分ごとの最大センサー距離 (km)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxRanges {
    pub surface: f64,
    pub air: f64,
    pub subsurface: f64,
}

impl Default for MaxRanges {
    fn default() -> Self {
        Self {
            surface: 463.0,
            air: 463.0,
            subsurface: 185.0,
        }
    }
}

impl MaxRanges {
    pub fn get(&self, domain: Domain) -> f64 {
        match domain {
            Domain::Surface => self.surface,
            Domain::Air => self.air,
            Domain::Subsurface => self.subsurface,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// 水上目標の探知距離
    pub surface: RangeTable,
    /// 航空目標の探知距離
    pub air: RangeTable,
    /// 対潜戦システム搭載艦による潜水艦探知距離
    pub subsurface_aws: RangeTable,
    /// 対潜戦システムなしの潜水艦探知距離
    pub subsurface: RangeTable,
    pub radar: RadarSettings,
    /// 航空機による水上目標の探知方式
    pub air_vs_surface: DetectionMethod,
    pub max_range: MaxRanges,
    /// 海況ごとの減衰係数
    pub sea_state_attenuation: Vec<f64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            surface: RangeTable {
                advanced: SizeRanges::new(56.0, 56.0, 37.0, 20.0, 11.0),
                basic: SizeRanges::new(37.0, 37.0, 28.0, 17.0, 9.0),
            },
            air: RangeTable {
                advanced: SizeRanges::new(463.0, 320.0, 239.0, 102.0, 70.0),
                basic: SizeRanges::new(350.0, 244.0, 176.0, 70.0, 20.0),
            },
            subsurface_aws: RangeTable {
                advanced: SizeRanges::new(185.0, 74.0, 37.0, 18.5, 9.25),
                basic: SizeRanges::new(64.82, 25.928, 12.964, 6.482, 3.241),
            },
            subsurface: RangeTable {
                advanced: SizeRanges::new(0.0, 0.0, 0.0, 0.0, 0.0),
                basic: SizeRanges::new(39.818, 15.9272, 7.9636, 3.9818, 1.9909),
            },
            radar: RadarSettings::default(),
            air_vs_surface: DetectionMethod::Radar,
            max_range: MaxRanges::default(),
            sea_state_attenuation: DEFAULT_SEA_STATE_ATTENUATION.to_vec(),
        }
    }
}

/// 探知判定の結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionOutcome {
    Detected { distance: f64 },
    NotDetected,
    OutOfRange,
    Incapable,
}

impl DetectionOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, DetectionOutcome::Detected { .. })
    }
}

/// `1 - exp(-k·h·r·s / d³)`。距離0では1
pub fn radar_probability(k: f64, h: f64, r: f64, s: f64, distance: f64) -> f64 {
    if distance <= 0.0 {
        return 1.0;
    }
    (1.0 - (-(k * h * r * s) / distance.powi(3)).exp()).clamp(0.0, 1.0)
}

impl DetectionConfig {
    pub fn attenuation(&self, sea_state: u8) -> f64 {
        sea_state_attenuation(&self.sea_state_attenuation, sea_state)
    }

    fn method_for(&self, observer: Domain, target: Domain) -> DetectionMethod {
        match (observer, target) {
            (Domain::Air, Domain::Surface) => self.air_vs_surface,
            _ => DetectionMethod::Table,
        }
    }

    /// 距離表による探知距離（海況減衰前）
    pub fn table_range(&self, skill: Skill, size: SizeClass, target: Domain, aws: bool) -> f64 {
        let table = match target {
            Domain::Surface => &self.surface,
            Domain::Air => &self.air,
            Domain::Subsurface if aws => &self.subsurface_aws,
            Domain::Subsurface => &self.subsurface,
        };
        table.range(skill, size)
    }

    /// 観測者が目標を探知するかを判定
    ///
    /// 最大センサー距離とレーダー打ち切り距離を超える目標は試行しません。
    pub fn detect<D: Detector, O: Observable>(
        &self,
        observer: &D,
        target: &O,
        sea_state: u8,
        rng: &mut SimRng,
    ) -> DetectionOutcome {
        let domain = target.target_domain();
        let Some(skill) = observer.detection_skill(domain) else {
            return DetectionOutcome::Incapable;
        };

        let distance = observer.sensor_position().distance_to(&target.position());
        if distance > self.max_range.get(domain) {
            return DetectionOutcome::OutOfRange;
        }

        let s = self.attenuation(sea_state);
        match self.method_for(observer.platform_domain(), domain) {
            DetectionMethod::Table => {
                let range = self.table_range(skill, target.size_class(), domain, observer.has_aws()) * s;
                if distance <= range {
                    DetectionOutcome::Detected { distance }
                } else {
                    DetectionOutcome::OutOfRange
                }
            }
            DetectionMethod::Radar => {
                if distance > self.radar.cutoff {
                    return DetectionOutcome::OutOfRange;
                }
                let p = radar_probability(
                    self.radar.k(skill),
                    self.radar.height,
                    self.radar.rcs.get(target.size_class()),
                    s,
                    distance,
                );
                if rng.chance(p) {
                    DetectionOutcome::Detected { distance }
                } else {
                    DetectionOutcome::NotDetected
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, LATITUDE_CONVERSION_FACTOR};

    struct Sensor {
        at: Point,
        domain: Domain,
        skill: Option<Skill>,
        aws: bool,
    }

    impl Detector for Sensor {
        fn detection_skill(&self, _domain: Domain) -> Option<Skill> {
            self.skill
        }
        fn platform_domain(&self) -> Domain {
            self.domain
        }
        fn has_aws(&self) -> bool {
            self.aws
        }
        fn sensor_position(&self) -> Point {
            self.at
        }
    }

    struct Contact {
        at: Point,
        domain: Domain,
        size: SizeClass,
    }

    impl Observable for Contact {
        fn target_domain(&self) -> Domain {
            self.domain
        }
        fn size_class(&self) -> SizeClass {
            self.size
        }
        fn position(&self) -> Point {
            self.at
        }
    }

    /// 真北へ km だけ離れた地点
    fn north_of(origin: Point, km: f64) -> Point {
        Point::new(origin.x, origin.y + km / LATITUDE_CONVERSION_FACTOR)
    }

    fn ship(skill: Skill) -> Sensor {
        Sensor {
            at: Point::new(121.0, 23.0),
            domain: Domain::Surface,
            skill: Some(skill),
            aws: false,
        }
    }

    #[test]
    fn test_radar_probability_reference_value() {
        let p = radar_probability(2747.0, 10.0, 1.0, 0.4, 50.0);
        let expected = 1.0 - (-(2747.0 * 10.0 * 1.0 * 0.4) / 125_000.0f64).exp();
        assert!((p - expected).abs() < 1e-15);
        assert!((p - 0.084151).abs() < 1e-5);
        assert_eq!(radar_probability(2747.0, 10.0, 1.0, 0.4, 0.0), 1.0);
    }

    #[test]
    fn test_radar_detection_is_reproducible_with_seed() {
        let config = DetectionConfig::default();
        let observer = Sensor {
            at: Point::new(121.0, 23.0),
            domain: Domain::Air,
            skill: Some(Skill::Basic),
            aws: false,
        };
        let target = Contact {
            at: north_of(observer.at, 50.0),
            domain: Domain::Surface,
            size: SizeClass::Small,
        };
        let run = |seed| {
            let mut rng = SimRng::new(seed);
            (0..200)
                .map(|_| config.detect(&observer, &target, 4, &mut rng).is_detected())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(17), run(17));
        assert!(run(17).iter().any(|d| *d));
    }

    #[test]
    fn test_radar_is_not_attempted_beyond_cutoff() {
        let mut config = DetectionConfig::default();
        config.max_range.surface = 1000.0;
        let observer = Sensor {
            at: Point::new(121.0, 20.0),
            domain: Domain::Air,
            skill: Some(Skill::Advanced),
            aws: false,
        };
        let target = Contact {
            at: north_of(observer.at, 301.0),
            domain: Domain::Surface,
            size: SizeClass::Large,
        };
        let mut rng = SimRng::new(1);
        for _ in 0..20 {
            assert_eq!(config.detect(&observer, &target, 0, &mut rng), DetectionOutcome::OutOfRange);
        }
    }

    #[test]
    fn test_table_boundary_is_inclusive() {
        let config = DetectionConfig::default();
        let observer = ship(Skill::Basic);
        let mut rng = SimRng::new(1);
        // 海況0で基本技能・中型水上目標の探知距離は 37 km
        let range = config.table_range(Skill::Basic, SizeClass::Medium, Domain::Surface, false);
        assert_eq!(range, 37.0);

        let at_boundary = Contact {
            at: north_of(observer.at, range),
            domain: Domain::Surface,
            size: SizeClass::Medium,
        };
        let distance = observer.at.distance_to(&at_boundary.at);
        assert!((distance - range).abs() < 1e-9);
        let inside = Contact {
            at: north_of(observer.at, range - 1e-6),
            ..at_boundary
        };
        let outside = Contact {
            at: north_of(observer.at, range + 1e-6),
            ..inside
        };
        assert!(config.detect(&observer, &inside, 0, &mut rng).is_detected());
        assert!(!config.detect(&observer, &outside, 0, &mut rng).is_detected());
    }

    #[test]
    fn test_sea_state_shrinks_table_range() {
        let config = DetectionConfig::default();
        let observer = ship(Skill::Advanced);
        let target = Contact {
            at: north_of(observer.at, 50.0),
            domain: Domain::Surface,
            size: SizeClass::Large,
        };
        let mut rng = SimRng::new(1);
        assert!(config.detect(&observer, &target, 0, &mut rng).is_detected());
        // 56 * 0.77 = 43.12 km < 50 km
        assert!(!config.detect(&observer, &target, 2, &mut rng).is_detected());
    }

    #[test]
    fn test_incapable_and_aws_tables() {
        let config = DetectionConfig::default();
        let blind = Sensor { skill: None, ..ship(Skill::Basic) };
        let sub = Contact {
            at: north_of(blind.at, 30.0),
            domain: Domain::Subsurface,
            size: SizeClass::Large,
        };
        let mut rng = SimRng::new(1);
        assert_eq!(config.detect(&blind, &sub, 0, &mut rng), DetectionOutcome::Incapable);

        let advanced_without_aws = ship(Skill::Advanced);
        assert!(!config.detect(&advanced_without_aws, &sub, 0, &mut rng).is_detected());
        let advanced_with_aws = Sensor { aws: true, ..ship(Skill::Advanced) };
        assert!(config.detect(&advanced_with_aws, &sub, 0, &mut rng).is_detected());
    }
}
