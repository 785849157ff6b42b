//! # Simulation モジュール
//!
//! 海峡シミュレーションの中核となるシミュレーションエンジンを提供します。
//!
//! [`SimulationEngine`] はワールド（地理・受容体格子・エージェント・ミッション・
//! マネージャ・乱数・イベント記録）を所有し、固定時間刻みでターンを進めます。
//! エージェントやミッションの処理はすべてこのコンテキストを明示的に受け取ります。
//!
//! ## 1ターンの処理順序
//!
//! 1. **海況更新**: 更新間隔ごとにマルコフ遷移で各セルの海況を再サンプル
//! 2. **商船到着**: 商船種別ごとにポアソン到着数を抽選して出現
//! 3. **マネージャ処理**（マネージャ順）
//!    1. 基地整備の進行と完了
//!    2. 移動量の設定
//!    3. 活動率に基づく出撃
//!    4. 航続距離による帰投判定（並列）
//!    5. 哨戒中エージェントの探知（並列）
//!    6. 支援要請キューの処理
//!    7. その他のミッションの実行（逐次）
//! 4. **フェロモン減衰**
//!
//! ## 使用例
//!
//! ```rust,no_run
//! use straitsim::scenario::ScenarioConfig;
//! use straitsim::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/strait.yaml")?;
//! let mut engine = SimulationEngine::from_scenario(&config)?;
//! engine.run()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod engagement;
mod missions;
mod rules;
mod turn;

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{SimError, SimResult};
use crate::geometry::{Bounds, Point, Polygon};
use crate::models::*;
use crate::random::SimRng;
use crate::receptors::ReceptorGrid;
use crate::routing::{MovementDomain, Router};
use crate::scenario::*;
use crate::weather::{update_sea_states, SeaStateSampler};
use crate::zones::ZoneSet;

/// 経路レイヤを構築する（陣営, 移動領域）の組
const ROUTING_LAYERS: [(Side, MovementDomain); 5] = [
    (Side::Coalition, MovementDomain::Surface),
    (Side::Coalition, MovementDomain::Air),
    (Side::Hunter, MovementDomain::Surface),
    (Side::Hunter, MovementDomain::Air),
    (Side::Neutral, MovementDomain::Surface),
];

/// 起動後に変化しない地理情報
#[derive(Debug)]
pub struct Geography {
    pub landmasses: Vec<Polygon>,
    pub zones: ZoneSet,
    pub router: Router,
}

/// 商船交通の設定と担当マネージャ
#[derive(Debug, Clone)]
pub struct MerchantTraffic {
    pub config: MerchantConfig,
    pub manager: usize,
}

pub struct SimulationEngine {
    pub time: f64,
    pub step_count: u64,
    pub settings: SimulationConfig,

    rng: SimRng,
    ids: IdGenerator,

    pub geography: Arc<Geography>,
    pub grid: ReceptorGrid,
    weather: Box<dyn SeaStateSampler>,
    next_weather_update: f64,
    initial_sea_state: u8,

    pub agents: Vec<Agent>,
    pub missions: MissionArena,
    pub managers: Vec<Manager>,

    pub rules: RulesConfig,
    pub detection: DetectionConfig,
    pub engagement: EngagementConfig,
    pub boarding: BoardingSettings,
    pub merchants: Option<MerchantTraffic>,
    pub escalation: EscalationConfig,

    pub events: EventLog,
}

impl SimulationEngine {
    /// シナリオ設定からワールドを構築
    ///
    /// ゾーンのカバレッジ不備や未定義モデル参照などの設定エラーはここで失敗します。
    pub fn from_scenario(config: &ScenarioConfig) -> SimResult<Self> {
        let mut rng = SimRng::new(config.sim.seed);
        let a = &config.world.area;
        let area = Bounds::new(a.min_x, a.max_x, a.min_y, a.max_y);

        let landmasses = config
            .landmasses
            .iter()
            .map(|l| Polygon::new(l.name.clone(), to_points(&l.points)))
            .collect::<SimResult<Vec<_>>>()?;

        let zones = ZoneSet::build(&config.zones, &landmasses, area, config.sim.patrol_spacing, &mut rng)?;

        let mut router = Router::new(landmasses.clone());
        for (side, domain) in ROUTING_LAYERS {
            let mut obstacles = landmasses.clone();
            let avoid = config
                .routing
                .iter()
                .filter(|l| l.side == side && l.domain == domain)
                .flat_map(|l| l.avoid_zones.iter());
            for zone_id in avoid {
                let zone = zones
                    .get(zone_id)
                    .ok_or_else(|| SimError::Config(format!("経路レイヤが未定義のゾーンを参照: {}", zone_id)))?;
                obstacles.push(zone.polygon.clone());
            }
            router.add_layer(side, domain, obstacles);
        }

        let grid = ReceptorGrid::new(
            area,
            config.world.grid_cell,
            config.world.grid_padding,
            &landmasses,
            config.world.pheromones,
            config.world.initial_sea_state,
        )?;

        let mut ids = IdGenerator::new();
        let mut agents = Vec::new();
        let mut managers = Vec::with_capacity(config.managers.len() + 1);

        for (index, manager_config) in config.managers.iter().enumerate() {
            let mut manager = Manager::new(
                index,
                manager_config.name.clone(),
                manager_config.side,
                ManagerKind::Fleet,
                manager_config.utilisation,
            );
            manager.bases = to_bases(&manager_config.bases);
            manager.munitions = manager_config.ammunition.clone();

            for fleet in &manager_config.fleets {
                let model = config
                    .models
                    .get(&fleet.model)
                    .ok_or_else(|| SimError::Config(format!("未定義のモデル: {}", fleet.model)))?;
                for n in 0..fleet.count {
                    let base = match &fleet.base {
                        Some(name) => manager.base_named(name),
                        None => manager.sample_base(&mut rng),
                    }
                    .ok_or_else(|| SimError::Config(format!("{} の基地を決定できません", manager.name)))?;

                    let id = ids.next_agent();
                    let mut agent = Agent::from_model(
                        id,
                        index,
                        manager.side,
                        &fleet.model,
                        model,
                        &base.name,
                        base.location,
                    );
                    agent.status = if n < fleet.reserve {
                        AgentStatus::Reserved
                    } else {
                        AgentStatus::Inactive
                    };
                    manager.place(id, agent.status);
                    agents.push(agent);
                }
            }
            managers.push(manager);
        }

        let merchants = config.merchants.as_ref().map(|merchant_config| {
            let index = managers.len();
            let mut manager = Manager::new(index, "Merchants", Side::Neutral, ManagerKind::Merchant, 0.0);
            manager.bases = to_bases(&merchant_config.bases);
            managers.push(manager);
            MerchantTraffic {
                config: merchant_config.clone(),
                manager: index,
            }
        });

        info!(
            agents = agents.len(),
            managers = managers.len(),
            zones = zones.zones().len(),
            landmasses = landmasses.len(),
            "SIMULATION_READY: ワールドを構築しました"
        );

        Ok(Self {
            time: 0.0,
            step_count: 0,
            settings: config.sim.clone(),
            rng,
            ids,
            geography: Arc::new(Geography {
                landmasses,
                zones,
                router,
            }),
            grid,
            weather: config.world.weather.sampler(),
            next_weather_update: config.sim.weather_update_h,
            initial_sea_state: config.world.initial_sea_state,
            agents,
            missions: MissionArena::new(),
            managers,
            rules: config.rules.clone(),
            detection: config.detection.clone(),
            engagement: config.engagement.clone(),
            boarding: config.boarding.clone(),
            merchants,
            escalation: config.escalation,
            events: EventLog::new(),
        })
    }

    pub fn dt(&self) -> f64 {
        self.settings.dt_h
    }

    pub fn max_time(&self) -> f64 {
        self.settings.t_max_h
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.settings.t_max_h
    }

    pub fn agent(&self, id: AgentId) -> SimResult<&Agent> {
        self.agents.get(id.0).ok_or(SimError::UnknownAgent(id))
    }

    pub fn agent_mut(&mut self, id: AgentId) -> SimResult<&mut Agent> {
        self.agents.get_mut(id.0).ok_or(SimError::UnknownAgent(id))
    }

    pub fn mission_of(&self, id: AgentId) -> Option<&Mission> {
        self.agents.get(id.0).and_then(|a| self.missions.of(a))
    }

    pub fn mission_kind_of(&self, id: AgentId) -> Option<MissionKind> {
        self.mission_of(id).map(|m| m.kind)
    }

    /// 最大時間まで実行
    pub fn run(&mut self) -> SimResult<()> {
        info!(max_time = self.settings.t_max_h, dt = self.settings.dt_h, "SIMULATION_START: シミュレーション実行開始");

        while !self.is_finished() {
            self.step()?;

            if self.step_count % 100 == 0 {
                let progress = (self.time / self.settings.t_max_h) * 100.0;
                info!(
                    progress = format!("{:.1}%", progress),
                    time = self.time,
                    step = self.step_count,
                    "SIMULATION_PROGRESS: 進行状況"
                );
            }
        }

        info!(
            time = self.time,
            steps = self.step_count,
            events = self.events.len(),
            "SIMULATION_END: シミュレーション完了"
        );
        Ok(())
    }

    /// 1ターン進める
    pub fn step(&mut self) -> SimResult<()> {
        if self.time + 1e-9 >= self.next_weather_update {
            update_sea_states(&mut self.grid, self.weather.as_ref(), &mut self.rng);
            self.next_weather_update += self.settings.weather_update_h;
        }

        self.spawn_merchants()?;

        for index in 0..self.managers.len() {
            self.run_manager_turn(index)?;
        }

        let dt = self.settings.dt_h;
        self.grid.decay(dt, dt);
        self.time += dt;
        self.step_count += 1;
        Ok(())
    }

    /// 商船の到着（種別ごとのポアソン過程）
    fn spawn_merchants(&mut self) -> SimResult<()> {
        let Some(traffic) = self.merchants.clone() else {
            return Ok(());
        };
        let area = *self.geography.zones.area();
        let periods_per_week = 168.0 / self.settings.dt_h;

        for merchant_type in &traffic.config.types {
            let arrivals = self.rng.poisson(merchant_type.weekly_arrivals / periods_per_week);
            for _ in 0..arrivals {
                let entry_max_y = traffic.config.entry_max_y.unwrap_or(area.max_y).min(area.max_y);
                let entry = Point::new(area.max_x, self.rng.range(area.min_y, entry_max_y));

                let country_weights: Vec<f64> = traffic.config.countries.iter().map(|c| c.share).collect();
                let country = self
                    .rng
                    .weighted_index(&country_weights)
                    .and_then(|i| traffic.config.countries.get(i))
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "Market".to_string());
                let base = self.managers[traffic.manager]
                    .sample_base(&mut self.rng)
                    .cloned()
                    .ok_or_else(|| SimError::Config("商船の入港先がありません".to_string()))?;

                let id = self.ids.next_agent();
                let merchant = Agent::merchant(
                    id,
                    traffic.manager,
                    &merchant_type.name,
                    merchant_type.speed,
                    merchant_type.visibility,
                    &country,
                    entry,
                    &base.name,
                    base.location,
                    traffic.config.unloading_time_h,
                );
                self.agents.push(merchant);
                self.managers[traffic.manager].place(id, AgentStatus::Active);
                self.change_mission(id, MissionTarget::Location(base.location), MissionKind::Return)?;

                debug!(
                    agent = %id,
                    merchant_type = %merchant_type.name,
                    country = %country,
                    base = %base.name,
                    "MERCHANT_ARRIVED: 商船が到着しました"
                );
            }
        }
        Ok(())
    }

    /// エスカレーションレベルを変更する
    ///
    /// 重みが0になったゾーンで活動中のエージェントは帰投し、種別ごとに
    /// 予備と待機の比率をゾーン重みの合計に合わせて再配分します。
    pub fn set_escalation(&mut self, side: Side, level: u8) -> SimResult<()> {
        let previous = self.escalation.level(side);
        self.escalation.set(side, level);
        info!(side = %side, from = previous, to = level, "ESCALATION_CHANGED: エスカレーションレベル変更");

        for index in 0..self.managers.len() {
            if self.managers[index].side != side || self.managers[index].is_merchant() {
                continue;
            }

            let active: Vec<AgentId> = self.managers[index].active.iter().copied().collect();
            for id in active {
                let agent = self.agent(id)?;
                let Some(zone) = agent.assigned_zone.clone() else {
                    continue;
                };
                let homebound = self.mission_kind_of(id).is_some_and(|k| k.is_homebound());
                if homebound || self.rules.zone_weight(side, level, &agent.combat_type, &zone) > 0.0 {
                    continue;
                }
                let location = agent.location;
                self.events
                    .record(self.time, EventKind::ForcedReturn, id, None, location, "escalation");
                self.send_home(id)?;
            }

            self.rebalance_reserves(index, side, level)?;
        }
        Ok(())
    }

    fn rebalance_reserves(&mut self, index: usize, side: Side, level: u8) -> SimResult<()> {
        let manager = &self.managers[index];
        let mut combat_types: Vec<String> = manager
            .active
            .iter()
            .chain(manager.inactive.iter())
            .chain(manager.reserved.iter())
            .filter_map(|id| self.agents.get(id.0))
            .map(|a| a.combat_type.clone())
            .collect();
        combat_types.sort();
        combat_types.dedup();

        for combat_type in combat_types {
            let share: f64 = self
                .rules
                .zone_weights(side, level, &combat_type)
                .iter()
                .map(|(_, w)| *w)
                .sum::<f64>()
                .clamp(0.0, 1.0);

            let of_type = |ids: &std::collections::BTreeSet<AgentId>, agents: &[Agent]| -> Vec<AgentId> {
                ids.iter()
                    .copied()
                    .filter(|id| agents.get(id.0).is_some_and(|a| a.combat_type == combat_type))
                    .collect()
            };
            let manager = &self.managers[index];
            let active = of_type(&manager.active, &self.agents);
            let inactive = of_type(&manager.inactive, &self.agents);
            let reserved = of_type(&manager.reserved, &self.agents);

            let total = (active.len() + inactive.len() + reserved.len()) as f64;
            let target = share * total;
            let tolerance = 0.05 * total;
            let mut available = (active.len() + inactive.len()) as f64;

            let mut to_reserve = inactive.into_iter();
            while available > target + tolerance {
                let Some(id) = to_reserve.next() else { break };
                self.agents[id.0].status = AgentStatus::Reserved;
                self.managers[index].place(id, AgentStatus::Reserved);
                available -= 1.0;
            }
            let mut to_release = reserved.into_iter();
            while available < target - tolerance {
                let Some(id) = to_release.next() else { break };
                self.agents[id.0].status = AgentStatus::Inactive;
                self.managers[index].place(id, AgentStatus::Inactive);
                available += 1.0;
            }

            debug!(
                manager = %self.managers[index].name,
                combat_type = %combat_type,
                share = share,
                available = available,
                total = total,
                "RESERVE_REBALANCED: 予備を再配分しました"
            );
        }
        Ok(())
    }

    /// 可視化・ログ向けの全エージェントの状態
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents
            .iter()
            .map(|agent| {
                let mission = self
                    .missions
                    .of(agent)
                    .map(|m| m.describe())
                    .unwrap_or_else(|| "Idle".to_string());
                agent.snapshot(mission)
            })
            .collect()
    }

    /// エージェント位置の海況（格子外は初期値）
    fn sea_state_at(&self, point: &Point) -> u8 {
        self.grid.sea_state_at(point).unwrap_or(self.initial_sea_state)
    }
}

fn to_points(points: &[[f64; 2]]) -> Vec<Point> {
    points.iter().map(|[x, y]| Point::new(*x, *y)).collect()
}

fn to_bases(configs: &[BaseConfig]) -> Vec<Base> {
    configs
        .iter()
        .map(|b| Base::new(b.name.clone(), Point::new(b.location[0], b.location[1]), b.share))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const BLUE: usize = 0;
    pub const RED: usize = 1;

    pub const SCENARIO: &str = r#"
meta:
  name: test strait
sim:
  seed: 7
  t_max_h: 24.0
world:
  area: { min_x: 119.0, max_x: 123.0, min_y: 21.0, max_y: 26.0 }
  grid_cell: 0.1
  weather: static
landmasses:
  - name: Island
    points: [[120.5, 23.0], [121.5, 23.0], [121.5, 24.5], [120.5, 24.5]]
zones:
  - id: C
    points: [[121.8, 21.5], [122.8, 21.5], [122.8, 22.5], [121.8, 22.5]]
  - id: E
    points: [[119.0, 21.0], [123.0, 21.0], [123.0, 26.0], [119.0, 26.0]]
    carve_out: [C]
rules:
  coalition_roe:
    1:
      BLUE FFG: { C: 1, E: 1 }
  hunter_illegal_zones: [C]
  zone_assignment:
    coalition:
      1:
        BLUE FFG: { E: 1.0 }
    hunter:
      1:
        RED DDG: { E: 1.0 }
engagement:
  attack_table:
    - attacker: BLUE FFG
      attacker_skill: basic
      defender: RED DDG
      defender_skill: basic
      probabilities: { sunk: 1.0, ctl: 0.0, nothing: 0.0 }
    - attacker: RED DDG
      attacker_skill: basic
      defender: BLUE FFG
      defender_skill: basic
      probabilities: { sunk: 0.0, ctl: 0.0, nothing: 1.0 }
models:
  BLUE FFG:
    service: Navy
    cruising_speed: 30.0
    max_speed: 55.0
    endurance: 3000.0
    maintenance_time: 12.0
    surface_detection: advanced
    anti_surface: basic
    anti_surface_ammunition: 4
  RED DDG:
    service: PLAN
    cruising_speed: 30.0
    max_speed: 55.0
    endurance: 3000.0
    maintenance_time: 12.0
    surface_detection: advanced
    anti_surface: basic
    helicopter: true
managers:
  - name: Blue Navy
    side: coalition
    utilisation: 0.0
    bases:
      - { name: Blue Port, location: [122.5, 25.5] }
    fleets:
      - { model: BLUE FFG, count: 3 }
    ammunition:
      - { attacker: BLUE FFG, attacker_skill: basic, defender: RED DDG, range: 100.0 }
  - name: Red Navy
    side: hunter
    utilisation: 0.0
    bases:
      - { name: Red Port, location: [119.3, 25.5] }
    fleets:
      - { model: RED DDG, count: 3 }
    ammunition:
      - { attacker: RED DDG, attacker_skill: basic, defender: BLUE FFG, range: 100.0 }
"#;

    pub fn scenario() -> ScenarioConfig {
        ScenarioConfig::from_yaml_str(SCENARIO).unwrap()
    }

    pub fn engine() -> SimulationEngine {
        SimulationEngine::from_scenario(&scenario()).unwrap()
    }

    /// 待機中のエージェントを指定地点に展開する（ミッションなし）
    pub fn deploy(engine: &mut SimulationEngine, manager: usize, location: Point) -> AgentId {
        let id = engine.managers[manager]
            .inactive
            .iter()
            .copied()
            .find(|id| engine.agents[id.0].mission.is_none())
            .unwrap();
        let agent = &mut engine.agents[id.0];
        agent.status = AgentStatus::Active;
        agent.location = location;
        agent.assigned_zone = Some("E".to_string());
        engine.managers[manager].place(id, AgentStatus::Active);
        id
    }

    /// 東西方向に km だけ離れた地点
    pub fn east_of(point: Point, km: f64) -> Point {
        let factor = crate::geometry::LONGITUDE_CONVERSION_FACTOR * point.y.to_radians().cos();
        Point::new(point.x + km / factor, point.y)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_world_setup() {
        let engine = engine();
        assert_eq!(engine.agents.len(), 6);
        assert_eq!(engine.managers.len(), 2);
        for (index, agent) in engine.agents.iter().enumerate() {
            assert_eq!(agent.id, AgentId(index));
            assert_eq!(agent.status, AgentStatus::Inactive);
        }
        assert!(engine.geography.router.layer(Side::Neutral, MovementDomain::Surface).is_some());
        assert_eq!(engine.managers[BLUE].inactive.len(), 3);
    }

    #[test]
    fn test_grid_padding_widens_receptor_grid() {
        let mut config = scenario();
        config.world.grid_padding = 0.5;
        let narrow = SimulationEngine::from_scenario(&config).unwrap();
        config.world.grid_padding = 1.0;
        let wide = SimulationEngine::from_scenario(&config).unwrap();

        let (narrow_cols, narrow_rows) = narrow.grid.dimensions();
        let (wide_cols, wide_rows) = wide.grid.dimensions();
        // 両側に 0.5 度ずつ広がるので 0.1 度格子で約10セル増える
        assert!((9..=11).contains(&(wide_cols - narrow_cols)));
        assert!((9..=11).contains(&(wide_rows - narrow_rows)));
        assert!(narrow.grid.get_receptor_at_location(&Point::new(118.6, 20.6)).is_ok());
    }

    #[test]
    fn test_runs_are_reproducible() {
        let mut config = scenario();
        for manager in &mut config.managers {
            manager.utilisation = 0.7;
        }
        let mut first = SimulationEngine::from_scenario(&config).unwrap();
        let mut second = SimulationEngine::from_scenario(&config).unwrap();
        for _ in 0..40 {
            first.step().unwrap();
            second.step().unwrap();
        }

        let a = first.snapshots();
        let b = second.snapshots();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.x, y.x);
            assert_eq!(x.y, y.y);
            assert_eq!(x.mission, y.mission);
        }
        assert_eq!(first.events.len(), second.events.len());
        assert!((first.time - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let mut config = scenario();
        for manager in &mut config.managers {
            manager.utilisation = 1.0;
        }
        let mut parallel = SimulationEngine::from_scenario(&config).unwrap();
        config.sim.parallel = false;
        let mut sequential = SimulationEngine::from_scenario(&config).unwrap();
        for _ in 0..30 {
            parallel.step().unwrap();
            sequential.step().unwrap();
        }
        for (x, y) in parallel.snapshots().iter().zip(sequential.snapshots().iter()) {
            assert_eq!((x.x, x.y), (y.x, y.y));
            assert_eq!(x.status, y.status);
        }
        assert_eq!(parallel.events.len(), sequential.events.len());
    }

    #[test]
    fn test_merchant_arrival_and_routing() {
        let mut config = scenario();
        config.merchants = Some(MerchantConfig {
            types: vec![MerchantTypeConfig {
                name: "Container".to_string(),
                weekly_arrivals: 168.0 * 40.0,
                speed: 30.0,
                visibility: SizeClass::Large,
            }],
            countries: vec![CountryConfig {
                name: "Market".to_string(),
                share: 1.0,
                postures: Default::default(),
            }],
            bases: vec![BaseConfig {
                name: "Taichung".to_string(),
                location: [120.45, 24.2],
                share: 1.0,
            }],
            entry_max_y: Some(23.0),
            unloading_time_h: 12.0,
        });
        let mut engine = SimulationEngine::from_scenario(&config).unwrap();
        engine.step().unwrap();

        let merchants: Vec<&Agent> = engine.agents.iter().filter(|a| a.is_merchant()).collect();
        assert!(!merchants.is_empty());
        for merchant in merchants {
            assert_eq!(merchant.side, Side::Neutral);
            assert!(merchant.merchant_state().unwrap().entry_point.y <= 23.0);
            assert_eq!(engine.mission_kind_of(merchant.id), Some(MissionKind::Return));
            assert!(engine.managers[2].active.contains(&merchant.id));
        }
    }

    #[test]
    fn test_escalation_forces_return_from_zero_weight_zone() {
        let mut engine = engine();
        let id = deploy(&mut engine, BLUE, Point::new(122.0, 25.0));
        engine.start_patrol(id).unwrap();
        assert_eq!(engine.mission_kind_of(id), Some(MissionKind::Travel { then: FollowUp::Observe }));

        // レベル2には割り当て表がないため重みは0
        engine.set_escalation(Side::Coalition, 2).unwrap();
        assert_eq!(engine.mission_kind_of(id), Some(MissionKind::Return));
        assert_eq!(engine.events.of_kind(EventKind::ForcedReturn).count(), 1);

        // 待機中の2隻は全て予備へ
        assert_eq!(engine.managers[BLUE].reserved.len(), 2);
        assert!(engine.managers[BLUE].inactive.is_empty());

        engine.set_escalation(Side::Coalition, 1).unwrap();
        assert!(engine.managers[BLUE].reserved.is_empty());
    }
}
