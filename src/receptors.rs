//! # Receptors モジュール
//!
//! 作戦領域（と周囲のパディング）を覆う一様格子。各セルは陣営ごとの
//! フェロモン濃度（探索済みの目印）と海況を保持します。
//!
//! 作戦領域外または陸地内のセルは大きな固定値を持ち、減衰しません。
//! これらのセルが哨戒先として選ばれることはありません。

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::geometry::{Bounds, Point, LATITUDE_CONVERSION_FACTOR, LONGITUDE_CONVERSION_FACTOR};
use crate::models::Side;

/// フェロモン関連の設定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PheromoneSettings {
    /// 1時間刻みあたりの減衰率
    pub decay_rate: f64,
    /// 1回の探索で加算する量
    pub deposit: f64,
    /// 作戦領域外・陸地セルの固定値
    pub blocked_value: f64,
}

impl Default for PheromoneSettings {
    fn default() -> Self {
        Self {
            decay_rate: 0.99,
            deposit: 1.0,
            blocked_value: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receptor {
    /// セル中心
    pub location: Point,
    pub coalition: f64,
    pub hunter: f64,
    pub decays: bool,
    pub sea_state: u8,
}

impl Receptor {
    pub fn pheromone(&self, side: Side) -> f64 {
        match side {
            Side::Coalition => self.coalition,
            Side::Hunter => self.hunter,
            Side::Neutral => 0.0,
        }
    }

    fn pheromone_mut(&mut self, side: Side) -> Option<&mut f64> {
        match side {
            Side::Coalition => Some(&mut self.coalition),
            Side::Hunter => Some(&mut self.hunter),
            Side::Neutral => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceptorGrid {
    origin: Point,
    cell_size: f64,
    cols: usize,
    rows: usize,
    receptors: Vec<Receptor>,
    settings: PheromoneSettings,
}

impl ReceptorGrid {
    /// 作戦領域を `padding` 度だけ広げた範囲に格子を張る
    pub fn new(
        area: Bounds,
        cell_size: f64,
        padding: f64,
        blocked: &[crate::geometry::Polygon],
        settings: PheromoneSettings,
        initial_sea_state: u8,
    ) -> SimResult<Self> {
        if cell_size <= 0.0 {
            return Err(SimError::Config(format!("格子サイズが不正です: {}", cell_size)));
        }
        let outer = area.expand(padding);
        let cols = (outer.width() / cell_size).ceil().max(1.0) as usize;
        let rows = (outer.height() / cell_size).ceil().max(1.0) as usize;
        let origin = Point::new(outer.min_x, outer.min_y);

        let mut receptors = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let location = Point::new(
                    origin.x + (col as f64 + 0.5) * cell_size,
                    origin.y + (row as f64 + 0.5) * cell_size,
                );
                let is_blocked = !area.contains(&location) || blocked.iter().any(|p| p.contains(&location));
                let initial = if is_blocked { settings.blocked_value } else { 0.0 };
                receptors.push(Receptor {
                    location,
                    coalition: initial,
                    hunter: initial,
                    decays: !is_blocked,
                    sea_state: initial_sea_state,
                });
            }
        }

        Ok(Self {
            origin,
            cell_size,
            cols,
            rows,
            receptors,
            settings,
        })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn settings(&self) -> &PheromoneSettings {
        &self.settings
    }

    pub fn receptors(&self) -> &[Receptor] {
        &self.receptors
    }

    pub fn receptors_mut(&mut self) -> &mut [Receptor] {
        &mut self.receptors
    }

    fn index_of(&self, point: &Point) -> SimResult<usize> {
        let max_x = self.origin.x + self.cols as f64 * self.cell_size;
        let max_y = self.origin.y + self.rows as f64 * self.cell_size;
        if !(point.x >= self.origin.x && point.x <= max_x && point.y >= self.origin.y && point.y <= max_y) {
            return Err(SimError::OutOfGrid { x: point.x, y: point.y });
        }
        let col = (((point.x - self.origin.x) / self.cell_size) as usize).min(self.cols - 1);
        let row = (((point.y - self.origin.y) / self.cell_size) as usize).min(self.rows - 1);
        Ok(row * self.cols + col)
    }

    pub fn get_receptor_at_location(&self, point: &Point) -> SimResult<&Receptor> {
        let index = self.index_of(point)?;
        Ok(&self.receptors[index])
    }

    pub fn sea_state_at(&self, point: &Point) -> SimResult<u8> {
        self.get_receptor_at_location(point).map(|r| r.sea_state)
    }

    /// 探索済みの目印として地点のセルへフェロモンを加算
    pub fn deposit(&mut self, point: &Point, side: Side) -> SimResult<()> {
        let index = self.index_of(point)?;
        let amount = self.settings.deposit;
        let receptor = &mut self.receptors[index];
        if receptor.decays {
            if let Some(value) = receptor.pheromone_mut(side) {
                *value += amount;
            }
        }
        Ok(())
    }

    /// 経過時間 `elapsed` に応じて減衰率^(elapsed / dt) を掛ける
    pub fn decay(&mut self, elapsed: f64, dt: f64) {
        if elapsed <= 0.0 || dt <= 0.0 {
            return;
        }
        let factor = self.settings.decay_rate.powf(elapsed / dt);
        for receptor in self.receptors.iter_mut().filter(|r| r.decays) {
            receptor.coalition *= factor;
            receptor.hunter *= factor;
        }
    }

    /// 半径 `radius_km` 内のセル中心について濃度を合計し、(合計, セル数) を返す
    pub fn concentration_around(&self, point: &Point, radius_km: f64, side: Side) -> (f64, usize) {
        let lat_window = radius_km / LATITUDE_CONVERSION_FACTOR;
        let cos_lat = point.y.to_radians().cos().abs().max(1e-6);
        let lon_window = radius_km / (LONGITUDE_CONVERSION_FACTOR * cos_lat);

        let to_col = |x: f64| ((x - self.origin.x) / self.cell_size).floor();
        let to_row = |y: f64| ((y - self.origin.y) / self.cell_size).floor();
        let min_col = to_col(point.x - lon_window).max(0.0) as usize;
        let max_col = (to_col(point.x + lon_window).max(0.0) as usize).min(self.cols - 1);
        let min_row = to_row(point.y - lat_window).max(0.0) as usize;
        let max_row = (to_row(point.y + lat_window).max(0.0) as usize).min(self.rows - 1);

        let mut total = 0.0;
        let mut count = 0;
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let receptor = &self.receptors[row * self.cols + col];
                if receptor.location.distance_to(point) <= radius_km {
                    total += receptor.pheromone(side);
                    count += 1;
                }
            }
        }
        (total, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    fn grid() -> ReceptorGrid {
        let island = Polygon::rectangle("island", 122.0, 22.0, 123.0, 23.0).unwrap();
        ReceptorGrid::new(
            Bounds::new(120.0, 126.0, 20.0, 26.0),
            0.5,
            1.0,
            &[island],
            PheromoneSettings::default(),
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_blocked_cells_start_high_and_do_not_decay() {
        let mut grid = grid();
        let padded = grid.get_receptor_at_location(&Point::new(119.3, 21.0)).unwrap().clone();
        let land = grid.get_receptor_at_location(&Point::new(122.4, 22.4)).unwrap().clone();
        assert!(!padded.decays && !land.decays);
        assert_eq!(land.coalition, 100.0);
        grid.decay(10.0, 0.25);
        assert_eq!(grid.get_receptor_at_location(&Point::new(122.4, 22.4)).unwrap().hunter, 100.0);
    }

    #[test]
    fn test_decay_with_zero_elapsed_is_identity() {
        let mut grid = grid();
        let p = Point::new(124.1, 24.1);
        grid.deposit(&p, Side::Coalition).unwrap();
        grid.deposit(&p, Side::Coalition).unwrap();
        let before = grid.get_receptor_at_location(&p).unwrap().coalition;
        for _ in 0..5 {
            grid.decay(0.0, 0.25);
        }
        assert_eq!(grid.get_receptor_at_location(&p).unwrap().coalition, before);
    }

    #[test]
    fn test_decay_scales_by_rate_power() {
        let mut grid = grid();
        let p = Point::new(124.1, 24.1);
        grid.deposit(&p, Side::Hunter).unwrap();
        grid.decay(0.75, 0.25);
        let expected = 0.99f64.powi(3);
        assert!((grid.get_receptor_at_location(&p).unwrap().hunter - expected).abs() < 1e-12);
        assert_eq!(grid.get_receptor_at_location(&p).unwrap().coalition, 0.0);
    }

    #[test]
    fn test_out_of_grid_is_error() {
        let grid = grid();
        assert!(matches!(
            grid.get_receptor_at_location(&Point::new(100.0, 24.0)),
            Err(SimError::OutOfGrid { .. })
        ));
        assert!(grid.get_receptor_at_location(&Point::new(127.0, 27.0)).is_ok());
    }

    #[test]
    fn test_concentration_around_counts_nearby_cells() {
        let mut grid = grid();
        let p = Point::new(124.25, 24.25);
        grid.deposit(&p, Side::Coalition).unwrap();
        let (total, count) = grid.concentration_around(&p, 30.0, Side::Coalition);
        assert_eq!(count, 1);
        assert!((total - 1.0).abs() < 1e-12);
        let (_, wider) = grid.concentration_around(&p, 120.0, Side::Coalition);
        assert!(wider > 1);
        assert_eq!(grid.concentration_around(&p, 30.0, Side::Neutral).0, 0.0);
    }
}
