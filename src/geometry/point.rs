use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 緯度1度あたりの距離 (km)
pub const LATITUDE_CONVERSION_FACTOR: f64 = 110.574;
/// 赤道上での経度1度あたりの距離 (km)
pub const LONGITUDE_CONVERSION_FACTOR: f64 = 111.320;

/// 地理座標（x: 経度, y: 緯度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 正距円筒近似による距離 (km)
    ///
    /// 経度差は2点の平均緯度での余弦で縮約します。
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dy_km = (self.y - other.y).abs() * LATITUDE_CONVERSION_FACTOR;
        let mean_latitude = (self.y + other.y) / 2.0;
        let dx_km = (self.x - other.x).abs()
            * LONGITUDE_CONVERSION_FACTOR
            * mean_latitude.to_radians().cos();
        (dx_km.powi(2) + dy_km.powi(2)).sqrt()
    }

    /// 座標平面上のユークリッド距離（度単位）
    pub fn planar_distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn length(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self::new(self.x / len, self.y / len)
        } else {
            *self
        }
    }

    pub fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 2次元外積（z成分）
    pub fn cross(&self, other: &Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// self から other へ割合 t だけ進んだ点
    pub fn lerp(&self, other: &Point, t: f64) -> Self {
        Self::new(
            self.x + t * (other.x - self.x),
            self.y + t * (other.y - self.y),
        )
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}
