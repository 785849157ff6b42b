//! # Routing モジュール
//!
//! 多角形障害物（陸地・立入禁止ゾーン）を回避する可視グラフ経路探索を提供します。
//!
//! ## 処理の流れ
//!
//! 1. 陣営×移動領域ごとに障害物集合を決め、全頂点間の可視性から基本グラフを構築（起動時に1回）
//! 2. 経路要求ごとに基本グラフを複製し、始点・終点を可視ノードへ接続
//! 3. ダイクストラ法で最短経路を求め、[`Route`] として具体化
//!
//! 基本グラフは構築後に読み取り専用で、経路要求が変更することはありません。

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info};

use crate::error::{SimError, SimResult};
use crate::geometry::{Point, Polygon};
use crate::models::Side;

/// 移動領域（水上・水中は同じ障害物集合を共有する）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDomain {
    Surface,
    Air,
}

/// 計算済みの経路
///
/// 出発点を含む頂点列を保持し、`next_point` / `reached_point` で1点ずつ消費されます。
#[derive(Debug, Clone)]
pub struct Route {
    points: Vec<Point>,
    next_index: usize,
    length: f64,
    created_at: f64,
}

impl Route {
    pub fn new(points: Vec<Point>, created_at: f64) -> Self {
        let length = points.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
        Self {
            next_index: 1.min(points.len()),
            points,
            length,
            created_at,
        }
    }

    /// 出発点から終点までの総距離 (km)
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// 未到達の経由点
    pub fn remaining_points(&self) -> &[Point] {
        &self.points[self.next_index.min(self.points.len())..]
    }

    pub fn next_point(&self) -> Option<Point> {
        self.points.get(self.next_index).copied()
    }

    pub fn reached_point(&mut self) {
        if self.next_index < self.points.len() {
            self.next_index += 1;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next_index >= self.points.len()
    }

    pub fn destination(&self) -> Option<Point> {
        self.points.last().copied()
    }
}

/// 線分 p1-p2 がどの障害物の縮小形とも交わらないか
pub fn is_visible(p1: &Point, p2: &Point, obstacles: &[Polygon]) -> bool {
    !obstacles.iter().any(|obstacle| obstacle.blocks_segment(p1, p2))
}

/// 重み付き無向可視グラフ
#[derive(Debug, Clone, Default)]
pub struct VisibilityGraph {
    nodes: Vec<Point>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl VisibilityGraph {
    /// 障害物の全頂点をノードとし、相互に可視な頂点対を結ぶ
    pub fn build(obstacles: &[Polygon]) -> Self {
        let nodes: Vec<Point> = obstacles
            .iter()
            .flat_map(|obstacle| obstacle.points().iter().copied())
            .collect();

        let n = nodes.len();
        let pairs: Vec<Vec<(usize, f64)>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .filter(|&j| nodes[i] == nodes[j] || is_visible(&nodes[i], &nodes[j], obstacles))
                    .map(|j| (j, nodes[i].distance_to(&nodes[j])))
                    .collect()
            })
            .collect();

        let mut adjacency = vec![Vec::new(); n];
        for (i, edges) in pairs.into_iter().enumerate() {
            for (j, weight) in edges {
                adjacency[i].push((j, weight));
                adjacency[j].push((i, weight));
            }
        }

        Self { nodes, adjacency }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn node(&self, index: usize) -> Option<Point> {
        self.nodes.get(index).copied()
    }

    /// 点を追加し、可視な既存ノードすべてと接続する
    ///
    /// 既存ノードがあるのにひとつも可視でない場合は到達不能としてエラーを返します。
    pub fn add_point(&mut self, point: Point, obstacles: &[Polygon]) -> SimResult<usize> {
        let index = self.nodes.len();
        let edges: Vec<(usize, f64)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| **node == point || is_visible(&point, node, obstacles))
            .map(|(i, node)| (i, point.distance_to(node)))
            .collect();

        if index > 0 && edges.is_empty() {
            return Err(SimError::Unreachable { x: point.x, y: point.y });
        }

        self.nodes.push(point);
        self.adjacency.push(Vec::with_capacity(edges.len()));
        for (j, weight) in edges {
            self.adjacency[index].push((j, weight));
            self.adjacency[j].push((index, weight));
        }
        Ok(index)
    }

    /// ダイクストラ法による最短経路（ノード番号列）
    pub fn shortest_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let n = self.nodes.len();
        if from >= n || to >= n {
            return None;
        }

        let mut distance = vec![f64::INFINITY; n];
        let mut previous: Vec<Option<usize>> = vec![None; n];
        let mut heap = BinaryHeap::new();

        distance[from] = 0.0;
        heap.push(Frontier { cost: 0.0, node: from });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if node == to {
                break;
            }
            if cost > distance[node] {
                continue;
            }
            for &(next, weight) in &self.adjacency[node] {
                let candidate = cost + weight;
                if candidate < distance[next] {
                    distance[next] = candidate;
                    previous[next] = Some(node);
                    heap.push(Frontier { cost: candidate, node: next });
                }
            }
        }

        if !distance[to].is_finite() {
            return None;
        }

        let mut path = vec![to];
        let mut current = to;
        while let Some(prev) = previous[current] {
            path.push(prev);
            current = prev;
        }
        path.reverse();
        Some(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap は最大ヒープなので逆順
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 陣営×移動領域ごとの障害物集合とキャッシュ済みグラフ
#[derive(Debug, Clone)]
pub struct RoutingLayer {
    obstacles: Vec<Polygon>,
    graph: VisibilityGraph,
}

impl RoutingLayer {
    pub fn new(obstacles: Vec<Polygon>) -> Self {
        let graph = VisibilityGraph::build(&obstacles);
        Self { obstacles, graph }
    }

    pub fn obstacles(&self) -> &[Polygon] {
        &self.obstacles
    }

    pub fn graph(&self) -> &VisibilityGraph {
        &self.graph
    }
}

/// 経路計算器
#[derive(Debug, Clone, Default)]
pub struct Router {
    layers: HashMap<(Side, MovementDomain), RoutingLayer>,
    /// 端点の退避先として参照する全陸地
    landmasses: Vec<Polygon>,
}

impl Router {
    pub fn new(landmasses: Vec<Polygon>) -> Self {
        Self {
            layers: HashMap::new(),
            landmasses,
        }
    }

    pub fn add_layer(&mut self, side: Side, domain: MovementDomain, obstacles: Vec<Polygon>) {
        let names: Vec<&str> = obstacles.iter().map(|o| o.name.as_str()).collect();
        debug!(side = ?side, domain = ?domain, obstacles = ?names, "ROUTING_LAYER_BUILD: 可視グラフを構築します");
        let layer = RoutingLayer::new(obstacles);
        info!(
            side = ?side,
            domain = ?domain,
            nodes = layer.graph.node_count(),
            edges = layer.graph.edge_count(),
            "ROUTING_LAYER_READY: 可視グラフを構築しました"
        );
        self.layers.insert((side, domain), layer);
    }

    pub fn layer(&self, side: Side, domain: MovementDomain) -> Option<&RoutingLayer> {
        self.layers.get(&(side, domain))
    }

    pub fn landmasses(&self) -> &[Polygon] {
        &self.landmasses
    }

    /// 始点から終点への経路を生成
    pub fn create_route(
        &self,
        start: Point,
        end: Point,
        side: Side,
        domain: MovementDomain,
        now: f64,
    ) -> SimResult<Route> {
        let layer = self.layers.get(&(side, domain)).ok_or_else(|| {
            SimError::Config(format!("経路レイヤ未定義: {:?}/{:?}", side, domain))
        })?;

        match self.route_in_layer(layer, start, end, now) {
            Err(SimError::Unreachable { .. }) => {
                let snapped_start = self.snap_endpoint(layer, start);
                let snapped_end = self.snap_endpoint(layer, end);
                if snapped_start == start && snapped_end == end {
                    return Err(SimError::Unreachable { x: end.x, y: end.y });
                }
                debug!(
                    start_x = start.x,
                    start_y = start.y,
                    end_x = end.x,
                    end_y = end.y,
                    snapped_end_x = snapped_end.x,
                    snapped_end_y = snapped_end.y,
                    "ROUTE_ENDPOINT_SNAPPED: 端点を陸地外周へ移して再計算します"
                );
                self.route_in_layer(layer, snapped_start, snapped_end, now)
            }
            other => other,
        }
    }

    fn route_in_layer(&self, layer: &RoutingLayer, start: Point, end: Point, now: f64) -> SimResult<Route> {
        if start == end {
            return Ok(Route::new(vec![start], now));
        }
        if is_visible(&start, &end, &layer.obstacles) {
            return Ok(Route::new(vec![start, end], now));
        }

        let mut graph = layer.graph.clone();
        let from = graph.add_point(start, &layer.obstacles)?;
        let to = graph.add_point(end, &layer.obstacles)?;

        let path = graph
            .shortest_path(from, to)
            .ok_or(SimError::Unreachable { x: end.x, y: end.y })?;
        let points = path.into_iter().filter_map(|i| graph.node(i)).collect();
        Ok(Route::new(points, now))
    }

    /// 障害物または陸地の内部にある端点を外周のすぐ外へ移す
    fn snap_endpoint(&self, layer: &RoutingLayer, point: Point) -> Point {
        layer
            .obstacles
            .iter()
            .chain(self.landmasses.iter())
            .find(|polygon| polygon.contains(&point))
            .map(|polygon| polygon.snap_outside(&point))
            .unwrap_or(point)
    }
}
