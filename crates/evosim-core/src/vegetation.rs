//! Dense boolean vegetation grid with deterministic growth.
//!
//! A cell has no identity; presence is the datum. All stochastic operations
//! take the simulation stream explicitly and consume draws in a documented
//! order so replays stay aligned.

use crate::math::Vec2;
use crate::rng::SimRng;
use serde::{Deserialize, Serialize};

/// Boolean tile set sized `floor(width/tile) x floor(height/tile)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetationGrid {
    cells_x: usize,
    cells_y: usize,
    tile_size: f64,
    cells: Vec<bool>,
    occupied: usize,
}

impl VegetationGrid {
    /// Empty grid covering `width x height` world units.
    #[must_use]
    pub fn new(width: f64, height: f64, tile_size: f64) -> Self {
        let cells_x = ((width / tile_size).floor() as usize).max(1);
        let cells_y = ((height / tile_size).floor() as usize).max(1);
        Self {
            cells_x,
            cells_y,
            tile_size,
            cells: vec![false; cells_x * cells_y],
            occupied: 0,
        }
    }

    /// Seed the grid row-major: one Bernoulli draw per cell at `density`.
    #[must_use]
    pub fn generate(width: f64, height: f64, tile_size: f64, density: f64, rng: &mut SimRng) -> Self {
        let mut grid = Self::new(width, height, tile_size);
        for index in 0..grid.cells.len() {
            if rng.chance(density) {
                grid.cells[index] = true;
                grid.occupied += 1;
            }
        }
        grid
    }

    #[must_use]
    pub const fn cells_x(&self) -> usize {
        self.cells_x
    }

    #[must_use]
    pub const fn cells_y(&self) -> usize {
        self.cells_y
    }

    #[must_use]
    pub const fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Number of occupied cells.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.occupied
    }

    #[inline]
    fn offset(&self, gx: usize, gy: usize) -> usize {
        gy * self.cells_x + gx
    }

    #[must_use]
    pub fn has(&self, gx: usize, gy: usize) -> bool {
        gx < self.cells_x && gy < self.cells_y && self.cells[self.offset(gx, gy)]
    }

    /// Mark a cell occupied. Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, gx: usize, gy: usize) {
        if gx < self.cells_x && gy < self.cells_y {
            let index = self.offset(gx, gy);
            if !self.cells[index] {
                self.cells[index] = true;
                self.occupied += 1;
            }
        }
    }

    /// Clear a cell, returning whether vegetation was present.
    pub fn remove(&mut self, gx: usize, gy: usize) -> bool {
        if gx < self.cells_x && gy < self.cells_y {
            let index = self.offset(gx, gy);
            if self.cells[index] {
                self.cells[index] = false;
                self.occupied -= 1;
                return true;
            }
        }
        false
    }

    /// Grid cell containing a world position; positions on the far edge land
    /// in the boundary cell.
    #[must_use]
    pub fn world_to_grid(&self, position: Vec2) -> (usize, usize) {
        let gx = ((position.x / self.tile_size).floor().max(0.0) as usize).min(self.cells_x - 1);
        let gy = ((position.y / self.tile_size).floor().max(0.0) as usize).min(self.cells_y - 1);
        (gx, gy)
    }

    /// Centre of a grid cell in world coordinates.
    #[must_use]
    pub fn grid_to_world(&self, gx: usize, gy: usize) -> Vec2 {
        Vec2::new(
            gx as f64 * self.tile_size + self.tile_size / 2.0,
            gy as f64 * self.tile_size + self.tile_size / 2.0,
        )
    }

    /// Four orthogonal neighbours, in-bounds only, in fixed order
    /// left, right, up, down.
    #[must_use]
    pub fn neighbors(&self, gx: usize, gy: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(4);
        if gx > 0 {
            out.push((gx - 1, gy));
        }
        if gx + 1 < self.cells_x {
            out.push((gx + 1, gy));
        }
        if gy > 0 {
            out.push((gx, gy - 1));
        }
        if gy + 1 < self.cells_y {
            out.push((gx, gy + 1));
        }
        out
    }

    /// One growth pass. The occupied set is snapshotted first so cells grown
    /// this pass do not themselves spread; each empty neighbour costs exactly
    /// one Bernoulli draw, in snapshot x {left, right, up, down} order.
    pub fn spread(&mut self, rate: f64, rng: &mut SimRng) {
        let snapshot: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(index, &occupied)| occupied.then_some(index))
            .collect();
        for index in snapshot {
            let gx = index % self.cells_x;
            let gy = index / self.cells_x;
            for (nx, ny) in self.neighbors(gx, gy) {
                if !self.has(nx, ny) && rng.chance(rate) {
                    self.set(nx, ny);
                }
            }
        }
    }

    /// World-space centres of all occupied cells, row-major.
    #[must_use]
    pub fn positions(&self) -> Vec<Vec2> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(index, &occupied)| {
                occupied.then(|| self.grid_to_world(index % self.cells_x, index / self.cells_x))
            })
            .collect()
    }

    /// Closest occupied cell whose centre lies within `radius` of `position`.
    /// Ties resolve to the first cell in row-major order.
    #[must_use]
    pub fn nearest_occupied(&self, position: Vec2, radius: f64) -> Option<(usize, usize)> {
        let lo_x = (((position.x - radius) / self.tile_size).floor().max(0.0)) as usize;
        let hi_x =
            ((((position.x + radius) / self.tile_size).floor()) as usize).min(self.cells_x - 1);
        let lo_y = (((position.y - radius) / self.tile_size).floor().max(0.0)) as usize;
        let hi_y =
            ((((position.y + radius) / self.tile_size).floor()) as usize).min(self.cells_y - 1);

        let mut best: Option<((usize, usize), f64)> = None;
        for gy in lo_y..=hi_y {
            for gx in lo_x..=hi_x {
                if !self.has(gx, gy) {
                    continue;
                }
                let dist = position.distance(self.grid_to_world(gx, gy));
                if dist > radius {
                    continue;
                }
                if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                    best = Some(((gx, gy), dist));
                }
            }
        }
        best.map(|(cell, _)| cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_floor_world_extent() {
        let grid = VegetationGrid::new(55.0, 29.0, 10.0);
        assert_eq!(grid.cells_x(), 5);
        assert_eq!(grid.cells_y(), 2);
    }

    #[test]
    fn set_remove_track_count() {
        let mut grid = VegetationGrid::new(50.0, 50.0, 10.0);
        grid.set(1, 1);
        grid.set(1, 1);
        assert_eq!(grid.count(), 1);
        assert!(grid.has(1, 1));
        assert!(grid.remove(1, 1));
        assert!(!grid.remove(1, 1));
        assert_eq!(grid.count(), 0);
    }

    #[test]
    fn world_grid_mapping_round_trips_to_centres() {
        let grid = VegetationGrid::new(50.0, 50.0, 10.0);
        assert_eq!(grid.world_to_grid(Vec2::new(14.9, 25.0)), (1, 2));
        assert_eq!(grid.grid_to_world(1, 2), Vec2::new(15.0, 25.0));
        // The far edge belongs to the boundary cell.
        assert_eq!(grid.world_to_grid(Vec2::new(50.0, 50.0)), (4, 4));
    }

    #[test]
    fn neighbors_fixed_order_and_in_bounds() {
        let grid = VegetationGrid::new(30.0, 30.0, 10.0);
        assert_eq!(
            grid.neighbors(1, 1),
            vec![(0, 1), (2, 1), (1, 0), (1, 2)],
            "left, right, up, down"
        );
        assert_eq!(grid.neighbors(0, 0), vec![(1, 0), (0, 1)]);
        assert_eq!(grid.neighbors(2, 2), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn generate_is_seed_deterministic() {
        let mut rng_a = SimRng::new(11_111);
        let mut rng_b = SimRng::new(11_111);
        let a = VegetationGrid::generate(100.0, 100.0, 10.0, 0.4, &mut rng_a);
        let b = VegetationGrid::generate(100.0, 100.0, 10.0, 0.4, &mut rng_b);
        assert_eq!(a.count(), b.count());
        assert_eq!(a.positions(), b.positions());
        assert!(a.count() > 0);
    }

    #[test]
    fn zero_spread_rate_never_grows() {
        let mut rng = SimRng::new(42);
        let mut grid = VegetationGrid::generate(100.0, 100.0, 10.0, 0.3, &mut rng);
        let before = grid.count();
        for _ in 0..50 {
            grid.spread(0.0, &mut rng);
        }
        assert_eq!(grid.count(), before);
    }

    #[test]
    fn full_spread_rate_fills_neighbors_once() {
        let mut rng = SimRng::new(1);
        let mut grid = VegetationGrid::new(50.0, 50.0, 10.0);
        grid.set(2, 2);
        grid.spread(1.0, &mut rng);
        // The freshly grown cells were not in the snapshot, so growth is one ring.
        assert_eq!(grid.count(), 5);
        assert!(grid.has(1, 2) && grid.has(3, 2) && grid.has(2, 1) && grid.has(2, 3));
    }

    #[test]
    fn nearest_occupied_respects_radius_and_ties() {
        let mut grid = VegetationGrid::new(100.0, 100.0, 10.0);
        grid.set(0, 0);
        grid.set(4, 4);
        let from = Vec2::new(5.0, 5.0);
        assert_eq!(grid.nearest_occupied(from, 200.0), Some((0, 0)));
        assert_eq!(grid.nearest_occupied(from, 1.0), None);

        // Equidistant cells resolve to the first in row-major order.
        let mut tie = VegetationGrid::new(100.0, 100.0, 10.0);
        tie.set(2, 1);
        tie.set(1, 2);
        assert_eq!(tie.nearest_occupied(Vec2::new(15.0, 15.0), 50.0), Some((2, 1)));
    }
}
