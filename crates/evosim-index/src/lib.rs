//! Spatial indexing for entity neighborhood queries.
//!
//! A regular bucket grid over a bounded world. Entries are keyed by caller
//! ids and carry a collision radius, so `query_radius` matches the rule
//! `distance(center, entry) - entry.radius <= r`. The grid never wraps:
//! out-of-range coordinates are clamped into the boundary cells.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Errors emitted when constructing a bucket grid.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive bucket size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// One tracked entry: centre position plus collision radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Entry {
    /// Construct a new entry.
    #[must_use]
    pub const fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    fn distance_to(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx.hypot(dy)
    }
}

/// Regular grid index bucketing entries by position.
///
/// Queries widen their footprint by the largest radius ever inserted, so an
/// undersized bucket configuration degrades performance but never drops
/// matches.
#[derive(Debug, Clone)]
pub struct BucketGrid<I> {
    bucket_size: f64,
    width: f64,
    height: f64,
    cells_x: i32,
    cells_y: i32,
    buckets: HashMap<(i32, i32), Vec<I>>,
    entries: HashMap<I, Entry>,
    max_radius: f64,
}

impl<I> BucketGrid<I>
where
    I: Copy + Eq + Hash + Ord,
{
    /// Create a grid covering `width x height` with the provided bucket side.
    pub fn new(bucket_size: f64, width: f64, height: f64) -> Result<Self, IndexError> {
        if !(bucket_size > 0.0) {
            return Err(IndexError::InvalidConfig("bucket_size must be positive"));
        }
        if !(width > 0.0) || !(height > 0.0) {
            return Err(IndexError::InvalidConfig(
                "world dimensions must be positive",
            ));
        }
        Ok(Self {
            bucket_size,
            width,
            height,
            cells_x: Self::cells_for_dimension(width, bucket_size),
            cells_y: Self::cells_for_dimension(height, bucket_size),
            buckets: HashMap::new(),
            entries: HashMap::new(),
            max_radius: 0.0,
        })
    }

    /// Number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `id` is tracked.
    #[must_use]
    pub fn contains(&self, id: I) -> bool {
        self.entries.contains_key(&id)
    }

    /// Current entry for `id`, if tracked.
    #[must_use]
    pub fn entry(&self, id: I) -> Option<Entry> {
        self.entries.get(&id).copied()
    }

    /// Iterate over tracked ids in unspecified order.
    pub fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.entries.keys().copied()
    }

    /// Remove all entries while keeping the grid configuration.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.entries.clear();
        self.max_radius = 0.0;
    }

    /// Insert or replace the entry for `id`.
    pub fn insert(&mut self, id: I, entry: Entry) {
        if self.entries.contains_key(&id) {
            self.remove(id);
        }
        let cell = self.cell_from_point(entry.x, entry.y);
        self.buckets.entry(cell).or_default().push(id);
        self.entries.insert(id, entry);
        if entry.radius > self.max_radius {
            self.max_radius = entry.radius;
        }
    }

    /// Remove `id`, returning its last entry if it was tracked.
    pub fn remove(&mut self, id: I) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        let cell = self.cell_from_point(entry.x, entry.y);
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            bucket.retain(|other| *other != id);
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
        Some(entry)
    }

    /// Move `id` to a new entry. Atomic remove-then-insert so the bucket map
    /// stays authoritative even when the entry crosses a cell boundary.
    pub fn update(&mut self, id: I, entry: Entry) {
        self.remove(id);
        self.insert(id, entry);
    }

    /// Entries with `distance(center, e) - e.radius <= r`, sorted by distance
    /// ascending then id ascending.
    #[must_use]
    pub fn query_radius(&self, x: f64, y: f64, r: f64) -> Vec<(I, f64)> {
        if r < 0.0 {
            return Vec::new();
        }
        let mut hits: Vec<(I, f64)> = Vec::new();
        let reach = r + self.max_radius;
        self.visit_footprint(x - reach, y - reach, x + reach, y + reach, |id| {
            let entry = self.entries[&id];
            let dist = entry.distance_to(x, y);
            if dist - entry.radius <= r {
                hits.push((id, dist));
            }
        });
        hits.sort_by_key(|&(id, dist)| (OrderedFloat(dist), id));
        hits
    }

    /// Ids whose centre lies inside the axis-aligned rectangle, sorted by id.
    #[must_use]
    pub fn query_rect(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<I> {
        let mut hits: Vec<I> = Vec::new();
        self.visit_footprint(min_x, min_y, max_x, max_y, |id| {
            let entry = self.entries[&id];
            if entry.x >= min_x && entry.x <= max_x && entry.y >= min_y && entry.y <= max_y {
                hits.push(id);
            }
        });
        hits.sort_unstable();
        hits
    }

    /// Closest entry to `(x, y)` within `r`, excluding `exclude`.
    #[must_use]
    pub fn nearest(&self, x: f64, y: f64, r: f64, exclude: Option<I>) -> Option<(I, f64)> {
        self.query_radius(x, y, r)
            .into_iter()
            .find(|(id, _)| Some(*id) != exclude)
    }

    /// Up to `n` closest entries within `r`, excluding `exclude`.
    #[must_use]
    pub fn nearest_n(&self, x: f64, y: f64, r: f64, n: usize, exclude: Option<I>) -> Vec<(I, f64)> {
        self.query_radius(x, y, r)
            .into_iter()
            .filter(|(id, _)| Some(*id) != exclude)
            .take(n)
            .collect()
    }

    fn visit_footprint(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        mut visitor: impl FnMut(I),
    ) {
        let (lo_x, lo_y) = self.cell_from_point(min_x, min_y);
        let (hi_x, hi_y) = self.cell_from_point(max_x, max_y);
        for cx in lo_x..=hi_x {
            for cy in lo_y..=hi_y {
                if let Some(bucket) = self.buckets.get(&(cx, cy)) {
                    for &id in bucket {
                        visitor(id);
                    }
                }
            }
        }
    }

    #[inline]
    fn cell_from_point(&self, x: f64, y: f64) -> (i32, i32) {
        (
            Self::discretize(x / self.bucket_size, self.cells_x),
            Self::discretize(y / self.bucket_size, self.cells_y),
        )
    }

    #[inline]
    fn discretize(value: f64, cells: i32) -> i32 {
        let floored = value.floor();
        let clamped = floored.max(0.0).min(f64::from(cells - 1));
        clamped as i32
    }

    fn cells_for_dimension(dimension: f64, bucket_size: f64) -> i32 {
        let raw = (dimension / bucket_size).ceil().max(1.0);
        raw.min(f64::from(i32::MAX)) as i32
    }
}
