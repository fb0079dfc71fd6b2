//! Octree spatial index
//!
//! Divides 3D space into hierarchical octants for fast visibility and
//! proximity queries over node handles. Each cell subdivides into eight
//! children when entry density exceeds a threshold.

use crate::foundation::math::Vec3;
use crate::scene::{Aabb, BoundingSphere, Containment, Frustum, NodeId};
use crate::spatial::SpatialIndex;

/// Configuration for octree behavior
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    /// Maximum entries per cell before subdivision
    pub max_entries_per_cell: usize,

    /// Maximum subdivision depth
    pub max_depth: u32,

    /// Minimum cell size (prevents excessive subdivision)
    pub min_cell_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_entries_per_cell: 8,
            max_depth: 8,
            min_cell_size: 1.0,
        }
    }
}

/// Node handle stored in the octree with its enclosing sphere
#[derive(Debug, Clone, Copy)]
struct OctreeEntry {
    id: NodeId,
    position: Vec3,
    radius: f32,
}

impl OctreeEntry {
    fn from_bounds(id: NodeId, bounds: &Aabb) -> Self {
        let sphere = BoundingSphere::from_aabb(bounds);
        Self {
            id,
            position: sphere.center,
            radius: sphere.radius,
        }
    }
}

/// Single cell in the octree hierarchy
#[derive(Debug, Clone)]
struct OctreeCell {
    bounds: Aabb,
    entries: Vec<OctreeEntry>,
    children: Option<Box<[OctreeCell; 8]>>,
    depth: u32,
}

impl OctreeCell {
    fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Octant index (0-7) for a position within this cell's bounds
    ///
    /// Bit 0 selects +X, bit 1 selects +Y, bit 2 selects +Z.
    fn octant_index(center: Vec3, position: Vec3) -> usize {
        let x_bit = usize::from(position.x >= center.x);
        let y_bit = usize::from(position.y >= center.y);
        let z_bit = usize::from(position.z >= center.z);
        (z_bit << 2) | (y_bit << 1) | x_bit
    }

    /// Subdivide this cell into 8 children and redistribute its entries
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }

        let center = self.bounds.center();
        let quarter_extents = self.bounds.extents() * 0.5;
        let child_depth = self.depth + 1;

        let child = |octant: usize| {
            let x_sign = if octant & 1 != 0 { 1.0 } else { -1.0 };
            let y_sign = if octant & 2 != 0 { 1.0 } else { -1.0 };
            let z_sign = if octant & 4 != 0 { 1.0 } else { -1.0 };

            let child_center = Vec3::new(
                center.x + quarter_extents.x * x_sign,
                center.y + quarter_extents.y * y_sign,
                center.z + quarter_extents.z * z_sign,
            );
            OctreeCell::new(
                Aabb::from_center_extents(child_center, quarter_extents),
                child_depth,
            )
        };

        self.children = Some(Box::new([
            child(0),
            child(1),
            child(2),
            child(3),
            child(4),
            child(5),
            child(6),
            child(7),
        ]));

        let entries = std::mem::take(&mut self.entries);
        if let Some(children) = &mut self.children {
            for entry in entries {
                let octant = Self::octant_index(center, entry.position);
                children[octant].entries.push(entry);
            }
        }
    }

    fn insert(&mut self, entry: OctreeEntry, config: &OctreeConfig) -> bool {
        if !self.bounds.contains_point(entry.position) {
            return false;
        }

        if self.is_leaf() {
            let should_subdivide = self.entries.len() >= config.max_entries_per_cell
                && self.depth < config.max_depth
                && self.bounds.extents().x > config.min_cell_size;

            if !should_subdivide {
                self.entries.push(entry);
                return true;
            }
            self.subdivide();
        }

        let octant = Self::octant_index(self.bounds.center(), entry.position);
        match &mut self.children {
            Some(children) => children[octant].insert(entry, config),
            None => false,
        }
    }

    fn remove(&mut self, id: NodeId) -> bool {
        if let Some(index) = self.entries.iter().position(|e| e.id == id) {
            self.entries.swap_remove(index);
            return true;
        }

        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if child.remove(id) {
                    return true;
                }
            }
        }

        false
    }

    fn query_radius(&self, center: Vec3, radius: f32, results: &mut Vec<NodeId>) {
        // Skip the whole subtree when the sphere misses this cell.
        let closest = Vec3::new(
            center.x.clamp(self.bounds.min.x, self.bounds.max.x),
            center.y.clamp(self.bounds.min.y, self.bounds.max.y),
            center.z.clamp(self.bounds.min.z, self.bounds.max.z),
        );
        if (closest - center).magnitude_squared() > radius * radius {
            return;
        }

        for entry in &self.entries {
            let combined = radius + entry.radius;
            if (entry.position - center).magnitude_squared() <= combined * combined {
                results.push(entry.id);
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_radius(center, radius, results);
            }
        }
    }

    fn query_visible(&self, frustum: &Frustum, results: &mut Vec<NodeId>) {
        if frustum.classify_aabb(&self.bounds) == Containment::Outside {
            return;
        }

        for entry in &self.entries {
            if entry.radius <= 0.0 {
                continue;
            }
            let sphere = BoundingSphere::new(entry.position, entry.radius);
            if frustum.classify_sphere(&sphere) != Containment::Outside {
                results.push(entry.id);
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_visible(frustum, results);
            }
        }
    }

    fn count(&self) -> usize {
        let mut total = self.entries.len();
        if let Some(children) = &self.children {
            for child in children.iter() {
                total += child.count();
            }
        }
        total
    }
}

/// Octree index over scene-node handles
///
/// Entries outside the world bounds fall back to an overflow list so the
/// trait contract (every added node is queryable) holds regardless of the
/// configured world size.
#[derive(Debug, Clone)]
pub struct NodeOctree {
    root: OctreeCell,
    config: OctreeConfig,
    overflow: Vec<OctreeEntry>,
}

impl NodeOctree {
    /// Create a new octree spanning the given world bounds
    pub fn new(world_bounds: Aabb, config: OctreeConfig) -> Self {
        Self {
            root: OctreeCell::new(world_bounds, 0),
            config,
            overflow: Vec::new(),
        }
    }

    /// World bounds the octree was built with
    pub fn world_bounds(&self) -> Aabb {
        self.root.bounds
    }
}

impl SpatialIndex for NodeOctree {
    fn add(&mut self, node: NodeId, bounds: Aabb) {
        let entry = OctreeEntry::from_bounds(node, &bounds);
        if !self.root.insert(entry, &self.config) {
            log::debug!("octree entry {node:?} outside world bounds, using overflow list");
            self.overflow.push(entry);
        }
    }

    fn remove(&mut self, node: NodeId) {
        if !self.root.remove(node) {
            self.overflow.retain(|e| e.id != node);
        }
    }

    fn update(&mut self, node: NodeId, bounds: Aabb) {
        self.remove(node);
        self.add(node, bounds);
    }

    fn query_visible(&self, frustum: &Frustum) -> Vec<NodeId> {
        let mut results = Vec::new();
        self.root.query_visible(frustum, &mut results);
        for entry in &self.overflow {
            if entry.radius <= 0.0 {
                continue;
            }
            let sphere = BoundingSphere::new(entry.position, entry.radius);
            if frustum.classify_sphere(&sphere) != Containment::Outside {
                results.push(entry.id);
            }
        }
        results
    }

    fn query_radius(&self, center: Vec3, radius: f32) -> Vec<NodeId> {
        let mut results = Vec::new();
        self.root.query_radius(center, radius, &mut results);
        for entry in &self.overflow {
            let combined = radius + entry.radius;
            if (entry.position - center).magnitude_squared() <= combined * combined {
                results.push(entry.id);
            }
        }
        results
    }

    fn len(&self) -> usize {
        self.root.count() + self.overflow.len()
    }

    fn clear(&mut self) {
        self.root = OctreeCell::new(self.root.bounds, 0);
        self.overflow.clear();
    }
}
