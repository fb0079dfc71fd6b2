//! Leaf drawables and their bounding caches
//!
//! Entities are the drawable leaves attached to scene nodes. Each entity
//! caches its own bounding volumes tagged with the owning node's transform
//! version: when the tag differs from the node's current version the
//! entity recomputes, otherwise the cached volume is served as-is. This is
//! the same staleness pattern the nodes use, applied one level below, and
//! it keeps node-level aggregation cheap — only entities whose owning node
//! actually moved get re-touched.

use crate::foundation::math::Mat4;
use crate::scene::bounds::{Aabb, BoundingSphere};

/// Capability required of any leaf drawable attached to a scene node
///
/// The owning node passes its current transform version and matrices into
/// every call, so entities never hold references back into the graph.
pub trait SceneEntity {
    /// Whether this entity participates in drawing and aggregation
    fn visible(&self) -> bool {
        true
    }

    /// Draw the entity using the owning node's resolved matrices
    fn draw(&mut self, local: &Mat4, world: &Mat4);

    /// World-space bounding box, recomputed only when `node_version` moved
    fn bounding_box(&mut self, node_version: u64, local: &Mat4, world: &Mat4) -> Aabb;

    /// World-space bounding sphere, recomputed only when `node_version` moved
    fn bounding_sphere(&mut self, node_version: u64, local: &Mat4, world: &Mat4)
        -> BoundingSphere;
}

/// Version-tagged bounding-volume cache
///
/// Reusable helper for `SceneEntity` implementations: stores both volumes
/// plus the node transform version they were computed at.
#[derive(Debug, Clone)]
pub struct CachedBounds {
    bounding_box: Aabb,
    bounding_sphere: BoundingSphere,
    seen_version: Option<u64>,
}

impl Default for CachedBounds {
    fn default() -> Self {
        Self::new()
    }
}

impl CachedBounds {
    /// Create an unpopulated cache
    pub fn new() -> Self {
        Self {
            bounding_box: Aabb::empty(),
            bounding_sphere: BoundingSphere::empty(),
            seen_version: None,
        }
    }

    /// Whether the cache must be recomputed for the given node version
    pub fn is_stale(&self, node_version: u64) -> bool {
        self.seen_version != Some(node_version)
    }

    /// Store freshly computed volumes and remember the version tag
    pub fn store(&mut self, node_version: u64, aabb: Aabb, sphere: BoundingSphere) {
        self.bounding_box = aabb;
        self.bounding_sphere = sphere;
        self.seen_version = Some(node_version);
    }

    /// The cached bounding box
    pub fn bounding_box(&self) -> Aabb {
        self.bounding_box
    }

    /// The cached bounding sphere
    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }
}

/// A mesh-shaped drawable with a fixed model-space bounding box
///
/// Stands in for real renderable geometry: the world-space volumes are
/// derived by transforming the model-space box through the owning node's
/// world matrix.
#[derive(Debug, Clone)]
pub struct MeshEntity {
    local_bounds: Aabb,
    visible: bool,
    cache: CachedBounds,
}

impl MeshEntity {
    /// Create a mesh entity from its model-space bounding box
    pub fn new(local_bounds: Aabb) -> Self {
        Self {
            local_bounds,
            visible: true,
            cache: CachedBounds::new(),
        }
    }

    /// Create a mesh entity enclosing a set of model-space points
    pub fn from_points(points: &[crate::foundation::math::Vec3]) -> Self {
        Self::new(Aabb::from_points(points))
    }

    /// Set entity visibility
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// The model-space bounding box
    pub fn local_bounds(&self) -> Aabb {
        self.local_bounds
    }

    fn refresh(&mut self, node_version: u64, world: &Mat4) {
        if self.cache.is_stale(node_version) {
            let world_box = self.local_bounds.transformed(world);
            let world_sphere = BoundingSphere::from_aabb(&world_box);
            self.cache.store(node_version, world_box, world_sphere);
            log::trace!("mesh entity bounds recomputed at node version {node_version}");
        }
    }
}

impl SceneEntity for MeshEntity {
    fn visible(&self) -> bool {
        self.visible
    }

    fn draw(&mut self, _local: &Mat4, world: &Mat4) {
        log::trace!(
            "drawing mesh entity at ({:.2}, {:.2}, {:.2})",
            world[(0, 3)],
            world[(1, 3)],
            world[(2, 3)]
        );
    }

    fn bounding_box(&mut self, node_version: u64, _local: &Mat4, world: &Mat4) -> Aabb {
        self.refresh(node_version, world);
        self.cache.bounding_box()
    }

    fn bounding_sphere(
        &mut self,
        node_version: u64,
        _local: &Mat4,
        world: &Mat4,
    ) -> BoundingSphere {
        self.refresh(node_version, world);
        self.cache.bounding_sphere()
    }
}
