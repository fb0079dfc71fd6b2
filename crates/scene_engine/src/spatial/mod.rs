//! Spatial indexing over scene-node handles
//!
//! External acceleration structures keyed by [`NodeId`]. An index never
//! owns nodes and the graph never pushes into it: the integrator feeds it
//! fresh bounding volumes (typically from the drained pending-update
//! queue) by calling [`SpatialIndex::update`]. The node-level `linked`
//! list is the storage primitive intended for wiring nodes to structures
//! like these.

mod octree;

pub use octree::{NodeOctree, OctreeConfig};

use crate::foundation::math::Vec3;
use crate::scene::{Aabb, Containment, Frustum, NodeId};

/// Trait for spatial data structures used in scene management
///
/// Allows pluggable index implementations (list, octree, and so on)
/// behind one query surface.
pub trait SpatialIndex {
    /// Add a node with its world-space bounding volume
    fn add(&mut self, node: NodeId, bounds: Aabb);

    /// Remove a node from the index
    fn remove(&mut self, node: NodeId);

    /// Replace a node's bounding volume (after its transform changed)
    fn update(&mut self, node: NodeId, bounds: Aabb);

    /// All nodes whose volumes reach into the frustum
    fn query_visible(&self, frustum: &Frustum) -> Vec<NodeId>;

    /// All nodes whose volumes touch a sphere around `center`
    fn query_radius(&self, center: Vec3, radius: f32) -> Vec<NodeId>;

    /// Number of indexed nodes
    fn len(&self) -> usize;

    /// Whether the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all nodes from the index
    fn clear(&mut self);
}

/// Simple list-based index (no spatial optimization)
///
/// Performs a linear scan for every query. Sufficient for small scenes;
/// swap in [`NodeOctree`] behind the same trait when counts grow.
#[derive(Debug, Default)]
pub struct SimpleListIndex {
    entries: Vec<(NodeId, Aabb)>,
}

impl SimpleListIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialIndex for SimpleListIndex {
    fn add(&mut self, node: NodeId, bounds: Aabb) {
        self.entries.push((node, bounds));
    }

    fn remove(&mut self, node: NodeId) {
        self.entries.retain(|(id, _)| *id != node);
    }

    fn update(&mut self, node: NodeId, bounds: Aabb) {
        if let Some(entry) = self.entries.iter_mut().find(|(id, _)| *id == node) {
            entry.1 = bounds;
        }
    }

    fn query_visible(&self, frustum: &Frustum) -> Vec<NodeId> {
        self.entries
            .iter()
            .filter(|(_, bounds)| {
                !bounds.is_degenerate() && frustum.classify_aabb(bounds) != Containment::Outside
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn query_radius(&self, center: Vec3, radius: f32) -> Vec<NodeId> {
        let radius_squared = radius * radius;
        self.entries
            .iter()
            .filter(|(_, bounds)| {
                let closest = Vec3::new(
                    center.x.clamp(bounds.min.x, bounds.max.x),
                    center.y.clamp(bounds.min.y, bounds.max.y),
                    center.z.clamp(bounds.min.z, bounds.max.z),
                );
                (closest - center).magnitude_squared() <= radius_squared
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::scene::{Node, SceneGraph};

    fn clip_cube() -> Frustum {
        Frustum::from_view_projection(&Mat4::identity())
    }

    fn three_nodes() -> (SceneGraph, NodeId, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let a = graph.insert(Node::new());
        let b = graph.insert(Node::new());
        let c = graph.insert(Node::new());
        (graph, a, b, c)
    }

    #[test]
    fn test_list_index_add_remove() {
        let (_, a, b, _) = three_nodes();
        let mut index = SimpleListIndex::new();
        let bounds = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));

        index.add(a, bounds);
        index.add(b, bounds);
        assert_eq!(index.len(), 2);

        index.remove(a);
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_list_index_visibility_query() {
        let (_, inside, outside, degenerate) = three_nodes();
        let mut index = SimpleListIndex::new();

        index.add(
            inside,
            Aabb::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5)),
        );
        index.add(
            outside,
            Aabb::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(6.0, 6.0, 6.0)),
        );
        index.add(degenerate, Aabb::empty());

        let visible = index.query_visible(&clip_cube());
        assert_eq!(visible, vec![inside]);
    }

    #[test]
    fn test_list_index_radius_query() {
        let (_, near, far, _) = three_nodes();
        let mut index = SimpleListIndex::new();

        index.add(
            near,
            Aabb::from_center_extents(Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)),
        );
        index.add(
            far,
            Aabb::from_center_extents(Vec3::new(20.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)),
        );

        let hits = index.query_radius(Vec3::zeros(), 1.5);
        assert_eq!(hits, vec![near]);
    }

    #[test]
    fn test_update_moves_node_between_query_results() {
        let (_, a, _, _) = three_nodes();
        let mut index = SimpleListIndex::new();

        index.add(
            a,
            Aabb::from_center_extents(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.5, 0.5, 0.5)),
        );
        assert!(index.query_visible(&clip_cube()).is_empty());

        index.update(
            a,
            Aabb::from_center_extents(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5)),
        );
        assert_eq!(index.query_visible(&clip_cube()), vec![a]);
    }
}
