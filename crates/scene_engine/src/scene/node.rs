//! Scene node state
//!
//! Nodes live in the [`SceneGraph`](crate::scene::SceneGraph) arena and
//! reference each other through [`NodeId`] handles. A node owns its
//! transform recipe, matrix caches, version counters, attached entities,
//! and child handles; all structural operations go through the graph so
//! the ownership-tree invariants stay checkable in one place.

use std::any::Any;

use crate::foundation::math::Mat4;
use crate::scene::bounds::{Aabb, BoundingSphere};
use crate::scene::entity::SceneEntity;
use crate::scene::transform::TransformRecipe;

slotmap::new_key_type! {
    /// Stable handle to a node stored in the scene graph arena
    pub struct NodeId;
}

/// `parent_seen_version` value marking a root whose world matrix is in
/// sync with its own local matrix. Any other value forces a resync.
pub(crate) const ROOT_SEEN_SENTINEL: u64 = u64::MAX;

bitflags::bitflags! {
    /// Dirty bits guarding a node's cached values
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        /// Local matrix is out of date with respect to the recipe
        const LOCAL = 1 << 0;
        /// Cached bounding box is out of date
        const BOX = 1 << 1;
        /// Cached bounding sphere is out of date
        const SPHERE = 1 << 2;
        /// Cached culling data is out of date
        const CULLING = 1 << 3;
    }
}

impl DirtyFlags {
    /// Bits invalidated when a node's world matrix or membership changes
    pub(crate) const VOLUMES: Self = Self::BOX.union(Self::SPHERE).union(Self::CULLING);
}

/// Visibility-test strategy selected per node at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullingStrategy {
    /// No culling: the node always draws its entities
    #[default]
    Disabled,
    /// Test the node's aggregated bounding box against the frustum
    BoundingBox,
    /// Test the node's aggregated bounding sphere against the frustum
    BoundingSphere,
}

/// Hierarchical unit of the scene graph
///
/// Constructed detached and dirty, which forces one initial transform
/// computation on first use. Attach with
/// [`SceneGraph::add_child`](crate::scene::SceneGraph::add_child).
pub struct Node {
    pub(crate) name: Option<String>,
    pub(crate) user_data: Option<Box<dyn Any>>,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) entities: Vec<Box<dyn SceneEntity>>,
    pub(crate) linked: Vec<NodeId>,

    pub(crate) recipe: TransformRecipe,
    pub(crate) local_matrix: Mat4,
    pub(crate) world_matrix: Mat4,
    pub(crate) bounding_box: Aabb,
    pub(crate) bounding_sphere: BoundingSphere,
    pub(crate) dirty: DirtyFlags,

    pub(crate) transform_version: u64,
    pub(crate) parent_seen_version: u64,

    pub(crate) visible: bool,
    pub(crate) external_transform: bool,
    pub(crate) entities_allowed: bool,
    pub(crate) culling: CullingStrategy,
    pub(crate) queued: bool,

    pub(crate) last_draw_frame: Option<u64>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// Create a detached node with an identity recipe and no culling
    pub fn new() -> Self {
        Self {
            name: None,
            user_data: None,
            parent: None,
            children: Vec::new(),
            entities: Vec::new(),
            linked: Vec::new(),
            recipe: TransformRecipe::identity(),
            local_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
            bounding_box: Aabb::empty(),
            bounding_sphere: BoundingSphere::empty(),
            dirty: DirtyFlags::all(),
            transform_version: 0,
            parent_seen_version: 0,
            visible: true,
            external_transform: false,
            entities_allowed: true,
            culling: CullingStrategy::Disabled,
            queued: false,
            last_draw_frame: None,
        }
    }

    /// Create a detached node with the given culling strategy
    pub fn with_culling(culling: CullingStrategy) -> Self {
        Self {
            culling,
            ..Self::new()
        }
    }

    /// Create a pure grouping node that rejects entity attachment
    pub fn grouping() -> Self {
        Self {
            entities_allowed: false,
            ..Self::new()
        }
    }

    /// Builder pattern: set the node name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder pattern: set the transform recipe
    pub fn with_recipe(mut self, recipe: TransformRecipe) -> Self {
        self.recipe = recipe;
        self
    }

    /// Builder pattern: set initial visibility
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Builder pattern: let an external system (e.g. physics) drive the
    /// world matrix directly
    pub fn with_external_transform(mut self) -> Self {
        self.external_transform = true;
        self
    }

    /// Optional string identifier
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Owning parent handle, `None` for roots
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Owned child handles in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Non-owning auxiliary links in insertion order
    pub fn linked(&self) -> &[NodeId] {
        &self.linked
    }

    /// Number of attached entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// The authored local transform
    pub fn recipe(&self) -> &TransformRecipe {
        &self.recipe
    }

    /// Cached local matrix (may be stale until the next resolve)
    pub fn local_matrix(&self) -> Mat4 {
        self.local_matrix
    }

    /// Cached world matrix (may be stale until the next resolve)
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    /// Monotonic counter bumped once per actual world-matrix recomputation
    pub fn transform_version(&self) -> u64 {
        self.transform_version
    }

    /// Whether this node participates in drawing and aggregation
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Whether an external system pushes this node's world matrix
    pub fn is_externally_driven(&self) -> bool {
        self.external_transform
    }

    /// Whether entities may be attached to this node
    pub fn entities_allowed(&self) -> bool {
        self.entities_allowed
    }

    /// The node's culling strategy
    pub fn culling_strategy(&self) -> CullingStrategy {
        self.culling
    }

    /// Frame number at which this node was last drawn
    pub fn last_draw_frame(&self) -> Option<u64> {
        self.last_draw_frame
    }

    /// Current dirty bits (primarily for diagnostics)
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    /// Opaque user-data slot
    pub fn user_data(&self) -> Option<&dyn Any> {
        self.user_data.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_detached_and_dirty() {
        let node = Node::new();
        assert!(node.parent().is_none());
        assert!(node.children().is_empty());
        assert_eq!(node.entity_count(), 0);
        assert_eq!(node.dirty_flags(), DirtyFlags::all());
        assert_eq!(node.transform_version(), 0);
        assert!(node.visible());
        assert!(node.last_draw_frame().is_none());
    }

    #[test]
    fn test_grouping_node_forbids_entities() {
        assert!(!Node::grouping().entities_allowed());
        assert!(Node::new().entities_allowed());
    }

    #[test]
    fn test_builder_flags() {
        let node = Node::with_culling(CullingStrategy::BoundingSphere)
            .with_name("hull")
            .with_visible(false)
            .with_external_transform();

        assert_eq!(node.culling_strategy(), CullingStrategy::BoundingSphere);
        assert_eq!(node.name(), Some("hull"));
        assert!(!node.visible());
        assert!(node.is_externally_driven());
    }
}
