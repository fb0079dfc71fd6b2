//! Scene graph arena and traversal
//!
//! The `SceneGraph` owns every node in a slotmap arena and is the single
//! entry point for structural mutation, lazy transform resolution,
//! bounding-volume aggregation, and frame-stamped culling draws. Keeping
//! the operations here, rather than on the nodes themselves, lets the
//! ownership-tree invariants be checked in one place and fail fast at the
//! call site that broke them.

use slotmap::SlotMap;
use thiserror::Error;

use crate::foundation::math::{Mat4, Vec3};
use crate::scene::bounds::{Aabb, BoundingSphere};
use crate::scene::entity::SceneEntity;
use crate::scene::frame::FrameContext;
use crate::scene::frustum::{Containment, Frustum};
use crate::scene::node::{CullingStrategy, DirtyFlags, Node, NodeId, ROOT_SEEN_SENTINEL};
use crate::scene::transform::{Rotation, TransformRecipe};

/// Structural contract violations
///
/// Every variant indicates a broken ownership invariant at the call site.
/// Operations fail fast and leave the graph unchanged; none of these are
/// retried or silently corrected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    /// `add_child` target already has an owning parent
    #[error("node already has a parent")]
    AlreadyParented,

    /// `remove_child` target is not a child of the given parent
    #[error("node is not a child of the given parent")]
    NotAChild,

    /// `remove_from_parent` target is a root
    #[error("node has no parent")]
    NotParented,

    /// Attaching the node would make it its own ancestor
    #[error("attachment would create a cycle in the ownership tree")]
    OwnershipCycle,

    /// Entity attached to a node kind that forbids entities
    #[error("node does not accept entities")]
    EntitiesForbidden,

    /// World-matrix push on a node that computes its own transform
    #[error("node is not in external-transform mode")]
    NotExternallyDriven,

    /// Arena removal of a node that still has a parent or children
    #[error("node is still attached to a parent or owns children")]
    StillAttached,

    /// Handle does not refer to a live node
    #[error("node handle is stale or was never valid")]
    StaleHandle,
}

/// Traversal counters, accumulated until taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// World matrices actually recomputed
    pub transforms_resolved: u64,
    /// Nodes that passed the visibility/frame gate during draw
    pub nodes_visited: u64,
    /// Nodes whose entities were skipped by the culling test
    pub nodes_culled: u64,
    /// Entities drawn
    pub entities_drawn: u64,
}

/// Arena-backed scene hierarchy
///
/// See the [module docs](crate::scene) for the caching and invalidation
/// contract.
#[derive(Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    pending_updates: Vec<NodeId>,
    stats: GraphStats,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes in the arena
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the handle refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Move a detached node into the arena
    pub fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    /// Borrow a node for inspection
    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::StaleHandle)
    }

    /// Handles of all root nodes (no owning parent)
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Remove a fully detached node from the arena
    ///
    /// Children are never cascade-deleted: the caller must detach them
    /// first. Handles to the removed node held elsewhere (e.g. in linked
    /// lists or spatial indices) become stale and are skipped on use.
    pub fn remove(&mut self, id: NodeId) -> Result<Node, SceneError> {
        let node = self.nodes.get(id).ok_or(SceneError::StaleHandle)?;
        if node.parent.is_some() || !node.children.is_empty() {
            return Err(SceneError::StillAttached);
        }
        self.nodes.remove(id).ok_or(SceneError::StaleHandle)
    }

    // ------------------------------------------------------------------
    // Ownership tree
    // ------------------------------------------------------------------

    /// Attach `child` under `parent`
    ///
    /// The child's `parent_seen_version` is set one below the parent's
    /// current version so the next resolve recomputes its world matrix.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return Err(SceneError::StaleHandle);
        }
        if self.nodes[child].parent.is_some() {
            return Err(SceneError::AlreadyParented);
        }

        // The child must not be an ancestor of the parent (or the parent
        // itself), or the ownership tree would gain a cycle.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(SceneError::OwnershipCycle);
            }
            cursor = self.nodes[id].parent;
        }

        let parent_version = self.nodes[parent].transform_version;
        {
            let child_node = &mut self.nodes[child];
            child_node.parent = Some(parent);
            child_node.parent_seen_version = parent_version.wrapping_sub(1);
        }
        self.nodes[parent].children.push(child);
        self.mark_volumes_stale(parent);

        log::debug!("attached {child:?} under {parent:?}");
        Ok(())
    }

    /// Detach `child` from `parent`
    ///
    /// The child stays in the arena as a root and keeps its own subtree.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::StaleHandle);
        }
        let child_node = self.nodes.get(child).ok_or(SceneError::StaleHandle)?;
        if child_node.parent != Some(parent) {
            return Err(SceneError::NotAChild);
        }

        let position = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(SceneError::NotAChild)?;
        self.nodes[parent].children.remove(position);

        let child_node = &mut self.nodes[child];
        child_node.parent = None;
        // Anything but the root sentinel forces a world resync as a root.
        child_node.parent_seen_version = 0;

        self.mark_volumes_stale(parent);
        log::debug!("detached {child:?} from {parent:?}");
        Ok(())
    }

    /// Detach a node from its current parent
    pub fn remove_from_parent(&mut self, child: NodeId) -> Result<(), SceneError> {
        let parent = self
            .nodes
            .get(child)
            .ok_or(SceneError::StaleHandle)?
            .parent
            .ok_or(SceneError::NotParented)?;
        self.remove_child(parent, child)
    }

    // ------------------------------------------------------------------
    // Entities and auxiliary links
    // ------------------------------------------------------------------

    /// Attach a leaf drawable to a node
    pub fn attach_entity(
        &mut self,
        id: NodeId,
        entity: Box<dyn SceneEntity>,
    ) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        if !node.entities_allowed {
            return Err(SceneError::EntitiesForbidden);
        }
        node.entities.push(entity);
        self.mark_volumes_stale(id);
        Ok(())
    }

    /// Detach all entities from a node, returning how many were removed
    pub fn clear_entities(&mut self, id: NodeId) -> Result<usize, SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        let removed = node.entities.len();
        node.entities.clear();
        if removed > 0 {
            self.mark_volumes_stale(id);
        }
        Ok(removed)
    }

    /// Record a non-owning auxiliary link from `from` to `to`
    ///
    /// Links never participate in transform propagation or ownership; they
    /// exist for external structures such as spatial indices. Linking is
    /// idempotent.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(to) {
            return Err(SceneError::StaleHandle);
        }
        let node = self.nodes.get_mut(from).ok_or(SceneError::StaleHandle)?;
        if !node.linked.contains(&to) {
            node.linked.push(to);
        }
        Ok(())
    }

    /// Remove a previously recorded auxiliary link
    pub fn unlink(&mut self, from: NodeId, to: NodeId) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(from).ok_or(SceneError::StaleHandle)?;
        node.linked.retain(|&l| l != to);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Set the recipe position; no-op in external-transform mode
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.mutate_recipe(id, |recipe| recipe.position = position)
    }

    /// Set the recipe rotation; no-op in external-transform mode
    pub fn set_rotation(&mut self, id: NodeId, rotation: Rotation) -> Result<(), SceneError> {
        self.mutate_recipe(id, |recipe| recipe.rotation = rotation)
    }

    /// Set the recipe scale; no-op in external-transform mode
    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) -> Result<(), SceneError> {
        self.mutate_recipe(id, |recipe| recipe.scale = scale)
    }

    /// Replace the whole recipe; no-op in external-transform mode
    pub fn set_recipe(&mut self, id: NodeId, recipe: TransformRecipe) -> Result<(), SceneError> {
        self.mutate_recipe(id, |slot| *slot = recipe)
    }

    fn mutate_recipe(
        &mut self,
        id: NodeId,
        write: impl FnOnce(&mut TransformRecipe),
    ) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        if node.external_transform {
            return Ok(());
        }
        write(&mut node.recipe);
        node.dirty.insert(DirtyFlags::LOCAL);
        if !node.queued {
            node.queued = true;
            self.pending_updates.push(id);
        }
        Ok(())
    }

    /// Push a world matrix into an externally driven node
    ///
    /// Bumps the transform version and invalidates bounding caches up the
    /// ownership chain, exactly as a resolved recomputation would.
    pub fn set_world_matrix(&mut self, id: NodeId, world: Mat4) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        if !node.external_transform {
            return Err(SceneError::NotExternallyDriven);
        }
        node.world_matrix = world;
        node.transform_version += 1;
        node.dirty.insert(DirtyFlags::VOLUMES);
        let parent = node.parent;
        if let Some(parent) = parent {
            self.mark_volumes_stale(parent);
        }
        Ok(())
    }

    /// Toggle external-transform mode
    ///
    /// Leaving external mode re-queues the node so its matrices are rebuilt
    /// from the recipe on the next flush.
    pub fn set_external_transform(&mut self, id: NodeId, external: bool) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        if node.external_transform == external {
            return Ok(());
        }
        node.external_transform = external;
        if !external {
            node.dirty.insert(DirtyFlags::LOCAL);
            if !node.queued {
                node.queued = true;
                self.pending_updates.push(id);
            }
        }
        Ok(())
    }

    /// Set node visibility
    ///
    /// Parents aggregate only visible children, so a change invalidates
    /// bounding caches up the ownership chain.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        if node.visible == visible {
            return Ok(());
        }
        node.visible = visible;
        let parent = node.parent;
        if let Some(parent) = parent {
            self.mark_volumes_stale(parent);
        }
        Ok(())
    }

    /// Set the node's name
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        node.name = Some(name.into());
        Ok(())
    }

    /// Store opaque user data on a node
    pub fn set_user_data(
        &mut self,
        id: NodeId,
        data: Box<dyn std::any::Any>,
    ) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        node.user_data = Some(data);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pending-update queue
    // ------------------------------------------------------------------

    /// Drain the queue of nodes mutated since the last drain
    ///
    /// Each mutated node appears exactly once regardless of how many
    /// setters touched it. The surrounding engine processes the batch by
    /// resolving (or feeding a spatial index); [`Self::flush_updates`]
    /// does the resolve directly.
    pub fn take_pending_updates(&mut self) -> Vec<NodeId> {
        let pending = std::mem::take(&mut self.pending_updates);
        for &id in &pending {
            if let Some(node) = self.nodes.get_mut(id) {
                node.queued = false;
            }
        }
        pending
    }

    /// Drain the pending-update queue and resolve each node's transform
    ///
    /// Returns the number of nodes processed. Stale handles left in the
    /// queue by removals are skipped.
    pub fn flush_updates(&mut self) -> Result<usize, SceneError> {
        let pending = self.take_pending_updates();
        let mut processed = 0;
        for id in pending {
            if self.nodes.contains_key(id) {
                self.resolve_transform(id)?;
                processed += 1;
            }
        }
        Ok(processed)
    }

    // ------------------------------------------------------------------
    // Transform resolution
    // ------------------------------------------------------------------

    /// Lazily bring a node's local and world matrices up to date
    ///
    /// Ancestors resolve first so the parent's world matrix and version
    /// are current. The world matrix is recomputed only when the node was
    /// locally dirty or the parent's version moved past
    /// `parent_seen_version`; only that recomputation bumps the node's own
    /// `transform_version` and invalidates bounding caches up the chain.
    pub fn resolve_transform(&mut self, id: NodeId) -> Result<(), SceneError> {
        let parent = self.nodes.get(id).ok_or(SceneError::StaleHandle)?.parent;
        if let Some(parent) = parent {
            self.resolve_transform(parent)?;
        }

        let (parent_world, expected_seen) = match parent {
            Some(parent) => {
                let parent_node = &self.nodes[parent];
                (Some(parent_node.world_matrix), parent_node.transform_version)
            }
            None => (None, ROOT_SEEN_SENTINEL),
        };

        let node = self.nodes.get_mut(id).ok_or(SceneError::StaleHandle)?;
        if node.external_transform {
            return Ok(());
        }

        let locally_dirty = node.dirty.contains(DirtyFlags::LOCAL);
        if locally_dirty {
            node.local_matrix = node.recipe.build();
            node.dirty.remove(DirtyFlags::LOCAL);
        }

        if locally_dirty || node.parent_seen_version != expected_seen {
            node.world_matrix = match parent_world {
                Some(parent_world) => parent_world * node.local_matrix,
                None => node.local_matrix,
            };
            node.parent_seen_version = expected_seen;
            node.transform_version += 1;
            node.dirty.insert(DirtyFlags::VOLUMES);
            self.stats.transforms_resolved += 1;
            log::trace!(
                "recomputed world matrix for {id:?} (version {})",
                self.nodes[id].transform_version
            );

            // A child's recomputation dirties ancestor bounding caches but
            // never bumps their transform versions.
            if let Some(parent) = parent {
                self.mark_volumes_stale(parent);
            }
        }

        Ok(())
    }

    /// Resolved local matrix accessor
    pub fn local_matrix(&mut self, id: NodeId) -> Result<Mat4, SceneError> {
        self.resolve_transform(id)?;
        Ok(self.nodes[id].local_matrix)
    }

    /// Resolved world matrix accessor
    pub fn world_matrix(&mut self, id: NodeId) -> Result<Mat4, SceneError> {
        self.resolve_transform(id)?;
        Ok(self.nodes[id].world_matrix)
    }

    /// Current transform version, for external per-entity caching
    pub fn transform_version(&self, id: NodeId) -> Result<u64, SceneError> {
        Ok(self.node(id)?.transform_version)
    }

    fn resolve_subtree(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.resolve_transform(id)?;
        let children = self.nodes[id].children.clone();
        for child in children {
            self.resolve_subtree(child)?;
        }
        Ok(())
    }

    /// Mark bounding and culling caches stale from `start` up to the root
    fn mark_volumes_stale(&mut self, start: NodeId) {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get_mut(id) else {
                break;
            };
            node.dirty.insert(DirtyFlags::VOLUMES);
            cursor = node.parent;
        }
    }

    // ------------------------------------------------------------------
    // Bounding volumes
    // ------------------------------------------------------------------

    /// Aggregated world-space bounding box of a node's subtree
    ///
    /// Resolves pending transforms below the node first, then recomputes
    /// only if the box cache is dirty. Invisible children and entities are
    /// excluded; degenerate contributions are skipped; a node with no
    /// content yields the degenerate sentinel.
    pub fn bounding_box(&mut self, id: NodeId) -> Result<Aabb, SceneError> {
        self.resolve_subtree(id)?;
        self.compute_bounding_box(id)
    }

    /// Aggregated world-space bounding sphere of a node's subtree
    ///
    /// Same contract as [`Self::bounding_box`], with spheres merged by the
    /// smallest-enclosing-sphere-of-two-spheres rule.
    pub fn bounding_sphere(&mut self, id: NodeId) -> Result<BoundingSphere, SceneError> {
        self.resolve_subtree(id)?;
        self.compute_bounding_sphere(id)
    }

    fn compute_bounding_box(&mut self, id: NodeId) -> Result<Aabb, SceneError> {
        {
            let node = self.nodes.get(id).ok_or(SceneError::StaleHandle)?;
            if !node.dirty.contains(DirtyFlags::BOX) {
                return Ok(node.bounding_box);
            }
        }

        let mut merged: Option<Aabb> = None;
        let children = self.nodes[id].children.clone();
        for child in children {
            if !self.nodes.get(child).is_some_and(|c| c.visible) {
                continue;
            }
            let child_box = self.compute_bounding_box(child)?;
            if child_box.is_degenerate() {
                continue;
            }
            merged = Some(merged.map_or(child_box, |acc| acc.merged(&child_box)));
        }

        let node = &mut self.nodes[id];
        let version = node.transform_version;
        let local = node.local_matrix;
        let world = node.world_matrix;
        for entity in &mut node.entities {
            if !entity.visible() {
                continue;
            }
            let entity_box = entity.bounding_box(version, &local, &world);
            if entity_box.is_degenerate() {
                continue;
            }
            merged = Some(merged.map_or(entity_box, |acc| acc.merged(&entity_box)));
        }

        let result = merged.unwrap_or_else(Aabb::empty);
        node.bounding_box = result;
        node.dirty.remove(DirtyFlags::BOX);
        Ok(result)
    }

    fn compute_bounding_sphere(&mut self, id: NodeId) -> Result<BoundingSphere, SceneError> {
        {
            let node = self.nodes.get(id).ok_or(SceneError::StaleHandle)?;
            if !node.dirty.contains(DirtyFlags::SPHERE) {
                return Ok(node.bounding_sphere);
            }
        }

        let mut merged: Option<BoundingSphere> = None;
        let children = self.nodes[id].children.clone();
        for child in children {
            if !self.nodes.get(child).is_some_and(|c| c.visible) {
                continue;
            }
            let child_sphere = self.compute_bounding_sphere(child)?;
            if child_sphere.is_degenerate() {
                continue;
            }
            merged = Some(merged.map_or(child_sphere, |acc| acc.merged(&child_sphere)));
        }

        let node = &mut self.nodes[id];
        let version = node.transform_version;
        let local = node.local_matrix;
        let world = node.world_matrix;
        for entity in &mut node.entities {
            if !entity.visible() {
                continue;
            }
            let entity_sphere = entity.bounding_sphere(version, &local, &world);
            if entity_sphere.is_degenerate() {
                continue;
            }
            merged = Some(merged.map_or(entity_sphere, |acc| acc.merged(&entity_sphere)));
        }

        let result = merged.unwrap_or_else(BoundingSphere::empty);
        node.bounding_sphere = result;
        node.dirty.remove(DirtyFlags::SPHERE);
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------

    /// Whether the node's bounding volume reaches into the view volume
    ///
    /// A degenerate volume is never in screen. Nodes with culling disabled
    /// report `true` (fail open).
    pub fn is_in_screen(&mut self, id: NodeId, frustum: &Frustum) -> Result<bool, SceneError> {
        match self.node(id)?.culling {
            CullingStrategy::Disabled => Ok(true),
            CullingStrategy::BoundingBox => {
                let aabb = self.bounding_box(id)?;
                Ok(!aabb.is_degenerate() && frustum.classify_aabb(&aabb) != Containment::Outside)
            }
            CullingStrategy::BoundingSphere => {
                let sphere = self.bounding_sphere(id)?;
                Ok(!sphere.is_degenerate()
                    && frustum.classify_sphere(&sphere) != Containment::Outside)
            }
        }
    }

    /// Whether the node's bounding volume straddles the view boundary
    pub fn is_partly_in_screen(
        &mut self,
        id: NodeId,
        frustum: &Frustum,
    ) -> Result<bool, SceneError> {
        match self.node(id)?.culling {
            CullingStrategy::Disabled => Ok(false),
            CullingStrategy::BoundingBox => {
                let aabb = self.bounding_box(id)?;
                Ok(!aabb.is_degenerate()
                    && frustum.classify_aabb(&aabb) == Containment::Intersects)
            }
            CullingStrategy::BoundingSphere => {
                let sphere = self.bounding_sphere(id)?;
                Ok(!sphere.is_degenerate()
                    && frustum.classify_sphere(&sphere) == Containment::Intersects)
            }
        }
    }

    /// Whether drawing should skip the node's entities this frame
    pub fn should_cull(&mut self, id: NodeId, frustum: &Frustum) -> Result<bool, SceneError> {
        Ok(!self.is_in_screen(id, frustum)?)
    }

    fn refresh_culling_data(&mut self, id: NodeId) {
        // Both built-in strategies read the cached bounding volume directly
        // rather than maintaining separate culling state, so there is
        // nothing to rebuild here; the flag records when a refresh would
        // have been needed.
        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty.remove(DirtyFlags::CULLING);
        }
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Draw a subtree for the context's current frame
    ///
    /// A node draws only when it is visible and has not been stamped with
    /// this frame number, unless `force_redraw` repeats it within the
    /// frame or `force_draw` overrides the visibility gate entirely.
    /// Culling skips a node's own entities but never prunes recursion into
    /// children; with culling disabled or no frustum installed the node
    /// fails open and draws. Children recurse before entities, both in
    /// insertion order.
    pub fn draw(
        &mut self,
        id: NodeId,
        ctx: &FrameContext,
        force_redraw: bool,
        force_draw: bool,
    ) -> Result<(), SceneError> {
        let node = self.nodes.get(id).ok_or(SceneError::StaleHandle)?;
        let already_drawn = node.last_draw_frame == Some(ctx.frame());
        if !(force_draw || (node.visible && (force_redraw || !already_drawn))) {
            return Ok(());
        }

        self.resolve_transform(id)?;
        self.stats.nodes_visited += 1;

        let culled = match (self.nodes[id].culling, ctx.frustum()) {
            (CullingStrategy::Disabled, _) | (_, None) => false,
            (_, Some(frustum)) => {
                // Settle pending descendant transforms first so the dirty
                // bits they propagate are already here when the refresh
                // hook clears them.
                self.resolve_subtree(id)?;
                if self.nodes[id].dirty.contains(DirtyFlags::CULLING) {
                    self.refresh_culling_data(id);
                }
                self.should_cull(id, frustum)?
            }
        };
        if culled {
            self.stats.nodes_culled += 1;
            log::trace!("culled entities of {id:?} at frame {}", ctx.frame());
        }

        self.nodes[id].last_draw_frame = Some(ctx.frame());

        let children = self.nodes[id].children.clone();
        for child in children {
            self.draw(child, ctx, force_redraw, force_draw)?;
        }

        if !culled {
            let node = &mut self.nodes[id];
            let local = node.local_matrix;
            let world = node.world_matrix;
            let mut drawn = 0;
            for entity in &mut node.entities {
                if !entity.visible() {
                    continue;
                }
                entity.draw(&local, &world);
                drawn += 1;
            }
            self.stats.entities_drawn += drawn;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Cloning
    // ------------------------------------------------------------------

    /// Prototype copy of a node
    ///
    /// Duplicates the recipe, flags, culling strategy, and matrices, and
    /// carries the last-known bounding volumes as a non-authoritative hint
    /// so the copy is not forced through an immediate recomputation. The
    /// copy is detached and has no children, entities, or links; the
    /// caller re-populates the hierarchy.
    pub fn clone_node(&mut self, id: NodeId) -> Result<NodeId, SceneError> {
        let source = self.nodes.get(id).ok_or(SceneError::StaleHandle)?;
        let copy = Node {
            name: source.name.clone(),
            user_data: None,
            parent: None,
            children: Vec::new(),
            entities: Vec::new(),
            linked: Vec::new(),
            recipe: source.recipe.clone(),
            local_matrix: source.local_matrix,
            world_matrix: source.world_matrix,
            bounding_box: source.bounding_box,
            bounding_sphere: source.bounding_sphere,
            // Transform recomputes on first use; the volume hint is served
            // until that bump re-dirties it.
            dirty: DirtyFlags::LOCAL,
            transform_version: 0,
            parent_seen_version: 0,
            visible: source.visible,
            external_transform: source.external_transform,
            entities_allowed: source.entities_allowed,
            culling: source.culling,
            queued: false,
            last_draw_frame: None,
        };
        Ok(self.nodes.insert(copy))
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Counters accumulated since the last [`Self::take_stats`]
    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    /// Return and reset the accumulated counters
    pub fn take_stats(&mut self) -> GraphStats {
        std::mem::take(&mut self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::entity::MeshEntity;

    fn unit_entity() -> Box<dyn SceneEntity> {
        Box::new(MeshEntity::new(Aabb::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
        )))
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut graph = SceneGraph::new();
        let id = graph.insert(Node::new().with_name("root"));

        assert!(graph.contains(id));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(id).unwrap().name(), Some("root"));
        assert_eq!(graph.roots(), vec![id]);
    }

    #[test]
    fn test_remove_requires_detached_node() {
        let mut graph = SceneGraph::new();
        let parent = graph.insert(Node::new());
        let child = graph.insert(Node::new());
        graph.add_child(parent, child).unwrap();

        assert!(matches!(graph.remove(child), Err(SceneError::StillAttached)));
        assert!(matches!(graph.remove(parent), Err(SceneError::StillAttached)));

        graph.remove_child(parent, child).unwrap();
        assert!(graph.remove(child).is_ok());
        assert!(graph.remove(parent).is_ok());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_stale_handle_after_removal() {
        let mut graph = SceneGraph::new();
        let id = graph.insert(Node::new());
        graph.remove(id).unwrap();

        assert_eq!(graph.resolve_transform(id), Err(SceneError::StaleHandle));
        assert_eq!(graph.bounding_box(id), Err(SceneError::StaleHandle));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(Node::new());
        let b = graph.insert(Node::new());
        graph.add_child(a, b).unwrap();

        assert_eq!(graph.add_child(b, a), Err(SceneError::OwnershipCycle));
        assert_eq!(graph.add_child(a, a), Err(SceneError::OwnershipCycle));
    }

    #[test]
    fn test_linked_nodes_are_non_owning() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(Node::new());
        let b = graph.insert(Node::new());

        graph.link(a, b).unwrap();
        graph.link(a, b).unwrap(); // idempotent
        assert_eq!(graph.node(a).unwrap().linked(), &[b]);
        assert!(graph.node(b).unwrap().parent().is_none());

        // A link in the other direction is fine: links are outside the
        // ownership tree and cannot form ownership cycles.
        graph.link(b, a).unwrap();

        graph.unlink(a, b).unwrap();
        assert!(graph.node(a).unwrap().linked().is_empty());
    }

    #[test]
    fn test_grouping_node_rejects_entities() {
        let mut graph = SceneGraph::new();
        let id = graph.insert(Node::grouping());

        assert_eq!(
            graph.attach_entity(id, unit_entity()),
            Err(SceneError::EntitiesForbidden)
        );
        assert_eq!(graph.node(id).unwrap().entity_count(), 0);
    }

    #[test]
    fn test_clear_entities_dirties_bounds() {
        let mut graph = SceneGraph::new();
        let id = graph.insert(Node::new());
        graph.attach_entity(id, unit_entity()).unwrap();

        let before = graph.bounding_box(id).unwrap();
        assert!(!before.is_degenerate());

        assert_eq!(graph.clear_entities(id).unwrap(), 1);
        let after = graph.bounding_box(id).unwrap();
        assert!(after.is_degenerate());
    }

    #[test]
    fn test_stats_accumulate_and_reset() {
        let mut graph = SceneGraph::new();
        let id = graph.insert(Node::new());
        graph.resolve_transform(id).unwrap();

        assert_eq!(graph.stats().transforms_resolved, 1);
        assert_eq!(graph.take_stats().transforms_resolved, 1);
        assert_eq!(graph.stats(), GraphStats::default());
    }
}
