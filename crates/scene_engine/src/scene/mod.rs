//! Scene graph core
//!
//! Maintains a mutable hierarchy of spatial nodes and decides per-frame
//! visibility against a view frustum.
//!
//! ## Architecture
//!
//! ```text
//! SceneGraph (arena + pending-update queue)
//!      ↓ owns
//! Node (recipe, matrix caches, version counters, culling strategy)
//!      ↓ owns
//! SceneEntity (leaf drawables with version-tagged bounding caches)
//! ```
//!
//! Mutating a node marks it dirty and enqueues it for batched processing.
//! Before any draw or bounding-volume query the node lazily rebuilds its
//! local matrix and, if itself or its parent changed, its world matrix.
//! That recomputation bumps the node's transform version and invalidates
//! cached bounding volumes up the ownership chain; culling then tests the
//! refreshed volume against the frame's view frustum.

mod bounds;
mod entity;
mod frame;
mod frustum;
mod graph;
mod node;
mod transform;

#[cfg(test)]
mod tests;

pub use bounds::{Aabb, BoundingSphere};
pub use entity::{CachedBounds, MeshEntity, SceneEntity};
pub use frame::FrameContext;
pub use frustum::{Containment, Frustum, Plane};
pub use graph::{GraphStats, SceneError, SceneGraph};
pub use node::{CullingStrategy, DirtyFlags, Node, NodeId};
pub use transform::{CompositionOrder, EulerOrder, Rotation, TransformRecipe};
