//! # Scene Engine
//!
//! The scene-graph core of a real-time 3D rendering engine: hierarchical
//! spatial nodes with lazily recomputed world transforms, aggregated
//! bounding volumes, and per-frame frustum-culled traversal.
//!
//! ## Features
//!
//! - **Arena-backed hierarchy**: nodes live in a slotmap and reference each
//!   other through stable handles, so the ownership graph can never form a
//!   reference cycle
//! - **Lazy transform resolution**: world matrices are rebuilt only when a
//!   node's own recipe changed or its parent actually moved, tracked with
//!   dirty flags and monotonic version counters
//! - **Bounding-volume aggregation**: axis-aligned boxes and spheres merged
//!   bottom-up over visible children and attached entities
//! - **Frustum culling**: per-node strategy (box, sphere, or disabled)
//!   tested against an explicit per-frame context
//! - **Spatial indexing**: pluggable list and octree indices keyed by node
//!   handles
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_engine::prelude::*;
//!
//! let mut graph = SceneGraph::new();
//! let root = graph.insert(Node::new());
//! let child = graph.insert(Node::with_culling(CullingStrategy::BoundingBox));
//! graph.add_child(root, child)?;
//!
//! graph.set_position(child, Vec3::new(5.0, 0.0, 0.0))?;
//! graph.flush_updates()?;
//!
//! let mut ctx = FrameContext::new();
//! ctx.advance();
//! graph.draw(root, &ctx, false, false)?;
//! # Ok::<(), scene_engine::scene::SceneError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod scene;
pub mod spatial;

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::{Config, ConfigError};
    pub use crate::foundation::math::{Mat4, Point3, Quat, Vec3};
    pub use crate::scene::{
        Aabb, BoundingSphere, CachedBounds, CompositionOrder, Containment, CullingStrategy,
        EulerOrder, FrameContext, Frustum, GraphStats, MeshEntity, Node, NodeId, Plane, Rotation,
        SceneEntity, SceneError, SceneGraph, TransformRecipe,
    };
    pub use crate::spatial::{NodeOctree, OctreeConfig, SimpleListIndex, SpatialIndex};
}
