//! Frame-stamped draw and frustum-culling tests

use crate::foundation::math::{Mat4, Vec3};
use crate::scene::{
    Aabb, CullingStrategy, FrameContext, Frustum, MeshEntity, Node, NodeId, SceneGraph,
    TransformRecipe,
};

fn unit_entity() -> Box<MeshEntity> {
    Box::new(MeshEntity::new(Aabb::new(
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, 1.0),
    )))
}

fn small_entity() -> Box<MeshEntity> {
    Box::new(MeshEntity::new(Aabb::from_center_extents(
        Vec3::zeros(),
        Vec3::new(0.25, 0.25, 0.25),
    )))
}

/// Frame context whose frustum is the unit clip cube
fn context_with_frustum() -> FrameContext {
    let mut ctx = FrameContext::new();
    ctx.advance();
    ctx.set_frustum(Frustum::from_view_projection(&Mat4::identity()));
    ctx
}

fn node_at(position: Vec3, culling: CullingStrategy) -> Node {
    Node::with_culling(culling).with_recipe(TransformRecipe::from_position(position))
}

fn culling_node_with_entity(
    graph: &mut SceneGraph,
    position: Vec3,
    culling: CullingStrategy,
) -> NodeId {
    let id = graph.insert(node_at(position, culling));
    graph.attach_entity(id, small_entity()).unwrap();
    id
}

#[test]
fn test_draw_dedups_within_a_frame() {
    let mut graph = SceneGraph::new();
    let root = graph.insert(Node::new());
    graph.attach_entity(root, unit_entity()).unwrap();

    let mut ctx = FrameContext::new();
    ctx.advance();

    graph.draw(root, &ctx, false, false).unwrap();
    graph.draw(root, &ctx, false, false).unwrap();
    assert_eq!(graph.stats().entities_drawn, 1);

    // The next frame draws again.
    ctx.advance();
    graph.draw(root, &ctx, false, false).unwrap();
    assert_eq!(graph.stats().entities_drawn, 2);

    // A forced redraw repeats within the same frame.
    graph.draw(root, &ctx, true, false).unwrap();
    assert_eq!(graph.stats().entities_drawn, 3);
}

#[test]
fn test_invisible_node_skipped_unless_forced() {
    let mut graph = SceneGraph::new();
    let root = graph.insert(Node::new().with_visible(false));
    graph.attach_entity(root, unit_entity()).unwrap();

    let mut ctx = FrameContext::new();
    ctx.advance();

    graph.draw(root, &ctx, false, false).unwrap();
    assert_eq!(graph.stats().entities_drawn, 0);

    graph.draw(root, &ctx, false, true).unwrap();
    assert_eq!(graph.stats().entities_drawn, 1);
}

#[test]
fn test_invisible_entities_never_draw() {
    let mut graph = SceneGraph::new();
    let root = graph.insert(Node::new());
    let mut hidden = unit_entity();
    hidden.set_visible(false);
    graph.attach_entity(root, hidden).unwrap();
    graph.attach_entity(root, unit_entity()).unwrap();

    let mut ctx = FrameContext::new();
    ctx.advance();
    graph.draw(root, &ctx, false, false).unwrap();
    assert_eq!(graph.stats().entities_drawn, 1);
}

#[test]
fn test_culling_fails_open_without_frustum() {
    let mut graph = SceneGraph::new();
    let far_away = culling_node_with_entity(
        &mut graph,
        Vec3::new(100.0, 0.0, 0.0),
        CullingStrategy::BoundingBox,
    );

    let mut ctx = FrameContext::new();
    ctx.advance();

    graph.draw(far_away, &ctx, false, false).unwrap();
    assert_eq!(graph.stats().entities_drawn, 1);
    assert_eq!(graph.stats().nodes_culled, 0);
}

#[test]
fn test_box_culling_skips_out_of_view_entities() {
    let mut graph = SceneGraph::new();
    let inside =
        culling_node_with_entity(&mut graph, Vec3::zeros(), CullingStrategy::BoundingBox);
    let outside = culling_node_with_entity(
        &mut graph,
        Vec3::new(100.0, 0.0, 0.0),
        CullingStrategy::BoundingBox,
    );

    let ctx = context_with_frustum();
    graph.draw(inside, &ctx, false, false).unwrap();
    graph.draw(outside, &ctx, false, false).unwrap();

    assert_eq!(graph.stats().entities_drawn, 1);
    assert_eq!(graph.stats().nodes_culled, 1);
}

#[test]
fn test_sphere_culling_skips_out_of_view_entities() {
    let mut graph = SceneGraph::new();
    let inside =
        culling_node_with_entity(&mut graph, Vec3::zeros(), CullingStrategy::BoundingSphere);
    let outside = culling_node_with_entity(
        &mut graph,
        Vec3::new(100.0, 0.0, 0.0),
        CullingStrategy::BoundingSphere,
    );

    let ctx = context_with_frustum();
    graph.draw(inside, &ctx, false, false).unwrap();
    graph.draw(outside, &ctx, false, false).unwrap();

    assert_eq!(graph.stats().entities_drawn, 1);
    assert_eq!(graph.stats().nodes_culled, 1);
}

#[test]
fn test_degenerate_sphere_is_never_in_screen() {
    let mut graph = SceneGraph::new();
    // No children and no entities: the aggregate sphere has radius zero.
    let empty = graph.insert(Node::with_culling(CullingStrategy::BoundingSphere));

    let frustum = Frustum::from_view_projection(&Mat4::identity());
    assert!(!graph.is_in_screen(empty, &frustum).unwrap());
    assert!(!graph.is_partly_in_screen(empty, &frustum).unwrap());
    assert!(graph.should_cull(empty, &frustum).unwrap());
}

#[test]
fn test_degenerate_box_is_never_in_screen() {
    let mut graph = SceneGraph::new();
    let empty = graph.insert(Node::with_culling(CullingStrategy::BoundingBox));

    let frustum = Frustum::from_view_projection(&Mat4::identity());
    assert!(!graph.is_in_screen(empty, &frustum).unwrap());
}

#[test]
fn test_partly_in_screen_on_boundary_straddle() {
    let mut graph = SceneGraph::new();
    let straddling = culling_node_with_entity(
        &mut graph,
        Vec3::new(1.0, 0.0, 0.0),
        CullingStrategy::BoundingBox,
    );
    let contained =
        culling_node_with_entity(&mut graph, Vec3::zeros(), CullingStrategy::BoundingBox);

    let frustum = Frustum::from_view_projection(&Mat4::identity());
    assert!(graph.is_partly_in_screen(straddling, &frustum).unwrap());
    assert!(graph.is_in_screen(straddling, &frustum).unwrap());

    assert!(!graph.is_partly_in_screen(contained, &frustum).unwrap());
    assert!(graph.is_in_screen(contained, &frustum).unwrap());
}

#[test]
fn test_culled_parent_still_recurses_children() {
    let mut graph = SceneGraph::new();
    // Every visible descendant sits far outside the frustum, so the
    // parent's aggregate volume is out of view and its entities are
    // culled. The child has culling disabled and fails open, which is
    // observable only if recursion reached it.
    let parent = graph.insert(node_at(
        Vec3::new(100.0, 0.0, 0.0),
        CullingStrategy::BoundingBox,
    ));
    graph.attach_entity(parent, small_entity()).unwrap();
    let child = graph.insert(node_at(Vec3::new(2.0, 0.0, 0.0), CullingStrategy::Disabled));
    graph.add_child(parent, child).unwrap();
    graph.attach_entity(child, small_entity()).unwrap();

    let ctx = context_with_frustum();
    graph.draw(parent, &ctx, false, false).unwrap();

    let stats = graph.stats();
    assert_eq!(stats.nodes_culled, 1);
    assert_eq!(stats.nodes_visited, 2);
    assert_eq!(stats.entities_drawn, 1);
    assert_eq!(
        graph.node(child).unwrap().last_draw_frame(),
        Some(ctx.frame())
    );
}

#[test]
fn test_culling_follows_node_movement() {
    let mut graph = SceneGraph::new();
    let node =
        culling_node_with_entity(&mut graph, Vec3::zeros(), CullingStrategy::BoundingBox);

    let mut ctx = context_with_frustum();
    graph.draw(node, &ctx, false, false).unwrap();
    assert_eq!(graph.take_stats().entities_drawn, 1);

    // Move out of view: the next frame's aggregate is recomputed and culled.
    graph.set_position(node, Vec3::new(100.0, 0.0, 0.0)).unwrap();
    graph.flush_updates().unwrap();
    ctx.advance();
    graph.draw(node, &ctx, false, false).unwrap();
    let stats = graph.take_stats();
    assert_eq!(stats.entities_drawn, 0);
    assert_eq!(stats.nodes_culled, 1);

    // And back in.
    graph.set_position(node, Vec3::new(0.2, 0.0, 0.0)).unwrap();
    graph.flush_updates().unwrap();
    ctx.advance();
    graph.draw(node, &ctx, false, false).unwrap();
    assert_eq!(graph.take_stats().entities_drawn, 1);
}
