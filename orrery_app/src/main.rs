//! Orrery demo application
//!
//! Exercises the scene-graph core end to end with a sun/planet/moon
//! hierarchy: per-frame batched mutation, lazy transform resolution,
//! bounding-volume aggregation, frustum culling against an orbiting
//! camera, and a spatial index fed from the pending-update queue.
//!
//! Run with `RUST_LOG=info` to watch per-frame culling statistics.

use scene_engine::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Path checked for a scene layout override
const CONFIG_PATH: &str = "orrery.ron";

/// Octree world half-extent, in scene units
const WORLD_EXTENT: f32 = 200.0;

/// How far the camera orbits from the origin
const CAMERA_DISTANCE: f32 = 40.0;

/// Camera angular speed in radians per frame
const CAMERA_SPEED: f32 = 0.02;

/// A moon orbiting a planet
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MoonSpec {
    name: String,
    orbit_radius: f32,
    orbit_speed: f32,
    body_radius: f32,
}

/// A planet orbiting the sun
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanetSpec {
    name: String,
    orbit_radius: f32,
    orbit_speed: f32,
    body_radius: f32,
    moons: Vec<MoonSpec>,
}

/// Scene layout and simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrreryConfig {
    frames: u64,
    fov_degrees: f32,
    aspect: f32,
    planets: Vec<PlanetSpec>,
}

impl Default for OrreryConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            fov_degrees: 45.0,
            aspect: 16.0 / 9.0,
            planets: vec![
                PlanetSpec {
                    name: "hermes".to_string(),
                    orbit_radius: 8.0,
                    orbit_speed: 0.05,
                    body_radius: 0.8,
                    moons: vec![],
                },
                PlanetSpec {
                    name: "gaia".to_string(),
                    orbit_radius: 16.0,
                    orbit_speed: 0.02,
                    body_radius: 1.5,
                    moons: vec![MoonSpec {
                        name: "luna".to_string(),
                        orbit_radius: 3.0,
                        orbit_speed: 0.11,
                        body_radius: 0.4,
                    }],
                },
                PlanetSpec {
                    name: "kronos".to_string(),
                    orbit_radius: 30.0,
                    orbit_speed: 0.008,
                    body_radius: 3.0,
                    moons: vec![
                        MoonSpec {
                            name: "rhea".to_string(),
                            orbit_radius: 5.0,
                            orbit_speed: 0.07,
                            body_radius: 0.5,
                        },
                        MoonSpec {
                            name: "iapetus".to_string(),
                            orbit_radius: 8.0,
                            orbit_speed: 0.04,
                            body_radius: 0.6,
                        },
                    ],
                },
            ],
        }
    }
}

impl Config for OrreryConfig {}

/// A body whose position is recomputed every frame
struct OrbitingBody {
    node: NodeId,
    orbit_radius: f32,
    orbit_speed: f32,
}

struct OrreryApp {
    graph: SceneGraph,
    root: NodeId,
    bodies: Vec<OrbitingBody>,
    index: NodeOctree,
    indexed: HashSet<NodeId>,
}

impl OrreryApp {
    fn build(config: &OrreryConfig) -> Result<Self, SceneError> {
        let mut graph = SceneGraph::new();
        let mut bodies = Vec::new();

        // The sun anchors the hierarchy and carries its own body entity.
        let root = graph.insert(
            Node::with_culling(CullingStrategy::BoundingSphere).with_name("sol"),
        );
        graph.attach_entity(root, Box::new(body_entity(2.5)))?;

        for planet in &config.planets {
            let planet_node = graph.insert(
                Node::with_culling(CullingStrategy::BoundingSphere).with_name(planet.name.clone()),
            );
            graph.add_child(root, planet_node)?;
            graph.attach_entity(planet_node, Box::new(body_entity(planet.body_radius)))?;
            graph.set_position(planet_node, Vec3::new(planet.orbit_radius, 0.0, 0.0))?;
            bodies.push(OrbitingBody {
                node: planet_node,
                orbit_radius: planet.orbit_radius,
                orbit_speed: planet.orbit_speed,
            });

            for moon in &planet.moons {
                let moon_node = graph.insert(
                    Node::with_culling(CullingStrategy::BoundingBox).with_name(moon.name.clone()),
                );
                graph.add_child(planet_node, moon_node)?;
                graph.attach_entity(moon_node, Box::new(body_entity(moon.body_radius)))?;
                graph.set_position(moon_node, Vec3::new(moon.orbit_radius, 0.0, 0.0))?;
                // Wire the moon to its planet for the external index.
                graph.link(planet_node, moon_node)?;
                bodies.push(OrbitingBody {
                    node: moon_node,
                    orbit_radius: moon.orbit_radius,
                    orbit_speed: moon.orbit_speed,
                });
            }
        }

        let world = Aabb::from_center_extents(
            Vec3::zeros(),
            Vec3::new(WORLD_EXTENT, WORLD_EXTENT, WORLD_EXTENT),
        );
        let index = NodeOctree::new(world, OctreeConfig::default());

        log::info!(
            "orrery built: {} nodes, {} orbiting bodies",
            graph.node_count(),
            bodies.len()
        );

        Ok(Self {
            graph,
            root,
            bodies,
            index,
            indexed: HashSet::new(),
        })
    }

    /// Recompute orbital positions for the frame and batch them
    fn update_orbits(&mut self, frame: u64) -> Result<(), SceneError> {
        let time = frame as f32;
        for body in &self.bodies {
            let angle = body.orbit_speed * time;
            let position = Vec3::new(
                body.orbit_radius * angle.cos(),
                0.0,
                body.orbit_radius * angle.sin(),
            );
            self.graph.set_position(body.node, position)?;
        }
        Ok(())
    }

    /// Drain the pending-update queue: resolve transforms and refresh the
    /// spatial index with the nodes that actually moved
    fn process_updates(&mut self) -> Result<usize, SceneError> {
        let moved = self.graph.take_pending_updates();
        let count = moved.len();
        for id in moved {
            self.graph.resolve_transform(id)?;
            let bounds = self.graph.bounding_box(id)?;
            if self.indexed.insert(id) {
                self.index.add(id, bounds);
            } else {
                self.index.update(id, bounds);
            }
        }
        Ok(count)
    }

    fn run_frame(&mut self, ctx: &FrameContext) -> Result<(), SceneError> {
        self.graph.draw(self.root, ctx, false, false)?;

        let stats = self.graph.take_stats();
        let in_view = ctx
            .frustum()
            .map_or(0, |frustum| self.index.query_visible(frustum).len());
        log::info!(
            "frame {}: resolved {}, visited {}, culled {}, drew {} entities, {} indexed bodies in view",
            ctx.frame(),
            stats.transforms_resolved,
            stats.nodes_visited,
            stats.nodes_culled,
            stats.entities_drawn,
            in_view
        );
        Ok(())
    }
}

/// Sphere-shaped stand-in body with the given radius
fn body_entity(radius: f32) -> MeshEntity {
    MeshEntity::new(Aabb::from_center_extents(
        Vec3::zeros(),
        Vec3::new(radius, radius, radius),
    ))
}

/// Build the frame's view frustum from an orbiting camera
fn camera_frustum(frame: u64, config: &OrreryConfig) -> Frustum {
    let angle = CAMERA_SPEED * frame as f32;
    let eye = Point3::new(
        CAMERA_DISTANCE * angle.cos(),
        12.0,
        CAMERA_DISTANCE * angle.sin(),
    );
    let view = Mat4::look_at_rh(&eye, &Point3::origin(), &Vec3::y());
    let projection = Mat4::new_perspective(
        config.aspect,
        config.fov_degrees.to_radians(),
        0.1,
        150.0,
    );
    Frustum::from_view_projection(&(projection * view))
}

fn load_config() -> OrreryConfig {
    match OrreryConfig::load_from_file(CONFIG_PATH) {
        Ok(config) => {
            log::info!("loaded scene layout from {CONFIG_PATH}");
            config
        }
        Err(error) => {
            log::warn!("no usable {CONFIG_PATH} ({error}), using built-in layout");
            OrreryConfig::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    log::info!("starting orrery demo...");

    let config = load_config();
    let mut app = OrreryApp::build(&config)?;
    let mut ctx = FrameContext::new();

    for _ in 0..config.frames {
        ctx.advance();
        ctx.set_frustum(camera_frustum(ctx.frame(), &config));

        app.update_orbits(ctx.frame())?;
        let moved = app.process_updates()?;
        log::debug!("frame {}: {} nodes moved", ctx.frame(), moved);

        app.run_frame(&ctx)?;
    }

    log::info!("orrery demo complete");
    Ok(())
}
