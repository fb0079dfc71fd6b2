//! View frustum and containment classification
//!
//! The frustum is supplied by the surrounding engine once per frame and
//! only read here. Containment tests classify a bounding volume as fully
//! outside, partially overlapping, or fully inside the view volume.

use crate::foundation::math::{Mat4, Vec3};
use crate::scene::bounds::{Aabb, BoundingSphere};

/// Result of testing a bounding volume against the frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Fully outside the view volume
    Outside,
    /// Partially overlapping the view volume boundary
    Intersects,
    /// Fully inside the view volume
    Inside,
}

/// Plane defined by normal and distance from origin
///
/// Points with a non-negative signed distance are on the inner side.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Normal vector (normalized on construction)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from a normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize(),
            distance,
        }
    }

    /// Create a plane from raw `ax + by + cz + d = 0` coefficients,
    /// normalizing both the normal and the distance
    pub fn from_coefficients(a: f32, b: f32, c: f32, d: f32) -> Self {
        let normal = Vec3::new(a, b, c);
        let length = normal.magnitude();
        Self {
            normal: normal / length,
            distance: d / length,
        }
    }

    /// Calculate signed distance from plane to point
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// View frustum bounded by six planes, normals pointing inward
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Index of the left plane
    pub const LEFT: usize = 0;
    /// Index of the right plane
    pub const RIGHT: usize = 1;
    /// Index of the bottom plane
    pub const BOTTOM: usize = 2;
    /// Index of the top plane
    pub const TOP: usize = 3;
    /// Index of the near plane
    pub const NEAR: usize = 4;
    /// Index of the far plane
    pub const FAR: usize = 5;

    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Uses the Gribb-Hartmann method: each clip plane is the sum or
    /// difference of the matrix's fourth row with one of the others
    /// (column-vector convention, OpenGL-style `[-1, 1]` clip depth).
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row = |i: usize| {
            (
                vp[(i, 0)],
                vp[(i, 1)],
                vp[(i, 2)],
                vp[(i, 3)],
            )
        };
        let (wx, wy, wz, ww) = row(3);

        let combine = |(x, y, z, w): (f32, f32, f32, f32), sign: f32| {
            Plane::from_coefficients(wx + sign * x, wy + sign * y, wz + sign * z, ww + sign * w)
        };

        let mut planes = [Plane::new(Vec3::x(), 0.0); 6];
        planes[Self::LEFT] = combine(row(0), 1.0);
        planes[Self::RIGHT] = combine(row(0), -1.0);
        planes[Self::BOTTOM] = combine(row(1), 1.0);
        planes[Self::TOP] = combine(row(1), -1.0);
        planes[Self::NEAR] = combine(row(2), 1.0);
        planes[Self::FAR] = combine(row(2), -1.0);

        Self { planes }
    }

    /// Classify an axis-aligned box against the frustum
    ///
    /// For each plane the corner farthest along the plane normal decides
    /// rejection; the nearest corner decides whether the box straddles the
    /// boundary.
    pub fn classify_aabb(&self, aabb: &Aabb) -> Containment {
        let mut intersects = false;

        for plane in &self.planes {
            let positive = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.signed_distance(positive) < 0.0 {
                return Containment::Outside;
            }

            let negative = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.min.x } else { aabb.max.x },
                if plane.normal.y >= 0.0 { aabb.min.y } else { aabb.max.y },
                if plane.normal.z >= 0.0 { aabb.min.z } else { aabb.max.z },
            );
            if plane.signed_distance(negative) < 0.0 {
                intersects = true;
            }
        }

        if intersects {
            Containment::Intersects
        } else {
            Containment::Inside
        }
    }

    /// Classify a sphere against the frustum
    pub fn classify_sphere(&self, sphere: &BoundingSphere) -> Containment {
        let mut intersects = false;

        for plane in &self.planes {
            let distance = plane.signed_distance(sphere.center);
            if distance < -sphere.radius {
                return Containment::Outside;
            }
            if distance < sphere.radius {
                intersects = true;
            }
        }

        if intersects {
            Containment::Intersects
        } else {
            Containment::Inside
        }
    }
}
