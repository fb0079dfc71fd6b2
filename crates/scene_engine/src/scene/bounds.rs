//! Bounding volumes
//!
//! Axis-aligned boxes and spheres used for visibility culling and spatial
//! queries. A zero-extent box or zero-radius sphere is the degenerate
//! sentinel produced by empty nodes; it is a valid value, not an error,
//! and is skipped by all aggregation.

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Create the smallest AABB enclosing a set of points
    ///
    /// An empty slice yields the degenerate sentinel.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(first) = points.first() else {
            return Self::empty();
        };

        let mut min = *first;
        let mut max = *first;
        for point in &points[1..] {
            min = Vec3::new(min.x.min(point.x), min.y.min(point.y), min.z.min(point.z));
            max = Vec3::new(max.x.max(point.x), max.y.max(point.y), max.z.max(point.z));
        }
        Self { min, max }
    }

    /// The degenerate zero-extent sentinel box
    pub fn empty() -> Self {
        Self {
            min: Vec3::zeros(),
            max: Vec3::zeros(),
        }
    }

    /// Whether this box has zero extent
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Merge with another box via component-wise min/max of the corners
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// The eight corner points of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// The axis-aligned box enclosing this box after a matrix transform
    ///
    /// Transforms all eight corners and re-wraps them, so rotations grow the
    /// result conservatively. A degenerate box stays degenerate.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_degenerate() {
            return Self::empty();
        }

        let corners = self.corners();
        let first = matrix.transform_point(&Point3::from(corners[0]));
        let mut min = first.coords;
        let mut max = first.coords;
        for corner in &corners[1..] {
            let p = matrix.transform_point(&Point3::from(*corner)).coords;
            min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        Self { min, max }
    }
}

/// A bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// The center position of the sphere
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// The degenerate zero-radius sentinel sphere
    pub fn empty() -> Self {
        Self {
            center: Vec3::zeros(),
            radius: 0.0,
        }
    }

    /// Whether this sphere has no volume
    pub fn is_degenerate(&self) -> bool {
        self.radius <= 0.0
    }

    /// The sphere enclosing an axis-aligned box
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.extents().magnitude(),
        }
    }

    /// Smallest sphere enclosing this sphere and another
    ///
    /// When one sphere already contains the other, that sphere is returned
    /// unchanged.
    pub fn merged(&self, other: &Self) -> Self {
        let offset = other.center - self.center;
        let distance = offset.magnitude();

        if distance + other.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= other.radius {
            return *other;
        }

        let radius = (distance + self.radius + other.radius) * 0.5;
        let center = self.center + offset * ((radius - self.radius) / distance);
        Self { center, radius }
    }
}
