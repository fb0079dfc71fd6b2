//! Local transform recipes
//!
//! A recipe is the authored description of a node's local transform:
//! position, rotation, and scale, plus the orders used to compose them
//! into a matrix. `build` is a pure function of the recipe's fields; the
//! owning node caches the resulting matrix and decides when to rebuild.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Quat, Vec3};

/// Axis order for Euler-angle rotations
///
/// The listed axes are applied first-to-last about the fixed parent axes,
/// so `Xyz` rotates about X first, then Y, then Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EulerOrder {
    /// X, then Y, then Z
    Xyz,
    /// X, then Z, then Y
    Xzy,
    /// Y, then X, then Z
    Yxz,
    /// Y, then Z, then X
    Yzx,
    /// Z, then X, then Y
    Zxy,
    /// Z, then Y, then X
    Zyx,
}

/// Rotation representation selectable per recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rotation {
    /// Euler angles in radians with an explicit axis order
    Euler {
        /// Rotation angles about X, Y, and Z in radians
        angles: Vec3,
        /// Order in which the axis rotations are applied
        order: EulerOrder,
    },
    /// Direct quaternion rotation
    Quaternion(Quat),
}

impl Rotation {
    /// Collapse the rotation to a single quaternion
    pub fn to_quat(&self) -> Quat {
        match self {
            Self::Euler { angles, order } => {
                let qx = Quat::from_axis_angle(&Vec3::x_axis(), angles.x);
                let qy = Quat::from_axis_angle(&Vec3::y_axis(), angles.y);
                let qz = Quat::from_axis_angle(&Vec3::z_axis(), angles.z);
                // Later applications multiply on the left.
                match order {
                    EulerOrder::Xyz => qz * qy * qx,
                    EulerOrder::Xzy => qy * qz * qx,
                    EulerOrder::Yxz => qz * qx * qy,
                    EulerOrder::Yzx => qx * qz * qy,
                    EulerOrder::Zxy => qy * qx * qz,
                    EulerOrder::Zyx => qx * qy * qz,
                }
            }
            Self::Quaternion(quat) => *quat,
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::Quaternion(Quat::identity())
    }
}

/// Order in which scale, rotation, and translation compose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompositionOrder {
    /// Scale first, then rotate, then translate (the usual TRS matrix)
    #[default]
    ScaleRotateTranslate,
    /// Rotate first, then scale, then translate
    RotateScaleTranslate,
}

/// Authored local transform of a scene node
///
/// Cloned by value; `build` has no side effects and no error conditions —
/// all fields are unconstrained numeric values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecipe {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation relative to the parent
    pub rotation: Rotation,

    /// Scale factors relative to the parent
    pub scale: Vec3,

    /// How scale, rotation, and translation compose into the local matrix
    pub composition: CompositionOrder,
}

impl Default for TransformRecipe {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Rotation::default(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            composition: CompositionOrder::default(),
        }
    }
}

impl TransformRecipe {
    /// Create an identity recipe
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a recipe with only a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder pattern: set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder pattern: set rotation from a quaternion
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = Rotation::Quaternion(rotation);
        self
    }

    /// Builder pattern: set rotation from Euler angles in radians
    pub fn with_euler_rotation(mut self, angles: Vec3, order: EulerOrder) -> Self {
        self.rotation = Rotation::Euler { angles, order };
        self
    }

    /// Builder pattern: set scale (non-uniform)
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builder pattern: set scale (uniform)
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Builder pattern: set the composition order
    pub fn with_composition(mut self, composition: CompositionOrder) -> Self {
        self.composition = composition;
        self
    }

    /// Build the local transform matrix described by this recipe
    ///
    /// Pure: two calls on the same recipe produce identical matrices.
    pub fn build(&self) -> Mat4 {
        let translation = Mat4::new_translation(&self.position);
        let rotation = self.rotation.to_quat().to_homogeneous();
        let scaling = Mat4::new_nonuniform_scaling(&self.scale);

        match self.composition {
            CompositionOrder::ScaleRotateTranslate => translation * rotation * scaling,
            CompositionOrder::RotateScaleTranslate => translation * scaling * rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::PI;
    use crate::foundation::math::Point3;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_identity_recipe_builds_identity_matrix() {
        let matrix = TransformRecipe::identity().build();
        assert_relative_eq!(matrix, Mat4::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_build_is_pure() {
        let recipe = TransformRecipe::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_euler_rotation(Vec3::new(0.3, 0.1, 0.2), EulerOrder::Xyz)
            .with_scale(Vec3::new(2.0, 0.5, 1.5));

        assert_eq!(recipe.build(), recipe.build());
    }

    #[test]
    fn test_translation_moves_origin() {
        let recipe = TransformRecipe::from_position(Vec3::new(5.0, -2.0, 1.0));
        let transformed = recipe.build().transform_point(&Point3::origin());
        assert_relative_eq!(transformed, Point3::new(5.0, -2.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_scale_applies_before_rotation_in_trs() {
        // 90 degrees around Y maps +X to -Z; X-scale of 2 should be applied
        // in model space first, so the point lands at (0, 0, -2).
        let recipe = TransformRecipe::identity()
            .with_euler_rotation(Vec3::new(0.0, PI / 2.0, 0.0), EulerOrder::Xyz)
            .with_scale(Vec3::new(2.0, 1.0, 1.0));

        let transformed = recipe.build().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(transformed, Point3::new(0.0, 0.0, -2.0), epsilon = EPSILON);
    }

    #[test]
    fn test_composition_orders_differ_under_nonuniform_scale() {
        let base = TransformRecipe::identity()
            .with_euler_rotation(Vec3::new(0.0, PI / 2.0, 0.0), EulerOrder::Xyz)
            .with_scale(Vec3::new(2.0, 1.0, 1.0));

        let trs = base.clone().build();
        let rst = base
            .with_composition(CompositionOrder::RotateScaleTranslate)
            .build();

        // Rotate-then-scale stretches along the world X axis instead, so the
        // rotated +X point stays on the Z axis with unit length.
        let point = Point3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(trs.transform_point(&point), Point3::new(0.0, 0.0, -2.0), epsilon = EPSILON);
        assert_relative_eq!(rst.transform_point(&point), Point3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_euler_order_changes_result() {
        let angles = Vec3::new(PI / 2.0, PI / 2.0, 0.0);
        let xyz = Rotation::Euler {
            angles,
            order: EulerOrder::Xyz,
        }
        .to_quat();
        let yxz = Rotation::Euler {
            angles,
            order: EulerOrder::Yxz,
        }
        .to_quat();

        let point = Vec3::new(0.0, 1.0, 0.0);
        let a = xyz * point;
        let b = yxz * point;
        assert!((a - b).magnitude() > 0.5, "orders produced identical rotations");
    }

    #[test]
    fn test_quaternion_rotation_matches_euler_single_axis() {
        let angle = 0.7;
        let euler = Rotation::Euler {
            angles: Vec3::new(0.0, angle, 0.0),
            order: EulerOrder::Xyz,
        };
        let quat = Rotation::Quaternion(Quat::from_axis_angle(&Vec3::y_axis(), angle));

        let dot = euler.to_quat().coords.dot(&quat.to_quat().coords);
        assert!(dot.abs() > 0.999, "quaternion mismatch: dot product = {dot}");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = TransformRecipe::from_position(Vec3::new(1.0, 0.0, 0.0));
        let mut copy = original.clone();
        copy.position.x = 9.0;

        assert_relative_eq!(original.position.x, 1.0);
        assert_relative_eq!(copy.position.x, 9.0);
    }
}
