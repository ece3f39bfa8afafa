//! Geometric helpers for 3D collision detection and containment.
//!
//! Everything here works on axis-aligned bounding boxes. Collision checks are a
//! linear scan over a container's placements.

use std::fmt;

use crate::container::Placement;
use crate::types::{BoundingBox, EPSILON_GENERAL, Vec3};

/// One of the three container axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// Length (depth into the container)
    X,
    /// Width
    Y,
    /// Height
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn of(self, v: &Vec3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "length",
            Axis::Y => "width",
            Axis::Z => "height",
        };
        f.write_str(name)
    }
}

/// Checks if two placements overlap on all three axes.
pub fn intersects(a: &Placement, b: &Placement) -> bool {
    a.bounding_box()
        .intersects(&b.bounding_box(), EPSILON_GENERAL)
}

/// Returns the first placement whose box collides with `candidate`.
pub fn first_collision<'a>(
    candidate: &BoundingBox,
    placed: &'a [Placement],
) -> Option<&'a Placement> {
    placed
        .iter()
        .find(|p| p.bounding_box().intersects(candidate, EPSILON_GENERAL))
}

/// Returns the first axis on which `position` is negative.
pub fn negative_axis(position: &Vec3) -> Option<Axis> {
    Axis::ALL.into_iter().find(|axis| axis.of(position) < 0.0)
}

/// Returns the first axis on which `position + dims` exceeds `bounds`.
pub fn exceeded_axis(position: &Vec3, dims: &Vec3, bounds: &Vec3) -> Option<Axis> {
    let far = *position + *dims;
    Axis::ALL
        .into_iter()
        .find(|axis| axis.of(&far) > axis.of(bounds) + EPSILON_GENERAL)
}
