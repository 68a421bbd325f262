//! Per-face view bases for cubemap rendering
//!
//! One table shared by every cube-generating stage. Face order follows the
//! cubemap array-layer convention: +X, -X, +Y, -Y, +Z, -Z.

use glam::Vec3;

/// Viewing basis for one cubemap face: the direction the camera looks
/// along and its up vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBasis {
    pub direction: Vec3,
    pub up: Vec3,
}

/// The six face bases, in array-layer order.
pub const CUBE_FACE_BASES: [FaceBasis; 6] = [
    FaceBasis {
        direction: Vec3::new(1.0, 0.0, 0.0),
        up: Vec3::new(0.0, 1.0, 0.0),
    },
    FaceBasis {
        direction: Vec3::new(-1.0, 0.0, 0.0),
        up: Vec3::new(0.0, 1.0, 0.0),
    },
    FaceBasis {
        direction: Vec3::new(0.0, 1.0, 0.0),
        up: Vec3::new(0.0, 0.0, -1.0),
    },
    FaceBasis {
        direction: Vec3::new(0.0, -1.0, 0.0),
        up: Vec3::new(0.0, 0.0, 1.0),
    },
    FaceBasis {
        direction: Vec3::new(0.0, 0.0, 1.0),
        up: Vec3::new(0.0, 1.0, 0.0),
    },
    FaceBasis {
        direction: Vec3::new(0.0, 0.0, -1.0),
        up: Vec3::new(0.0, 1.0, 0.0),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_unit_length_faces() {
        assert_eq!(CUBE_FACE_BASES.len(), 6);
        for basis in CUBE_FACE_BASES {
            assert!((basis.direction.length() - 1.0).abs() < 1e-6);
            assert!((basis.up.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn up_is_orthogonal_to_direction() {
        for basis in CUBE_FACE_BASES {
            assert!(basis.direction.dot(basis.up).abs() < 1e-6);
        }
    }

    #[test]
    fn directions_cover_all_axes() {
        let sum: Vec3 = CUBE_FACE_BASES.iter().map(|b| b.direction).sum();
        assert!(sum.length() < 1e-6);
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            assert!(CUBE_FACE_BASES.iter().any(|b| b.direction == axis));
            assert!(CUBE_FACE_BASES.iter().any(|b| b.direction == -axis));
        }
    }
}
