//! Disposable face cameras for cubemap baking
//!
//! Each cubemap face is rendered with a throwaway camera sitting at the
//! origin, looking along the face basis with a 90 degree field of view so
//! the six frusta tile the full sphere.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::basis::{FaceBasis, CUBE_FACE_BASES};

const FACE_FOV_Y: f32 = std::f32::consts::FRAC_PI_2;
const FACE_NEAR: f32 = 0.01;
const FACE_FAR: f32 = 1000.0;

/// Camera for rendering one cubemap face. Plain value type, built per draw
/// and discarded afterwards.
#[derive(Debug, Clone, Copy)]
pub struct FaceCamera {
    pub basis: FaceBasis,
}

impl FaceCamera {
    pub fn for_face(face: usize) -> Self {
        Self {
            basis: CUBE_FACE_BASES[face],
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(Vec3::ZERO, self.basis.direction, self.basis.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(FACE_FOV_Y, 1.0, FACE_NEAR, FACE_FAR)
    }

    /// Build the uniform block for a face draw. `roughness` is only read by
    /// the specular prefilter shader and is zero elsewhere.
    pub fn uniform_data(&self, roughness: f32) -> BakeUniforms {
        BakeUniforms {
            view: self.view_matrix(),
            proj: self.projection_matrix(),
            camera_pos: Vec4::new(0.0, 0.0, 0.0, 1.0),
            params: Vec4::new(roughness, 0.0, 0.0, 0.0),
        }
    }
}

/// Uniform data for bake draws
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BakeUniforms {
    pub view: Mat4,
    pub proj: Mat4,
    pub camera_pos: Vec4,
    /// x = roughness, yzw unused
    pub params: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_looks_along_face_direction() {
        for face in 0..6 {
            let camera = FaceCamera::for_face(face);
            let view = camera.view_matrix();
            // The face direction maps onto the camera's -Z axis.
            let forward = view.transform_vector3(camera.basis.direction);
            assert!((forward - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        }
    }

    #[test]
    fn square_aspect_projection() {
        let proj = FaceCamera::for_face(0).projection_matrix();
        // 90 degree FOV with aspect 1 gives unit focal lengths.
        assert!((proj.col(0).x - 1.0).abs() < 1e-6);
        assert!((proj.col(1).y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_block_carries_roughness() {
        let uniforms = FaceCamera::for_face(2).uniform_data(0.75);
        assert_eq!(uniforms.params.x, 0.75);
        assert_eq!(std::mem::size_of::<BakeUniforms>(), 160);
    }
}
