//! CPU-side packing of the uniform blocks bound to programs.
//!
//! User uniforms are laid out in one block following WGSL's uniform address
//! space rules, in key order:
//!
//! | type | align | size |
//! |------|-------|------|
//! | `f32`, `i32` | 4 | 4 |
//! | `vec2<f32>` | 8 | 8 |
//! | `vec3<f32>` | 16 | 12 |
//! | `vec4<f32>` | 16 | 16 |
//! | `mat4x4<f32>` | 16 | 64 |
//!
//! The block size is rounded up to 16 bytes.

use cgmath::Matrix4;

use crate::render::UniformValue;

/// Matrices bound at group 0 of every shape draw.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MatricesUniform {
    pub modelview: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
}

/// wgpu clip space has a [0, 1] depth range.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

impl MatricesUniform {
    pub fn new(modelview: Matrix4<f32>, projection: Matrix4<f32>, normal: Matrix4<f32>) -> Self {
        Self {
            modelview: modelview.into(),
            projection: (OPENGL_TO_WGPU_MATRIX * projection).into(),
            normal: normal.into(),
        }
    }
}

fn align_size(value: &UniformValue) -> (usize, usize) {
    match value {
        UniformValue::Float(_) | UniformValue::Int(_) => (4, 4),
        UniformValue::Vec2(_) => (8, 8),
        UniformValue::Vec3(_) => (16, 12),
        UniformValue::Vec4(_) => (16, 16),
        UniformValue::Mat4(_) => (16, 64),
    }
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Packs `uniforms` in order. An empty list still yields one 16 byte block
/// since wgpu does not accept empty uniform buffers.
pub fn pack_uniforms(uniforms: &[(String, UniformValue)]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for (_, value) in uniforms {
        let (align, size) = align_size(value);
        out.resize(round_up(out.len(), align), 0);
        let start = out.len();
        match value {
            UniformValue::Float(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec3(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec4(v) => out.extend_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Mat4(m) => {
                for column in m {
                    out.extend_from_slice(bytemuck::cast_slice(column));
                }
            }
        }
        debug_assert_eq!(out.len() - start, size);
    }
    let len = round_up(out.len().max(1), 16);
    out.resize(len, 0);
    out
}

/// Bytes per row of a texture copy, padded to wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn empty_block_is_sixteen_bytes() {
        assert_eq!(pack_uniforms(&[]), vec![0; 16]);
    }

    #[test]
    fn vec3_is_aligned_to_sixteen() {
        let packed = pack_uniforms(&[
            ("a".to_string(), UniformValue::Float(1.0)),
            ("b".to_string(), UniformValue::Vec3([2.0, 3.0, 4.0])),
            ("c".to_string(), UniformValue::Float(5.0)),
        ]);
        assert_eq!(packed.len(), 32);
        assert_eq!(floats(&packed), vec![1.0, 0.0, 0.0, 0.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn vec2_after_scalar_skips_four_bytes() {
        let packed = pack_uniforms(&[
            ("a".to_string(), UniformValue::Int(7)),
            ("b".to_string(), UniformValue::Vec2([1.0, 2.0])),
        ]);
        assert_eq!(packed.len(), 16);
        assert_eq!(i32::from_le_bytes([packed[0], packed[1], packed[2], packed[3]]), 7);
        assert_eq!(floats(&packed[8..16]), vec![1.0, 2.0]);
    }

    #[test]
    fn mat4_is_column_major() {
        let m = [
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0, 16.0],
        ];
        let packed = pack_uniforms(&[
            ("f".to_string(), UniformValue::Float(0.5)),
            ("m".to_string(), UniformValue::Mat4(m)),
        ]);
        assert_eq!(packed.len(), 80);
        assert_eq!(floats(&packed[16..32]), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(floats(&packed[64..80]), vec![13.0, 14.0, 15.0, 16.0]);
    }

    #[test]
    fn rows_are_padded_for_copies() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn projection_is_remapped_to_wgpu_depth() {
        use cgmath::SquareMatrix;
        let identity = Matrix4::identity();
        let uniform = MatricesUniform::new(identity, identity, identity);
        assert_eq!(uniform.projection[2][2], 0.5);
        assert_eq!(uniform.projection[3][2], 0.5);
        assert_eq!(uniform.modelview, Into::<[[f32; 4]; 4]>::into(identity));
    }
}
