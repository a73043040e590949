//! CPU-side geometry produced by shape nodes.
//!
//! Shapes build a [`Geometry`]: interleaved [`Vertex`] data plus an index
//! list, a draw mode and the index width requested by the scene. Buffer nodes
//! produce [`BufferData`], a typed view over raw float bytes.

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::{InnerSpace, Vector3};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Monotonic stamp used by the renderer to detect re-generated CPU data.
pub(crate) fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/**
 * Vertex as laid out in the GPU vertex buffer:
 *
 * location 0: position
 * location 1: texture coordinates
 * location 2: normal
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl DrawMode {
    pub fn from_name(name: &str) -> Option<Self> {
        let mode = match name {
            "points" => DrawMode::Points,
            "lines" => DrawMode::Lines,
            "line_strip" => DrawMode::LineStrip,
            "triangles" => DrawMode::Triangles,
            "triangle_strip" => DrawMode::TriangleStrip,
            "triangle_fan" => DrawMode::TriangleFan,
            _ => return None,
        };
        Some(mode)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "unsigned_byte" => IndexType::U8,
            "unsigned_short" => IndexType::U16,
            "unsigned_int" => IndexType::U32,
            _ => return None,
        };
        Some(ty)
    }

    /// Largest vertex count addressable by this index width.
    pub fn max_vertices(&self) -> usize {
        match self {
            IndexType::U8 => u8::MAX as usize + 1,
            IndexType::U16 => u16::MAX as usize + 1,
            IndexType::U32 => u32::MAX as usize,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub draw_mode: DrawMode,
    pub index_type: IndexType,
    pub revision: u64,
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn face_normal(p0: [f32; 3], p1: [f32; 3], p2: [f32; 3]) -> [f32; 3] {
    let n = Vector3::from(sub(p1, p0)).cross(Vector3::from(sub(p2, p0)));
    if n.magnitude2() == 0.0 {
        return [0.0; 3];
    }
    n.normalize().into()
}

/// Texture coordinates of a parallelogram corner `(w, h)` with V flipped.
fn flipped_uv(corner: [f32; 2], width: [f32; 2], height: [f32; 2], w: f32, h: f32) -> [f32; 2] {
    [
        corner[0] + w * width[0] + h * height[0],
        1.0 - corner[1] - w * width[1] - h * height[1],
    ]
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, draw_mode: DrawMode, index_type: IndexType) -> Self {
        Self {
            vertices,
            indices,
            draw_mode,
            index_type,
            revision: next_revision(),
        }
    }

    pub fn quad(
        corner: [f32; 3],
        width: [f32; 3],
        height: [f32; 3],
        uv_corner: [f32; 2],
        uv_width: [f32; 2],
        uv_height: [f32; 2],
    ) -> Self {
        let normal = face_normal(corner, add(corner, width), add(corner, height));
        let positions = [
            corner,
            add(corner, width),
            add(add(corner, height), width),
            add(corner, height),
        ];
        let weights = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let vertices = positions
            .iter()
            .zip(weights)
            .map(|(&position, (w, h))| Vertex {
                position,
                uv: flipped_uv(uv_corner, uv_width, uv_height, w, h),
                normal,
            })
            .collect();
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3], DrawMode::Triangles, IndexType::U16)
    }

    pub fn triangle(edges: [[f32; 3]; 3], uvs: [[f32; 2]; 3]) -> Self {
        let normal = face_normal(edges[0], edges[1], edges[2]);
        let vertices = edges
            .iter()
            .zip(uvs)
            .map(|(&position, uv)| Vertex {
                position,
                uv: [uv[0], 1.0 - uv[1]],
                normal,
            })
            .collect();
        Self::new(vertices, vec![0, 1, 2], DrawMode::Triangles, IndexType::U16)
    }

    /// Six quads sharing the corner/width/height/depth basis. The depth
    /// vector's Z component extends the box towards negative Z.
    pub fn cuboid(
        corner: [f32; 3],
        width: [f32; 3],
        height: [f32; 3],
        depth: [f32; 3],
        uv_corner: [f32; 2],
        uv_width: [f32; 2],
        uv_height: [f32; 2],
    ) -> Self {
        let depth = [depth[0], depth[1], -depth[2]];
        // (width, height, depth) weights of each face corner
        const FACES: [[(u8, u8, u8); 4]; 6] = [
            [(1, 0, 1), (0, 0, 1), (0, 1, 1), (1, 1, 1)],
            [(0, 0, 1), (0, 0, 0), (0, 1, 0), (0, 1, 1)],
            [(1, 0, 0), (1, 0, 1), (1, 1, 1), (1, 1, 0)],
            [(0, 0, 1), (1, 0, 1), (1, 0, 0), (0, 0, 0)],
            [(0, 1, 0), (1, 1, 0), (1, 1, 1), (0, 1, 1)],
            [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)],
        ];
        let uv_weights = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for face in FACES {
            let positions = face.map(|(w, h, d)| {
                let mut p = corner;
                for (k, v) in p.iter_mut().enumerate() {
                    *v += w as f32 * width[k] + h as f32 * height[k] + d as f32 * depth[k];
                }
                p
            });
            let normal = face_normal(positions[0], positions[1], positions[2]);
            let base = vertices.len() as u32;
            for (position, (w, h)) in positions.into_iter().zip(uv_weights) {
                vertices.push(Vertex {
                    position,
                    uv: flipped_uv(uv_corner, uv_width, uv_height, w, h),
                    normal,
                });
            }
            indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(vertices, indices, DrawMode::Triangles, IndexType::U16)
    }

    /// Indices to draw as a triangle list when the mode is a fan.
    pub fn triangle_list_indices(&self) -> Vec<u32> {
        if self.draw_mode != DrawMode::TriangleFan {
            return self.indices.clone();
        }
        let mut list = Vec::with_capacity(self.indices.len().saturating_sub(2) * 3);
        for pair in self.indices.windows(2).skip(1) {
            list.extend([self.indices[0], pair[0], pair[1]]);
        }
        list
    }

    pub fn check_index_type(&self) -> Result<(), String> {
        if self.vertices.len() > self.index_type.max_vertices() {
            return Err(format!(
                "{} vertices do not fit {:?} indices",
                self.vertices.len(),
                self.index_type
            ));
        }
        Ok(())
    }
}

/// Raw float data of a buffer node.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferData {
    pub components: usize,
    pub count: usize,
    pub bytes: Vec<u8>,
    pub revision: u64,
}

impl BufferData {
    /// Builds a buffer of `count` elements. Without data the buffer is
    /// zero-filled; with data the byte length must match exactly.
    pub fn new(components: usize, count: usize, data: Option<&[u8]>) -> Result<Self, String> {
        let size = count * components * std::mem::size_of::<f32>();
        let bytes = match data {
            Some(data) if data.len() != size => {
                return Err(format!(
                    "data is {} bytes but {count} elements of {components} floats need {size}",
                    data.len()
                ));
            }
            Some(data) => data.to_vec(),
            None => vec![0; size],
        };
        Ok(Self {
            components,
            count,
            bytes,
            revision: next_revision(),
        })
    }

    pub fn floats(&self) -> Vec<f32> {
        self.bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    /// Element `i` padded to 3 components.
    pub(crate) fn vec3(&self, floats: &[f32], i: usize) -> [f32; 3] {
        let mut v = [0.0; 3];
        for (k, c) in v.iter_mut().enumerate().take(self.components) {
            *c = floats[i * self.components + k];
        }
        v
    }
}
