//! Frame recording.
//!
//! Drawing a scene does not talk to the GPU directly. Drawable nodes append
//! [`DrawCommand`]s to a [`Frame`] with everything resolved: matrices,
//! uniform values, texture and buffer bindings, and render states. The
//! [`crate::gpu::Renderer`] then executes the frame.
//!
//! # Key types
//!
//! - [`Frame`] is the result of [`crate::Context::draw`]
//! - [`DrawCommand`] is one recorded operation
//! - [`RenderStates`] folds the GL state nodes attached to a shape
//!

use std::rc::Rc;

use cgmath::{Matrix4, SquareMatrix};

use crate::geometry::{BufferData, Geometry};

/// Everything needed to render one frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub time: f64,
    pub viewport: [i32; 4],
    pub clear_color: [f64; 4],
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    /// Shape draws in execution order, including the ones inside RTT passes.
    pub fn shapes(&self) -> Vec<&ShapeDraw> {
        fn collect<'a>(commands: &'a [DrawCommand], out: &mut Vec<&'a ShapeDraw>) {
            for command in commands {
                match command {
                    DrawCommand::Shape(shape) => out.push(shape),
                    DrawCommand::Rtt(pass) => collect(&pass.commands, out),
                    DrawCommand::Compute(_) => (),
                }
            }
        }
        let mut shapes = Vec::new();
        collect(&self.commands, &mut shapes);
        shapes
    }
}

/// A recorded operation.
///
/// # Variants
///
/// - `Shape` draws a geometry with a program into the current target
/// - `Compute` dispatches a compute program
/// - `Rtt` renders nested commands into a texture
#[derive(Clone, Debug)]
pub enum DrawCommand {
    Shape(ShapeDraw),
    Compute(ComputeDispatch),
    Rtt(RttPass),
}

#[derive(Clone, Debug)]
pub struct ShapeDraw {
    pub node_id: u64,
    pub modelview: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub normal_matrix: Matrix4<f32>,
    pub shape_id: u64,
    pub geometry: Rc<Geometry>,
    pub program: ProgramBinding,
    pub uniforms: Vec<(String, UniformValue)>,
    pub textures: Vec<(String, TextureBinding)>,
    pub attributes: Vec<(String, BufferBinding)>,
    pub states: RenderStates,
}

#[derive(Clone, Debug)]
pub struct ComputeDispatch {
    pub node_id: u64,
    pub program: ProgramBinding,
    pub groups: [u32; 3],
    pub uniforms: Vec<(String, UniformValue)>,
    pub textures: Vec<(String, TextureBinding)>,
    pub buffers: Vec<(String, BufferBinding)>,
}

#[derive(Clone, Debug)]
pub struct RttPass {
    pub node_id: u64,
    pub color: TextureBinding,
    pub depth: Option<TextureBinding>,
    pub clear_color: [f64; 4],
    pub commands: Vec<DrawCommand>,
}

/// Shader sources of a program with the identity used for pipeline caching.
#[derive(Clone, Debug)]
pub struct ProgramBinding {
    pub node_id: u64,
    pub generation: u64,
    pub program: Rc<Program>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Program {
    Graphics { vertex: String, fragment: String },
    Compute { compute: String },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    Mat4([[f32; 4]; 4]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Rgba8Srgb,
    Rgba16Float,
    Depth24Stencil8,
}

impl TextureFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let format = match name {
            "rgba8" => TextureFormat::Rgba8,
            "rgba8_srgb" => TextureFormat::Rgba8Srgb,
            "rgba16f" => TextureFormat::Rgba16Float,
            "depth24_stencil8" => TextureFormat::Depth24Stencil8,
            _ => return None,
        };
        Some(format)
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth24Stencil8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
}

/// A texture node resolved for binding. `revision` changes whenever the
/// texture or its media source is re-initialized.
#[derive(Clone, Debug)]
pub struct TextureBinding {
    pub node_id: u64,
    pub revision: u64,
    pub desc: TextureDesc,
    pub image: Option<Rc<image::RgbaImage>>,
    pub media_time: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct BufferBinding {
    pub node_id: u64,
    pub data: Rc<BufferData>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

impl BlendFactor {
    pub fn from_name(name: &str) -> Option<Self> {
        let factor = match name {
            "zero" => BlendFactor::Zero,
            "one" => BlendFactor::One,
            "src_color" => BlendFactor::SrcColor,
            "one_minus_src_color" => BlendFactor::OneMinusSrcColor,
            "dst_color" => BlendFactor::DstColor,
            "one_minus_dst_color" => BlendFactor::OneMinusDstColor,
            "src_alpha" => BlendFactor::SrcAlpha,
            "one_minus_src_alpha" => BlendFactor::OneMinusSrcAlpha,
            "dst_alpha" => BlendFactor::DstAlpha,
            "one_minus_dst_alpha" => BlendFactor::OneMinusDstAlpha,
            _ => return None,
        };
        Some(factor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl BlendOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "add" => BlendOp::Add,
            "subtract" => BlendOp::Subtract,
            "reverse_subtract" => BlendOp::ReverseSubtract,
            "min" => BlendOp::Min,
            "max" => BlendOp::Max,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "never" => CompareFunc::Never,
            "less" => CompareFunc::Less,
            "equal" => CompareFunc::Equal,
            "lequal" => CompareFunc::LessEqual,
            "greater" => CompareFunc::Greater,
            "notequal" => CompareFunc::NotEqual,
            "gequal" => CompareFunc::GreaterEqual,
            "always" => CompareFunc::Always,
            _ => return None,
        };
        Some(func)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Incr,
    IncrWrap,
    Decr,
    DecrWrap,
    Invert,
}

impl StencilOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "keep" => StencilOp::Keep,
            "zero" => StencilOp::Zero,
            "replace" => StencilOp::Replace,
            "incr" => StencilOp::Incr,
            "incr_wrap" => StencilOp::IncrWrap,
            "decr" => StencilOp::Decr,
            "decr_wrap" => StencilOp::DecrWrap,
            "invert" => StencilOp::Invert,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub op_rgb: BlendOp,
    pub op_alpha: BlendOp,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            op_rgb: BlendOp::Add,
            op_alpha: BlendOp::Add,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub write_mask: u32,
    pub func: CompareFunc,
    pub reference: u32,
    pub read_mask: u32,
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            write_mask: 0xff,
            func: CompareFunc::Always,
            reference: 0,
            read_mask: 0xff,
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Keep,
        }
    }
}

/// Fixed-function state of a shape draw. The default matches a fresh GL
/// context: no blending, all channels written, depth and stencil tests and
/// face culling off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderStates {
    pub blend: Option<BlendState>,
    pub color_mask: [bool; 4],
    pub depth_test: bool,
    pub stencil: Option<StencilState>,
    pub cull_face: bool,
}

impl Default for RenderStates {
    fn default() -> Self {
        Self {
            blend: None,
            color_mask: [true; 4],
            depth_test: false,
            stencil: None,
            cull_face: false,
        }
    }
}

/// Traversal state while drawing the graph.
pub(crate) struct DrawState {
    pub modelview: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub clear_color: [f64; 4],
    pub commands: Vec<DrawCommand>,
}

impl DrawState {
    pub fn new(clear_color: [f64; 4]) -> Self {
        Self {
            modelview: Matrix4::identity(),
            projection: Matrix4::identity(),
            clear_color,
            commands: Vec::new(),
        }
    }
}

/// Inverse transpose of the modelview, identity when it is not invertible.
pub(crate) fn normal_matrix(modelview: &Matrix4<f32>) -> Matrix4<f32> {
    use cgmath::Matrix;
    let mut m = *modelview;
    m.w = cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
    m.x.w = 0.0;
    m.y.w = 0.0;
    m.z.w = 0.0;
    m.invert()
        .map(|inv| inv.transpose())
        .unwrap_or_else(Matrix4::identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Vector3};

    #[test]
    fn normal_matrix_of_rotation_is_the_rotation() {
        let rotation = Matrix4::from_angle_z(Deg(30.0f32));
        let normal = normal_matrix(&(Matrix4::from_translation(Vector3::new(4.0, 2.0, 0.0)) * rotation));
        for (a, b) in Into::<[[f32; 4]; 4]>::into(normal)
            .iter()
            .flatten()
            .zip(Into::<[[f32; 4]; 4]>::into(rotation).iter().flatten())
        {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn select_names_parse() {
        assert_eq!(BlendFactor::from_name("one_minus_src_alpha"), Some(BlendFactor::OneMinusSrcAlpha));
        assert_eq!(CompareFunc::from_name("lequal"), Some(CompareFunc::LessEqual));
        assert_eq!(StencilOp::from_name("incr_wrap"), Some(StencilOp::IncrWrap));
        assert_eq!(TextureFormat::from_name("rgba32f"), None);
    }
}
