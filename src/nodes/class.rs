//! The node class table.
//!
//! Each [`NodeType`] owns a static list of [`ParamSpec`]s. Parameter values
//! are stored per node in the order of [`COMMON_PARAMS`] followed by the
//! class parameters.

use crate::animation::EASING_NAMES;
use crate::params::{
    PARAM_FLAG_CONSTRUCTOR as CTOR, PARAM_FLAG_DOT_PACKED as PACKED, ParamDefault as D,
    ParamSpec as P, ParamType as T,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    AnimKeyFrameScalar,
    AnimKeyFrameVec2,
    AnimKeyFrameVec3,
    AnimKeyFrameVec4,
    AnimationScalar,
    AnimationVec2,
    AnimationVec3,
    AnimationVec4,
    BufferFloat,
    BufferVec2,
    BufferVec3,
    BufferVec4,
    UniformScalar,
    UniformVec2,
    UniformVec3,
    UniformVec4,
    UniformInt,
    UniformMat4,
    Identity,
    Rotate,
    Translate,
    Scale,
    Camera,
    Group,
    TexturedShape,
    Compute,
    Rtt,
    Quad,
    Triangle,
    Box,
    ShapePrimitive,
    Shape,
    Shape2,
    Shader,
    ComputeShader,
    Texture,
    Media,
    GlState,
    GlBlendState,
    GlColorState,
    GlStencilState,
}

pub const DRAW_MODES: &[&str] = &[
    "points",
    "lines",
    "line_strip",
    "triangles",
    "triangle_strip",
    "triangle_fan",
];
pub const DRAW_TYPES: &[&str] = &["unsigned_byte", "unsigned_short", "unsigned_int"];
pub const TEXTURE_FORMATS: &[&str] = &["rgba8", "rgba8_srgb", "rgba16f", "depth24_stencil8"];
pub const FILTERS: &[&str] = &["nearest", "linear"];
pub const WRAPS: &[&str] = &["clamp_to_edge", "repeat", "mirrored_repeat"];
pub const CAPABILITIES: &[&str] = &["blend", "depth_test", "stencil_test", "cull_face"];
pub const BLEND_FACTORS: &[&str] = &[
    "zero",
    "one",
    "src_color",
    "one_minus_src_color",
    "dst_color",
    "one_minus_dst_color",
    "src_alpha",
    "one_minus_src_alpha",
    "dst_alpha",
    "one_minus_dst_alpha",
];
pub const BLEND_OPS: &[&str] = &["add", "subtract", "reverse_subtract", "min", "max"];
pub const COMPARE_FUNCS: &[&str] = &[
    "never", "less", "equal", "lequal", "greater", "notequal", "gequal", "always",
];
pub const STENCIL_OPS: &[&str] = &[
    "keep",
    "zero",
    "replace",
    "incr",
    "incr_wrap",
    "decr",
    "decr_wrap",
    "invert",
];

pub const TRANSFORM_TYPES: &[NodeType] = &[
    NodeType::Identity,
    NodeType::Rotate,
    NodeType::Translate,
    NodeType::Scale,
];
pub const UNIFORM_TYPES: &[NodeType] = &[
    NodeType::UniformScalar,
    NodeType::UniformVec2,
    NodeType::UniformVec3,
    NodeType::UniformVec4,
    NodeType::UniformInt,
    NodeType::UniformMat4,
];
pub const BUFFER_TYPES: &[NodeType] = &[
    NodeType::BufferFloat,
    NodeType::BufferVec2,
    NodeType::BufferVec3,
    NodeType::BufferVec4,
];
pub const SHAPE_TYPES: &[NodeType] = &[
    NodeType::Quad,
    NodeType::Triangle,
    NodeType::Box,
    NodeType::Shape,
    NodeType::Shape2,
];
pub const GL_STATE_TYPES: &[NodeType] = &[
    NodeType::GlState,
    NodeType::GlBlendState,
    NodeType::GlColorState,
    NodeType::GlStencilState,
];

pub const DEFAULT_VERTEX_SHADER: &str = include_str!("shaders/default.vert.wgsl");
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("shaders/default.frag.wgsl");

/// Parameters shared by every class.
pub const COMMON_PARAMS: &[P] = &[P::new("name", T::Str).desc("user label of the node")];

const fn animkf(name: &'static str, kf: &'static [NodeType]) -> P {
    P::new(name, T::NodeList).node_types(kf).flags(PACKED)
}

const KF_SCALAR: &[NodeType] = &[NodeType::AnimKeyFrameScalar];
const KF_VEC2: &[NodeType] = &[NodeType::AnimKeyFrameVec2];
const KF_VEC3: &[NodeType] = &[NodeType::AnimKeyFrameVec3];
const KF_VEC4: &[NodeType] = &[NodeType::AnimKeyFrameVec4];

const ANIMKF_SCALAR_PARAMS: &[P] = &[
    P::new("time", T::Dbl).flags(CTOR),
    P::new("value", T::Dbl).flags(CTOR),
    P::new("easing", T::Select(EASING_NAMES)).default(D::Str("linear")),
];
const ANIMKF_VEC2_PARAMS: &[P] = &[
    P::new("time", T::Dbl).flags(CTOR),
    P::new("value", T::Vec2).flags(CTOR),
    P::new("easing", T::Select(EASING_NAMES)).default(D::Str("linear")),
];
const ANIMKF_VEC3_PARAMS: &[P] = &[
    P::new("time", T::Dbl).flags(CTOR),
    P::new("value", T::Vec3).flags(CTOR),
    P::new("easing", T::Select(EASING_NAMES)).default(D::Str("linear")),
];
const ANIMKF_VEC4_PARAMS: &[P] = &[
    P::new("time", T::Dbl).flags(CTOR),
    P::new("value", T::Vec4).flags(CTOR),
    P::new("easing", T::Select(EASING_NAMES)).default(D::Str("linear")),
];

const ANIMATION_SCALAR_PARAMS: &[P] = &[animkf("keyframes", KF_SCALAR)];
const ANIMATION_VEC2_PARAMS: &[P] = &[animkf("keyframes", KF_VEC2)];
const ANIMATION_VEC3_PARAMS: &[P] = &[animkf("keyframes", KF_VEC3)];
const ANIMATION_VEC4_PARAMS: &[P] = &[animkf("keyframes", KF_VEC4)];

const BUFFER_PARAMS: &[P] = &[
    P::new("n", T::Int)
        .default(D::Int(1))
        .flags(CTOR)
        .desc("number of elements"),
    P::new("data", T::Data).desc("raw little-endian float data"),
];

const UNIFORM_SCALAR_PARAMS: &[P] = &[P::new("value", T::Dbl), animkf("animkf", KF_SCALAR)];
const UNIFORM_VEC2_PARAMS: &[P] = &[P::new("value", T::Vec2), animkf("animkf", KF_VEC2)];
const UNIFORM_VEC3_PARAMS: &[P] = &[P::new("value", T::Vec3), animkf("animkf", KF_VEC3)];
const UNIFORM_VEC4_PARAMS: &[P] = &[P::new("value", T::Vec4), animkf("animkf", KF_VEC4)];
const UNIFORM_INT_PARAMS: &[P] = &[P::new("value", T::Int)];
const UNIFORM_MAT4_PARAMS: &[P] = &[P::new("transform", T::Node)
    .node_types(TRANSFORM_TYPES)
    .desc("transformation chain providing the matrix")];

const ROTATE_PARAMS: &[P] = &[
    P::new("child", T::Node).flags(CTOR),
    P::new("angle", T::Dbl).desc("rotation angle in degrees"),
    P::new("axis", T::Vec3).default(D::Vec3([0.0, 0.0, 1.0])),
    P::new("anchor", T::Vec3).desc("center of the rotation"),
    animkf("animkf", KF_SCALAR),
    P::new("anim", T::Node).node_types(&[NodeType::AnimationScalar]),
];
const TRANSLATE_PARAMS: &[P] = &[
    P::new("child", T::Node).flags(CTOR),
    P::new("vector", T::Vec3),
    animkf("animkf", KF_VEC3),
    P::new("anim", T::Node).node_types(&[NodeType::AnimationVec3]),
];
const SCALE_PARAMS: &[P] = &[
    P::new("child", T::Node).flags(CTOR),
    P::new("factors", T::Vec3).default(D::Vec3([1.0, 1.0, 1.0])),
    P::new("anchor", T::Vec3).desc("center of the scaling"),
    animkf("animkf", KF_VEC3),
    P::new("anim", T::Node).node_types(&[NodeType::AnimationVec3]),
];
const CAMERA_PARAMS: &[P] = &[
    P::new("child", T::Node).flags(CTOR),
    P::new("eye", T::Vec3),
    P::new("center", T::Vec3).default(D::Vec3([0.0, 0.0, -1.0])),
    P::new("up", T::Vec3).default(D::Vec3([0.0, 1.0, 0.0])),
    P::new("perspective", T::Vec4).desc("fov (degrees), aspect ratio, near and far planes"),
    animkf("fov_animkf", KF_SCALAR),
];

const GROUP_PARAMS: &[P] = &[P::new("children", T::NodeList)];
const TEXTURED_SHAPE_PARAMS: &[P] = &[
    P::new("shape", T::Node).flags(CTOR).node_types(SHAPE_TYPES),
    P::new("shader", T::Node)
        .flags(CTOR)
        .node_types(&[NodeType::Shader]),
    P::new("textures", T::NodeDict).node_types(&[NodeType::Texture]),
    P::new("uniforms", T::NodeDict).node_types(UNIFORM_TYPES),
    P::new("attributes", T::NodeDict)
        .node_types(BUFFER_TYPES)
        .desc("extra per-vertex attributes"),
    P::new("glstates", T::NodeList).node_types(GL_STATE_TYPES),
];
const COMPUTE_PARAMS: &[P] = &[
    P::new("nb_group_x", T::Int).flags(CTOR),
    P::new("nb_group_y", T::Int).flags(CTOR),
    P::new("nb_group_z", T::Int).flags(CTOR),
    P::new("shader", T::Node)
        .flags(CTOR)
        .node_types(&[NodeType::ComputeShader]),
    P::new("textures", T::NodeDict).node_types(&[NodeType::Texture]),
    P::new("uniforms", T::NodeDict).node_types(UNIFORM_TYPES),
    P::new("buffers", T::NodeDict).node_types(BUFFER_TYPES),
];
const RTT_PARAMS: &[P] = &[
    P::new("child", T::Node).flags(CTOR),
    P::new("color_texture", T::Node)
        .flags(CTOR)
        .node_types(&[NodeType::Texture]),
    P::new("depth_texture", T::Node).node_types(&[NodeType::Texture]),
];

const QUAD_PARAMS: &[P] = &[
    P::new("corner", T::Vec3).flags(CTOR),
    P::new("width", T::Vec3).flags(CTOR),
    P::new("height", T::Vec3).flags(CTOR),
    P::new("uv_corner", T::Vec2),
    P::new("uv_width", T::Vec2).default(D::Vec2([1.0, 0.0])),
    P::new("uv_height", T::Vec2).default(D::Vec2([0.0, 1.0])),
];
const TRIANGLE_PARAMS: &[P] = &[
    P::new("edge0", T::Vec3).flags(CTOR),
    P::new("edge1", T::Vec3).flags(CTOR),
    P::new("edge2", T::Vec3).flags(CTOR),
    P::new("uv_edge0", T::Vec2),
    P::new("uv_edge1", T::Vec2).default(D::Vec2([1.0, 0.0])),
    P::new("uv_edge2", T::Vec2).default(D::Vec2([0.0, 1.0])),
];
const BOX_PARAMS: &[P] = &[
    P::new("corner", T::Vec3).flags(CTOR),
    P::new("width", T::Vec3).flags(CTOR),
    P::new("height", T::Vec3).flags(CTOR),
    P::new("depth", T::Vec3).flags(CTOR),
    P::new("uv_corner", T::Vec2),
    P::new("uv_width", T::Vec2).default(D::Vec2([1.0, 0.0])),
    P::new("uv_height", T::Vec2).default(D::Vec2([0.0, 1.0])),
];
const SHAPE_PRIMITIVE_PARAMS: &[P] = &[
    P::new("coordinates", T::Vec3).flags(CTOR),
    P::new("texture_coordinates", T::Vec2).flags(CTOR),
    P::new("normals", T::Vec3),
    animkf("animkf_x", KF_SCALAR),
    animkf("animkf_y", KF_SCALAR),
    animkf("animkf_z", KF_SCALAR),
];
const SHAPE_PARAMS: &[P] = &[
    P::new("primitives", T::NodeList).node_types(&[NodeType::ShapePrimitive]),
    P::new("draw_mode", T::Select(DRAW_MODES)).default(D::Str("triangles")),
    P::new("draw_type", T::Select(DRAW_TYPES)).default(D::Str("unsigned_short")),
];
const SHAPE2_PARAMS: &[P] = &[
    P::new("vertices", T::Node)
        .flags(CTOR)
        .node_types(&[NodeType::BufferVec3]),
    P::new("texcoords", T::Node).node_types(&[NodeType::BufferVec2]),
    P::new("normals", T::Node).node_types(&[NodeType::BufferVec3]),
    P::new("draw_mode", T::Select(DRAW_MODES)).default(D::Str("triangles")),
    P::new("draw_type", T::Select(DRAW_TYPES)).default(D::Str("unsigned_short")),
];

const SHADER_PARAMS: &[P] = &[
    P::new("vertex_data", T::Str)
        .default(D::Str(DEFAULT_VERTEX_SHADER))
        .desc("WGSL source with a vs_main entry point"),
    P::new("fragment_data", T::Str)
        .default(D::Str(DEFAULT_FRAGMENT_SHADER))
        .desc("WGSL source with a fs_main entry point"),
];
const COMPUTE_SHADER_PARAMS: &[P] = &[P::new("compute_data", T::Str)
    .flags(CTOR)
    .desc("WGSL source with a main entry point")];
const TEXTURE_PARAMS: &[P] = &[
    P::new("data_src", T::Node).node_types(&[NodeType::Media]),
    P::new("width", T::Int),
    P::new("height", T::Int),
    P::new("format", T::Select(TEXTURE_FORMATS)).default(D::Str("rgba8")),
    P::new("min_filter", T::Select(FILTERS)).default(D::Str("linear")),
    P::new("mag_filter", T::Select(FILTERS)).default(D::Str("linear")),
    P::new("wrap_s", T::Select(WRAPS)).default(D::Str("clamp_to_edge")),
    P::new("wrap_t", T::Select(WRAPS)).default(D::Str("clamp_to_edge")),
];
const MEDIA_PARAMS: &[P] = &[
    P::new("filename", T::Str).flags(CTOR),
    P::new("initial_seek", T::Dbl),
    animkf("time_animkf", KF_SCALAR),
    P::new("audio_tex", T::Int),
];

const GL_STATE_PARAMS: &[P] = &[
    P::new("capability", T::Select(CAPABILITIES)).flags(CTOR),
    P::new("enabled", T::Bool).flags(CTOR),
];
const GL_BLEND_STATE_PARAMS: &[P] = &[
    P::new("enabled", T::Bool).flags(CTOR),
    P::new("src_rgb", T::Select(BLEND_FACTORS)).default(D::Str("one")),
    P::new("dst_rgb", T::Select(BLEND_FACTORS)).default(D::Str("zero")),
    P::new("src_alpha", T::Select(BLEND_FACTORS)).default(D::Str("one")),
    P::new("dst_alpha", T::Select(BLEND_FACTORS)).default(D::Str("zero")),
    P::new("mode_rgb", T::Select(BLEND_OPS)).default(D::Str("add")),
    P::new("mode_alpha", T::Select(BLEND_OPS)).default(D::Str("add")),
];
const GL_COLOR_STATE_PARAMS: &[P] = &[
    P::new("enabled", T::Bool).flags(CTOR),
    P::new("red", T::Bool).default(D::Bool(true)),
    P::new("green", T::Bool).default(D::Bool(true)),
    P::new("blue", T::Bool).default(D::Bool(true)),
    P::new("alpha", T::Bool).default(D::Bool(true)),
];
const GL_STENCIL_STATE_PARAMS: &[P] = &[
    P::new("enabled", T::Bool).flags(CTOR),
    P::new("write_mask", T::Int).default(D::Int(0xff)),
    P::new("func", T::Select(COMPARE_FUNCS)).default(D::Str("always")),
    P::new("func_ref", T::Int),
    P::new("func_mask", T::Int).default(D::Int(0xff)),
    P::new("op_sfail", T::Select(STENCIL_OPS)).default(D::Str("keep")),
    P::new("op_dpfail", T::Select(STENCIL_OPS)).default(D::Str("keep")),
    P::new("op_dppass", T::Select(STENCIL_OPS)).default(D::Str("keep")),
];

impl NodeType {
    pub const ALL: &'static [NodeType] = &[
        NodeType::AnimKeyFrameScalar,
        NodeType::AnimKeyFrameVec2,
        NodeType::AnimKeyFrameVec3,
        NodeType::AnimKeyFrameVec4,
        NodeType::AnimationScalar,
        NodeType::AnimationVec2,
        NodeType::AnimationVec3,
        NodeType::AnimationVec4,
        NodeType::BufferFloat,
        NodeType::BufferVec2,
        NodeType::BufferVec3,
        NodeType::BufferVec4,
        NodeType::UniformScalar,
        NodeType::UniformVec2,
        NodeType::UniformVec3,
        NodeType::UniformVec4,
        NodeType::UniformInt,
        NodeType::UniformMat4,
        NodeType::Identity,
        NodeType::Rotate,
        NodeType::Translate,
        NodeType::Scale,
        NodeType::Camera,
        NodeType::Group,
        NodeType::TexturedShape,
        NodeType::Compute,
        NodeType::Rtt,
        NodeType::Quad,
        NodeType::Triangle,
        NodeType::Box,
        NodeType::ShapePrimitive,
        NodeType::Shape,
        NodeType::Shape2,
        NodeType::Shader,
        NodeType::ComputeShader,
        NodeType::Texture,
        NodeType::Media,
        NodeType::GlState,
        NodeType::GlBlendState,
        NodeType::GlColorState,
        NodeType::GlStencilState,
    ];

    /// Class name, as used by the specs file and the serialization format.
    pub fn name(self) -> &'static str {
        match self {
            NodeType::AnimKeyFrameScalar => "AnimKeyFrameScalar",
            NodeType::AnimKeyFrameVec2 => "AnimKeyFrameVec2",
            NodeType::AnimKeyFrameVec3 => "AnimKeyFrameVec3",
            NodeType::AnimKeyFrameVec4 => "AnimKeyFrameVec4",
            NodeType::AnimationScalar => "AnimationScalar",
            NodeType::AnimationVec2 => "AnimationVec2",
            NodeType::AnimationVec3 => "AnimationVec3",
            NodeType::AnimationVec4 => "AnimationVec4",
            NodeType::BufferFloat => "BufferFloat",
            NodeType::BufferVec2 => "BufferVec2",
            NodeType::BufferVec3 => "BufferVec3",
            NodeType::BufferVec4 => "BufferVec4",
            NodeType::UniformScalar => "UniformScalar",
            NodeType::UniformVec2 => "UniformVec2",
            NodeType::UniformVec3 => "UniformVec3",
            NodeType::UniformVec4 => "UniformVec4",
            NodeType::UniformInt => "UniformInt",
            NodeType::UniformMat4 => "UniformMat4",
            NodeType::Identity => "Identity",
            NodeType::Rotate => "Rotate",
            NodeType::Translate => "Translate",
            NodeType::Scale => "Scale",
            NodeType::Camera => "Camera",
            NodeType::Group => "Group",
            NodeType::TexturedShape => "TexturedShape",
            NodeType::Compute => "Compute",
            NodeType::Rtt => "RTT",
            NodeType::Quad => "Quad",
            NodeType::Triangle => "Triangle",
            NodeType::Box => "Box",
            NodeType::ShapePrimitive => "ShapePrimitive",
            NodeType::Shape => "Shape",
            NodeType::Shape2 => "Shape2",
            NodeType::Shader => "Shader",
            NodeType::ComputeShader => "ComputeShader",
            NodeType::Texture => "Texture",
            NodeType::Media => "Media",
            NodeType::GlState => "GLState",
            NodeType::GlBlendState => "GLBlendState",
            NodeType::GlColorState => "GLColorState",
            NodeType::GlStencilState => "GLStencilState",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.name() == name)
    }

    /// Class-specific parameters, without [`COMMON_PARAMS`].
    pub fn params(self) -> &'static [P] {
        match self {
            NodeType::AnimKeyFrameScalar => ANIMKF_SCALAR_PARAMS,
            NodeType::AnimKeyFrameVec2 => ANIMKF_VEC2_PARAMS,
            NodeType::AnimKeyFrameVec3 => ANIMKF_VEC3_PARAMS,
            NodeType::AnimKeyFrameVec4 => ANIMKF_VEC4_PARAMS,
            NodeType::AnimationScalar => ANIMATION_SCALAR_PARAMS,
            NodeType::AnimationVec2 => ANIMATION_VEC2_PARAMS,
            NodeType::AnimationVec3 => ANIMATION_VEC3_PARAMS,
            NodeType::AnimationVec4 => ANIMATION_VEC4_PARAMS,
            NodeType::BufferFloat
            | NodeType::BufferVec2
            | NodeType::BufferVec3
            | NodeType::BufferVec4 => BUFFER_PARAMS,
            NodeType::UniformScalar => UNIFORM_SCALAR_PARAMS,
            NodeType::UniformVec2 => UNIFORM_VEC2_PARAMS,
            NodeType::UniformVec3 => UNIFORM_VEC3_PARAMS,
            NodeType::UniformVec4 => UNIFORM_VEC4_PARAMS,
            NodeType::UniformInt => UNIFORM_INT_PARAMS,
            NodeType::UniformMat4 => UNIFORM_MAT4_PARAMS,
            NodeType::Identity => &[],
            NodeType::Rotate => ROTATE_PARAMS,
            NodeType::Translate => TRANSLATE_PARAMS,
            NodeType::Scale => SCALE_PARAMS,
            NodeType::Camera => CAMERA_PARAMS,
            NodeType::Group => GROUP_PARAMS,
            NodeType::TexturedShape => TEXTURED_SHAPE_PARAMS,
            NodeType::Compute => COMPUTE_PARAMS,
            NodeType::Rtt => RTT_PARAMS,
            NodeType::Quad => QUAD_PARAMS,
            NodeType::Triangle => TRIANGLE_PARAMS,
            NodeType::Box => BOX_PARAMS,
            NodeType::ShapePrimitive => SHAPE_PRIMITIVE_PARAMS,
            NodeType::Shape => SHAPE_PARAMS,
            NodeType::Shape2 => SHAPE2_PARAMS,
            NodeType::Shader => SHADER_PARAMS,
            NodeType::ComputeShader => COMPUTE_SHADER_PARAMS,
            NodeType::Texture => TEXTURE_PARAMS,
            NodeType::Media => MEDIA_PARAMS,
            NodeType::GlState => GL_STATE_PARAMS,
            NodeType::GlBlendState => GL_BLEND_STATE_PARAMS,
            NodeType::GlColorState => GL_COLOR_STATE_PARAMS,
            NodeType::GlStencilState => GL_STENCIL_STATE_PARAMS,
        }
    }

    /// Common parameters followed by the class parameters, in storage order.
    pub fn all_params(self) -> impl Iterator<Item = &'static P> {
        COMMON_PARAMS.iter().chain(self.params().iter())
    }

    /// Storage index and spec of parameter `key`.
    pub fn lookup(self, key: &str) -> Option<(usize, &'static P)> {
        self.all_params().enumerate().find(|(_, spec)| spec.key == key)
    }

    /// Number of value components for keyframe, animation, uniform and
    /// buffer classes.
    pub(crate) fn components(self) -> usize {
        match self {
            NodeType::AnimKeyFrameVec2
            | NodeType::AnimationVec2
            | NodeType::UniformVec2
            | NodeType::BufferVec2 => 2,
            NodeType::AnimKeyFrameVec3
            | NodeType::AnimationVec3
            | NodeType::UniformVec3
            | NodeType::BufferVec3 => 3,
            NodeType::AnimKeyFrameVec4
            | NodeType::AnimationVec4
            | NodeType::UniformVec4
            | NodeType::BufferVec4 => 4,
            _ => 1,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
