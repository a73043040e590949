//! Render and compute pipelines built from program nodes.

use crate::geometry::{DrawMode, Vertex};
use crate::render::{BlendFactor, BlendOp, CompareFunc, RenderStates, StencilOp};

use super::texture::DEPTH_FORMAT;

/// Everything a render pipeline depends on besides the bind group layouts,
/// which are derived from `textures`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: (u64, u64),
    pub states: RenderStates,
    pub draw_mode: DrawMode,
    pub color_format: wgpu::TextureFormat,
    pub textures: usize,
    /// Component count of each extra vertex attribute, in binding order.
    pub attributes: Vec<usize>,
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn blend_component(src: BlendFactor, dst: BlendFactor, op: BlendOp) -> wgpu::BlendComponent {
    let operation = match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOp::Min => wgpu::BlendOperation::Min,
        BlendOp::Max => wgpu::BlendOperation::Max,
    };
    // min and max ignore the factors, wgpu wants them to be one
    if matches!(op, BlendOp::Min | BlendOp::Max) {
        return wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation,
        };
    }
    wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation,
    }
}

fn compare_function(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

fn stencil_operation(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::Incr => wgpu::StencilOperation::IncrementClamp,
        StencilOp::IncrWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::Decr => wgpu::StencilOperation::DecrementClamp,
        StencilOp::DecrWrap => wgpu::StencilOperation::DecrementWrap,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
    }
}

fn topology(mode: DrawMode) -> wgpu::PrimitiveTopology {
    match mode {
        DrawMode::Points => wgpu::PrimitiveTopology::PointList,
        DrawMode::Lines => wgpu::PrimitiveTopology::LineList,
        DrawMode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        DrawMode::Triangles | DrawMode::TriangleFan => wgpu::PrimitiveTopology::TriangleList,
        DrawMode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn color_writes(mask: [bool; 4]) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    for (enabled, bit) in mask.into_iter().zip([
        wgpu::ColorWrites::RED,
        wgpu::ColorWrites::GREEN,
        wgpu::ColorWrites::BLUE,
        wgpu::ColorWrites::ALPHA,
    ]) {
        if enabled {
            writes |= bit;
        }
    }
    writes
}

pub fn attribute_format(components: usize) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn depth_stencil(states: &RenderStates) -> wgpu::DepthStencilState {
    let stencil = match states.stencil {
        Some(stencil) => {
            let face = wgpu::StencilFaceState {
                compare: compare_function(stencil.func),
                fail_op: stencil_operation(stencil.fail),
                depth_fail_op: stencil_operation(stencil.depth_fail),
                pass_op: stencil_operation(stencil.pass),
            };
            wgpu::StencilState {
                front: face,
                back: face,
                read_mask: stencil.read_mask,
                write_mask: stencil.write_mask,
            }
        }
        None => wgpu::StencilState::default(),
    };
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: Some(states.depth_test),
        depth_compare: Some(if states.depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        }),
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    key: &PipelineKey,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
        .attributes
        .iter()
        .enumerate()
        .map(|(i, &components)| {
            [wgpu::VertexAttribute {
                offset: 0,
                shader_location: 3 + i as u32,
                format: attribute_format(components),
            }]
        })
        .collect();
    let mut buffers = vec![Vertex::desc()];
    for (attribute, &components) in attributes.iter().zip(&key.attributes) {
        buffers.push(wgpu::VertexBufferLayout {
            array_stride: (components * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attribute,
        });
    }

    let states = &key.states;
    let blend = states.blend.map(|blend| wgpu::BlendState {
        color: blend_component(blend.src_rgb, blend.dst_rgb, blend.op_rgb),
        alpha: blend_component(blend.src_alpha, blend.dst_alpha, blend.op_alpha),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Shape Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("vs_main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.color_format,
                blend,
                write_mask: color_writes(states.color_mask),
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: topology(key.draw_mode),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: states.cull_face.then_some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(depth_stencil(states)),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

pub fn mk_compute_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
) -> wgpu::ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Compute Pipeline"),
        layout: Some(layout),
        module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

pub fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Texture and sampler pairs at bindings `2i` and `2i + 1`.
pub fn texture_layout(
    device: &wgpu::Device,
    count: usize,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..count as u32)
        .flat_map(|i| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * i,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * i + 1,
                    visibility,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("texture_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{BlendState, StencilState};

    #[test]
    fn fans_draw_as_lists() {
        assert_eq!(topology(DrawMode::TriangleFan), wgpu::PrimitiveTopology::TriangleList);
        assert_eq!(topology(DrawMode::LineStrip), wgpu::PrimitiveTopology::LineStrip);
    }

    #[test]
    fn min_max_blending_uses_unit_factors() {
        let component = blend_component(BlendFactor::SrcAlpha, BlendFactor::Zero, BlendOp::Max);
        assert_eq!(component.src_factor, wgpu::BlendFactor::One);
        assert_eq!(component.dst_factor, wgpu::BlendFactor::One);
        let default = BlendState::default();
        assert_eq!(
            blend_component(default.src_rgb, default.dst_rgb, default.op_rgb),
            wgpu::BlendComponent::REPLACE
        );
    }

    #[test]
    fn color_mask_maps_channels() {
        assert_eq!(color_writes([true; 4]), wgpu::ColorWrites::ALL);
        assert_eq!(
            color_writes([true, false, false, true]),
            wgpu::ColorWrites::RED | wgpu::ColorWrites::ALPHA
        );
    }

    #[test]
    fn depth_test_toggles_compare_and_write() {
        let mut states = RenderStates::default();
        let off = depth_stencil(&states);
        assert_eq!(off.depth_compare, Some(wgpu::CompareFunction::Always));
        assert_eq!(off.depth_write_enabled, Some(false));
        states.depth_test = true;
        states.stencil = Some(StencilState::default());
        let on = depth_stencil(&states);
        assert_eq!(on.depth_compare, Some(wgpu::CompareFunction::Less));
        assert_eq!(on.stencil.write_mask, 0xff);
        assert_eq!(on.stencil.front.compare, wgpu::CompareFunction::Always);
    }
}
