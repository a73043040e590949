//! wgpu backend executing recorded [`Frame`]s.
//!
//! The [`Renderer`] owns the device and queue and caches GPU resources per
//! node: textures by texture node, meshes by shape node and storage/vertex
//! buffers by buffer node. Each cache entry remembers the revision it was
//! built from and is refreshed when the node is re-initialized.
//!
//! Programs see the following bindings:
//!
//! - group 0, binding 0: `modelview`, `projection` and `normal` matrices
//! - group 1, binding 0: user uniforms, packed by [`layout::pack_uniforms`]
//! - group 2: texture `i` at binding `2i` with its sampler at `2i + 1`
//!
//! Vertex inputs are position, uv and normal at locations 0, 1 and 2, then
//! one location per extra attribute starting at 3. Compute programs get
//! their uniforms at group 0 binding 0 followed by the storage buffers, and
//! their textures in group 1.

pub mod layout;
pub mod pipeline;
pub mod texture;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::geometry::{Geometry, IndexType};
use crate::render::{
    BufferBinding, ComputeDispatch, DrawCommand, Frame, Program, ProgramBinding, RttPass,
    ShapeDraw, TextureBinding,
};

use self::layout::{MatricesUniform, pack_uniforms, padded_bytes_per_row};
use self::pipeline::{PipelineKey, mk_compute_pipeline, mk_render_pipeline, storage_entry, texture_layout, uniform_entry};
use self::texture::{GpuTexture, create_depth_texture, create_placeholder, wgpu_format};

const LOG_TARGET: &str = crate::context::LOG_TARGET;

fn render_error(e: impl std::fmt::Display) -> Error {
    Error::Render(e.to_string())
}

#[derive(Debug)]
struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_format: wgpu::IndexFormat,
    index_count: u32,
    revision: u64,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let list = geometry.triangle_list_indices();
        let (contents, index_format): (Vec<u8>, _) = match geometry.index_type {
            // no 8-bit index format on the GPU
            IndexType::U8 | IndexType::U16 => {
                let indices: Vec<u16> = list.iter().map(|&i| i as u16).collect();
                (bytemuck::cast_slice(&indices).to_vec(), wgpu::IndexFormat::Uint16)
            }
            IndexType::U32 => (bytemuck::cast_slice(&list).to_vec(), wgpu::IndexFormat::Uint32),
        };
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: &contents,
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            index_format,
            index_count: list.len() as u32,
            revision: geometry.revision,
        }
    }
}

#[derive(Debug)]
struct GpuBuffer {
    buffer: wgpu::Buffer,
    revision: u64,
}

#[derive(Clone, Debug)]
enum Modules {
    Graphics {
        vertex: wgpu::ShaderModule,
        fragment: wgpu::ShaderModule,
    },
    Compute(wgpu::ShaderModule),
}

/// A shape draw with all of its GPU objects resolved.
struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_groups: [wgpu::BindGroup; 3],
    shape_id: u64,
    attributes: Vec<u64>,
    stencil_reference: Option<u32>,
}

/// Where a list of commands renders to.
struct Target<'a> {
    view: &'a wgpu::TextureView,
    depth: &'a wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: [u32; 2],
    viewport: Option<[f32; 4]>,
    clear_color: [f64; 4],
}

/// Resources a frame uses. Cache entries outside of it are dropped after
/// the frame is prepared.
#[derive(Default)]
struct FrameResources {
    textures: HashSet<u64>,
    meshes: HashSet<u64>,
    buffers: HashSet<u64>,
    programs: HashSet<(u64, u64)>,
}

/// Number of entries in each resource cache of a [`Renderer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub textures: usize,
    pub meshes: usize,
    pub buffers: usize,
    pub programs: usize,
    pub pipelines: usize,
}

fn retain_used<K: Eq + std::hash::Hash, V>(cache: &mut HashMap<K, V>, used: &HashSet<K>) {
    cache.retain(|key, _| used.contains(key));
}

/// Executes frames on a wgpu device.
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    matrices_layout: wgpu::BindGroupLayout,
    uniforms_layout: wgpu::BindGroupLayout,
    placeholder: GpuTexture,
    depth: Option<([u32; 2], wgpu::TextureView)>,
    textures: HashMap<u64, Option<GpuTexture>>,
    meshes: HashMap<u64, GpuMesh>,
    buffers: HashMap<u64, GpuBuffer>,
    modules: HashMap<(u64, u64), Modules>,
    texture_layouts: HashMap<(usize, bool), wgpu::BindGroupLayout>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    compute_pipelines: HashMap<(u64, u64, usize, usize), (wgpu::ComputePipeline, wgpu::BindGroupLayout)>,
}

impl Renderer {
    /// Requests an adapter and a device. Pass the surface the renderer will
    /// present to, if any.
    pub async fn request(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> anyhow::Result<(Self, wgpu::Adapter)> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("nodegl device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .context("failed to create the GPU device")?;
        let renderer = Self::from_device(device, queue)?;
        Ok((renderer, adapter))
    }

    /// A renderer without a window, for offscreen rendering.
    pub async fn new_headless() -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });
        let (renderer, adapter) = Self::request(&instance, None).await?;
        log::info!(target: LOG_TARGET, "headless renderer on {:?}", adapter.get_info().name);
        Ok(renderer)
    }

    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> anyhow::Result<Self> {
        let matrices_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
            label: Some("matrices_bind_group_layout"),
        });
        let uniforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
            label: Some("uniforms_bind_group_layout"),
        });
        let placeholder = create_placeholder(&device, &queue)?;
        Ok(Self {
            device,
            queue,
            matrices_layout,
            uniforms_layout,
            placeholder,
            depth: None,
            textures: HashMap::new(),
            meshes: HashMap::new(),
            buffers: HashMap::new(),
            modules: HashMap::new(),
            texture_layouts: HashMap::new(),
            pipelines: HashMap::new(),
            compute_pipelines: HashMap::new(),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            textures: self.textures.len(),
            meshes: self.meshes.len(),
            buffers: self.buffers.len(),
            programs: self.modules.len(),
            pipelines: self.pipelines.len() + self.compute_pipelines.len(),
        }
    }

    /// Drops every cached resource.
    pub fn clear_cache(&mut self) {
        self.textures.clear();
        self.meshes.clear();
        self.buffers.clear();
        self.modules.clear();
        self.pipelines.clear();
        self.compute_pipelines.clear();
    }

    /// Renders `frame` into `view`, a `size` texture of `format`.
    pub fn render(
        &mut self,
        frame: &Frame,
        view: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        size: [u32; 2],
    ) -> Result<()> {
        let mut used = FrameResources::default();
        self.prepare(&frame.commands, &mut used)?;
        self.evict(&used);

        if self.depth.as_ref().map(|(s, _)| *s) != Some(size) {
            self.depth = Some((size, create_depth_texture(&self.device, size, "depth_texture")));
        }
        let depth = match &self.depth {
            Some((_, depth)) => depth.clone(),
            None => return Err(render_error("missing depth attachment")),
        };

        let [x, y, w, h] = frame.viewport;
        let viewport = (w > 0 && h > 0).then(|| {
            let x = (x.max(0) as u32).min(size[0]);
            let y = (y.max(0) as u32).min(size[1]);
            [
                x as f32,
                y as f32,
                (w as u32).min(size[0] - x) as f32,
                (h as u32).min(size[1] - y) as f32,
            ]
        });
        let target = Target {
            view,
            depth: &depth,
            format,
            size,
            viewport,
            clear_color: frame.clear_color,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.encode(&mut encoder, &frame.commands, &target)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Renders `frame` offscreen and reads the result back.
    pub async fn render_to_image(&mut self, frame: &Frame, width: u32, height: u32) -> Result<image::RgbaImage> {
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Output Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.render(frame, &view, format, [width, height])?;

        let bytes_per_row = padded_bytes_per_row(width);
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: (bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Readback Buffer"),
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .map_err(render_error)?;
        rx.receive()
            .await
            .ok_or_else(|| render_error("readback channel closed"))?
            .map_err(render_error)?;

        let data = buffer_slice.get_mapped_range();
        let row = (width * 4) as usize;
        let mut pixels = Vec::with_capacity(row * height as usize);
        for chunk in data.chunks(bytes_per_row as usize).take(height as usize) {
            pixels.extend_from_slice(&chunk[..row]);
        }
        drop(data);
        output_buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| render_error("readback size mismatch"))
    }

    /// Reads the current content of a buffer node back from the GPU, for
    /// instance after a compute dispatch wrote to it.
    pub async fn read_buffer(&self, node_id: u64) -> Result<Vec<f32>> {
        let buffer = &self
            .buffers
            .get(&node_id)
            .ok_or_else(|| render_error(format!("buffer n{node_id} is not on the GPU")))?
            .buffer;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: buffer.size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Buffer Readback"),
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Buffer Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .map_err(render_error)?;
        rx.receive()
            .await
            .ok_or_else(|| render_error("readback channel closed"))?
            .map_err(render_error)?;
        let floats = slice
            .get_mapped_range()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        staging.unmap();
        Ok(floats)
    }

    fn prepare(&mut self, commands: &[DrawCommand], used: &mut FrameResources) -> Result<()> {
        for command in commands {
            match command {
                DrawCommand::Shape(shape) => {
                    self.sync_program(&shape.program);
                    used.programs.insert((shape.program.node_id, shape.program.generation));
                    self.sync_mesh(shape.shape_id, &shape.geometry);
                    used.meshes.insert(shape.shape_id);
                    for (_, texture) in &shape.textures {
                        self.sync_texture(texture)?;
                        used.textures.insert(texture.node_id);
                    }
                    for (_, buffer) in &shape.attributes {
                        self.sync_buffer(buffer);
                        used.buffers.insert(buffer.node_id);
                    }
                }
                DrawCommand::Compute(dispatch) => {
                    self.sync_program(&dispatch.program);
                    used.programs.insert((dispatch.program.node_id, dispatch.program.generation));
                    for (_, texture) in &dispatch.textures {
                        self.sync_texture(texture)?;
                        used.textures.insert(texture.node_id);
                    }
                    for (_, buffer) in &dispatch.buffers {
                        self.sync_buffer(buffer);
                        used.buffers.insert(buffer.node_id);
                    }
                }
                DrawCommand::Rtt(pass) => {
                    self.sync_texture(&pass.color)?;
                    used.textures.insert(pass.color.node_id);
                    if let Some(depth) = &pass.depth {
                        self.sync_texture(depth)?;
                        used.textures.insert(depth.node_id);
                    }
                    self.prepare(&pass.commands, used)?;
                }
            }
        }
        Ok(())
    }

    /// Drops the cached resources `used` does not mention, including
    /// pipelines of older program generations.
    fn evict(&mut self, used: &FrameResources) {
        retain_used(&mut self.textures, &used.textures);
        retain_used(&mut self.meshes, &used.meshes);
        retain_used(&mut self.buffers, &used.buffers);
        retain_used(&mut self.modules, &used.programs);
        self.pipelines.retain(|key, _| used.programs.contains(&key.program));
        self.compute_pipelines
            .retain(|(id, generation, _, _), _| used.programs.contains(&(*id, *generation)));
    }

    fn sync_texture(&mut self, binding: &TextureBinding) -> Result<()> {
        let slot = self.textures.entry(binding.node_id).or_default();
        GpuTexture::sync(slot, &self.device, &self.queue, binding).map_err(render_error)
    }

    fn sync_mesh(&mut self, shape_id: u64, geometry: &Rc<Geometry>) {
        if self.meshes.get(&shape_id).map(|m| m.revision) != Some(geometry.revision) {
            log::debug!(target: LOG_TARGET, "uploading geometry of n{shape_id}");
            self.meshes.insert(shape_id, GpuMesh::new(&self.device, geometry));
        }
    }

    fn sync_buffer(&mut self, binding: &BufferBinding) {
        let data = &binding.data;
        // storage bindings can not be empty
        let size = (data.bytes.len() as wgpu::BufferAddress).max(4);
        match self.buffers.get_mut(&binding.node_id) {
            Some(gpu) if gpu.buffer.size() == size => {
                if gpu.revision != data.revision {
                    self.queue.write_buffer(&gpu.buffer, 0, &data.bytes);
                    gpu.revision = data.revision;
                }
            }
            _ => {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Node Buffer"),
                    size,
                    usage: wgpu::BufferUsages::VERTEX
                        | wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                });
                self.queue.write_buffer(&buffer, 0, &data.bytes);
                self.buffers.insert(
                    binding.node_id,
                    GpuBuffer {
                        buffer,
                        revision: data.revision,
                    },
                );
            }
        }
    }

    fn sync_program(&mut self, binding: &ProgramBinding) {
        let key = (binding.node_id, binding.generation);
        if self.modules.contains_key(&key) {
            return;
        }
        let module = |label: &str, source: &str| {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let modules = match binding.program.as_ref() {
            Program::Graphics { vertex, fragment } => Modules::Graphics {
                vertex: module("Vertex Shader", vertex),
                fragment: module("Fragment Shader", fragment),
            },
            Program::Compute { compute } => Modules::Compute(module("Compute Shader", compute)),
        };
        self.modules.insert(key, modules);
    }

    fn cached_texture_layout(&mut self, count: usize, compute: bool) -> wgpu::BindGroupLayout {
        let device = &self.device;
        self.texture_layouts
            .entry((count, compute))
            .or_insert_with(|| {
                let visibility = if compute {
                    wgpu::ShaderStages::COMPUTE
                } else {
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT
                };
                texture_layout(device, count, visibility)
            })
            .clone()
    }

    fn texture_bind_group(
        &mut self,
        textures: &[(String, TextureBinding)],
        compute: bool,
    ) -> Result<wgpu::BindGroup> {
        let layout = self.cached_texture_layout(textures.len().max(1), compute);
        let mut gpu_textures = Vec::new();
        for (name, binding) in textures {
            let texture = self
                .textures
                .get(&binding.node_id)
                .and_then(Option::as_ref)
                .ok_or_else(|| render_error(format!("texture {name} is not on the GPU")))?;
            if binding.desc.format.is_depth() {
                return Err(render_error(format!("depth texture {name} can not be sampled")));
            }
            gpu_textures.push(texture);
        }
        if gpu_textures.is_empty() {
            gpu_textures.push(&self.placeholder);
        }
        let entries: Vec<wgpu::BindGroupEntry> = gpu_textures
            .iter()
            .enumerate()
            .flat_map(|(i, texture)| {
                [
                    wgpu::BindGroupEntry {
                        binding: 2 * i as u32,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2 * i as u32 + 1,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    },
                ]
            })
            .collect();
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &entries,
            label: Some("texture_bind_group"),
        }))
    }

    fn uniform_bind_group(&self, layout: &wgpu::BindGroupLayout, contents: &[u8], label: &str) -> wgpu::BindGroup {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(label),
        })
    }

    fn prepare_draw(&mut self, shape: &ShapeDraw, format: wgpu::TextureFormat) -> Result<PreparedDraw> {
        let program_key = (shape.program.node_id, shape.program.generation);
        let key = PipelineKey {
            program: program_key,
            states: shape.states,
            draw_mode: shape.geometry.draw_mode,
            color_format: format,
            textures: shape.textures.len().max(1),
            attributes: shape.attributes.iter().map(|(_, b)| b.data.components).collect(),
        };
        let pipeline = match self.pipelines.get(&key) {
            Some(pipeline) => pipeline.clone(),
            None => {
                let Some(Modules::Graphics { vertex, fragment }) = self.modules.get(&program_key).cloned() else {
                    return Err(render_error(format!("n{} is not a graphics program", shape.program.node_id)));
                };
                let textures_layout = self.cached_texture_layout(key.textures, false);
                let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Shape Pipeline Layout"),
                    bind_group_layouts: &[Some(&self.matrices_layout), Some(&self.uniforms_layout), Some(&textures_layout)],
                    immediate_size: 0,
                });
                log::debug!(target: LOG_TARGET, "building pipeline for program n{}", shape.program.node_id);
                let pipeline = mk_render_pipeline(&self.device, &layout, &key, &vertex, &fragment);
                self.pipelines.insert(key, pipeline.clone());
                pipeline
            }
        };

        let matrices = MatricesUniform::new(shape.modelview, shape.projection, shape.normal_matrix);
        let matrices = self.uniform_bind_group(&self.matrices_layout, bytemuck::bytes_of(&matrices), "matrices_bind_group");
        let uniforms = self.uniform_bind_group(
            &self.uniforms_layout,
            &pack_uniforms(&shape.uniforms),
            "uniforms_bind_group",
        );
        let textures = self.texture_bind_group(&shape.textures, false)?;
        Ok(PreparedDraw {
            pipeline,
            bind_groups: [matrices, uniforms, textures],
            shape_id: shape.shape_id,
            attributes: shape.attributes.iter().map(|(_, b)| b.node_id).collect(),
            stencil_reference: shape.states.stencil.map(|s| s.reference),
        })
    }

    fn begin_pass<'e>(
        encoder: &'e mut wgpu::CommandEncoder,
        target: &Target<'_>,
        clear: bool,
    ) -> wgpu::RenderPass<'e> {
        let [r, g, b, a] = target.clear_color;
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth,
                depth_ops: Some(wgpu::Operations {
                    load: if clear { wgpu::LoadOp::Clear(1.0) } else { wgpu::LoadOp::Load },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: if clear { wgpu::LoadOp::Clear(0) } else { wgpu::LoadOp::Load },
                    store: wgpu::StoreOp::Store,
                }),
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        })
    }

    fn draw_shapes(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        shapes: &[&ShapeDraw],
        target: &Target<'_>,
    ) -> Result<()> {
        let draws = shapes
            .iter()
            .map(|shape| self.prepare_draw(shape, target.format))
            .collect::<Result<Vec<_>>>()?;

        let mut render_pass = Self::begin_pass(encoder, target, false);
        if let Some([x, y, w, h]) = target.viewport {
            render_pass.set_viewport(x, y, w, h, 0.0, 1.0);
        }
        for draw in &draws {
            let Some(mesh) = self.meshes.get(&draw.shape_id) else {
                continue;
            };
            if mesh.index_count == 0 {
                continue;
            }
            render_pass.set_pipeline(&draw.pipeline);
            for (i, group) in draw.bind_groups.iter().enumerate() {
                render_pass.set_bind_group(i as u32, group, &[]);
            }
            render_pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            for (i, node_id) in draw.attributes.iter().enumerate() {
                let buffer = self
                    .buffers
                    .get(node_id)
                    .ok_or_else(|| render_error(format!("buffer n{node_id} is not on the GPU")))?;
                render_pass.set_vertex_buffer(1 + i as u32, buffer.buffer.slice(..));
            }
            if let Some(reference) = draw.stencil_reference {
                render_pass.set_stencil_reference(reference);
            }
            render_pass.set_index_buffer(mesh.indices.slice(..), mesh.index_format);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn dispatch(&mut self, encoder: &mut wgpu::CommandEncoder, dispatch: &ComputeDispatch) -> Result<()> {
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        if dispatch.groups.iter().any(|&n| n > max) {
            return Err(render_error(format!(
                "compute n{}: {:?} work groups exceed the device limit of {max}",
                dispatch.node_id, dispatch.groups
            )));
        }

        let program_key = (dispatch.program.node_id, dispatch.program.generation);
        let key = (program_key.0, program_key.1, dispatch.buffers.len(), dispatch.textures.len().max(1));
        let (pipeline, resources_layout) = match self.compute_pipelines.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                let Some(Modules::Compute(module)) = self.modules.get(&program_key).cloned() else {
                    return Err(render_error(format!("n{} is not a compute program", dispatch.program.node_id)));
                };
                let mut entries = vec![uniform_entry(0, wgpu::ShaderStages::COMPUTE)];
                entries.extend((1..=dispatch.buffers.len() as u32).map(storage_entry));
                let resources_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    entries: &entries,
                    label: Some("compute_bind_group_layout"),
                });
                let textures_layout = self.cached_texture_layout(key.3, true);
                let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Compute Pipeline Layout"),
                    bind_group_layouts: &[Some(&resources_layout), Some(&textures_layout)],
                    immediate_size: 0,
                });
                let pipeline = mk_compute_pipeline(&self.device, &layout, &module);
                self.compute_pipelines
                    .insert(key, (pipeline.clone(), resources_layout.clone()));
                (pipeline, resources_layout)
            }
        };

        let uniforms = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Compute Uniforms"),
            contents: &pack_uniforms(&dispatch.uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniforms.as_entire_binding(),
        }];
        for (i, (name, binding)) in dispatch.buffers.iter().enumerate() {
            let buffer = self
                .buffers
                .get(&binding.node_id)
                .ok_or_else(|| render_error(format!("buffer {name} is not on the GPU")))?;
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + i as u32,
                resource: buffer.buffer.as_entire_binding(),
            });
        }
        let resources = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &resources_layout,
            entries: &entries,
            label: Some("compute_bind_group"),
        });
        let textures = self.texture_bind_group(&dispatch.textures, true)?;

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Compute Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&pipeline);
        compute_pass.set_bind_group(0, &resources, &[]);
        compute_pass.set_bind_group(1, &textures, &[]);
        let [x, y, z] = dispatch.groups;
        compute_pass.dispatch_workgroups(x, y, z);
        Ok(())
    }

    fn render_to_texture(&mut self, encoder: &mut wgpu::CommandEncoder, pass: &RttPass) -> Result<()> {
        let color = self
            .textures
            .get(&pass.color.node_id)
            .and_then(Option::as_ref)
            .ok_or_else(|| render_error(format!("render target n{} is not on the GPU", pass.color.node_id)))?;
        let view = color.view.clone();
        let size = [color.desc.width.max(1), color.desc.height.max(1)];
        let depth = match &pass.depth {
            Some(binding) => self
                .textures
                .get(&binding.node_id)
                .and_then(Option::as_ref)
                .map(|t| t.view.clone())
                .ok_or_else(|| render_error(format!("depth target n{} is not on the GPU", binding.node_id)))?,
            None => create_depth_texture(&self.device, size, "rtt depth texture"),
        };
        let target = Target {
            view: &view,
            depth: &depth,
            format: wgpu_format(pass.color.desc.format),
            size,
            viewport: None,
            clear_color: pass.clear_color,
        };
        self.encode(encoder, &pass.commands, &target)
    }

    fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        commands: &[DrawCommand],
        target: &Target<'_>,
    ) -> Result<()> {
        drop(Self::begin_pass(encoder, target, true));
        let mut shapes: Vec<&ShapeDraw> = Vec::new();
        for command in commands {
            match command {
                DrawCommand::Shape(shape) => {
                    shapes.push(shape);
                    continue;
                }
                DrawCommand::Compute(_) | DrawCommand::Rtt(_) if !shapes.is_empty() => {
                    self.draw_shapes(encoder, &shapes, target)?;
                    shapes.clear();
                }
                _ => (),
            }
            match command {
                DrawCommand::Compute(dispatch) => self.dispatch(encoder, dispatch)?,
                DrawCommand::Rtt(pass) => self.render_to_texture(encoder, pass)?,
                DrawCommand::Shape(_) => (),
            }
        }
        if !shapes.is_empty() {
            self.draw_shapes(encoder, &shapes, target)?;
        }
        log::trace!(target: LOG_TARGET, "encoded {} commands into {:?}", commands.len(), target.size);
        Ok(())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("textures", &self.textures.len())
            .field("meshes", &self.meshes.len())
            .field("buffers", &self.buffers.len())
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}
