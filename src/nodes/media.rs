//! Shader, texture and media nodes.

use std::rc::Rc;

use super::{Node, NodeType, Runtime, animate};
use crate::error::{Error, Result};
use crate::render::{Filter, Program, ProgramBinding, TextureBinding, TextureDesc, TextureFormat, Wrap};

fn check_entry_point(node: &'static str, source: &str, entry: &str) -> Result<()> {
    if !source.contains(&format!("fn {entry}(")) {
        return Err(Error::init(node, format!("no `{entry}` entry point in shader source")));
    }
    Ok(())
}

pub(super) fn init_program(node: &Node) -> Result<Runtime> {
    let inner = node.inner();
    let program = match inner.ty {
        NodeType::ComputeShader => {
            let compute = inner.string("compute_data").unwrap_or_default();
            check_entry_point("ComputeShader", compute, "main")?;
            Program::Compute {
                compute: compute.to_string(),
            }
        }
        _ => {
            let vertex = inner.string("vertex_data").unwrap_or_default();
            let fragment = inner.string("fragment_data").unwrap_or_default();
            check_entry_point("Shader", vertex, "vs_main")?;
            check_entry_point("Shader", fragment, "fs_main")?;
            Program::Graphics {
                vertex: vertex.to_string(),
                fragment: fragment.to_string(),
            }
        }
    };
    Ok(Runtime::Program(Rc::new(program)))
}

pub(crate) fn program_binding(node: &Node) -> Option<ProgramBinding> {
    let inner = node.inner();
    match &inner.runtime {
        Runtime::Program(program) => Some(ProgramBinding {
            node_id: inner.id,
            generation: inner.generation,
            program: program.clone(),
        }),
        _ => None,
    }
}

pub(super) fn init_texture(node: &Node) -> Result<Runtime> {
    let (format, width, height, media) = {
        let inner = node.inner();
        (
            inner.string("format").and_then(TextureFormat::from_name),
            inner.int("width"),
            inner.int("height"),
            inner.node("data_src"),
        )
    };
    if u32::try_from(width).is_err() || u32::try_from(height).is_err() {
        return Err(Error::init("Texture", format!("invalid dimensions {width}x{height}")));
    }
    if let Some(media) = media {
        if format.is_some_and(|f| f.is_depth()) {
            return Err(Error::init("Texture", "a depth texture can not have a data source"));
        }
        media.init()?;
    }
    Ok(Runtime::None)
}

pub(super) fn init_media(node: &Node) -> Result<Runtime> {
    let (filename, initial_seek, audio_tex) = {
        let inner = node.inner();
        (
            inner.string("filename").unwrap_or_default().to_string(),
            inner.dbl("initial_seek"),
            inner.int("audio_tex"),
        )
    };
    if audio_tex != 0 {
        log::warn!("{filename}: audio textures are not supported, decoding the image only");
    }
    animate::keyframes(node, "time_animkf")?;
    let image = image::open(&filename)?.to_rgba8();
    log::debug!("loaded {filename} ({}x{})", image.width(), image.height());
    Ok(Runtime::Media {
        image: Rc::new(image),
        clock: initial_seek,
    })
}

pub(super) fn update(node: &Node, t: f64) -> Result<()> {
    if node.node_type() == NodeType::Texture {
        let media = node.inner().node("data_src");
        if let Some(media) = media {
            media.update(t)?;
        }
        return Ok(());
    }

    let clock = match animate::animated_value(node, "time_animkf", 0, t)? {
        Some(v) => v[0],
        None => node.inner().dbl("initial_seek") + t,
    };
    if let Runtime::Media { clock: current, .. } = &mut node.0.borrow_mut().runtime {
        *current = clock;
    }
    Ok(())
}

fn filter(name: Option<&str>) -> Filter {
    match name {
        Some("nearest") => Filter::Nearest,
        _ => Filter::Linear,
    }
}

fn wrap(name: Option<&str>) -> Wrap {
    match name {
        Some("repeat") => Wrap::Repeat,
        Some("mirrored_repeat") => Wrap::MirroredRepeat,
        _ => Wrap::ClampToEdge,
    }
}

/// Resolves an initialized texture node for binding.
///
/// The media image gives the size when width or height is 0. Without a
/// media source such a texture is 1x1.
pub(crate) fn texture_binding(node: &Node) -> TextureBinding {
    let inner = node.inner();
    let media = inner.node("data_src");
    let (image, media_time, media_generation) = match &media {
        Some(media) => match &media.inner().runtime {
            Runtime::Media { image, clock } => (Some(image.clone()), Some(*clock), media.generation()),
            _ => (None, None, 0),
        },
        None => (None, None, 0),
    };

    let mut width = u32::try_from(inner.int("width")).unwrap_or(0);
    let mut height = u32::try_from(inner.int("height")).unwrap_or(0);
    if width == 0 || height == 0 {
        (width, height) = image.as_ref().map_or((1, 1), |img| img.dimensions());
    }

    TextureBinding {
        node_id: inner.id,
        revision: inner.generation.max(media_generation),
        desc: TextureDesc {
            width,
            height,
            format: inner
                .string("format")
                .and_then(TextureFormat::from_name)
                .unwrap_or(TextureFormat::Rgba8),
            min_filter: filter(inner.string("min_filter")),
            mag_filter: filter(inner.string("mag_filter")),
            wrap_s: wrap(inner.string("wrap_s")),
            wrap_t: wrap(inner.string("wrap_t")),
        },
        image,
        media_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shader_has_entry_points() {
        let shader = Node::new(NodeType::Shader);
        shader.init().unwrap();
        let binding = program_binding(&shader).unwrap();
        assert!(matches!(*binding.program, Program::Graphics { .. }));
    }

    #[test]
    fn compute_shader_needs_main() {
        let shader = Node::new(NodeType::ComputeShader);
        shader.set("compute_data", "@compute @workgroup_size(1) fn run() {}").unwrap();
        assert!(matches!(shader.init(), Err(Error::Init { .. })));
    }

    #[test]
    fn texture_size_must_fit_the_gpu_range() {
        let texture = Node::new(NodeType::Texture);
        texture.set("width", i64::from(u32::MAX) + 1).unwrap();
        texture.set("height", 4).unwrap();
        assert!(matches!(texture.init(), Err(Error::Init { .. })));

        texture.set("width", -1).unwrap();
        assert!(matches!(texture.init(), Err(Error::Init { .. })));

        texture.set("width", 4).unwrap();
        texture.init().unwrap();
    }

    #[test]
    fn texture_without_source_is_one_pixel() {
        let texture = Node::new(NodeType::Texture);
        texture.set("min_filter", "nearest").unwrap();
        texture.init().unwrap();
        let binding = texture_binding(&texture);
        assert_eq!((binding.desc.width, binding.desc.height), (1, 1));
        assert_eq!(binding.desc.min_filter, Filter::Nearest);
        assert!(binding.image.is_none());
    }

    #[test]
    fn missing_media_file_fails_init() {
        let media = Node::new(NodeType::Media);
        media.set("filename", "/nonexistent/picture.png").unwrap();
        assert!(media.init().is_err());
    }

    #[test]
    fn media_clock_follows_time() {
        let dir = std::env::temp_dir().join(format!("nodegl-media-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pixel.png");
        image::RgbaImage::from_pixel(2, 3, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let media = Node::new(NodeType::Media);
        media.set("filename", path.to_str().unwrap()).unwrap();
        media.set("initial_seek", 1.5).unwrap();
        let texture = Node::new(NodeType::Texture);
        texture.set("data_src", media).unwrap();
        texture.update(2.0).unwrap();

        let binding = texture_binding(&texture);
        assert_eq!((binding.desc.width, binding.desc.height), (2, 3));
        assert_eq!(binding.media_time, Some(3.5));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
