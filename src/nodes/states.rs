//! GL state nodes, folded in order into [`RenderStates`].

use super::{Node, NodeInner, NodeType, Runtime};
use crate::error::{Error, Result};
use crate::render::{BlendFactor, BlendOp, BlendState, CompareFunc, RenderStates, StencilOp, StencilState};

fn select<T>(inner: &NodeInner, key: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    inner
        .string(key)
        .and_then(parse)
        .ok_or_else(|| Error::init(inner.ty.name(), format!("invalid {key}")))
}

fn blend_state(inner: &NodeInner) -> Result<BlendState> {
    Ok(BlendState {
        src_rgb: select(inner, "src_rgb", BlendFactor::from_name)?,
        dst_rgb: select(inner, "dst_rgb", BlendFactor::from_name)?,
        src_alpha: select(inner, "src_alpha", BlendFactor::from_name)?,
        dst_alpha: select(inner, "dst_alpha", BlendFactor::from_name)?,
        op_rgb: select(inner, "mode_rgb", BlendOp::from_name)?,
        op_alpha: select(inner, "mode_alpha", BlendOp::from_name)?,
    })
}

fn mask(inner: &NodeInner, key: &str) -> Result<u32> {
    let value = inner.int(key);
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= 0xff)
        .ok_or_else(|| Error::init(inner.ty.name(), format!("{key} {value} is not an 8-bit value")))
}

fn stencil_state(inner: &NodeInner) -> Result<StencilState> {
    Ok(StencilState {
        write_mask: mask(inner, "write_mask")?,
        func: select(inner, "func", CompareFunc::from_name)?,
        reference: mask(inner, "func_ref")?,
        read_mask: mask(inner, "func_mask")?,
        fail: select(inner, "op_sfail", StencilOp::from_name)?,
        depth_fail: select(inner, "op_dpfail", StencilOp::from_name)?,
        pass: select(inner, "op_dppass", StencilOp::from_name)?,
    })
}

pub(super) fn init(node: &Node) -> Result<Runtime> {
    let inner = node.inner();
    match inner.ty {
        NodeType::GlBlendState => {
            blend_state(&inner)?;
        }
        NodeType::GlStencilState => {
            stencil_state(&inner)?;
        }
        _ => (),
    }
    Ok(Runtime::None)
}

/// Applies `nodes` in order on top of the default states.
pub(crate) fn fold(nodes: &[Node]) -> Result<RenderStates> {
    let mut states = RenderStates::default();
    for node in nodes {
        node.init()?;
        let inner = node.inner();
        let enabled = inner.flag("enabled");
        match inner.ty {
            NodeType::GlState => match inner.string("capability") {
                Some("blend") => states.blend = enabled.then(BlendState::default),
                Some("depth_test") => states.depth_test = enabled,
                Some("stencil_test") => states.stencil = enabled.then(StencilState::default),
                Some("cull_face") => states.cull_face = enabled,
                other => log::warn!("unsupported capability {other:?}"),
            },
            NodeType::GlBlendState => {
                states.blend = if enabled { Some(blend_state(&inner)?) } else { None };
            }
            NodeType::GlColorState => {
                if enabled {
                    states.color_mask = [
                        inner.flag("red"),
                        inner.flag("green"),
                        inner.flag("blue"),
                        inner.flag("alpha"),
                    ];
                }
            }
            NodeType::GlStencilState => {
                states.stencil = if enabled { Some(stencil_state(&inner)?) } else { None };
            }
            ty => log::debug!("{ty} is not a GL state"),
        }
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(capability: &str, enabled: bool) -> Node {
        let node = Node::new(NodeType::GlState);
        node.set("capability", capability).unwrap();
        node.set("enabled", enabled).unwrap();
        node
    }

    #[test]
    fn later_states_override_earlier_ones() {
        let blend = Node::new(NodeType::GlBlendState);
        blend.set("enabled", true).unwrap();
        blend.set("src_rgb", "src_alpha").unwrap();
        blend.set("dst_rgb", "one_minus_src_alpha").unwrap();

        let states = fold(&[state("blend", true), blend, state("depth_test", true)]).unwrap();
        let blend = states.blend.unwrap();
        assert_eq!(blend.src_rgb, BlendFactor::SrcAlpha);
        assert_eq!(blend.dst_rgb, BlendFactor::OneMinusSrcAlpha);
        assert!(states.depth_test);

        let states = fold(&[state("blend", true), state("blend", false)]).unwrap();
        assert!(states.blend.is_none());
    }

    #[test]
    fn color_mask_applies_only_when_enabled() {
        let color = Node::new(NodeType::GlColorState);
        color.set("enabled", true).unwrap();
        color.set("green", false).unwrap();
        let states = fold(&[color.clone()]).unwrap();
        assert_eq!(states.color_mask, [true, false, true, true]);

        color.set("enabled", false).unwrap();
        assert_eq!(fold(&[color]).unwrap().color_mask, [true; 4]);
    }

    #[test]
    fn stencil_masks_are_bytes() {
        let stencil = Node::new(NodeType::GlStencilState);
        stencil.set("enabled", true).unwrap();
        stencil.set("write_mask", 0x1ff).unwrap();
        assert!(matches!(stencil.init(), Err(Error::Init { .. })));
    }
}
