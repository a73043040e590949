//! Keyframe, animation and uniform nodes.

use std::rc::Rc;

use cgmath::{Matrix4, SquareMatrix};

use super::{KeyFrameList, Node, NodeInner, NodeType, Runtime, transform};
use crate::animation::{self, Easing, KeyFrame};
use crate::error::{Error, Result};
use crate::render::UniformValue;

fn read_value(inner: &NodeInner, key: &str, components: usize) -> [f64; 4] {
    let mut value = [0.0; 4];
    match components {
        1 => value[0] = inner.dbl(key),
        2 => {
            for (dst, src) in value.iter_mut().zip(inner.vec2(key)) {
                *dst = src as f64;
            }
        }
        3 => {
            for (dst, src) in value.iter_mut().zip(inner.vec3(key)) {
                *dst = src as f64;
            }
        }
        _ => {
            for (dst, src) in value.iter_mut().zip(inner.vec4(key)) {
                *dst = src as f64;
            }
        }
    }
    value
}

pub(super) fn init_keyframe(node: &Node) -> Result<Runtime> {
    let inner = node.inner();
    let easing_name = inner.string("easing").unwrap_or("linear");
    let easing = Easing::from_name(easing_name)
        .ok_or_else(|| Error::init(inner.ty.name(), format!("unknown easing {easing_name}")))?;
    Ok(Runtime::KeyFrame(KeyFrame {
        time: inner.dbl("time"),
        value: read_value(&inner, "value", inner.ty.components()),
        easing,
    }))
}

/// Resolved keyframes of the list parameter `key` of `node`, cached until
/// the node is reset or one of the keyframes is re-initialized.
pub(super) fn keyframes(node: &Node, key: &'static str) -> Result<Rc<[KeyFrame]>> {
    {
        let inner = node.inner();
        let nodes = inner.nodes(key);
        for kf in nodes {
            kf.init()?;
        }
        let cached = inner.keyframes.iter().find(|list| {
            list.key == key
                && list.sources.len() == nodes.len()
                && list.sources.iter().zip(nodes).all(|(g, kf)| *g == kf.generation())
        });
        if let Some(list) = cached {
            return Ok(list.frames.clone());
        }
    }

    let nodes = node.inner().list(key);
    let mut kfs = Vec::with_capacity(nodes.len());
    for kf in &nodes {
        if let Runtime::KeyFrame(frame) = &kf.inner().runtime {
            kfs.push(*frame);
        }
    }
    animation::check_times(&kfs).map_err(|reason| Error::init(node.node_type().name(), reason))?;
    let frames: Rc<[KeyFrame]> = kfs.into();
    let mut inner = node.0.borrow_mut();
    inner.keyframes.retain(|list| list.key != key);
    inner.keyframes.push(KeyFrameList {
        key,
        sources: nodes.iter().map(Node::generation).collect(),
        frames: frames.clone(),
    });
    Ok(frames)
}

/// Evaluates the keyframe list `key` at `t`, using cursor `slot` of the
/// node. `None` when the list is empty.
pub(super) fn animated_value(node: &Node, key: &'static str, slot: usize, t: f64) -> Result<Option<[f64; 4]>> {
    let kfs = keyframes(node, key)?;
    if kfs.is_empty() {
        return Ok(None);
    }
    let mut cursor = node.inner().cursors[slot];
    let value = animation::evaluate(&kfs, &mut cursor, t);
    node.0.borrow_mut().cursors[slot] = cursor;
    Ok(Some(value))
}

fn keyframes_key(ty: NodeType) -> &'static str {
    match ty {
        NodeType::AnimationScalar
        | NodeType::AnimationVec2
        | NodeType::AnimationVec3
        | NodeType::AnimationVec4 => "keyframes",
        _ => "animkf",
    }
}

pub(super) fn init_animated(node: &Node) -> Result<Runtime> {
    let ty = node.node_type();
    let runtime = match ty {
        NodeType::UniformMat4 => Runtime::Matrix(Matrix4::identity()),
        NodeType::UniformInt => Runtime::Value([node.inner().int("value") as f64, 0.0, 0.0, 0.0]),
        _ => {
            keyframes(node, keyframes_key(ty))?;
            let value = match ty {
                NodeType::UniformScalar
                | NodeType::UniformVec2
                | NodeType::UniformVec3
                | NodeType::UniformVec4 => read_value(&node.inner(), "value", ty.components()),
                _ => [0.0; 4],
            };
            Runtime::Value(value)
        }
    };
    Ok(runtime)
}

pub(super) fn update(node: &Node, t: f64) -> Result<()> {
    let ty = node.node_type();
    if ty == NodeType::UniformMat4 {
        let matrix = match node.inner().node("transform") {
            Some(chain) => {
                chain.update(t)?;
                transform::chain_matrix(&chain)
            }
            None => Matrix4::identity(),
        };
        node.0.borrow_mut().runtime = Runtime::Matrix(matrix);
        return Ok(());
    }

    if let Some(value) = animated_value(node, keyframes_key(ty), 0, t)? {
        node.0.borrow_mut().runtime = Runtime::Value(value);
    }
    Ok(())
}

/// Current value of an animation or uniform node.
pub(crate) fn current_value(node: &Node) -> [f64; 4] {
    match node.inner().runtime {
        Runtime::Value(value) => value,
        _ => [0.0; 4],
    }
}

/// Value of a uniform node as bound to a program.
pub(crate) fn uniform_value(node: &Node) -> Option<UniformValue> {
    let inner = node.inner();
    let v = match inner.runtime {
        Runtime::Value(v) => v,
        Runtime::Matrix(m) => return Some(UniformValue::Mat4(m.into())),
        _ => return None,
    };
    let value = match inner.ty {
        NodeType::UniformScalar => UniformValue::Float(v[0] as f32),
        NodeType::UniformVec2 => UniformValue::Vec2([v[0] as f32, v[1] as f32]),
        NodeType::UniformVec3 => UniformValue::Vec3([v[0] as f32, v[1] as f32, v[2] as f32]),
        NodeType::UniformVec4 => {
            UniformValue::Vec4([v[0] as f32, v[1] as f32, v[2] as f32, v[3] as f32])
        }
        NodeType::UniformInt => UniformValue::Int(v[0] as i32),
        _ => return None,
    };
    Some(value)
}
