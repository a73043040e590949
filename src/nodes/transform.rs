//! Transform and camera nodes.
//!
//! Each transform holds a local matrix refreshed at update. Matrices flow
//! top-down while drawing: a child is drawn with `modelview * local`.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3};

use super::{Node, NodeType, Runtime, animate};
use crate::error::{Error, Result};
use crate::render::DrawState;

fn rotation(angle: f64, axis: [f32; 3], anchor: [f32; 3]) -> Matrix4<f32> {
    let anchor = Vector3::from(anchor);
    Matrix4::from_translation(anchor)
        * Matrix4::from_axis_angle(Vector3::from(axis).normalize(), Deg(angle as f32))
        * Matrix4::from_translation(-anchor)
}

fn scaling(factors: [f32; 3], anchor: [f32; 3]) -> Matrix4<f32> {
    let anchor = Vector3::from(anchor);
    Matrix4::from_translation(anchor)
        * Matrix4::from_nonuniform_scale(factors[0], factors[1], factors[2])
        * Matrix4::from_translation(-anchor)
}

fn to_vec3(v: [f64; 4]) -> [f32; 3] {
    [v[0] as f32, v[1] as f32, v[2] as f32]
}

/// Animated value of a transform: the `anim` node first, then the `animkf`
/// keyframes. `None` when neither is set.
fn animated(node: &Node, t: f64) -> Result<Option<[f64; 4]>> {
    let anim = node.inner().node("anim");
    if let Some(anim) = anim {
        anim.update(t)?;
        return Ok(Some(animate::current_value(&anim)));
    }
    animate::animated_value(node, "animkf", 0, t)
}

fn local_matrix(node: &Node, value: Option<[f64; 4]>) -> Matrix4<f32> {
    let inner = node.inner();
    match inner.ty {
        NodeType::Rotate => {
            let angle = value.map_or(inner.dbl("angle"), |v| v[0]);
            rotation(angle, inner.vec3("axis"), inner.vec3("anchor"))
        }
        NodeType::Translate => {
            let vector = value.map_or(inner.vec3("vector"), to_vec3);
            Matrix4::from_translation(Vector3::from(vector))
        }
        NodeType::Scale => {
            let factors = value.map_or(inner.vec3("factors"), to_vec3);
            scaling(factors, inner.vec3("anchor"))
        }
        _ => Matrix4::identity(),
    }
}

fn camera(node: &Node, fov: Option<f64>) -> Runtime {
    let inner = node.inner();
    let eye = Point3::from(inner.vec3("eye"));
    let center = Point3::from(inner.vec3("center"));
    let up = Vector3::from(inner.vec3("up"));
    let [fov_param, aspect, near, far] = inner.vec4("perspective");
    let fov = fov.map_or(fov_param, |v| v as f32);
    let projection = (fov > 0.0).then(|| {
        let aspect = if aspect > 0.0 { aspect } else { 1.0 };
        cgmath::perspective(Deg(fov), aspect, near, far)
    });
    Runtime::Camera {
        view: Matrix4::look_at_rh(eye, center, up),
        projection,
    }
}

pub(super) fn init(node: &Node) -> Result<Runtime> {
    let runtime = match node.node_type() {
        NodeType::Identity => Runtime::None,
        NodeType::Camera => {
            let [_, _, near, far] = node.inner().vec4("perspective");
            if near > 0.0 && far > 0.0 && near >= far {
                return Err(Error::init(
                    "Camera",
                    format!("near plane {near} must be closer than far plane {far}"),
                ));
            }
            camera(node, None)
        }
        ty => {
            if ty == NodeType::Rotate && Vector3::from(node.inner().vec3("axis")).magnitude2() == 0.0 {
                return Err(Error::init("Rotate", "rotation axis can not be (0, 0, 0)"));
            }
            Runtime::Matrix(local_matrix(node, None))
        }
    };
    Ok(runtime)
}

pub(super) fn update(node: &Node, t: f64) -> Result<()> {
    let runtime = match node.node_type() {
        NodeType::Identity => return Ok(()),
        NodeType::Camera => {
            let fov = animate::animated_value(node, "fov_animkf", 0, t)?.map(|v| v[0]);
            camera(node, fov)
        }
        _ => {
            let value = animated(node, t)?;
            Runtime::Matrix(local_matrix(node, value))
        }
    };
    node.0.borrow_mut().runtime = runtime;

    let child = node.inner().node("child");
    if let Some(child) = child {
        child.update(t)?;
    }
    Ok(())
}

pub(super) fn draw(node: &Node, state: &mut DrawState) -> Result<()> {
    let (child, local, view, projection) = {
        let inner = node.inner();
        let child = match inner.node("child") {
            Some(child) => child,
            None => return Ok(()),
        };
        match inner.runtime {
            Runtime::Matrix(local) => (child, Some(local), None, None),
            Runtime::Camera { view, projection } => (child, None, Some(view), projection),
            _ => (child, None, None, None),
        }
    };

    let saved_modelview = state.modelview;
    let saved_projection = state.projection;
    if let Some(local) = local {
        state.modelview = state.modelview * local;
    }
    if let Some(view) = view {
        state.modelview = view * state.modelview;
    }
    if let Some(projection) = projection {
        state.projection = projection;
    }
    let res = child.draw(state);
    state.modelview = saved_modelview;
    state.projection = saved_projection;
    res
}

/// Product of the local matrices from `node` down its chain of transform
/// children, as last updated.
pub(crate) fn chain_matrix(node: &Node) -> Matrix4<f32> {
    let mut matrix = Matrix4::identity();
    let mut current = Some(node.clone());
    while let Some(node) = current {
        let inner = node.inner();
        if let Runtime::Matrix(local) = inner.runtime {
            matrix = matrix * local;
        }
        current = inner
            .node("child")
            .filter(|child| super::class::TRANSFORM_TYPES.contains(&child.node_type()));
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector4;

    fn assert_near(a: Vector4<f32>, b: Vector4<f32>) {
        assert!((a - b).magnitude() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn rotate_around_anchor() {
        let m = rotation(90.0, [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
        assert_near(m * Vector4::new(2.0, 0.0, 0.0, 1.0), Vector4::new(1.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn zero_axis_fails_init() {
        let rotate = Node::new(NodeType::Rotate);
        rotate.set("child", Node::new(NodeType::Identity)).unwrap();
        rotate.set("axis", [0.0f32, 0.0, 0.0]).unwrap();
        assert!(matches!(rotate.update(0.0), Err(Error::Init { .. })));
    }

    #[test]
    fn anim_takes_precedence_over_animkf() {
        let kf = |time: f64, v: f64| {
            let kf = Node::new(NodeType::AnimKeyFrameScalar);
            kf.set("time", time).unwrap();
            kf.set("value", v).unwrap();
            kf
        };
        let anim = Node::new(NodeType::AnimationScalar);
        anim.add("keyframes", [kf(0.0, 90.0), kf(1.0, 90.0)]).unwrap();

        let rotate = Node::new(NodeType::Rotate);
        rotate.set("child", Node::new(NodeType::Identity)).unwrap();
        rotate.add("animkf", [kf(0.0, 0.0), kf(1.0, 0.0)]).unwrap();
        rotate.set("anim", anim).unwrap();
        rotate.update(0.5).unwrap();

        let m = chain_matrix(&rotate);
        assert_near(m * Vector4::new(1.0, 0.0, 0.0, 1.0), Vector4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn chain_multiplies_top_down() {
        let scale = Node::new(NodeType::Scale);
        scale.set("child", Node::new(NodeType::Identity)).unwrap();
        scale.set("factors", [2.0f32, 2.0, 2.0]).unwrap();
        let translate = Node::new(NodeType::Translate);
        translate.set("child", scale).unwrap();
        translate.set("vector", [1.0f32, 0.0, 0.0]).unwrap();
        translate.update(0.0).unwrap();

        let m = chain_matrix(&translate);
        assert_near(m * Vector4::new(1.0, 0.0, 0.0, 1.0), Vector4::new(3.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn camera_sets_projection_only_with_fov() {
        let cam = Node::new(NodeType::Camera);
        cam.set("child", Node::new(NodeType::Group)).unwrap();
        cam.update(0.0).unwrap();
        assert!(matches!(cam.inner().runtime, Runtime::Camera { projection: None, .. }));

        cam.set("perspective", [45.0f32, 1.0, 0.1, 10.0]).unwrap();
        cam.update(0.0).unwrap();
        assert!(matches!(cam.inner().runtime, Runtime::Camera { projection: Some(_), .. }));
    }

    #[test]
    fn camera_rejects_inverted_planes() {
        let cam = Node::new(NodeType::Camera);
        cam.set("child", Node::new(NodeType::Group)).unwrap();
        cam.set("perspective", [45.0f32, 1.0, 10.0, 1.0]).unwrap();
        assert!(cam.update(0.0).is_err());
    }
}
