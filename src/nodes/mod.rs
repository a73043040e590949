//! Scene graph nodes.
//!
//! A [`Node`] is a reference-counted handle on a typed node. Cloning a handle
//! takes a new reference and dropping the last one releases the node. The
//! graph is a DAG: the same node may be shared by several parents (a texture
//! used by many shapes), but a node can never reach itself.
//!
//! # Lifecycle
//!
//! 1. parameters are set through [`Node::set`], [`Node::add`] and [`Node::set_dict`]
//! 2. the graph is attached to a [`crate::Context`] with `set_scene`
//! 3. on the first frame each node is initialized: constructor parameters are
//!    checked and class-specific state is built
//! 4. every frame the graph is updated at time `t` (once per node and `t`)
//!    and drawn into a [`crate::render::Frame`]
//!
//! Setting a parameter on an initialized node resets it so it initializes
//! again on the next frame.

mod animate;
pub mod class;
mod media;
mod scene;
mod shape;
mod states;
mod transform;

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::Matrix4;

pub use class::NodeType;

use crate::animation::KeyFrame;
use crate::error::{Error, Result};
use crate::geometry::{BufferData, Geometry};
use crate::params::{Coercion, ParamSpec, ParamType, ParamValue};
use crate::render::{DrawState, Program};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);
/// Bumped by every parameter edit. Update memoization is keyed on it along
/// with the time, so an edit anywhere re-evaluates the graph at the same `t`.
static EDIT_EPOCH: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Scene root of every context, by context id.
    static SCENES: RefCell<HashMap<u64, Weak<RefCell<NodeInner>>>> = RefCell::new(HashMap::new());
}

/// Handle on a scene graph node.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeInner>>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    Uninitialized,
    Ready,
}

/// Class-specific state built at init and refreshed at update.
#[derive(Default)]
pub(crate) enum Runtime {
    #[default]
    None,
    KeyFrame(KeyFrame),
    /// Current value of an animation, uniform or shape primitive offset.
    Value([f64; 4]),
    /// Local matrix of a transform, or the matrix of a UniformMat4.
    Matrix(Matrix4<f32>),
    Camera {
        view: Matrix4<f32>,
        projection: Option<Matrix4<f32>>,
    },
    Geometry {
        geometry: Rc<Geometry>,
        deps: Vec<(u64, u64)>,
        dynamic: bool,
    },
    Buffer(Rc<BufferData>),
    Program(Rc<Program>),
    Media {
        image: Rc<image::RgbaImage>,
        clock: f64,
    },
}

pub(crate) struct NodeInner {
    pub(crate) id: u64,
    pub(crate) ty: NodeType,
    pub(crate) params: Vec<ParamValue>,
    pub(crate) state: State,
    pub(crate) ctx: Option<u64>,
    pub(crate) last_update: Option<(f64, u64)>,
    pub(crate) generation: u64,
    pub(crate) cursors: [usize; 3],
    pub(crate) keyframes: Vec<KeyFrameList>,
    pub(crate) runtime: Runtime,
}

impl NodeInner {
    fn find(&self, key: &str) -> Option<&ParamValue> {
        self.ty.lookup(key).map(|(index, _)| &self.params[index])
    }

    pub(crate) fn int(&self, key: &str) -> i64 {
        match self.find(key) {
            Some(ParamValue::Int(v)) => *v,
            _ => 0,
        }
    }

    pub(crate) fn flag(&self, key: &str) -> bool {
        matches!(self.find(key), Some(ParamValue::Bool(true)))
    }

    pub(crate) fn dbl(&self, key: &str) -> f64 {
        match self.find(key) {
            Some(ParamValue::Dbl(v)) => *v,
            _ => 0.0,
        }
    }

    pub(crate) fn vec2(&self, key: &str) -> [f32; 2] {
        match self.find(key) {
            Some(ParamValue::Vec2(v)) => *v,
            _ => [0.0; 2],
        }
    }

    pub(crate) fn vec3(&self, key: &str) -> [f32; 3] {
        match self.find(key) {
            Some(ParamValue::Vec3(v)) => *v,
            _ => [0.0; 3],
        }
    }

    pub(crate) fn vec4(&self, key: &str) -> [f32; 4] {
        match self.find(key) {
            Some(ParamValue::Vec4(v)) => *v,
            _ => [0.0; 4],
        }
    }

    pub(crate) fn string(&self, key: &str) -> Option<&str> {
        match self.find(key) {
            Some(ParamValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn data(&self, key: &str) -> Option<&[u8]> {
        match self.find(key) {
            Some(ParamValue::Data(v)) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn node(&self, key: &str) -> Option<Node> {
        match self.find(key) {
            Some(ParamValue::Node(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub(crate) fn list(&self, key: &str) -> Vec<Node> {
        match self.find(key) {
            Some(ParamValue::NodeList(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn dict(&self, key: &str) -> BTreeMap<String, Node> {
        match self.find(key) {
            Some(ParamValue::NodeDict(v)) => v.clone(),
            _ => BTreeMap::new(),
        }
    }

    pub(crate) fn nodes(&self, key: &str) -> &[Node] {
        match self.find(key) {
            Some(ParamValue::NodeList(v)) => v,
            _ => &[],
        }
    }

    fn reset(&mut self) {
        if self.state == State::Ready {
            self.state = State::Uninitialized;
            self.runtime = Runtime::None;
        }
        self.last_update = None;
        self.keyframes.clear();
        EDIT_EPOCH.fetch_add(1, Ordering::Relaxed);
    }
}

/// Resolved keyframes of a list parameter, with the generations of the
/// keyframe nodes they were read from.
pub(crate) struct KeyFrameList {
    pub(crate) key: &'static str,
    pub(crate) sources: Vec<u64>,
    pub(crate) frames: Rc<[KeyFrame]>,
}

/// Detaches the nodes under `removed` that the scene of `ctx` does not reach
/// anymore.
fn release_unreachable(ctx: u64, removed: Vec<Node>) {
    if removed.is_empty() {
        return;
    }
    let root = SCENES.with(|scenes| scenes.borrow().get(&ctx).and_then(Weak::upgrade));
    let reachable: HashSet<u64> = root
        .map(|root| Node(root).walk().iter().map(Node::id).collect())
        .unwrap_or_default();
    for node in removed {
        for node in node.walk() {
            if reachable.contains(&node.id()) {
                continue;
            }
            let mut inner = node.0.borrow_mut();
            if inner.ctx == Some(ctx) {
                inner.reset();
                inner.ctx = None;
            }
        }
    }
}

impl Node {
    pub fn new(ty: NodeType) -> Self {
        let params = ty.all_params().map(ParamSpec::default_value).collect();
        Node(Rc::new(RefCell::new(NodeInner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            ty,
            params,
            state: State::Uninitialized,
            ctx: None,
            last_update: None,
            generation: 0,
            cursors: [0; 3],
            keyframes: Vec::new(),
            runtime: Runtime::None,
        })))
    }

    /// Creates a node from its class name, e.g. `"Quad"` or `"RTT"`.
    pub fn from_name(name: &str) -> Result<Self> {
        NodeType::from_name(name)
            .map(Node::new)
            .ok_or_else(|| Error::UnknownNodeType(name.to_string()))
    }

    pub fn node_type(&self) -> NodeType {
        self.0.borrow().ty
    }

    /// Process-unique identifier, stable for the lifetime of the node.
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    /// The `name` parameter if set, `ClassName#id` otherwise.
    pub fn label(&self) -> String {
        let inner = self.0.borrow();
        match inner.string("name") {
            Some(name) => name.to_string(),
            None => format!("{}#{}", inner.ty.name(), inner.id),
        }
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Sets parameter `key`, replacing its previous value.
    pub fn set(&self, key: &str, value: impl Into<ParamValue>) -> Result<()> {
        let (index, spec) = self.lookup(key)?;
        let value = spec
            .coerce(value.into())
            .map_err(|c| self.coercion_error(spec, c))?;
        let children = value.nodes();
        self.check_children(spec, &children)?;
        let old = self.store(index, value);
        self.attach_children(&children);
        self.release_replaced(old.nodes());
        Ok(())
    }

    /// Appends `nodes` to the list parameter `key`.
    pub fn add<I>(&self, key: &str, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = Node>,
    {
        let (index, spec) = self.lookup(key)?;
        if spec.ty != ParamType::NodeList {
            return Err(self.operation_error(spec, "add"));
        }
        let nodes: Vec<Node> = nodes.into_iter().collect();
        self.check_children(spec, &nodes)?;
        {
            let mut inner = self.0.borrow_mut();
            if let ParamValue::NodeList(list) = &mut inner.params[index] {
                list.extend(nodes.iter().cloned());
            }
            inner.reset();
        }
        self.attach_children(&nodes);
        Ok(())
    }

    /// Inserts (`Some`) or removes (`None`) entry `name` of the dict
    /// parameter `key`.
    pub fn set_dict(&self, key: &str, name: &str, node: Option<Node>) -> Result<()> {
        let (index, spec) = self.lookup(key)?;
        if spec.ty != ParamType::NodeDict {
            return Err(self.operation_error(spec, "update"));
        }
        let children: Vec<Node> = node.iter().cloned().collect();
        self.check_children(spec, &children)?;
        let replaced = {
            let mut inner = self.0.borrow_mut();
            let replaced = match &mut inner.params[index] {
                ParamValue::NodeDict(dict) => match node {
                    Some(node) => dict.insert(name.to_string(), node),
                    None => dict.remove(name),
                },
                _ => None,
            };
            inner.reset();
            replaced
        };
        self.attach_children(&children);
        self.release_replaced(replaced.into_iter().collect());
        Ok(())
    }

    /// Current value of parameter `key`.
    pub fn get(&self, key: &str) -> Result<ParamValue> {
        let (index, _) = self.lookup(key)?;
        Ok(self.0.borrow().params[index].clone())
    }

    /// Text serialization of the graph rooted at this node.
    pub fn serialize(&self) -> String {
        crate::serialize::serialize(self)
    }

    /// Graphviz representation of the graph rooted at this node.
    pub fn dot(&self) -> String {
        crate::dot::dot(self)
    }

    /// Rebuilds a graph from [`Node::serialize`] output.
    pub fn deserialize(text: &str) -> Result<Node> {
        crate::serialize::deserialize(text)
    }

    pub(crate) fn inner(&self) -> Ref<'_, NodeInner> {
        self.0.borrow()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.0.borrow().generation
    }

    fn lookup(&self, key: &str) -> Result<(usize, &'static ParamSpec)> {
        let ty = self.node_type();
        ty.lookup(key).ok_or_else(|| Error::UnknownParam {
            node: ty.name(),
            key: key.to_string(),
        })
    }

    fn coercion_error(&self, spec: &ParamSpec, coercion: Coercion) -> Error {
        let node = self.node_type().name();
        match (coercion, spec.ty) {
            (Coercion::Choice(value), ParamType::Select(choices)) => Error::InvalidChoice {
                node,
                key: spec.key.to_string(),
                value,
                choices: choices.join(", "),
            },
            (Coercion::Choice(_), _) => Error::ParamType {
                node,
                key: spec.key.to_string(),
                expected: spec.ty.name(),
                got: "string",
            },
            (Coercion::Type(got), _) => Error::ParamType {
                node,
                key: spec.key.to_string(),
                expected: spec.ty.name(),
                got,
            },
        }
    }

    fn operation_error(&self, spec: &ParamSpec, operation: &'static str) -> Error {
        Error::ParamOperation {
            node: self.node_type().name(),
            key: spec.key.to_string(),
            operation,
            kind: spec.ty.name(),
        }
    }

    /// Stores `value` and returns the value it replaces.
    fn store(&self, index: usize, value: ParamValue) -> ParamValue {
        let mut inner = self.0.borrow_mut();
        let old = std::mem::replace(&mut inner.params[index], value);
        inner.reset();
        old
    }

    fn release_replaced(&self, removed: Vec<Node>) {
        let ctx = self.0.borrow().ctx;
        if let Some(ctx) = ctx {
            release_unreachable(ctx, removed);
        }
    }

    /// Accepted class, no cycle, and no conflicting context for every
    /// candidate child.
    fn check_children(&self, spec: &ParamSpec, children: &[Node]) -> Result<()> {
        let node = self.node_type().name();
        let ctx = self.0.borrow().ctx;
        for child in children {
            let child_ty = child.node_type();
            if !spec.accepts(child_ty) {
                return Err(Error::InvalidNodeType {
                    node,
                    key: spec.key.to_string(),
                    child: child_ty.name(),
                });
            }
            if child.ptr_eq(self) || child.reaches(self) {
                return Err(Error::Cycle {
                    node,
                    key: spec.key.to_string(),
                });
            }
            if let Some(ctx) = ctx {
                child.check_attachable(ctx)?;
            }
        }
        Ok(())
    }

    fn attach_children(&self, children: &[Node]) {
        let ctx = self.0.borrow().ctx;
        if let Some(ctx) = ctx {
            for child in children {
                child.attach(ctx);
            }
        }
    }

    /// Direct children in parameter order.
    pub(crate) fn children(&self) -> Vec<Node> {
        self.0
            .borrow()
            .params
            .iter()
            .flat_map(ParamValue::nodes)
            .collect()
    }

    /// Whether `target` is reachable from this node.
    fn reaches(&self, target: &Node) -> bool {
        let mut visited = HashSet::new();
        let mut stack = self.children();
        while let Some(node) = stack.pop() {
            if node.ptr_eq(target) {
                return true;
            }
            if visited.insert(node.id()) {
                stack.extend(node.children());
            }
        }
        false
    }

    /// Every node of the graph, each once, in depth-first pre-order.
    pub(crate) fn walk(&self) -> Vec<Node> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }
            let mut children = node.children();
            children.reverse();
            stack.extend(children);
            out.push(node);
        }
        out
    }

    pub(crate) fn check_attachable(&self, ctx: u64) -> Result<()> {
        for node in self.walk() {
            let inner = node.0.borrow();
            if matches!(inner.ctx, Some(other) if other != ctx) {
                return Err(Error::AlreadyAttached(inner.ty.name()));
            }
        }
        Ok(())
    }

    pub(crate) fn attach(&self, ctx: u64) {
        for node in self.walk() {
            node.0.borrow_mut().ctx = Some(ctx);
        }
    }

    /// Attaches the graph to context `ctx` as its scene.
    pub(crate) fn attach_scene(&self, ctx: u64) {
        SCENES.with(|scenes| scenes.borrow_mut().insert(ctx, Rc::downgrade(&self.0)));
        self.attach(ctx);
    }

    /// Detaches the scene of context `ctx`.
    pub(crate) fn detach_scene(&self, ctx: u64) {
        SCENES.with(|scenes| scenes.borrow_mut().remove(&ctx));
        self.detach();
    }

    /// Releases the runtime state of the whole graph.
    pub(crate) fn detach(&self) {
        for node in self.walk() {
            let mut inner = node.0.borrow_mut();
            inner.reset();
            inner.ctx = None;
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.0.borrow().state == State::Ready
    }

    pub(crate) fn init(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        let ty = self.node_type();
        {
            let inner = self.0.borrow();
            for (spec, value) in ty.all_params().zip(&inner.params) {
                if spec.is_constructor() && value.is_unset() {
                    return Err(Error::MissingConstructor {
                        node: ty.name(),
                        key: spec.key,
                    });
                }
            }
        }
        log::trace!("init {}", self.label());

        let runtime = match ty {
            NodeType::AnimKeyFrameScalar
            | NodeType::AnimKeyFrameVec2
            | NodeType::AnimKeyFrameVec3
            | NodeType::AnimKeyFrameVec4 => animate::init_keyframe(self)?,
            NodeType::AnimationScalar
            | NodeType::AnimationVec2
            | NodeType::AnimationVec3
            | NodeType::AnimationVec4
            | NodeType::UniformScalar
            | NodeType::UniformVec2
            | NodeType::UniformVec3
            | NodeType::UniformVec4
            | NodeType::UniformInt
            | NodeType::UniformMat4 => animate::init_animated(self)?,
            NodeType::Identity
            | NodeType::Rotate
            | NodeType::Translate
            | NodeType::Scale
            | NodeType::Camera => transform::init(self)?,
            NodeType::BufferFloat
            | NodeType::BufferVec2
            | NodeType::BufferVec3
            | NodeType::BufferVec4 => shape::init_buffer(self)?,
            NodeType::Quad
            | NodeType::Triangle
            | NodeType::Box
            | NodeType::ShapePrimitive
            | NodeType::Shape
            | NodeType::Shape2 => shape::init(self)?,
            NodeType::Shader | NodeType::ComputeShader => media::init_program(self)?,
            NodeType::Texture => media::init_texture(self)?,
            NodeType::Media => media::init_media(self)?,
            NodeType::Group | NodeType::TexturedShape | NodeType::Compute | NodeType::Rtt => {
                scene::init(self)?
            }
            NodeType::GlState
            | NodeType::GlBlendState
            | NodeType::GlColorState
            | NodeType::GlStencilState => states::init(self)?,
        };

        let mut inner = self.0.borrow_mut();
        inner.runtime = runtime;
        inner.state = State::Ready;
        inner.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        inner.last_update = None;
        inner.cursors = [0; 3];
        inner.keyframes.clear();
        Ok(())
    }

    /// Brings the node to time `t`. A node shared by several parents is
    /// evaluated once per `t`.
    pub(crate) fn update(&self, t: f64) -> Result<()> {
        self.init()?;
        let epoch = EDIT_EPOCH.load(Ordering::Relaxed);
        if self.0.borrow().last_update == Some((t, epoch)) {
            return Ok(());
        }
        match self.node_type() {
            NodeType::AnimationScalar
            | NodeType::AnimationVec2
            | NodeType::AnimationVec3
            | NodeType::AnimationVec4
            | NodeType::UniformScalar
            | NodeType::UniformVec2
            | NodeType::UniformVec3
            | NodeType::UniformVec4
            | NodeType::UniformMat4 => animate::update(self, t)?,
            NodeType::Identity
            | NodeType::Rotate
            | NodeType::Translate
            | NodeType::Scale
            | NodeType::Camera => transform::update(self, t)?,
            NodeType::ShapePrimitive | NodeType::Shape | NodeType::Shape2 => {
                shape::update(self, t)?
            }
            NodeType::Texture | NodeType::Media => media::update(self, t)?,
            NodeType::Group | NodeType::TexturedShape | NodeType::Compute | NodeType::Rtt => {
                scene::update(self, t)?
            }
            _ => (),
        }
        self.0.borrow_mut().last_update = Some((t, epoch));
        Ok(())
    }

    pub(crate) fn draw(&self, state: &mut DrawState) -> Result<()> {
        match self.node_type() {
            NodeType::Identity
            | NodeType::Rotate
            | NodeType::Translate
            | NodeType::Scale
            | NodeType::Camera => transform::draw(self, state),
            NodeType::Group | NodeType::TexturedShape | NodeType::Compute | NodeType::Rtt => {
                scene::draw(self, state)
            }
            ty => {
                log::debug!("{ty} nodes do not draw anything");
                Ok(())
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => write!(f, "Node({}#{})", inner.ty.name(), inner.id),
            Err(_) => f.write_str("Node(<borrowed>)"),
        }
    }
}
