//! Freestanding constructors for assembling a tree, named after the teacher's `dsl` module
//! (`resistor()`, `capacitor()`, `series()`, `parallel()`, ...) but returning arena handles
//! into a [`TreeBuilder`] instead of owned structs.
use wdf_core::Matrix;

use crate::error::WdfError;
use crate::node::{NodeField, NodeId, NodeKind, RTypeAdapter, TreeNode};
use crate::params::{ParamBinding, ParamTable};
use crate::root::{Root, RootField};
use crate::tree::Tree;

/// Accumulates a node arena and parameter table before being closed into a [`Tree`] by
/// [`TreeBuilder::build`].
pub struct TreeBuilder {
    nodes: Vec<TreeNode>,
    params: ParamTable,
    fs: f64,
}

impl TreeBuilder {
    /// Start building a tree to run at the given sample rate.
    pub fn new(fs: f64) -> Self {
        Self {
            nodes: Vec::new(),
            params: ParamTable::new(),
            fs,
        }
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// A pure resistance.
    pub fn resistor(&mut self, r: f64) -> NodeId {
        self.push(TreeNode::leaf(NodeKind::Resistor { r }))
    }

    /// A capacitor, discretized with the trapezoidal rule at the builder's sample rate.
    pub fn capacitor(&mut self, c: f64) -> NodeId {
        self.push(TreeNode::leaf(NodeKind::Capacitor {
            c,
            fs: self.fs,
            prev_a: 0.0,
        }))
    }

    /// An inductor, discretized with the trapezoidal rule at the builder's sample rate.
    pub fn inductor(&mut self, l: f64) -> NodeId {
        self.push(TreeNode::leaf(NodeKind::Inductor {
            l,
            fs: self.fs,
            prev_a: 0.0,
        }))
    }

    /// An ideal voltage source in series with a resistance.
    pub fn resistive_voltage_source(&mut self, vs: f64, rser: f64) -> NodeId {
        self.push(TreeNode::leaf(NodeKind::ResistiveVoltageSource { vs, rser }))
    }

    /// An ideal current source in parallel with a resistance.
    pub fn resistive_current_source(&mut self, is: f64, rpar: f64) -> NodeId {
        self.push(TreeNode::leaf(NodeKind::ResistiveCurrentSource { is, rpar }))
    }

    /// A two-port series adapter over `left` and `right`.
    pub fn series(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.push(TreeNode::with_children(
            NodeKind::Series { yl: 0.5, yr: 0.5 },
            vec![left, right],
        ))
    }

    /// A two-port parallel adapter over `left` and `right`.
    pub fn parallel(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.push(TreeNode::with_children(
            NodeKind::Parallel { dl: 0.5, dr: 0.5 },
            vec![left, right],
        ))
    }

    /// A single-port sign inverter over `child`.
    pub fn inverter(&mut self, child: NodeId) -> NodeId {
        self.push(TreeNode::with_children(NodeKind::Inverter, vec![child]))
    }

    /// A user-supplied n-port adapter over `children`.
    pub fn r_type(&mut self, children: Vec<NodeId>, adapter: Box<dyn RTypeAdapter>) -> NodeId {
        let n = children.len() + 1;
        self.push(TreeNode::with_children(
            NodeKind::RType {
                adapter,
                s: Matrix::zeros(n, n),
            },
            children,
        ))
    }

    /// Register a host-facing parameter with no binding: the circuit author reads it back out
    /// of [`ParamTable::get`] on their own (e.g. to feed a `DeviceModel`'s constructor on the
    /// next `adapt`). See [`ParamTable::register`].
    pub fn register_param(
        &mut self,
        name: impl Into<String>,
        value: f64,
        range: (f64, f64),
        structural: bool,
    ) -> Result<(), WdfError> {
        self.params.register(name, value, range, structural, None)
    }

    /// Register a host-facing parameter bound to one scalar field of arena node `node`. A
    /// subsequent `Tree::set_param` writes straight into that field, in addition to whatever
    /// `structural` dictates about re-adaptation.
    pub fn bind_node_param(
        &mut self,
        name: impl Into<String>,
        node: NodeId,
        field: NodeField,
        value: f64,
        range: (f64, f64),
        structural: bool,
    ) -> Result<(), WdfError> {
        self.params.register(
            name,
            value,
            range,
            structural,
            Some(ParamBinding::Node(node, field)),
        )
    }

    /// Register a host-facing parameter bound to one scalar field of the tree's root. Only
    /// applies when the tree's root is a [`crate::root::SimpleRoot`].
    pub fn bind_root_param(
        &mut self,
        name: impl Into<String>,
        field: RootField,
        value: f64,
        range: (f64, f64),
        structural: bool,
    ) -> Result<(), WdfError> {
        self.params
            .register(name, value, range, structural, Some(ParamBinding::Root(field)))
    }

    /// Close the arena into a runnable [`Tree`], with `subtree_entries` (in the order the root
    /// expects), the `root` itself, and optional designated input/output nodes.
    pub fn build(
        self,
        subtree_entries: Vec<NodeId>,
        root: Root,
        input_node: Option<NodeId>,
        output_node: Option<NodeId>,
    ) -> Tree {
        Tree::new(
            self.nodes,
            subtree_entries,
            root,
            self.fs,
            self.params,
            input_node,
            output_node,
        )
    }
}
