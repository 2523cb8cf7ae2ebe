//! The tree façade: owns the node arena and the root, and drives adaptation and per-sample
//! scattering. Grounded in the sequencing of the teacher's
//! `WdfModule::process_sample` (`set_port_resistance` once, then `incident`/`reflected` every
//! sample), generalized from a single root+leaf pair to an arbitrary arena of subtrees closed
//! by one [`Root`].
use wdf_core::Vector;

use crate::error::WdfError;
use crate::node::{down_waves, up_wave, NodeId, NodeKind, TreeNode};
use crate::params::{ParamBinding, ParamTable};
use crate::root::Root;

fn pull_wave_up(nodes: &mut [TreeNode], id: NodeId) -> f64 {
    let children = nodes[id.index()].children.clone();
    let mut down_a = vec![0.0; children.len()];
    for (i, &child) in children.iter().enumerate() {
        down_a[i] = pull_wave_up(nodes, child);
    }
    for (i, value) in down_a.iter().enumerate() {
        nodes[id.index()].down[i].a = *value;
    }
    let b = up_wave(&nodes[id.index()].kind, &down_a);
    nodes[id.index()].up.b = b;
    b
}

fn push_wave_down(nodes: &mut [TreeNode], id: NodeId) {
    let d = nodes[id.index()].up.a;
    let down_a: Vec<f64> = nodes[id.index()].down.iter().map(|p| p.a).collect();
    let down_b = down_waves(&mut nodes[id.index()].kind, &down_a, d);
    let children = nodes[id.index()].children.clone();
    for (i, &child) in children.iter().enumerate() {
        nodes[id.index()].down[i].b = down_b[i];
        nodes[child.index()].up.a = down_b[i];
        push_wave_down(nodes, child);
    }
}

/// Bottom-up pass: compute every node's up resistance from its children's, validating
/// component values along the way. Returns this node's own up resistance.
fn adapt_up_resistances(nodes: &mut [TreeNode], id: NodeId, fs: f64) -> Result<f64, WdfError> {
    let children = nodes[id.index()].children.clone();
    let mut child_res = Vec::with_capacity(children.len());
    for &child in &children {
        child_res.push(adapt_up_resistances(nodes, child, fs)?);
    }
    for (i, &r) in child_res.iter().enumerate() {
        if !(r > 0.0) || !r.is_finite() {
            return Err(WdfError::configuration(format!(
                "child {i} of node produced a non-positive or non-finite port resistance ({r})"
            )));
        }
        nodes[id.index()].down[i].set_rp(r);
    }
    let rup = match &mut nodes[id.index()].kind {
        NodeKind::Resistor { r } => {
            if *r <= 0.0 {
                return Err(WdfError::configuration(format!("resistor value must be positive, got {r}")));
            }
            *r
        }
        NodeKind::Capacitor { c, fs: node_fs, .. } => {
            if *c <= 0.0 {
                return Err(WdfError::configuration(format!("capacitance must be positive, got {c}")));
            }
            *node_fs = fs;
            1.0 / (2.0 * fs * *c)
        }
        NodeKind::Inductor { l, fs: node_fs, .. } => {
            if *l <= 0.0 {
                return Err(WdfError::configuration(format!("inductance must be positive, got {l}")));
            }
            *node_fs = fs;
            2.0 * fs * *l
        }
        NodeKind::ResistiveVoltageSource { rser, .. } => {
            if *rser <= 0.0 {
                return Err(WdfError::configuration(format!("series resistance must be positive, got {rser}")));
            }
            *rser
        }
        NodeKind::ResistiveCurrentSource { rpar, .. } => {
            if *rpar <= 0.0 {
                return Err(WdfError::configuration(format!("parallel resistance must be positive, got {rpar}")));
            }
            *rpar
        }
        NodeKind::Series { .. } => child_res[0] + child_res[1],
        NodeKind::Parallel { .. } => {
            let (gl, gr) = (1.0 / child_res[0], 1.0 / child_res[1]);
            1.0 / (gl + gr)
        }
        NodeKind::Inverter => child_res[0],
        NodeKind::RType { adapter, .. } => adapter.up_resistance(&child_res)?,
    };
    if !(rup > 0.0) || !rup.is_finite() {
        return Err(WdfError::configuration(format!(
            "node produced a non-positive or non-finite up resistance ({rup})"
        )));
    }
    nodes[id.index()].up.set_rp(rup);
    Ok(rup)
}

/// Top-down pass: compute every adapter's scattering coefficients from resistances already
/// populated by [`adapt_up_resistances`].
fn adapt_scatter_coeffs(nodes: &mut [TreeNode], id: NodeId) -> Result<(), WdfError> {
    let up_rp = nodes[id.index()].up.rp;
    let up_gp = nodes[id.index()].up.gp;
    let down_rp: Vec<f64> = nodes[id.index()].down.iter().map(|p| p.rp).collect();
    let down_gp: Vec<f64> = nodes[id.index()].down.iter().map(|p| p.gp).collect();
    match &mut nodes[id.index()].kind {
        NodeKind::Series { yl, yr } => {
            *yl = 2.0 * down_rp[0] / (up_rp + down_rp[0] + down_rp[1]);
            *yr = 1.0 - *yl;
        }
        NodeKind::Parallel { dl, dr } => {
            *dl = 2.0 * down_gp[0] / (up_gp + down_gp[0] + down_gp[1]);
            *dr = 1.0 - *dl;
        }
        NodeKind::RType { adapter, s } => {
            let matrix = adapter.scatter_matrix(&down_rp, up_rp)?;
            let expected = down_rp.len() + 1;
            if matrix.nrows() != expected || matrix.ncols() != expected {
                return Err(WdfError::matrix(format!(
                    "R-type adapter returned a {}x{} matrix, expected {expected}x{expected}",
                    matrix.nrows(),
                    matrix.ncols()
                )));
            }
            *s = matrix;
        }
        _ => {}
    }
    let children = nodes[id.index()].children.clone();
    for child in children {
        adapt_scatter_coeffs(nodes, child)?;
    }
    Ok(())
}

/// A fully assembled circuit: a node arena closed by one [`Root`].
///
/// Constructed by [`crate::builder::TreeBuilder::build`]. Call [`Tree::adapt`] once after
/// construction and again any time a `structural` parameter changes (the `set_param` family
/// does this automatically), then call [`Tree::cycle`] once per sample.
pub struct Tree {
    nodes: Vec<TreeNode>,
    subtree_entries: Vec<NodeId>,
    root: Root,
    fs: f64,
    params: ParamTable,
    input_node: Option<NodeId>,
    output_node: Option<NodeId>,
    adapted: bool,
}

impl Tree {
    pub(crate) fn new(
        nodes: Vec<TreeNode>,
        subtree_entries: Vec<NodeId>,
        root: Root,
        fs: f64,
        params: ParamTable,
        input_node: Option<NodeId>,
        output_node: Option<NodeId>,
    ) -> Self {
        Self {
            nodes,
            subtree_entries,
            root,
            fs,
            params,
            input_node,
            output_node,
            adapted: false,
        }
    }

    /// Recompute port resistances and scattering coefficients across the whole tree. Must be
    /// called once before the first [`Tree::cycle`], and again whenever a structural parameter
    /// or the sample rate changes.
    pub fn adapt(&mut self) -> Result<(), WdfError> {
        if self.root.arity() != self.subtree_entries.len() {
            return Err(WdfError::configuration(format!(
                "root expects {} subtree(s) but tree has {}",
                self.root.arity(),
                self.subtree_entries.len()
            )));
        }
        let mut subtree_resistances = Vec::with_capacity(self.subtree_entries.len());
        let entries = self.subtree_entries.clone();
        for &id in &entries {
            subtree_resistances.push(adapt_up_resistances(&mut self.nodes, id, self.fs)?);
        }
        for &id in &entries {
            adapt_scatter_coeffs(&mut self.nodes, id)?;
        }
        match &mut self.root {
            Root::Simple(root) => root.validate_and_sync(self.fs, subtree_resistances[0])?,
            Root::RType { source, s } => {
                let matrix = source.scatter_matrix(&subtree_resistances)?;
                let expected = subtree_resistances.len();
                if matrix.nrows() != expected || matrix.ncols() != expected {
                    return Err(WdfError::matrix(format!(
                        "root R-type source returned a {}x{} matrix, expected {expected}x{expected}",
                        matrix.nrows(),
                        matrix.ncols()
                    )));
                }
                *s = matrix;
            }
            Root::NonLinear(nl) => nl.re_adapt(&subtree_resistances)?,
        }
        self.adapted = true;
        Ok(())
    }

    /// Run one sample through the tree: pull waves up from every leaf, scatter at the root,
    /// then push waves back down.
    pub fn cycle(&mut self) -> Result<(), WdfError> {
        if !self.adapted {
            return Err(WdfError::configuration("tree must be adapted before the first cycle"));
        }
        let ascending: Vec<f64> = self
            .subtree_entries
            .iter()
            .map(|&id| pull_wave_up(&mut self.nodes, id))
            .collect();
        let descending = self.scatter_root(&ascending)?;
        for (i, &id) in self.subtree_entries.iter().enumerate() {
            self.nodes[id.index()].up.a = descending[i];
            push_wave_down(&mut self.nodes, id);
        }
        Ok(())
    }

    fn scatter_root(&mut self, ascending: &[f64]) -> Result<Vec<f64>, WdfError> {
        match &mut self.root {
            Root::Simple(root) => {
                let rp = self.nodes[self.subtree_entries[0].index()].up.rp;
                Ok(vec![root.reflect(ascending[0], rp)])
            }
            Root::RType { s, .. } => {
                let a = Vector::from_row_slice(ascending);
                let b = &*s * a;
                Ok(b.iter().copied().collect())
            }
            Root::NonLinear(nl) => {
                let a = Vector::from_row_slice(ascending);
                let b = nl.scatter(&a);
                Ok(b.iter().copied().collect())
            }
        }
    }

    /// Drive the designated input leaf (a resistive voltage or current source) with a new
    /// sample value.
    pub fn set_input(&mut self, value: f64) -> Result<(), WdfError> {
        let node = self
            .input_node
            .ok_or_else(|| WdfError::configuration("tree has no designated input leaf"))?;
        match &mut self.nodes[node.index()].kind {
            NodeKind::ResistiveVoltageSource { vs, .. } => {
                *vs = value;
                Ok(())
            }
            NodeKind::ResistiveCurrentSource { is, .. } => {
                *is = value;
                Ok(())
            }
            _ => Err(WdfError::configuration("input leaf is not a source")),
        }
    }

    /// Read the voltage at the designated output probe port.
    pub fn get_output(&self) -> Result<f64, WdfError> {
        let node = self
            .output_node
            .ok_or_else(|| WdfError::configuration("tree has no designated output probe"))?;
        Ok(self.nodes[node.index()].up.voltage())
    }

    /// Read the voltage at an arbitrary node's up port, for probes beyond the designated
    /// output.
    pub fn port_voltage(&self, node: NodeId) -> f64 {
        self.nodes[node.index()].up.voltage()
    }

    /// Read the current through an arbitrary node's up port.
    pub fn port_current(&self, node: NodeId) -> f64 {
        self.nodes[node.index()].up.current()
    }

    /// Set a registered parameter, applying its binding (if any) to the underlying node or
    /// root and re-adapting automatically if it is structural.
    pub fn set_param(&mut self, name: &str, value: f64) -> Result<(), WdfError> {
        let (structural, binding) = self.params.set(name, value)?;
        let applied = self.params.get(name)?;
        match binding {
            Some(ParamBinding::Node(id, field)) => {
                self.nodes[id.index()].kind.set_field(field, applied)?;
            }
            Some(ParamBinding::Root(field)) => {
                self.root.set_field(field, applied)?;
            }
            None => {}
        }
        if structural {
            self.adapted = false;
        }
        Ok(())
    }

    /// The tree's registered parameters.
    pub fn params(&self) -> &ParamTable {
        &self.params
    }

    /// Current sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.fs
    }

    /// Change the sample rate. Always structural: callers must re-adapt before the next
    /// `cycle`.
    pub fn set_sample_rate(&mut self, fs: f64) -> Result<(), WdfError> {
        if !(fs > 0.0) || !fs.is_finite() {
            return Err(WdfError::configuration(format!("sample rate must be positive, got {fs}")));
        }
        self.fs = fs;
        self.adapted = false;
        Ok(())
    }

    /// Whether the tree is ready for [`Tree::cycle`] without re-adapting.
    pub fn is_adapted(&self) -> bool {
        self.adapted
    }

    /// Whether the non-linear root (if any) converged on the last `cycle`. Always `true` for
    /// trees without a non-linear root.
    pub fn last_solve_converged(&self) -> bool {
        match &self.root {
            Root::NonLinear(nl) => nl.last_converged,
            _ => true,
        }
    }

    /// Newton iterations spent on the last `cycle`'s non-linear solve. Always `0` for trees
    /// without a non-linear root.
    pub fn last_solve_iterations(&self) -> usize {
        match &self.root {
            Root::NonLinear(nl) => nl.last_iterations,
            _ => 0,
        }
    }
}
