//! Named, host-facing circuit parameters.
//!
//! Grounded in the teacher's parameter registry
//! (`valib-core/src/dsp/parameter.rs`), trimmed to what a single-threaded, host-serialized
//! façade needs: no atomic cross-thread proxy, no smoothing, since [`crate::tree::Tree`] is not
//! shared across threads (see SYSTEM OVERVIEW / CONCURRENCY & RESOURCE MODEL). A parameter is
//! marked `structural` when changing it invalidates cached scattering coefficients (e.g. a
//! resistance or capacitance) as opposed to being read directly by a device model on every
//! sample (e.g. a drive amount baked into a `DeviceModel`'s fields would not go through this
//! table at all).
//!
//! A parameter can also carry a [`ParamBinding`], which is what actually lets `set_param` reach
//! into the tree's arena or root: without one, a parameter is purely a host-facing value the
//! circuit author reads back out of [`ParamTable::get`] on their own (e.g. to feed a
//! `DeviceModel`'s constructor on the next `adapt`).
use std::collections::BTreeMap;

use crate::error::WdfError;
use crate::node::{NodeField, NodeId};
use crate::root::RootField;

/// Where a parameter's value is written once it passes through [`ParamTable::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamBinding {
    /// Writes to one field of one arena node.
    Node(NodeId, NodeField),
    /// Writes to one field of the tree's root (only applies to a [`crate::root::SimpleRoot`]).
    Root(RootField),
}

/// One named, bounded parameter.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    /// Stable name used to look the parameter up.
    pub name: String,
    /// Current value.
    pub value: f64,
    /// Inclusive valid range.
    pub range: (f64, f64),
    /// Whether setting this parameter requires `Tree::adapt` to run again before the next
    /// `cycle`.
    pub structural: bool,
    /// Where this parameter's value is applied, if anywhere.
    pub binding: Option<ParamBinding>,
}

/// Registry of a tree's host-facing parameters, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    params: BTreeMap<String, ParamDescriptor>,
}

impl ParamTable {
    /// Construct an empty parameter table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new parameter, optionally bound to a node or root field. Returns a
    /// [`WdfError::Configuration`] if the name is already registered or the initial value is
    /// outside `range`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        value: f64,
        range: (f64, f64),
        structural: bool,
        binding: Option<ParamBinding>,
    ) -> Result<(), WdfError> {
        let name = name.into();
        if self.params.contains_key(&name) {
            return Err(WdfError::configuration(format!(
                "parameter '{name}' already registered"
            )));
        }
        if value < range.0 || value > range.1 {
            return Err(WdfError::configuration(format!(
                "parameter '{name}' initial value {value} outside range {range:?}"
            )));
        }
        self.params.insert(
            name.clone(),
            ParamDescriptor {
                name,
                value,
                range,
                structural,
                binding,
            },
        );
        Ok(())
    }

    /// Set a parameter's value, clamped to its registered range. Returns whether the parameter
    /// is structural and where it is bound, so the caller (the [`crate::tree::Tree`] façade)
    /// knows whether to re-adapt and what to actually mutate.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(bool, Option<ParamBinding>), WdfError> {
        let descriptor = self
            .params
            .get_mut(name)
            .ok_or_else(|| WdfError::configuration(format!("unknown parameter '{name}'")))?;
        descriptor.value = value.clamp(descriptor.range.0, descriptor.range.1);
        Ok((descriptor.structural, descriptor.binding))
    }

    /// Read a parameter's current value.
    pub fn get(&self, name: &str) -> Result<f64, WdfError> {
        self.params
            .get(name)
            .map(|d| d.value)
            .ok_or_else(|| WdfError::configuration(format!("unknown parameter '{name}'")))
    }

    /// Iterate over all registered parameters.
    pub fn iter(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.values()
    }
}
