//! # wdf
//!
//! A wave digital filter engine: circuits are built as a tree of adapters and leaves (see
//! [`node`]) closed by a [`root::Root`], and run one sample at a time through [`tree::Tree`].
//!
//! Topology is represented as a tagged-variant arena ([`node::TreeNode`] indexed by
//! [`node::NodeId`]) rather than a graph of owning pointers, so the tree can be built, adapted,
//! and run without any interior mutability or reference counting. The one place user code can
//! extend the topology beyond what this crate models directly is [`node::RTypeAdapter`] (and
//! its root-closing counterpart, [`root::RootMatrixSource`]).
#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod models;
pub mod node;
pub mod params;
pub mod root;
pub mod tree;
pub mod wave;

pub use builder::TreeBuilder;
pub use error::WdfError;
pub use node::{NodeId, RTypeAdapter};
pub use root::{NlMatrixSource, Root, RootMatrixSource};
pub use tree::Tree;
pub use wave::Port;
