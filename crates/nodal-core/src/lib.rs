//! Core circuit representation and MNA matrix structures for nodal.
//!
//! This crate provides the fundamental data structures for representing
//! circuits: nodes, the element capability contract, and the dense Modified
//! Nodal Analysis (MNA) system `A·x = z`.
//!
//! # Overview
//!
//! The core abstractions are:
//!
//! - [`NodeId`] - Identifies a node; ground is the sentinel [`NodeId::GROUND`]
//! - [`MnaSystem`](mna::MnaSystem) - The dense MNA equation A·x = z
//! - [`Element`] - Capability contract every element implements
//! - [`Circuit`] - Owner of nodes and elements; assembles the system
//!
//! # Modified Nodal Analysis
//!
//! The unknown vector is ordered as
//! `[V(node 0), …, V(node N-1), I(branch 0), …, I(branch M-1)]`. Ground is
//! an implicit 0 V and has no row; any stamp addressing it is a no-op.
//! Branch rows are claimed by voltage sources and inductors and assigned
//! contiguously at [`Circuit::finalize`].
//!
//! # Example: stamping by hand
//!
//! ```rust
//! use nodal_core::mna::MnaSystem;
//! use nodal_core::NodeId;
//!
//! // Voltage divider: V1 = 10 V at node 0, two 1 kΩ resistors, node 1 mid.
//! let mut mna = MnaSystem::new(2, 1);
//!
//! mna.stamp_voltage_source(NodeId::new(0), NodeId::GROUND, 2, 10.0);
//! mna.stamp_conductance(NodeId::new(0), NodeId::new(1), 1.0 / 1000.0);
//! mna.stamp_conductance(NodeId::new(1), NodeId::GROUND, 1.0 / 1000.0);
//!
//! assert_eq!(mna.size(), 3); // 2 node unknowns + 1 branch current
//! ```

pub mod circuit;
pub mod element;
pub mod error;
pub mod mna;
pub mod node;

pub use circuit::{Circuit, ElementRef};
pub use element::{Element, StampContext};
pub use error::{Error, Result};
pub use mna::MnaSystem;
pub use node::{Node, NodeId};
