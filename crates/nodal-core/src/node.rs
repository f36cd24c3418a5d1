//! Node identifiers for circuit graphs.

use std::fmt;

/// Unique identifier for a node in the circuit.
///
/// Live nodes are numbered from 0 in creation order and map directly onto
/// rows of the MNA matrix. The reference node is the sentinel
/// [`NodeId::GROUND`]; it is fixed at 0 V and never appears in the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) i32);

impl NodeId {
    /// The ground (reference) node sentinel.
    pub const GROUND: NodeId = NodeId(-1);

    /// Create a NodeId from a raw index.
    pub fn new(id: i32) -> Self {
        NodeId(id)
    }

    /// Get the raw index value.
    pub fn as_i32(self) -> i32 {
        self.0
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 < 0
    }

    /// The MNA matrix row/column for this node, or `None` for ground.
    pub fn index(self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some(self.0 as usize)
        }
    }

    /// Voltage of this node in an unknown vector (ground reads 0 V).
    pub fn voltage(self, x: &nalgebra::DVector<f64>) -> f64 {
        match self.index() {
            Some(i) => x[i],
            None => 0.0,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A node in the circuit graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    /// Optional display name (used by diagnostics).
    name: Option<String>,
}

impl Node {
    /// Create a new anonymous node.
    pub fn new(id: NodeId) -> Self {
        Self { id, name: None }
    }

    /// Create a new named node.
    pub fn with_name(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
