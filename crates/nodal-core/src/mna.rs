//! Modified Nodal Analysis (MNA) matrix structures.

use nalgebra::{DMatrix, DVector};

use crate::node::NodeId;

/// MNA system: A·x = z.
///
/// A is the conductance/coefficient matrix of size (N+M)², z the right-hand
/// side, where N is the node count (excluding ground) and M the number of
/// branch unknowns (voltage sources, inductors). Every mutation since the
/// last [`clear`](MnaSystem::clear) is additive, so elements may stamp in
/// any order.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    matrix: DMatrix<f64>,
    rhs: DVector<f64>,
    num_nodes: usize,
    num_branches: usize,
}

impl MnaSystem {
    /// Create a new MNA system for `num_nodes` node unknowns and
    /// `num_branches` branch unknowns.
    pub fn new(num_nodes: usize, num_branches: usize) -> Self {
        let size = num_nodes + num_branches;
        Self {
            matrix: DMatrix::zeros(size, size),
            rhs: DVector::zeros(size),
            num_nodes,
            num_branches,
        }
    }

    /// Resize the system, zeroing all entries.
    pub fn resize(&mut self, num_nodes: usize, num_branches: usize) {
        let size = num_nodes + num_branches;
        self.matrix = DMatrix::zeros(size, size);
        self.rhs = DVector::zeros(size);
        self.num_nodes = num_nodes;
        self.num_branches = num_branches;
    }

    /// Total size of the system (nodes + branches).
    pub fn size(&self) -> usize {
        self.num_nodes + self.num_branches
    }

    /// Number of node unknowns (excluding ground).
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of branch unknowns.
    pub fn num_branches(&self) -> usize {
        self.num_branches
    }

    /// Zero the matrix and RHS. Called once at the start of every iteration.
    pub fn clear(&mut self) {
        self.matrix.fill(0.0);
        self.rhs.fill(0.0);
    }

    /// Add `value` to A(r, c).
    pub fn add_a(&mut self, r: usize, c: usize, value: f64) {
        self.matrix[(r, c)] += value;
    }

    /// Add `value` to z(r).
    pub fn add_z(&mut self, r: usize, value: f64) {
        self.rhs[r] += value;
    }

    /// Read A(r, c).
    pub fn get_a(&self, r: usize, c: usize) -> f64 {
        self.matrix[(r, c)]
    }

    /// Read z(r).
    pub fn get_z(&self, r: usize) -> f64 {
        self.rhs[r]
    }

    /// Add `value` to A(r, c) addressed by node; no-op if either is ground.
    pub fn add_a_node(&mut self, r: NodeId, c: NodeId, value: f64) {
        if let (Some(i), Some(j)) = (r.index(), c.index()) {
            self.matrix[(i, j)] += value;
        }
    }

    /// Add `value` to z(r) addressed by node; no-op for ground.
    pub fn add_z_node(&mut self, r: NodeId, value: f64) {
        if let Some(i) = r.index() {
            self.rhs[i] += value;
        }
    }

    /// Stamp a conductance `g` between nodes `a` and `b`:
    /// `+g` on (a,a) and (b,b), `-g` on (a,b) and (b,a).
    /// Ground rows and columns are dropped.
    pub fn stamp_conductance(&mut self, a: NodeId, b: NodeId, g: f64) {
        if let Some(i) = a.index() {
            self.matrix[(i, i)] += g;
        }
        if let Some(j) = b.index() {
            self.matrix[(j, j)] += g;
        }
        if let (Some(i), Some(j)) = (a.index(), b.index()) {
            self.matrix[(i, j)] -= g;
            self.matrix[(j, i)] -= g;
        }
    }

    /// Stamp a current source of value `i` flowing from `a` to `b`.
    ///
    /// KCL convention: current leaving a node is positive, so this adds
    /// `-i` to z(a) and `+i` to z(b).
    pub fn stamp_current_source(&mut self, a: NodeId, b: NodeId, i: f64) {
        if let Some(r) = a.index() {
            self.rhs[r] -= i;
        }
        if let Some(r) = b.index() {
            self.rhs[r] += i;
        }
    }

    /// Stamp the incidence rows/columns of a voltage source between `pos`
    /// and `neg` with branch row `k`, and add `voltage` to z(k).
    pub fn stamp_voltage_source(&mut self, pos: NodeId, neg: NodeId, k: usize, voltage: f64) {
        if let Some(i) = pos.index() {
            self.matrix[(i, k)] += 1.0;
            self.matrix[(k, i)] += 1.0;
        }
        if let Some(j) = neg.index() {
            self.matrix[(j, k)] -= 1.0;
            self.matrix[(k, j)] -= 1.0;
        }
        self.rhs[k] += voltage;
    }

    /// Reference to the coefficient matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Reference to the RHS vector.
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Residual A·x − z for a candidate solution.
    pub fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.matrix * x - &self.rhs
    }

    /// Euclidean norm of the residual A·x − z.
    pub fn residual_norm(&self, x: &DVector<f64>) -> f64 {
        self.residual(x).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn test_new_system() {
        let sys = MnaSystem::new(3, 1);
        assert_eq!(sys.size(), 4);
        assert_eq!(sys.num_nodes(), 3);
        assert_eq!(sys.num_branches(), 1);
    }

    #[test]
    fn test_stamp_conductance() {
        let mut sys = MnaSystem::new(2, 0);

        // 1 ohm resistor between nodes 0 and 1
        sys.stamp_conductance(NodeId::new(0), NodeId::new(1), 1.0);

        assert_eq!(sys.get_a(0, 0), 1.0);
        assert_eq!(sys.get_a(1, 1), 1.0);
        assert_eq!(sys.get_a(0, 1), -1.0);
        assert_eq!(sys.get_a(1, 0), -1.0);
    }

    #[test]
    fn test_stamp_conductance_to_ground() {
        let mut sys = MnaSystem::new(2, 0);

        sys.stamp_conductance(NodeId::new(0), NodeId::GROUND, 1.0);

        assert_eq!(sys.get_a(0, 0), 1.0);
        assert_eq!(sys.get_a(1, 1), 0.0);
    }

    #[test]
    fn test_stamps_are_additive() {
        let mut sys = MnaSystem::new(1, 0);

        sys.stamp_conductance(NodeId::new(0), NodeId::GROUND, 0.5);
        sys.stamp_conductance(NodeId::new(0), NodeId::GROUND, 0.5);
        assert_eq!(sys.get_a(0, 0), 1.0);

        sys.clear();
        assert_eq!(sys.get_a(0, 0), 0.0);
    }

    #[test]
    fn test_stamp_current_source_sign() {
        let mut sys = MnaSystem::new(2, 0);

        // 1 mA from node 0 to node 1: leaves 0, enters 1.
        sys.stamp_current_source(NodeId::new(0), NodeId::new(1), 1e-3);

        assert_eq!(sys.get_z(0), -1e-3);
        assert_eq!(sys.get_z(1), 1e-3);
    }

    #[test]
    fn test_stamp_voltage_source() {
        let mut sys = MnaSystem::new(2, 1);

        // 5 V source between node 0 (+) and ground (-), branch row 2.
        sys.stamp_voltage_source(NodeId::new(0), NodeId::GROUND, 2, 5.0);

        assert_eq!(sys.get_a(0, 2), 1.0);
        assert_eq!(sys.get_a(2, 0), 1.0);
        assert_eq!(sys.get_z(2), 5.0);
    }

    #[test]
    fn test_ground_stamp_is_noop() {
        let mut sys = MnaSystem::new(1, 0);
        sys.add_a_node(NodeId::GROUND, NodeId::new(0), 7.0);
        sys.add_z_node(NodeId::GROUND, 7.0);
        assert_eq!(sys.get_a(0, 0), 0.0);
        assert_eq!(sys.get_z(0), 0.0);
    }

    #[test]
    fn test_residual_norm() {
        let mut sys = MnaSystem::new(2, 0);
        sys.stamp_conductance(NodeId::new(0), NodeId::GROUND, 1.0);
        sys.stamp_conductance(NodeId::new(1), NodeId::GROUND, 1.0);
        sys.stamp_current_source(NodeId::GROUND, NodeId::new(0), 2.0);

        // Exact solution: x = [2, 0]
        let exact = DVector::from_vec(vec![2.0, 0.0]);
        assert!(sys.residual_norm(&exact) < 1e-12);

        let off = DVector::from_vec(vec![3.0, 0.0]);
        assert!((sys.residual_norm(&off) - 1.0).abs() < 1e-12);
    }
}
