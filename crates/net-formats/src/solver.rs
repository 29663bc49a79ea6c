// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Exporting a [`Query`] to the external constraint solver.
//!
//! ```text
//!   Query ──export_query──▶ SolverQuery ──Solver::solve──▶ SolverOutcome
//!                               │                             │
//!                            to_ipq()                  witness_to_nodes()
//!                               ▼                             ▼
//!                          .ipq text                HashMap<NodeId, f64>
//! ```
//!
//! Variables are numbered with the declared inputs first, then the remaining
//! query nodes in query order. Nodes that no reference path from the inputs
//! reaches cannot be derived from them: fixed ones, whatever their kind, are
//! appended to the input list as synthetic inputs. Unreached free plain nodes
//! stay free variables within their bounds and are logged at warn level.

use crate::ipq::{IpqConstraint, IpqEquation, IpqFile};
use crate::FormatError;
use network_ir::{Comparator, NodeArena, NodeId, NodeKind, Query};
use std::collections::{BTreeMap, HashMap, HashSet};

// ── Variable table ─────────────────────────────────────────────

/// Bidirectional map between nodes and solver variable indices.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
}

impl VariableTable {
    fn insert(&mut self, id: NodeId) -> usize {
        *self.index.entry(id).or_insert_with(|| {
            self.ids.push(id);
            self.ids.len() - 1
        })
    }

    pub fn var_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn node_of(&self, var: usize) -> Option<NodeId> {
        self.ids.get(var).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ── Solver query ───────────────────────────────────────────────

/// `f = max(0, b)` or `f = |b|` over solver variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiecewisePair {
    pub b: usize,
    pub f: usize,
}

/// A query in solver-native, index-addressed form.
#[derive(Debug, Clone)]
pub struct SolverQuery {
    pub num_vars: usize,
    pub lower_bounds: BTreeMap<usize, f64>,
    pub upper_bounds: BTreeMap<usize, f64>,
    pub equations: Vec<IpqEquation>,
    pub relus: Vec<PiecewisePair>,
    /// The subset of `relus` marked for external linear relaxation.
    pub relaxed_relus: Vec<PiecewisePair>,
    pub abs: Vec<PiecewisePair>,
    /// Declared inputs followed by synthetic ones.
    pub input_vars: Vec<usize>,
    /// Number of declared inputs at the front of `input_vars`.
    pub real_inputs: usize,
    pub output_vars: Vec<usize>,
    pub table: VariableTable,
}

/// Converts `query` into a [`SolverQuery`].
pub fn export_query(arena: &NodeArena, query: &Query) -> Result<SolverQuery, FormatError> {
    query.check_integrity(arena)?;

    let mut table = VariableTable::default();
    for &id in query.inputs() {
        table.insert(id);
    }
    for &id in query.nodes() {
        table.insert(id);
    }
    let var = |id: NodeId| table.index[&id];

    let synthetic = synthetic_inputs(arena, query);
    if !synthetic.is_empty() {
        tracing::warn!(
            count = synthetic.len(),
            "fixed nodes unreachable from the inputs exported as synthetic inputs"
        );
    }

    let mut lower_bounds = BTreeMap::new();
    let mut upper_bounds = BTreeMap::new();
    let mut equations = Vec::new();
    let mut relus = Vec::new();
    let mut relaxed_relus = Vec::new();
    let mut abs = Vec::new();

    for &id in &table.ids {
        let node = arena.get(id);
        let v = var(id);
        if let Some(l) = node.bounds.lower {
            lower_bounds.insert(v, l);
        }
        if let Some(u) = node.bounds.upper {
            upper_bounds.insert(v, u);
        }
        match &node.kind {
            NodeKind::Plain => {}
            NodeKind::Affine { terms, bias } => {
                let mut addends: Vec<(usize, f64)> =
                    terms.iter().map(|&(c, n)| (var(n), c)).collect();
                addends.push((v, -1.0));
                equations.push(IpqEquation {
                    comparator: Comparator::Eq,
                    scalar: -bias,
                    addends,
                });
            }
            NodeKind::Relu { input, relaxed } => {
                let pair = PiecewisePair { b: var(*input), f: v };
                if *relaxed {
                    relaxed_relus.push(pair);
                }
                relus.push(pair);
            }
            NodeKind::Abs { input } => abs.push(PiecewisePair { b: var(*input), f: v }),
        }
    }

    for eq in query.equations() {
        equations.push(IpqEquation {
            comparator: eq.comparator,
            scalar: eq.scalar,
            addends: eq.terms.iter().map(|&(c, n)| (var(n), c)).collect(),
        });
    }

    let real_inputs = query.inputs().len();
    let mut input_vars: Vec<usize> = query.inputs().iter().map(|&id| var(id)).collect();
    input_vars.extend(synthetic.into_iter().map(var));
    let output_vars = query.outputs().iter().map(|&id| var(id)).collect();

    let exported = SolverQuery {
        num_vars: table.len(),
        lower_bounds,
        upper_bounds,
        equations,
        relus,
        relaxed_relus,
        abs,
        input_vars,
        real_inputs,
        output_vars,
        table,
    };
    tracing::info!(
        variables = exported.num_vars,
        equations = exported.equations.len(),
        relus = exported.relus.len(),
        "exported solver query"
    );
    Ok(exported)
}

/// Query nodes reachable from the declared inputs along node references.
fn reachable_from_inputs(arena: &NodeArena, query: &Query) -> HashSet<NodeId> {
    let mut reached: HashSet<NodeId> = query.inputs().iter().copied().collect();
    // Query order need not be topological; sweep until nothing changes.
    loop {
        let before = reached.len();
        for &id in query.nodes() {
            if !reached.contains(&id)
                && arena
                    .get(id)
                    .referenced_nodes()
                    .iter()
                    .any(|n| reached.contains(n))
            {
                reached.insert(id);
            }
        }
        if reached.len() == before {
            return reached;
        }
    }
}

/// Fixed nodes of any kind that the inputs never reach, in query order.
/// Unreached plain nodes without a fixed value stay free and are reported.
fn synthetic_inputs(arena: &NodeArena, query: &Query) -> Vec<NodeId> {
    let reached = reachable_from_inputs(arena, query);
    let mut synthetic = Vec::new();
    for &id in query.nodes() {
        if reached.contains(&id) {
            continue;
        }
        let node = arena.get(id);
        if node.bounds.fixed_value().is_some() {
            synthetic.push(id);
        } else if matches!(node.kind, NodeKind::Plain) {
            tracing::warn!(
                node = %arena.name(id),
                "free variable unreachable from the inputs"
            );
        }
    }
    synthetic
}

impl SolverQuery {
    /// The `.ipq` record set for this query.
    pub fn to_ipq(&self) -> IpqFile {
        let constraints = self
            .relus
            .iter()
            .map(|p| IpqConstraint::Relu { f: p.f, b: p.b })
            .chain(self.abs.iter().map(|p| IpqConstraint::Abs { f: p.f, b: p.b }))
            .collect();
        IpqFile {
            num_vars: self.num_vars,
            inputs: self.input_vars.clone(),
            outputs: self.output_vars.clone(),
            lower_bounds: self.lower_bounds.clone(),
            upper_bounds: self.upper_bounds.clone(),
            equations: self.equations.clone(),
            constraints,
        }
    }

    /// Maps a variable-indexed witness back onto nodes. Unknown variables are
    /// dropped.
    pub fn witness_to_nodes(&self, witness: &HashMap<usize, f64>) -> HashMap<NodeId, f64> {
        witness
            .iter()
            .filter_map(|(&v, &x)| self.table.node_of(v).map(|id| (id, x)))
            .collect()
    }
}

// ── Solver seam ────────────────────────────────────────────────

/// Verdict of a solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Sat,
    Unsat,
    Timeout,
}

/// Result of a solver run; the witness is empty unless `Sat`.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub status: SolverStatus,
    pub witness: HashMap<usize, f64>,
}

impl SolverOutcome {
    pub fn sat(witness: HashMap<usize, f64>) -> Self {
        Self {
            status: SolverStatus::Sat,
            witness,
        }
    }

    pub fn unsat() -> Self {
        Self {
            status: SolverStatus::Unsat,
            witness: HashMap::new(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: SolverStatus::Timeout,
            witness: HashMap::new(),
        }
    }

    /// Passes `Sat`/`Unsat` through and turns `Timeout` into an error.
    pub fn require_definite(self) -> Result<Self, FormatError> {
        match self.status {
            SolverStatus::Timeout => Err(FormatError::SolverTimeout),
            _ => Ok(self),
        }
    }

    pub fn is_sat(&self) -> bool {
        self.status == SolverStatus::Sat
    }
}

/// An external constraint solver, called once per query.
pub trait Solver {
    fn solve(&mut self, query: &SolverQuery) -> SolverOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_ir::{Bounds, Equation, Node};

    fn relu_query(arena: &mut NodeArena) -> (Query, [NodeId; 3]) {
        let x = arena.push(Node::plain().with_bounds(Bounds::new(Some(0.0), Some(1.0))));
        let b = arena.push(Node::affine(vec![(2.0, x)], -1.0));
        let f = arena.push(Node::relu(b).with_bounds(Bounds::new(Some(0.0), None)));
        let eq = Equation::new(vec![(1.0, f)], Comparator::Ge, 0.5);
        let q = Query::new([b, f, x], vec![x], vec![f], vec![eq]).unwrap();
        (q, [x, b, f])
    }

    #[test]
    fn test_inputs_numbered_first() {
        let mut arena = NodeArena::new();
        let (q, [x, b, f]) = relu_query(&mut arena);
        let sq = export_query(&arena, &q).unwrap();
        assert_eq!(sq.table.var_of(x), Some(0));
        assert_eq!(sq.table.var_of(b), Some(1));
        assert_eq!(sq.table.var_of(f), Some(2));
        assert_eq!(sq.input_vars, vec![0]);
        assert_eq!(sq.output_vars, vec![2]);
        assert_eq!(sq.real_inputs, 1);
    }

    #[test]
    fn test_constraints_encoded() {
        let mut arena = NodeArena::new();
        let (q, _) = relu_query(&mut arena);
        let sq = export_query(&arena, &q).unwrap();
        assert_eq!(
            sq.equations[0],
            IpqEquation {
                comparator: Comparator::Eq,
                scalar: 1.0,
                addends: vec![(0, 2.0), (1, -1.0)],
            }
        );
        assert_eq!(sq.equations[1].comparator, Comparator::Ge);
        assert_eq!(sq.relus, vec![PiecewisePair { b: 1, f: 2 }]);
        assert_eq!(sq.lower_bounds.get(&2), Some(&0.0));
        assert_eq!(sq.upper_bounds.get(&0), Some(&1.0));
    }

    #[test]
    fn test_relaxed_relu_listed_twice() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let r = arena.push(Node::new(NodeKind::Relu {
            input: x,
            relaxed: true,
        }));
        let q = Query::new([x, r], vec![x], vec![r], vec![]).unwrap();
        let sq = export_query(&arena, &q).unwrap();
        assert_eq!(sq.relus, sq.relaxed_relus);
        assert_eq!(sq.to_ipq().constraints.len(), 1);
    }

    #[test]
    fn test_fixed_plain_node_becomes_synthetic_input() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let c = arena.push(Node::plain().with_bounds(Bounds::fixed(3.0)));
        let y = arena.push(Node::affine(vec![(1.0, x), (1.0, c)], 0.0));
        let q = Query::new([x, c, y], vec![x], vec![y], vec![]).unwrap();
        let sq = export_query(&arena, &q).unwrap();
        assert_eq!(sq.input_vars, vec![0, 1]);
        assert_eq!(sq.real_inputs, 1);
    }

    #[test]
    fn test_free_unreachable_node_stays_free() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let c = arena.push(Node::plain().with_bounds(Bounds::new(Some(0.0), None)));
        let y = arena.push(Node::affine(vec![(1.0, x), (1.0, c)], 0.0));
        let q = Query::new([x, c, y], vec![x], vec![y], vec![]).unwrap();
        let sq = export_query(&arena, &q).unwrap();
        assert_eq!(sq.input_vars, vec![0]);
        assert_eq!(sq.lower_bounds.get(&1), Some(&0.0));
    }

    #[test]
    fn test_fixed_affine_of_constants_becomes_synthetic_input() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain());
        let c = arena.push(Node::plain().with_bounds(Bounds::fixed(2.0)));
        let k = arena.push(Node::affine(vec![(2.0, c)], 0.0).with_bounds(Bounds::fixed(4.0)));
        let y = arena.push(Node::affine(vec![(1.0, x), (1.0, k)], 0.0));
        let q = Query::new([x, c, k, y], vec![x], vec![y], vec![]).unwrap();
        let sq = export_query(&arena, &q).unwrap();
        assert_eq!(sq.input_vars, vec![0, 1, 2]);
        assert_eq!(sq.real_inputs, 1);
    }

    #[test]
    fn test_fixed_node_reached_from_inputs_is_not_synthetic() {
        let mut arena = NodeArena::new();
        let x = arena.push(Node::plain().with_bounds(Bounds::fixed(1.0)));
        let y = arena.push(Node::affine(vec![(3.0, x)], 0.0).with_bounds(Bounds::fixed(3.0)));
        // Listed before its input to exercise out-of-order queries.
        let q = Query::new([y, x], vec![x], vec![y], vec![]).unwrap();
        let sq = export_query(&arena, &q).unwrap();
        assert_eq!(sq.input_vars, vec![0]);
    }

    #[test]
    fn test_to_ipq_parses_back() {
        let mut arena = NodeArena::new();
        let (q, _) = relu_query(&mut arena);
        let sq = export_query(&arena, &q).unwrap();
        let file = sq.to_ipq();
        let parsed = IpqFile::parse(&file.to_ipq_string()).unwrap();
        assert_eq!(parsed, file);
        assert_eq!(parsed.constraints, vec![IpqConstraint::Relu { f: 2, b: 1 }]);
    }

    #[test]
    fn test_witness_maps_back() {
        let mut arena = NodeArena::new();
        let (q, [x, _, f]) = relu_query(&mut arena);
        let sq = export_query(&arena, &q).unwrap();
        let witness: HashMap<usize, f64> = [(0, 0.8), (2, 0.6), (99, 1.0)].into_iter().collect();
        let nodes = sq.witness_to_nodes(&witness);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[&x], 0.8);
        assert_eq!(nodes[&f], 0.6);
    }

    #[test]
    fn test_require_definite() {
        assert!(SolverOutcome::unsat().require_definite().is_ok());
        assert!(matches!(
            SolverOutcome::timeout().require_definite(),
            Err(FormatError::SolverTimeout)
        ));
    }

    struct AlwaysUnsat;

    impl Solver for AlwaysUnsat {
        fn solve(&mut self, _query: &SolverQuery) -> SolverOutcome {
            SolverOutcome::unsat()
        }
    }

    #[test]
    fn test_solver_trait_object() {
        let mut arena = NodeArena::new();
        let (q, _) = relu_query(&mut arena);
        let sq = export_query(&arena, &q).unwrap();
        let mut solver: Box<dyn Solver> = Box::new(AlwaysUnsat);
        assert!(!solver.solve(&sq).is_sat());
    }
}
