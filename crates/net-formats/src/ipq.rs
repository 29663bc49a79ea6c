// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The solver-native input query format (`.ipq`).
//!
//! # Layout
//! One record per line, fields separated by commas:
//!
//! ```text
//! numVars
//! numLowerBounds
//! numUpperBounds
//! numEquations
//! numConstraints
//! numInputs
//! i,var                      (numInputs lines, i = 0, 1, ...)
//! numOutputs
//! i,var                      (numOutputs lines)
//! var,value                  (numLowerBounds lines)
//! var,value                  (numUpperBounds lines)
//! id,kind,scalar,var,coeff,… (numEquations lines; kind 0 = EQ, 1 = GE, 2 = LE)
//! id,relu,f,b                (numConstraints lines; also absoluteValue, max)
//! id,max,f,b0,b1,…
//! ```
//!
//! [`IpqFile`] is the parsed record set; [`import_ipq`] rebuilds a strictly
//! alternating affine/ReLU [`LayeredNetwork`] from it.

use crate::{FormatError, ImportContext};
use network_ir::{Comparator, Layer, LayeredNetwork, Node, NodeArena, NodeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

/// An equation record.
#[derive(Debug, Clone, PartialEq)]
pub struct IpqEquation {
    pub comparator: Comparator,
    pub scalar: f64,
    /// `(var, coefficient)` pairs.
    pub addends: Vec<(usize, f64)>,
}

/// A piecewise-linear constraint record.
#[derive(Debug, Clone, PartialEq)]
pub enum IpqConstraint {
    Relu { f: usize, b: usize },
    Abs { f: usize, b: usize },
    Max { f: usize, inputs: Vec<usize> },
}

impl IpqConstraint {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Relu { .. } => "relu",
            Self::Abs { .. } => "absoluteValue",
            Self::Max { .. } => "max",
        }
    }
}

/// Parsed contents of an `.ipq` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpqFile {
    pub num_vars: usize,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub lower_bounds: BTreeMap<usize, f64>,
    pub upper_bounds: BTreeMap<usize, f64>,
    pub equations: Vec<IpqEquation>,
    pub constraints: Vec<IpqConstraint>,
}

fn comparator_code(c: Comparator) -> u8 {
    match c {
        Comparator::Eq => 0,
        Comparator::Ge => 1,
        Comparator::Le => 2,
    }
}

fn comparator_from_code(code: u8) -> Option<Comparator> {
    match code {
        0 => Some(Comparator::Eq),
        1 => Some(Comparator::Ge),
        2 => Some(Comparator::Le),
        _ => None,
    }
}

/// Line cursor over `.ipq` text.
struct Records<'a> {
    lines: std::str::Lines<'a>,
    line: usize,
}

impl<'a> Records<'a> {
    fn next(&mut self, what: &str) -> Result<Vec<&'a str>, FormatError> {
        self.line += 1;
        let raw = self
            .lines
            .next()
            .ok_or_else(|| FormatError::parse(self.line, format!("unexpected end of file, expected {what}")))?;
        Ok(raw.trim().split(',').map(str::trim).collect())
    }

    fn parse<T: std::str::FromStr>(&self, field: &str, what: &str) -> Result<T, FormatError>
    where
        T::Err: std::fmt::Display,
    {
        field
            .parse::<T>()
            .map_err(|e| FormatError::parse(self.line, format!("{what}: invalid value '{field}': {e}")))
    }

    fn count(&mut self, what: &str) -> Result<usize, FormatError> {
        let row = self.next(what)?;
        self.parse(row[0], what)
    }

    /// `i,var` lines with `i` running from zero.
    fn indexed_vars(&mut self, n: usize, num_vars: usize, what: &str) -> Result<Vec<usize>, FormatError> {
        let mut vars = Vec::new();
        for i in 0..n {
            let row = self.next(what)?;
            if row.len() != 2 {
                return Err(FormatError::parse(self.line, format!("{what}: expected 'index,var'")));
            }
            let idx: usize = self.parse(row[0], what)?;
            if idx != i {
                return Err(FormatError::parse(self.line, format!("{what}: expected index {i}, got {idx}")));
            }
            let var: usize = self.parse(row[1], what)?;
            if var >= num_vars {
                return Err(FormatError::parse(self.line, format!("{what}: variable {var} out of range")));
            }
            vars.push(var);
        }
        Ok(vars)
    }

    fn bounds(&mut self, n: usize, what: &str) -> Result<BTreeMap<usize, f64>, FormatError> {
        let mut map = BTreeMap::new();
        for _ in 0..n {
            let row = self.next(what)?;
            if row.len() != 2 {
                return Err(FormatError::parse(self.line, format!("{what}: expected 'var,value'")));
            }
            let var: usize = self.parse(row[0], what)?;
            let value: f64 = self.parse(row[1], what)?;
            if map.insert(var, value).is_some() {
                return Err(FormatError::parse(self.line, format!("{what}: duplicate bound for {var}")));
            }
        }
        Ok(map)
    }
}

impl IpqFile {
    /// Parses `.ipq` text.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let mut rec = Records {
            lines: text.lines(),
            line: 0,
        };

        let num_vars = rec.count("variable count")?;
        let lower_count = rec.count("lower bound count")?;
        let upper_count = rec.count("upper bound count")?;
        let equation_count = rec.count("equation count")?;
        let constraint_count = rec.count("constraint count")?;

        let input_count = rec.count("input count")?;
        let inputs = rec.indexed_vars(input_count, num_vars, "input variable")?;
        let output_count = rec.count("output count")?;
        let outputs = rec.indexed_vars(output_count, num_vars, "output variable")?;
        if let Some(v) = outputs.iter().find(|v| inputs.contains(v)) {
            return Err(FormatError::parse(rec.line, format!("variable {v} is both input and output")));
        }

        let lower_bounds = rec.bounds(lower_count, "lower bound")?;
        let upper_bounds = rec.bounds(upper_count, "upper bound")?;

        // Record counts are untrusted; grow as records are read.
        let mut equations = Vec::new();
        for i in 0..equation_count {
            let row = rec.next("equation")?;
            if row.len() < 3 || (row.len() - 3) % 2 != 0 {
                return Err(FormatError::parse(rec.line, "equation: expected 'id,kind,scalar,(var,coeff)*'"));
            }
            let id: usize = rec.parse(row[0], "equation id")?;
            if id != i {
                return Err(FormatError::parse(rec.line, format!("equation: expected id {i}, got {id}")));
            }
            let code: u8 = rec.parse(row[1], "equation kind")?;
            let comparator = comparator_from_code(code)
                .ok_or_else(|| FormatError::parse(rec.line, format!("equation: unknown kind {code}")))?;
            let scalar: f64 = rec.parse(row[2], "equation scalar")?;
            let mut addends = Vec::with_capacity((row.len() - 3) / 2);
            for pair in row[3..].chunks(2) {
                let var: usize = rec.parse(pair[0], "equation variable")?;
                let coeff: f64 = rec.parse(pair[1], "equation coefficient")?;
                addends.push((var, coeff));
            }
            equations.push(IpqEquation {
                comparator,
                scalar,
                addends,
            });
        }

        let mut constraints = Vec::new();
        for i in 0..constraint_count {
            let row = rec.next("constraint")?;
            if row.len() < 4 {
                return Err(FormatError::parse(rec.line, "constraint: expected 'id,kind,f,b...'"));
            }
            let id: usize = rec.parse(row[0], "constraint id")?;
            if id != i {
                return Err(FormatError::parse(rec.line, format!("constraint: expected id {i}, got {id}")));
            }
            let f: usize = rec.parse(row[2], "constraint variable")?;
            let constraint = match row[1] {
                "relu" | "absoluteValue" => {
                    if row.len() != 4 {
                        return Err(FormatError::parse(rec.line, "constraint: expected 'id,kind,f,b'"));
                    }
                    let b: usize = rec.parse(row[3], "constraint variable")?;
                    if row[1] == "relu" {
                        IpqConstraint::Relu { f, b }
                    } else {
                        IpqConstraint::Abs { f, b }
                    }
                }
                "max" => {
                    let inputs = row[3..]
                        .iter()
                        .map(|v| rec.parse(v, "constraint variable"))
                        .collect::<Result<_, _>>()?;
                    IpqConstraint::Max { f, inputs }
                }
                other => return Err(network_ir::IrError::UnknownNodeKind(other.to_string()).into()),
            };
            constraints.push(constraint);
        }

        Ok(Self {
            num_vars,
            inputs,
            outputs,
            lower_bounds,
            upper_bounds,
            equations,
            constraints,
        })
    }

    /// Reads and parses an `.ipq` file from disk.
    pub fn from_file(path: &Path) -> Result<Self, FormatError> {
        let text = std::fs::read_to_string(path).map_err(|source| FormatError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Renders the record set back into `.ipq` text.
    pub fn to_ipq_string(&self) -> String {
        let mut out = String::new();
        for n in [
            self.num_vars,
            self.lower_bounds.len(),
            self.upper_bounds.len(),
            self.equations.len(),
            self.constraints.len(),
        ] {
            let _ = writeln!(out, "{n}");
        }
        let _ = writeln!(out, "{}", self.inputs.len());
        for (i, v) in self.inputs.iter().enumerate() {
            let _ = writeln!(out, "{i},{v}");
        }
        let _ = writeln!(out, "{}", self.outputs.len());
        for (i, v) in self.outputs.iter().enumerate() {
            let _ = writeln!(out, "{i},{v}");
        }
        for bounds in [&self.lower_bounds, &self.upper_bounds] {
            for (v, c) in bounds {
                let _ = writeln!(out, "{v},{c}");
            }
        }
        for (i, eq) in self.equations.iter().enumerate() {
            let _ = write!(out, "{i},{},{}", comparator_code(eq.comparator), eq.scalar);
            for (v, c) in &eq.addends {
                let _ = write!(out, ",{v},{c}");
            }
            out.push('\n');
        }
        for (i, c) in self.constraints.iter().enumerate() {
            let _ = match c {
                IpqConstraint::Relu { f, b } | IpqConstraint::Abs { f, b } => {
                    writeln!(out, "{i},{},{f},{b}", c.kind_name())
                }
                IpqConstraint::Max { f, inputs } => {
                    let ins: Vec<String> = inputs.iter().map(usize::to_string).collect();
                    writeln!(out, "{i},max,{f},{}", ins.join(","))
                }
            };
        }
        out
    }

    /// Variables whose lower and upper bound coincide.
    pub fn fixed_vars(&self) -> Vec<usize> {
        self.lower_bounds
            .iter()
            .filter(|(v, l)| self.upper_bounds.get(v) == Some(l))
            .map(|(&v, _)| v)
            .collect()
    }
}

/// A network rebuilt from an `.ipq` file.
#[derive(Debug, Clone)]
pub struct IpqNetwork {
    pub network: LayeredNetwork,
    /// Number of inputs declared by the file. Layer 0 may hold more: fixed
    /// variables are appended as synthetic inputs.
    pub declared_inputs: usize,
    /// File variable → node.
    pub variables: HashMap<usize, NodeId>,
}

/// Rebuilds a strictly alternating affine/ReLU network from `file`.
///
/// In `strict` mode every equation must be an equality whose newly defined
/// variable has coefficient −1, and the declared outputs must be exactly the
/// final affine layer.
pub fn import_ipq(
    file: &IpqFile,
    strict: bool,
    ctx: &mut ImportContext,
    arena: &mut NodeArena,
) -> Result<IpqNetwork, FormatError> {
    if let Some(c) = file
        .constraints
        .iter()
        .find(|c| !matches!(c, IpqConstraint::Relu { .. }))
    {
        return Err(FormatError::UnsupportedConstraintKind {
            kind: c.kind_name().to_string(),
        });
    }

    let prefix = ctx.next_ipq_prefix();

    // Fixed variables unreachable from the inputs would otherwise be lost by
    // the solver; they are re-declared as extra inputs.
    let declared_inputs = file.inputs.len();
    let mut input_vars = file.inputs.clone();
    let synthetic: Vec<usize> = file
        .fixed_vars()
        .into_iter()
        .filter(|v| !file.inputs.contains(v))
        .collect();
    if !synthetic.is_empty() {
        tracing::warn!(count = synthetic.len(), "fixed variables added as synthetic inputs");
    }
    input_vars.extend(synthetic);

    let mut var: HashMap<usize, NodeId> = HashMap::new();
    let mut flat: Vec<Vec<NodeId>> = Vec::new();
    let mut used_equations = HashSet::new();

    let mut input_layer = Vec::with_capacity(input_vars.len());
    for (i, &v) in input_vars.iter().enumerate() {
        let id = arena.push(Node::plain().with_label(format!("{prefix}00_{i:02}")));
        var.insert(v, id);
        input_layer.push(id);
    }
    flat.push(input_layer);

    loop {
        let layer = build_affine_layer(file, &mut var, &mut used_equations, flat.len(), &prefix, strict, arena)?;
        if layer.is_empty() {
            return Err(FormatError::topology(format!(
                "layer {} defines no affine nodes",
                flat.len()
            )));
        }
        flat.push(layer);

        let layer = build_relu_layer(file, &mut var, flat.len(), &prefix, arena);
        if layer.is_empty() {
            break;
        }
        flat.push(layer);
    }

    if strict {
        let outputs: HashSet<NodeId> = file.outputs.iter().filter_map(|v| var.get(v).copied()).collect();
        let last: HashSet<NodeId> = flat.last().map(|l| l.iter().copied().collect()).unwrap_or_default();
        if outputs.len() != file.outputs.len() || outputs != last {
            return Err(FormatError::topology(
                "declared outputs are not exactly the final affine layer",
            ));
        }
    }

    for c in &file.constraints {
        if let IpqConstraint::Relu { f, b } = c {
            if !var.contains_key(f) || !var.contains_key(b) {
                return Err(FormatError::topology(format!(
                    "relu {b} -> {f} is not part of the layered structure"
                )));
            }
        }
    }
    for (i, eq) in file.equations.iter().enumerate() {
        if let Some((v, _)) = eq.addends.iter().find(|(v, _)| !var.contains_key(v)) {
            return Err(FormatError::topology(format!(
                "equation #{i} mentions variable {v}, which is unreachable from the inputs"
            )));
        }
    }
    let unused = file.equations.len() - used_equations.len();
    if unused > 0 {
        tracing::warn!(unused, "equations not defining a node were dropped");
    }

    for (&v, &id) in &var {
        arena.update_limit(
            id,
            file.lower_bounds.get(&v).copied(),
            file.upper_bounds.get(&v).copied(),
        )?;
    }

    let layers = pair_layers(&flat, arena)?;
    let network = LayeredNetwork::new(layers, arena)?;
    tracing::info!(
        prefix = %prefix,
        layers = network.layer_count(),
        declared_inputs,
        "imported ipq network"
    );

    Ok(IpqNetwork {
        network,
        declared_inputs,
        variables: var,
    })
}

/// Reads, parses and imports an `.ipq` file from disk in strict mode.
pub fn load_ipq(
    path: &Path,
    ctx: &mut ImportContext,
    arena: &mut NodeArena,
) -> Result<IpqNetwork, FormatError> {
    import_ipq(&IpqFile::from_file(path)?, true, ctx, arena)
}

/// One affine layer: every equation with exactly one not-yet-defined
/// variable defines that variable in terms of the others.
fn build_affine_layer(
    file: &IpqFile,
    var: &mut HashMap<usize, NodeId>,
    used: &mut HashSet<usize>,
    layer: usize,
    prefix: &str,
    strict: bool,
    arena: &mut NodeArena,
) -> Result<Vec<NodeId>, FormatError> {
    let mut defined: HashMap<usize, NodeId> = HashMap::new();
    let mut nodes = Vec::new();

    for (ei, eq) in file.equations.iter().enumerate() {
        if eq.comparator != Comparator::Eq {
            if strict {
                return Err(FormatError::topology(format!(
                    "equation #{ei} is an inequality"
                )));
            }
            continue;
        }
        let fresh: Vec<(usize, f64)> = eq
            .addends
            .iter()
            .copied()
            .filter(|(v, _)| !var.contains_key(v))
            .collect();
        let &[(nv, nc)] = fresh.as_slice() else {
            continue;
        };
        if strict && nc != -1.0 {
            return Err(FormatError::topology(format!(
                "equation #{ei} defines variable {nv} with coefficient {nc}, expected -1"
            )));
        }
        if nc == 0.0 {
            return Err(FormatError::DegenerateEquation {
                equation: ei,
                variable: nv,
            });
        }
        if defined.contains_key(&nv) {
            return Err(FormatError::topology(format!(
                "variable {nv} is defined by more than one equation"
            )));
        }

        // Σ c·x + nc·nv = scalar  ⇒  nv = Σ (−c/nc)·x + scalar/nc
        let terms = eq
            .addends
            .iter()
            .filter(|(v, _)| *v != nv)
            .map(|&(v, c)| (-c / nc, var[&v]))
            .collect();
        let label = format!("{prefix}{layer:02}_w{:02}", nodes.len());
        let id = arena.push(Node::affine(terms, eq.scalar / nc).with_label(label));
        defined.insert(nv, id);
        used.insert(ei);
        nodes.push(id);
    }

    var.extend(defined);
    Ok(nodes)
}

/// One ReLU layer: every ReLU whose input is defined and output is not.
fn build_relu_layer(
    file: &IpqFile,
    var: &mut HashMap<usize, NodeId>,
    layer: usize,
    prefix: &str,
    arena: &mut NodeArena,
) -> Vec<NodeId> {
    let mut defined: HashMap<usize, NodeId> = HashMap::new();
    let mut nodes = Vec::new();
    for c in &file.constraints {
        let IpqConstraint::Relu { f, b } = *c else {
            continue;
        };
        let Some(&input) = var.get(&b) else {
            continue;
        };
        if var.contains_key(&f) || defined.contains_key(&f) {
            continue;
        }
        let label = format!("{prefix}{layer:02}_r{:02}", nodes.len());
        let id = arena.push(Node::relu(input).with_label(label));
        defined.insert(f, id);
        nodes.push(id);
    }
    var.extend(defined);
    nodes
}

/// Groups the flat `[inputs, affine, relu, affine, relu, …, affine]` layers
/// into neuron chains: each ReLU is paired with its affine input, leftover
/// affine nodes stand alone.
fn pair_layers(flat: &[Vec<NodeId>], arena: &NodeArena) -> Result<Vec<Layer>, FormatError> {
    let mut layers: Vec<Layer> = Vec::with_capacity(flat.len() / 2 + 1);
    layers.push(flat[0].iter().map(|&n| vec![n]).collect());

    let last = flat.len() - 1;
    for i in (1..last).step_by(2) {
        let affine = &flat[i];
        let relus = &flat[i + 1];
        let mut chains = Vec::with_capacity(affine.len());
        let mut paired = HashSet::new();
        for &r in relus {
            let input = arena.get(r).referenced_nodes()[0];
            if !affine.contains(&input) {
                return Err(FormatError::topology(format!(
                    "relu '{}' does not read from the affine layer directly before it",
                    arena.name(r)
                )));
            }
            paired.insert(input);
            chains.push(vec![input, r]);
        }
        chains.extend(affine.iter().filter(|n| !paired.contains(n)).map(|&n| vec![n]));
        layers.push(chains);
    }
    layers.push(flat[last].iter().map(|&n| vec![n]).collect());
    Ok(layers)
}
