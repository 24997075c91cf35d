//! # Tree evaluator
//!
//! Runs a solver tree numerically with the semantics of the module the generator
//! writes for it: the same guards, branch tests, candidate expansion, loop order and
//! solution records. The tree is first compiled into a plan with the free parameter
//! bookkeeping resolved and every symbol checked, so a tree the generator rejects is
//! rejected here too.
use crate::codegen::ik_runtime::{IkSolution, IkValues, IkVariable, ik_candidates};
use crate::codegen::rust_generator::GeneratorSettings;
use crate::codegen::solution_layout::{
    ChainLayout, free_dependence, pose_names, raw_pose_names, values_form,
};
use crate::ik::ik_errors::IkError;
use crate::ik::solver_tree::{SolverNode, SolverTree, rotation_target_names};
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_simplify::chop;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
enum Source {
    /// the joint is the free parameter at this stack position
    Free(usize),
    /// `value + mul * free`
    Dependent(usize, f64),
    Fixed,
}

#[derive(Debug, Clone, PartialEq)]
struct RecordEntry {
    name: String,
    wrap: bool,
    source: Source,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    /// one pass over `rest` per candidate
    Candidates {
        name: String,
        form: IkValues,
        values: Vec<Expr>,
        add_pi: bool,
        hinge: bool,
        rest: Vec<Step>,
    },
    Branch {
        selector: Expr,
        arms: Vec<(Option<f64>, Vec<Step>)>,
    },
    Supplied {
        name: String,
        index: usize,
        hinge: bool,
    },
    Constant {
        name: String,
        value: f64,
        hinge: bool,
    },
    Define {
        names: Vec<String>,
        exprs: Vec<Expr>,
    },
    Block(Vec<Step>),
    Store {
        entries: Vec<RecordEntry>,
        vfree: Vec<usize>,
    },
}

/// Turns the tree into steps, tracking what the generated code would have in scope.
struct PlanBuilder {
    layout: ChainLayout,
    free_stack: Vec<String>,
    dependencies: HashMap<String, (usize, f64)>,
    scopes: Vec<HashSet<String>>,
}

impl PlanBuilder {
    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn bind_joint(&mut self, name: &str, hinge: bool) {
        self.bind(name);
        if hinge {
            self.bind(&format!("s{}", name));
            self.bind(&format!("c{}", name));
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    fn check_bound(&self, exprs: &[Expr]) -> Result<(), IkError> {
        for e in exprs {
            if let Some(s) = e.free_symbols().into_iter().find(|s| !self.is_bound(s)) {
                return Err(IkError::CodeGeneration(format!(
                    "{} is used in {} before it is computed",
                    s, e
                )));
            }
        }
        Ok(())
    }

    fn scoped(&mut self, nodes: &[SolverNode]) -> Result<Vec<Step>, IkError> {
        self.scopes.push(HashSet::new());
        let steps = self.list(nodes);
        self.scopes.pop();
        steps
    }

    fn list(&mut self, nodes: &[SolverNode]) -> Result<Vec<Step>, IkError> {
        let mut steps = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            match node {
                SolverNode::Solution(s) => {
                    self.check_bound(s.values.exprs())?;
                    let hinge = self.layout.is_hinge(&s.name);
                    let dependency = free_dependence(&s.name, &s.values, &self.free_stack);
                    self.scopes.push(HashSet::new());
                    self.bind_joint(&s.name, hinge);
                    if let Some(d) = dependency {
                        self.dependencies.insert(s.name.clone(), d);
                    }
                    let rest = self.list(&nodes[i + 1..]);
                    self.dependencies.remove(&s.name);
                    self.scopes.pop();
                    steps.push(Step::Candidates {
                        name: s.name.clone(),
                        form: values_form(&s.values),
                        values: s.values.exprs().to_vec(),
                        add_pi: s.add_pi,
                        hinge,
                        rest: rest?,
                    });
                    return Ok(steps);
                }
                SolverNode::Branch(b) => {
                    self.check_bound(std::slice::from_ref(&b.selector))?;
                    let mut arms = Vec::with_capacity(b.arms.len());
                    for arm in &b.arms {
                        arms.push((arm.value, self.scoped(&arm.tree)?));
                    }
                    steps.push(Step::Branch {
                        selector: b.selector.clone(),
                        arms,
                    });
                }
                SolverNode::FreeParameter { name, tree } => {
                    let hinge = self.layout.is_hinge(name);
                    match self.layout.pfree_index(name) {
                        Some(index) if !self.is_bound("r00") => {
                            self.bind_joint(name, hinge);
                            steps.push(Step::Supplied {
                                name: name.clone(),
                                index,
                                hinge,
                            });
                            steps.extend(self.list(tree)?);
                        }
                        _ => {
                            self.scopes.push(HashSet::new());
                            self.bind_joint(name, hinge);
                            self.free_stack.push(name.clone());
                            let inner = self.list(tree);
                            self.free_stack.pop();
                            self.scopes.pop();
                            let mut block = vec![Step::Constant {
                                name: name.clone(),
                                value: 0.0,
                                hinge,
                            }];
                            block.extend(inner?);
                            steps.push(Step::Block(block));
                        }
                    }
                }
                SolverNode::SetJoint { name, value } => {
                    let hinge = self.layout.is_hinge(name);
                    self.bind_joint(name, hinge);
                    steps.push(Step::Constant {
                        name: name.clone(),
                        value: *value,
                        hinge,
                    });
                }
                SolverNode::Chain(c) => {
                    self.check_bound(&c.pose)?;
                    let names = pose_names();
                    for n in &names {
                        self.bind(n);
                    }
                    steps.push(Step::Define {
                        names,
                        exprs: c.pose.clone(),
                    });
                    steps.extend(self.list(&c.tree)?);
                }
                SolverNode::Rotation { transform, tree } => {
                    self.check_bound(transform)?;
                    self.scopes.push(HashSet::new());
                    let names = rotation_target_names();
                    for n in &names {
                        self.bind(n);
                    }
                    let inner = self.list(tree);
                    self.scopes.pop();
                    let mut block = vec![Step::Define {
                        names,
                        exprs: transform.clone(),
                    }];
                    block.extend(inner?);
                    steps.push(Step::Block(block));
                }
                SolverNode::Sequence(children) => {
                    for child in children {
                        steps.push(Step::Block(self.scoped(child)?));
                    }
                }
                SolverNode::StoreSolution { all_vars } => steps.push(self.store(all_vars)?),
            }
        }
        Ok(steps)
    }

    fn store(&self, all_vars: &[String]) -> Result<Step, IkError> {
        let mut vfree = Vec::with_capacity(self.free_stack.len());
        for name in &self.free_stack {
            vfree.push(self.layout.record_index(name).ok_or_else(|| {
                IkError::CodeGeneration(format!("free joint {} is not in the chain", name))
            })?);
        }
        let mut entries = Vec::with_capacity(all_vars.len());
        for name in all_vars {
            if !self.is_bound(name) {
                return Err(IkError::CodeGeneration(format!("{} is not computed on this path", name)));
            }
            let source = if let Some(pos) = self.free_stack.iter().position(|f| f == name) {
                Source::Free(pos)
            } else if let Some((pos, mul)) = self.dependencies.get(name) {
                Source::Dependent(*pos, *mul)
            } else {
                Source::Fixed
            };
            entries.push(RecordEntry {
                name: name.clone(),
                wrap: self.layout.is_hinge(name),
                source,
            });
        }
        Ok(Step::Store { entries, vfree })
    }
}

fn value_of(env: &HashMap<String, f64>, name: &str) -> Result<f64, SymbolicError> {
    env.get(name)
        .copied()
        .ok_or_else(|| SymbolicError::UnboundSymbol(name.to_string()))
}

fn bind_joint(env: &mut HashMap<String, f64>, name: &str, hinge: bool, [v, s, c]: [f64; 3]) {
    env.insert(name.to_string(), v);
    if hinge {
        env.insert(format!("s{}", name), s);
        env.insert(format!("c{}", name), c);
    }
}

pub struct TreeEvaluator {
    layout: ChainLayout,
    plan: Vec<Step>,
    branch_tolerance: f64,
    duplicate_tolerance: f64,
}

impl TreeEvaluator {
    pub fn new(tree: &SolverTree, settings: &GeneratorSettings) -> Result<TreeEvaluator, IkError> {
        let layout = ChainLayout::of(tree)?;
        let mut builder = PlanBuilder {
            layout: layout.clone(),
            free_stack: Vec::new(),
            dependencies: HashMap::new(),
            scopes: vec![raw_pose_names().into_iter().collect()],
        };
        let plan = builder.list(tree)?;
        info!(
            "tree evaluator ready: {} joints, {} free parameters",
            layout.joints.len(),
            layout.free.len()
        );
        Ok(TreeEvaluator {
            layout,
            plan,
            branch_tolerance: settings.branch_tolerance,
            duplicate_tolerance: settings.duplicate_tolerance,
        })
    }

    pub fn get_num_free_parameters(&self) -> usize {
        self.layout.free.len()
    }

    pub fn get_free_parameters(&self) -> Vec<usize> {
        self.layout.free_indices()
    }

    pub fn get_num_joints(&self) -> usize {
        self.layout.joints.len()
    }

    /// Solutions for the pose `eerot` (row major) and `eetrans`; `None` when nothing is
    /// found or a guard aborts the solve.
    pub fn solve(&self, eerot: &[f64; 9], eetrans: &[f64; 3], pfree: &[f64]) -> Option<Vec<IkSolution>> {
        if pfree.len() < self.layout.free.len() {
            return None;
        }
        let mut env: HashMap<String, f64> = HashMap::new();
        for (k, name) in raw_pose_names().into_iter().enumerate() {
            let v = if k < 9 { eerot[k] } else { eetrans[k - 9] };
            env.insert(name, v);
        }
        let mut solutions = Vec::new();
        if let Err(e) = self.run(&self.plan, pfree, &mut env, &mut solutions) {
            debug!("solve aborted: {}", e);
            return None;
        }
        if solutions.is_empty() { None } else { Some(solutions) }
    }

    fn run(
        &self,
        steps: &[Step],
        pfree: &[f64],
        env: &mut HashMap<String, f64>,
        solutions: &mut Vec<IkSolution>,
    ) -> Result<(), SymbolicError> {
        for step in steps {
            match step {
                Step::Candidates {
                    name,
                    form,
                    values,
                    add_pi,
                    hinge,
                    rest,
                } => {
                    let mut raw = Vec::with_capacity(values.len());
                    for v in values {
                        raw.push(v.eval(env)?);
                    }
                    for candidate in ik_candidates(*form, &raw, *add_pi, *hinge, self.duplicate_tolerance) {
                        bind_joint(env, name, *hinge, candidate);
                        self.run(rest, pfree, env, solutions)?;
                    }
                }
                Step::Branch { selector, arms } => {
                    let evalcond = selector.eval(env)?;
                    let taken = arms.iter().find(|(value, _)| match value {
                        Some(v) => (evalcond - v).abs() < self.branch_tolerance,
                        None => true,
                    });
                    if let Some((_, arm)) = taken {
                        self.run(arm, pfree, env, solutions)?;
                    }
                }
                Step::Supplied { name, index, hinge } => {
                    let v = pfree[*index];
                    bind_joint(env, name, *hinge, [v, v.sin(), v.cos()]);
                }
                Step::Constant { name, value, hinge } => {
                    bind_joint(
                        env,
                        name,
                        *hinge,
                        [chop(*value), chop(value.sin()), chop(value.cos())],
                    );
                }
                Step::Define { names, exprs } => {
                    let mut values = Vec::with_capacity(exprs.len());
                    for e in exprs {
                        values.push(e.eval(env)?);
                    }
                    for (n, v) in names.iter().zip(values) {
                        env.insert(n.clone(), v);
                    }
                }
                Step::Block(inner) => self.run(inner, pfree, env, solutions)?,
                Step::Store { entries, vfree } => {
                    let mut basesol = Vec::with_capacity(entries.len());
                    for entry in entries {
                        let var = match entry.source {
                            Source::Free(pos) => IkVariable {
                                foffset: 0.0,
                                fmul: 1.0,
                                freeind: Some(pos),
                                wrap: entry.wrap,
                            },
                            Source::Dependent(pos, mul) => IkVariable {
                                foffset: value_of(env, &entry.name)?,
                                fmul: mul,
                                freeind: Some(pos),
                                wrap: entry.wrap,
                            },
                            Source::Fixed => IkVariable::fixed(value_of(env, &entry.name)?, entry.wrap),
                        };
                        basesol.push(var);
                    }
                    solutions.push(IkSolution {
                        basesol,
                        vfree: vfree.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
