//! The solver tree: the branching plan produced by the equation-solving engine and
//! consumed by the code generator and the tree evaluator.
//!
//! A tree is a list of nodes. A node that introduces joint values (`Solution`,
//! `SetJoint`, `FreeParameter`) scopes over everything that follows it in its list:
//! a `Solution` with several candidates runs the rest of the list once per candidate.
//! `Branch` arms and `Sequence` children are self-contained lists that each end in a
//! `StoreSolution` leaf.
use crate::ik::ik_errors::IkError;
use crate::ik::variables::JointKind;
use crate::symbolic::symbolic_engine::Expr;
use std::collections::BTreeMap;

/// The candidate values of one solved joint.
#[derive(Debug, Clone, PartialEq)]
pub enum SolutionValues {
    /// the angle itself
    Angles(Vec<Expr>),
    /// cosines of the angle, each giving `±acos`
    Cosines(Vec<Expr>),
    /// sines of the angle, each giving `asin` and `pi - asin`
    Sines(Vec<Expr>),
}

impl SolutionValues {
    pub fn exprs(&self) -> &[Expr] {
        match self {
            SolutionValues::Angles(v) | SolutionValues::Cosines(v) | SolutionValues::Sines(v) => v,
        }
    }

    /// number of runtime candidates
    pub fn candidate_count(&self) -> usize {
        match self {
            SolutionValues::Angles(v) => v.len(),
            SolutionValues::Cosines(v) | SolutionValues::Sines(v) => 2 * v.len(),
        }
    }

    pub fn complexity(&self) -> usize {
        self.exprs().iter().map(Expr::complexity).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSolution {
    pub name: String,
    pub values: SolutionValues,
    /// also try every candidate shifted by pi
    pub add_pi: bool,
    pub kind: JointKind,
}

impl SolverSolution {
    pub fn angles(name: &str, values: Vec<Expr>) -> SolverSolution {
        SolverSolution {
            name: name.to_string(),
            values: SolutionValues::Angles(values),
            add_pi: false,
            kind: JointKind::Hinge,
        }
    }

    pub fn with_add_pi(mut self) -> SolverSolution {
        self.add_pi = true;
        self
    }

    pub fn with_kind(mut self, kind: JointKind) -> SolverSolution {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchArm {
    /// selector value this arm is taken for; `None` marks the default arm
    pub value: Option<f64>,
    pub tree: SolverTree,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverBranch {
    pub name: String,
    pub selector: Expr,
    pub arms: Vec<BranchArm>,
}

impl SolverBranch {
    /// A branch needs exactly one default arm, placed last.
    pub fn new(name: &str, selector: Expr, arms: Vec<BranchArm>) -> Result<SolverBranch, IkError> {
        let defaults = arms.iter().filter(|a| a.value.is_none()).count();
        if defaults != 1 || arms.last().is_some_and(|a| a.value.is_some()) {
            return Err(IkError::CodeGeneration(format!(
                "branch on {} needs exactly one default arm, placed last",
                name
            )));
        }
        Ok(SolverBranch {
            name: name.to_string(),
            selector,
            arms,
        })
    }
}

/// A joint of the chain as the generated function sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct JointRef {
    pub name: String,
    pub chain_index: usize,
    pub kind: JointKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverChain {
    pub solve_vars: Vec<JointRef>,
    /// joints supplied by the caller through `pfree`
    pub free_vars: Vec<JointRef>,
    /// rotation entries r00..r22 then px, py, pz of the target after moving the
    /// constant base and end links out, in terms of the raw pose
    pub pose: Vec<Expr>,
    pub tree: SolverTree,
}

impl SolverChain {
    /// all joints in chain order
    pub fn joints(&self) -> Vec<JointRef> {
        let mut all: Vec<JointRef> = self.solve_vars.iter().chain(&self.free_vars).cloned().collect();
        all.sort_by_key(|j| j.chain_index);
        all
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolverNode {
    Solution(SolverSolution),
    Branch(SolverBranch),
    /// the joint is not determined here and becomes a parameter of the solution
    FreeParameter { name: String, tree: SolverTree },
    /// fixes a joint to a constant in a degenerate branch
    SetJoint { name: String, value: f64 },
    Chain(SolverChain),
    /// recomputes the nine `new_rij` target entries before solving the rotation joints
    Rotation { transform: Vec<Expr>, tree: SolverTree },
    /// independent alternative plans, all tried
    Sequence(Vec<SolverTree>),
    /// records one complete joint vector
    StoreSolution { all_vars: Vec<String> },
}

pub type SolverTree = Vec<SolverNode>;

/// Names of the rotation-target symbols a `Rotation` node defines.
pub fn rotation_target_names() -> Vec<String> {
    let mut names = Vec::with_capacity(9);
    for i in 0..3 {
        for j in 0..3 {
            names.push(format!("new_r{}{}", i, j));
        }
    }
    names
}

/// Bracketing traversal: `enter` before a node's children, `exit` after them.
pub trait SolverVisitor {
    fn enter(&mut self, node: &SolverNode) -> Result<(), IkError>;
    fn exit(&mut self, _node: &SolverNode) -> Result<(), IkError> {
        Ok(())
    }
}

pub fn walk_tree<V: SolverVisitor>(tree: &[SolverNode], visitor: &mut V) -> Result<(), IkError> {
    for node in tree {
        visitor.enter(node)?;
        match node {
            SolverNode::Branch(b) => {
                for arm in &b.arms {
                    walk_tree(&arm.tree, visitor)?;
                }
            }
            SolverNode::FreeParameter { tree, .. }
            | SolverNode::Rotation { tree, .. } => walk_tree(tree, visitor)?,
            SolverNode::Chain(c) => walk_tree(&c.tree, visitor)?,
            SolverNode::Sequence(children) => {
                for child in children {
                    walk_tree(child, visitor)?;
                }
            }
            SolverNode::Solution(_) | SolverNode::SetJoint { .. } | SolverNode::StoreSolution { .. } => {}
        }
        visitor.exit(node)?;
    }
    Ok(())
}

/// Node counts per kind, plus the deepest nesting seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeStats {
    pub counts: BTreeMap<&'static str, usize>,
    pub max_depth: usize,
    depth: usize,
}

impl TreeStats {
    pub fn of(tree: &[SolverNode]) -> Result<TreeStats, IkError> {
        let mut stats = TreeStats::default();
        walk_tree(tree, &mut stats)?;
        Ok(stats)
    }

    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }
}

pub fn node_kind(node: &SolverNode) -> &'static str {
    match node {
        SolverNode::Solution(_) => "solution",
        SolverNode::Branch(_) => "branch",
        SolverNode::FreeParameter { .. } => "free_parameter",
        SolverNode::SetJoint { .. } => "set_joint",
        SolverNode::Chain(_) => "chain",
        SolverNode::Rotation { .. } => "rotation",
        SolverNode::Sequence(_) => "sequence",
        SolverNode::StoreSolution { .. } => "store_solution",
    }
}

impl SolverVisitor for TreeStats {
    fn enter(&mut self, node: &SolverNode) -> Result<(), IkError> {
        *self.counts.entry(node_kind(node)).or_insert(0) += 1;
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        Ok(())
    }

    fn exit(&mut self, _node: &SolverNode) -> Result<(), IkError> {
        self.depth -= 1;
        Ok(())
    }
}

/// How a joint got its value on one path of the tree.
#[derive(Debug, Clone, PartialEq)]
enum Assigned {
    Expression,
    FreeParameter,
    Constant,
}

fn assign(
    map: &mut BTreeMap<String, Assigned>,
    name: &str,
    how: Assigned,
) -> Result<(), IkError> {
    if map.contains_key(name) {
        return Err(IkError::CodeGeneration(format!(
            "joint {} is assigned twice on one path",
            name
        )));
    }
    map.insert(name.to_string(), how);
    Ok(())
}

fn check_list(
    nodes: &[SolverNode],
    assigned: &mut BTreeMap<String, Assigned>,
) -> Result<usize, IkError> {
    let mut stores = 0;
    let mut local: Vec<String> = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        match node {
            SolverNode::Solution(s) => {
                assign(assigned, &s.name, Assigned::Expression)?;
                stores += check_list(&nodes[i + 1..], assigned)?;
                assigned.remove(&s.name);
                break;
            }
            SolverNode::SetJoint { name, .. } => {
                assign(assigned, name, Assigned::Constant)?;
                local.push(name.clone());
            }
            SolverNode::FreeParameter { name, tree } => {
                assign(assigned, name, Assigned::FreeParameter)?;
                stores += check_list(tree, assigned)?;
                assigned.remove(name);
            }
            SolverNode::Branch(b) => {
                for arm in &b.arms {
                    stores += check_list(&arm.tree, assigned)?;
                }
            }
            SolverNode::Sequence(children) => {
                for child in children {
                    stores += check_list(child, assigned)?;
                }
            }
            SolverNode::Rotation { tree, .. } => stores += check_list(tree, assigned)?,
            SolverNode::Chain(c) => {
                // free joints are normally bound by enclosing FreeParameter nodes
                let mut bound = Vec::new();
                for f in &c.free_vars {
                    if !assigned.contains_key(&f.name) {
                        assign(assigned, &f.name, Assigned::FreeParameter)?;
                        bound.push(f.name.clone());
                    }
                }
                stores += check_list(&c.tree, assigned)?;
                for name in bound {
                    assigned.remove(&name);
                }
            }
            SolverNode::StoreSolution { all_vars } => {
                let missing: Vec<String> = all_vars
                    .iter()
                    .filter(|v| !assigned.contains_key(*v))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(IkError::UnresolvableVariableSet { variables: missing });
                }
                stores += 1;
            }
        }
    }
    for name in local {
        assigned.remove(&name);
    }
    Ok(stores)
}

/// Verifies that every reachable `StoreSolution` sees each of its variables assigned
/// exactly once on its path. Returns the number of store leaves.
pub fn check_completeness(tree: &[SolverNode]) -> Result<usize, IkError> {
    let mut assigned = BTreeMap::new();
    let stores = check_list(tree, &mut assigned)?;
    if stores == 0 {
        return Err(IkError::CodeGeneration("solver tree stores no solution".to_string()));
    }
    Ok(stores)
}

/// Splits a solution that depends on the free joint `free` as `mul * free + offset`.
/// `None` when the solution does not depend on it affinely.
pub fn free_dependency(expr: &Expr, free: &str) -> Option<(Expr, Expr)> {
    expr.affine_in(free)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(vars: &[&str]) -> SolverNode {
        SolverNode::StoreSolution {
            all_vars: vars.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn sol(name: &str) -> SolverNode {
        SolverNode::Solution(SolverSolution::angles(name, vec![Expr::symbol("px")]))
    }

    #[test]
    fn test_branch_needs_one_trailing_default() {
        let arm = |v: Option<f64>| BranchArm { value: v, tree: vec![] };
        assert!(SolverBranch::new("j1", Expr::symbol("x"), vec![arm(Some(1.0)), arm(None)]).is_ok());
        assert!(SolverBranch::new("j1", Expr::symbol("x"), vec![arm(None), arm(Some(1.0))]).is_err());
        assert!(SolverBranch::new("j1", Expr::symbol("x"), vec![arm(Some(1.0))]).is_err());
        assert!(SolverBranch::new("j1", Expr::symbol("x"), vec![arm(None), arm(None)]).is_err());
    }

    #[test]
    fn test_completeness_ok_and_missing() {
        let tree = vec![sol("a"), sol("b"), store(&["a", "b"])];
        assert_eq!(check_completeness(&tree).unwrap(), 1);
        let missing = vec![sol("a"), store(&["a", "b"])];
        assert!(matches!(
            check_completeness(&missing),
            Err(IkError::UnresolvableVariableSet { .. })
        ));
        let twice = vec![sol("a"), sol("a"), store(&["a"])];
        assert!(check_completeness(&twice).is_err());
    }

    #[test]
    fn test_completeness_through_branches() {
        let branch = SolverBranch::new(
            "b",
            Expr::symbol("r00"),
            vec![
                BranchArm {
                    value: Some(1.0),
                    tree: vec![SolverNode::Sequence(vec![vec![
                        SolverNode::SetJoint { name: "b".to_string(), value: 0.0 },
                        SolverNode::FreeParameter {
                            name: "c".to_string(),
                            tree: vec![store(&["a", "b", "c"])],
                        },
                    ]])],
                },
                BranchArm {
                    value: None,
                    tree: vec![sol("b"), sol("c"), store(&["a", "b", "c"])],
                },
            ],
        )
        .unwrap();
        let tree = vec![sol("a"), SolverNode::Branch(branch)];
        assert_eq!(check_completeness(&tree).unwrap(), 2);
        let stats = TreeStats::of(&tree).unwrap();
        assert_eq!(stats.count("store_solution"), 2);
        assert_eq!(stats.count("branch"), 1);
        assert_eq!(stats.count("set_joint"), 1);
        assert!(stats.max_depth >= 3);
    }

    #[test]
    fn test_free_dependency() {
        let e = Expr::parse_expression("j6 + atan2(py, px)").unwrap();
        let (mul, offset) = free_dependency(&e, "j6").unwrap();
        assert_eq!(mul, Expr::one());
        assert_eq!(offset, Expr::parse_expression("atan2(py, px)").unwrap());
        let e = Expr::parse_expression("asin(sj6*px)").unwrap();
        assert!(free_dependency(&e, "sj6").is_none());
    }
}
