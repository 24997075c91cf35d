//! What the generator and the evaluator both need to know about a solver tree before
//! walking it: the joints of the chain, which of them the caller supplies, and how a
//! solution found inside a degenerate branch depends on the joints left free there.
use crate::codegen::ik_runtime::IkValues;
use crate::ik::ik_errors::IkError;
use crate::ik::solver_tree::{JointRef, SolutionValues, SolverChain, SolverNode};
use crate::ik::variables::JointKind;
use crate::symbolic::symbolic_engine::Expr;
use log::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct ChainLayout {
    /// every joint, in chain order; solution records follow this order
    pub joints: Vec<JointRef>,
    /// joints supplied through `pfree`, in `pfree` order
    pub free: Vec<JointRef>,
}

fn find_chain(nodes: &[SolverNode]) -> Option<&SolverChain> {
    nodes.iter().find_map(|n| match n {
        SolverNode::Chain(c) => Some(c),
        SolverNode::FreeParameter { tree, .. } => find_chain(tree),
        _ => None,
    })
}

impl ChainLayout {
    pub fn of(tree: &[SolverNode]) -> Result<ChainLayout, IkError> {
        let chain = find_chain(tree)
            .ok_or_else(|| IkError::CodeGeneration("solver tree has no chain node".to_string()))?;
        Ok(ChainLayout {
            joints: chain.joints(),
            free: chain.free_vars.clone(),
        })
    }

    /// index into `pfree` of a caller-supplied joint
    pub fn pfree_index(&self, name: &str) -> Option<usize> {
        self.free.iter().position(|j| j.name == name)
    }

    /// position of a joint in the solution record
    pub fn record_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    pub fn is_hinge(&self, name: &str) -> bool {
        self.joints
            .iter()
            .find(|j| j.name == name)
            .is_none_or(|j| j.kind == JointKind::Hinge)
    }

    /// free parameter chain indices, as reported by `get_free_parameters`
    pub fn free_indices(&self) -> Vec<usize> {
        self.free.iter().map(|j| j.chain_index).collect()
    }
}

/// Names of the twelve pose symbols a chain node defines.
pub fn pose_names() -> Vec<String> {
    let mut names: Vec<String> = (0..9).map(|i| format!("r{}{}", i / 3, i % 3)).collect();
    names.extend(["px", "py", "pz"].map(String::from));
    names
}

/// Names the raw input pose binds: rotation row major, then translation.
pub fn raw_pose_names() -> Vec<String> {
    pose_names().into_iter().map(|n| format!("ee_{}", n)).collect()
}

pub fn values_form(values: &SolutionValues) -> IkValues {
    match values {
        SolutionValues::Angles(_) => IkValues::Angles,
        SolutionValues::Cosines(_) => IkValues::Cosines,
        SolutionValues::Sines(_) => IkValues::Sines,
    }
}

fn alias_names(free: &str) -> [String; 4] {
    [
        free.to_string(),
        format!("s{}", free),
        format!("c{}", free),
        format!("t{}", free),
    ]
}

/// How a solution follows a joint left free by an enclosing degenerate branch:
/// `(position on the free stack, multiplier)`. `None` when it does not depend on any,
/// or when the dependence is not `mul * free + offset` with a numeric `mul`; the
/// latter is logged and the solution is then recorded at the free joint's zero.
pub fn free_dependence(name: &str, values: &SolutionValues, stack: &[String]) -> Option<(usize, f64)> {
    for (pos, free) in stack.iter().enumerate().rev() {
        let aliases = alias_names(free);
        let exprs = values.exprs();
        if !exprs.iter().any(|e| e.contains_any_symbol(&aliases)) {
            continue;
        }
        let affine = || -> Option<f64> {
            if !matches!(values, SolutionValues::Angles(_)) {
                return None;
            }
            let var = Expr::symbol(free);
            let pairs = [
                (Expr::symbol(&aliases[1]), var.clone().sin()),
                (Expr::symbol(&aliases[2]), var.clone().cos()),
                (Expr::symbol(&aliases[3]), var.clone().tan()),
            ];
            let mut mul: Option<f64> = None;
            for e in exprs {
                let (m, _offset) = e.replace_all(&pairs).affine_in(free)?;
                let m = m.as_const()?;
                match mul {
                    Some(prev) if prev != m => return None,
                    _ => mul = Some(m),
                }
            }
            mul
        };
        return match affine() {
            Some(m) => Some((pos, m)),
            None => {
                warn!(
                    "{} depends on the free joint {} but not affinely; recorded as independent",
                    name, free
                );
                None
            }
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_names() {
        assert_eq!(pose_names()[4], "r11");
        assert_eq!(pose_names()[11], "pz");
        assert_eq!(raw_pose_names()[9], "ee_px");
    }

    #[test]
    fn test_free_dependence() {
        let stack = vec!["j0".to_string(), "j3".to_string()];
        let affine = SolutionValues::Angles(vec![
            Expr::parse_expression("-j3 - atan2(new_r12, new_r11) - 3.141592653589793").unwrap(),
        ]);
        assert_eq!(free_dependence("j5", &affine, &stack), Some((1, -1.0)));
        let independent = SolutionValues::Angles(vec![Expr::parse_expression("atan2(py, px)").unwrap()]);
        assert_eq!(free_dependence("j5", &independent, &stack), None);
        let curved = SolutionValues::Angles(vec![Expr::parse_expression("atan2(sj3*px, py)").unwrap()]);
        assert_eq!(free_dependence("j5", &curved, &stack), None);
        let cosines = SolutionValues::Cosines(vec![Expr::parse_expression("cj0*px").unwrap()]);
        assert_eq!(free_dependence("j5", &cosines, &stack), None);
    }
}
