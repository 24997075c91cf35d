//! # Translation strategy
//!
//! Solves the joints that position the chain from the equalities
//! `accum_right_all[i].t = (accum_left_inv_all[i] * Tee).t`, one per split point `i`.
//!
//! The squared length of both sides removes every rotation in front of the split, so
//! a length equation is tried first. After that, each round collects for every
//! unresolved joint the component equations in which it is the only unresolved joint,
//! solves it (a pair of equations when possible, otherwise a single one) and keeps the
//! lowest-scoring joint. Solved joints stay in the equations as known aliases.
use crate::ik::ik_errors::IkError;
use crate::ik::kinematics::ChainEquations;
use crate::ik::solver_tree::{SolverNode, SolverTree};
use crate::ik::trig_equations::{Candidate, best_candidate, solve_from_equations, unique_equations};
use crate::ik::variables::{JointVariable, VariableRegistry};
use crate::symbolic::symbolic_engine::Expr;
use log::{debug, info};

/// Translation of the chain and of the target at one split point.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEquation {
    pub chain: [Expr; 3],
    pub target: [Expr; 3],
}

impl PositionEquation {
    /// Equations for the split points `0..count`.
    pub fn at_splits(eqs: &ChainEquations, count: usize) -> Vec<PositionEquation> {
        let tee = ChainEquations::target();
        (0..count.min(eqs.accum_right_all.len()))
            .map(|i| {
                let target = eqs.accum_left_inv_all[i].mul(&tee);
                PositionEquation {
                    chain: eqs.accum_right_all[i].trans.clone(),
                    target: std::array::from_fn(|j| eqs.registry.simplify(&target.trans[j])),
                }
            })
            .collect()
    }

    /// Moves numeric terms present on both sides to the side with fewer terms.
    fn shift_constants(&mut self) {
        for j in 0..3 {
            let (p, pee) = (&self.chain[j], &self.target[j]);
            let constants = |e: &Expr| -> Option<Vec<Expr>> {
                match e {
                    Expr::Sum(terms) => Some(terms.iter().filter(|t| t.is_number()).cloned().collect()),
                    _ if e.is_number() => Some(vec![e.clone()]),
                    _ => None,
                }
            };
            let (Some(pc), Some(peec)) = (constants(p), constants(pee)) else {
                continue;
            };
            if pc.is_empty() || peec.is_empty() {
                continue;
            }
            let moved = if p.terms().len() < pee.terms().len() { peec } else { pc };
            let shift = Expr::sum(moved);
            self.chain[j] = self.chain[j].clone() - shift.clone();
            self.target[j] = self.target[j].clone() - shift;
        }
    }

    fn squared_length(v: &[Expr; 3], registry: &VariableRegistry) -> Expr {
        let sum = Expr::sum(v.iter().map(|e| e.clone().powi(2)).collect());
        registry.simplify(&sum)
    }
}

pub struct TranslationSolver<'a> {
    registry: &'a VariableRegistry,
    lengths: Vec<Expr>,
    components: Vec<Expr>,
}

impl<'a> TranslationSolver<'a> {
    pub fn new(registry: &'a VariableRegistry, mut positions: Vec<PositionEquation>) -> Self {
        positions.iter_mut().for_each(PositionEquation::shift_constants);
        let lengths = positions
            .iter()
            .map(|p| {
                let l = PositionEquation::squared_length(&p.chain, registry)
                    - PositionEquation::squared_length(&p.target, registry);
                registry.simplify(&l)
            })
            .filter(|e| !e.is_zero())
            .collect();
        let components = positions
            .iter()
            .flat_map(|p| (0..3).map(move |j| (p.chain[j].clone() - p.target[j].clone()).expand()))
            .filter(|e| !e.is_zero())
            .collect();
        TranslationSolver {
            registry,
            lengths,
            components,
        }
    }

    /// Equations mentioning `var` and none of the other unresolved joints.
    fn isolating(&self, eqs: &[Expr], var: &JointVariable, unresolved: &[&JointVariable]) -> Vec<Expr> {
        let picked = eqs
            .iter()
            .filter(|e| var.appears_in(e))
            .filter(|e| {
                unresolved
                    .iter()
                    .all(|o| o.name == var.name || !o.appears_in(e))
            })
            .cloned()
            .collect();
        unique_equations(picked)
    }

    fn candidates(&self, eqs: &[Expr], unresolved: &[&JointVariable]) -> Vec<Candidate> {
        unresolved
            .iter()
            .flat_map(|var| {
                let own = self.isolating(eqs, var, unresolved);
                solve_from_equations(&own, var, self.registry)
            })
            .collect()
    }

    /// Solutions for `vars` in the order they can be computed.
    pub fn solve(&self, vars: &[&JointVariable]) -> Result<SolverTree, IkError> {
        let mut unresolved: Vec<&JointVariable> = vars.to_vec();
        let mut tree = Vec::new();
        let mut take = |candidate: Candidate, unresolved: &mut Vec<&JointVariable>, how: &str| {
            info!(
                "{} solved from {} with {} value(s)",
                candidate.solution.name,
                how,
                candidate.solution.values.candidate_count()
            );
            unresolved.retain(|v| v.name != candidate.solution.name);
            tree.push(SolverNode::Solution(candidate.solution));
        };
        if let Some(best) = best_candidate(self.candidates(&self.lengths, &unresolved)) {
            take(best, &mut unresolved, "translation length");
        } else {
            debug!("no joint follows from the translation length");
        }
        while !unresolved.is_empty() {
            match best_candidate(self.candidates(&self.components, &unresolved)) {
                Some(best) => take(best, &mut unresolved, "translation"),
                None => break,
            }
        }
        if !unresolved.is_empty() {
            return Err(IkError::NoSeparationPoint {
                variables: unresolved.iter().map(|v| v.name.clone()).collect(),
            });
        }
        Ok(tree)
    }
}

/// Translation equations of a pure positioning chain over every split point.
pub fn solve_translation_chain(eqs: &ChainEquations, vars: &[&JointVariable]) -> Result<SolverTree, IkError> {
    let positions = PositionEquation::at_splits(eqs, eqs.links.len());
    TranslationSolver::new(&eqs.registry, positions).solve(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ik::ik_solver::IkMode;
    use crate::ik::kinematics::{ChainJoint, KinematicChain, translation};
    use crate::ik::solver_tree::SolutionValues;
    use nalgebra::Vector3;

    fn planar() -> KinematicChain {
        KinematicChain::new(vec![
            ChainJoint::hinge(Vector3::z()),
            ChainJoint::hinge(Vector3::z())
                .with_left(translation(1.0, 0.0, 0.0))
                .with_right(translation(0.5, 0.0, 0.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_constants_move_to_shorter_side() {
        let mut p = PositionEquation {
            chain: [Expr::parse_expression("0.5 + a*cj0").unwrap(), Expr::zero(), Expr::zero()],
            target: [Expr::parse_expression("px - 2 + b + c").unwrap(), Expr::zero(), Expr::zero()],
        };
        p.shift_constants();
        assert_eq!(p.target[0], Expr::parse_expression("px + b + c").unwrap());
        assert_eq!(p.chain[0], Expr::parse_expression("2.5 + a*cj0").unwrap());
    }

    #[test]
    fn test_planar_elbow_from_length() {
        let chain = planar();
        let eqs = chain.build_equations(IkMode::Translation).unwrap();
        let vars = eqs.registry.solve_vars();
        let tree = solve_translation_chain(&eqs, &vars).unwrap();
        assert_eq!(tree.len(), 2);
        match &tree[0] {
            SolverNode::Solution(s) => {
                assert_eq!(s.name, "j1");
                assert!(matches!(s.values, SolutionValues::Cosines(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &tree[1] {
            SolverNode::Solution(s) => {
                assert_eq!(s.name, "j0");
                assert_eq!(s.values.candidate_count(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unseparable_joint_is_reported() {
        // the second joint only turns the end about its own axis, which no position shows
        let chain = KinematicChain::new(vec![
            ChainJoint::hinge(Vector3::z()).with_right(translation(1.0, 0.0, 0.0)),
            ChainJoint::hinge(Vector3::x()),
        ])
        .unwrap();
        let eqs = chain.build_equations(IkMode::Translation).unwrap();
        let vars = eqs.registry.solve_vars();
        match solve_translation_chain(&eqs, &vars) {
            Err(IkError::NoSeparationPoint { variables }) => assert_eq!(variables, vec!["j1".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
