//! # Rotation strategy
//!
//! Solves the joints of the rotation part from the nine equalities
//! `R[i] = new_r_i`, where `R` is the rotation of the chain from the rotation index on
//! and `new_r` the target rotation with the already solved front of the chain moved out.
//!
//! Each round looks at every unresolved joint in two ways:
//! - standalone: the entries that mention no other unresolved joint, solved as a pair,
//!   or kept as a zero check when a single entry holds only the cosine or only the sine;
//! - quotient: two monomial entries `c1*G*sq` and `c2*G*cq` sharing the factor `G`
//!   give `atan2(new_r_i/c1, new_r_j/c2)`, up to a half turn when the sign of `G` is
//!   unknown because `G` still holds an unresolved joint.
//!
//! When neither gives an unconditional solution, a zero check turns into a branch on
//! the degenerate values of that joint, and without any quotient the first joint is
//! left as a free parameter.
use crate::ik::ik_errors::IkError;
use crate::ik::solver_tree::{
    BranchArm, SolverBranch, SolverNode, SolverSolution, SolverTree,
    rotation_target_names,
};
use crate::ik::trig_equations::{TrigLinearForm, solve_best_pair};
use crate::ik::variables::{JointVariable, VariableRegistry};
use crate::symbolic::symbolic_engine::Expr;
use log::{debug, info};
use std::f64::consts::{FRAC_PI_2, PI};

/// A joint whose cosine or sine alone is fixed by one entry.
#[derive(Debug, Clone, PartialEq)]
struct ZeroCheck {
    value: Expr,
    cosine: bool,
}

impl ZeroCheck {
    /// selector values with the joint value they force
    fn degenerate_values(&self) -> [(f64, f64); 2] {
        if self.cosine {
            [(-1.0, PI), (1.0, 0.0)]
        } else {
            [(-1.0, -FRAC_PI_2), (1.0, FRAC_PI_2)]
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Standalone {
    Solved(Expr),
    Check(ZeroCheck),
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
struct Quotient {
    angle: Expr,
    divisor: Expr,
    /// the common factor still holds an unresolved joint
    deferred: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Solved(SolverSolution),
    /// standalone solution while `divisor` vanishes, quotient otherwise
    Both {
        name: String,
        divisor: Expr,
        standalone: SolverSolution,
        quotient: SolverSolution,
    },
}

/// Coefficient, joint factor and common factor of a monomial entry.
fn monomial_parts(entry: &Expr, var: &JointVariable) -> Option<(f64, Expr, Expr)> {
    if matches!(entry, Expr::Sum(_)) || !var.appears_in(entry) {
        return None;
    }
    let (coeff, mono) = entry.split_coefficient();
    let (own, others): (Vec<Expr>, Vec<Expr>) =
        mono.factors().into_iter().partition(|f| var.appears_in(f));
    if own.len() != 1 || (own[0] != var.svar && own[0] != var.cvar) {
        return None;
    }
    Some((coeff, own[0].clone(), Expr::product(others)))
}

pub struct RotationSolver<'a> {
    registry: &'a VariableRegistry,
    /// symbols of every rotation joint, in all alias forms
    rotation_symbols: Vec<String>,
    end: SolverTree,
}

impl<'a> RotationSolver<'a> {
    /// `end` closes every path, normally a `StoreSolution`.
    pub fn new(registry: &'a VariableRegistry, vars: &[&JointVariable], end: SolverTree) -> Self {
        let rotation_symbols = vars
            .iter()
            .flat_map(|v| [v.name.clone(), v.sname(), v.cname(), format!("t{}", v.name)])
            .collect();
        RotationSolver {
            registry,
            rotation_symbols,
            end,
        }
    }

    fn targets() -> Vec<Expr> {
        rotation_target_names().iter().map(|n| Expr::symbol(n)).collect()
    }

    fn equations(r: &[Expr]) -> Vec<Expr> {
        r.iter()
            .zip(Self::targets())
            .map(|(e, t)| (e.clone() - t).expand())
            .collect()
    }

    fn standalone(&self, eqs: &[Expr], var: &JointVariable, vars: &[&JointVariable]) -> Standalone {
        let forms: Vec<TrigLinearForm> = eqs
            .iter()
            .filter(|e| var.appears_in(e))
            .filter(|e| vars.iter().all(|o| o.name == var.name || !o.appears_in(e)))
            .filter_map(|e| TrigLinearForm::of(e, var))
            .collect();
        if forms.len() >= 2 {
            if let Some(angle) = solve_best_pair(&forms, self.registry) {
                return Standalone::Solved(angle);
            }
        }
        let simplify = |e: Expr| self.registry.fold_solution(&self.registry.simplify(&e));
        if let Some(f) = forms.iter().find(|f| f.sin.is_zero()) {
            return Standalone::Check(ZeroCheck {
                value: simplify(-f.rest.clone() / f.cos.clone()),
                cosine: true,
            });
        }
        if let Some(f) = forms.iter().find(|f| f.cos.is_zero()) {
            return Standalone::Check(ZeroCheck {
                value: simplify(-f.rest.clone() / f.sin.clone()),
                cosine: false,
            });
        }
        Standalone::Nothing
    }

    fn quotient(&self, r: &[Expr], var: &JointVariable, vars: &[&JointVariable]) -> Option<Quotient> {
        let targets = Self::targets();
        let parts: Vec<(usize, (f64, Expr, Expr))> = r
            .iter()
            .enumerate()
            .filter_map(|(i, e)| monomial_parts(e, var).map(|p| (i, p)))
            .collect();
        for (i, (ci, fi, gi)) in &parts {
            if *fi != var.svar {
                continue;
            }
            for (j, (cj, fj, gj)) in &parts {
                if *fj != var.cvar || gi != gj {
                    continue;
                }
                let deferred = vars
                    .iter()
                    .any(|o| o.name != var.name && o.appears_in(gi));
                let (mut y, mut x) = (targets[*i].clone() / *ci, targets[*j].clone() / *cj);
                if !deferred && !gi.is_number() {
                    y = y * gi.clone();
                    x = x * gi.clone();
                }
                let angle = Expr::atan2(self.registry.simplify(&y), self.registry.simplify(&x));
                return Some(Quotient {
                    angle: self.registry.fold_solution(&angle),
                    divisor: gi.clone(),
                    deferred,
                });
            }
        }
        None
    }

    fn solution(var: &JointVariable, angle: Expr) -> SolverSolution {
        SolverSolution::angles(&var.name, vec![angle]).with_kind(var.kind)
    }

    /// Plan for `vars` given the chain rotation `r` (nine entries, row major).
    pub fn solve(&self, r: &[Expr], vars: &[&JointVariable]) -> Result<SolverTree, IkError> {
        if vars.is_empty() {
            return Ok(self.end.clone());
        }
        let eqs = Self::equations(r);
        let mut steps: Vec<Step> = Vec::new();
        let mut checks: Vec<(&JointVariable, ZeroCheck)> = Vec::new();
        let mut quotients: Vec<(&JointVariable, Quotient)> = Vec::new();
        for var in vars {
            let standalone = self.standalone(&eqs, var, vars);
            let quotient = self.quotient(r, var, vars);
            match (standalone, quotient) {
                (Standalone::Solved(s), Some(q)) if !q.deferred => {
                    if q.divisor.contains_any_symbol(&self.rotation_symbols) && q.angle != s {
                        steps.push(Step::Both {
                            name: format!("{}quot", var.name),
                            divisor: q.divisor.clone(),
                            standalone: Self::solution(var, s),
                            quotient: Self::solution(var, q.angle),
                        });
                    } else {
                        let best = if q.angle.complexity() < s.complexity() { q.angle } else { s };
                        steps.push(Step::Solved(Self::solution(var, best)));
                    }
                }
                (Standalone::Solved(s), _) => steps.push(Step::Solved(Self::solution(var, s))),
                (Standalone::Check(c), q) => {
                    checks.push((var, c));
                    if let Some(q) = q {
                        quotients.push((var, q));
                    }
                }
                (Standalone::Nothing, Some(q)) => quotients.push((var, q)),
                (Standalone::Nothing, None) => {}
            }
        }
        if !steps.is_empty() {
            for step in &steps {
                let name = match step {
                    Step::Solved(s) => &s.name,
                    Step::Both { standalone, .. } => &standalone.name,
                };
                info!("{} solved from the rotation", name);
            }
            return self.fold_steps(r, vars, steps);
        }
        let direct: Vec<Step> = quotients
            .iter()
            .filter(|(_, q)| !q.deferred)
            .map(|(v, q)| Step::Solved(Self::solution(v, q.angle.clone())))
            .collect();
        let next = if !direct.is_empty() {
            info!("{} joint(s) solved from rotation quotients", direct.len());
            self.fold_steps(r, vars, direct)?
        } else if let Some((var, q)) = quotients.first() {
            info!("{} solved from a rotation quotient up to a half turn", var.name);
            let step = Step::Solved(Self::solution(var, q.angle.clone()).with_add_pi());
            self.fold_steps(r, vars, vec![step])?
        } else {
            let var = vars[0];
            info!("{} becomes a free parameter of the rotation", var.name);
            let rest: Vec<&JointVariable> = vars[1..].to_vec();
            vec![SolverNode::FreeParameter {
                name: var.name.clone(),
                tree: self.solve(r, &rest)?,
            }]
        };
        match checks.into_iter().next() {
            Some((var, check)) => self.degenerate_branch(r, vars, var, check, next),
            None => Ok(next),
        }
    }

    /// Prepends the solved steps to the plan for the joints they leave.
    fn fold_steps(&self, r: &[Expr], vars: &[&JointVariable], steps: Vec<Step>) -> Result<SolverTree, IkError> {
        let rest: Vec<&JointVariable> = vars
            .iter()
            .filter(|v| !steps_contain(&steps, &v.name))
            .copied()
            .collect();
        let mut tree = self.solve(r, &rest)?;
        for step in steps.into_iter().rev() {
            tree = match step {
                Step::Solved(s) => {
                    let mut t = vec![SolverNode::Solution(s)];
                    t.extend(tree);
                    t
                }
                Step::Both {
                    name,
                    divisor,
                    standalone,
                    quotient,
                } => {
                    let arm = |s: SolverSolution, value: Option<f64>| {
                        let mut t = vec![SolverNode::Solution(s)];
                        t.extend(tree.iter().cloned());
                        BranchArm { value, tree: t }
                    };
                    let arms = vec![arm(standalone, Some(0.0)), arm(quotient, None)];
                    vec![SolverNode::Branch(SolverBranch::new(&name, divisor, arms)?)]
                }
            };
        }
        Ok(tree)
    }

    /// Branch on the degenerate values of `var`; `next` is taken otherwise.
    fn degenerate_branch(
        &self,
        r: &[Expr],
        vars: &[&JointVariable],
        var: &JointVariable,
        check: ZeroCheck,
        next: SolverTree,
    ) -> Result<SolverTree, IkError> {
        let rest: Vec<&JointVariable> = vars.iter().filter(|v| v.name != var.name).copied().collect();
        let mut arms = Vec::new();
        for (selector, value) in check.degenerate_values() {
            debug!("{} = {} when {} = {}", var.name, value, check.value, selector);
            let fixed = var.fixed(value);
            let reduced: Vec<Expr> = r
                .iter()
                .map(|e| self.registry.simplify(&e.substitute(&fixed)))
                .collect();
            let mut tree = vec![SolverNode::SetJoint {
                name: var.name.clone(),
                value,
            }];
            tree.extend(self.solve(&reduced, &rest)?);
            arms.push(BranchArm {
                value: Some(selector),
                tree: vec![SolverNode::Sequence(vec![tree])],
            });
        }
        arms.push(BranchArm { value: None, tree: next });
        Ok(vec![SolverNode::Branch(SolverBranch::new(&var.name, check.value, arms)?)])
    }
}

fn steps_contain(steps: &[Step], name: &str) -> bool {
    steps.iter().any(|s| match s {
        Step::Solved(s) => s.name == name,
        Step::Both { standalone, .. } => standalone.name == name,
    })
}
