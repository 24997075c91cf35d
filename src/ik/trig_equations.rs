//! Equations in the sine and cosine of a single joint.
//!
//! Most equations the chain produces are linear in the aliases of the joint being
//! solved: `a*cq + b*sq + k = 0`. One such equation gives `-atan2(a, b) +- asin(..)` (or
//! a pure cosine or sine set when one coefficient vanishes); two of them determine `sq`
//! and `cq` together and give a single `atan2`. The Cramer determinant `d` of the pair is
//! multiplied into both atan2 arguments instead of dividing by it, so the quadrant is
//! kept without a division; when the sign of `d` is evident the factor is dropped.
use crate::ik::solver_tree::{SolutionValues, SolverSolution};
use crate::ik::variables::{JointKind, JointVariable, VariableRegistry};
use crate::symbolic::symbolic_engine::Expr;
use itertools::Itertools;
use log::debug;
use std::cmp::Ordering;

/// `cos * cq + sin * sq + rest = 0`
#[derive(Debug, Clone, PartialEq)]
pub struct TrigLinearForm {
    pub cos: Expr,
    pub sin: Expr,
    pub rest: Expr,
}

impl TrigLinearForm {
    pub fn of(eq: &Expr, var: &JointVariable) -> Option<TrigLinearForm> {
        if var.kind != JointKind::Hinge {
            return None;
        }
        let (coeffs, rest) = eq.collect_linear(&[var.cvar.clone(), var.svar.clone()])?;
        let form = TrigLinearForm {
            cos: coeffs[0].clone(),
            sin: coeffs[1].clone(),
            rest,
        };
        if form.cos.is_zero() && form.sin.is_zero() {
            return None;
        }
        if [&form.cos, &form.sin, &form.rest].iter().any(|e| var.appears_in(e)) {
            return None;
        }
        Some(form)
    }

    pub fn complexity(&self) -> usize {
        self.cos.complexity() + self.sin.complexity() + self.rest.complexity()
    }

    /// Solutions of the single equation.
    pub fn solve(&self, registry: &VariableRegistry) -> SolutionValues {
        let minus_rest = -self.rest.clone();
        if self.sin.is_zero() {
            let value = registry.simplify(&(minus_rest / self.cos.clone()));
            return SolutionValues::Cosines(vec![registry.fold_solution(&value)]);
        }
        if self.cos.is_zero() {
            let value = registry.simplify(&(minus_rest / self.sin.clone()));
            return SolutionValues::Sines(vec![registry.fold_solution(&value)]);
        }
        let norm = registry.simplify(&(self.cos.clone().powi(2) + self.sin.clone().powi(2)));
        let phase = -Expr::atan2(self.cos.clone(), self.sin.clone());
        let shift = (minus_rest * norm.powi(-1).sqrt()).asin();
        SolutionValues::Angles(vec![
            registry.fold_solution(&(phase.clone() + shift.clone())),
            registry.fold_solution(&(phase + Expr::pi() - shift)),
        ])
    }
}

/// Sign of `sum(sign_i * x_i * y_i)` when it follows from the shape of the terms alone.
fn manifest_sign(terms: &[(f64, &Expr, &Expr)]) -> Option<Ordering> {
    let mut result: Option<Ordering> = None;
    for &(sign, x, y) in terms {
        let term = if x.is_zero() || y.is_zero() {
            continue;
        } else if let (Some(a), Some(b)) = (x.as_const(), y.as_const()) {
            (sign * a * b).partial_cmp(&0.0)?
        } else if x == y {
            sign.partial_cmp(&0.0)?
        } else if (x.clone() + y.clone()).expand().is_zero() {
            (-sign).partial_cmp(&0.0)?
        } else {
            return None;
        };
        match (result, term) {
            (_, Ordering::Equal) => {}
            (None, t) => result = Some(t),
            (Some(r), t) if r == t => {}
            _ => return None,
        }
    }
    result
}

/// Determinant of the pair, simplified, and its evident sign if any.
fn determinant(
    f1: &TrigLinearForm,
    f2: &TrigLinearForm,
    registry: &VariableRegistry,
) -> (Expr, Option<Ordering>) {
    let raw = f1.cos.clone() * f2.sin.clone() - f2.cos.clone() * f1.sin.clone();
    let det = registry.simplify(&raw);
    let sign = match det.as_const() {
        Some(v) => v.partial_cmp(&0.0),
        None => manifest_sign(&[(1.0, &f1.cos, &f2.sin), (-1.0, &f2.cos, &f1.sin)]),
    };
    (det, sign)
}

/// Solves two equations jointly for `sq` and `cq`. `None` when they are dependent.
pub fn solve_pair(
    f1: &TrigLinearForm,
    f2: &TrigLinearForm,
    registry: &VariableRegistry,
) -> Option<Expr> {
    let (det, sign) = determinant(f1, f2, registry);
    if det.is_zero() {
        return None;
    }
    let num_cos = f2.rest.clone() * f1.sin.clone() - f1.rest.clone() * f2.sin.clone();
    let num_sin = f2.cos.clone() * f1.rest.clone() - f1.cos.clone() * f2.rest.clone();
    let (y, x) = match sign {
        Some(Ordering::Greater) => (num_sin, num_cos),
        Some(Ordering::Less) => (-num_sin, -num_cos),
        _ => (num_sin * det.clone(), num_cos * det),
    };
    let angle = Expr::atan2(registry.simplify(&y), registry.simplify(&x));
    Some(registry.fold_solution(&angle))
}

/// Best jointly solvable pair of forms, by combined complexity.
pub fn solve_best_pair(forms: &[TrigLinearForm], registry: &VariableRegistry) -> Option<Expr> {
    let mut pairs: Vec<(usize, usize, usize)> = (0..forms.len())
        .tuple_combinations()
        .map(|(i, j)| (forms[i].complexity() + forms[j].complexity(), i, j))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .find_map(|(_, i, j)| solve_pair(&forms[i], &forms[j], registry))
}

/// Equations not linear in the aliases: replace one alias by the root of its
/// complement (`cq = sqrt(1 - sq^2)` or the dual) and solve for the other.
pub fn solve_by_complement(
    eq: &Expr,
    var: &JointVariable,
    registry: &VariableRegistry,
) -> Vec<SolutionValues> {
    let mut out = Vec::new();
    let expanded = eq.expand();
    let count = |atom: &Expr| {
        expanded
            .terms()
            .iter()
            .filter(|t| t.contains_subexpr(atom))
            .count()
    };
    let substitutions = [
        (&var.cvar, &var.svar, var.sname(), true),
        (&var.svar, &var.cvar, var.cname(), false),
    ];
    for (replaced, kept, kept_name, gives_sines) in substitutions {
        if count(replaced) > 1 {
            continue;
        }
        let root = (Expr::one() - kept.clone().powi(2)).sqrt();
        let reduced = expanded.replace_all(&[(replaced.clone(), root)]);
        if reduced.contains_subexpr(&var.var) || reduced.contains_subexpr(&var.tvar) {
            continue;
        }
        match reduced.solve_transcendental(&kept_name) {
            Ok(roots) => {
                let roots: Vec<Expr> = roots
                    .iter()
                    .filter(|r| !var.appears_in(r))
                    .map(|r| registry.fold_solution(&registry.simplify(r)))
                    .collect();
                if roots.is_empty() {
                    continue;
                }
                debug!("{} solved through {} = sqrt(..)", var.name, replaced);
                out.push(if gives_sines {
                    SolutionValues::Sines(roots)
                } else {
                    SolutionValues::Cosines(roots)
                });
            }
            Err(e) => debug!("{}", e),
        }
    }
    out
}

/// Drops equations equal to an earlier one or to its negation.
pub fn unique_equations(eqs: Vec<Expr>) -> Vec<Expr> {
    let mut out: Vec<Expr> = Vec::with_capacity(eqs.len());
    for e in eqs {
        if e.is_zero() {
            continue;
        }
        let duplicate = out.iter().any(|x| {
            (e.clone() - x.clone()).expand().is_zero() || (e.clone() + x.clone()).expand().is_zero()
        });
        if !duplicate {
            out.push(e);
        }
    }
    out
}

/// A way to solve one joint, with the score used to pick among several.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub solution: SolverSolution,
}

impl Candidate {
    pub fn new(var: &JointVariable, values: SolutionValues) -> Candidate {
        Candidate {
            solution: SolverSolution {
                name: var.name.clone(),
                values,
                add_pi: false,
                kind: var.kind,
            },
        }
    }

    /// `1000 * number of values + total complexity`; lower is better
    pub fn score(&self) -> usize {
        1000 * self.solution.values.exprs().len() + self.solution.values.complexity()
    }
}

/// Lowest-scoring candidate, the first one on ties.
pub fn best_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().min_by_key(Candidate::score)
}

/// Every way to solve `var` from the given equations, each of which mentions no other
/// unresolved joint.
pub fn solve_from_equations(
    eqs: &[Expr],
    var: &JointVariable,
    registry: &VariableRegistry,
) -> Vec<Candidate> {
    if eqs.is_empty() {
        return Vec::new();
    }
    if var.kind == JointKind::Slider {
        let mut out: Vec<Candidate> = eqs
            .iter()
            .filter_map(|eq| eq.solve_transcendental(&var.name).ok())
            .filter(|roots| roots.iter().all(|r| !r.contains_subexpr(&var.var)))
            .map(|roots| {
                let roots = roots.iter().map(|r| registry.simplify(r)).collect();
                Candidate::new(var, SolutionValues::Angles(roots))
            })
            .collect();
        out.sort_by_key(Candidate::score);
        out.truncate(1);
        return out;
    }
    let mut forms: Vec<TrigLinearForm> = eqs
        .iter()
        .filter_map(|eq| TrigLinearForm::of(eq, var))
        .collect();
    forms.sort_by_key(TrigLinearForm::complexity);
    if forms.len() > 1 {
        if let Some(angle) = solve_best_pair(&forms, registry) {
            debug!("{} solved from an equation pair", var.name);
            return vec![Candidate::new(var, SolutionValues::Angles(vec![angle]))];
        }
    }
    if let Some(form) = forms.first() {
        return vec![Candidate::new(var, form.solve(registry))];
    }
    let mut by_complexity: Vec<&Expr> = eqs.iter().collect();
    by_complexity.sort_by_key(|e| e.complexity());
    for eq in by_complexity {
        let values = solve_by_complement(eq, var, registry);
        if !values.is_empty() {
            return values.into_iter().map(|v| Candidate::new(var, v)).collect();
        }
    }
    Vec::new()
}
