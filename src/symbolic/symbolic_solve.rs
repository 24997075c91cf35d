//! # Equation Solving Module
//!
//! Closed-form inversion of a single equation `expr = 0` for one symbol.
//!
//! `solve_transcendental` tries, in order:
//! 1. polynomial equations of degree at most two (linear and quadratic formula);
//! 2. peeling the expression layer by layer: sums and products with a single part that
//!    depends on the symbol, powers (even integer powers give both signs), and the
//!    inverse of every supported function;
//! 3. single substitution: when the symbol only occurs through one function or
//!    fractional power `g`, solve for `g` first and invert `g`; when it is a square
//!    root that shares the equation with bare occurrences of the symbol, isolate the
//!    root and square. Roots brought in by squaring whose residual in the original
//!    equation is numerically nonzero are dropped.
//!
//! An equation left without roots, or anything else, is `SymbolicError::UnsolvableEquation`, which the caller treats as
//! "try another equation".
use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use std::collections::{BTreeSet, HashMap};

const SUBSTITUTE: &str = "__u";
const RESIDUAL_TOLERANCE: f64 = 1e-8;

impl Expr {
    /// Degree of a single factor in `atom`; `None` when the atom occurs in any other way.
    fn atom_degree(&self, atom: &Expr) -> Option<usize> {
        if self == atom {
            return Some(1);
        }
        if let Expr::Power(b, e) = self {
            if b.as_ref() == atom {
                return match e.as_const() {
                    Some(n) if n.fract() == 0.0 && n >= 0.0 => Some(n as usize),
                    _ => None,
                };
            }
        }
        if self.contains_subexpr(atom) {
            None
        } else {
            Some(0)
        }
    }

    /// Splits one expanded term into (degree, coefficient) with respect to `atom`.
    fn divide_out(term: &Expr, atom: &Expr) -> Option<(usize, Expr)> {
        let (c, mono) = term.split_coefficient();
        let mut degree = 0;
        let mut rest = vec![Expr::constant(c)];
        for f in mono.factors() {
            match f.atom_degree(atom)? {
                0 => rest.push(f),
                d => degree += d,
            }
        }
        Some((degree, Expr::product(rest)))
    }

    /// Writes `self` as `sum_i coeff_i * atoms_i + rest` with every coefficient and the
    /// rest free of the atoms. `None` when some atom does not occur linearly.
    pub fn collect_linear(&self, atoms: &[Expr]) -> Option<(Vec<Expr>, Expr)> {
        let mut coeffs: Vec<Vec<Expr>> = vec![Vec::new(); atoms.len()];
        let mut rest: Vec<Expr> = Vec::new();
        for term in self.expand().terms() {
            let mut hit: Option<(usize, Expr)> = None;
            for (i, atom) in atoms.iter().enumerate() {
                let (degree, coeff) = Expr::divide_out(&term, atom)?;
                match degree {
                    0 => {}
                    1 if hit.is_none() => hit = Some((i, coeff)),
                    _ => return None,
                }
            }
            match hit {
                Some((i, coeff)) => {
                    if atoms.iter().any(|a| coeff.contains_subexpr(a)) {
                        return None;
                    }
                    coeffs[i].push(coeff)
                }
                None => rest.push(term),
            }
        }
        Some((coeffs.into_iter().map(Expr::sum).collect(), Expr::sum(rest)))
    }

    /// Coefficients `[c0, c1, ..]` of `self` as a polynomial in `atom`, trailing zero
    /// coefficients dropped. `None` when not polynomial or above `max_degree`.
    pub fn polynomial_coefficients(&self, atom: &Expr, max_degree: usize) -> Option<Vec<Expr>> {
        let mut buckets: Vec<Vec<Expr>> = vec![Vec::new(); max_degree + 1];
        for term in self.expand().terms() {
            let (degree, coeff) = Expr::divide_out(&term, atom)?;
            if degree > max_degree {
                return None;
            }
            buckets[degree].push(coeff);
        }
        let mut coeffs: Vec<Expr> = buckets.into_iter().map(Expr::sum).collect();
        while coeffs.len() > 1 && coeffs.last().is_some_and(Expr::is_zero) {
            coeffs.pop();
        }
        Some(coeffs)
    }

    /// Solves `self = 0` for `symbol`.
    pub fn solve_transcendental(&self, symbol: &str) -> Result<Vec<Expr>, SymbolicError> {
        let unsolvable = || SymbolicError::UnsolvableEquation {
            equation: self.to_string(),
            symbol: symbol.to_string(),
        };
        let eq = self.expand();
        if !eq.contains_symbol(symbol) {
            return Err(unsolvable());
        }
        let x = Expr::symbol(symbol);
        if let Some(roots) = solve_polynomial(&eq, &x) {
            return Ok(roots);
        }
        if let Some(roots) = invert(&eq, Expr::zero(), symbol).filter(|r| !r.is_empty()) {
            return Ok(dedup(roots));
        }
        match solve_by_substitution(&eq, symbol) {
            Some(roots) if !roots.is_empty() => Ok(dedup(roots)),
            _ => Err(unsolvable()),
        }
    }
}

fn dedup(roots: Vec<Expr>) -> Vec<Expr> {
    let mut out: Vec<Expr> = Vec::with_capacity(roots.len());
    for r in roots {
        if !out.contains(&r) {
            out.push(r);
        }
    }
    out
}

/// Linear and quadratic equations in `atom`.
fn solve_polynomial(eq: &Expr, atom: &Expr) -> Option<Vec<Expr>> {
    let coeffs = eq.polynomial_coefficients(atom, 2)?;
    match coeffs.len() {
        2 => Some(vec![-coeffs[0].clone() / coeffs[1].clone()]),
        3 => {
            let (a, b, c) = (&coeffs[2], &coeffs[1], &coeffs[0]);
            let disc = (b.clone().powi(2) - a.clone() * c.clone() * 4.0).expand();
            if disc.as_const().is_some_and(|d| d < 0.0) {
                return None;
            }
            let root = disc.sqrt();
            let denom = (a.clone() * 2.0).powi(-1);
            Some(dedup(vec![
                (-b.clone() + root.clone()) * denom.clone(),
                (-b.clone() - root) * denom,
            ]))
        }
        _ => None,
    }
}

/// Peels `lhs = rhs` down to the symbol.
fn invert(lhs: &Expr, rhs: Expr, symbol: &str) -> Option<Vec<Expr>> {
    match lhs {
        Expr::Symbol(s) if s == symbol => Some(vec![rhs]),
        Expr::Sum(terms) => {
            let (dep, indep): (Vec<Expr>, Vec<Expr>) =
                terms.iter().cloned().partition(|t| t.contains_symbol(symbol));
            if dep.len() != 1 {
                return None;
            }
            invert(&dep[0], rhs - Expr::sum(indep), symbol)
        }
        Expr::Product(factors) => {
            let (dep, indep): (Vec<Expr>, Vec<Expr>) =
                factors.iter().cloned().partition(|t| t.contains_symbol(symbol));
            if dep.len() != 1 {
                return None;
            }
            invert(&dep[0], rhs / Expr::product(indep), symbol)
        }
        Expr::Power(b, e) => {
            if e.contains_symbol(symbol) {
                return None;
            }
            match e.as_const() {
                // an even root is never negative
                Some(n) if is_even_root(n) && rhs.as_const().is_some_and(|r| r < 0.0) => {
                    Some(Vec::new())
                }
                Some(n) if n.fract() == 0.0 && (n as i64) % 2 == 0 => {
                    let r = rhs.pow(Expr::constant(1.0 / n));
                    let mut out = invert(b, r.clone(), symbol)?;
                    out.extend(invert(b, -r, symbol)?);
                    Some(out)
                }
                _ => invert(b, rhs.pow(e.as_ref().clone().powi(-1)), symbol),
            }
        }
        Expr::Function(kind, args) if args.len() == 1 => {
            let candidates = match kind {
                FuncKind::Sin => vec![rhs.clone().asin(), Expr::pi() - rhs.asin()],
                FuncKind::Cos => vec![rhs.clone().acos(), -rhs.acos()],
                FuncKind::Tan => vec![Expr::atan2(rhs, Expr::one())],
                FuncKind::Cot => vec![Expr::atan2(Expr::one(), rhs)],
                FuncKind::Asin => vec![rhs.sin()],
                FuncKind::Acos => vec![rhs.cos()],
                FuncKind::Abs => vec![rhs.clone(), -rhs],
                FuncKind::Atan2 => return None,
            };
            let mut out = Vec::new();
            for c in candidates {
                out.extend(invert(&args[0], c, symbol)?);
            }
            Some(out)
        }
        _ => None,
    }
}

/// `b^n` is a square, fourth, .. root
fn is_even_root(n: f64) -> bool {
    n > 0.0 && n < 1.0 && {
        let k = 1.0 / n;
        k.fract() == 0.0 && (k as i64) % 2 == 0
    }
}

/// True when `root` is numeric and does not satisfy `eq`.
fn is_spurious(eq: &Expr, symbol: &str, root: &Expr) -> bool {
    let value = match root.eval(&HashMap::new()) {
        Ok(v) => v,
        Err(SymbolicError::DomainAbort(_)) => return true,
        Err(_) => return false,
    };
    match eq.eval_with(&[(symbol, value)]) {
        Ok(residual) => residual.abs() > RESIDUAL_TOLERANCE * (1.0 + value.abs()),
        Err(SymbolicError::DomainAbort(_)) => true,
        Err(_) => false,
    }
}

/// Outermost function or fractional-power nodes that contain the symbol.
fn generators(e: &Expr, symbol: &str, out: &mut BTreeSet<Expr>) {
    if !e.contains_symbol(symbol) {
        return;
    }
    match e {
        Expr::Function(_, _) => {
            out.insert(e.clone());
        }
        Expr::Power(b, x) => {
            let fractional = x.as_const().is_none_or(|n| n.fract() != 0.0);
            if fractional {
                out.insert(e.clone());
            } else {
                generators(b, symbol, out);
            }
        }
        Expr::Sum(v) | Expr::Product(v) => v.iter().for_each(|c| generators(c, symbol, out)),
        Expr::Const(_) | Expr::Symbol(_) => {}
    }
}

fn solve_by_substitution(eq: &Expr, symbol: &str) -> Option<Vec<Expr>> {
    let mut gens = BTreeSet::new();
    generators(eq, symbol, &mut gens);
    if gens.len() != 1 {
        return None;
    }
    let g = gens.into_iter().next()?;
    let u = Expr::symbol(SUBSTITUTE);
    let reduced = eq.replace_all(&[(g.clone(), u.clone())]);
    if !reduced.contains_symbol(symbol) {
        let inner = solve_polynomial(&reduced, &u).or_else(|| invert(&reduced, Expr::zero(), SUBSTITUTE))?;
        let mut out = Vec::new();
        for value in inner {
            out.extend(invert(&g, value, symbol)?);
        }
        return Some(out);
    }
    // A*sqrt(b) + B = 0 with A, B depending on the symbol: A^2*b - B^2 = 0
    if let Expr::Power(b, e) = &g {
        if e.as_const() == Some(0.5) {
            let (coeffs, rest) = eq.collect_linear(&[g.clone()])?;
            let squared = (coeffs[0].clone().powi(2) * b.as_ref().clone() - rest.powi(2)).expand();
            let roots = solve_polynomial(&squared, &Expr::symbol(symbol))?;
            return Some(roots.into_iter().filter(|r| !is_spurious(eq, symbol, r)).collect());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn sym(s: &str) -> Expr {
        Expr::symbol(s)
    }

    fn check_roots(eq: &Expr, symbol: &str, roots: &[Expr], env: &[(&str, f64)]) {
        let mut map: HashMap<String, f64> = env.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        for r in roots {
            let v = r.eval(&map).unwrap();
            map.insert(symbol.to_string(), v);
            assert_relative_eq!(eq.eval(&map).unwrap(), 0.0, epsilon = 1e-8);
            map.remove(symbol);
        }
    }

    #[test]
    fn test_collect_linear() {
        let (s, c, a, b) = (sym("s"), sym("c"), sym("a"), sym("b"));
        let e = a.clone() * s.clone() + b.clone() * c.clone() * 2.0 + a.clone() * b.clone();
        let (coeffs, rest) = e.collect_linear(&[s.clone(), c.clone()]).unwrap();
        assert_eq!(coeffs[0], a.clone());
        assert_eq!(coeffs[1], b.clone() * 2.0);
        assert_eq!(rest, a.clone() * b.clone());
        // s*c is not linear in (s, c)
        assert!((s.clone() * c.clone()).collect_linear(&[s.clone(), c.clone()]).is_none());
        assert!(s.clone().powi(2).collect_linear(&[s]).is_none());
    }

    #[test]
    fn test_polynomial_coefficients() {
        let x = sym("x");
        let e = (x.clone() + 1.0).powi(2);
        let c = e.polynomial_coefficients(&x, 2).unwrap();
        assert_eq!(c, vec![Expr::one(), Expr::constant(2.0), Expr::one()]);
        assert!(x.clone().powi(3).polynomial_coefficients(&x, 2).is_none());
        assert!(x.clone().sin().polynomial_coefficients(&x, 2).is_none());
    }

    #[test]
    fn test_linear_and_quadratic() {
        let (x, a) = (sym("x"), sym("a"));
        let lin = a.clone() * x.clone() - 3.0;
        let roots = lin.solve_transcendental("x").unwrap();
        assert_eq!(roots.len(), 1);
        check_roots(&lin, "x", &roots, &[("a", 2.0)]);
        let quad = x.clone().powi(2) - x.clone() * 3.0 + 2.0;
        let roots = quad.solve_transcendental("x").unwrap();
        assert_eq!(roots.len(), 2);
        check_roots(&quad, "x", &roots, &[]);
    }

    #[test]
    fn test_invert_functions() {
        let (x, a) = (sym("x"), sym("a"));
        let e = x.clone().sin() * 2.0 - a.clone();
        let roots = e.solve_transcendental("x").unwrap();
        assert_eq!(roots.len(), 2);
        check_roots(&e, "x", &roots, &[("a", 0.6)]);
        let e = x.clone().cos() + a.clone();
        let roots = e.solve_transcendental("x").unwrap();
        assert_eq!(roots.len(), 2);
        check_roots(&e, "x", &roots, &[("a", -0.3)]);
        let e = (x.clone() * 2.0 + 1.0).sqrt() - 3.0;
        let roots = e.solve_transcendental("x").unwrap();
        check_roots(&e, "x", &roots, &[]);
        assert_relative_eq!(roots[0].as_const().unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sqrt_isolation() {
        // c + 2*sqrt(1 - c^2) - 1 = 0
        let c = sym("c");
        let e = c.clone() + (Expr::one() - c.clone().powi(2)).sqrt() * 2.0 - 1.0;
        let roots = e.solve_transcendental("c").unwrap();
        assert!(!roots.is_empty());
        // squaring may add roots; the genuine one c = 1 must be there
        let mut found = false;
        for r in &roots {
            let v = r.eval(&HashMap::new()).unwrap();
            if (v - 1.0).abs() < 1e-9 {
                found = true;
            }
        }
        assert!(found);
    }

    #[test]
    fn test_sqrt_roots_are_checked() {
        let x = sym("x");
        // a square root cannot equal -1
        let e = x.clone().sqrt() + 1.0;
        assert!(matches!(
            e.solve_transcendental("x"),
            Err(SymbolicError::UnsolvableEquation { .. })
        ));
        // squaring gives x = 1 and x = 4; only x = 1 satisfies sqrt(x) + x - 2 = 0
        let e = x.clone().sqrt() + x.clone() - 2.0;
        let roots = e.solve_transcendental("x").unwrap();
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0].eval(&HashMap::new()).unwrap(), 1.0, epsilon = 1e-12);
        check_roots(&e, "x", &roots, &[]);
        // symbolic roots cannot be checked and are kept
        let (a, c) = (sym("a"), sym("c"));
        let e = c.clone() + (Expr::one() - c.clone().powi(2)).sqrt() * a.clone() - 1.0;
        assert!(!e.solve_transcendental("c").unwrap().is_empty());
    }

    #[test]
    fn test_unsolvable() {
        let x = sym("x");
        let e = x.clone().sin() + x.clone().cos().powi(3) * x.clone();
        let err = e.solve_transcendental("x").unwrap_err();
        assert!(matches!(err, SymbolicError::UnsolvableEquation { .. }));
        assert!(sym("y").solve_transcendental("x").is_err());
    }
}
