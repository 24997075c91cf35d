//! # Pattern Matching Module
//!
//! Structural matching of normalized expressions against templates with wildcards.
//!
//! A template is a `Pattern`: the same shape as `Expr` but with `Wild` leaves that bind
//! to any subexpression. Sums and products are commutative, so their children are
//! matched by a bounded backtracking search over term (factor) assignment. Inside
//! one commutative node, one bare wildcard may act as the "rest": it absorbs all
//! leftover terms (factors), or 0 (1) when nothing is left.
//!
//! A failed match is `None`; callers simply move on to the next template.
//!
//! # Examples
//! ```rust, ignore
//! use RustedIK::symbolic::symbolic_pattern::Pattern;
//! let a = Pattern::wild_excluding("a", &["q"]);
//! let b = Pattern::wild_excluding("b", &["q"]);
//! let template = a * Pattern::exact(Expr::symbol("q")) + b;
//! let bindings = expr.matches(&template);
//! ```
use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use std::collections::BTreeMap;

/// wildcard name -> bound expression
pub type Bindings = BTreeMap<String, Expr>;

#[derive(Debug, Clone, PartialEq)]
pub struct Wildcard {
    pub name: String,
    /// symbols the bound expression must not contain
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wild(Wildcard),
    Exact(Expr),
    Sum(Vec<Pattern>),
    Product(Vec<Pattern>),
    Power(Box<Pattern>, Box<Pattern>),
    Function(FuncKind, Vec<Pattern>),
}

impl Pattern {
    pub fn wild(name: &str) -> Pattern {
        Pattern::Wild(Wildcard {
            name: name.to_string(),
            exclude: Vec::new(),
        })
    }

    pub fn wild_excluding(name: &str, exclude: &[&str]) -> Pattern {
        Pattern::Wild(Wildcard {
            name: name.to_string(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn exact(e: Expr) -> Pattern {
        Pattern::Exact(e)
    }

    pub fn func(kind: FuncKind, args: Vec<Pattern>) -> Pattern {
        Pattern::Function(kind, args)
    }

    pub fn sin(self) -> Pattern {
        Pattern::Function(FuncKind::Sin, vec![self])
    }

    pub fn cos(self) -> Pattern {
        Pattern::Function(FuncKind::Cos, vec![self])
    }

    pub fn pow(self, exp: Pattern) -> Pattern {
        Pattern::Power(Box::new(self), Box::new(exp))
    }

    fn is_bare_wild(&self) -> bool {
        matches!(self, Pattern::Wild(_))
    }

    /// Matches `expr` against the template, extending the given bindings.
    pub fn match_with(&self, expr: &Expr, bindings: &Bindings) -> Option<Bindings> {
        match self {
            Pattern::Wild(w) => bind(w, expr, bindings),
            Pattern::Exact(x) => {
                if same_value(x, expr) {
                    Some(bindings.clone())
                } else {
                    None
                }
            }
            Pattern::Power(pb, pe) => match expr {
                Expr::Power(eb, ee) => {
                    let b = pb.match_with(eb, bindings)?;
                    pe.match_with(ee, &b)
                }
                _ => None,
            },
            Pattern::Function(kind, ps) => match expr {
                Expr::Function(k2, args) if k2 == kind && args.len() == ps.len() => {
                    let mut b = bindings.clone();
                    for (p, a) in ps.iter().zip(args) {
                        b = p.match_with(a, &b)?;
                    }
                    Some(b)
                }
                _ => None,
            },
            Pattern::Sum(ps) => match_sum(ps, expr, bindings),
            Pattern::Product(ps) => match_product(ps, expr, bindings),
        }
    }
}

fn same_value(a: &Expr, b: &Expr) -> bool {
    a == b || a.expand() == b.expand()
}

fn bind(w: &Wildcard, expr: &Expr, bindings: &Bindings) -> Option<Bindings> {
    if w.exclude.iter().any(|s| expr.contains_symbol(s)) {
        return None;
    }
    match bindings.get(&w.name) {
        Some(existing) => {
            if same_value(existing, expr) {
                Some(bindings.clone())
            } else {
                None
            }
        }
        None => {
            let mut b = bindings.clone();
            b.insert(w.name.clone(), expr.clone());
            Some(b)
        }
    }
}

/// Splits the children of a commutative template into the rest wildcard (the last
/// bare one) and the templates that must each consume exactly one item.
fn split_rest(ps: &[Pattern]) -> (Option<&Wildcard>, Vec<&Pattern>) {
    let rest_pos = ps.iter().rposition(Pattern::is_bare_wild);
    let rest = rest_pos.and_then(|i| match &ps[i] {
        Pattern::Wild(w) => Some(w),
        _ => None,
    });
    let others = ps
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != rest_pos)
        .map(|(_, p)| p)
        .collect();
    (rest, others)
}

/// Backtracking assignment of templates to distinct items.
fn assign<F>(
    ps: &[&Pattern],
    items: &[Expr],
    used: &mut Vec<bool>,
    bindings: &Bindings,
    finish: &F,
) -> Option<Bindings>
where
    F: Fn(&[bool], &Bindings) -> Option<Bindings>,
{
    let Some((first, rest)) = ps.split_first() else {
        return finish(used, bindings);
    };
    for i in 0..items.len() {
        if used[i] {
            continue;
        }
        if let Some(b) = first.match_with(&items[i], bindings) {
            used[i] = true;
            let found = assign(rest, items, used, &b, finish);
            used[i] = false;
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

fn leftovers(items: &[Expr], used: &[bool]) -> Vec<Expr> {
    items
        .iter()
        .zip(used)
        .filter(|(_, u)| !**u)
        .map(|(e, _)| e.clone())
        .collect()
}

fn match_sum(ps: &[Pattern], expr: &Expr, bindings: &Bindings) -> Option<Bindings> {
    let items = expr.terms();
    let (rest, others) = split_rest(ps);
    if others.len() > items.len() {
        return None;
    }
    let finish = |used: &[bool], b: &Bindings| {
        let left = leftovers(&items, used);
        match rest {
            Some(w) => bind(w, &Expr::sum(left), b),
            None if left.is_empty() => Some(b.clone()),
            None => None,
        }
    };
    let mut used = vec![false; items.len()];
    assign(&others, &items, &mut used, bindings, &finish)
}

fn match_product(ps: &[Pattern], expr: &Expr, bindings: &Bindings) -> Option<Bindings> {
    let (coeff, mono) = expr.split_coefficient();
    let items = mono.factors();
    // numeric factors of the template are compared through the coefficient ratio
    let mut pattern_coeff = 1.0;
    let mut structural: Vec<Pattern> = Vec::new();
    for p in ps {
        match p {
            Pattern::Exact(Expr::Const(c)) => pattern_coeff *= c,
            other => structural.push(other.clone()),
        }
    }
    if pattern_coeff == 0.0 {
        return if expr.is_zero() {
            Some(bindings.clone())
        } else {
            None
        };
    }
    let ratio = coeff / pattern_coeff;
    let (rest, others) = split_rest(&structural);
    if others.len() > items.len() {
        return None;
    }
    let finish = |used: &[bool], b: &Bindings| {
        let mut left = leftovers(&items, used);
        match rest {
            Some(w) => {
                left.push(Expr::constant(ratio));
                bind(w, &Expr::product(left), b)
            }
            None if left.is_empty() && (ratio - 1.0).abs() < 1e-12 => Some(b.clone()),
            None => None,
        }
    };
    let mut used = vec![false; items.len()];
    assign(&others, &items, &mut used, bindings, &finish)
}

impl std::ops::Add for Pattern {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let mut v = match self {
            Pattern::Sum(v) => v,
            p => vec![p],
        };
        match rhs {
            Pattern::Sum(w) => v.extend(w),
            p => v.push(p),
        }
        Pattern::Sum(v)
    }
}

impl std::ops::Mul for Pattern {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut v = match self {
            Pattern::Product(v) => v,
            p => vec![p],
        };
        match rhs {
            Pattern::Product(w) => v.extend(w),
            p => v.push(p),
        }
        Pattern::Product(v)
    }
}

impl std::ops::Neg for Pattern {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Pattern::Exact(Expr::Const(-1.0)) * self
    }
}

impl Expr {
    /// Matches this expression against a template.
    pub fn matches(&self, pattern: &Pattern) -> Option<Bindings> {
        pattern.match_with(self, &Bindings::new())
    }

    /// Splits `self` as `mul * var + offset` with `mul` and `offset` free of `var`.
    /// `None` when the dependence on `var` is not affine.
    pub fn affine_in(&self, var: &str) -> Option<(Expr, Expr)> {
        if !self.contains_symbol(var) {
            return Some((Expr::zero(), self.clone()));
        }
        let template = Pattern::wild_excluding("mul", &[var]) * Pattern::exact(Expr::symbol(var))
            + Pattern::wild_excluding("offset", &[var]);
        let b = self.matches(&template)?;
        let mul = b.get("mul")?.clone();
        let offset = b.get("offset")?.clone();
        Some((mul, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Expr {
        Expr::symbol(s)
    }

    #[test]
    fn test_wild_binds_anything() {
        let e = sym("x").sin() + 2.0;
        let b = e.matches(&Pattern::wild("w")).unwrap();
        assert_eq!(b["w"], e);
    }

    #[test]
    fn test_commutative_sum() {
        let (x, y) = (sym("x"), sym("y"));
        let e = x.clone().cos() * 4.0 + x.clone().sin() * 3.0;
        let tpl = Pattern::wild("a") * Pattern::wild("b").sin()
            + Pattern::wild("c") * Pattern::wild("b").cos();
        let b = e.matches(&tpl).unwrap();
        assert_eq!(b["a"], Expr::constant(3.0));
        assert_eq!(b["c"], Expr::constant(4.0));
        assert_eq!(b["b"], x.clone());
        // the same argument must bind consistently
        let e2 = x.sin() * 3.0 + y.cos() * 4.0;
        assert!(e2.matches(&tpl).is_none());
    }

    #[test]
    fn test_exclusion() {
        let (q, a) = (sym("q"), sym("a"));
        let tpl = Pattern::wild_excluding("m", &["q"]) * Pattern::exact(q.clone());
        assert!((a.clone() * q.clone()).matches(&tpl).is_some());
        assert!((q.clone() * q.clone().sin()).matches(&tpl).is_none());
    }

    #[test]
    fn test_rest_absorbs_leftovers() {
        let (a, b, c) = (sym("a"), sym("b"), sym("c"));
        let e = a.clone().sin() + b.clone() + c.clone();
        let tpl = Pattern::wild("s").sin() + Pattern::wild("r");
        let m = e.matches(&tpl).unwrap();
        assert_eq!(m["s"], a);
        assert_eq!(m["r"], b + c);
        // nothing left: rest binds zero
        let m0 = sym("z").sin().matches(&tpl).unwrap();
        assert!(m0["r"].is_zero());
    }

    #[test]
    fn test_negated_template() {
        let x = sym("x");
        let tpl = -Pattern::wild("u").sin();
        let m = (-x.clone().sin()).matches(&tpl).unwrap();
        assert_eq!(m["u"], x.clone());
        assert!(x.sin().matches(&tpl).is_none());
    }

    #[test]
    fn test_affine_in() {
        let (q, a, b) = (sym("q"), sym("a"), sym("b"));
        let e = q.clone() * 2.0 + a.clone() * b.clone();
        let (mul, offset) = e.affine_in("q").unwrap();
        assert_eq!(mul, Expr::constant(2.0));
        assert_eq!(offset, a.clone() * b.clone());
        let (mul, offset) = (-q.clone()).affine_in("q").unwrap();
        assert_eq!(mul, Expr::constant(-1.0));
        assert!(offset.is_zero());
        assert!(q.clone().sin().affine_in("q").is_none());
        assert!((q.clone() * q.clone()).affine_in("q").is_none());
        let (mul, _) = a.affine_in("q").unwrap();
        assert!(mul.is_zero());
    }
}
