//! # Symbolic Expression Normalization Module
//!
//! Normalizing constructors behind every `Expr` that the crate builds.
//!
//! ## Simplification Strategy
//!
//! 1. **Flattening**: nested sums and products are merged into one n-ary node
//! 2. **Constant Folding**: numeric parts are evaluated, functions of constants too when finite
//! 3. **Like Term Collection**: `3*x*y + 2*x*y` gives `5*x*y`, `x^2*x^a` gives `x^(2 + a)`
//! 4. **Chopping**: constants below 1e-10 vanish, coefficients are rounded at 1e-12
//! 5. **Ordering**: children are sorted by the total order on `Expr`
//! 6. **Symmetry**: `sin(-x) = -sin(x)`, `cos(-x) = cos(x)` and friends
//!
//! `expand` distributes products over sums and raises sums to small integer powers.
use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use std::collections::HashMap;

/// Largest integer power of a sum that `expand` multiplies out.
const MAX_EXPAND_POWER: f64 = 32.0;

/// Rounds numerical noise away: tiny values become zero, moderate values are
/// rounded to 12 decimals, negative zero becomes zero.
pub fn chop(v: f64) -> f64 {
    if !v.is_finite() {
        return v;
    }
    if v.abs() < 1e-10 {
        return 0.0;
    }
    let r = if v.abs() < 1e3 {
        (v * 1e12).round() / 1e12
    } else {
        v
    };
    if r == 0.0 { 0.0 } else { r }
}

fn is_integer(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0
}

/// a * b for every pair of terms
fn multiply_out(a: &[Expr], b: &[Expr]) -> Vec<Expr> {
    let mut out = Vec::with_capacity(a.len() * b.len());
    for x in a {
        for y in b {
            out.push(Expr::product(vec![x.clone(), y.clone()]));
        }
    }
    out
}

impl Expr {
    //___________________________________NORMALIZATION____________________________________

    /// Splits a term into its numeric coefficient and the remaining monomial.
    pub fn split_coefficient(&self) -> (f64, Expr) {
        match self {
            Expr::Const(c) => (*c, Expr::one()),
            Expr::Product(v) => match v.first() {
                Some(Expr::Const(c)) => {
                    let rest: Vec<Expr> = v[1..].to_vec();
                    let mono = if rest.len() == 1 {
                        rest[0].clone()
                    } else {
                        Expr::Product(rest)
                    };
                    (*c, mono)
                }
                _ => (1.0, self.clone()),
            },
            _ => (1.0, self.clone()),
        }
    }

    /// Inverse of `split_coefficient` for an already normalized monomial.
    fn scaled(monomial: Expr, c: f64) -> Expr {
        if c == 1.0 {
            return monomial;
        }
        match monomial {
            Expr::Const(m) => Expr::Const(chop(m * c)),
            Expr::Product(mut v) => {
                v.insert(0, Expr::Const(c));
                Expr::Product(v)
            }
            Expr::Sum(terms) => Expr::sum(terms.into_iter().map(|t| t * c).collect()),
            other => Expr::Product(vec![Expr::Const(c), other]),
        }
    }

    /// true when the expression reads as `-(something)`
    pub fn is_negated(&self) -> bool {
        match self {
            Expr::Const(c) => *c < 0.0,
            Expr::Product(_) => self.split_coefficient().0 < 0.0,
            Expr::Sum(terms) => terms.iter().all(|t| t.is_negated()),
            _ => false,
        }
    }

    /// Normalized sum of the given terms.
    pub fn sum(terms: Vec<Expr>) -> Expr {
        fn add_term(
            t: Expr,
            constant: &mut f64,
            order: &mut Vec<Expr>,
            coeffs: &mut HashMap<Expr, f64>,
        ) {
            match t {
                Expr::Const(c) => *constant += c,
                Expr::Sum(v) => {
                    for inner in v {
                        add_term(inner, constant, order, coeffs);
                    }
                }
                other => {
                    let (c, mono) = other.split_coefficient();
                    if let Expr::Sum(inner) = mono {
                        for it in inner {
                            add_term(it * c, constant, order, coeffs);
                        }
                        return;
                    }
                    match coeffs.get_mut(&mono) {
                        Some(acc) => *acc += c,
                        None => {
                            order.push(mono.clone());
                            coeffs.insert(mono, c);
                        }
                    }
                }
            }
        }

        let mut constant = 0.0;
        let mut order: Vec<Expr> = Vec::new();
        let mut coeffs: HashMap<Expr, f64> = HashMap::new();
        for t in terms {
            add_term(t, &mut constant, &mut order, &mut coeffs);
        }
        let mut out: Vec<Expr> = Vec::with_capacity(order.len() + 1);
        for mono in order {
            let c = chop(coeffs.get(&mono).copied().unwrap_or(0.0));
            if c != 0.0 {
                out.push(Expr::scaled(mono, c));
            }
        }
        let constant = chop(constant);
        if constant != 0.0 {
            out.push(Expr::Const(constant));
        }
        out.sort();
        match out.len() {
            0 => Expr::zero(),
            1 => out.pop().unwrap_or_else(Expr::zero),
            _ => Expr::Sum(out),
        }
    }

    /// Normalized product of the given factors.
    pub fn product(factors: Vec<Expr>) -> Expr {
        fn add_factor(
            f: Expr,
            coeff: &mut f64,
            order: &mut Vec<Expr>,
            exponents: &mut HashMap<Expr, Vec<Expr>>,
        ) {
            match f {
                Expr::Const(c) => *coeff *= c,
                Expr::Product(v) => {
                    for inner in v {
                        add_factor(inner, coeff, order, exponents);
                    }
                }
                other => {
                    let (base, exp) = match other {
                        Expr::Power(b, e) => (*b, *e),
                        o => (o, Expr::one()),
                    };
                    match exponents.get_mut(&base) {
                        Some(list) => list.push(exp),
                        None => {
                            order.push(base.clone());
                            exponents.insert(base, vec![exp]);
                        }
                    }
                }
            }
        }

        let mut coeff = 1.0;
        let mut order: Vec<Expr> = Vec::new();
        let mut exponents: HashMap<Expr, Vec<Expr>> = HashMap::new();
        for f in factors {
            add_factor(f, &mut coeff, &mut order, &mut exponents);
        }
        if chop(coeff) == 0.0 {
            return Expr::zero();
        }
        let mut pieces: Vec<Expr> = Vec::with_capacity(order.len());
        let mut renormalize = false;
        for base in order {
            let exps = exponents.remove(&base).unwrap_or_default();
            let exp = if exps.len() == 1 {
                exps.into_iter().next().unwrap_or_else(Expr::one)
            } else {
                Expr::sum(exps)
            };
            match Expr::power(base, exp) {
                Expr::Const(c) => coeff *= c,
                p @ Expr::Product(_) => {
                    renormalize = true;
                    pieces.push(p);
                }
                p => pieces.push(p),
            }
        }
        if renormalize {
            pieces.push(Expr::Const(coeff));
            return Expr::product(pieces);
        }
        let coeff = chop(coeff);
        if coeff == 0.0 {
            return Expr::zero();
        }
        pieces.sort();
        if pieces.is_empty() {
            return Expr::Const(coeff);
        }
        if pieces.len() == 1 {
            let single = pieces.pop().unwrap_or_else(Expr::one);
            if coeff == 1.0 {
                return single;
            }
            // numeric coefficients distribute over a lone sum
            if let Expr::Sum(terms) = single {
                return Expr::sum(terms.into_iter().map(|t| t * coeff).collect());
            }
            return Expr::Product(vec![Expr::Const(coeff), single]);
        }
        if coeff != 1.0 {
            pieces.insert(0, Expr::Const(coeff));
        }
        Expr::Product(pieces)
    }

    /// Normalized power.
    pub fn power(base: Expr, exp: Expr) -> Expr {
        if exp.is_zero() {
            return Expr::one();
        }
        if exp.is_one() {
            return base;
        }
        if base.is_one() {
            return Expr::one();
        }
        match (&base, &exp) {
            (Expr::Const(b), Expr::Const(e)) => {
                let v = b.powf(*e);
                if v.is_finite() && (*b >= 0.0 || is_integer(*e)) {
                    return Expr::Const(chop(v));
                }
            }
            (Expr::Power(b2, e2), Expr::Const(n)) if is_integer(*n) => {
                return Expr::power(b2.as_ref().clone(), e2.as_ref().clone() * *n);
            }
            (Expr::Product(v), Expr::Const(n)) if is_integer(*n) => {
                return Expr::product(
                    v.iter()
                        .map(|f| Expr::power(f.clone(), exp.clone()))
                        .collect(),
                );
            }
            _ => {}
        }
        Expr::Power(base.boxed(), exp.boxed())
    }

    /// Normalized function application.
    pub fn function(kind: FuncKind, args: Vec<Expr>) -> Expr {
        if args.iter().all(|a| matches!(a, Expr::Const(_))) {
            let vals: Vec<f64> = args.iter().filter_map(Expr::as_const).collect();
            if vals.len() == kind.arity() {
                let v = kind.evaluate(&vals);
                if v.is_finite() {
                    return Expr::Const(chop(v));
                }
            }
        }
        if kind.arity() == 1 && args.len() == 1 && args[0].is_negated() {
            let positive = -args[0].clone();
            return match kind {
                FuncKind::Sin | FuncKind::Tan | FuncKind::Cot | FuncKind::Asin => {
                    -Expr::function(kind, vec![positive])
                }
                FuncKind::Cos | FuncKind::Abs => Expr::function(kind, vec![positive]),
                _ => Expr::Function(kind, args),
            };
        }
        Expr::Function(kind, args)
    }

    //___________________________________EXPANSION____________________________________

    /// Distributes products over sums and multiplies out `sum^n` for small positive n.
    pub fn expand(&self) -> Expr {
        match self {
            Expr::Const(_) | Expr::Symbol(_) => self.clone(),
            Expr::Sum(v) => Expr::sum(v.iter().map(Expr::expand).collect()),
            Expr::Product(v) => Expr::expand_factors(v.iter().map(Expr::expand).collect()),
            Expr::Power(b, e) => {
                let b = b.expand();
                let e = e.expand();
                if let (Expr::Sum(terms), Expr::Const(n)) = (&b, &e) {
                    if is_integer(*n) && *n > 1.0 && *n <= MAX_EXPAND_POWER {
                        let mut acc = terms.clone();
                        for _ in 1..(*n as usize) {
                            acc = multiply_out(&acc, terms);
                        }
                        return Expr::sum(acc);
                    }
                }
                match Expr::power(b, e) {
                    Expr::Product(v) => {
                        Expr::expand_factors(v.iter().map(Expr::expand).collect())
                    }
                    other => other,
                }
            }
            Expr::Function(kind, args) => {
                Expr::function(*kind, args.iter().map(Expr::expand).collect())
            }
        }
    }

    fn expand_factors(factors: Vec<Expr>) -> Expr {
        let mut acc: Vec<Expr> = vec![Expr::one()];
        for f in factors {
            acc = multiply_out(&acc, &f.terms());
            if acc.is_empty() {
                return Expr::zero();
            }
        }
        Expr::sum(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Expr {
        Expr::symbol(s)
    }

    #[test]
    fn test_like_terms_collect() {
        let x = sym("x");
        let y = sym("y");
        let e = x.clone() * y.clone() * 3.0 + y.clone() * x.clone() * 2.0;
        assert_eq!(e, x * y * 5.0);
    }

    #[test]
    fn test_cancellation_gives_zero() {
        let x = sym("x");
        let e = x.clone().sin() - x.sin();
        assert!(e.is_zero());
    }

    #[test]
    fn test_sum_order_independent() {
        let (a, b, c) = (sym("a"), sym("b"), sym("c"));
        let e1 = a.clone() + b.clone() + c.clone();
        let e2 = c + (b + a);
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_powers_merge() {
        let x = sym("x");
        let e = x.clone() * x.clone() * x.clone().powi(-1);
        assert_eq!(e, x.clone());
        let s = x.clone().sqrt() * x.clone().sqrt();
        assert_eq!(s, x);
    }

    #[test]
    fn test_chop() {
        assert_eq!(chop(1e-11), 0.0);
        assert_eq!(chop(-0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(chop(0.1 + 0.2), 0.3);
        assert_eq!(Expr::constant(1e-12), Expr::zero());
    }

    #[test]
    fn test_function_symmetry() {
        let x = sym("x");
        assert_eq!((-x.clone()).sin(), -x.clone().sin());
        assert_eq!((-x.clone()).cos(), x.clone().cos());
        assert_eq!((-x.clone()).abs(), x.abs());
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(Expr::constant(4.0).sqrt(), Expr::constant(2.0));
        assert_eq!(Expr::zero().cos(), Expr::one());
        // out of domain stays symbolic
        assert!(matches!(Expr::constant(2.0).asin(), Expr::Function(FuncKind::Asin, _)));
        assert!(matches!(Expr::constant(-4.0).sqrt(), Expr::Power(_, _)));
    }

    #[test]
    fn test_expand_square() {
        let (a, b) = (sym("a"), sym("b"));
        let e = (a.clone() + b.clone()).powi(2).expand();
        let expected = a.clone().powi(2) + a.clone() * b.clone() * 2.0 + b.clone().powi(2);
        assert_eq!(e, expected);
        let d = ((a.clone() + b.clone()) * (a.clone() - b.clone())).expand();
        assert_eq!(d, a.powi(2) - b.powi(2));
    }

    #[test]
    fn test_negation_distributes() {
        let (a, b) = (sym("a"), sym("b"));
        let e = -(a.clone() + b.clone());
        assert_eq!(e, -a.clone() - b.clone());
        assert!(e.is_negated());
    }
}
