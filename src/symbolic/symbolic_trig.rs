//! # Trigonometric Rewriting Module
//!
//! `trig_simplify` shortens expressions built from sines and cosines:
//! - `sin^2 + cos^2 = 1` in both directions, keeping whichever form has the lower
//!   complexity, together with the `tan^2 = cos^-2 - 1` and `cot^2 = sin^-2 - 1` duals;
//! - `atan2(a*sin(b) + c*cos(b), ...)` pairs that are rotations of the angle `b` fold into
//!   `±b ± atan2(c, a)` (plus a half turn where needed).
//!
//! Besides `sin(x)`/`cos(x)` function pairs, callers may hand in alias pairs such as
//! `(sj0, cj0)`: plain symbols standing for the sine and cosine of joint `j0`. The
//! rewrite repeats until nothing changes, so applying it twice gives the same result.
use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use log::debug;
use std::collections::BTreeSet;

/// Upper bound on rewrite passes before giving up on a fixpoint.
const MAX_PASSES: usize = 8;

/// Sine and cosine atoms of one angle, either as functions or as alias symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct TrigPair {
    pub sin: Expr,
    pub cos: Expr,
    /// the angle itself, used when folding atan2
    pub angle: Expr,
}

impl TrigPair {
    /// pair of alias symbols for the angle symbol `angle`
    pub fn aliases(sin: &str, cos: &str, angle: &str) -> TrigPair {
        TrigPair {
            sin: Expr::symbol(sin),
            cos: Expr::symbol(cos),
            angle: Expr::symbol(angle),
        }
    }

    /// `sin(arg)`, `cos(arg)`
    pub fn of(arg: Expr) -> TrigPair {
        TrigPair {
            sin: arg.clone().sin(),
            cos: arg.clone().cos(),
            angle: arg,
        }
    }
}

fn differs_by_zero(a: &Expr, b: &Expr) -> bool {
    a == b || (a.clone() - b.clone()).expand().is_zero()
}

impl Expr {
    /// Arguments of every sine and cosine in the expression.
    pub fn trig_arguments(&self) -> BTreeSet<Expr> {
        let mut out = BTreeSet::new();
        self.collect_trig_arguments(&mut out);
        out
    }

    fn collect_trig_arguments(&self, out: &mut BTreeSet<Expr>) {
        match self {
            Expr::Const(_) | Expr::Symbol(_) => {}
            Expr::Function(kind, args) => {
                if matches!(kind, FuncKind::Sin | FuncKind::Cos) {
                    out.insert(args[0].clone());
                }
                args.iter().for_each(|a| a.collect_trig_arguments(out));
            }
            Expr::Sum(v) | Expr::Product(v) => v.iter().for_each(|a| a.collect_trig_arguments(out)),
            Expr::Power(b, e) => {
                b.collect_trig_arguments(out);
                e.collect_trig_arguments(out);
            }
        }
    }

    fn pairs_in(&self, extra: &[TrigPair]) -> Vec<TrigPair> {
        let mut pairs: Vec<TrigPair> = extra
            .iter()
            .filter(|p| self.contains_subexpr(&p.sin) || self.contains_subexpr(&p.cos))
            .cloned()
            .collect();
        pairs.extend(self.trig_arguments().into_iter().map(TrigPair::of));
        pairs
    }

    /// Replaces `atom^n` (integer n >= 2) by `atom^(n mod 2) * square^(n div 2)`.
    fn replace_square(&self, atom: &Expr, square: &Expr) -> Expr {
        match self {
            Expr::Const(_) | Expr::Symbol(_) => self.clone(),
            Expr::Power(b, e) if b.as_ref() == atom => match e.as_const() {
                Some(n) if n.fract() == 0.0 && n >= 2.0 => {
                    let n = n as i32;
                    Expr::product(vec![atom.clone().powi(n % 2), square.clone().powi(n / 2)])
                }
                _ => self.clone(),
            },
            _ => self.map_children(|c| c.replace_square(atom, square)),
        }
    }

    /// One Pythagorean step per angle: keep the shortest of the current form and the
    /// two substituted forms.
    fn pythagorean_reduce(&self, pairs: &[TrigPair]) -> Expr {
        let mut current = self.clone();
        for p in pairs {
            let one = Expr::one();
            let from_sin = current
                .replace_square(&p.sin, &(one.clone() - p.cos.clone().powi(2)))
                .expand();
            let from_cos = current
                .replace_square(&p.cos, &(one - p.sin.clone().powi(2)))
                .expand();
            current = [current, from_sin, from_cos]
                .into_iter()
                .reduce(|best, cand| {
                    if cand.complexity() < best.complexity() {
                        cand
                    } else {
                        best
                    }
                })
                .unwrap_or_else(Expr::zero);
        }
        for arg in self.tan_cot_arguments() {
            let tan = Expr::Function(FuncKind::Tan, vec![arg.clone()]);
            let cot = Expr::Function(FuncKind::Cot, vec![arg.clone()]);
            let via_cos = current
                .replace_square(&tan, &(arg.clone().cos().powi(-2) - 1.0))
                .replace_square(&cot, &(arg.clone().sin().powi(-2) - 1.0))
                .expand();
            if via_cos.complexity() < current.complexity() {
                current = via_cos;
            }
        }
        current
    }

    fn tan_cot_arguments(&self) -> BTreeSet<Expr> {
        fn walk(e: &Expr, out: &mut BTreeSet<Expr>) {
            match e {
                Expr::Const(_) | Expr::Symbol(_) => {}
                Expr::Function(kind, args) => {
                    if matches!(kind, FuncKind::Tan | FuncKind::Cot) {
                        out.insert(args[0].clone());
                    }
                    args.iter().for_each(|a| walk(a, out));
                }
                Expr::Sum(v) | Expr::Product(v) => v.iter().for_each(|a| walk(a, out)),
                Expr::Power(b, x) => {
                    walk(b, out);
                    walk(x, out);
                }
            }
        }
        let mut out = BTreeSet::new();
        walk(self, &mut out);
        out
    }

    /// Folds `atan2(y, x)` when `(y, x)` is a rotation of `(sin b, cos b)`:
    /// - `y = a*sin(b) + c*cos(b)`, `x = -c*sin(b) + a*cos(b)` gives `b + atan2(c, a)`
    /// - `y = a*sin(b) + c*cos(b)`, `x = c*sin(b) - a*cos(b)` gives `-b - atan2(c, a) - pi`
    ///
    /// Both cover the sign variants of the identity table, equal modulo 2*pi.
    fn fold_atan2(&self, pairs: &[TrigPair]) -> Expr {
        let Expr::Function(FuncKind::Atan2, args) = self else {
            return self.clone();
        };
        let (y, x) = (&args[0], &args[1]);
        let mut candidates = y.pairs_in(pairs);
        candidates.extend(x.pairs_in(pairs));
        for p in candidates {
            let atoms = [p.sin.clone(), p.cos.clone()];
            let Some((yc, yr)) = y.collect_linear(&atoms) else {
                continue;
            };
            let Some((xc, xr)) = x.collect_linear(&atoms) else {
                continue;
            };
            if !yr.is_zero() || !xr.is_zero() {
                continue;
            }
            let (a, c) = (&yc[0], &yc[1]);
            if a.is_zero() && c.is_zero() {
                continue;
            }
            let phase = Expr::atan2(c.clone(), a.clone());
            if differs_by_zero(&xc[0], &-c.clone()) && differs_by_zero(&xc[1], a) {
                debug!("atan2 folded as rotation of {}", p.angle);
                return p.angle + phase;
            }
            if differs_by_zero(&xc[0], c) && differs_by_zero(&xc[1], &-a.clone()) {
                debug!("atan2 folded as reflected rotation of {}", p.angle);
                return -p.angle - phase - Expr::pi();
            }
        }
        self.clone()
    }

    fn trig_pass(&self, pairs: &[TrigPair]) -> Expr {
        match self {
            Expr::Const(_) | Expr::Symbol(_) => self.clone(),
            Expr::Sum(v) => {
                let inner = Expr::sum(v.iter().map(|t| t.trig_pass(pairs)).collect());
                let local = inner.pairs_in(pairs);
                inner.pythagorean_reduce(&local)
            }
            Expr::Product(v) => Expr::product(v.iter().map(|t| t.trig_pass(pairs)).collect()),
            Expr::Power(b, e) => Expr::power(b.trig_pass(pairs), e.as_ref().clone()),
            Expr::Function(kind, args) => {
                let inner =
                    Expr::function(*kind, args.iter().map(|a| a.trig_pass(pairs)).collect());
                inner.fold_atan2(pairs)
            }
        }
    }

    /// Trigonometric simplification over `sin`/`cos` functions.
    pub fn trig_simplify(&self) -> Expr {
        self.trig_simplify_with(&[])
    }

    /// Trigonometric simplification that also treats the given alias pairs as
    /// sine/cosine atoms. Iterated to a fixpoint.
    pub fn trig_simplify_with(&self, pairs: &[TrigPair]) -> Expr {
        let mut current = self.clone();
        for _ in 0..MAX_PASSES {
            let next = current.trig_pass(pairs);
            if next == current {
                return current;
            }
            current = next;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn sym(s: &str) -> Expr {
        Expr::symbol(s)
    }

    fn eval_at(e: &Expr, vals: &[(&str, f64)]) -> f64 {
        let map: HashMap<String, f64> = vals.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        e.eval(&map).unwrap()
    }

    #[test]
    fn test_pythagoras_functions() {
        let x = sym("x");
        let e = x.clone().sin().powi(2) + x.clone().cos().powi(2);
        assert_eq!(e.trig_simplify(), Expr::one());
        let e2 = sym("a") * x.clone().sin().powi(2) + sym("a") * x.clone().cos().powi(2) + sym("b");
        assert_eq!(e2.trig_simplify(), sym("a") + sym("b"));
    }

    #[test]
    fn test_pythagoras_aliases() {
        let pairs = [TrigPair::aliases("sj0", "cj0", "j0")];
        let e = sym("sj0").powi(2) * sym("L") + sym("cj0").powi(2) * sym("L");
        assert_eq!(e.trig_simplify_with(&pairs), sym("L"));
        // without the alias pair nothing is known about sj0, cj0
        assert_eq!(e.trig_simplify(), e);
    }

    #[test]
    fn test_tan_dual() {
        let x = sym("x");
        let e = x.clone().tan().powi(2) + 1.0;
        assert_eq!(e.trig_simplify(), x.cos().powi(-2));
    }

    #[test]
    fn test_atan2_rotation_fold() {
        let b = sym("b");
        let (s, c) = (b.clone().sin(), b.clone().cos());
        // y = 3 sin b + 4 cos b, x = -4 sin b + 3 cos b
        let y = s.clone() * 3.0 + c.clone() * 4.0;
        let x = s.clone() * -4.0 + c.clone() * 3.0;
        let folded = Expr::atan2(y.clone(), x.clone()).trig_simplify();
        assert!(!matches!(&folded, Expr::Function(FuncKind::Atan2, a) if a.len() == 2 && a[0] == y));
        for bv in [0.3, -1.2, 2.5] {
            let direct = eval_at(&Expr::atan2(y.clone(), x.clone()), &[("b", bv)]);
            let got = eval_at(&folded, &[("b", bv)]);
            let d = (direct - got).rem_euclid(2.0 * std::f64::consts::PI);
            assert!(d < 1e-9 || (2.0 * std::f64::consts::PI - d) < 1e-9);
        }
    }

    #[test]
    fn test_atan2_reflected_fold_with_aliases() {
        let pairs = [TrigPair::aliases("sj1", "cj1", "j1")];
        let (s, c) = (sym("sj1"), sym("cj1"));
        let a = sym("a");
        let y = a.clone() * s.clone() + c.clone() * 2.0;
        let x = s.clone() * 2.0 - a.clone() * c.clone();
        let folded = Expr::atan2(y, x).trig_simplify_with(&pairs);
        assert!(folded.contains_symbol("j1"));
        assert!(!folded.contains_symbol("sj1"));
        let v = eval_at(&folded, &[("j1", 0.4), ("a", 1.5)]);
        let (sv, cv) = (0.4f64.sin(), 0.4f64.cos());
        let direct = (1.5 * sv + 2.0 * cv).atan2(2.0 * sv - 1.5 * cv);
        let d = (direct - v).rem_euclid(2.0 * std::f64::consts::PI);
        assert!(d < 1e-9 || (2.0 * std::f64::consts::PI - d) < 1e-9);
    }

    #[test]
    fn test_idempotent() {
        let x = sym("x");
        let y = sym("y");
        let exprs = vec![
            x.clone().sin().powi(2) * y.clone() + x.clone().cos().powi(2) * y.clone(),
            x.clone().sin() * x.clone().cos() + x.clone().sin().powi(2),
            Expr::atan2(x.clone().sin(), x.clone().cos()),
            (x.clone().sin().powi(2) + 1.0).sqrt() + y.clone().cos().powi(4),
        ];
        for e in exprs {
            let once = e.trig_simplify();
            let twice = once.trig_simplify();
            assert_eq!(once, twice);
            let vals = [("x", 0.7), ("y", -0.3)];
            assert_relative_eq!(eval_at(&e, &vals), eval_at(&once, &vals), epsilon = 1e-9);
        }
    }
}
