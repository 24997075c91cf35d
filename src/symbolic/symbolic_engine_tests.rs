use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use crate::symbols;
use std::collections::HashMap;
//___________________________________TESTS____________________________________

mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_add_assign() {
        let mut expr = Expr::symbol("x");
        expr += Expr::constant(2.0);
        assert_eq!(expr, Expr::Sum(vec![Expr::Const(2.0), Expr::symbol("x")]));
    }

    #[test]
    fn test_sub_assign() {
        let mut expr = Expr::symbol("x");
        expr -= Expr::symbol("x");
        assert!(expr.is_zero());
    }

    #[test]
    fn test_mul_assign() {
        let mut expr = Expr::symbol("x");
        expr *= Expr::constant(2.0);
        assert_eq!(
            expr,
            Expr::Product(vec![Expr::Const(2.0), Expr::symbol("x")])
        );
    }

    #[test]
    fn test_div_assign() {
        let mut expr = Expr::symbol("x") * 6.0;
        expr /= Expr::symbol("x") * 2.0;
        assert_eq!(expr, Expr::constant(3.0));
    }

    #[test]
    fn test_symbols() {
        let vars = Expr::Symbols("j0, j1,, j2 ");
        assert_eq!(vars.len(), 3);
        assert_eq!(vars[2], Expr::symbol("j2"));
        let (a, b) = symbols!(a, b);
        assert_eq!(a, Expr::symbol("a"));
        assert_eq!(b, Expr::symbol("b"));
    }

    #[test]
    fn test_func_kind_names() {
        for kind in FuncKind::iter() {
            assert_eq!(FuncKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(FuncKind::Atan2.arity(), 2);
        assert!(FuncKind::from_str("sqrt").is_err());
    }

    #[test]
    fn test_hash_and_order_consistent() {
        let (x, y) = symbols!(x, y);
        let e1 = x.clone().sin() * y.clone() + 1.0;
        let e2 = Expr::one() + y.clone() * x.clone().sin();
        assert_eq!(e1, e2);
        let mut set = HashSet::new();
        set.insert(e1.clone());
        assert!(set.contains(&e2));
        let mut v = vec![e1.clone(), x.clone(), Expr::constant(-3.0), y.clone().cos()];
        v.sort();
        assert_eq!(v[0], Expr::constant(-3.0));
        assert_eq!(v[1], x);
    }

    #[test]
    fn test_substitute_simultaneous() {
        let (x, y) = symbols!(x, y);
        let e = x.clone() - y.clone();
        let mut map = HashMap::new();
        map.insert("x".to_string(), y.clone());
        map.insert("y".to_string(), x.clone());
        assert_eq!(e.substitute(&map), y.clone() - x.clone());
        assert_eq!(e.set_variable("x", 2.0).set_variable("y", 2.0), Expr::zero());
    }

    #[test]
    fn test_replace_all() {
        let (x, y) = symbols!(x, y);
        let e = x.clone().sin() * x.clone().cos() + x.clone().sin();
        let out = e.replace_all(&[
            (x.clone().sin(), Expr::symbol("sx")),
            (x.clone().cos(), Expr::symbol("cx")),
        ]);
        assert_eq!(out, Expr::symbol("sx") * Expr::symbol("cx") + Expr::symbol("sx"));
        assert!(!out.contains_symbol("x"));
        // replacements are not traversed again
        let swap = y.clone().replace_all(&[(y.clone(), y.clone().sin())]);
        assert_eq!(swap, y.sin());
    }

    #[test]
    fn test_free_symbols_and_complexity() {
        let e = Expr::parse_expression("atan2(r01*sj0 - r11, px) + 2").unwrap();
        let syms: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(syms, vec!["px", "r01", "r11", "sj0"]);
        assert!(e.contains_symbol("sj0"));
        assert!(!e.contains_symbol("sj"));
        assert_eq!(Expr::symbol("x").complexity(), 1);
        assert_eq!(Expr::symbol("x").sin().complexity(), 3);
        assert!(e.complexity() > 8);
    }

    #[test]
    fn test_terms_and_factors() {
        let (x, y) = symbols!(x, y);
        assert!(Expr::zero().terms().is_empty());
        assert_eq!((x.clone() + y.clone()).terms().len(), 2);
        assert_eq!(x.clone().terms(), vec![x.clone()]);
        assert!(Expr::one().factors().is_empty());
        assert_eq!((x.clone() * y.clone()).factors().len(), 2);
        assert!(!(x.clone() * 2.0).is_number());
        assert!(Expr::constant(2.0).sqrt().is_number());
    }
}
