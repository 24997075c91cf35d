#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// a module turns a String expression into a symbolic expression
///
///# Example
/// ```
/// use RustedIK::symbolic::symbolic_engine::Expr;
/// let input = "sj0*px - cj0*py + 2*d1^2";
/// let parsed_expression = Expr::parse_expression(input).unwrap();
/// println!(" parsed_expression {}", parsed_expression);
/// let again = Expr::parse_expression(&parsed_expression.to_string()).unwrap();
/// assert_eq!(parsed_expression, again);
///  ```
/// ________________________________________________________________________________________________________________________________
pub mod parse_expr;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// canonical expressions: constants, symbols, sums, products, powers and the function heads
/// sin, cos, tan, cot, asin, acos, atan2, abs. Every constructor normalizes, so expressions
/// can be compared, hashed and ordered directly.
///# Example#
/// ```
/// use RustedIK::symbolic::symbolic_engine::Expr;
/// let (x, y) = (Expr::symbol("x"), Expr::symbol("y"));
/// let e = x.clone() * y.clone() * 3.0 + y.clone() * x.clone();
/// assert_eq!(e, x.clone() * y.clone() * 4.0);
/// // substitution of symbols by expressions
/// let mut map = std::collections::HashMap::new();
/// map.insert("y".to_string(), x.clone().sin());
/// println!("{}", e.substitute(&map));
/// // node count used by every tie-break
/// println!("complexity {}", e.complexity());
/// ```
/// ________________________________________________________________________________________________________________________________________________
pub mod symbolic_engine;
/// errors of the expression layer
pub mod symbolic_errors;
/// normalizing constructors (flattening, folding, like terms) and `expand`
pub mod symbolic_simplify;
///________________________________________________________________________________________________________________________________________________
///
/// matching of expressions against templates with wildcards; sums and products are matched
/// commutatively
/// Example#
/// ```
/// use RustedIK::symbolic::symbolic_engine::Expr;
/// use RustedIK::symbolic::symbolic_pattern::Pattern;
/// let x = Expr::symbol("x");
/// let e = x.clone().sin() * 3.0 + x.clone().cos() * 4.0;
/// let template = Pattern::wild("a") * Pattern::wild("b").sin() + Pattern::wild("c") * Pattern::wild("b").cos();
/// let bindings = e.matches(&template).unwrap();
/// assert_eq!(bindings["b"], x);
/// ```
pub mod symbolic_pattern;
///________________________________________________________________________________________________________________________________________________
///
/// trigonometric simplification: Pythagorean identities over sin/cos functions and alias
/// symbols, atan2 folding
/// Example#
/// ```
/// use RustedIK::symbolic::symbolic_engine::Expr;
/// use RustedIK::symbolic::symbolic_trig::TrigPair;
/// let e = Expr::parse_expression("L*sj0^2 + L*cj0^2").unwrap();
/// let pairs = [TrigPair::aliases("sj0", "cj0", "j0")];
/// assert_eq!(e.trig_simplify_with(&pairs), Expr::symbol("L"));
/// ```
pub mod symbolic_trig;
/// closed-form solving of one equation for one symbol, linear collection, polynomial coefficients
pub mod symbolic_solve;
///______________________________________________________________________________________________________________________________________________
/// common subexpression elimination with block scoping
/// _____________________________________________________________________________________________________________________________________________
pub mod symbolic_cse;
/// numeric evaluation with the domain guards of the generated code
pub mod symbolic_eval;
#[cfg(test)]
mod symbolic_engine_tests;
