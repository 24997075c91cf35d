//! Numeric evaluation of expressions with the guards of the generated code:
//! square roots of radicands below -1e-5 and asin/acos of arguments outside
//! [-1.0001, 1.0001] abort with `SymbolicError::DomainAbort`, arguments inside the
//! band are clamped.
use crate::codegen::ik_runtime::{ik_acos_checked, ik_asin_checked, ik_atan2, ik_sqrt_checked};
use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use std::collections::HashMap;

impl Expr {
    pub fn eval(&self, env: &HashMap<String, f64>) -> Result<f64, SymbolicError> {
        match self {
            Expr::Const(c) => Ok(*c),
            Expr::Symbol(s) => env
                .get(s)
                .copied()
                .ok_or_else(|| SymbolicError::UnboundSymbol(s.clone())),
            Expr::Sum(terms) => {
                let mut acc = 0.0;
                for t in terms {
                    acc += t.eval(env)?;
                }
                Ok(acc)
            }
            Expr::Product(factors) => {
                let mut acc = 1.0;
                for f in factors {
                    acc *= f.eval(env)?;
                }
                Ok(acc)
            }
            Expr::Power(b, e) => {
                let base = b.eval(env)?;
                match e.as_const() {
                    Some(h) if h.fract() != 0.0 && (2.0 * h).fract() == 0.0 => {
                        let root = ik_sqrt_checked(base).ok_or_else(|| {
                            SymbolicError::DomainAbort(format!("sqrt of {} = {}", b, base))
                        })?;
                        let scaled = root * base.powi((h.abs() - 0.5) as i32);
                        Ok(if h > 0.0 { scaled } else { 1.0 / scaled })
                    }
                    Some(n) if n == -1.0 => Ok(1.0 / base),
                    Some(n) if n.fract() == 0.0 && n > 0.0 => Ok(base.powi(n as i32)),
                    Some(n) if n.fract() == 0.0 => Ok(1.0 / base.powi(-n as i32)),
                    _ => Ok(base.powf(e.eval(env)?)),
                }
            }
            Expr::Function(kind, args) => {
                let mut vals = Vec::with_capacity(args.len());
                for a in args {
                    vals.push(a.eval(env)?);
                }
                match kind {
                    FuncKind::Asin | FuncKind::Acos => {
                        let x = vals[0];
                        let checked = if *kind == FuncKind::Asin {
                            ik_asin_checked(x)
                        } else {
                            ik_acos_checked(x)
                        };
                        checked.ok_or_else(|| {
                            SymbolicError::DomainAbort(format!(
                                "{}({}) with argument {}",
                                kind, args[0], x
                            ))
                        })
                    }
                    FuncKind::Atan2 => Ok(ik_atan2(vals[0], vals[1])),
                    _ => Ok(kind.evaluate(&vals)),
                }
            }
        }
    }

    /// Evaluation with a slice of name/value pairs.
    pub fn eval_with(&self, values: &[(&str, f64)]) -> Result<f64, SymbolicError> {
        let env: HashMap<String, f64> = values.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        self.eval(&env)
    }
}
