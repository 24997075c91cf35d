//! Joint variables and their sine/cosine/tangent aliases.
//!
//! Every degree of freedom `q` of the chain gets the symbol `q` plus the alias symbols
//! `sq`, `cq` and `tq` standing for `sin(q)`, `cos(q)` and `tan(q)`. Chain equations are
//! kept in alias form, which keeps them polynomial; solutions are folded back into
//! function form where that makes them shorter.
use crate::ik::ik_errors::IkError;
use crate::symbolic::symbolic_engine::Expr;
use crate::symbolic::symbolic_trig::TrigPair;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use strum_macros::{Display, EnumString};

/// joint names must be plain identifiers
static IDENTIFIER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum JointKind {
    #[strum(serialize = "hinge")]
    Hinge,
    #[strum(serialize = "slider")]
    Slider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum JointRole {
    #[strum(serialize = "solve")]
    Solve,
    #[strum(serialize = "free")]
    Free,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointVariable {
    pub name: String,
    pub var: Expr,
    pub svar: Expr,
    pub cvar: Expr,
    pub tvar: Expr,
    /// position among all joints of the chain
    pub chain_index: usize,
    pub kind: JointKind,
    pub role: JointRole,
}

impl JointVariable {
    pub fn new(
        name: &str,
        chain_index: usize,
        kind: JointKind,
        role: JointRole,
    ) -> Result<JointVariable, IkError> {
        let valid = IDENTIFIER
            .as_ref()
            .map_err(|e| IkError::InvalidChain(e.to_string()))?;
        if !valid.is_match(name) {
            return Err(IkError::InvalidChain(format!(
                "joint name '{}' is not an identifier",
                name
            )));
        }
        Ok(JointVariable {
            name: name.to_string(),
            var: Expr::symbol(name),
            svar: Expr::symbol(&format!("s{}", name)),
            cvar: Expr::symbol(&format!("c{}", name)),
            tvar: Expr::symbol(&format!("t{}", name)),
            chain_index,
            kind,
            role,
        })
    }

    pub fn sname(&self) -> String {
        format!("s{}", self.name)
    }

    pub fn cname(&self) -> String {
        format!("c{}", self.name)
    }

    pub fn trig_pair(&self) -> TrigPair {
        TrigPair {
            sin: self.svar.clone(),
            cos: self.cvar.clone(),
            angle: self.var.clone(),
        }
    }

    /// alias -> function replacement pairs
    pub fn to_functions(&self) -> Vec<(Expr, Expr)> {
        vec![
            (self.svar.clone(), self.var.clone().sin()),
            (self.cvar.clone(), self.var.clone().cos()),
            (self.tvar.clone(), self.var.clone().tan()),
        ]
    }

    /// function -> alias replacement pairs
    pub fn to_aliases(&self) -> Vec<(Expr, Expr)> {
        self.to_functions().into_iter().map(|(a, f)| (f, a)).collect()
    }

    /// Substitution map fixing the joint to a constant value.
    pub fn fixed(&self, value: f64) -> HashMap<String, Expr> {
        let mut map = HashMap::new();
        map.insert(self.name.clone(), Expr::constant(value));
        if self.kind == JointKind::Hinge {
            map.insert(self.sname(), Expr::constant(value.sin()));
            map.insert(self.cname(), Expr::constant(value.cos()));
            map.insert(format!("t{}", self.name), Expr::constant(value.tan()));
        }
        map
    }

    /// true when the expression depends on the joint in any form
    pub fn appears_in(&self, e: &Expr) -> bool {
        e.contains_subexpr(&self.var)
            || e.contains_subexpr(&self.svar)
            || e.contains_subexpr(&self.cvar)
            || e.contains_subexpr(&self.tvar)
    }
}

/// All joint variables of one chain, in chain order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRegistry {
    vars: Vec<JointVariable>,
}

impl VariableRegistry {
    pub fn new(vars: Vec<JointVariable>) -> Result<VariableRegistry, IkError> {
        for (i, v) in vars.iter().enumerate() {
            if vars[..i].iter().any(|w| w.name == v.name) {
                return Err(IkError::InvalidChain(format!("duplicate joint name {}", v.name)));
            }
        }
        Ok(VariableRegistry { vars })
    }

    pub fn all(&self) -> &[JointVariable] {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&JointVariable> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn solve_vars(&self) -> Vec<&JointVariable> {
        self.vars.iter().filter(|v| v.role == JointRole::Solve).collect()
    }

    pub fn free_vars(&self) -> Vec<&JointVariable> {
        self.vars.iter().filter(|v| v.role == JointRole::Free).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.vars.iter().map(|v| v.name.clone()).collect()
    }

    pub fn trig_pairs(&self) -> Vec<TrigPair> {
        self.vars
            .iter()
            .filter(|v| v.kind == JointKind::Hinge)
            .map(JointVariable::trig_pair)
            .collect()
    }

    /// Expands and trig-reduces an alias-form expression.
    pub fn simplify(&self, e: &Expr) -> Expr {
        e.expand().trig_simplify_with(&self.trig_pairs())
    }

    pub fn to_functions(&self, e: &Expr) -> Expr {
        let pairs: Vec<(Expr, Expr)> = self.vars.iter().flat_map(|v| v.to_functions()).collect();
        e.replace_all(&pairs)
    }

    pub fn to_aliases(&self, e: &Expr) -> Expr {
        let pairs: Vec<(Expr, Expr)> = self.vars.iter().flat_map(|v| v.to_aliases()).collect();
        e.replace_all(&pairs)
    }

    /// Shortens a solution expression: trig simplification in function form, then back
    /// to aliases.
    pub fn fold_solution(&self, e: &Expr) -> Expr {
        let folded = self.to_aliases(&self.to_functions(e).trig_simplify());
        if folded.complexity() <= e.complexity() {
            folded
        } else {
            e.clone()
        }
    }
}
