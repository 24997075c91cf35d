//! # Rust code generator
//!
//! Walks a solver tree depth first and writes a self-contained Rust module:
//! the runtime helpers, the query functions and
//! `ik(eetrans, eerot, pfree) -> Option<Vec<IkSolution>>`.
//!
//! A `Solution` becomes a loop over its candidates that encloses the rest of its list,
//! a `Branch` an `if / else if / else` chain on its selector, and every joint value
//! and temporary is a `let` binding inside the block where it is known. Subexpressions
//! repeated within one group of assignments go through the pass CSE table, which only
//! reuses a temporary inside the block that defined it.
//!
//! Every piece of mutable state lives in a `GenerationPass` built per call, so one
//! generator can be used for any number of trees.
use crate::codegen::ik_runtime::IkValues;
use crate::codegen::solution_layout::{
    ChainLayout, free_dependence, pose_names, raw_pose_names, values_form,
};
use crate::ik::ik_errors::IkError;
use crate::ik::solver_tree::{SolverNode, SolverTree, rotation_target_names};
use crate::symbolic::symbolic_cse::CseTable;
use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use crate::symbolic::symbolic_simplify::chop;
use itertools::Itertools;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Text of the runtime helpers, pasted into every generated module.
pub const RUNTIME_SOURCE: &str = include_str!("ik_runtime.rs");

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    /// also emit a `main` reading the pose from the command line
    pub emit_main: bool,
    /// selector tolerance of degenerate branches
    pub branch_tolerance: f64,
    /// candidates closer than this in sine and cosine are one solution
    pub duplicate_tolerance: f64,
    /// comment lines put on top of the module
    pub header: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            emit_main: false,
            branch_tolerance: 1e-4,
            duplicate_tolerance: 1e-4,
            header: "Analytical inverse kinematics generated by RustedIK.".to_string(),
        }
    }
}

pub struct RustGenerator {
    pub settings: GeneratorSettings,
}

/// Float literal that reads back to the same value.
fn literal(c: f64) -> String {
    if c.is_nan() {
        "f64::NAN".to_string()
    } else if c.is_infinite() {
        if c > 0.0 { "f64::INFINITY".to_string() } else { "f64::NEG_INFINITY".to_string() }
    } else if c < 0.0 {
        format!("({:?})", c)
    } else {
        format!("{:?}", c)
    }
}

/// Operand of a method call; float literals need their type spelled out there.
fn receiver(e: &Expr) -> String {
    match e {
        Expr::Const(c) if c.is_finite() => format!("({:?}_f64)", c),
        _ => lower(e),
    }
}

/// Lowers an expression to a Rust expression. Guarded operations use the `?` of the
/// enclosing `ik` function to abort the solve.
pub fn lower(e: &Expr) -> String {
    match e {
        Expr::Const(c) => literal(*c),
        Expr::Symbol(s) => s.clone(),
        Expr::Sum(terms) => {
            let mut out = String::from("(");
            for (i, t) in terms.iter().enumerate() {
                if i == 0 {
                    out.push_str(&lower(t));
                } else if t.is_negated() && !matches!(t, Expr::Sum(_)) {
                    out.push_str(" - ");
                    out.push_str(&lower(&-t.clone()));
                } else {
                    out.push_str(" + ");
                    out.push_str(&lower(t));
                }
            }
            out.push(')');
            out
        }
        Expr::Product(factors) => {
            if let Some(Expr::Const(c)) = factors.first() {
                if *c == -1.0 {
                    let rest: Vec<String> = factors[1..].iter().map(lower).collect();
                    return format!("(-({}))", rest.join(" * "));
                }
            }
            format!("({})", factors.iter().map(lower).join(" * "))
        }
        Expr::Power(b, x) => {
            let base = receiver(b);
            match x.as_const() {
                // b^(k + 1/2) = sqrt(b) * b^k, with the guard on sqrt(b)
                Some(h) if h.fract() != 0.0 && (2.0 * h).fract() == 0.0 && h.abs() <= 16.0 => {
                    let root = format!("ik_sqrt_checked({})?", base);
                    let whole = (h.abs() - 0.5) as usize;
                    let mut factors = vec![root];
                    factors.extend(std::iter::repeat_n(base, whole));
                    match (h > 0.0, whole) {
                        (true, 0) => factors.join(""),
                        (true, _) => format!("({})", factors.join(" * ")),
                        (false, _) => format!("(1.0 / ({}))", factors.join(" * ")),
                    }
                }
                Some(n) if n == -1.0 => format!("(1.0 / {})", base),
                Some(n) if n.fract() == 0.0 && n.abs() <= 16.0 => {
                    let k = n.abs() as usize;
                    let repeated = vec![base; k.max(1)].join(" * ");
                    if n > 0.0 {
                        format!("({})", repeated)
                    } else if n == 0.0 {
                        "1.0".to_string()
                    } else {
                        format!("(1.0 / ({}))", repeated)
                    }
                }
                _ => format!("{}.powf({})", base, lower(x)),
            }
        }
        Expr::Function(kind, args) => {
            let a: Vec<String> = args.iter().map(receiver).collect();
            match kind {
                FuncKind::Sin => format!("{}.sin()", a[0]),
                FuncKind::Cos => format!("{}.cos()", a[0]),
                FuncKind::Tan => format!("{}.tan()", a[0]),
                FuncKind::Cot => format!("(1.0 / {}.tan())", a[0]),
                FuncKind::Asin => format!("ik_asin_checked({})?", a[0]),
                FuncKind::Acos => format!("ik_acos_checked({})?", a[0]),
                FuncKind::Atan2 => format!("ik_atan2({}, {})", a[0], a[1]),
                FuncKind::Abs => format!("{}.abs()", a[0]),
            }
        }
    }
}

/// Mutable state of one generation.
struct GenerationPass<'a> {
    settings: &'a GeneratorSettings,
    layout: ChainLayout,
    cse: CseTable,
    /// joints left free by degenerate branches on the current path
    free_stack: Vec<String>,
    /// solved joints that follow one of the stacked free joints
    dependencies: HashMap<String, (usize, f64)>,
    /// bound names per open block
    scopes: Vec<HashSet<String>>,
    out: String,
    indent: usize,
}

impl<'a> GenerationPass<'a> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
        self.cse.enter_scope();
        self.scopes.push(HashSet::new());
    }

    /// Leaves the innermost block without writing its closing line.
    fn leave(&mut self) {
        self.scopes.pop();
        self.cse.exit_scope();
        self.indent -= 1;
    }

    fn close(&mut self, text: &str) {
        self.leave();
        self.line(text);
    }

    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    fn check_bound(&self, e: &Expr) -> Result<(), IkError> {
        match e.free_symbols().into_iter().find(|s| !self.is_bound(s)) {
            Some(s) => Err(IkError::CodeGeneration(format!(
                "{} is used in {} before it is computed",
                s, e
            ))),
            None => Ok(()),
        }
    }

    fn let_value(&mut self, name: &str, value: &str) {
        self.line(&format!("let {} = {};", name, value));
        self.bind(name);
    }

    /// Emits CSE temporaries for `exprs` and returns the lowered expressions.
    fn lower_group(&mut self, exprs: &[Expr]) -> Result<Vec<String>, IkError> {
        for e in exprs {
            self.check_bound(e)?;
        }
        let (temps, rewritten) = self.cse.extract(exprs);
        for (name, value) in temps {
            let text = lower(&value);
            self.let_value(&name, &text);
        }
        Ok(rewritten.iter().map(lower).collect())
    }

    fn define_all(&mut self, names: &[String], exprs: &[Expr]) -> Result<(), IkError> {
        let lowered = self.lower_group(exprs)?;
        for (name, text) in names.iter().zip(lowered) {
            self.let_value(name, &text);
        }
        Ok(())
    }

    /// `name` and, for hinges, its sine and cosine aliases.
    fn define_joint(&mut self, name: &str, value: &str) {
        self.let_value(name, value);
        if self.layout.is_hinge(name) {
            self.let_value(&format!("s{}", name), &format!("{}.sin()", name));
            self.let_value(&format!("c{}", name), &format!("{}.cos()", name));
        }
    }

    fn constant_joint(&mut self, name: &str, value: f64) {
        self.let_value(name, &literal(chop(value)));
        if self.layout.is_hinge(name) {
            self.let_value(&format!("s{}", name), &literal(chop(value.sin())));
            self.let_value(&format!("c{}", name), &literal(chop(value.cos())));
        }
    }

    fn list(&mut self, nodes: &[SolverNode]) -> Result<(), IkError> {
        for (i, node) in nodes.iter().enumerate() {
            match node {
                SolverNode::Solution(s) => {
                    let raw = self.lower_group(s.values.exprs())?;
                    let form = match values_form(&s.values) {
                        IkValues::Angles => "IkValues::Angles",
                        IkValues::Cosines => "IkValues::Cosines",
                        IkValues::Sines => "IkValues::Sines",
                    };
                    let hinge = self.layout.is_hinge(&s.name);
                    let dependency = free_dependence(&s.name, &s.values, &self.free_stack);
                    let pattern = if hinge {
                        format!("[{0}, s{0}, c{0}]", s.name)
                    } else {
                        format!("[{}, _, _]", s.name)
                    };
                    self.open(&format!(
                        "for {} in ik_candidates({}, &[{}], {}, {}, IK_DUPLICATE_TOLERANCE) {{",
                        pattern,
                        form,
                        raw.join(", "),
                        s.add_pi,
                        hinge
                    ));
                    self.bind(&s.name);
                    if hinge {
                        self.bind(&format!("s{}", s.name));
                        self.bind(&format!("c{}", s.name));
                    }
                    if let Some(d) = dependency {
                        self.dependencies.insert(s.name.clone(), d);
                    }
                    self.list(&nodes[i + 1..])?;
                    self.dependencies.remove(&s.name);
                    self.close("}");
                    return Ok(());
                }
                SolverNode::Branch(b) => {
                    self.open("{");
                    let selector = self.lower_group(std::slice::from_ref(&b.selector))?;
                    self.let_value("evalcond", &selector[0]);
                    for (k, arm) in b.arms.iter().enumerate() {
                        let test = arm.value.map(|v| {
                            format!("if (evalcond - {}).abs() < IK_BRANCH_TOLERANCE {{", literal(v))
                        });
                        let head = match (k, test) {
                            (0, Some(t)) => t,
                            (0, None) => "{".to_string(),
                            (_, Some(t)) => format!("}} else {}", t),
                            (_, None) => "} else {".to_string(),
                        };
                        if k > 0 {
                            self.leave();
                        }
                        self.open(&head);
                        debug!("branch {} arm {:?}", b.name, arm.value);
                        self.list(&arm.tree)?;
                    }
                    self.close("}");
                    self.close("}");
                }
                SolverNode::FreeParameter { name, tree } => {
                    match self.layout.pfree_index(name) {
                        // caller-supplied joints wrap the chain node
                        Some(k) if !self.is_bound("r00") => {
                            self.define_joint(name, &format!("pfree[{}]", k));
                            self.list(tree)?;
                        }
                        _ => {
                            self.open("{");
                            self.constant_joint(name, 0.0);
                            self.free_stack.push(name.clone());
                            self.list(tree)?;
                            self.free_stack.pop();
                            self.close("}");
                        }
                    }
                }
                SolverNode::SetJoint { name, value } => self.constant_joint(name, *value),
                SolverNode::Chain(c) => {
                    self.define_all(&pose_names(), &c.pose)?;
                    self.list(&c.tree)?;
                }
                SolverNode::Rotation { transform, tree } => {
                    self.open("{");
                    self.define_all(&rotation_target_names(), transform)?;
                    self.list(tree)?;
                    self.close("}");
                }
                SolverNode::Sequence(children) => {
                    for child in children {
                        self.open("{");
                        self.list(child)?;
                        self.close("}");
                    }
                }
                SolverNode::StoreSolution { all_vars } => self.store(all_vars)?,
            }
        }
        Ok(())
    }

    fn store(&mut self, all_vars: &[String]) -> Result<(), IkError> {
        let mut vfree = Vec::with_capacity(self.free_stack.len());
        for name in &self.free_stack {
            let index = self.layout.record_index(name).ok_or_else(|| {
                IkError::CodeGeneration(format!("free joint {} is not in the chain", name))
            })?;
            vfree.push(index.to_string());
        }
        let mut vars = Vec::with_capacity(all_vars.len());
        for name in all_vars {
            if !self.is_bound(name) {
                return Err(IkError::CodeGeneration(format!("{} is not computed on this path", name)));
            }
            let wrap = self.layout.is_hinge(name);
            let var = if let Some(pos) = self.free_stack.iter().position(|f| f == name) {
                format!(
                    "IkVariable {{ foffset: 0.0, fmul: 1.0, freeind: Some({}), wrap: {} }}",
                    pos, wrap
                )
            } else if let Some((pos, mul)) = self.dependencies.get(name) {
                format!(
                    "IkVariable {{ foffset: {}, fmul: {}, freeind: Some({}), wrap: {} }}",
                    name,
                    literal(*mul),
                    pos,
                    wrap
                )
            } else {
                format!("IkVariable::fixed({}, {})", name, wrap)
            };
            vars.push(var);
        }
        self.open("solutions.push(IkSolution {");
        self.line("basesol: vec![");
        for v in vars {
            self.line(&format!("    {},", v));
        }
        self.line("],");
        self.line(&format!("vfree: vec![{}],", vfree.join(", ")));
        self.close("});");
        Ok(())
    }
}

impl RustGenerator {
    pub fn new(settings: GeneratorSettings) -> RustGenerator {
        RustGenerator { settings }
    }

    /// Rust source of a module solving `tree`.
    pub fn generate(&self, tree: &SolverTree) -> Result<String, IkError> {
        let layout = ChainLayout::of(tree)?;
        let mut pass = GenerationPass {
            settings: &self.settings,
            layout: layout.clone(),
            cse: CseTable::new("x"),
            free_stack: Vec::new(),
            dependencies: HashMap::new(),
            scopes: vec![HashSet::new()],
            out: String::new(),
            indent: 0,
        };
        for line in pass.settings.header.lines() {
            pass.line(&format!("// {}", line));
        }
        pass.line("#![allow(unused_variables, unused_mut, unused_parens, non_snake_case, dead_code)]");
        pass.line("#![allow(clippy::all)]");
        pass.out.push_str(RUNTIME_SOURCE);
        pass.line("");
        pass.line(&format!(
            "pub const IK_BRANCH_TOLERANCE: f64 = {};",
            literal(pass.settings.branch_tolerance)
        ));
        pass.line(&format!(
            "pub const IK_DUPLICATE_TOLERANCE: f64 = {};",
            literal(pass.settings.duplicate_tolerance)
        ));
        pass.line("");
        pass.line(&format!(
            "pub fn get_num_free_parameters() -> usize {{ {} }}",
            layout.free.len()
        ));
        pass.line(&format!(
            "pub fn get_free_parameters() -> Vec<usize> {{ vec![{}] }}",
            layout.free_indices().iter().join(", ")
        ));
        pass.line(&format!("pub fn get_num_joints() -> usize {{ {} }}", layout.joints.len()));
        pass.line("");
        pass.line("/// Solutions for the end effector pose `eerot` (row major) and `eetrans`;");
        pass.line("/// `pfree` holds one value per free parameter. `None` when nothing is found.");
        pass.open("pub fn ik(eetrans: &[f64; 3], eerot: &[f64; 9], pfree: &[f64]) -> Option<Vec<IkSolution>> {");
        pass.line(&format!(
            "if pfree.len() < {} {{ return None; }}",
            layout.free.len()
        ));
        for (k, name) in raw_pose_names().iter().enumerate() {
            let source = if k < 9 { format!("eerot[{}]", k) } else { format!("eetrans[{}]", k - 9) };
            pass.let_value(name, &source);
        }
        pass.line("let mut solutions: Vec<IkSolution> = Vec::new();");
        pass.list(tree)?;
        pass.line("if solutions.is_empty() { None } else { Some(solutions) }");
        pass.close("}");
        if pass.settings.emit_main {
            pass.out.push_str(MAIN_SOURCE);
        }
        info!(
            "generated {} lines of Rust for {} joints ({} temporaries)",
            pass.out.lines().count(),
            layout.joints.len(),
            pass.cse.len()
        );
        Ok(pass.out)
    }
}

/// Reference command line: 12 pose numbers then the free parameters.
const MAIN_SOURCE: &str = r#"
fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let nfree = get_num_free_parameters();
    if args.len() != 12 + nfree {
        eprintln!("usage: ik r00 r01 r02 t0 r10 r11 r12 t1 r20 r21 r22 t2 free0 ...");
        std::process::exit(1);
    }
    let mut values = Vec::with_capacity(args.len());
    for a in &args {
        match a.parse::<f64>() {
            Ok(v) => values.push(v),
            Err(_) => {
                eprintln!("not a number: {}", a);
                std::process::exit(1);
            }
        }
    }
    let eerot = [values[0], values[1], values[2], values[4], values[5], values[6], values[8], values[9], values[10]];
    let eetrans = [values[3], values[7], values[11]];
    let pfree = &values[12..];
    match ik(&eetrans, &eerot, pfree) {
        Some(solutions) => {
            println!("found {} ik solutions:", solutions.len());
            for (i, sol) in solutions.iter().enumerate() {
                // degenerate-branch free values are taken at zero
                let solfree = vec![0.0; sol.get_free().len()];
                let joints: Vec<String> = sol.get_solution(&solfree).iter().map(|v| format!("{:.15}", v)).collect();
                println!("sol{} (free={}): {}", i, sol.get_free().len(), joints.join(", "));
            }
        }
        None => {
            println!("failed to get ik solution");
            std::process::exit(1);
        }
    }
}
"#;
