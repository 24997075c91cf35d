//! # Symbolic Engine Module
//!
//! Canonical symbolic expressions used by the inverse kinematics compiler.
//!
//! ## Purpose
//!
//! The engine represents the forward kinematics of a chain, the pose equalities
//! derived from it and every closed-form joint solution as values of one enum, `Expr`.
//! All constructors normalize, so two expressions that are algebraically equal in the
//! sense of the normalizer are also structurally equal, hash equally and sort equally.
//! That lets expressions key hash maps (CSE tables, like-term collection) and makes
//! every traversal deterministic.
//!
//! ## Main Structures and Methods
//!
//! ### `Expr` Enum
//! - **Atoms**: `Const(f64)`, `Symbol(String)`
//! - **N-ary nodes**: `Sum(terms)`, `Product(factors)`
//! - **Power**: `Power(base, exponent)`; square root is `Power(x, 0.5)`
//! - **Functions**: `Function(kind, args)` with `FuncKind` one of sin, cos, tan, cot, asin, acos, atan2, abs
//!
//! ### Key Methods
//! - `Symbols(symbols: &str)` - create several symbols from a comma-separated string
//! - `substitute(map)` / `replace_all(pairs)` - simultaneous structural substitution
//! - `free_symbols()` / `contains_symbol()` - dependency queries used by the solver strategies
//! - `complexity()` - node count used for every tie-break between candidate solutions
//!
//! Normalization itself (`Expr::sum`, `Expr::product`, `Expr::power`, `Expr::function`)
//! lives in `symbolic_simplify`, trigonometric rewriting in `symbolic_trig`, matching in
//! `symbolic_pattern`, equation inversion in `symbolic_solve`.
//!
//! ## Interesting Code Features
//!
//! 1. **Total order on floats**: constants compare with `f64::total_cmp` and hash by bit
//!    pattern, so `Expr` implements `Eq`, `Ord` and `Hash` by hand.
//!
//! 2. **Operator Overloading**: `std::ops` traits route through the normalizing
//!    constructors, so `x * y + 2.0 * x * y` is already `3*x*y`.
//!
//! 3. **Parseable Display**: printing an expression gives text the `parse_expr` module
//!    reads back into the same value.
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::f64::consts::PI;
use std::fmt;
use std::hash::{Hash, Hasher};

use strum_macros::{Display, EnumIter, EnumString};

/// Function heads known to the engine and to the code generator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString,
)]
pub enum FuncKind {
    #[strum(serialize = "sin")]
    Sin,
    #[strum(serialize = "cos")]
    Cos,
    #[strum(serialize = "tan")]
    Tan,
    #[strum(serialize = "cot")]
    Cot,
    #[strum(serialize = "asin")]
    Asin,
    #[strum(serialize = "acos")]
    Acos,
    #[strum(serialize = "atan2")]
    Atan2,
    #[strum(serialize = "abs")]
    Abs,
}

impl FuncKind {
    pub fn arity(&self) -> usize {
        match self {
            FuncKind::Atan2 => 2,
            _ => 1,
        }
    }
    /// plain floating point value of the function, without any domain guard
    pub fn evaluate(&self, args: &[f64]) -> f64 {
        match self {
            FuncKind::Sin => args[0].sin(),
            FuncKind::Cos => args[0].cos(),
            FuncKind::Tan => args[0].tan(),
            FuncKind::Cot => 1.0 / args[0].tan(),
            FuncKind::Asin => args[0].asin(),
            FuncKind::Acos => args[0].acos(),
            FuncKind::Atan2 => args[0].atan2(args[1]),
            FuncKind::Abs => args[0].abs(),
        }
    }
}

/// Core symbolic expression enum.
///
/// Values are immutable; every transformation returns a new expression. Build them
/// through the constructors (`Expr::sum`, `Expr::product`, operators, `sin()`...) so
/// they stay normalized: flattened, constant-folded, like terms collected and children
/// sorted. Constructing variants directly skips normalization and is reserved for
/// the normalizer itself.
///
/// # Examples
/// ```rust, ignore
/// use RustedIK::symbolic::symbolic_engine::Expr;
/// let x = Expr::symbol("x");
/// let e = x.clone() * 2.0 + x.clone();
/// assert_eq!(e, x * 3.0);
/// ```
#[derive(Clone, Debug)]
pub enum Expr {
    /// numerical constant
    Const(f64),
    /// named symbol: joint angle, alias `sj0`/`cj0`, pose entry `r00`, temporary `x3`...
    Symbol(String),
    /// sum of at least two terms
    Sum(Vec<Expr>),
    /// product of at least two factors, numeric coefficient first
    Product(Vec<Expr>),
    /// base ^ exponent
    Power(Box<Expr>, Box<Expr>),
    Function(FuncKind, Vec<Expr>),
}

impl Expr {
    fn rank(&self) -> u8 {
        match self {
            Expr::Const(_) => 0,
            Expr::Symbol(_) => 1,
            Expr::Power(_, _) => 2,
            Expr::Function(_, _) => 3,
            Expr::Product(_) => 4,
            Expr::Sum(_) => 5,
        }
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Expr::Const(a), Expr::Const(b)) => a.total_cmp(b),
            (Expr::Symbol(a), Expr::Symbol(b)) => a.cmp(b),
            (Expr::Sum(a), Expr::Sum(b)) => a.cmp(b),
            (Expr::Product(a), Expr::Product(b)) => a.cmp(b),
            (Expr::Power(b1, e1), Expr::Power(b2, e2)) => b1.cmp(b2).then_with(|| e1.cmp(e2)),
            (Expr::Function(k1, a1), Expr::Function(k2, a2)) => {
                k1.cmp(k2).then_with(|| a1.cmp(a2))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Expr::Const(c) => c.to_bits().hash(state),
            Expr::Symbol(s) => s.hash(state),
            Expr::Sum(v) | Expr::Product(v) => v.hash(state),
            Expr::Power(b, e) => {
                b.hash(state);
                e.hash(state);
            }
            Expr::Function(k, args) => {
                k.hash(state);
                args.hash(state);
            }
        }
    }
}

/// Display gives text that `Expr::parse_expression` reads back.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Symbol(s) => write!(f, "{}", s),
            Expr::Sum(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Expr::Product(factors) => {
                for (i, t) in factors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    write!(f, "{}", t)?;
                }
                Ok(())
            }
            Expr::Power(base, exp) => {
                let wrap = |e: &Expr| match e {
                    Expr::Symbol(_) | Expr::Function(_, _) | Expr::Sum(_) => false,
                    Expr::Const(c) => *c < 0.0,
                    _ => true,
                };
                if wrap(base) {
                    write!(f, "({})", base)?;
                } else {
                    write!(f, "{}", base)?;
                }
                if wrap(exp) {
                    write!(f, "^({})", exp)
                } else {
                    write!(f, "^{}", exp)
                }
            }
            Expr::Function(kind, args) => {
                write!(f, "{}(", kind)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Expr::sum(vec![self, rhs])
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Expr::sum(vec![self, -rhs])
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Expr::product(vec![self, rhs])
    }
}

impl std::ops::Div for Expr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Expr::product(vec![self, rhs.powi(-1)])
    }
}

impl std::ops::Add<f64> for Expr {
    type Output = Self;

    fn add(self, rhs: f64) -> Self::Output {
        self + Expr::constant(rhs)
    }
}

impl std::ops::Sub<f64> for Expr {
    type Output = Self;

    fn sub(self, rhs: f64) -> Self::Output {
        self + Expr::constant(-rhs)
    }
}

impl std::ops::Mul<f64> for Expr {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        self * Expr::constant(rhs)
    }
}

impl std::ops::Div<f64> for Expr {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        self * Expr::constant(1.0 / rhs)
    }
}

impl std::ops::AddAssign for Expr {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.clone() + rhs;
    }
}

impl std::ops::SubAssign for Expr {
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.clone() - rhs;
    }
}

impl std::ops::MulAssign for Expr {
    fn mul_assign(&mut self, rhs: Self) {
        *self = self.clone() * rhs;
    }
}

impl std::ops::DivAssign for Expr {
    fn div_assign(&mut self, rhs: Self) {
        *self = self.clone() / rhs;
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Expr::product(vec![Expr::Const(-1.0), self])
    }
}

impl Expr {
    /// BASIC FEATURES

    /// Creates multiple symbols from a comma-separated string.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let vars = Expr::Symbols("j0, j1, j2");
    /// assert_eq!(vars.len(), 3);
    /// ```
    pub fn Symbols(symbols: &str) -> Vec<Expr> {
        symbols
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Expr::symbol)
            .collect()
    }

    pub fn constant(value: f64) -> Expr {
        Expr::Const(super::symbolic_simplify::chop(value))
    }

    pub fn symbol(name: &str) -> Expr {
        Expr::Symbol(name.to_string())
    }

    pub fn zero() -> Expr {
        Expr::Const(0.0)
    }

    pub fn one() -> Expr {
        Expr::Const(1.0)
    }

    pub fn pi() -> Expr {
        Expr::Const(PI)
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn sin(self) -> Expr {
        Expr::function(FuncKind::Sin, vec![self])
    }

    pub fn cos(self) -> Expr {
        Expr::function(FuncKind::Cos, vec![self])
    }

    pub fn tan(self) -> Expr {
        Expr::function(FuncKind::Tan, vec![self])
    }

    pub fn cot(self) -> Expr {
        Expr::function(FuncKind::Cot, vec![self])
    }

    pub fn asin(self) -> Expr {
        Expr::function(FuncKind::Asin, vec![self])
    }

    pub fn acos(self) -> Expr {
        Expr::function(FuncKind::Acos, vec![self])
    }

    pub fn abs(self) -> Expr {
        Expr::function(FuncKind::Abs, vec![self])
    }

    /// square root, stored as `self^0.5`
    pub fn sqrt(self) -> Expr {
        Expr::power(self, Expr::Const(0.5))
    }

    pub fn atan2(y: Expr, x: Expr) -> Expr {
        Expr::function(FuncKind::Atan2, vec![y, x])
    }

    pub fn pow(self, exponent: Expr) -> Expr {
        Expr::power(self, exponent)
    }

    pub fn powi(self, n: i32) -> Expr {
        Expr::power(self, Expr::Const(n as f64))
    }

    /// INSPECTION

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 1.0)
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// true when the expression has no symbols at all
    pub fn is_number(&self) -> bool {
        match self {
            Expr::Const(_) => true,
            Expr::Symbol(_) => false,
            Expr::Sum(v) | Expr::Product(v) | Expr::Function(_, v) => v.iter().all(Expr::is_number),
            Expr::Power(b, e) => b.is_number() && e.is_number(),
        }
    }

    /// terms of a sum; a single non-sum is one term, zero has none
    pub fn terms(&self) -> Vec<Expr> {
        match self {
            Expr::Sum(v) => v.clone(),
            e if e.is_zero() => Vec::new(),
            e => vec![e.clone()],
        }
    }

    /// factors of a product; one has none
    pub fn factors(&self) -> Vec<Expr> {
        match self {
            Expr::Product(v) => v.clone(),
            e if e.is_one() => Vec::new(),
            e => vec![e.clone()],
        }
    }

    /// Node count: 1 + children, function heads weigh one extra.
    /// All tie-breaks between candidate solutions use it.
    pub fn complexity(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Symbol(_) => 1,
            Expr::Sum(v) | Expr::Product(v) => 1 + v.iter().map(Expr::complexity).sum::<usize>(),
            Expr::Power(b, e) => 1 + b.complexity() + e.complexity(),
            Expr::Function(_, args) => 2 + args.iter().map(Expr::complexity).sum::<usize>(),
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Symbol(s) => {
                out.insert(s.clone());
            }
            Expr::Sum(v) | Expr::Product(v) | Expr::Function(_, v) => {
                v.iter().for_each(|e| e.collect_symbols(out))
            }
            Expr::Power(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
        }
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        match self {
            Expr::Const(_) => false,
            Expr::Symbol(s) => s == name,
            Expr::Sum(v) | Expr::Product(v) | Expr::Function(_, v) => {
                v.iter().any(|e| e.contains_symbol(name))
            }
            Expr::Power(b, e) => b.contains_symbol(name) || e.contains_symbol(name),
        }
    }

    pub fn contains_any_symbol(&self, names: &[String]) -> bool {
        names.iter().any(|n| self.contains_symbol(n))
    }

    pub fn contains_subexpr(&self, sub: &Expr) -> bool {
        if self == sub {
            return true;
        }
        match self {
            Expr::Const(_) | Expr::Symbol(_) => false,
            Expr::Sum(v) | Expr::Product(v) | Expr::Function(_, v) => {
                v.iter().any(|e| e.contains_subexpr(sub))
            }
            Expr::Power(b, e) => b.contains_subexpr(sub) || e.contains_subexpr(sub),
        }
    }

    /// TRAVERSAL

    /// Rebuilds the node from mapped children through the normalizing constructors.
    pub fn map_children<F>(&self, mut f: F) -> Expr
    where
        F: FnMut(&Expr) -> Expr,
    {
        match self {
            Expr::Const(_) | Expr::Symbol(_) => self.clone(),
            Expr::Sum(v) => Expr::sum(v.iter().map(&mut f).collect()),
            Expr::Product(v) => Expr::product(v.iter().map(&mut f).collect()),
            Expr::Power(b, e) => {
                let b = f(b.as_ref());
                let e = f(e.as_ref());
                Expr::power(b, e)
            }
            Expr::Function(kind, args) => Expr::function(*kind, args.iter().map(&mut f).collect()),
        }
    }

    /// Simultaneous substitution of symbols.
    pub fn substitute(&self, map: &HashMap<String, Expr>) -> Expr {
        if map.is_empty() {
            return self.clone();
        }
        match self {
            Expr::Symbol(s) => match map.get(s) {
                Some(e) => e.clone(),
                None => self.clone(),
            },
            _ => self.map_children(|c| c.substitute(map)),
        }
    }

    pub fn substitute_variable(&self, name: &str, value: &Expr) -> Expr {
        let mut map = HashMap::new();
        map.insert(name.to_string(), value.clone());
        self.substitute(&map)
    }

    pub fn set_variable(&self, name: &str, value: f64) -> Expr {
        self.substitute_variable(name, &Expr::constant(value))
    }

    /// Simultaneous replacement of arbitrary subexpressions, outermost first;
    /// replacements are not traversed again.
    pub fn replace_all(&self, pairs: &[(Expr, Expr)]) -> Expr {
        if let Some((_, rhs)) = pairs.iter().find(|(lhs, _)| lhs == self) {
            return rhs.clone();
        }
        match self {
            Expr::Const(_) | Expr::Symbol(_) => self.clone(),
            _ => self.map_children(|c| c.replace_all(pairs)),
        }
    }
}

/// Creates several symbols at once: `let (x, y) = symbols!(x, y);`
#[macro_export]
macro_rules! symbols {
    ($($var:ident),+ $(,)?) => {
        ($($crate::symbolic::symbolic_engine::Expr::symbol(stringify!($var))),+)
    };
}
