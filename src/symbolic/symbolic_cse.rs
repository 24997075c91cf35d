//! Common subexpression elimination.
//!
//! `CseTable` lives for one code generation pass. Every temporary it hands out is
//! remembered together with the block scope it was defined in, so a later request for
//! the same subexpression reuses the temporary only where the generated code can see
//! it: in the defining block or in a block nested inside it.
use crate::symbolic::symbolic_engine::Expr;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct CseEntry {
    pub expr: Expr,
    pub name: String,
    pub scope: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct CseTable {
    entries: Vec<CseEntry>,
    index: HashMap<Expr, Vec<usize>>,
    scope: Vec<usize>,
    next_scope: usize,
    prefix: String,
}

impl Default for CseTable {
    fn default() -> Self {
        CseTable::new("x")
    }
}

fn worth_naming(e: &Expr) -> bool {
    match e {
        Expr::Const(_) | Expr::Symbol(_) => false,
        // a negated symbol is cheaper inline
        Expr::Product(v) => !(v.len() == 2 && matches!((&v[0], &v[1]), (Expr::Const(_), Expr::Symbol(_)))),
        _ => true,
    }
}

fn count_occurrences(e: &Expr, counts: &mut HashMap<Expr, usize>) {
    if !worth_naming(e) {
        if let Expr::Product(v) = e {
            v.iter().for_each(|c| count_occurrences(c, counts));
        }
        return;
    }
    let seen = counts.entry(e.clone()).or_insert(0);
    *seen += 1;
    if *seen > 1 {
        return;
    }
    match e {
        Expr::Sum(v) | Expr::Product(v) | Expr::Function(_, v) => {
            v.iter().for_each(|c| count_occurrences(c, counts))
        }
        Expr::Power(b, x) => {
            count_occurrences(b, counts);
            count_occurrences(x, counts);
        }
        Expr::Const(_) | Expr::Symbol(_) => {}
    }
}

impl CseTable {
    pub fn new(prefix: &str) -> CseTable {
        CseTable {
            entries: Vec::new(),
            index: HashMap::new(),
            scope: Vec::new(),
            next_scope: 0,
            prefix: prefix.to_string(),
        }
    }

    pub fn enter_scope(&mut self) {
        self.next_scope += 1;
        self.scope.push(self.next_scope);
    }

    pub fn exit_scope(&mut self) {
        self.scope.pop();
    }

    pub fn depth(&self) -> usize {
        self.scope.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn visible(&self, entry: &CseEntry) -> bool {
        entry.scope.len() <= self.scope.len() && self.scope[..entry.scope.len()] == entry.scope[..]
    }

    /// Name of a visible temporary holding `e`, the innermost one if several.
    pub fn lookup(&self, e: &Expr) -> Option<&str> {
        self.index.get(e).and_then(|ids| {
            ids.iter()
                .rev()
                .map(|&i| &self.entries[i])
                .find(|entry| self.visible(entry))
                .map(|entry| entry.name.as_str())
        })
    }

    fn insert(&mut self, e: Expr, value: Expr) -> (String, Expr) {
        let name = format!("{}{}", self.prefix, self.entries.len());
        let id = self.entries.len();
        self.entries.push(CseEntry {
            expr: e.clone(),
            name: name.clone(),
            scope: self.scope.clone(),
        });
        self.index.entry(e).or_default().push(id);
        (name, value)
    }

    fn rewrite(
        &mut self,
        e: &Expr,
        counts: &HashMap<Expr, usize>,
        out: &mut Vec<(String, Expr)>,
    ) -> Expr {
        if matches!(e, Expr::Const(_) | Expr::Symbol(_)) {
            return e.clone();
        }
        if let Some(name) = self.lookup(e) {
            return Expr::symbol(name);
        }
        let rebuilt = match e {
            Expr::Sum(v) => Expr::Sum(v.iter().map(|c| self.rewrite(c, counts, out)).collect()),
            Expr::Product(v) => {
                Expr::Product(v.iter().map(|c| self.rewrite(c, counts, out)).collect())
            }
            Expr::Power(b, x) => {
                let b = self.rewrite(b, counts, out);
                let x = self.rewrite(x, counts, out);
                Expr::Power(b.boxed(), x.boxed())
            }
            Expr::Function(kind, args) => {
                Expr::Function(*kind, args.iter().map(|c| self.rewrite(c, counts, out)).collect())
            }
            Expr::Const(_) | Expr::Symbol(_) => e.clone(),
        };
        if worth_naming(e) && counts.get(e).copied().unwrap_or(0) >= 2 {
            let (name, value) = self.insert(e.clone(), rebuilt);
            out.push((name.clone(), value));
            return Expr::Symbol(name);
        }
        rebuilt
    }

    /// Rewrites `exprs` with temporaries for every subexpression that occurs at least
    /// twice among them or already has a visible temporary. Returns the new assignments
    /// in dependency order and the rewritten expressions.
    pub fn extract(&mut self, exprs: &[Expr]) -> (Vec<(String, Expr)>, Vec<Expr>) {
        let mut counts = HashMap::new();
        for e in exprs {
            count_occurrences(e, &mut counts);
        }
        let mut assignments = Vec::new();
        let rewritten = exprs
            .iter()
            .map(|e| self.rewrite(e, &counts, &mut assignments))
            .collect();
        (assignments, rewritten)
    }
}

/// One-shot extraction with a fresh table.
pub fn extract_cse(exprs: &[Expr]) -> (Vec<(String, Expr)>, Vec<Expr>) {
    CseTable::default().extract(exprs)
}
