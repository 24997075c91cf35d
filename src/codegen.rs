//! # Code generation
//!
//! Turns a solver tree into a standalone Rust module, and runs the same tree
//! numerically with the semantics of that module:
//! - `ik_runtime` holds the helpers shared by the crate and every generated module;
//! - `solution_layout` reads the joint layout and free parameter dependence off a tree;
//! - `rust_generator` writes the module text;
//! - `evaluator` solves poses directly from the tree.
///
///# Example
/// ```
/// use RustedIK::codegen::evaluator::TreeEvaluator;
/// use RustedIK::codegen::rust_generator::{GeneratorSettings, RustGenerator};
/// use RustedIK::ik::ik_solver::{IkMode, IkSolver, SolverSettings};
/// use RustedIK::ik::sample_chains::planar_arm;
/// let settings = SolverSettings { mode: IkMode::Translation, free_joints: vec![] };
/// let tree = IkSolver::new(settings).solve(&planar_arm(1.0, 0.5)).unwrap();
/// let source = RustGenerator::new(GeneratorSettings::default()).generate(&tree).unwrap();
/// assert!(source.contains("pub fn ik("));
/// let evaluator = TreeEvaluator::new(&tree, &GeneratorSettings::default()).unwrap();
/// let eerot = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
/// let solutions = evaluator.solve(&eerot, &[1.2, 0.4, 0.0], &[]).unwrap();
/// assert_eq!(solutions.len(), 2);
/// ```
pub mod rust_generator;
/// runtime helpers compiled into the crate and pasted into generated modules
pub mod ik_runtime;
pub mod solution_layout;
/// numeric execution of a solver tree
pub mod evaluator;
#[cfg(test)]
mod codegen_tests;
