//! # Inverse kinematics compiler
//!
//! From a serial chain to a solver tree:
//! 1. `kinematics` builds the symbolic forward kinematics in alias form (`sj0`, `cj0`...);
//! 2. `ik_solver` splits the chain into a position part and a rotation part;
//! 3. `translation` and `rotation` solve one joint after another with the single-joint
//!    solvers of `trig_equations`;
//! 4. the result is a `solver_tree::SolverTree` for the code generator.
///
///# Example
/// ```
/// use RustedIK::ik::ik_solver::{IkMode, IkSolver, SolverSettings};
/// use RustedIK::ik::kinematics::{ChainJoint, KinematicChain, translation};
/// use nalgebra::Vector3;
/// let chain = KinematicChain::new(vec![
///     ChainJoint::hinge(Vector3::z()),
///     ChainJoint::hinge(Vector3::z()).with_left(translation(1.0, 0.0, 0.0)).with_right(translation(0.8, 0.0, 0.0)),
/// ]).unwrap();
/// let settings = SolverSettings { mode: IkMode::Translation, free_joints: vec![] };
/// let tree = IkSolver::new(settings).solve(&chain).unwrap();
/// assert_eq!(tree.len(), 1);
/// ```
pub mod ik_solver;
/// compilation errors
pub mod ik_errors;
/// joint variables, their aliases and the registry that simplifies in alias form
pub mod variables;
/// the branching plan shared by the generator and the evaluator, with its completeness check
pub mod solver_tree;
/// chain description, numeric forward kinematics and symbolic link accumulation
pub mod kinematics;
/// linear equations in the sine and cosine of one joint
pub mod trig_equations;
/// position equations
pub mod translation;
/// rotation equations, quotients and degenerate branches
pub mod rotation;
/// small chains for tests, benches and examples
pub mod sample_chains;
