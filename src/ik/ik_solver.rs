//! # Inverse kinematics solver
//!
//! Turns a kinematic chain into a solver tree. In the full 6D mode the chain is split
//! at the first joint after which it no longer moves the end position: the joints in
//! front of that point are solved from position equations, the three behind it from
//! the rotation that is left once the front is known.
//!
//! ```text
//! FreeParameter(free joints, outermost first)
//!   Chain(solve/free joints, pose)
//!     Solution(translation joints)...
//!     Rotation(new_rij)
//!       rotation plan ... StoreSolution
//! ```
//!
//! Any failure aborts the whole compilation; no partial tree is returned.
use crate::ik::ik_errors::IkError;
use crate::ik::kinematics::{ChainEquations, KinematicChain};
use crate::ik::rotation::RotationSolver;
use crate::ik::solver_tree::{
    JointRef, SolverChain, SolverNode, SolverTree, TreeStats, check_completeness,
};
use crate::ik::translation::{PositionEquation, TranslationSolver, solve_translation_chain};
use crate::ik::variables::JointVariable;
use log::{info, warn};
use std::time::Instant;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum IkMode {
    /// full end effector pose, six solve joints
    #[strum(serialize = "6d")]
    SixD,
    /// end effector orientation, three solve joints
    #[strum(serialize = "rotation3d")]
    Rotation3D,
    /// end effector position
    #[strum(serialize = "translation")]
    Translation,
}

impl IkMode {
    /// Number of solve joints the mode needs; `None` when any positive count works.
    pub fn required_joints(&self) -> Option<usize> {
        match self {
            IkMode::SixD => Some(6),
            IkMode::Rotation3D => Some(3),
            IkMode::Translation => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub mode: IkMode,
    /// chain indices of the joints left to the caller
    pub free_joints: Vec<usize>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            mode: IkMode::SixD,
            free_joints: Vec::new(),
        }
    }
}

pub struct IkSolver {
    pub settings: SolverSettings,
}

fn joint_refs(vars: &[&JointVariable]) -> Vec<JointRef> {
    vars.iter()
        .map(|v| JointRef {
            name: v.name.clone(),
            chain_index: v.chain_index,
            kind: v.kind,
        })
        .collect()
}

fn names(vars: &[&JointVariable]) -> Vec<String> {
    vars.iter().map(|v| v.name.clone()).collect()
}

impl IkSolver {
    pub fn new(settings: SolverSettings) -> IkSolver {
        IkSolver { settings }
    }

    /// Compiles the chain into a solver tree.
    pub fn solve(&self, chain: &KinematicChain) -> Result<SolverTree, IkError> {
        let begin = Instant::now();
        let chain = chain.clone().with_free_joints(&self.settings.free_joints)?;
        let eqs = chain.build_equations(self.settings.mode)?;
        let solve_vars = eqs.registry.solve_vars();
        let free_vars = eqs.registry.free_vars();
        match self.settings.mode.required_joints() {
            Some(n) if solve_vars.len() != n => {
                return Err(IkError::InvalidChain(format!(
                    "{} mode needs {} solve joints, the chain has {}",
                    self.settings.mode,
                    n,
                    solve_vars.len()
                )));
            }
            None if solve_vars.is_empty() => {
                return Err(IkError::InvalidChain("no joint left to solve".to_string()));
            }
            _ => {}
        }
        let all_names = eqs.registry.names();
        let store = vec![SolverNode::StoreSolution { all_vars: all_names }];
        let inner = match self.settings.mode {
            IkMode::SixD => self.solve_full(&eqs, &solve_vars, store)?,
            IkMode::Rotation3D => self.solve_rotation(&eqs, &solve_vars, store)?,
            IkMode::Translation => self.solve_translation(&eqs, &solve_vars, store)?,
        };
        let mut tree = vec![SolverNode::Chain(SolverChain {
            solve_vars: joint_refs(&solve_vars),
            free_vars: joint_refs(&free_vars),
            pose: eqs.pose.clone(),
            tree: inner,
        })];
        for free in free_vars.iter().rev() {
            tree = vec![SolverNode::FreeParameter {
                name: free.name.clone(),
                tree,
            }];
        }
        let stores = check_completeness(&tree)?;
        let stats = TreeStats::of(&tree)?;
        info!(
            "solver tree for {} joints in {:?}: {} store leaves, {} branches, depth {}",
            chain.len(),
            begin.elapsed(),
            stores,
            stats.count("branch"),
            stats.max_depth
        );
        if stats.count("free_parameter") > free_vars.len() {
            warn!(
                "{} joint(s) are left free by degenerate branches",
                stats.count("free_parameter") - free_vars.len()
            );
        }
        Ok(tree)
    }

    /// First solve joint whose downstream chain no longer moves the end position.
    fn separation_index(eqs: &ChainEquations, solve_vars: &[&JointVariable]) -> Result<usize, IkError> {
        solve_vars
            .iter()
            .map(|v| v.chain_index)
            .find(|&i| {
                let trans = &eqs.accum_right[i].trans;
                !solve_vars
                    .iter()
                    .filter(|v| v.chain_index >= i)
                    .any(|v| trans.iter().any(|e| v.appears_in(e)))
            })
            .ok_or_else(|| IkError::NoSeparationPoint {
                variables: names(solve_vars),
            })
    }

    /// Highest index at or below `start` whose accumulated rotation has no zero entry.
    fn rotation_index(eqs: &ChainEquations, start: usize) -> Option<usize> {
        (0..=start)
            .rev()
            .find(|&i| eqs.accum_right[i].rot.iter().all(|e| !e.is_zero()))
    }

    fn solve_full(
        &self,
        eqs: &ChainEquations,
        solve_vars: &[&JointVariable],
        store: SolverTree,
    ) -> Result<SolverTree, IkError> {
        let sep = Self::separation_index(eqs, solve_vars)?;
        let n = eqs.accum_right.len() - 1;
        let rot = Self::rotation_index(eqs, sep.min(n.saturating_sub(3))).unwrap_or_else(|| {
            warn!("no split with a full rotation, falling back to index 0");
            0
        });
        if rot != sep {
            return Err(IkError::NoSeparationPoint {
                variables: names(solve_vars),
            });
        }
        let rotation = &eqs.accum_right[sep].rot;
        let (rotvars, transvars): (Vec<&JointVariable>, Vec<&JointVariable>) = solve_vars
            .iter()
            .copied()
            .partition(|v| rotation.iter().any(|e| v.appears_in(e)));
        info!(
            "chain separates at joint {}: translation {:?}, rotation {:?}",
            sep,
            names(&transvars),
            names(&rotvars)
        );
        let positions = PositionEquation::at_splits(eqs, 2 * sep + 1);
        let mut tree = TranslationSolver::new(&eqs.registry, positions).solve(&transvars)?;
        let target = eqs.accum_left_inv[sep].mul(&ChainEquations::target());
        let transform = target.rot.iter().map(|e| eqs.registry.simplify(e)).collect();
        let plan = RotationSolver::new(&eqs.registry, &rotvars, store).solve(rotation, &rotvars)?;
        tree.push(SolverNode::Rotation { transform, tree: plan });
        Ok(tree)
    }

    fn solve_rotation(
        &self,
        eqs: &ChainEquations,
        solve_vars: &[&JointVariable],
        store: SolverTree,
    ) -> Result<SolverTree, IkError> {
        let rotation = &eqs.accum_right[0].rot;
        let missing: Vec<String> = solve_vars
            .iter()
            .filter(|v| !rotation.iter().any(|e| v.appears_in(e)))
            .map(|v| v.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(IkError::NoSeparationPoint { variables: missing });
        }
        let transform = ChainEquations::target().rot.to_vec();
        let plan = RotationSolver::new(&eqs.registry, solve_vars, store).solve(rotation, solve_vars)?;
        Ok(vec![SolverNode::Rotation { transform, tree: plan }])
    }

    fn solve_translation(
        &self,
        eqs: &ChainEquations,
        solve_vars: &[&JointVariable],
        store: SolverTree,
    ) -> Result<SolverTree, IkError> {
        let mut tree = solve_translation_chain(eqs, solve_vars)?;
        tree.extend(store);
        Ok(tree)
    }
}
