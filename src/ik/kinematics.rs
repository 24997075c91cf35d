//! # Kinematic chain builder
//!
//! A serial chain is a list of joints, each with a constant transform on its left and on
//! its right. `KinematicChain::build_equations` turns it into symbolic link transforms in
//! alias form:
//!
//! `T = C0 * J0(q0) * C1 * J1(q1) * ... * J(n-1)(q(n-1)) * Cn`
//!
//! where `C0 = left_0`, `Ck = right_(k-1) * left_k` and `Cn = right_(n-1)`. The constant
//! `C0` (and `Cn` unless only the position is solved) moves into the target pose, and the
//! remaining links are accumulated from both ends at every split point.
//!# Example
//! ```
//! use RustedIK::ik::kinematics::{ChainJoint, KinematicChain, translation};
//! use nalgebra::Vector3;
//! let chain = KinematicChain::new(vec![
//!     ChainJoint::hinge(Vector3::z()),
//!     ChainJoint::hinge(Vector3::z()).with_left(translation(1.0, 0.0, 0.0)).with_right(translation(0.5, 0.0, 0.0)),
//! ]).unwrap();
//! let pose = chain.forward_numeric(&[0.0, std::f64::consts::FRAC_PI_2]).unwrap();
//! assert!((pose[(1, 3)] - 0.5).abs() < 1e-12);
//! ```
use crate::ik::ik_errors::IkError;
use crate::ik::ik_solver::IkMode;
use crate::ik::variables::{JointKind, JointRole, JointVariable, VariableRegistry};
use crate::symbolic::symbolic_engine::Expr;
use log::{debug, info};
use nalgebra::{Matrix4, Rotation3, Unit, Vector3};

/// Homogeneous translation matrix.
pub fn translation(x: f64, y: f64, z: f64) -> Matrix4<f64> {
    Matrix4::new_translation(&Vector3::new(x, y, z))
}

/// Homogeneous rotation about `axis` by `angle`.
pub fn rotation(axis: Vector3<f64>, angle: f64) -> Matrix4<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle).to_homogeneous()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainJoint {
    pub kind: JointKind,
    pub axis: Vector3<f64>,
    /// the joint moves by `coeff[0] * q + coeff[1]`
    pub coeff: [f64; 2],
    pub left: Matrix4<f64>,
    pub right: Matrix4<f64>,
    pub role: JointRole,
}

impl ChainJoint {
    pub fn hinge(axis: Vector3<f64>) -> ChainJoint {
        ChainJoint {
            kind: JointKind::Hinge,
            axis,
            coeff: [1.0, 0.0],
            left: Matrix4::identity(),
            right: Matrix4::identity(),
            role: JointRole::Solve,
        }
    }

    pub fn slider(axis: Vector3<f64>) -> ChainJoint {
        ChainJoint {
            kind: JointKind::Slider,
            ..ChainJoint::hinge(axis)
        }
    }

    pub fn with_left(mut self, left: Matrix4<f64>) -> ChainJoint {
        self.left = left;
        self
    }

    pub fn with_right(mut self, right: Matrix4<f64>) -> ChainJoint {
        self.right = right;
        self
    }

    pub fn with_coeff(mut self, mul: f64, offset: f64) -> ChainJoint {
        self.coeff = [mul, offset];
        self
    }

    pub fn free(mut self) -> ChainJoint {
        self.role = JointRole::Free;
        self
    }

    /// Numeric motion of the joint for the value `q`.
    pub fn motion(&self, q: f64) -> Matrix4<f64> {
        let amount = self.coeff[0] * q + self.coeff[1];
        match self.kind {
            JointKind::Hinge => rotation(self.axis, amount),
            JointKind::Slider => Matrix4::new_translation(&(self.axis * amount)),
        }
    }
}

/// Affine transform with symbolic entries: row-major rotation and translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub rot: [Expr; 9],
    pub trans: [Expr; 3],
}

impl Transform {
    pub fn identity() -> Transform {
        Transform {
            rot: std::array::from_fn(|k| {
                if k % 4 == 0 {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }),
            trans: std::array::from_fn(|_| Expr::zero()),
        }
    }

    pub fn from_matrix(m: &Matrix4<f64>) -> Transform {
        Transform {
            rot: std::array::from_fn(|k| Expr::constant(m[(k / 3, k % 3)])),
            trans: std::array::from_fn(|i| Expr::constant(m[(i, 3)])),
        }
    }

    /// The target pose: `r00..r22` and `px, py, pz`.
    pub fn pose_symbols() -> Transform {
        Transform::named("r", "p")
    }

    /// The pose exactly as the caller passes it in.
    pub fn raw_pose_symbols() -> Transform {
        Transform::named("ee_r", "ee_p")
    }

    fn named(rot: &str, trans: &str) -> Transform {
        let axes = ["x", "y", "z"];
        Transform {
            rot: std::array::from_fn(|k| Expr::symbol(&format!("{}{}{}", rot, k / 3, k % 3))),
            trans: std::array::from_fn(|i| Expr::symbol(&format!("{}{}", trans, axes[i]))),
        }
    }

    pub fn get(&self, i: usize, j: usize) -> &Expr {
        &self.rot[3 * i + j]
    }

    pub fn mul(&self, other: &Transform) -> Transform {
        let rot = std::array::from_fn(|k| {
            let (i, j) = (k / 3, k % 3);
            Expr::sum(
                (0..3)
                    .map(|m| self.get(i, m).clone() * other.get(m, j).clone())
                    .collect(),
            )
        });
        let trans = std::array::from_fn(|i| {
            let mut terms: Vec<Expr> = (0..3)
                .map(|m| self.get(i, m).clone() * other.trans[m].clone())
                .collect();
            terms.push(self.trans[i].clone());
            Expr::sum(terms)
        });
        Transform { rot, trans }
    }

    /// Inverse of a rigid transform: transposed rotation, rotated negated translation.
    pub fn affine_inverse(&self) -> Transform {
        let rot: [Expr; 9] = std::array::from_fn(|k| self.get(k % 3, k / 3).clone());
        let trans = std::array::from_fn(|i| {
            -Expr::sum(
                (0..3)
                    .map(|m| rot[3 * i + m].clone() * self.trans[m].clone())
                    .collect(),
            )
        });
        Transform { rot, trans }
    }

    pub fn map<F: Fn(&Expr) -> Expr>(&self, f: F) -> Transform {
        Transform {
            rot: std::array::from_fn(|k| f(&self.rot[k])),
            trans: std::array::from_fn(|i| f(&self.trans[i])),
        }
    }

    /// rotation entries followed by the translation
    pub fn entries(&self) -> Vec<Expr> {
        self.rot.iter().chain(self.trans.iter()).cloned().collect()
    }
}

/// Symbolic motion of one joint in alias form.
fn joint_transform(joint: &ChainJoint, var: &JointVariable) -> Transform {
    let [mul, offset] = joint.coeff;
    let k = joint.axis;
    let mut t = Transform::identity();
    match joint.kind {
        JointKind::Hinge => {
            let (s, c) = (var.svar.clone(), var.cvar.clone());
            let sin_t = s.clone() * (mul * offset.cos()) + c.clone() * offset.sin();
            let cos_t = c * offset.cos() - s * (mul * offset.sin());
            let skew = [0.0, -k[2], k[1], k[2], 0.0, -k[0], -k[1], k[0], 0.0];
            t.rot = std::array::from_fn(|idx| {
                let (i, j) = (idx / 3, idx % 3);
                let delta = if i == j { 1.0 } else { 0.0 };
                Expr::sum(vec![
                    cos_t.clone() * delta,
                    sin_t.clone() * skew[idx],
                    (Expr::one() - cos_t.clone()) * (k[i] * k[j]),
                ])
                .expand()
            });
        }
        JointKind::Slider => {
            let amount = var.var.clone() * mul + offset;
            t.trans = std::array::from_fn(|i| (amount.clone() * k[i]).expand());
        }
    }
    t
}

/// Symbolic forward kinematics of a chain, split and accumulated at every link.
#[derive(Debug, Clone)]
pub struct ChainEquations {
    pub registry: VariableRegistry,
    /// `[J0, C1, J1, ..., J(n-1)]`, plus `Cn` when the end link stays in the chain
    pub links: Vec<Transform>,
    /// `accum_right_all[i] = links[i] * ... * links[last]`, the last entry is the identity
    pub accum_right_all: Vec<Transform>,
    /// `accum_left_inv_all[i] = (links[0] * ... * links[i-1])^-1`
    pub accum_left_inv_all: Vec<Transform>,
    /// the two accumulations at joint `k`, plus the full chain end at index `n`
    pub accum_right: Vec<Transform>,
    pub accum_left_inv: Vec<Transform>,
    /// twelve entries of `C0^-1 * Tee * Cn^-1` in terms of the raw pose symbols
    pub pose: Vec<Expr>,
}

impl ChainEquations {
    /// Target pose after removing the constant end links.
    pub fn target() -> Transform {
        Transform::pose_symbols()
    }
}

#[derive(Debug, Clone)]
pub struct KinematicChain {
    pub joints: Vec<ChainJoint>,
}

impl KinematicChain {
    pub fn new(joints: Vec<ChainJoint>) -> Result<KinematicChain, IkError> {
        if joints.is_empty() {
            return Err(IkError::InvalidChain("chain has no joints".to_string()));
        }
        let mut checked = Vec::with_capacity(joints.len());
        for (i, mut joint) in joints.into_iter().enumerate() {
            let norm = joint.axis.norm();
            if norm < 1e-12 || !norm.is_finite() {
                return Err(IkError::InvalidChain(format!("joint {} has no axis", i)));
            }
            joint.axis /= norm;
            let mul = joint.coeff[0];
            let valid_mul = match joint.kind {
                JointKind::Hinge => mul == 1.0 || mul == -1.0,
                JointKind::Slider => mul != 0.0 && mul.is_finite(),
            };
            if !valid_mul {
                return Err(IkError::InvalidChain(format!(
                    "joint {} has unsupported multiplier {}",
                    i, mul
                )));
            }
            checked.push(joint);
        }
        Ok(KinematicChain { joints: checked })
    }

    /// Marks the joints at the given indices as free parameters.
    pub fn with_free_joints(mut self, free: &[usize]) -> Result<KinematicChain, IkError> {
        for &i in free {
            let joint = self
                .joints
                .get_mut(i)
                .ok_or_else(|| IkError::InvalidChain(format!("no joint {} to free", i)))?;
            joint.role = JointRole::Free;
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Joint variables `j0, j1, ...` in chain order.
    pub fn variables(&self) -> Result<VariableRegistry, IkError> {
        let vars = self
            .joints
            .iter()
            .enumerate()
            .map(|(i, j)| JointVariable::new(&format!("j{}", i), i, j.kind, j.role))
            .collect::<Result<Vec<_>, _>>()?;
        VariableRegistry::new(vars)
    }

    /// End-effector pose for the given joint values.
    pub fn forward_numeric(&self, values: &[f64]) -> Result<Matrix4<f64>, IkError> {
        if values.len() != self.joints.len() {
            return Err(IkError::InvalidChain(format!(
                "expected {} joint values, got {}",
                self.joints.len(),
                values.len()
            )));
        }
        Ok(self
            .joints
            .iter()
            .zip(values)
            .fold(Matrix4::identity(), |acc, (joint, &q)| {
                acc * joint.left * joint.motion(q) * joint.right
            }))
    }

    /// Builds the symbolic links for `mode` and accumulates them from both ends.
    pub fn build_equations(&self, mode: IkMode) -> Result<ChainEquations, IkError> {
        let registry = self.variables()?;
        let simplify = |e: &Expr| registry.simplify(e);
        // constants between the joints
        let mut constants: Vec<Matrix4<f64>> = Vec::with_capacity(self.joints.len() + 1);
        let mut pending = Matrix4::identity();
        for joint in &self.joints {
            constants.push(pending * joint.left);
            pending = joint.right;
        }
        constants.push(pending);

        let first = Transform::from_matrix(&constants[0]);
        let last_matrix = constants[self.joints.len()];
        let mut links = Vec::with_capacity(2 * self.joints.len());
        for (i, (joint, var)) in self.joints.iter().zip(registry.all()).enumerate() {
            if i > 0 {
                links.push(Transform::from_matrix(&constants[i]));
            }
            links.push(joint_transform(joint, var));
        }
        let last = if mode == IkMode::Translation {
            links.push(Transform::from_matrix(&last_matrix));
            Transform::identity()
        } else {
            Transform::from_matrix(&last_matrix)
        };

        let mut accum_right_all = vec![Transform::identity()];
        for link in links.iter().rev() {
            let next = link.mul(&accum_right_all[accum_right_all.len() - 1]).map(simplify);
            accum_right_all.push(next);
        }
        accum_right_all.reverse();
        let mut accum_left_inv_all = vec![Transform::identity()];
        for link in &links {
            let next = link
                .affine_inverse()
                .mul(&accum_left_inv_all[accum_left_inv_all.len() - 1])
                .map(simplify);
            accum_left_inv_all.push(next);
        }
        debug!("accumulated {} links", links.len());

        // joint k sits at link 2k; the chain end closes the list
        let mut indices: Vec<usize> = (0..self.joints.len()).map(|k| 2 * k).collect();
        indices.push(links.len());
        let accum_right = indices.iter().map(|&i| accum_right_all[i].clone()).collect();
        let accum_left_inv = indices.iter().map(|&i| accum_left_inv_all[i].clone()).collect();

        let pose = first
            .affine_inverse()
            .mul(&Transform::raw_pose_symbols())
            .mul(&last.affine_inverse())
            .entries()
            .iter()
            .map(Expr::expand)
            .collect();
        info!(
            "built {} symbolic links for {} joints ({} mode)",
            links.len(),
            self.joints.len(),
            mode
        );
        Ok(ChainEquations {
            registry,
            links,
            accum_right_all,
            accum_left_inv_all,
            accum_right,
            accum_left_inv,
            pose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;
    use std::f64::consts::FRAC_PI_2;

    fn planar() -> KinematicChain {
        KinematicChain::new(vec![
            ChainJoint::hinge(Vector3::z()),
            ChainJoint::hinge(Vector3::z())
                .with_left(translation(1.0, 0.0, 0.0))
                .with_right(translation(0.5, 0.0, 0.0)),
        ])
        .unwrap()
    }

    fn alias_env(values: &[f64]) -> HashMap<String, f64> {
        let mut env = HashMap::new();
        for (i, q) in values.iter().enumerate() {
            env.insert(format!("j{}", i), *q);
            env.insert(format!("sj{}", i), q.sin());
            env.insert(format!("cj{}", i), q.cos());
        }
        env
    }

    #[test]
    fn test_chain_validation() {
        assert!(KinematicChain::new(vec![]).is_err());
        assert!(KinematicChain::new(vec![ChainJoint::hinge(Vector3::zeros())]).is_err());
        let doubled = ChainJoint::hinge(Vector3::z()).with_coeff(2.0, 0.0);
        assert!(KinematicChain::new(vec![doubled]).is_err());
        let slider = ChainJoint::slider(Vector3::x()).with_coeff(2.0, 0.1);
        assert!(KinematicChain::new(vec![slider]).is_ok());
        assert!(planar().with_free_joints(&[5]).is_err());
    }

    #[test]
    fn test_forward_numeric() {
        let chain = planar();
        let t = chain.forward_numeric(&[FRAC_PI_2, 0.0]).unwrap();
        assert_relative_eq!(t[(0, 3)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(t[(1, 3)], 1.5, epsilon = 1e-12);
        assert!(chain.forward_numeric(&[0.0]).is_err());
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform::from_matrix(&(rotation(Vector3::new(1.0, 1.0, 0.0), 0.7) * translation(0.1, 0.2, 0.3)));
        let back = t.mul(&t.affine_inverse());
        let id = Transform::identity();
        for (a, b) in back.entries().iter().zip(id.entries()) {
            assert_relative_eq!(a.as_const().unwrap(), b.as_const().unwrap(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_symbolic_matches_numeric() {
        let chain = KinematicChain::new(vec![
            ChainJoint::hinge(Vector3::z()).with_left(translation(0.0, 0.0, 0.3)),
            ChainJoint::hinge(Vector3::y()).with_coeff(-1.0, 0.4),
            ChainJoint::slider(Vector3::x()).with_coeff(1.0, 0.1),
            ChainJoint::hinge(Vector3::new(1.0, 0.0, 1.0)).with_right(translation(0.2, 0.0, 0.0)),
        ])
        .unwrap();
        let values = [0.3, -1.1, 0.25, 2.0];
        let eqs = chain.build_equations(IkMode::SixD).unwrap();
        let env = alias_env(&values);
        let numeric = chain.forward_numeric(&values).unwrap();
        // full chain = C0 * accum_right[0] * Cn
        let c0 = translation(0.0, 0.0, 0.3);
        let cn = translation(0.2, 0.0, 0.0);
        let inner = c0.try_inverse().unwrap() * numeric * cn.try_inverse().unwrap();
        let sym = &eqs.accum_right[0];
        for k in 0..9 {
            assert_relative_eq!(sym.rot[k].eval(&env).unwrap(), inner[(k / 3, k % 3)], epsilon = 1e-9);
        }
        for i in 0..3 {
            assert_relative_eq!(sym.trans[i].eval(&env).unwrap(), inner[(i, 3)], epsilon = 1e-9);
        }
        assert_eq!(eqs.accum_right.len(), 5);
        assert_eq!(eqs.accum_right[4], Transform::identity());
    }

    #[test]
    fn test_left_inverse_times_right_is_chain() {
        let chain = planar();
        let eqs = chain.build_equations(IkMode::Translation).unwrap();
        let env = alias_env(&[0.4, -0.9]);
        // accum_left_inv[k]^-1 * accum_right[k] is the whole chain for every k
        let whole = &eqs.accum_right_all[0];
        for k in 0..eqs.accum_left_inv_all.len() {
            let t = eqs.accum_left_inv_all[k].affine_inverse().mul(&eqs.accum_right_all[k]);
            for (a, b) in t.entries().iter().zip(whole.entries()) {
                assert_relative_eq!(a.eval(&env).unwrap(), b.eval(&env).unwrap(), epsilon = 1e-9);
            }
        }
        // the end link stays in the chain when only the position is solved
        assert_relative_eq!(whole.trans[0].eval(&env).unwrap(), 0.4f64.cos() + 0.5 * (-0.5f64).cos(), epsilon = 1e-9);
    }

    #[test]
    fn test_pose_moves_end_links() {
        let chain = KinematicChain::new(vec![
            ChainJoint::hinge(Vector3::z()).with_left(translation(0.0, 0.0, 0.5)),
            ChainJoint::hinge(Vector3::x()).with_right(translation(0.0, 0.0, 0.2)),
        ])
        .unwrap();
        let eqs = chain.build_equations(IkMode::SixD).unwrap();
        // pz' = pz - 0.5 - 0.2 * r22
        let expected = Expr::parse_expression("ee_pz - 0.5 - 0.2*ee_r22").unwrap();
        assert_eq!(eqs.pose[11], expected);
        assert_eq!(eqs.pose[0], Expr::symbol("ee_r00"));
    }
}
