//! Chains used by the tests, the benches and the documentation.
use crate::ik::kinematics::{ChainJoint, KinematicChain, translation};
use nalgebra::Vector3;

/// Link lengths of the sample arm: base height, upper arm, forearm, tool.
pub const ARM_LINKS: [f64; 4] = [0.3, 0.4, 0.35, 0.1];

fn arm_joints() -> Vec<ChainJoint> {
    let [d1, a2, a3, d6] = ARM_LINKS;
    vec![
        ChainJoint::hinge(Vector3::z()).with_left(translation(0.0, 0.0, d1)),
        ChainJoint::hinge(Vector3::y()),
        ChainJoint::hinge(Vector3::y()).with_left(translation(a2, 0.0, 0.0)),
        ChainJoint::hinge(Vector3::x()).with_left(translation(a3, 0.0, 0.0)),
        ChainJoint::hinge(Vector3::y()),
        ChainJoint::hinge(Vector3::x()).with_right(translation(d6, 0.0, 0.0)),
    ]
}

/// Six hinges: waist, shoulder, elbow and a spherical wrist (x, y, x).
pub fn spherical_wrist_arm() -> KinematicChain {
    KinematicChain { joints: arm_joints() }
}

/// The six-hinge arm on a vertical rail; the rail slider is joint 0.
pub fn arm_on_rail() -> KinematicChain {
    let mut joints = vec![ChainJoint::slider(Vector3::z())];
    joints.extend(arm_joints());
    KinematicChain { joints }
}

/// Two hinges about z with link lengths `l1` and `l2`.
pub fn planar_arm(l1: f64, l2: f64) -> KinematicChain {
    KinematicChain {
        joints: vec![
            ChainJoint::hinge(Vector3::z()),
            ChainJoint::hinge(Vector3::z())
                .with_left(translation(l1, 0.0, 0.0))
                .with_right(translation(l2, 0.0, 0.0)),
        ],
    }
}

/// Hinge about z carrying a slider along its x axis.
pub fn polar_arm() -> KinematicChain {
    KinematicChain {
        joints: vec![
            ChainJoint::hinge(Vector3::z()),
            ChainJoint::slider(Vector3::x()).with_coeff(1.0, 0.2),
        ],
    }
}

/// Three intersecting hinges x, y, x.
pub fn roll_pitch_roll_wrist() -> KinematicChain {
    KinematicChain {
        joints: vec![
            ChainJoint::hinge(Vector3::x()),
            ChainJoint::hinge(Vector3::y()),
            ChainJoint::hinge(Vector3::x()),
        ],
    }
}
