// Runtime support shared by every generated inverse kinematics module.
// The crate compiles this file for the tree evaluator, and the code generator pastes
// its text unchanged at the top of each emitted module, so it may only use std.

pub const IKPI: f64 = std::f64::consts::PI;
pub const IK2PI: f64 = 2.0 * std::f64::consts::PI;
pub const IKPI_2: f64 = std::f64::consts::FRAC_PI_2;
/// asin/acos arguments beyond this magnitude abort the solve
pub const IK_DOMAIN_LIMIT: f64 = 1.0001;
/// sqrt radicands below this value abort the solve
pub const IK_RADICAND_LIMIT: f64 = -1e-5;

/// One joint of a solution: `freeind` is the free parameter the joint follows,
/// the value is `foffset + fmul * pfree[freeind]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkVariable {
    pub foffset: f64,
    pub fmul: f64,
    pub freeind: Option<usize>,
    /// sliders are lengths and are not wrapped into [-pi, pi]
    pub wrap: bool,
}

impl IkVariable {
    pub fn fixed(value: f64, wrap: bool) -> IkVariable {
        IkVariable {
            foffset: value,
            fmul: 0.0,
            freeind: None,
            wrap,
        }
    }
}

/// One complete joint vector, possibly parameterized by free joints.
#[derive(Debug, Clone, PartialEq)]
pub struct IkSolution {
    pub basesol: Vec<IkVariable>,
    /// indices into `basesol` of the free parameters this solution exposes
    pub vfree: Vec<usize>,
}

impl IkSolution {
    /// Joint values for the given free parameter values.
    pub fn get_solution(&self, pfree: &[f64]) -> Vec<f64> {
        self.basesol
            .iter()
            .map(|v| {
                let mut value = v.foffset;
                if let Some(i) = v.freeind {
                    value += v.fmul * pfree.get(i).copied().unwrap_or(0.0);
                }
                if v.wrap {
                    if value > IKPI {
                        value -= IK2PI;
                    } else if value < -IKPI {
                        value += IK2PI;
                    }
                }
                value
            })
            .collect()
    }

    pub fn get_free(&self) -> &[usize] {
        &self.vfree
    }
}

pub fn ik_asin(x: f64) -> f64 {
    if x <= -1.0 {
        -IKPI_2
    } else if x >= 1.0 {
        IKPI_2
    } else {
        x.asin()
    }
}

pub fn ik_acos(x: f64) -> f64 {
    if x <= -1.0 {
        IKPI
    } else if x >= 1.0 {
        0.0
    } else {
        x.acos()
    }
}

pub fn ik_sqrt(x: f64) -> f64 {
    if x <= 0.0 { 0.0 } else { x.sqrt() }
}

/// `None` aborts the whole solve
pub fn ik_sqrt_checked(x: f64) -> Option<f64> {
    if x < IK_RADICAND_LIMIT { None } else { Some(ik_sqrt(x)) }
}

pub fn ik_asin_checked(x: f64) -> Option<f64> {
    if x < -IK_DOMAIN_LIMIT || x > IK_DOMAIN_LIMIT { None } else { Some(ik_asin(x)) }
}

pub fn ik_acos_checked(x: f64) -> Option<f64> {
    if x < -IK_DOMAIN_LIMIT || x > IK_DOMAIN_LIMIT { None } else { Some(ik_acos(x)) }
}

/// atan2 that never returns NaN
pub fn ik_atan2(y: f64, x: f64) -> f64 {
    if y.is_nan() {
        if x.is_nan() { 0.0 } else { IKPI_2 }
    } else if x.is_nan() {
        0.0
    } else {
        y.atan2(x)
    }
}

/// How the raw values of a solved joint turn into joint angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkValues {
    Angles,
    /// each value is a cosine: `+acos` and `-acos`
    Cosines,
    /// each value is a sine: `asin` and `pi - asin`
    Sines,
}

/// Valid `[angle, sin, cos]` candidates of one joint, in a fixed order.
///
/// Cosines and sines within the domain band give two angles each, a NaN gives the one
/// angle that satisfies any value. `add_pi` appends every candidate turned by a half
/// turn toward zero. Hinge angles are wrapped into [-pi, pi]. A candidate whose sine
/// and cosine (slider: value) match an earlier one within `tolerance` is dropped.
pub fn ik_candidates(form: IkValues, raw: &[f64], add_pi: bool, hinge: bool, tolerance: f64) -> Vec<[f64; 3]> {
    let mut cands: Vec<Option<[f64; 3]>> = Vec::with_capacity(4 * raw.len());
    for &x in raw {
        match form {
            IkValues::Angles => cands.push(Some([x, x.sin(), x.cos()])),
            IkValues::Cosines => {
                if x.is_nan() {
                    cands.push(Some([0.0, 0.0, 1.0]));
                    cands.push(None);
                } else if x < -IK_DOMAIN_LIMIT || x > IK_DOMAIN_LIMIT {
                    cands.push(None);
                    cands.push(None);
                } else {
                    let a = ik_acos(x);
                    let s = a.sin();
                    cands.push(Some([a, s, x]));
                    cands.push(Some([-a, -s, x]));
                }
            }
            IkValues::Sines => {
                if x.is_nan() {
                    cands.push(Some([IKPI_2, 1.0, 0.0]));
                    cands.push(None);
                } else if x < -IK_DOMAIN_LIMIT || x > IK_DOMAIN_LIMIT {
                    cands.push(None);
                    cands.push(None);
                } else {
                    let a = ik_asin(x);
                    let c = a.cos();
                    cands.push(Some([a, x, c]));
                    cands.push(Some([IKPI - a, x, -c]));
                }
            }
        }
    }
    if add_pi {
        let turned: Vec<Option<[f64; 3]>> = cands
            .iter()
            .map(|c| c.map(|[v, s, co]| [if v > 0.0 { v - IKPI } else { v + IKPI }, -s, -co]))
            .collect();
        cands.extend(turned);
    }
    let mut out: Vec<[f64; 3]> = Vec::with_capacity(cands.len());
    for [mut v, s, c] in cands.into_iter().flatten() {
        if hinge {
            if v > IKPI {
                v -= IK2PI;
            } else if v < -IKPI {
                v += IK2PI;
            }
        }
        let duplicate = out.iter().any(|[ov, os, oc]| {
            if hinge {
                (oc - c).abs() < tolerance && (os - s).abs() < tolerance
            } else {
                (ov - v).abs() < tolerance
            }
        });
        if !duplicate {
            out.push([v, s, c]);
        }
    }
    out
}
