#[cfg(test)]
mod tests {
    use crate::codegen::evaluator::TreeEvaluator;
    use crate::codegen::ik_runtime::{IKPI, IkSolution, IkValues, ik_candidates};
    use crate::codegen::rust_generator::{GeneratorSettings, RustGenerator, lower};
    use crate::codegen::solution_layout::raw_pose_names;
    use crate::ik::ik_errors::IkError;
    use crate::ik::ik_solver::{IkMode, IkSolver, SolverSettings};
    use crate::ik::kinematics::KinematicChain;
    use crate::ik::sample_chains::{
        arm_on_rail, planar_arm, polar_arm, roll_pitch_roll_wrist, spherical_wrist_arm,
    };
    use crate::ik::solver_tree::{
        JointRef, SolutionValues, SolverChain, SolverNode, SolverSolution, SolverTree,
    };
    use crate::ik::variables::JointKind;
    use crate::symbolic::symbolic_engine::Expr;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;
    use rand::Rng;
    use std::io::{Read, Write};

    fn compile(chain: &KinematicChain, mode: IkMode, free_joints: Vec<usize>) -> SolverTree {
        IkSolver::new(SolverSettings { mode, free_joints })
            .solve(chain)
            .unwrap()
    }

    fn evaluator(tree: &SolverTree) -> TreeEvaluator {
        TreeEvaluator::new(tree, &GeneratorSettings::default()).unwrap()
    }

    fn pose_of(m: &Matrix4<f64>) -> ([f64; 9], [f64; 3]) {
        (
            std::array::from_fn(|k| m[(k / 3, k % 3)]),
            std::array::from_fn(|i| m[(i, 3)]),
        )
    }

    /// distance of two angles on the circle
    fn angle_gap(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(2.0 * IKPI);
        d.min(2.0 * IKPI - d)
    }

    fn reproduces(chain: &KinematicChain, values: &[f64], original: &[f64], tol: f64) -> bool {
        chain.joints.iter().zip(values.iter().zip(original)).all(|(joint, (v, o))| {
            match joint.kind {
                JointKind::Hinge => angle_gap(*v, *o) < tol,
                JointKind::Slider => (v - o).abs() < tol,
            }
        })
    }

    fn position_error(chain: &KinematicChain, values: &[f64], target: &Matrix4<f64>) -> f64 {
        let m = chain.forward_numeric(values).unwrap();
        (0..3).map(|i| (m[(i, 3)] - target[(i, 3)]).abs()).fold(0.0, f64::max)
    }

    fn pose_error(chain: &KinematicChain, values: &[f64], target: &Matrix4<f64>) -> f64 {
        let m = chain.forward_numeric(values).unwrap();
        (m - target).abs().max()
    }

    /// one hinge `j0` whose candidates are `values`
    fn one_joint_tree(values: SolutionValues, add_pi: bool) -> SolverTree {
        let solution = SolverSolution {
            name: "j0".to_string(),
            values,
            add_pi,
            kind: JointKind::Hinge,
        };
        vec![SolverNode::Chain(SolverChain {
            solve_vars: vec![JointRef {
                name: "j0".to_string(),
                chain_index: 0,
                kind: JointKind::Hinge,
            }],
            free_vars: vec![],
            pose: raw_pose_names().iter().map(|n| Expr::symbol(n)).collect(),
            tree: vec![
                SolverNode::Solution(solution),
                SolverNode::StoreSolution {
                    all_vars: vec!["j0".to_string()],
                },
            ],
        })]
    }

    fn at_x(x: f64) -> ([f64; 9], [f64; 3]) {
        ([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], [x, 0.5, 0.0])
    }

    fn p(s: &str) -> Expr {
        Expr::parse_expression(s).unwrap()
    }

    #[test]
    fn test_lowering() {
        assert_eq!(lower(&p("x^2")), "(x * x)");
        assert_eq!(lower(&p("1/x")), "(1.0 / x)");
        assert_eq!(lower(&p("sqrt(x)")), "ik_sqrt_checked(x)?");
        assert_eq!(lower(&p("acos(x)")), "ik_acos_checked(x)?");
        assert_eq!(lower(&p("atan2(y, x)")), "ik_atan2(y, x)");
        // half-integer powers keep the sqrt guard
        assert_eq!(lower(&p("1/sqrt(x)")), "(1.0 / (ik_sqrt_checked(x)?))");
        assert_eq!(lower(&p("sqrt(x)*x")), "(ik_sqrt_checked(x)? * x)");
        assert_eq!(lower(&p("x^(-1.5)")), "(1.0 / (ik_sqrt_checked(x)? * x))");
        assert!(!lower(&p("sqrt(x)*x")).contains("powf"));
    }

    #[test]
    fn test_candidate_expansion() {
        let c = ik_candidates(IkValues::Cosines, &[0.5], false, true, 1e-4);
        assert_eq!(c.len(), 2);
        assert_relative_eq!(c[0][0], 0.5f64.acos());
        assert_relative_eq!(c[1][0], -(0.5f64.acos()));
        let s = ik_candidates(IkValues::Sines, &[1.0], false, true, 1e-4);
        // asin(1) and pi - asin(1) coincide
        assert_eq!(s.len(), 1);
        let turned = ik_candidates(IkValues::Angles, &[0.3], true, true, 1e-4);
        assert_eq!(turned.len(), 2);
        assert_relative_eq!(turned[1][0], 0.3 - IKPI);
        assert_relative_eq!(turned[1][2], -(0.3f64.cos()));
        assert!(ik_candidates(IkValues::Cosines, &[1.2], false, true, 1e-4).is_empty());
        let nan = ik_candidates(IkValues::Cosines, &[f64::NAN], false, true, 1e-4);
        assert_eq!(nan, vec![[0.0, 0.0, 1.0]]);
        let sliders = ik_candidates(IkValues::Angles, &[0.25, 0.25 + 1e-6, 0.4], false, false, 1e-4);
        assert_eq!(sliders.len(), 2);
    }

    #[test]
    fn test_generated_api_and_guards() {
        let tree = compile(&spherical_wrist_arm(), IkMode::SixD, vec![]);
        let source = RustGenerator::new(GeneratorSettings::default()).generate(&tree).unwrap();
        assert!(source.starts_with("// Analytical inverse kinematics generated by RustedIK."));
        assert!(source.contains(
            "pub fn ik(eetrans: &[f64; 3], eerot: &[f64; 9], pfree: &[f64]) -> Option<Vec<IkSolution>> {"
        ));
        assert!(source.contains("pub fn get_num_free_parameters() -> usize { 0 }"));
        assert!(source.contains("pub fn get_free_parameters() -> Vec<usize> { vec![] }"));
        assert!(source.contains("pub fn get_num_joints() -> usize { 6 }"));
        assert!(source.contains("pub fn ik_acos_checked(x: f64) -> Option<f64>"));
        assert!(source.contains("pub const IK_BRANCH_TOLERANCE: f64 = 0.0001;"));
        assert!(source.contains("in ik_candidates("));
        assert!(source.contains("let evalcond = "));
        assert!(source.contains("solutions.push(IkSolution {"));
        assert!(!source.contains("fn main()"));
        // every block is closed
        assert_eq!(source.matches('{').count(), source.matches('}').count());
    }

    #[test]
    fn test_generation_is_deterministic_and_reentrant() {
        let generator = RustGenerator::new(GeneratorSettings::default());
        let arm = compile(&spherical_wrist_arm(), IkMode::SixD, vec![]);
        let wrist = compile(&roll_pitch_roll_wrist(), IkMode::Rotation3D, vec![]);
        let first = generator.generate(&arm).unwrap();
        let other = generator.generate(&wrist).unwrap();
        let again = generator.generate(&arm).unwrap();
        assert_eq!(first, again);
        assert_ne!(first, other);
        let fresh = RustGenerator::new(GeneratorSettings::default()).generate(&wrist).unwrap();
        assert_eq!(other, fresh);
    }

    #[test]
    fn test_main_is_emitted_and_written() {
        let tree = compile(&planar_arm(1.0, 0.5), IkMode::Translation, vec![]);
        let settings = GeneratorSettings {
            emit_main: true,
            header: "planar arm\nsecond line".to_string(),
            ..GeneratorSettings::default()
        };
        let source = RustGenerator::new(settings).generate(&tree).unwrap();
        assert!(source.starts_with("// planar arm\n// second line\n"));
        assert!(source.contains("fn main() {"));
        assert!(source.contains("std::process::exit(1);"));
        assert!(source.contains("let solfree = vec![0.0; sol.get_free().len()];"));
        assert!(!source.contains("get_solution(pfree)"));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        let mut back = String::new();
        file.reopen().unwrap().read_to_string(&mut back).unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn test_emitted_module_solves_with_rustc() {
        // needs a rustc on the path
        let available = std::process::Command::new("rustc")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success());
        if !available {
            return;
        }
        let chain = spherical_wrist_arm();
        let tree = compile(&chain, IkMode::SixD, vec![]);
        let settings = GeneratorSettings {
            emit_main: true,
            ..GeneratorSettings::default()
        };
        let source = RustGenerator::new(settings).generate(&tree).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("arm_ik.rs");
        let binary = dir.path().join("arm_ik");
        std::fs::write(&module, &source).unwrap();
        let built = std::process::Command::new("rustc")
            .args(["--edition", "2021", "-o"])
            .arg(&binary)
            .arg(&module)
            .output()
            .unwrap();
        assert!(built.status.success(), "{}", String::from_utf8_lossy(&built.stderr));

        let original = [0.3, -0.7, 1.1, 0.5, 1.4, -2.0];
        let target = chain.forward_numeric(&original).unwrap();
        let args: Vec<String> = (0..3)
            .flat_map(|i| (0..4).map(move |j| (i, j)))
            .map(|(i, j)| format!("{}", target[(i, j)]))
            .collect();
        let run = std::process::Command::new(&binary).args(&args).output().unwrap();
        assert!(run.status.success());
        let stdout = String::from_utf8_lossy(&run.stdout);
        let printed: Vec<Vec<f64>> = stdout
            .lines()
            .filter(|l| l.starts_with("sol"))
            .filter_map(|l| l.split_once(": "))
            .map(|(_, joints)| joints.split(", ").map(|v| v.parse::<f64>().unwrap()).collect())
            .collect();
        assert!(!printed.is_empty());
        assert!(
            printed.iter().any(|values| reproduces(&chain, values, &original, 1e-6)),
            "{:?} not in\n{}",
            original,
            stdout
        );
        // the evaluator agrees on the number of solutions
        let (eerot, eetrans) = pose_of(&target);
        assert_eq!(evaluator(&tree).solve(&eerot, &eetrans, &[]).unwrap().len(), printed.len());
    }

    #[test]
    fn test_unbound_symbol_is_rejected() {
        let tree = one_joint_tree(SolutionValues::Angles(vec![p("atan2(mystery, px)")]), false);
        let generated = RustGenerator::new(GeneratorSettings::default()).generate(&tree);
        assert!(matches!(generated, Err(IkError::CodeGeneration(_))));
        assert!(matches!(
            TreeEvaluator::new(&tree, &GeneratorSettings::default()),
            Err(IkError::CodeGeneration(_))
        ));
    }

    #[test]
    fn test_duplicates_are_suppressed() {
        let twice = one_joint_tree(
            SolutionValues::Angles(vec![p("atan2(py, px)"), p("atan2(py, px) + 2*pi")]),
            false,
        );
        let (eerot, eetrans) = at_x(0.5);
        let solutions = evaluator(&twice).solve(&eerot, &eetrans, &[]).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_relative_eq!(solutions[0].get_solution(&[])[0], IKPI / 4.0, epsilon = 1e-12);
        let turned = one_joint_tree(SolutionValues::Angles(vec![p("atan2(py, px)")]), true);
        let solutions = evaluator(&turned).solve(&eerot, &eetrans, &[]).unwrap();
        assert_eq!(solutions.len(), 2);
        assert_relative_eq!(solutions[1].get_solution(&[])[0], IKPI / 4.0 - IKPI, epsilon = 1e-12);
    }

    #[test]
    fn test_domain_guard_aborts_solve() {
        let tree = one_joint_tree(SolutionValues::Angles(vec![p("asin(px)")]), false);
        let ev = evaluator(&tree);
        let (eerot, eetrans) = at_x(1.5);
        assert!(ev.solve(&eerot, &eetrans, &[]).is_none());
        let (eerot, eetrans) = at_x(1.00005);
        let solutions = ev.solve(&eerot, &eetrans, &[]).unwrap();
        assert_relative_eq!(solutions[0].get_solution(&[])[0], IKPI / 2.0);
        // cosines outside the band give no candidate at all
        let cosines = one_joint_tree(SolutionValues::Cosines(vec![p("px")]), false);
        let (eerot, eetrans) = at_x(-1.2);
        assert!(evaluator(&cosines).solve(&eerot, &eetrans, &[]).is_none());
    }

    #[test]
    fn test_spherical_wrist_arm_round_trip() {
        let chain = spherical_wrist_arm();
        let tree = compile(&chain, IkMode::SixD, vec![]);
        let ev = evaluator(&tree);
        assert_eq!(ev.get_num_joints(), 6);
        assert_eq!(ev.get_num_free_parameters(), 0);
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let original: Vec<f64> = (0..6)
                .map(|i| {
                    if i == 2 || i == 4 {
                        rng.random_range(0.2..2.8)
                    } else {
                        rng.random_range(-3.0..3.0)
                    }
                })
                .collect();
            let target = chain.forward_numeric(&original).unwrap();
            let (eerot, eetrans) = pose_of(&target);
            let solutions = ev
                .solve(&eerot, &eetrans, &[])
                .unwrap_or_else(|| panic!("no solution for {:?}", original));
            assert!(
                solutions
                    .iter()
                    .any(|s| reproduces(&chain, &s.get_solution(&[]), &original, 1e-6)),
                "{:?} not among {} solutions",
                original,
                solutions.len()
            );
        }
    }

    #[test]
    fn test_planar_elbow_up_and_down() {
        let chain = planar_arm(1.0, 0.5);
        let tree = compile(&chain, IkMode::Translation, vec![]);
        let ev = evaluator(&tree);
        let original = [0.7, 1.1];
        let target = chain.forward_numeric(&original).unwrap();
        let (eerot, eetrans) = pose_of(&target);
        let solutions = ev.solve(&eerot, &eetrans, &[]).unwrap();
        assert_eq!(solutions.len(), 2);
        for s in &solutions {
            assert!(position_error(&chain, &s.get_solution(&[]), &target) < 1e-9);
        }
        assert!(solutions.iter().any(|s| reproduces(&chain, &s.get_solution(&[]), &original, 1e-9)));
        // beyond l1 + l2
        assert!(ev.solve(&eerot, &[2.0, 0.0, 0.0], &[]).is_none());
    }

    #[test]
    fn test_arm_on_rail_with_free_slider() {
        let chain = arm_on_rail();
        let tree = compile(&chain, IkMode::SixD, vec![0]);
        let ev = evaluator(&tree);
        assert_eq!(ev.get_num_free_parameters(), 1);
        assert_eq!(ev.get_free_parameters(), vec![0]);
        assert_eq!(ev.get_num_joints(), 7);
        let source = RustGenerator::new(GeneratorSettings::default()).generate(&tree).unwrap();
        assert!(source.contains("let j0 = pfree[0];"));
        assert!(source.contains("pub fn get_free_parameters() -> Vec<usize> { vec![0] }"));
        let mut rng = rand::rng();
        for _ in 0..200 {
            let mut original = vec![rng.random_range(-0.5..0.5)];
            for i in 0..6 {
                original.push(if i == 2 || i == 4 {
                    rng.random_range(0.2..2.8)
                } else {
                    rng.random_range(-3.0..3.0)
                });
            }
            let target = chain.forward_numeric(&original).unwrap();
            let (eerot, eetrans) = pose_of(&target);
            let pfree = [original[0]];
            let solutions = ev.solve(&eerot, &eetrans, &pfree).unwrap();
            assert!(
                solutions
                    .iter()
                    .any(|s| reproduces(&chain, &s.get_solution(&pfree), &original, 1e-6))
            );
            assert!(solutions.iter().all(|s| s.get_solution(&pfree)[0] == original[0]));
        }
        // the free value is required
        let (eerot, eetrans) = pose_of(&chain.forward_numeric(&[0.0; 7]).unwrap());
        assert!(ev.solve(&eerot, &eetrans, &[]).is_none());
    }

    #[test]
    fn test_wrist_rotation_round_trip() {
        let chain = roll_pitch_roll_wrist();
        let tree = compile(&chain, IkMode::Rotation3D, vec![]);
        let ev = evaluator(&tree);
        let mut rng = rand::rng();
        for _ in 0..200 {
            let original = [
                rng.random_range(-3.0..3.0),
                rng.random_range(0.2..2.8),
                rng.random_range(-3.0..3.0),
            ];
            let target = chain.forward_numeric(&original).unwrap();
            let (eerot, eetrans) = pose_of(&target);
            let solutions = ev.solve(&eerot, &eetrans, &[]).unwrap();
            assert!(solutions.iter().all(|s| s.get_free().is_empty()));
            assert!(
                solutions
                    .iter()
                    .any(|s| reproduces(&chain, &s.get_solution(&[]), &original, 1e-6))
            );
        }
    }

    #[test]
    fn test_wrist_degenerate_branch() {
        let chain = roll_pitch_roll_wrist();
        let tree = compile(&chain, IkMode::Rotation3D, vec![]);
        let ev = evaluator(&tree);
        // middle joint at zero: only j0 + j2 is determined
        let target = chain.forward_numeric(&[0.4, 0.0, 0.5]).unwrap();
        let (eerot, eetrans) = pose_of(&target);
        let solutions: Vec<IkSolution> = ev.solve(&eerot, &eetrans, &[]).unwrap();
        let parameterized: Vec<&IkSolution> =
            solutions.iter().filter(|s| !s.get_free().is_empty()).collect();
        assert!(!parameterized.is_empty());
        for s in parameterized {
            assert_eq!(s.get_free(), &[0]);
            for x in [0.0, 0.4, -1.3] {
                let values = s.get_solution(&[x]);
                assert_relative_eq!(values[0], x, epsilon = 1e-12);
                assert!(pose_error(&chain, &values, &target) < 1e-9);
            }
        }
    }

    #[test]
    fn test_polar_arm_reach() {
        let chain = polar_arm();
        let tree = compile(&chain, IkMode::Translation, vec![]);
        let ev = evaluator(&tree);
        let mut rng = rand::rng();
        for _ in 0..50 {
            let original = [rng.random_range(-3.0..3.0), rng.random_range(0.3..1.0)];
            let target = chain.forward_numeric(&original).unwrap();
            let (eerot, eetrans) = pose_of(&target);
            let solutions = ev.solve(&eerot, &eetrans, &[]).unwrap();
            for s in &solutions {
                assert!(position_error(&chain, &s.get_solution(&[]), &target) < 1e-9);
            }
            assert!(
                solutions
                    .iter()
                    .any(|s| reproduces(&chain, &s.get_solution(&[]), &original, 1e-9))
            );
        }
    }
}
