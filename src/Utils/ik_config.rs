//! Task document of a compilation: solver mode and free joints, generator options
//! and logging, read with the task parser.
//!
//! ```text
//! solver
//!   mode: 6d
//!   free_joints: 0
//! generator
//!   emit_main: true
//!   branch_tolerance: 0.0001
//!   duplicate_tolerance: 0.0001
//! logging
//!   level: info
//!   file: ik.log
//! ```
use crate::Utils::logger::{init_logger, level_filter};
use crate::Utils::task_parser::{SectionMap, Value, parse_document_as};
use crate::codegen::rust_generator::{GeneratorSettings, RustGenerator};
use crate::ik::ik_errors::IkError;
use crate::ik::ik_solver::{IkMode, IkSolver, SolverSettings};
use crate::ik::kinematics::KinematicChain;
use log::{LevelFilter, info};
use std::path::Path;
use std::str::FromStr;

const SECTIONS: [(&str, &[&str]); 3] = [
    ("solver", &["mode", "free_joints"]),
    ("generator", &["emit_main", "branch_tolerance", "duplicate_tolerance"]),
    ("logging", &["level", "file"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct IkConfig {
    pub solver: SolverSettings,
    pub generator: GeneratorSettings,
    pub log_level: LevelFilter,
    pub log_file: Option<String>,
}

impl Default for IkConfig {
    fn default() -> Self {
        IkConfig {
            solver: SolverSettings::default(),
            generator: GeneratorSettings::default(),
            log_level: LevelFilter::Info,
            log_file: None,
        }
    }
}

fn invalid(section: &str, key: &str, what: &str) -> IkError {
    IkError::InvalidConfig(format!("{}.{}: {}", section, key, what))
}

/// the single value of `key`, if the key is present
fn single<'a>(map: &'a SectionMap, section: &str, key: &str) -> Result<Option<&'a Value>, IkError> {
    match map.get(key).map(Vec::as_slice) {
        None => Ok(None),
        Some([v]) => Ok(Some(v)),
        Some(_) => Err(invalid(section, key, "expected exactly one value")),
    }
}

fn text(map: &SectionMap, section: &str, key: &str) -> Result<Option<String>, IkError> {
    Ok(single(map, section, key)?.map(Value::to_string))
}

fn tolerance(map: &SectionMap, key: &str, default: f64) -> Result<f64, IkError> {
    match single(map, "generator", key)? {
        None => Ok(default),
        Some(v) => match v.as_float() {
            Some(t) if t > 0.0 && t.is_finite() => Ok(t),
            _ => Err(invalid("generator", key, "expected a positive number")),
        },
    }
}

impl IkConfig {
    /// Parses a task document; unknown sections and keys are errors, missing keys keep
    /// their defaults.
    pub fn from_str(input: &str) -> Result<IkConfig, IkError> {
        let document = parse_document_as(input).map_err(IkError::InvalidConfig)?;
        for (title, map) in &document {
            let Some((_, keys)) = SECTIONS.iter().find(|(name, _)| *name == title.as_str()) else {
                return Err(IkError::InvalidConfig(format!("unknown section {}", title)));
            };
            if let Some(key) = map.keys().find(|k| !keys.contains(&k.as_str())) {
                return Err(invalid(title, key, "unknown key"));
            }
        }
        let mut config = IkConfig::default();
        if let Some(map) = document.get("solver") {
            if let Some(mode) = text(map, "solver", "mode")? {
                config.solver.mode = IkMode::from_str(&mode)
                    .map_err(|_| invalid("solver", "mode", &format!("unknown mode {}", mode)))?;
            }
            if let Some(values) = map.get("free_joints") {
                let mut free = Vec::with_capacity(values.len());
                for v in values {
                    match v.as_integer() {
                        Some(i) if i >= 0 => free.push(i as usize),
                        _ => return Err(invalid("solver", "free_joints", "expected joint indices")),
                    }
                }
                config.solver.free_joints = free;
            }
        }
        if let Some(map) = document.get("generator") {
            if let Some(v) = single(map, "generator", "emit_main")? {
                config.generator.emit_main = v
                    .as_boolean()
                    .ok_or_else(|| invalid("generator", "emit_main", "expected true or false"))?;
            }
            config.generator.branch_tolerance =
                tolerance(map, "branch_tolerance", config.generator.branch_tolerance)?;
            config.generator.duplicate_tolerance =
                tolerance(map, "duplicate_tolerance", config.generator.duplicate_tolerance)?;
        }
        if let Some(map) = document.get("logging") {
            if let Some(level) = text(map, "logging", "level")? {
                config.log_level = level_filter(&level)?;
            }
            config.log_file = text(map, "logging", "file")?;
        }
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<IkConfig, IkError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| {
            IkError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        IkConfig::from_str(&input)
    }

    pub fn solver_settings(&self) -> SolverSettings {
        self.solver.clone()
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        self.generator.clone()
    }

    /// Installs the configured logger; `false` when one was already installed.
    pub fn init_logging(&self) -> Result<bool, IkError> {
        init_logger(self.log_level, self.log_file.as_deref())
    }

    /// Compiles `chain` and returns the generated module.
    pub fn generate(&self, chain: &KinematicChain) -> Result<String, IkError> {
        let tree = IkSolver::new(self.solver_settings()).solve(chain)?;
        let source = RustGenerator::new(self.generator_settings()).generate(&tree)?;
        info!("compiled a {}-joint chain in {} mode", chain.len(), self.solver.mode);
        Ok(source)
    }

    /// Compiles `chain` into the file at `path`.
    pub fn generate_to_file<P: AsRef<Path>>(&self, chain: &KinematicChain, path: P) -> Result<(), IkError> {
        let path = path.as_ref();
        let source = self.generate(chain)?;
        std::fs::write(path, source).map_err(|e| {
            IkError::CodeGeneration(format!("cannot write {}: {}", path.display(), e))
        })
    }
}
