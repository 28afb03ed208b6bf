//! Orchestrates a single `cm` invocation: resolve a fixture, run the
//! optimization pipeline, and hand the result to the interpreter or the
//! JS emitter (spec §6).

use cm_cache::Cache;
use cm_mir::MirProgram;

use crate::cli::EmitArg;
use crate::config::{Config, EmitTarget};
use crate::error::DrvError;
use crate::fixtures;
use crate::mir_dump;

pub struct Session {
    pub cache: Cache,
}

impl Session {
    pub fn new(cache_dir: impl Into<std::path::PathBuf>) -> Self {
        Self { cache: Cache::new(cache_dir) }
    }

    pub fn load_fixture(&self, name: &str) -> Result<(MirProgram, &'static str), DrvError> {
        fixtures::build(name).ok_or_else(|| DrvError::UnknownFixture(name.to_string(), fixtures::FIXTURE_NAMES.join(", ")))
    }

    pub fn optimize(&self, program: &mut MirProgram, opt_level: u8, verbose: bool) {
        let state = cm_mir::run_optimization_passes(program, opt_level, verbose);
        tracing::info!(target: "cm_drv::session", ?state, opt_level, "optimization pipeline finished");
    }

    pub fn build(&self, config: &Config) -> Result<String, DrvError> {
        let (mut program, _entry) = self.load_fixture(&config.fixture)?;
        self.optimize(&mut program, config.opt_level, config.verbose);

        match config.emit {
            EmitTarget::Mir => Ok(mir_dump::dump(&program)),
            EmitTarget::Js => {
                let js = cm_jsgen::compile(&program, &cm_jsgen::JsGenOptions { module_name: config.fixture.clone() })?;
                Ok(js)
            }
        }
    }

    pub fn run(&self, fixture: &str, entry: Option<&str>, opt_level: u8, verbose: bool) -> Result<cm_interp::Value, DrvError> {
        let (mut program, default_entry) = self.load_fixture(fixture)?;
        self.optimize(&mut program, opt_level, verbose);
        let entry_name = entry.unwrap_or(default_entry);
        cm_interp::execute(&program, entry_name).map_err(DrvError::from)
    }
}

impl From<EmitArg> for EmitTarget {
    fn from(value: EmitArg) -> Self {
        match value {
            EmitArg::Mir => EmitTarget::Mir,
            EmitArg::Js => EmitTarget::Js,
        }
    }
}
