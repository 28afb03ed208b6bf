//! cm-mir - the MIR data model, control-flow/dominator/loop analyses, and
//! the optimization pipeline.
//!
//! This crate has no knowledge of source syntax or types beyond what
//! `cm-hir` hands it; it consumes and produces [`mir::MirProgram`] values.

pub mod analysis;
pub mod builder;
pub mod error;
pub mod ids;
pub mod mir;
pub mod opt;
pub mod pass;

pub use error::MirError;
pub use ids::{BlockId, LocalId};
pub use mir::{
    AggregateKind, BasicBlock, BinOp, CastKind, Constant, ConstantKind, Function, Global, Local,
    LocalFlags, MirProgram, Operand, Place, Projection, Rvalue, Statement, Terminator, UnOp, VTable,
};
pub use pass::{ConvergenceState, OptLevel, Pass, PassManager};

/// `run_optimization_passes(program, opt_level, debug) -> ()` (spec §6):
/// runs the per-function pipeline to convergence, then sweeps dead
/// functions and vtables at the whole-program level.
pub fn run_optimization_passes(program: &mut MirProgram, opt_level: u8, debug: bool) -> pass::ConvergenceState {
    let level = OptLevel::from_u8(opt_level);
    if debug {
        tracing::debug!(target: "cm_mir::opt", ?level, "starting optimization pipeline");
    }
    let state = PassManager::new(level).run(program);
    if level != OptLevel::O0 {
        opt::ProgramDce::new().run_on_program(program);
    }
    state
}
