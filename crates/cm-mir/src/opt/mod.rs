//! The optimization pipeline (spec §4.4-4.10): scalar optimizations,
//! redundancy elimination, control-flow simplification, and LICM.

pub mod control_flow;
pub mod loop_opt;
pub mod redundancy;
pub mod scalar;

pub use control_flow::{Inlining, SimplifyCfg, TailCallElimination};
pub use loop_opt::Licm;
pub use redundancy::{Dce, DeadStoreElimination, Gvn, ProgramDce};
pub use scalar::{ConstantFolding, CopyPropagation, Sccp};

use crate::pass::{OptLevel, Pass};

const INLINE_SIZE_THRESHOLD: usize = 12;

/// Standard pass order (spec §4.4): `SCCP -> ConstantFolding -> GVN ->
/// CopyPropagation -> DSE -> SimplifyCFG -> Inlining -> TailCallElimination
/// -> LICM -> DCE`. At O2+ the scalar trio (SCCP, ConstantFolding,
/// CopyPropagation) reruns after LICM.
pub fn standard_pipeline(level: OptLevel) -> Vec<Box<dyn Pass>> {
    let mut passes: Vec<Box<dyn Pass>> = vec![
        Box::new(Sccp),
        Box::new(ConstantFolding),
        Box::new(Gvn),
        Box::new(CopyPropagation),
        Box::new(DeadStoreElimination),
        Box::new(SimplifyCfg),
        Box::new(Inlining::new(INLINE_SIZE_THRESHOLD)),
        Box::new(TailCallElimination),
        Box::new(Licm),
        Box::new(Dce),
    ];

    if level >= OptLevel::O2 {
        passes.push(Box::new(Sccp));
        passes.push(Box::new(ConstantFolding));
        passes.push(Box::new(CopyPropagation));
    }

    passes
}
