//! The pass framework: the `Pass` trait, the fixed-order pipeline, and
//! the convergence manager (spec §4.4).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::debug;

use crate::mir::{Function, MirProgram};

/// A transformation over one function (or, by default, every function in
/// a program). Implementors report whether they changed anything so the
/// pipeline can decide when to stop re-running them.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&mut self, func: &mut Function) -> bool;

    fn run_on_program(&mut self, program: &mut MirProgram) -> bool {
        let mut changed = false;
        for func in program.functions.iter_mut() {
            if func.is_too_complex() {
                debug!(target: "cm_mir::opt", pass = self.name(), function = %func.name, "skipping too-complex function");
                continue;
            }
            changed |= self.run(func);
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
}

impl OptLevel {
    pub fn from_u8(level: u8) -> Self {
        match level {
            0 => OptLevel::O0,
            1 => OptLevel::O1,
            2 => OptLevel::O2,
            _ => OptLevel::O3,
        }
    }

    /// Iteration cap by level, per spec §4.4.
    pub fn iteration_cap(self) -> usize {
        match self {
            OptLevel::O0 => 0,
            OptLevel::O1 => 3,
            OptLevel::O2 => 5,
            OptLevel::O3 => 7,
        }
    }
}

/// Instructions/blocks/CFG change recorded for one pipeline iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeMetrics {
    pub instructions_changed: u64,
    pub blocks_changed: u64,
    pub cfg_changed: bool,
}

impl ChangeMetrics {
    /// instructions=1, blocks=10, cfg=1000 (spec §4.4).
    pub fn weighted_total(&self) -> u64 {
        self.instructions_changed + self.blocks_changed * 10 + if self.cfg_changed { 1000 } else { 0 }
    }

    pub fn is_zero(&self) -> bool {
        self.instructions_changed == 0 && self.blocks_changed == 0 && !self.cfg_changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Converged,
    PracticallyConverged,
    CycleDetected,
    NotConverged,
}

const MINOR_CHANGE_THRESHOLD: usize = 2;
const HASH_HISTORY: usize = 8;

/// Tracks program hashes and change-metric history across iterations to
/// decide when a pipeline run should stop.
pub struct ConvergenceManager {
    hash_history: Vec<u64>,
    metric_history: Vec<ChangeMetrics>,
}

impl ConvergenceManager {
    pub fn new() -> Self {
        Self { hash_history: Vec::new(), metric_history: Vec::new() }
    }

    /// Feeds one iteration's result and returns the resulting state.
    pub fn record(&mut self, program_hash: u64, metrics: ChangeMetrics) -> ConvergenceState {
        if metrics.is_zero() {
            self.push(program_hash, metrics);
            return ConvergenceState::Converged;
        }

        if self.hash_history.contains(&program_hash) {
            self.push(program_hash, metrics);
            return ConvergenceState::CycleDetected;
        }
        if self.is_abab_pattern(metrics) {
            self.push(program_hash, metrics);
            return ConvergenceState::CycleDetected;
        }

        self.push(program_hash, metrics);

        if self.is_practically_converged() {
            return ConvergenceState::PracticallyConverged;
        }

        ConvergenceState::NotConverged
    }

    fn push(&mut self, hash: u64, metrics: ChangeMetrics) {
        self.hash_history.push(hash);
        if self.hash_history.len() > HASH_HISTORY {
            self.hash_history.remove(0);
        }
        self.metric_history.push(metrics);
    }

    fn is_practically_converged(&self) -> bool {
        let n = self.metric_history.len();
        if n >= MINOR_CHANGE_THRESHOLD {
            let recent = &self.metric_history[n - MINOR_CHANGE_THRESHOLD..];
            if recent.iter().all(|m| m.weighted_total() < 10 && !m.cfg_changed) {
                return true;
            }
        }
        if n >= 3 {
            let recent = &self.metric_history[n - 3..];
            let sum: u64 = recent.iter().map(|m| m.weighted_total()).sum();
            if sum < 20 {
                return true;
            }
        }
        false
    }

    /// Last four weighted totals forming an A,B,A,B pattern (A != B).
    fn is_abab_pattern(&self, latest: ChangeMetrics) -> bool {
        let n = self.metric_history.len();
        if n < 3 {
            return false;
        }
        let a2 = self.metric_history[n - 1].weighted_total();
        let b1 = self.metric_history[n - 2].weighted_total();
        let a1 = if n >= 3 { self.metric_history[n - 3].weighted_total() } else { return false };
        let b2 = latest.weighted_total();
        a1 == a2 && b1 == b2 && a1 != b1
    }
}

impl Default for ConvergenceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic structural hash of a program, used for cycle detection.
/// Not cryptographic; only needs to distinguish "same IR" from "different IR".
pub fn program_hash(program: &MirProgram) -> u64 {
    let mut hasher = DefaultHasher::new();
    for func in program.functions.iter() {
        func.name.as_str().hash(&mut hasher);
        func.blocks.len().hash(&mut hasher);
        for block in func.blocks.iter() {
            block.statements.len().hash(&mut hasher);
            format!("{:?}", block.terminator).hash(&mut hasher);
            for stmt in &block.statements {
                format!("{:?}", stmt).hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

struct PassRunCount {
    name: &'static str,
    count: u32,
}

/// Runs the standard pass order (spec §4.4) to convergence, honoring the
/// per-pass cap (30) and the per-level iteration cap.
pub struct PassManager {
    level: OptLevel,
}

impl PassManager {
    pub fn new(level: OptLevel) -> Self {
        Self { level }
    }

    pub fn run(&self, program: &mut MirProgram) -> ConvergenceState {
        if self.level == OptLevel::O0 {
            return ConvergenceState::Converged;
        }

        let mut convergence = ConvergenceManager::new();
        let mut run_counts: Vec<PassRunCount> = Vec::new();
        let mut last_changed: std::collections::HashMap<&'static str, bool> =
            std::collections::HashMap::new();

        for iteration in 0..self.level.iteration_cap() {
            let before_blocks: u64 = program.functions.iter().map(|f| f.blocks.len() as u64).sum();
            let before_stmts: u64 = program
                .functions
                .iter()
                .flat_map(|f| f.blocks.iter())
                .map(|b| b.statements.len() as u64)
                .sum();

            let mut iteration_changed = false;

            let mut passes = crate::opt::standard_pipeline(self.level);
            for pass in passes.iter_mut() {
                let cap_hit = run_counts
                    .iter()
                    .find(|c| c.name == pass.name())
                    .map(|c| c.count >= 30)
                    .unwrap_or(false);
                if cap_hit {
                    continue;
                }
                if iteration > 0 && last_changed.get(pass.name()) == Some(&false) {
                    continue;
                }

                let changed = pass.run_on_program(program);
                iteration_changed |= changed;
                last_changed.insert(pass.name(), changed);

                match run_counts.iter_mut().find(|c| c.name == pass.name()) {
                    Some(c) => c.count += 1,
                    None => run_counts.push(PassRunCount { name: pass.name(), count: 1 }),
                }
            }

            let after_blocks: u64 = program.functions.iter().map(|f| f.blocks.len() as u64).sum();
            let after_stmts: u64 = program
                .functions
                .iter()
                .flat_map(|f| f.blocks.iter())
                .map(|b| b.statements.len() as u64)
                .sum();

            let blocks_changed = before_blocks.abs_diff(after_blocks);
            let metrics = ChangeMetrics {
                instructions_changed: before_stmts.abs_diff(after_stmts),
                blocks_changed,
                cfg_changed: blocks_changed > 0,
            };

            let hash = program_hash(program);
            let state = convergence.record(hash, metrics);

            debug!(target: "cm_mir::opt", iteration, ?state, weighted = metrics.weighted_total(), "pipeline iteration");

            if !iteration_changed || !matches!(state, ConvergenceState::NotConverged) {
                return state;
            }
        }

        ConvergenceState::NotConverged
    }
}
