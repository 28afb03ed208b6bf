//! Loop-invariant code motion (spec §4.10).

use cm_util::FxHashSet;

use crate::analysis::cfg::compute_cfg_edges;
use crate::analysis::{Dominators, LoopForest};
use crate::ids::{BlockId, LocalId};
use crate::mir::{BasicBlock, Function, Operand, Place, Rvalue, Statement, Terminator};
use crate::pass::Pass;

pub struct Licm;

impl Pass for Licm {
    fn name(&self) -> &'static str {
        "licm"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        if func.is_too_complex() {
            return false;
        }
        let dom = Dominators::compute(func);
        let forest = LoopForest::compute(func, &dom);

        // Innermost loops first (highest depth first).
        let mut loops: Vec<_> = forest.loops.iter().enumerate().collect();
        loops.sort_by(|a, b| b.1.depth.cmp(&a.1.depth));

        let mut changed = false;
        for (_, natural_loop) in loops {
            if natural_loop.header == func.entry_block {
                continue; // pre-header creation can't precede entry_block
            }
            if hoist_one_loop(func, natural_loop, &dom) {
                changed = true;
            }
        }
        changed
    }
}

fn hoist_one_loop(func: &mut Function, natural_loop: &crate::analysis::NaturalLoop, dom: &Dominators) -> bool {
    let header = natural_loop.header;

    let modified = modified_locals(func, &natural_loop.blocks);

    let hoistable_indices: Vec<usize> = func.blocks[header]
        .statements
        .iter()
        .enumerate()
        .filter(|(_, stmt)| is_invariant(stmt, &modified))
        .map(|(i, _)| i)
        .collect();

    if hoistable_indices.is_empty() {
        return false;
    }

    let preheader = find_or_create_preheader(func, header, natural_loop, dom);

    let mut moved = Vec::new();
    let header_block = &mut func.blocks[header];
    for &i in hoistable_indices.iter().rev() {
        moved.push(header_block.statements.remove(i));
    }
    moved.reverse();
    func.blocks[preheader].statements.extend(moved);

    compute_cfg_edges(func);
    true
}

fn modified_locals(func: &Function, blocks: &FxHashSet<BlockId>) -> FxHashSet<LocalId> {
    let mut out = FxHashSet::default();
    for &b in blocks {
        for stmt in &func.blocks[b].statements {
            if let Statement::Assign(place, _, _) = stmt {
                out.insert(place.base());
            }
        }
        if let Terminator::Call { destination: Some(place), .. } = &func.blocks[b].terminator {
            out.insert(place.base());
        }
    }
    out
}

/// An assignment is invariant when its rvalue reads only constants or
/// locals untouched anywhere in the loop body, and it neither takes a
/// reference nor reads/writes through a projection.
fn is_invariant(stmt: &Statement, modified: &FxHashSet<LocalId>) -> bool {
    if stmt.is_no_opt() {
        return false;
    }
    let Statement::Assign(place, rvalue, _) = stmt else { return false };
    if !place.is_trivial() {
        return false;
    }
    if rvalue.has_ref() || rvalue.touches_projection() {
        return false;
    }
    let mut reads = Vec::new();
    rvalue.used_locals(&mut reads);
    reads.iter().all(|r| !modified.contains(r))
}

fn find_or_create_preheader(
    func: &mut Function,
    header: BlockId,
    natural_loop: &crate::analysis::NaturalLoop,
    dom: &Dominators,
) -> BlockId {
    let external_preds: Vec<BlockId> = func.blocks[header]
        .predecessors
        .iter()
        .copied()
        .filter(|p| !natural_loop.blocks.contains(p))
        .collect();

    if external_preds.len() == 1 {
        let candidate = external_preds[0];
        let candidate_is_unique_goto = func.blocks[candidate].successors == vec![header]
            && matches!(func.blocks[candidate].terminator, Terminator::Goto(t) if t == header)
            && dom.dominates(candidate, header);
        if candidate_is_unique_goto {
            return candidate;
        }
    }

    let new_id = BlockId::from_u32(func.blocks.len() as u32);
    func.blocks.push(BasicBlock::new(new_id, Terminator::Goto(header)));

    for &pred in &external_preds {
        for target in func.blocks[pred].terminator.targets_mut() {
            if *target == header {
                *target = new_id;
            }
        }
    }

    compute_cfg_edges(func);
    new_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::mir::{BinOp, Constant};
    use cm_hir::Type;

    /// entry -> header -> body -> header (back edge); header has an
    /// invariant computation that should move to a new pre-header.
    #[test]
    fn hoists_loop_invariant_computation_to_preheader() {
        let mut b = FunctionBuilder::new("f", Type::Unit);
        let header = b.new_block();
        let body = b.new_block();
        let exit = b.new_block();
        let inv = b.add_temp(Type::Int);

        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(header);
        b.assign(
            Place::Local(inv),
            Rvalue::BinaryOp(BinOp::Add, Operand::Constant(Constant::int(1)), Operand::Constant(Constant::int(2)), Type::Int),
        );
        b.set_terminator(Terminator::SwitchInt {
            discriminant: Operand::Constant(Constant::bool(true)),
            cases: vec![(1, body)],
            otherwise: exit,
        });

        b.switch_to_block(body);
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(exit);
        b.set_terminator(Terminator::Return);

        let mut f = b.build();

        let mut pass = Licm;
        assert!(pass.run(&mut f));
        // The invariant statement should have left the header block.
        assert!(f.blocks[header].statements.is_empty());
    }

    #[test]
    fn does_not_hoist_a_no_opt_statement() {
        let mut b = FunctionBuilder::new("f", Type::Unit);
        let header = b.new_block();
        let body = b.new_block();
        let exit = b.new_block();
        let inv = b.add_temp(Type::Int);

        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(header);
        b.assign_no_opt(
            Place::Local(inv),
            Rvalue::BinaryOp(BinOp::Add, Operand::Constant(Constant::int(1)), Operand::Constant(Constant::int(2)), Type::Int),
        );
        b.set_terminator(Terminator::SwitchInt {
            discriminant: Operand::Constant(Constant::bool(true)),
            cases: vec![(1, body)],
            otherwise: exit,
        });

        b.switch_to_block(body);
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(exit);
        b.set_terminator(Terminator::Return);

        let mut f = b.build();

        let mut pass = Licm;
        assert!(!pass.run(&mut f));
        assert_eq!(f.blocks[header].statements.len(), 1);
    }
}
