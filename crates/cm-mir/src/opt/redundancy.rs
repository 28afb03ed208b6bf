//! Redundancy elimination (spec §4.6): local GVN, dead-store elimination,
//! DCE, and whole-program DCE.

use cm_util::{FxHashMap, FxHashSet, Symbol};

use crate::ids::LocalId;
use crate::mir::{MirProgram, Operand, Place, Rvalue, Statement};
use crate::pass::Pass;
use crate::Function;

/// Per-block hash-based common-subexpression elimination.
pub struct Gvn;

impl Pass for Gvn {
    fn name(&self) -> &'static str {
        "gvn"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        if func.is_too_complex() {
            return false;
        }
        let mut changed = false;

        // Locals that appear as the target of a `Ref` can't be CSE'd away:
        // their identity, not just their value, matters.
        let address_taken = address_taken_locals(func);

        for block in func.blocks.iter_mut() {
            let mut available: FxHashMap<String, LocalId> = FxHashMap::default();

            for stmt in block.statements.iter_mut() {
                if let Statement::Assign(place, rvalue, no_opt) = stmt {
                    if *no_opt {
                        continue;
                    }
                    if let Place::Local(dst) = place {
                        if address_taken.contains(dst) {
                            continue;
                        }
                        if let Some(key) = hash_rvalue(rvalue) {
                            if let Some(&prev) = available.get(&key) {
                                if prev != *dst {
                                    *rvalue = Rvalue::Use(Operand::Copy(Place::Local(prev)));
                                    changed = true;
                                    continue;
                                }
                            } else {
                                available.insert(key, *dst);
                            }
                        }
                        invalidate_mentioning(&mut available, *dst);
                    }
                } else if let Statement::Asm(_, ops) = stmt {
                    for op in ops {
                        if let Some(p) = op.place() {
                            invalidate_mentioning(&mut available, p.base());
                        }
                    }
                }
            }
        }

        changed
    }
}

fn address_taken_locals(func: &Function) -> FxHashSet<LocalId> {
    let mut out = FxHashSet::default();
    for block in func.blocks.iter() {
        for stmt in &block.statements {
            if let Statement::Assign(_, Rvalue::Ref(place), _) = stmt {
                out.insert(place.base());
            }
        }
    }
    out
}

fn invalidate_mentioning(available: &mut FxHashMap<String, LocalId>, written: LocalId) {
    available.retain(|key, _| !key.contains(&format!("L{}", written.as_u32())));
}

/// A stable string key for an rvalue: operation kind, operand kinds, and
/// constant values, so structurally-equal rvalues hash equal. Returns
/// `None` for rvalues GVN must never treat as pure (refs, aggregates with
/// side effects are still fine to key, but `Ref` identity matters).
fn hash_rvalue(rvalue: &Rvalue) -> Option<String> {
    if matches!(rvalue, Rvalue::Ref(_)) {
        return None;
    }
    Some(match rvalue {
        Rvalue::Use(op) => format!("use:{}", key_operand(op)),
        Rvalue::BinaryOp(op, l, r, _) => format!("bin:{op:?}:{}:{}", key_operand(l), key_operand(r)),
        Rvalue::UnaryOp(op, o) => format!("un:{op:?}:{}", key_operand(o)),
        Rvalue::Aggregate(kind, ops) => {
            let parts: Vec<String> = ops.iter().map(key_operand).collect();
            format!("agg:{kind:?}:{}", parts.join(","))
        }
        Rvalue::Cast(op, ty) => format!("cast:{:?}:{}", ty, key_operand(op)),
        Rvalue::FormatConvert(op, sym) => format!("fmt:{}:{}", sym.as_str(), key_operand(op)),
        Rvalue::Ref(_) => unreachable!(),
    })
}

fn key_place(place: &Place) -> String {
    match place {
        Place::Local(id) => format!("L{}", id.as_u32()),
        Place::Projection(inner, proj) => format!("{}.{proj:?}", key_place(inner)),
    }
}

fn key_operand(op: &Operand) -> String {
    match op {
        Operand::Copy(p) => format!("c:{}", key_place(p)),
        Operand::Move(p) => format!("m:{}", key_place(p)),
        Operand::Constant(c) => format!("k:{:?}:{:?}", c.ty, c.kind),
        Operand::FunctionRef(s) => format!("f:{}", s.as_str()),
    }
}

/// Removes an assignment whose local is overwritten by the next
/// assignment to it (or function end) with no intervening read.
pub struct DeadStoreElimination;

impl Pass for DeadStoreElimination {
    fn name(&self) -> &'static str {
        "dead-store-elimination"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let address_taken = address_taken_locals(func);
        let mut changed = false;

        for block in func.blocks.iter_mut() {
            let mut to_remove = Vec::new();
            let mut last_write_index: FxHashMap<LocalId, usize> = FxHashMap::default();

            for (i, stmt) in block.statements.iter().enumerate() {
                let mut reads = Vec::new();
                if let Statement::Assign(_, rvalue, _) = stmt {
                    rvalue.used_locals(&mut reads);
                }
                for r in reads {
                    last_write_index.remove(&r);
                }
                if let Statement::Assign(Place::Local(dst), _, no_opt) = stmt {
                    if !address_taken.contains(dst) {
                        if let Some(&prev) = last_write_index.get(dst) {
                            if !block.statements[prev].is_no_opt() {
                                to_remove.push(prev);
                            }
                        }
                    }
                    if !*no_opt {
                        last_write_index.insert(*dst, i);
                    } else {
                        last_write_index.remove(dst);
                    }
                }
            }

            for idx in to_remove {
                block.statements[idx] = Statement::Nop;
                changed = true;
            }
            block.statements.retain(|s| !matches!(s, Statement::Nop));
        }

        changed
    }
}

/// Liveness-based dead code elimination: keeps only statements that
/// contribute to the return value, a side-effecting call, `Asm`, or any
/// `no_opt` statement.
pub struct Dce;

impl Pass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let mut live: FxHashSet<LocalId> = FxHashSet::default();
        live.insert(func.return_local);

        // Every terminator operand (switch discriminants, call callee/args)
        // is a use that must keep its defining statements alive.
        for block in func.blocks.iter() {
            for op in block.terminator.used_operands() {
                if let Some(p) = op.place() {
                    let mut out = Vec::new();
                    p.mentioned_locals(&mut out);
                    live.extend(out);
                }
            }
        }

        // Backward fixed point: a statement is live if its target is live
        // or it is inherently side-effecting; propagate its reads back.
        let mut keep: Vec<Vec<bool>> = func.blocks.iter().map(|b| vec![false; b.statements.len()]).collect();

        let mut changed_any = true;
        while changed_any {
            changed_any = false;
            for (bi, block) in func.blocks.iter().enumerate() {
                for (si, stmt) in block.statements.iter().enumerate().rev() {
                    if keep[bi][si] {
                        continue;
                    }
                    let is_live = match stmt {
                        Statement::Assign(_, _, true) => true,
                        Statement::Assign(Place::Local(id), _, false) => live.contains(id),
                        Statement::Assign(Place::Projection(..), _, false) => true,
                        Statement::Asm(..) => true,
                        Statement::StorageLive(_) | Statement::StorageDead(_) | Statement::Nop => false,
                    };
                    if !is_live {
                        continue;
                    }
                    keep[bi][si] = true;
                    changed_any = true;
                    if let Statement::Assign(place, rvalue, _) = stmt {
                        let mut reads = Vec::new();
                        place.mentioned_locals(&mut reads);
                        if let Place::Local(_) = place {
                            reads.clear();
                        }
                        rvalue.used_locals(&mut reads);
                        for r in reads {
                            live.insert(r);
                        }
                    }
                }
            }
        }

        let mut changed = false;
        for (bi, block) in func.blocks.iter_mut().enumerate() {
            let before = block.statements.len();
            let keep_flags = &keep[bi];
            let mut i = 0;
            block.statements.retain(|_| {
                let k = keep_flags[i];
                i += 1;
                k
            });
            if block.statements.len() != before {
                changed = true;
            }
        }

        changed
    }
}

/// Whole-program reachability from the entry function (`main`) and any
/// function marked extern (exported to the host); deletes the rest.
pub struct ProgramDce {
    pub exported: FxHashSet<Symbol>,
}

impl ProgramDce {
    pub fn new() -> Self {
        Self { exported: FxHashSet::default() }
    }

    pub fn run_on_program(&mut self, program: &mut MirProgram) -> bool {
        let mut live: FxHashSet<Symbol> = FxHashSet::default();
        let mut worklist = Vec::new();

        for func in program.functions.iter() {
            if func.name.as_str() == "main" || func.is_extern || self.exported.contains(&func.name) {
                worklist.push(func.name);
            }
        }

        while let Some(name) = worklist.pop() {
            if !live.insert(name) {
                continue;
            }
            if let Some(func) = program.find_function(name) {
                for block in func.blocks.iter() {
                    if let crate::mir::Terminator::Call { callee, .. } = &block.terminator {
                        if let Operand::FunctionRef(target) = callee {
                            if !live.contains(target) {
                                worklist.push(*target);
                            }
                        }
                    }
                }
            }
        }

        let before = program.functions.len();
        let kept: Vec<Function> = program
            .functions
            .iter()
            .filter(|f| live.contains(&f.name))
            .cloned()
            .collect();
        let dropped = before != kept.len();
        program.functions = kept.into_iter().collect();

        program.vtables.retain(|vt| {
            vt.entries.iter().all(|(_, impl_fn)| live.contains(impl_fn))
        });

        dropped
    }
}

impl Default for ProgramDce {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::mir::{BinOp, Constant, Terminator};
    use cm_hir::Type;

    #[test]
    fn dce_removes_statement_that_never_feeds_return() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let dead = b.add_temp(Type::Int);
        b.assign(Place::Local(dead), Rvalue::Use(Operand::Constant(Constant::int(99))));
        let ret = b.return_local();
        b.assign(Place::Local(ret), Rvalue::Use(Operand::Constant(Constant::int(1))));
        b.set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = Dce;
        assert!(pass.run(&mut f));
        assert_eq!(f.blocks[f.entry_block].statements.len(), 1);
    }

    #[test]
    fn dce_keeps_a_no_opt_statement_that_feeds_nothing() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let dead = b.add_temp(Type::Int);
        b.assign_no_opt(Place::Local(dead), Rvalue::Use(Operand::Constant(Constant::int(99))));
        let ret = b.return_local();
        b.assign(Place::Local(ret), Rvalue::Use(Operand::Constant(Constant::int(1))));
        b.set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = Dce;
        pass.run(&mut f);
        assert_eq!(f.blocks[f.entry_block].statements.len(), 2);
    }

    #[test]
    fn dead_store_elimination_drops_overwritten_assignment() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let x = b.add_local("x", Type::Int);
        b.assign(Place::Local(x), Rvalue::Use(Operand::Constant(Constant::int(1))));
        b.assign(Place::Local(x), Rvalue::Use(Operand::Constant(Constant::int(2))));
        let ret = b.return_local();
        b.assign(Place::Local(ret), Rvalue::Use(Operand::Copy(Place::Local(x))));
        b.set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = DeadStoreElimination;
        assert!(pass.run(&mut f));
        assert_eq!(f.blocks[f.entry_block].statements.len(), 2);
    }

    #[test]
    fn gvn_reuses_identical_computation() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let a = b.add_local("a", Type::Int);
        let c = b.add_local("c", Type::Int);
        b.assign(
            Place::Local(a),
            Rvalue::BinaryOp(BinOp::Add, Operand::Constant(Constant::int(1)), Operand::Constant(Constant::int(2)), Type::Int),
        );
        b.assign(
            Place::Local(c),
            Rvalue::BinaryOp(BinOp::Add, Operand::Constant(Constant::int(1)), Operand::Constant(Constant::int(2)), Type::Int),
        );
        b.set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = Gvn;
        assert!(pass.run(&mut f));
        match &f.blocks[f.entry_block].statements[1] {
            Statement::Assign(_, Rvalue::Use(Operand::Copy(Place::Local(id))), _) => assert_eq!(*id, a),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
