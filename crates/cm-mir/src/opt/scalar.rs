//! Scalar optimizations (spec §4.5): constant folding, copy propagation,
//! and a sparse conditional constant propagation pass.

use cm_util::FxHashMap;

use crate::ids::{BlockId, LocalId};
use crate::mir::{
    BinOp, Constant, ConstantKind, Function, Operand, Place, Rvalue, Statement, Terminator, UnOp,
};
use crate::pass::Pass;

/// Locals assigned in more than one place (or that are arguments) can't
/// be tracked as a single constant; compute this once per function.
fn singly_assigned_locals(func: &Function) -> cm_util::FxHashSet<LocalId> {
    let mut counts: FxHashMap<LocalId, u32> = FxHashMap::default();
    for local in func.arg_locals.iter() {
        *counts.entry(*local).or_insert(0) += 2; // args are never foldable
    }
    for block in func.blocks.iter() {
        for stmt in &block.statements {
            if let Statement::Assign(place, _, _) = stmt {
                if let Place::Local(id) = place {
                    *counts.entry(*id).or_insert(0) += 1;
                }
            }
        }
    }
    counts.into_iter().filter(|(_, c)| *c == 1).map(|(id, _)| id).collect()
}

pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let foldable = singly_assigned_locals(func);
        let mut changed = false;

        for block in func.blocks.iter_mut() {
            let mut known: FxHashMap<LocalId, Constant> = FxHashMap::default();

            for stmt in block.statements.iter_mut() {
                match stmt {
                    Statement::Assign(place, rvalue, no_opt) => {
                        if !*no_opt {
                            if let Some(resolved) = resolve_rvalue(rvalue, &known) {
                                *rvalue = Rvalue::Use(Operand::Constant(resolved));
                                changed = true;
                            }
                        }

                        match place {
                            Place::Local(id) if foldable.contains(id) => {
                                if let Rvalue::Use(Operand::Constant(c)) = rvalue {
                                    known.insert(*id, c.clone().normalized());
                                } else {
                                    known.remove(id);
                                }
                            }
                            Place::Local(id) => {
                                known.remove(id);
                            }
                            Place::Projection(..) => {
                                // Pointer aliasing through a projection write is
                                // unknown; drop everything we tracked so far.
                                known.clear();
                            }
                        }
                    }
                    Statement::StorageDead(id) => {
                        known.remove(id);
                    }
                    _ => {}
                }
            }

            if let Terminator::SwitchInt { discriminant, cases, otherwise } = &block.terminator {
                let resolved = match discriminant {
                    Operand::Constant(c) => c.as_i64(),
                    Operand::Copy(Place::Local(id)) | Operand::Move(Place::Local(id)) => {
                        known.get(id).and_then(|c| c.as_i64())
                    }
                    _ => None,
                };
                if let Some(v) = resolved {
                    let target = cases
                        .iter()
                        .find(|(case, _)| *case == v as i128)
                        .map(|(_, t)| *t)
                        .unwrap_or(*otherwise);
                    block.terminator = Terminator::Goto(target);
                    changed = true;
                }
            }
        }

        changed
    }
}

/// Substitutes any operand referencing a tracked local with its known
/// constant, then evaluates the rvalue if everything involved is constant.
fn resolve_rvalue(rvalue: &Rvalue, known: &FxHashMap<LocalId, Constant>) -> Option<Constant> {
    let lookup = |op: &Operand| -> Option<Constant> {
        match op {
            Operand::Constant(c) => Some(c.clone()),
            Operand::Copy(Place::Local(id)) | Operand::Move(Place::Local(id)) => {
                known.get(id).cloned()
            }
            _ => None,
        }
    };

    match rvalue {
        Rvalue::Use(op) => lookup(op),
        Rvalue::BinaryOp(op, l, r, ty) => {
            let l = lookup(l)?;
            let r = lookup(r)?;
            eval_binop(*op, &l, &r, ty)
        }
        Rvalue::UnaryOp(op, operand) => {
            let c = lookup(operand)?;
            eval_unop(*op, &c)
        }
        Rvalue::Cast(operand, ty) if !ty.is_pointer() => {
            let c = lookup(operand)?;
            if c.ty.is_pointer() {
                return None;
            }
            eval_cast(&c, ty)
        }
        _ => None,
    }
}

fn eval_binop(op: BinOp, l: &Constant, r: &Constant, ty: &cm_hir::Type) -> Option<Constant> {
    use ConstantKind::*;
    match (op, &l.kind, &r.kind) {
        (BinOp::Add, Int(a), Int(b)) => Some(Constant::int(a.wrapping_add(*b))),
        (BinOp::Sub, Int(a), Int(b)) => Some(Constant::int(a.wrapping_sub(*b))),
        (BinOp::Mul, Int(a), Int(b)) => Some(Constant::int(a.wrapping_mul(*b))),
        (BinOp::Div, Int(a), Int(b)) if *b != 0 => Some(Constant::int(a.wrapping_div(*b))),
        (BinOp::Div, Int(_), Int(0)) => Some(Constant::int(0)),
        (BinOp::Rem, Int(a), Int(b)) if *b != 0 => Some(Constant::int(a.wrapping_rem(*b))),
        (BinOp::Rem, Int(_), Int(0)) => Some(Constant::int(0)),
        (BinOp::BitAnd, Int(a), Int(b)) => Some(Constant::int(a & b)),
        (BinOp::BitOr, Int(a), Int(b)) => Some(Constant::int(a | b)),
        (BinOp::BitXor, Int(a), Int(b)) => Some(Constant::int(a ^ b)),
        (BinOp::Shl, Int(a), Int(b)) if (0..64).contains(b) => {
            Some(Constant::int(a.wrapping_shl(*b as u32)))
        }
        (BinOp::Shr, Int(a), Int(b)) if (0..64).contains(b) => {
            Some(Constant::int(a.wrapping_shr(*b as u32)))
        }
        (BinOp::Add, Float(a), Float(b)) => Some(Constant::float(a + b)),
        (BinOp::Sub, Float(a), Float(b)) => Some(Constant::float(a - b)),
        (BinOp::Mul, Float(a), Float(b)) => Some(Constant::float(a * b)),
        (BinOp::Div, Float(a), Float(b)) if *b != 0.0 => Some(Constant::float(a / b)),
        (BinOp::Eq, a, b) => Some(Constant::bool(a == b)),
        (BinOp::Ne, a, b) => Some(Constant::bool(a != b)),
        (BinOp::Lt, Int(a), Int(b)) => Some(Constant::bool(a < b)),
        (BinOp::Le, Int(a), Int(b)) => Some(Constant::bool(a <= b)),
        (BinOp::Gt, Int(a), Int(b)) => Some(Constant::bool(a > b)),
        (BinOp::Ge, Int(a), Int(b)) => Some(Constant::bool(a >= b)),
        (BinOp::Lt, Float(a), Float(b)) => Some(Constant::bool(a < b)),
        (BinOp::Le, Float(a), Float(b)) => Some(Constant::bool(a <= b)),
        (BinOp::Gt, Float(a), Float(b)) => Some(Constant::bool(a > b)),
        (BinOp::Ge, Float(a), Float(b)) => Some(Constant::bool(a >= b)),
        (BinOp::And, Bool(a), Bool(b)) => Some(Constant::bool(*a && *b)),
        (BinOp::Or, Bool(a), Bool(b)) => Some(Constant::bool(*a || *b)),
        _ => {
            let _ = ty;
            None
        }
    }
}

fn eval_unop(op: UnOp, c: &Constant) -> Option<Constant> {
    match (op, &c.kind) {
        (UnOp::Neg, ConstantKind::Int(n)) => Some(Constant::int(n.wrapping_neg())),
        (UnOp::Neg, ConstantKind::Float(f)) => Some(Constant::float(-f)),
        (UnOp::Not, ConstantKind::Bool(b)) => Some(Constant::bool(!b)),
        (UnOp::BitNot, ConstantKind::Int(n)) => Some(Constant::int(!n)),
        _ => None,
    }
}

fn eval_cast(c: &Constant, ty: &cm_hir::Type) -> Option<Constant> {
    use cm_hir::Type;
    match (&c.kind, ty) {
        (ConstantKind::Int(n), Type::Float) => Some(Constant { ty: Type::Float, kind: ConstantKind::Float(*n as f64) }),
        (ConstantKind::Float(f), Type::Int) => Some(Constant { ty: Type::Int, kind: ConstantKind::Int(*f as i64) }),
        (ConstantKind::Int(n), Type::Char) => {
            char::from_u32(*n as u32).map(|ch| Constant { ty: Type::Char, kind: ConstantKind::Char(ch) })
        }
        (ConstantKind::Char(ch), Type::Int) => Some(Constant { ty: Type::Int, kind: ConstantKind::Int(*ch as i64) }),
        _ => None,
    }
}

/// Detects `x = Use(Copy(y))` chains between trivial, singly-assigned,
/// same-typed locals and rewrites subsequent reads of `x` to `y`.
pub struct CopyPropagation;

impl Pass for CopyPropagation {
    fn name(&self) -> &'static str {
        "copy-propagation"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let foldable = singly_assigned_locals(func);
        let mut changed = false;

        for block in func.blocks.iter_mut() {
            let mut copies: FxHashMap<LocalId, LocalId> = FxHashMap::default();

            for stmt in block.statements.iter_mut() {
                if let Statement::Assign(place, rvalue, no_opt) = stmt {
                    // Rewrite reads through the current copy map first.
                    if !*no_opt {
                        rewrite_operands(rvalue, &copies);
                    }

                    match place {
                        Place::Local(dst) if foldable.contains(dst) => {
                            if let Rvalue::Use(Operand::Copy(Place::Local(src))) = rvalue {
                                if func.locals[*src].ty == func.locals[*dst].ty
                                    && foldable.contains(src)
                                {
                                    let root = resolve_chain(&copies, *src);
                                    if root != *dst {
                                        copies.insert(*dst, root);
                                        changed = true;
                                    }
                                }
                            } else {
                                invalidate(&mut copies, *dst);
                            }
                        }
                        Place::Local(dst) => invalidate(&mut copies, *dst),
                        Place::Projection(..) => copies.clear(),
                    }

                    if matches!(rvalue, Rvalue::Cast(..)) {
                        if let Place::Local(dst) = place {
                            invalidate(&mut copies, *dst);
                        }
                    }
                }
            }

            if rewrite_terminator(&mut block.terminator, &copies) {
                changed = true;
            }
        }

        changed
    }
}

fn resolve_chain(copies: &FxHashMap<LocalId, LocalId>, start: LocalId) -> LocalId {
    let mut current = start;
    let mut seen = cm_util::FxHashSet::default();
    while let Some(&next) = copies.get(&current) {
        if !seen.insert(current) {
            break;
        }
        current = next;
    }
    current
}

fn invalidate(copies: &mut FxHashMap<LocalId, LocalId>, local: LocalId) {
    copies.remove(&local);
    copies.retain(|_, v| *v != local);
}

fn rewrite_place(place: &mut Place, copies: &FxHashMap<LocalId, LocalId>) {
    match place {
        Place::Local(id) => {
            if let Some(&root) = copies.get(id) {
                *id = root;
            }
        }
        Place::Projection(inner, proj) => {
            rewrite_place(inner, copies);
            if let crate::mir::Projection::Index(idx) = proj {
                if let Some(&root) = copies.get(idx) {
                    *idx = root;
                }
            }
        }
    }
}

fn rewrite_operand(op: &mut Operand, copies: &FxHashMap<LocalId, LocalId>) {
    match op {
        Operand::Copy(p) | Operand::Move(p) => rewrite_place(p, copies),
        _ => {}
    }
}

fn rewrite_operands(rvalue: &mut Rvalue, copies: &FxHashMap<LocalId, LocalId>) {
    match rvalue {
        Rvalue::Use(op) | Rvalue::UnaryOp(_, op) | Rvalue::FormatConvert(op, _) => {
            rewrite_operand(op, copies)
        }
        Rvalue::BinaryOp(_, l, r, _) => {
            rewrite_operand(l, copies);
            rewrite_operand(r, copies);
        }
        Rvalue::Ref(p) => rewrite_place(p, copies),
        Rvalue::Aggregate(_, ops) => {
            for op in ops {
                rewrite_operand(op, copies);
            }
        }
        Rvalue::Cast(op, _) => rewrite_operand(op, copies),
    }
}

fn rewrite_terminator(term: &mut Terminator, copies: &FxHashMap<LocalId, LocalId>) -> bool {
    let mut changed = false;
    match term {
        Terminator::SwitchInt { discriminant, .. } => {
            let before = discriminant.clone();
            rewrite_operand(discriminant, copies);
            changed |= *discriminant != before;
        }
        Terminator::Call { callee, args, .. } => {
            let before = callee.clone();
            rewrite_operand(callee, copies);
            changed |= *callee != before;
            for a in args.iter_mut() {
                let before = a.clone();
                rewrite_operand(a, copies);
                changed |= *a != before;
            }
        }
        _ => {}
    }
    changed
}

/// Simplified sparse conditional constant propagation: a global lattice
/// of `Constant`/`Top` per local, propagated only along reachable edges.
/// Any `Ref`, side-effecting call, or `no_opt` statement forces `Top`.
pub struct Sccp;

#[derive(Clone, PartialEq)]
enum Lattice {
    Bottom,
    Const(Constant),
    Top,
}

impl Pass for Sccp {
    fn name(&self) -> &'static str {
        "sccp"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let mut lattice: FxHashMap<LocalId, Lattice> = FxHashMap::default();
        let mut reachable: cm_util::FxHashSet<BlockId> = cm_util::FxHashSet::default();
        let mut worklist = vec![func.entry_block];

        while let Some(block_id) = worklist.pop() {
            if !reachable.insert(block_id) {
                continue;
            }
            let Some(block) = func.blocks.get(block_id) else { continue };

            for stmt in &block.statements {
                if let Statement::Assign(Place::Local(dst), rvalue, no_opt) = stmt {
                    if *no_opt || matches!(rvalue, Rvalue::Ref(_)) {
                        lattice.insert(*dst, Lattice::Top);
                        continue;
                    }
                    let known: FxHashMap<LocalId, Constant> = lattice
                        .iter()
                        .filter_map(|(k, v)| match v {
                            Lattice::Const(c) => Some((*k, c.clone())),
                            _ => None,
                        })
                        .collect();
                    match resolve_rvalue(rvalue, &known) {
                        Some(c) => meet_into(&mut lattice, *dst, Lattice::Const(c)),
                        None => meet_into(&mut lattice, *dst, Lattice::Top),
                    }
                }
            }

            match &block.terminator {
                Terminator::Goto(t) => worklist.push(*t),
                Terminator::SwitchInt { discriminant, cases, otherwise } => {
                    let resolved = match discriminant {
                        Operand::Constant(c) => c.as_i64(),
                        Operand::Copy(Place::Local(id)) | Operand::Move(Place::Local(id)) => {
                            match lattice.get(id) {
                                Some(Lattice::Const(c)) => c.as_i64(),
                                _ => None,
                            }
                        }
                        _ => None,
                    };
                    match resolved {
                        Some(v) => {
                            let target = cases
                                .iter()
                                .find(|(case, _)| *case == v as i128)
                                .map(|(_, t)| *t)
                                .unwrap_or(*otherwise);
                            worklist.push(target);
                        }
                        None => {
                            for (_, t) in cases {
                                worklist.push(*t);
                            }
                            worklist.push(*otherwise);
                        }
                    }
                }
                Terminator::Call { success, unwind, destination, .. } => {
                    if let Some(Place::Local(dst)) = destination {
                        meet_into(&mut lattice, *dst, Lattice::Top);
                    }
                    worklist.push(*success);
                    if let Some(u) = unwind {
                        worklist.push(*u);
                    }
                }
                Terminator::Return | Terminator::Unreachable => {}
            }
        }

        let mut changed = false;
        for (block_id, block) in func.blocks.iter_enumerated_mut() {
            if !reachable.contains(&block_id) {
                continue;
            }
            for stmt in block.statements.iter_mut() {
                if let Statement::Assign(place, rvalue, no_opt) = stmt {
                    if !*no_opt {
                        if let Place::Local(id) = place {
                            if let Some(Lattice::Const(c)) = lattice.get(id) {
                                if !matches!(rvalue, Rvalue::Use(Operand::Constant(_))) {
                                    *rvalue = Rvalue::Use(Operand::Constant(c.clone()));
                                    changed = true;
                                }
                            }
                        }
                    }
                }
            }
        }
        changed
    }
}

fn meet_into(lattice: &mut FxHashMap<LocalId, Lattice>, local: LocalId, incoming: Lattice) {
    let current = lattice.entry(local).or_insert(Lattice::Bottom);
    *current = match (&current, &incoming) {
        (Lattice::Bottom, x) => x.clone(),
        (Lattice::Const(a), Lattice::Const(b)) if a == b => Lattice::Const(a.clone()),
        (Lattice::Const(_), Lattice::Const(_)) => Lattice::Top,
        (_, Lattice::Top) | (Lattice::Top, _) => Lattice::Top,
        (x, Lattice::Bottom) => (*x).clone(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use cm_hir::Type;

    #[test]
    fn folds_constant_addition() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let t = b.add_temp(Type::Int);
        b.assign(
            Place::Local(t),
            Rvalue::BinaryOp(BinOp::Add, Operand::Constant(Constant::int(2)), Operand::Constant(Constant::int(3)), Type::Int),
        );
        b.set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = ConstantFolding;
        assert!(pass.run(&mut f));
        match &f.blocks[f.entry_block].statements[0] {
            Statement::Assign(_, Rvalue::Use(Operand::Constant(c)), _) => {
                assert_eq!(c.as_i64(), Some(5));
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn switch_int_with_constant_discriminant_becomes_goto() {
        let mut b = FunctionBuilder::new("f", Type::Unit);
        let b1 = b.new_block();
        let b2 = b.new_block();
        b.set_terminator(Terminator::SwitchInt {
            discriminant: Operand::Constant(Constant::int(1)),
            cases: vec![(1, b1)],
            otherwise: b2,
        });
        b.switch_to_block(b1).set_terminator(Terminator::Return);
        b.switch_to_block(b2).set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = ConstantFolding;
        assert!(pass.run(&mut f));
        assert_eq!(f.blocks[f.entry_block].terminator, Terminator::Goto(b1));
    }

    #[test]
    fn no_opt_assignment_is_not_constant_folded() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let t = b.add_temp(Type::Int);
        b.assign_no_opt(
            Place::Local(t),
            Rvalue::BinaryOp(BinOp::Add, Operand::Constant(Constant::int(2)), Operand::Constant(Constant::int(3)), Type::Int),
        );
        b.set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = ConstantFolding;
        assert!(!pass.run(&mut f));
        assert!(matches!(&f.blocks[f.entry_block].statements[0], Statement::Assign(_, Rvalue::BinaryOp(..), true)));
    }

    #[test]
    fn copy_propagation_resolves_chain() {
        let mut b = FunctionBuilder::new("f", Type::Int);
        let x = b.add_local("x", Type::Int);
        let y = b.add_local("y", Type::Int);
        let z = b.add_local("z", Type::Int);
        b.assign(Place::Local(x), Rvalue::Use(Operand::Constant(Constant::int(7))));
        b.assign(Place::Local(y), Rvalue::Use(Operand::Copy(Place::Local(x))));
        b.assign(Place::Local(z), Rvalue::Use(Operand::Copy(Place::Local(y))));
        b.set_terminator(Terminator::Return);
        let mut f = b.build();

        let mut pass = CopyPropagation;
        pass.run(&mut f);
        match &f.blocks[f.entry_block].statements[2] {
            Statement::Assign(_, Rvalue::Use(Operand::Copy(Place::Local(id))), _) => {
                assert_eq!(*id, x);
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }
}
