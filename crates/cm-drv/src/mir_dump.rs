//! A plain-text MIR dump for `cm build --emit mir` (spec §6): readable
//! enough to diff across optimization levels, not a re-parseable format.

use std::fmt::Write;

use cm_mir::{MirProgram, Operand, Place, Projection, Statement, Terminator};

pub fn dump(program: &MirProgram) -> String {
    let mut out = String::new();
    for func in program.functions.iter() {
        let _ = writeln!(out, "fn {}({} locals, {} blocks) -> {{", func.name.as_str(), func.local_count(), func.block_count());
        for (id, block) in func.blocks.iter_enumerated() {
            let _ = writeln!(out, "  bb{}:", id.as_u32());
            for stmt in &block.statements {
                let _ = writeln!(out, "    {}", fmt_statement(stmt));
            }
            let _ = writeln!(out, "    {}", fmt_terminator(&block.terminator));
        }
        out.push_str("}\n\n");
    }
    out
}

fn fmt_statement(stmt: &Statement) -> String {
    match stmt {
        Statement::Assign(place, rvalue, true) => format!("{} = {:?} [no_opt]", fmt_place(place), rvalue),
        Statement::Assign(place, rvalue, false) => format!("{} = {:?}", fmt_place(place), rvalue),
        Statement::StorageLive(id) => format!("StorageLive(_{})", id.as_u32()),
        Statement::StorageDead(id) => format!("StorageDead(_{})", id.as_u32()),
        Statement::Nop => "nop".to_string(),
        Statement::Asm(sym, _) => format!("asm!({})", sym.as_str()),
    }
}

fn fmt_place(place: &Place) -> String {
    match place {
        Place::Local(id) => format!("_{}", id.as_u32()),
        Place::Projection(inner, Projection::Field(i)) => format!("{}.{i}", fmt_place(inner)),
        Place::Projection(inner, Projection::Index(idx)) => format!("{}[_{}]", fmt_place(inner), idx.as_u32()),
        Place::Projection(inner, Projection::Deref) => format!("*{}", fmt_place(inner)),
    }
}

fn fmt_operand(op: &Operand) -> String {
    match op {
        Operand::Copy(p) => fmt_place(p),
        Operand::Move(p) => format!("move {}", fmt_place(p)),
        Operand::Constant(c) => format!("{:?}", c.kind),
        Operand::FunctionRef(sym) => sym.as_str().to_string(),
    }
}

fn fmt_terminator(term: &Terminator) -> String {
    match term {
        Terminator::Goto(t) => format!("goto -> bb{}", t.as_u32()),
        Terminator::SwitchInt { discriminant, cases, otherwise } => {
            let arms: Vec<String> = cases.iter().map(|(v, t)| format!("{v} -> bb{}", t.as_u32())).collect();
            format!("switchInt({}) [{}, otherwise -> bb{}]", fmt_operand(discriminant), arms.join(", "), otherwise.as_u32())
        }
        Terminator::Call { callee, args, destination, success, .. } => {
            let args: Vec<String> = args.iter().map(fmt_operand).collect();
            let dest = destination.as_ref().map(fmt_place).unwrap_or_else(|| "_".to_string());
            format!("{dest} = call {}({}) -> bb{}", fmt_operand(callee), args.join(", "), success.as_u32())
        }
        Terminator::Return => "return".to_string(),
        Terminator::Unreachable => "unreachable".to_string(),
    }
}
