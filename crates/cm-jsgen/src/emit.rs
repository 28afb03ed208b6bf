//! Structured-JS emission (spec §4.12): one of three control-flow
//! recovery strategies per function — a linear body for single-block
//! functions, a recovered `while` loop for the common loop-header
//! shape, and a `while(true) { switch(pc) }` block-dispatch fallback
//! that is correct for any remaining CFG shape.

use cm_hir::Type;
use cm_mir::{
    AggregateKind, BasicBlock, BinOp, BlockId, Constant, ConstantKind, Function, LocalId, MirProgram,
    Operand, Place, Projection, Rvalue, Statement, Terminator, UnOp,
};
use cm_util::{FxHashSet, Symbol};

use crate::error::{JsGenError, JsGenResult};
use crate::runtime;
use crate::types::{default_expr, to_kebab_case};

const FORBIDDEN_SYMBOLS: &[&str] = &["malloc", "realloc", "free", "memcpy", "memset", "calloc"];

pub struct JsGenOptions {
    pub module_name: String,
}

impl Default for JsGenOptions {
    fn default() -> Self {
        Self { module_name: "cm_module".to_string() }
    }
}

/// Emits a complete JS module for `program`; rejects functions the JS
/// target cannot express (spec §4.12 Non-goal: no manual memory).
pub fn compile(program: &MirProgram, options: &JsGenOptions) -> JsGenResult<String> {
    validate_target(program)?;

    let mut gen = Emitter::new(program);
    let mut body = String::new();
    body.push_str(&format!("// {}\n", options.module_name));

    for vtable in &program.vtables {
        gen.emit_vtable(vtable, &mut body);
    }
    for func in program.functions.iter() {
        if func.is_extern {
            continue;
        }
        gen.emit_function(func, &mut body);
        body.push('\n');
    }

    let mut out = String::new();
    if !gen.needed_helpers.is_empty() {
        out.push_str(&runtime::render_needed(&gen.needed_helpers));
        out.push_str("\n\n");
    }
    out.push_str(&body);
    Ok(out)
}

fn validate_target(program: &MirProgram) -> JsGenResult<()> {
    for func in program.functions.iter() {
        for local in func.locals.iter() {
            if matches!(&local.ty, Type::Pointer(inner) if matches!(**inner, Type::Void)) {
                return Err(JsGenError::TargetRejection {
                    function: func.name.as_str().to_string(),
                    symbol: "void*".to_string(),
                });
            }
        }
        for block in func.blocks.iter() {
            if let Terminator::Call { callee: Operand::FunctionRef(sym), .. } = &block.terminator {
                if FORBIDDEN_SYMBOLS.contains(&sym.as_str()) {
                    return Err(JsGenError::TargetRejection {
                        function: func.name.as_str().to_string(),
                        symbol: sym.as_str().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

struct Emitter<'p> {
    program: &'p MirProgram,
    needed_helpers: FxHashSet<String>,
}

impl<'p> Emitter<'p> {
    fn new(program: &'p MirProgram) -> Self {
        Self { program, needed_helpers: FxHashSet::default() }
    }

    fn emit_vtable(&mut self, vtable: &cm_mir::VTable, out: &mut String) {
        out.push_str(&format!(
            "const __vtable_{}_{} = {{\n",
            vtable.concrete_type.as_str(),
            vtable.interface.as_str()
        ));
        for (method, func) in &vtable.entries {
            out.push_str(&format!("  {}: {},\n", method.as_str(), func.as_str()));
        }
        out.push_str("};\n\n");
    }

    fn emit_function(&mut self, func: &Function, out: &mut String) {
        let boxed = address_taken_scalars(func);

        let params: Vec<String> = func.arg_locals.iter().map(|id| local_name(*id)).collect();
        out.push_str(&format!("function {}({}) {{\n", func.name.as_str(), params.join(", ")));

        for (id, local) in func.locals.iter_enumerated() {
            if func.arg_locals.contains(&id) || id == func.return_local {
                continue;
            }
            let init = default_expr(&local.ty);
            if boxed.contains(&id) {
                out.push_str(&format!("  let {} = {{ v: {init} }};\n", local_name(id)));
            } else {
                out.push_str(&format!("  let {} = {init};\n", local_name(id)));
            }
        }
        out.push_str(&format!("  let {} = {};\n", local_name(func.return_local), default_expr(&func.return_ty)));

        let mut ctx = FnCtx { boxed: &boxed, func };
        if func.blocks.len() == 1 {
            self.emit_linear(func, &mut ctx, out);
        } else if let Some(shape) = detect_while_shape(func) {
            self.emit_structured(func, &shape, &mut ctx, out);
        } else {
            self.emit_dispatch(func, &mut ctx, out);
        }

        out.push_str("}\n");
    }

    fn emit_linear(&mut self, func: &Function, ctx: &mut FnCtx, out: &mut String) {
        let block = &func.blocks[func.entry_block];
        for stmt in &block.statements {
            self.emit_statement(stmt, ctx, "  ", out);
        }
        self.emit_tail(func, &block.terminator, ctx, "  ", out);
    }

    fn emit_structured(&mut self, func: &Function, shape: &WhileShape, ctx: &mut FnCtx, out: &mut String) {
        for id in &shape.prologue {
            let block = &func.blocks[*id];
            for stmt in &block.statements {
                self.emit_statement(stmt, ctx, "  ", out);
            }
        }

        let header = &func.blocks[shape.header];
        for stmt in &header.statements {
            if !matches!(stmt, Statement::Assign(p, _, _) if *p == Place::Local(shape.cond_local)) {
                self.emit_statement(stmt, ctx, "  ", out);
            }
        }
        let cond_expr = header
            .statements
            .iter()
            .find_map(|s| match s {
                Statement::Assign(p, rv, _) if *p == Place::Local(shape.cond_local) => Some(self.rvalue_expr(rv, ctx)),
                _ => None,
            })
            .unwrap_or_else(|| "true".to_string());

        out.push_str(&format!("  while ({cond_expr}) {{\n"));
        let body = &func.blocks[shape.body];
        for stmt in &body.statements {
            self.emit_statement(stmt, ctx, "    ", out);
        }
        for stmt in &header.statements {
            if matches!(stmt, Statement::Assign(p, _, _) if *p == Place::Local(shape.cond_local)) {
                self.emit_statement(stmt, ctx, "    ", out);
            }
        }
        out.push_str("  }\n");

        let exit = &func.blocks[shape.exit];
        for stmt in &exit.statements {
            self.emit_statement(stmt, ctx, "  ", out);
        }
        self.emit_tail(func, &exit.terminator, ctx, "  ", out);
    }

    fn emit_dispatch(&mut self, func: &Function, ctx: &mut FnCtx, out: &mut String) {
        out.push_str(&format!("  let __pc = {};\n", func.entry_block.as_u32()));
        out.push_str("  while (true) {\n");
        out.push_str("    switch (__pc) {\n");
        for (id, block) in func.blocks.iter_enumerated() {
            out.push_str(&format!("      case {}: {{\n", id.as_u32()));
            for stmt in &block.statements {
                self.emit_statement(stmt, ctx, "        ", out);
            }
            self.emit_dispatch_tail(func, &block.terminator, ctx, "        ", out);
            out.push_str("      }\n");
        }
        out.push_str("    }\n  }\n");
    }

    fn emit_dispatch_tail(&mut self, func: &Function, term: &Terminator, ctx: &mut FnCtx, indent: &str, out: &mut String) {
        match term {
            Terminator::Goto(target) => {
                out.push_str(&format!("{indent}__pc = {};\n{indent}continue;\n", target.as_u32()));
            }
            Terminator::SwitchInt { discriminant, cases, otherwise } => {
                let disc = self.operand_expr(discriminant, ctx);
                for (value, target) in cases {
                    out.push_str(&format!(
                        "{indent}if ({disc} === {value}) {{ __pc = {}; continue; }}\n",
                        target.as_u32()
                    ));
                }
                out.push_str(&format!("{indent}__pc = {};\n{indent}continue;\n", otherwise.as_u32()));
            }
            Terminator::Return => {
                out.push_str(&format!("{indent}return {};\n", local_name(func.return_local)));
            }
            Terminator::Unreachable => {
                self.needed_helpers.insert("__cm_panic".to_string());
                out.push_str(&format!("{indent}__cm_panic('unreachable');\n"));
            }
            Terminator::Call { .. } => {
                self.emit_call(func, term, ctx, indent, out);
                if let Terminator::Call { success, .. } = term {
                    out.push_str(&format!("{indent}__pc = {};\n{indent}continue;\n", success.as_u32()));
                }
            }
        }
    }

    fn emit_tail(&mut self, func: &Function, term: &Terminator, ctx: &mut FnCtx, indent: &str, out: &mut String) {
        match term {
            Terminator::Return => out.push_str(&format!("{indent}return {};\n", local_name(func.return_local))),
            Terminator::Unreachable => {
                self.needed_helpers.insert("__cm_panic".to_string());
                out.push_str(&format!("{indent}__cm_panic('unreachable');\n"));
            }
            Terminator::Call { .. } => {
                self.emit_call(func, term, ctx, indent, out);
                out.push_str(&format!("{indent}return {};\n", local_name(func.return_local)));
            }
            Terminator::Goto(_) | Terminator::SwitchInt { .. } => {
                out.push_str(&format!("{indent}return {};\n", local_name(func.return_local)));
            }
        }
    }

    fn emit_call(&mut self, _func: &Function, term: &Terminator, ctx: &mut FnCtx, indent: &str, out: &mut String) {
        let Terminator::Call { callee, args, destination, is_virtual, method_name, .. } = term else { return };
        let arg_exprs: Vec<String> = args.iter().map(|a| self.operand_expr(a, ctx)).collect();

        let call_expr = if *is_virtual {
            let method = method_name.map(|s| s.as_str()).unwrap_or("");
            let recv = arg_exprs.first().cloned().unwrap_or_else(|| "undefined".to_string());
            format!("{recv}.__vtable.{method}({})", arg_exprs.join(", "))
        } else {
            match callee {
                Operand::FunctionRef(sym) => format!("{}({})", sym.as_str(), arg_exprs.join(", ")),
                other => format!("{}({})", self.operand_expr(other, ctx), arg_exprs.join(", ")),
            }
        };

        if let Some(dest) = destination {
            out.push_str(&format!("{indent}{} = {call_expr};\n", self.place_lvalue(dest, ctx)));
        } else {
            out.push_str(&format!("{indent}{call_expr};\n"));
        }
    }

    fn emit_statement(&mut self, stmt: &Statement, ctx: &mut FnCtx, indent: &str, out: &mut String) {
        match stmt {
            Statement::Assign(place, rvalue, _) => {
                let rhs = self.rvalue_expr(rvalue, ctx);
                out.push_str(&format!("{indent}{} = {rhs};\n", self.place_lvalue(place, ctx)));
            }
            Statement::StorageLive(_) | Statement::StorageDead(_) | Statement::Nop => {}
            Statement::Asm(sym, _) => {
                out.push_str(&format!("{indent}/* asm: {} */\n", sym.as_str()));
            }
        }
    }

    fn place_lvalue(&self, place: &Place, ctx: &FnCtx) -> String {
        self.place_expr(place, ctx)
    }

    fn place_expr(&self, place: &Place, ctx: &FnCtx) -> String {
        match place {
            Place::Local(id) => {
                if ctx.boxed.contains(id) {
                    format!("{}.v", local_name(*id))
                } else {
                    local_name(*id)
                }
            }
            Place::Projection(inner, Projection::Field(i)) => {
                format!("{}[{}]", self.place_expr(inner, ctx), self.field_key(inner, *i, ctx))
            }
            Place::Projection(inner, Projection::Index(idx)) => {
                format!("{}[{}]", self.place_expr(inner, ctx), local_name(*idx))
            }
            Place::Projection(inner, Projection::Deref) => {
                let base = inner.base();
                if ctx.boxed.contains(&base) {
                    format!("{}.v", self.place_expr(inner, ctx))
                } else {
                    self.place_expr(inner, ctx)
                }
            }
        }
    }

    fn field_key(&self, base_place: &Place, field: u32, ctx: &FnCtx) -> String {
        let base_local = base_place.base();
        if let Some(local) = ctx.func.locals.get(base_local) {
            if let Type::Struct(name) = &local.ty {
                if let Some(sdef) = self.program.find_struct(*name) {
                    if let Some(fdef) = sdef.field(field) {
                        if fdef.css_field {
                            return format!("'{}'", to_kebab_case(fdef.name.as_str()));
                        }
                    }
                }
            }
        }
        field.to_string()
    }

    fn operand_expr(&mut self, op: &Operand, ctx: &FnCtx) -> String {
        match op {
            Operand::Copy(p) | Operand::Move(p) => self.place_expr(p, ctx),
            Operand::Constant(c) => constant_expr(c),
            Operand::FunctionRef(sym) => sym.as_str().to_string(),
        }
    }

    fn rvalue_expr(&mut self, rvalue: &Rvalue, ctx: &FnCtx) -> String {
        match rvalue {
            Rvalue::Use(op) => self.operand_expr(op, ctx),
            Rvalue::BinaryOp(op, l, r, _) => {
                let lhs = self.operand_expr(l, ctx);
                let rhs = self.operand_expr(r, ctx);
                format!("({lhs} {} {rhs})", js_binop(*op))
            }
            Rvalue::UnaryOp(op, o) => {
                let v = self.operand_expr(o, ctx);
                format!("({}{v})", js_unop(*op))
            }
            Rvalue::Ref(place) => {
                let base = place.base();
                if ctx.boxed.contains(&base) {
                    local_name(base)
                } else {
                    self.needed_helpers.insert("__cm_box".to_string());
                    format!("__cm_box({})", self.place_expr(place, ctx))
                }
            }
            Rvalue::Aggregate(AggregateKind::Array | AggregateKind::Tuple, ops) => {
                let items: Vec<String> = ops.iter().map(|o| self.operand_expr(o, ctx)).collect();
                format!("[{}]", items.join(", "))
            }
            Rvalue::Aggregate(AggregateKind::Struct(_), ops) => {
                let items: Vec<String> =
                    ops.iter().enumerate().map(|(i, o)| format!("{i}: {}", self.operand_expr(o, ctx))).collect();
                format!("{{{}}}", items.join(", "))
            }
            Rvalue::Cast(op, ty) => {
                let v = self.operand_expr(op, ctx);
                match ty {
                    Type::Int => format!("Math.trunc({v})"),
                    Type::Float => format!("Number({v})"),
                    Type::Char => format!("String.fromCharCode({v})"),
                    _ => v,
                }
            }
            Rvalue::FormatConvert(op, fmt_name) => {
                self.needed_helpers.insert("__cm_format".to_string());
                let v = self.operand_expr(op, ctx);
                format!("__cm_format({:?}, [{v}])", fmt_name.as_str())
            }
        }
    }
}

struct FnCtx<'a> {
    boxed: &'a FxHashSet<LocalId>,
    func: &'a Function,
}

fn local_name(id: LocalId) -> String {
    format!("_l{}", id.as_u32())
}

fn constant_expr(c: &Constant) -> String {
    match &c.kind {
        ConstantKind::Unit => "undefined".to_string(),
        ConstantKind::Bool(b) => b.to_string(),
        ConstantKind::Int(i) => i.to_string(),
        ConstantKind::Float(f) => f.to_string(),
        ConstantKind::Char(c) => format!("{:?}", c.to_string()),
        ConstantKind::String(s) => format!("{:?}", s.as_str()),
    }
}

fn js_binop(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::Eq => "===",
        BinOp::Ne => "!==",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

fn js_unop(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "!",
        UnOp::BitNot => "~",
    }
}

/// Every non-aggregate local ever targeted by a `Ref`, which therefore
/// needs a `{v: ...}` box so JS's pass-by-value semantics don't diverge
/// from the MIR's pointer semantics (spec §4.12).
fn address_taken_scalars(func: &Function) -> FxHashSet<LocalId> {
    let mut out = FxHashSet::default();
    for block in func.blocks.iter() {
        for stmt in &block.statements {
            if let Statement::Assign(_, Rvalue::Ref(place), _) = stmt {
                let base = place.base();
                if let Some(local) = func.locals.get(base) {
                    if !local.ty.is_aggregate() {
                        out.insert(base);
                    }
                }
            }
        }
    }
    out
}

struct WhileShape {
    prologue: Vec<BlockId>,
    header: BlockId,
    cond_local: LocalId,
    body: BlockId,
    exit: BlockId,
}

/// Recognizes `prologue... -> header: switch(cond){1=>body, _=>exit};
/// body: ...; goto header; exit: ...; return` — the shape straight-line
/// MIR lowering produces for a single `while` loop.
fn detect_while_shape(func: &Function) -> Option<WhileShape> {
    let (header, cond_local, body, exit) = func.blocks.iter().find_map(|b| match &b.terminator {
        Terminator::SwitchInt { discriminant: Operand::Copy(Place::Local(cond)), cases, otherwise }
            if cases.len() == 1 =>
        {
            let body = cases[0].1;
            if func.blocks[body].terminator == Terminator::Goto(b.id) {
                Some((b.id, *cond, body, *otherwise))
            } else {
                None
            }
        }
        _ => None,
    })?;

    if !matches!(func.blocks[exit].terminator, Terminator::Return) {
        return None;
    }

    let mut prologue = Vec::new();
    let mut cursor = func.entry_block;
    while cursor != header {
        if cursor == body || cursor == exit {
            return None;
        }
        let block = &func.blocks[cursor];
        match block.terminator {
            Terminator::Goto(next) => {
                prologue.push(cursor);
                cursor = next;
            }
            _ => return None,
        }
        if prologue.len() > func.blocks.len() {
            return None;
        }
    }

    Some(WhileShape { prologue, header, cond_local, body, exit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_hir::Type;
    use cm_mir::builder::FunctionBuilder;
    use cm_mir::{BinOp as MBinOp, Constant as MConstant, Operand as MOperand, Place as MPlace, Rvalue as MRvalue};

    fn sum_loop_program() -> MirProgram {
        let mut b = FunctionBuilder::new("sum100", Type::Int);
        let acc = b.add_temp(Type::Int);
        let i = b.add_temp(Type::Int);
        let cond = b.add_temp(Type::Bool);
        let header = b.new_block();
        let body = b.new_block();
        let exit = b.new_block();

        b.assign(MPlace::Local(acc), MRvalue::Use(MOperand::Constant(MConstant::int(0))));
        b.assign(MPlace::Local(i), MRvalue::Use(MOperand::Constant(MConstant::int(0))));
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(header);
        b.assign(
            MPlace::Local(cond),
            MRvalue::BinaryOp(MBinOp::Lt, MOperand::Copy(MPlace::Local(i)), MOperand::Constant(MConstant::int(100)), Type::Int),
        );
        b.set_terminator(Terminator::SwitchInt {
            discriminant: MOperand::Copy(MPlace::Local(cond)),
            cases: vec![(1, body)],
            otherwise: exit,
        });

        b.switch_to_block(body);
        b.assign(
            MPlace::Local(acc),
            MRvalue::BinaryOp(MBinOp::Add, MOperand::Copy(MPlace::Local(acc)), MOperand::Copy(MPlace::Local(i)), Type::Int),
        );
        b.assign(
            MPlace::Local(i),
            MRvalue::BinaryOp(MBinOp::Add, MOperand::Copy(MPlace::Local(i)), MOperand::Constant(MConstant::int(1)), Type::Int),
        );
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(exit);
        let ret = b.return_local();
        b.assign(MPlace::Local(ret), MRvalue::Use(MOperand::Copy(MPlace::Local(acc))));
        b.set_terminator(Terminator::Return);

        let mut program = MirProgram::new();
        program.functions.push(b.build());
        program
    }

    #[test]
    fn sum_loop_emits_a_structured_while() {
        let program = sum_loop_program();
        let js = compile(&program, &JsGenOptions::default()).unwrap();
        assert!(js.contains("function sum100"));
        assert!(js.contains("while ("));
        assert!(!js.contains("__pc"));
    }

    #[test]
    fn format_convert_emits_the_actual_format_spec_text() {
        let mut b = FunctionBuilder::new("fmtspec", Type::String);
        let n = b.add_temp(Type::Float);
        b.assign(MPlace::Local(n), MRvalue::Use(MOperand::Constant(MConstant::float(3.5))));
        let ret = b.return_local();
        b.assign(
            MPlace::Local(ret),
            MRvalue::FormatConvert(MOperand::Copy(MPlace::Local(n)), Symbol::intern("{:>6.2f}")),
        );
        b.set_terminator(Terminator::Return);
        let mut program = MirProgram::new();
        program.functions.push(b.build());
        let js = compile(&program, &JsGenOptions::default()).unwrap();
        assert!(js.contains("__cm_format(\"{:>6.2f}\", ["));
    }

    #[test]
    fn rejects_manual_memory_builtin() {
        let mut b = FunctionBuilder::new("leaky", Type::Unit);
        b.set_terminator(Terminator::Call {
            callee: Operand::FunctionRef(Symbol::intern("malloc")),
            args: vec![],
            destination: None,
            success: BlockId::from_u32(0),
            unwind: None,
            is_virtual: false,
            method_name: None,
        });
        let mut program = MirProgram::new();
        program.functions.push(b.build());
        let err = compile(&program, &JsGenOptions::default()).unwrap_err();
        assert!(matches!(err, JsGenError::TargetRejection { .. }));
    }
}
