//! The tree-walking evaluator (spec §4.11): place load/store with
//! auto-vivification, rvalue evaluation, and the frame-stack-driven
//! terminator dispatch loop.

use cm_mir::{
    AggregateKind, BinOp, Constant, ConstantKind, Function, LocalId, MirProgram, Operand, Place,
    Projection, Rvalue, Terminator, UnOp,
};
use cm_util::{FxHashMap, Symbol};
use tracing::warn;

use crate::builtins::BuiltinRegistry;
use crate::error::{InterpError, InterpResult};
use crate::format;
use crate::frame::Frame;
use crate::value::Value;

const MAX_CALL_DEPTH: usize = 2048;

/// One resolved step of a place, with `Index`'s local operand already
/// read down to a concrete offset.
#[derive(Debug, Clone, Copy)]
enum Step {
    Field(u32),
    Index(i64),
}

pub struct Interpreter<'p> {
    program: &'p MirProgram,
    builtins: BuiltinRegistry,
    call_depth: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p MirProgram) -> Self {
        Self { program, builtins: BuiltinRegistry::new(), call_depth: 0 }
    }

    pub fn call_by_name(&mut self, name: &str, args: Vec<Value>) -> InterpResult<Value> {
        let func = self
            .program
            .find_function(Symbol::intern(name))
            .ok_or_else(|| InterpError::EntryNotFound(name.to_string()))?;
        self.execute_function(func, args)
    }

    pub fn execute_function(&mut self, func: &Function, args: Vec<Value>) -> InterpResult<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(InterpError::StackOverflow(func.name.as_str().to_string()));
        }
        self.call_depth += 1;
        let result = self.run_frame(func, args);
        self.call_depth -= 1;
        result
    }

    fn run_frame(&mut self, func: &Function, args: Vec<Value>) -> InterpResult<Value> {
        let mut frame = Frame::new(func.name.as_str().to_string());
        for (id, local) in func.locals.iter_enumerated() {
            frame.set(id, Value::default_for(&local.ty));
        }
        for (arg_local, val) in func.arg_locals.iter().zip(args) {
            frame.set(*arg_local, val);
        }

        let mut block_id = func.entry_block;
        loop {
            let block = &func.blocks[block_id];
            for stmt in &block.statements {
                self.exec_statement(&mut frame, stmt);
            }

            match &block.terminator {
                Terminator::Goto(target) => block_id = *target,
                Terminator::SwitchInt { discriminant, cases, otherwise } => {
                    let disc = self.eval_operand(&frame, discriminant).as_i64().unwrap_or(0) as i128;
                    block_id = cases.iter().find(|(c, _)| *c == disc).map(|(_, t)| *t).unwrap_or(*otherwise);
                }
                Terminator::Call { callee, args, destination, success, method_name, is_virtual, .. } => {
                    let arg_values: Vec<Value> = args.iter().map(|op| self.eval_operand(&frame, op)).collect();
                    let (result, resolved_name) =
                        self.dispatch_call(callee, *method_name, *is_virtual, arg_values.clone())?;

                    if resolved_name.ends_with("__ctor") {
                        if let Some(first_op) = args.first() {
                            if let Some(place) = first_op.place() {
                                self.store_place(&mut frame, place, result.clone());
                            }
                        }
                    }
                    if let Some(dest) = destination {
                        self.store_place(&mut frame, dest, result);
                    }
                    block_id = *success;
                }
                Terminator::Return => return Ok(frame.get(func.return_local)),
                Terminator::Unreachable => return Err(InterpError::Unreachable(func.name.as_str().to_string())),
            }
        }
    }

    fn dispatch_call(
        &mut self,
        callee: &Operand,
        method_name: Option<Symbol>,
        is_virtual: bool,
        args: Vec<Value>,
    ) -> InterpResult<(Value, String)> {
        if is_virtual {
            let method = method_name.map(|s| s.as_str()).unwrap_or("");
            let type_name = args.first().and_then(Value::type_name).unwrap_or("").to_string();
            let resolved = self
                .program
                .vtables
                .iter()
                .find(|vt| vt.concrete_type.as_str() == type_name)
                .and_then(|vt| vt.entries.iter().find(|(m, _)| m.as_str() == method))
                .map(|(_, f)| f.as_str().to_string())
                .unwrap_or_else(|| format!("{type_name}__{method}"));
            let result = self.call_resolved(&resolved, args)?;
            return Ok((result, resolved));
        }

        match callee {
            Operand::FunctionRef(sym) => {
                let name = sym.as_str().to_string();
                let result = self.call_resolved(&name, args)?;
                Ok((result, name))
            }
            _ => {
                warn!(target: "cm_interp::eval", "call through a non-static callee operand is unsupported");
                Ok((Value::Unit, String::new()))
            }
        }
    }

    fn call_resolved(&mut self, name: &str, args: Vec<Value>) -> InterpResult<Value> {
        if let Some(builtin) = self.builtins.get(name) {
            return Ok(builtin(&args));
        }
        if let Some(func) = self.program.find_function(Symbol::intern(name)) {
            return self.execute_function(func, args);
        }
        warn!(target: "cm_interp::eval", name, "call target did not resolve to a builtin or a defined function");
        Ok(Value::Unit)
    }

    fn exec_statement(&mut self, frame: &mut Frame, stmt: &cm_mir::Statement) {
        match stmt {
            cm_mir::Statement::Assign(place, rvalue, _) => {
                let value = self.eval_rvalue(frame, rvalue);
                self.store_place(frame, place, value);
            }
            cm_mir::Statement::StorageLive(_)
            | cm_mir::Statement::StorageDead(_)
            | cm_mir::Statement::Nop
            | cm_mir::Statement::Asm(..) => {}
        }
    }

    fn eval_operand(&self, frame: &Frame, op: &Operand) -> Value {
        match op {
            Operand::Copy(place) | Operand::Move(place) => self.load_place(frame, place),
            Operand::Constant(c) => const_to_value(c),
            Operand::FunctionRef(sym) => Value::String(sym.as_str().to_string()),
        }
    }

    fn eval_rvalue(&mut self, frame: &mut Frame, rvalue: &Rvalue) -> Value {
        match rvalue {
            Rvalue::Use(op) => self.eval_operand(frame, op),
            Rvalue::BinaryOp(op, l, r, ty) => {
                let lv = self.eval_operand(frame, l);
                let rv = self.eval_operand(frame, r);
                eval_binop(*op, &lv, &rv, ty)
            }
            Rvalue::UnaryOp(op, o) => eval_unop(*op, &self.eval_operand(frame, o)),
            Rvalue::Ref(place) => self.eval_ref(frame, place),
            Rvalue::Aggregate(kind, ops) => self.eval_aggregate(frame, kind, ops),
            Rvalue::Cast(op, ty) => eval_cast(&self.eval_operand(frame, op), ty),
            Rvalue::FormatConvert(op, fmt_name) => {
                let v = self.eval_operand(frame, op);
                self.eval_format_convert(&v, *fmt_name)
            }
        }
    }

    fn eval_ref(&self, frame: &Frame, place: &Place) -> Value {
        let base = place.base();
        let array_index = match place {
            Place::Projection(inner, Projection::Index(idx_local)) if matches!(**inner, Place::Local(_)) => {
                frame.get(*idx_local).as_i64()
            }
            _ => None,
        };
        Value::Pointer { target_local: base, array_index }
    }

    fn eval_aggregate(&mut self, frame: &mut Frame, kind: &AggregateKind, ops: &[Operand]) -> Value {
        match kind {
            AggregateKind::Array | AggregateKind::Tuple => {
                Value::Array(ops.iter().map(|op| self.eval_operand(frame, op)).collect())
            }
            AggregateKind::Struct(name) => {
                let mut fields = FxHashMap::default();
                for (i, op) in ops.iter().enumerate() {
                    fields.insert(i as u32, self.eval_operand(frame, op));
                }
                Value::Struct { type_name: name.as_str().to_string(), fields }
            }
        }
    }

    fn eval_format_convert(&self, value: &Value, fmt_name: Symbol) -> Value {
        Value::String(format::format(fmt_name.as_str(), std::slice::from_ref(value), &[]))
    }

    fn load_place(&self, frame: &Frame, place: &Place) -> Value {
        let (base, steps) = self.resolve_path(frame, place);
        let root = frame.get(base);
        get_path(&root, &steps)
    }

    fn store_place(&self, frame: &mut Frame, place: &Place, value: Value) {
        let (base, steps) = self.resolve_path(frame, place);
        let root = frame.locals.entry(base).or_insert(Value::Unit);
        *navigate_mut(root, &steps) = value;
    }

    /// Walks a place's projection chain, resolving `Index` operands to
    /// concrete offsets and following `Deref` by reading the pointer
    /// value accumulated so far and jumping to its target local.
    fn resolve_path(&self, frame: &Frame, place: &Place) -> (LocalId, Vec<Step>) {
        match place {
            Place::Local(id) => (*id, Vec::new()),
            Place::Projection(inner, proj) => {
                let (base, mut steps) = self.resolve_path(frame, inner);
                match proj {
                    Projection::Field(i) => steps.push(Step::Field(*i)),
                    Projection::Index(idx_local) => {
                        let idx = frame.get(*idx_local).as_i64().unwrap_or(0);
                        steps.push(Step::Index(idx));
                    }
                    Projection::Deref => {
                        let current = get_path(&frame.get(base), &steps);
                        if let Value::Pointer { target_local, array_index } = current {
                            let mut new_steps = Vec::new();
                            if let Some(idx) = array_index {
                                new_steps.push(Step::Index(idx));
                            }
                            return (target_local, new_steps);
                        }
                        return (base, steps);
                    }
                }
                (base, steps)
            }
        }
    }
}

fn navigate_mut<'v>(value: &'v mut Value, steps: &[Step]) -> &'v mut Value {
    let Some((head, rest)) = steps.split_first() else { return value };
    match head {
        Step::Field(i) => {
            if !matches!(value, Value::Struct { .. }) {
                *value = Value::Struct { type_name: String::new(), fields: FxHashMap::default() };
            }
            let Value::Struct { fields, .. } = value else { unreachable!() };
            navigate_mut(fields.entry(*i).or_insert(Value::Unit), rest)
        }
        Step::Index(i) => {
            if !matches!(value, Value::Array(_)) {
                *value = Value::Array(Vec::new());
            }
            let Value::Array(items) = value else { unreachable!() };
            let idx = (*i).max(0) as usize;
            if idx >= items.len() {
                items.resize(idx + 1, Value::Unit);
            }
            navigate_mut(&mut items[idx], rest)
        }
    }
}

fn get_path(value: &Value, steps: &[Step]) -> Value {
    let Some((head, rest)) = steps.split_first() else { return value.clone() };
    match (head, value) {
        (Step::Field(i), Value::Struct { fields, .. }) => {
            fields.get(i).map(|v| get_path(v, rest)).unwrap_or(Value::Unit)
        }
        (Step::Index(i), Value::Array(items)) => {
            items.get((*i).max(0) as usize).map(|v| get_path(v, rest)).unwrap_or(Value::Unit)
        }
        (Step::Index(i), Value::Slice { elems, .. }) => {
            elems.get((*i).max(0) as usize).map(|v| get_path(v, rest)).unwrap_or(Value::Unit)
        }
        _ => Value::Unit,
    }
}

fn const_to_value(c: &Constant) -> Value {
    match &c.kind {
        ConstantKind::Unit => Value::Unit,
        ConstantKind::Bool(b) => Value::Bool(*b),
        ConstantKind::Int(i) => Value::Int(*i),
        ConstantKind::Float(f) => Value::Float(*f),
        ConstantKind::Char(c) => Value::Char(*c),
        ConstantKind::String(s) => Value::String(s.as_str().to_string()),
    }
}

/// Wrapping integer arithmetic; division and remainder by zero yield
/// zero rather than trapping (spec §4.11 edge case).
fn eval_binop(op: BinOp, l: &Value, r: &Value, ty: &cm_hir::Type) -> Value {
    if op.is_comparison() {
        return Value::Bool(compare(op, l, r));
    }
    if op.is_logical() {
        let (lb, rb) = (l.truthy(), r.truthy());
        return Value::Bool(match op {
            BinOp::And => lb && rb,
            BinOp::Or => lb || rb,
            _ => unreachable!(),
        });
    }

    if matches!(ty, cm_hir::Type::Float) || matches!((l, r), (Value::Float(_), _) | (_, Value::Float(_))) {
        let (lf, rf) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
        return Value::Float(match op {
            BinOp::Add => lf + rf,
            BinOp::Sub => lf - rf,
            BinOp::Mul => lf * rf,
            BinOp::Div => {
                if rf == 0.0 {
                    0.0
                } else {
                    lf / rf
                }
            }
            BinOp::Rem => {
                if rf == 0.0 {
                    0.0
                } else {
                    lf % rf
                }
            }
            _ => 0.0,
        });
    }

    let (li, ri) = (l.as_i64().unwrap_or(0), r.as_i64().unwrap_or(0));
    Value::Int(match op {
        BinOp::Add => li.wrapping_add(ri),
        BinOp::Sub => li.wrapping_sub(ri),
        BinOp::Mul => li.wrapping_mul(ri),
        BinOp::Div => {
            if ri == 0 {
                0
            } else {
                li.wrapping_div(ri)
            }
        }
        BinOp::Rem => {
            if ri == 0 {
                0
            } else {
                li.wrapping_rem(ri)
            }
        }
        BinOp::BitAnd => li & ri,
        BinOp::BitOr => li | ri,
        BinOp::BitXor => li ^ ri,
        BinOp::Shl => li.wrapping_shl(ri as u32),
        BinOp::Shr => li.wrapping_shr(ri as u32),
        BinOp::And | BinOp::Or | BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 0,
    })
}

fn compare(op: BinOp, l: &Value, r: &Value) -> bool {
    if let (Some(lf), Some(rf)) = (l.as_f64(), r.as_f64()) {
        if matches!(l, Value::Float(_)) || matches!(r, Value::Float(_)) {
            return match op {
                BinOp::Eq => lf == rf,
                BinOp::Ne => lf != rf,
                BinOp::Lt => lf < rf,
                BinOp::Le => lf <= rf,
                BinOp::Gt => lf > rf,
                BinOp::Ge => lf >= rf,
                _ => false,
            };
        }
    }
    if let (Value::String(ls), Value::String(rs)) = (l, r) {
        return match op {
            BinOp::Eq => ls == rs,
            BinOp::Ne => ls != rs,
            BinOp::Lt => ls < rs,
            BinOp::Le => ls <= rs,
            BinOp::Gt => ls > rs,
            BinOp::Ge => ls >= rs,
            _ => false,
        };
    }
    let (li, ri) = (l.as_i64().unwrap_or(0), r.as_i64().unwrap_or(0));
    match op {
        BinOp::Eq => li == ri,
        BinOp::Ne => li != ri,
        BinOp::Lt => li < ri,
        BinOp::Le => li <= ri,
        BinOp::Gt => li > ri,
        BinOp::Ge => li >= ri,
        _ => false,
    }
}

fn eval_unop(op: UnOp, v: &Value) -> Value {
    match (op, v) {
        (UnOp::Neg, Value::Float(f)) => Value::Float(-f),
        (UnOp::Neg, _) => Value::Int(v.as_i64().unwrap_or(0).wrapping_neg()),
        (UnOp::Not, _) => Value::Bool(!v.truthy()),
        (UnOp::BitNot, _) => Value::Int(!v.as_i64().unwrap_or(0)),
    }
}

fn eval_cast(v: &Value, ty: &cm_hir::Type) -> Value {
    match ty {
        cm_hir::Type::Int => Value::Int(v.as_i64().unwrap_or_else(|| v.as_f64().unwrap_or(0.0) as i64)),
        cm_hir::Type::Float => Value::Float(v.as_f64().unwrap_or_else(|| v.as_i64().unwrap_or(0) as f64)),
        cm_hir::Type::Char => match v {
            Value::Char(c) => Value::Char(*c),
            other => Value::Char(char::from_u32(other.as_i64().unwrap_or(0) as u32).unwrap_or('\0')),
        },
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_hir::Type;
    use cm_mir::builder::FunctionBuilder;
    use cm_mir::{BinOp as MBinOp, Operand as MOperand, Place as MPlace, Rvalue as MRvalue};

    fn program_with(func: Function) -> MirProgram {
        let mut program = MirProgram::new();
        program.functions.push(func);
        program
    }

    #[test]
    fn division_by_zero_yields_zero_instead_of_trapping() {
        let mut b = FunctionBuilder::new("divzero", Type::Int);
        let a = b.add_temp(Type::Int);
        b.assign(MPlace::Local(a), MRvalue::Use(MOperand::Constant(Constant::int(10))));
        let ret = b.return_local();
        b.assign(
            MPlace::Local(ret),
            MRvalue::BinaryOp(
                MBinOp::Div,
                MOperand::Copy(MPlace::Local(a)),
                MOperand::Constant(Constant::int(0)),
                Type::Int,
            ),
        );
        b.set_terminator(Terminator::Return);
        let func = b.build();
        let program = program_with(func);
        let mut interp = Interpreter::new(&program);
        let result = interp.call_by_name("divzero", Vec::new()).unwrap();
        assert_eq!(result, Value::Int(0));
    }

    #[test]
    fn struct_field_store_and_load_round_trips() {
        let mut b = FunctionBuilder::new("structy", Type::Int);
        let s = b.add_temp(Type::Struct(Symbol::intern("Point")));
        let place = MPlace::Local(s).project(Projection::Field(0));
        b.assign(place.clone(), MRvalue::Use(MOperand::Constant(Constant::int(42))));
        let ret = b.return_local();
        b.assign(MPlace::Local(ret), MRvalue::Use(MOperand::Copy(place)));
        b.set_terminator(Terminator::Return);
        let func = b.build();
        let program = program_with(func);
        let mut interp = Interpreter::new(&program);
        let result = interp.call_by_name("structy", Vec::new()).unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn format_convert_honors_a_non_default_format_spec() {
        let mut b = FunctionBuilder::new("fmtspec", Type::String);
        let n = b.add_temp(Type::Float);
        b.assign(MPlace::Local(n), MRvalue::Use(MOperand::Constant(Constant::float(3.5))));
        let ret = b.return_local();
        b.assign(
            MPlace::Local(ret),
            MRvalue::FormatConvert(MOperand::Copy(MPlace::Local(n)), Symbol::intern("{:>6.2f}")),
        );
        b.set_terminator(Terminator::Return);
        let func = b.build();
        let program = program_with(func);
        let mut interp = Interpreter::new(&program);
        let result = interp.call_by_name("fmtspec", Vec::new()).unwrap();
        assert_eq!(result, Value::String("  3.50".to_string()));
    }

    #[test]
    fn unreachable_terminator_aborts_with_error() {
        let mut b = FunctionBuilder::new("boom", Type::Unit);
        b.set_terminator(Terminator::Unreachable);
        let func = b.build();
        let program = program_with(func);
        let mut interp = Interpreter::new(&program);
        assert!(matches!(interp.call_by_name("boom", Vec::new()), Err(InterpError::Unreachable(_))));
    }
}
