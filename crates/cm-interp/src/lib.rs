//! cm-interp - a tree-walking interpreter over [`cm_mir::MirProgram`],
//! used as the reference execution path against which the JS emitter's
//! output is checked (spec §4.11).

pub mod builtins;
pub mod error;
pub mod eval;
pub mod format;
pub mod frame;
pub mod value;

pub use cm_mir::LocalId;
pub use error::{InterpError, InterpResult};
pub use eval::Interpreter;
pub use value::Value;

use cm_mir::MirProgram;

/// Runs `entry_name` (which must take zero parameters) to completion and
/// returns its return-local's final value (spec §6).
pub fn execute(program: &MirProgram, entry_name: &str) -> InterpResult<Value> {
    let func = program
        .find_function(cm_util::Symbol::intern(entry_name))
        .ok_or_else(|| InterpError::EntryNotFound(entry_name.to_string()))?;
    if !func.arg_locals.is_empty() {
        return Err(InterpError::EntryHasParameters(entry_name.to_string()));
    }
    let mut interp = Interpreter::new(program);
    interp.execute_function(func, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_hir::Type;
    use cm_mir::builder::FunctionBuilder;
    use cm_mir::{BinOp, Constant, Operand, Place, Rvalue, Terminator};

    /// `fn fib(n: int) -> int` computed iteratively, called with n=10,
    /// expecting 55 (spec §8 interpreter round-trip scenario).
    fn build_fib_iterative() -> MirProgram {
        let mut b = FunctionBuilder::new("fib", Type::Int);
        let n = b.add_arg("n", Type::Int);
        let a = b.add_temp(Type::Int);
        let bb = b.add_temp(Type::Int);
        let i = b.add_temp(Type::Int);
        let cond = b.add_temp(Type::Bool);
        let tmp = b.add_temp(Type::Int);

        let header = b.new_block();
        let body = b.new_block();
        let exit = b.new_block();

        b.assign(Place::Local(a), Rvalue::Use(Operand::Constant(Constant::int(0))));
        b.assign(Place::Local(bb), Rvalue::Use(Operand::Constant(Constant::int(1))));
        b.assign(Place::Local(i), Rvalue::Use(Operand::Constant(Constant::int(0))));
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(header);
        b.assign(
            Place::Local(cond),
            Rvalue::BinaryOp(BinOp::Lt, Operand::Copy(Place::Local(i)), Operand::Copy(Place::Local(n)), Type::Int),
        );
        b.set_terminator(Terminator::SwitchInt {
            discriminant: Operand::Copy(Place::Local(cond)),
            cases: vec![(1, body)],
            otherwise: exit,
        });

        b.switch_to_block(body);
        b.assign(
            Place::Local(tmp),
            Rvalue::BinaryOp(BinOp::Add, Operand::Copy(Place::Local(a)), Operand::Copy(Place::Local(bb)), Type::Int),
        );
        b.assign(Place::Local(a), Rvalue::Use(Operand::Copy(Place::Local(bb))));
        b.assign(Place::Local(bb), Rvalue::Use(Operand::Copy(Place::Local(tmp))));
        b.assign(
            Place::Local(i),
            Rvalue::BinaryOp(BinOp::Add, Operand::Copy(Place::Local(i)), Operand::Constant(Constant::int(1)), Type::Int),
        );
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(exit);
        let ret = b.return_local();
        b.assign(Place::Local(ret), Rvalue::Use(Operand::Copy(Place::Local(a))));
        b.set_terminator(Terminator::Return);

        let mut program = MirProgram::new();
        program.functions.push(b.build());
        program
    }

    #[test]
    fn fib_iterative_of_ten_is_fifty_five() {
        let program = build_fib_iterative();
        let mut interp = Interpreter::new(&program);
        let result = interp.call_by_name("fib", vec![Value::Int(10)]).unwrap();
        assert_eq!(result, Value::Int(55));
    }

    #[test]
    fn execute_rejects_entry_with_parameters() {
        let program = build_fib_iterative();
        let err = execute(&program, "fib").unwrap_err();
        assert!(matches!(err, InterpError::EntryHasParameters(_)));
    }

    #[test]
    fn execute_rejects_unknown_entry() {
        let program = build_fib_iterative();
        let err = execute(&program, "nope").unwrap_err();
        assert!(matches!(err, InterpError::EntryNotFound(_)));
    }

    /// `sum(n)` accumulating `0..100` via a loop, expecting 4950.
    #[test]
    fn sum_loop_to_one_hundred_is_4950() {
        let mut b = FunctionBuilder::new("sum100", Type::Int);
        let acc = b.add_temp(Type::Int);
        let i = b.add_temp(Type::Int);
        let cond = b.add_temp(Type::Bool);

        let header = b.new_block();
        let body = b.new_block();
        let exit = b.new_block();

        b.assign(Place::Local(acc), Rvalue::Use(Operand::Constant(Constant::int(0))));
        b.assign(Place::Local(i), Rvalue::Use(Operand::Constant(Constant::int(0))));
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(header);
        b.assign(
            Place::Local(cond),
            Rvalue::BinaryOp(
                BinOp::Lt,
                Operand::Copy(Place::Local(i)),
                Operand::Constant(Constant::int(100)),
                Type::Int,
            ),
        );
        b.set_terminator(Terminator::SwitchInt {
            discriminant: Operand::Copy(Place::Local(cond)),
            cases: vec![(1, body)],
            otherwise: exit,
        });

        b.switch_to_block(body);
        b.assign(
            Place::Local(acc),
            Rvalue::BinaryOp(BinOp::Add, Operand::Copy(Place::Local(acc)), Operand::Copy(Place::Local(i)), Type::Int),
        );
        b.assign(
            Place::Local(i),
            Rvalue::BinaryOp(BinOp::Add, Operand::Copy(Place::Local(i)), Operand::Constant(Constant::int(1)), Type::Int),
        );
        b.set_terminator(Terminator::Goto(header));

        b.switch_to_block(exit);
        let ret = b.return_local();
        b.assign(Place::Local(ret), Rvalue::Use(Operand::Copy(Place::Local(acc))));
        b.set_terminator(Terminator::Return);

        let mut program = MirProgram::new();
        program.functions.push(b.build());

        let result = execute(&program, "sum100").unwrap();
        assert_eq!(result, Value::Int(4950));
    }
}
