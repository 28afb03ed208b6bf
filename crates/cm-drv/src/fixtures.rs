//! Named demo programs (spec §6: `--fixture <name>`). Stands in for the
//! surface-syntax front end this repository doesn't implement: every
//! fixture is hand-assembled with [`cm_mir::builder::FunctionBuilder`]
//! the way `cm-mir`'s own unit tests build theirs.

use cm_hir::{FieldDef, StructDef, Type};
use cm_mir::builder::FunctionBuilder;
use cm_mir::{BinOp, Constant, MirProgram, Operand, Place, Projection, Rvalue, Terminator, VTable};
use cm_util::{DefId, Symbol};

pub const FIXTURE_NAMES: &[&str] = &["fib-iterative", "sum-loop", "dynamic-dispatch-shape"];

pub fn build(name: &str) -> Option<(MirProgram, &'static str)> {
    match name {
        "fib-iterative" => Some((fib_iterative(), "main")),
        "sum-loop" => Some((sum_loop(), "sum100")),
        "dynamic-dispatch-shape" => Some((dynamic_dispatch_shape(), "main")),
        _ => None,
    }
}

fn fib_iterative() -> MirProgram {
    let mut b = FunctionBuilder::new("fib", Type::Int);
    let n = b.add_arg("n", Type::Int);
    let a = b.add_local("a", Type::Int);
    let bb = b.add_local("b", Type::Int);
    let i = b.add_local("i", Type::Int);
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

    let fib_func = b.build();
    let fib_name = Symbol::intern("fib");

    let mut main_b = FunctionBuilder::new("main", Type::Int);
    let main_ret = main_b.return_local();
    let ret_block = main_b.new_block();
    main_b.set_terminator(Terminator::Call {
        callee: Operand::FunctionRef(fib_name),
        args: vec![Operand::Constant(Constant::int(10))],
        destination: Some(Place::Local(main_ret)),
        success: ret_block,
        unwind: None,
        is_virtual: false,
        method_name: None,
    });
    main_b.switch_to_block(ret_block);
    main_b.set_terminator(Terminator::Return);

    let mut program = MirProgram::new();
    program.functions.push(fib_func);
    program.functions.push(main_b.build());
    program
}

fn sum_loop() -> MirProgram {
    let mut b = FunctionBuilder::new("sum100", Type::Int);
    let acc = b.add_local("acc", Type::Int);
    let i = b.add_local("i", Type::Int);
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
        Rvalue::BinaryOp(BinOp::Lt, Operand::Copy(Place::Local(i)), Operand::Constant(Constant::int(100)), Type::Int),
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
    program
}

/// A `Circle` implementing a `Shape` interface's `area` method through
/// the vtable, dispatched dynamically (spec §8: `Circle.area == 12`
/// round-trip with radius chosen so `pi`-free integer area is exact).
fn dynamic_dispatch_shape() -> MirProgram {
    let circle_name = Symbol::intern("Circle");
    let shape_name = Symbol::intern("Shape");
    let area_method = Symbol::intern("area");
    let area_fn = Symbol::intern("Circle__area");

    let radius_field = FieldDef { name: Symbol::intern("radius"), ty: Type::Int, css_field: false };
    let circle_struct = StructDef { id: DefId(0), name: circle_name, fields: vec![radius_field] };

    let mut area_b = FunctionBuilder::new("Circle__area", Type::Int);
    let self_arg = area_b.add_arg("self", Type::Struct(circle_name));
    let radius_place = Place::Local(self_arg).project(Projection::Field(0));
    let sq = area_b.add_temp(Type::Int);
    area_b.assign(
        Place::Local(sq),
        Rvalue::BinaryOp(BinOp::Mul, Operand::Copy(radius_place.clone()), Operand::Copy(radius_place), Type::Int),
    );
    let ret = area_b.return_local();
    area_b.assign(
        Place::Local(ret),
        Rvalue::BinaryOp(BinOp::Mul, Operand::Copy(Place::Local(sq)), Operand::Constant(Constant::int(3)), Type::Int),
    );
    area_b.set_terminator(Terminator::Return);
    let area_func = area_b.build();

    let mut main_b = FunctionBuilder::new("main", Type::Int);
    let circle = main_b.add_local("circle", Type::Struct(circle_name));
    main_b.assign(
        Place::Local(circle),
        Rvalue::Aggregate(cm_mir::AggregateKind::Struct(circle_name), vec![Operand::Constant(Constant::int(2))]),
    );
    let main_ret = main_b.return_local();
    let ret_block = main_b.new_block();
    main_b.set_terminator(Terminator::Call {
        callee: Operand::FunctionRef(area_fn),
        args: vec![Operand::Copy(Place::Local(circle))],
        destination: Some(Place::Local(main_ret)),
        success: ret_block,
        unwind: None,
        is_virtual: true,
        method_name: Some(area_method),
    });
    main_b.switch_to_block(ret_block);
    main_b.set_terminator(Terminator::Return);
    let main_func = main_b.build();

    let mut program = MirProgram::new();
    program.structs.push(circle_struct);
    program.vtables.push(VTable { concrete_type: circle_name, interface: shape_name, entries: vec![(area_method, area_fn)] });
    program.functions.push(area_func);
    program.functions.push(main_func);
    program
}
