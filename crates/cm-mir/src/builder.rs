//! A hand-rolled builder for constructing [`Function`]s without a
//! surface syntax. Stands in for the HIR-to-MIR lowering pass this repo
//! does not implement; used by tests and by `cm-drv`'s named fixtures.

use cm_hir::Type;
use cm_util::Symbol;

use crate::ids::{BlockId, LocalId};
use crate::mir::{
    BasicBlock, Function, Local, LocalFlags, Place, Rvalue, Statement, Terminator,
};

pub struct FunctionBuilder {
    function: Function,
    current_block: BlockId,
}

impl FunctionBuilder {
    pub fn new(name: &str, return_ty: Type) -> Self {
        let mut function = Function::new(Symbol::intern(name), return_ty);
        let entry = function.blocks.push(BasicBlock::new(BlockId(0), Terminator::Unreachable));
        function.entry_block = entry;
        Self { function, current_block: entry }
    }

    pub fn add_arg(&mut self, name: &str, ty: Type) -> LocalId {
        let id = self.function.new_local(
            ty,
            Some(Symbol::intern(name)),
            LocalFlags { is_arg: true, is_user_variable: true, ..Default::default() },
        );
        self.function.arg_locals.push(id);
        id
    }

    pub fn add_local(&mut self, name: &str, ty: Type) -> LocalId {
        self.function.new_local(
            ty,
            Some(Symbol::intern(name)),
            LocalFlags { is_user_variable: true, ..Default::default() },
        )
    }

    pub fn add_temp(&mut self, ty: Type) -> LocalId {
        self.function.new_local(ty, None, LocalFlags::default())
    }

    pub fn return_local(&self) -> LocalId {
        self.function.return_local
    }

    /// Allocates a fresh block with a placeholder `Unreachable`
    /// terminator; callers must set a real terminator before `build()`.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::from_u32(self.function.blocks.len() as u32);
        self.function.blocks.push(BasicBlock::new(id, Terminator::Unreachable));
        id
    }

    pub fn set_entry(&mut self, block: BlockId) {
        self.function.entry_block = block;
    }

    pub fn switch_to_block(&mut self, block: BlockId) -> &mut Self {
        self.current_block = block;
        self
    }

    pub fn push_statement(&mut self, stmt: Statement) -> &mut Self {
        self.function.blocks[self.current_block].statements.push(stmt);
        self
    }

    pub fn assign(&mut self, place: Place, rvalue: Rvalue) -> &mut Self {
        self.push_statement(Statement::Assign(place, rvalue, false))
    }

    /// Like [`Self::assign`] but marks the statement `no_opt`: it must
    /// survive every optimization pass byte-for-byte, the way a
    /// `must`-annotated region lowers out of HIR.
    pub fn assign_no_opt(&mut self, place: Place, rvalue: Rvalue) -> &mut Self {
        self.push_statement(Statement::Assign(place, rvalue, true))
    }

    pub fn set_terminator(&mut self, term: Terminator) -> &mut Self {
        self.function.blocks[self.current_block].terminator = term;
        self
    }

    /// Finishes the function, computing predecessor/successor lists via
    /// [`crate::analysis::cfg::compute_cfg_edges`].
    pub fn build(mut self) -> Function {
        crate::analysis::cfg::compute_cfg_edges(&mut self.function);
        self.function
    }
}
