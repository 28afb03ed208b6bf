//! The MIR data model (spec §3): programs, functions, basic blocks,
//! places/projections, operands, rvalues, statements, and terminators.

use cm_hir::Type;
use cm_util::{IndexVec, Span, Symbol};

pub use crate::ids::{BlockId, LocalId};

/// A whole compilation unit's worth of lowered code.
#[derive(Debug, Clone, Default)]
pub struct MirProgram {
    pub functions: IndexVec<cm_util::DefId, Function>,
    pub structs: Vec<cm_hir::StructDef>,
    pub interfaces: Vec<cm_hir::InterfaceDef>,
    pub vtables: Vec<VTable>,
    pub globals: Vec<Global>,
}

impl MirProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_function(&self, name: Symbol) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_function_mut(&mut self, name: Symbol) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn find_struct(&self, name: Symbol) -> Option<&cm_hir::StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Global {
    pub name: Symbol,
    pub ty: Type,
    pub init: Constant,
}

/// A `(concrete_type, interface)` dispatch table. Only ever built for
/// pairs whose every method resolves to a defined function (spec §3).
#[derive(Debug, Clone)]
pub struct VTable {
    pub concrete_type: Symbol,
    pub interface: Symbol,
    pub entries: Vec<(Symbol, Symbol)>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Symbol,
    pub is_extern: bool,
    pub is_async: bool,
    pub is_closure: bool,
    pub captures: Vec<LocalId>,
    pub locals: IndexVec<LocalId, Local>,
    pub blocks: IndexVec<BlockId, BasicBlock>,
    pub entry_block: BlockId,
    pub return_local: LocalId,
    pub arg_locals: Vec<LocalId>,
    pub return_ty: Type,
}

impl Function {
    pub fn new(name: Symbol, return_ty: Type) -> Self {
        let mut locals = IndexVec::new();
        let return_local = locals.push(Local {
            ty: return_ty.clone(),
            span: Span::DUMMY,
            name: None,
            flags: LocalFlags::default(),
        });
        Self {
            name,
            is_extern: false,
            is_async: false,
            is_closure: false,
            captures: Vec::new(),
            locals,
            blocks: IndexVec::new(),
            entry_block: BlockId(0),
            return_local,
            arg_locals: Vec::new(),
            return_ty,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Complexity limit from spec §5: functions over this shape are
    /// marked "too complex" and skipped by quadratic passes.
    pub fn is_too_complex(&self) -> bool {
        self.blocks.len() > 1000
            || self.locals.len() > 500
            || self.blocks.iter().map(|b| b.statements.len()).sum::<usize>() > 10_000
    }

    pub fn new_local(&mut self, ty: Type, name: Option<Symbol>, flags: LocalFlags) -> LocalId {
        self.locals.push(Local { ty, span: Span::DUMMY, name, flags })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalFlags {
    pub is_arg: bool,
    pub is_static: bool,
    pub is_global: bool,
    pub is_user_variable: bool,
    pub is_closure: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub ty: Type,
    pub span: Span,
    pub name: Option<Symbol>,
    pub flags: LocalFlags,
}

impl Local {
    /// Generated locals (e.g. LICM pre-header temporaries, inlining
    /// clones) get a name beginning with `_`, per spec §3.
    pub fn generated(ty: Type, id: LocalId) -> Self {
        Local {
            ty,
            span: Span::DUMMY,
            name: Some(Symbol::intern(&format!("_t{}", id.as_u32()))),
            flags: LocalFlags::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub statements: Vec<Statement>,
    pub terminator: Terminator,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId, terminator: Terminator) -> Self {
        Self { id, statements: Vec::new(), terminator, predecessors: Vec::new(), successors: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign(Place, Rvalue, bool),
    StorageLive(LocalId),
    StorageDead(LocalId),
    Nop,
    Asm(Symbol, Vec<Operand>),
}

impl Statement {
    /// Whether this statement must survive every optimization pass
    /// byte-for-byte (spec §3 invariant 8). Inline asm is always opaque;
    /// an assignment additionally opts in via its `no_opt` flag, set for
    /// `must`-annotated regions lowered out of HIR.
    pub fn is_no_opt(&self) -> bool {
        match self {
            Statement::Asm(..) => true,
            Statement::Assign(_, _, no_opt) => *no_opt,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Local(LocalId),
    Projection(Box<Place>, Projection),
}

impl Place {
    pub fn local(id: LocalId) -> Self {
        Place::Local(id)
    }

    /// The local a place ultimately projects from.
    pub fn base(&self) -> LocalId {
        match self {
            Place::Local(id) => *id,
            Place::Projection(inner, _) => inner.base(),
        }
    }

    pub fn is_trivial(&self) -> bool {
        matches!(self, Place::Local(_))
    }

    pub fn has_deref(&self) -> bool {
        match self {
            Place::Local(_) => false,
            Place::Projection(inner, Projection::Deref) => true || inner.has_deref(),
            Place::Projection(inner, _) => inner.has_deref(),
        }
    }

    pub fn project(self, proj: Projection) -> Self {
        Place::Projection(Box::new(self), proj)
    }

    /// Every local id mentioned anywhere in the projection chain (an
    /// `Index(i)` projection reads `i`, not just the base).
    pub fn mentioned_locals(&self, out: &mut Vec<LocalId>) {
        match self {
            Place::Local(id) => out.push(*id),
            Place::Projection(inner, proj) => {
                inner.mentioned_locals(out);
                if let Projection::Index(idx) = proj {
                    out.push(*idx);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Field(u32),
    Index(LocalId),
    Deref,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Copy(Place),
    Move(Place),
    Constant(Constant),
    FunctionRef(Symbol),
}

impl Operand {
    pub fn place(&self) -> Option<&Place> {
        match self {
            Operand::Copy(p) | Operand::Move(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: Type,
    pub kind: ConstantKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantKind {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(Symbol),
}

impl Constant {
    pub fn int(v: i64) -> Self {
        Constant { ty: Type::Int, kind: ConstantKind::Int(v) }
    }

    pub fn bool(v: bool) -> Self {
        Constant { ty: Type::Bool, kind: ConstantKind::Bool(v) }
    }

    pub fn float(v: f64) -> Self {
        Constant { ty: Type::Float, kind: ConstantKind::Float(v) }
    }

    pub fn unit() -> Self {
        Constant { ty: Type::Unit, kind: ConstantKind::Unit }
    }

    /// Reinterprets a constant whose variant is `int` but declared type
    /// is `char` (spec §3: "char constants whose variant accidentally
    /// carries int are reinterpreted").
    pub fn normalized(self) -> Self {
        if matches!(self.ty, Type::Char) {
            if let ConstantKind::Int(i) = self.kind {
                if let Some(c) = char::from_u32(i as u32) {
                    return Constant { ty: Type::Char, kind: ConstantKind::Char(c) };
                }
            }
        }
        self
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.kind {
            ConstantKind::Int(i) => Some(i),
            ConstantKind::Bool(b) => Some(b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.kind {
            ConstantKind::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ConstantKind::Bool(b) => Some(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    IntToInt,
    IntToFloat,
    FloatToInt,
    FloatToFloat,
    IntToChar,
    CharToInt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateKind {
    Array,
    Tuple,
    Struct(Symbol),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rvalue {
    Use(Operand),
    BinaryOp(BinOp, Operand, Operand, Type),
    UnaryOp(UnOp, Operand),
    Ref(Place),
    Aggregate(AggregateKind, Vec<Operand>),
    Cast(Operand, Type),
    FormatConvert(Operand, Symbol),
}

impl Rvalue {
    /// Every local a read of this rvalue touches, for liveness/DCE/GVN.
    pub fn used_locals(&self, out: &mut Vec<LocalId>) {
        match self {
            Rvalue::Use(op) => push_operand_locals(op, out),
            Rvalue::BinaryOp(_, l, r, _) => {
                push_operand_locals(l, out);
                push_operand_locals(r, out);
            }
            Rvalue::UnaryOp(_, op) => push_operand_locals(op, out),
            Rvalue::Ref(p) => p.mentioned_locals(out),
            Rvalue::Aggregate(_, ops) => {
                for op in ops {
                    push_operand_locals(op, out);
                }
            }
            Rvalue::Cast(op, _) => push_operand_locals(op, out),
            Rvalue::FormatConvert(op, _) => push_operand_locals(op, out),
        }
    }

    pub fn has_ref(&self) -> bool {
        matches!(self, Rvalue::Ref(_))
    }

    /// True when evaluating this rvalue can only read memory through a
    /// plain `Copy`/`Move` of a trivial place — no `Deref`, no `Ref`. Used
    /// by LICM and constant folding to decide whether aliasing matters.
    pub fn touches_projection(&self) -> bool {
        let mut places = Vec::new();
        self.collect_places(&mut places);
        places.iter().any(|p| !p.is_trivial())
    }

    fn collect_places(&self, out: &mut Vec<Place>) {
        match self {
            Rvalue::Use(op) | Rvalue::UnaryOp(_, op) | Rvalue::Cast(op, _) | Rvalue::FormatConvert(op, _) => {
                if let Some(p) = op.place() {
                    out.push(p.clone());
                }
            }
            Rvalue::BinaryOp(_, l, r, _) => {
                if let Some(p) = l.place() {
                    out.push(p.clone());
                }
                if let Some(p) = r.place() {
                    out.push(p.clone());
                }
            }
            Rvalue::Ref(p) => out.push(p.clone()),
            Rvalue::Aggregate(_, ops) => {
                for op in ops {
                    if let Some(p) = op.place() {
                        out.push(p.clone());
                    }
                }
            }
        }
    }
}

fn push_operand_locals(op: &Operand, out: &mut Vec<LocalId>) {
    if let Some(p) = op.place() {
        p.mentioned_locals(out);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Goto(BlockId),
    SwitchInt { discriminant: Operand, cases: Vec<(i128, BlockId)>, otherwise: BlockId },
    Call {
        callee: Operand,
        args: Vec<Operand>,
        destination: Option<Place>,
        success: BlockId,
        unwind: Option<BlockId>,
        is_virtual: bool,
        method_name: Option<Symbol>,
    },
    Return,
    Unreachable,
}

impl Terminator {
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Terminator::Goto(t) => vec![*t],
            Terminator::SwitchInt { cases, otherwise, .. } => {
                let mut v: Vec<BlockId> = cases.iter().map(|(_, t)| *t).collect();
                v.push(*otherwise);
                v
            }
            Terminator::Call { success, unwind, .. } => {
                let mut v = vec![*success];
                if let Some(u) = unwind {
                    v.push(*u);
                }
                v
            }
            Terminator::Return | Terminator::Unreachable => Vec::new(),
        }
    }

    pub fn targets_mut(&mut self) -> Vec<&mut BlockId> {
        match self {
            Terminator::Goto(t) => vec![t],
            Terminator::SwitchInt { cases, otherwise, .. } => {
                let mut v: Vec<&mut BlockId> = cases.iter_mut().map(|(_, t)| t).collect();
                v.push(otherwise);
                v
            }
            Terminator::Call { success, unwind, .. } => {
                let mut v = vec![success];
                if let Some(u) = unwind {
                    v.push(u);
                }
                v
            }
            Terminator::Return | Terminator::Unreachable => Vec::new(),
        }
    }

    pub fn used_operands(&self) -> Vec<&Operand> {
        match self {
            Terminator::SwitchInt { discriminant, .. } => vec![discriminant],
            Terminator::Call { callee, args, .. } => {
                let mut v = vec![callee];
                v.extend(args.iter());
                v
            }
            _ => Vec::new(),
        }
    }
}
