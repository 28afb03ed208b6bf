use cm_util::define_idx;

define_idx!(
    /// A local variable slot within one function.
    LocalId
);

define_idx!(
    /// A basic block within one function.
    BlockId
);
