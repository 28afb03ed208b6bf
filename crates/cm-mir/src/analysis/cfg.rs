//! Control-flow graph construction (spec §4.1): predecessor/successor
//! edges, reachability, and postorder numbering.

use cm_util::{FxHashSet, IndexVec};

use crate::ids::BlockId;
use crate::mir::Function;

/// Recomputes every block's `predecessors`/`successors` from its
/// terminator. Called after any pass rewrites a terminator's targets.
pub fn compute_cfg_edges(func: &mut Function) {
    for block in func.blocks.iter_mut() {
        block.predecessors.clear();
        block.successors.clear();
    }

    let edges: Vec<(BlockId, BlockId)> = func
        .blocks
        .iter_enumerated()
        .flat_map(|(id, block)| block.terminator.targets().into_iter().map(move |t| (id, t)))
        .collect();

    for (from, to) in edges {
        func.blocks[from].successors.push(to);
        func.blocks[to].predecessors.push(from);
    }
}

/// Every block reachable from the entry block, via BFS over successors.
pub fn reachable_blocks(func: &Function) -> FxHashSet<BlockId> {
    let mut visited = FxHashSet::default();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(func.entry_block);
    visited.insert(func.entry_block);

    while let Some(current) = queue.pop_front() {
        if let Some(block) = func.blocks.get(current) {
            for &succ in &block.successors {
                if visited.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
    }
    visited
}

pub fn is_reachable(func: &Function, block: BlockId) -> bool {
    reachable_blocks(func).contains(&block)
}

/// DFS postorder numbering from the entry block; unreachable blocks get
/// no number.
pub fn postorder(func: &Function) -> IndexVec<BlockId, Option<u32>> {
    let mut numbers: IndexVec<BlockId, Option<u32>> =
        (0..func.blocks.len()).map(|_| None).collect();
    let mut visited = FxHashSet::default();
    let mut counter = 0u32;

    fn dfs(
        node: BlockId,
        func: &Function,
        visited: &mut FxHashSet<BlockId>,
        numbers: &mut IndexVec<BlockId, Option<u32>>,
        counter: &mut u32,
    ) {
        if !visited.insert(node) {
            return;
        }
        if let Some(block) = func.blocks.get(node) {
            for &succ in &block.successors {
                dfs(succ, func, visited, numbers, counter);
            }
        }
        numbers[node] = Some(*counter);
        *counter += 1;
    }

    dfs(func.entry_block, func, &mut visited, &mut numbers, &mut counter);
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{BasicBlock, Terminator};
    use cm_hir::Type;
    use cm_util::Symbol;

    fn linear_function() -> Function {
        let mut f = Function::new(Symbol::intern("f"), Type::Unit);
        let b0 = f.blocks.push(BasicBlock::new(BlockId(0), Terminator::Goto(BlockId(1))));
        let _b1 = f.blocks.push(BasicBlock::new(BlockId(1), Terminator::Return));
        f.entry_block = b0;
        f
    }

    #[test]
    fn edges_match_terminator_targets() {
        let mut f = linear_function();
        compute_cfg_edges(&mut f);
        assert_eq!(f.blocks[BlockId(0)].successors, vec![BlockId(1)]);
        assert_eq!(f.blocks[BlockId(1)].predecessors, vec![BlockId(0)]);
    }

    #[test]
    fn unreachable_block_excluded() {
        let mut f = linear_function();
        let orphan = f.blocks.push(BasicBlock::new(BlockId(2), Terminator::Return));
        compute_cfg_edges(&mut f);
        let reachable = reachable_blocks(&f);
        assert!(!reachable.contains(&orphan));
    }
}
