//! Dominator analysis (spec §4.2): iterative dataflow fixed point over
//! reachable blocks, plus immediate dominators derived from it.

use cm_util::{FxHashMap, FxHashSet};

use crate::ids::BlockId;
use crate::mir::Function;

use super::cfg::{postorder, reachable_blocks};

pub struct Dominators {
    /// Every block's full dominator set (always includes itself).
    sets: FxHashMap<BlockId, FxHashSet<BlockId>>,
    idom: FxHashMap<BlockId, BlockId>,
    entry: BlockId,
}

impl Dominators {
    pub fn compute(func: &Function) -> Self {
        let reachable = reachable_blocks(func);
        let entry = func.entry_block;
        let order = postorder(func);

        let all: FxHashSet<BlockId> = reachable.iter().copied().collect();
        let mut sets: FxHashMap<BlockId, FxHashSet<BlockId>> = FxHashMap::default();
        for &b in &reachable {
            if b == entry {
                let mut s = FxHashSet::default();
                s.insert(entry);
                sets.insert(b, s);
            } else {
                sets.insert(b, all.clone());
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &b in &reachable {
                if b == entry {
                    continue;
                }
                let preds: Vec<BlockId> = func.blocks[b]
                    .predecessors
                    .iter()
                    .copied()
                    .filter(|p| reachable.contains(p))
                    .collect();
                if preds.is_empty() {
                    continue;
                }
                let mut new_set: Option<FxHashSet<BlockId>> = None;
                for p in &preds {
                    let pred_set = &sets[p];
                    new_set = Some(match new_set {
                        None => pred_set.clone(),
                        Some(acc) => acc.intersection(pred_set).copied().collect(),
                    });
                }
                let mut new_set = new_set.unwrap_or_default();
                new_set.insert(b);
                if &new_set != &sets[&b] {
                    sets.insert(b, new_set);
                    changed = true;
                }
            }
        }

        let idom = compute_idom(&sets, &order, entry, &reachable);
        Self { sets, idom, entry }
    }

    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.sets.get(&b).map(|s| s.contains(&a)).unwrap_or(false)
    }

    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    pub fn immediate_dominator(&self, b: BlockId) -> Option<BlockId> {
        self.idom.get(&b).copied()
    }

    pub fn dominator_set(&self, b: BlockId) -> Option<&FxHashSet<BlockId>> {
        self.sets.get(&b)
    }

    pub fn dominated_by(&self, a: BlockId) -> Vec<BlockId> {
        self.sets.iter().filter(|(_, doms)| doms.contains(&a)).map(|(id, _)| *id).collect()
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }
}

/// The immediate dominator of `b` is its closest strict dominator: the
/// one with the highest postorder number among candidates that every
/// other dominator of `b` (other than `b` itself) also dominates.
fn compute_idom(
    sets: &FxHashMap<BlockId, FxHashSet<BlockId>>,
    order: &cm_util::IndexVec<BlockId, Option<u32>>,
    entry: BlockId,
    reachable: &FxHashSet<BlockId>,
) -> FxHashMap<BlockId, BlockId> {
    let mut idom = FxHashMap::default();
    for &b in reachable {
        if b == entry {
            continue;
        }
        let doms = &sets[&b];
        let mut best: Option<BlockId> = None;
        for &candidate in doms {
            if candidate == b {
                continue;
            }
            let is_idom = doms
                .iter()
                .all(|&other| other == candidate || other == b || sets[&other].contains(&candidate));
            if is_idom {
                let better = match best {
                    None => true,
                    Some(cur) => order[candidate].unwrap_or(0) > order[cur].unwrap_or(0),
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        if let Some(idom_block) = best {
            idom.insert(b, idom_block);
        }
    }
    idom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cfg::compute_cfg_edges;
    use crate::mir::{BasicBlock, Terminator};
    use cm_hir::Type;
    use cm_util::Symbol;

    /// entry -> {then, else} -> join -> return; a diamond.
    fn diamond() -> Function {
        let mut f = Function::new(Symbol::intern("f"), Type::Unit);
        let entry = f.blocks.push(BasicBlock::new(
            BlockId(0),
            Terminator::SwitchInt {
                discriminant: crate::mir::Operand::Constant(crate::mir::Constant::bool(true)),
                cases: vec![(1, BlockId(1))],
                otherwise: BlockId(2),
            },
        ));
        f.blocks.push(BasicBlock::new(BlockId(1), Terminator::Goto(BlockId(3))));
        f.blocks.push(BasicBlock::new(BlockId(2), Terminator::Goto(BlockId(3))));
        f.blocks.push(BasicBlock::new(BlockId(3), Terminator::Return));
        f.entry_block = entry;
        compute_cfg_edges(&mut f);
        f
    }

    #[test]
    fn join_block_dominated_only_by_entry_and_itself() {
        let f = diamond();
        let dom = Dominators::compute(&f);
        assert!(dom.dominates(BlockId(0), BlockId(3)));
        assert!(!dom.dominates(BlockId(1), BlockId(3)));
        assert!(!dom.dominates(BlockId(2), BlockId(3)));
        assert_eq!(dom.immediate_dominator(BlockId(3)), Some(BlockId(0)));
    }

    #[test]
    fn entry_dominates_everything() {
        let f = diamond();
        let dom = Dominators::compute(&f);
        for b in [BlockId(1), BlockId(2), BlockId(3)] {
            assert!(dom.dominates(BlockId(0), b));
        }
    }
}
