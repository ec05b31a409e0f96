//! Branch precedence
//!
//! When branches disagree about the same legal interval under the same
//! horizon, the instrument's caller-supplied total order decides. There is
//! no default order: without one, disagreement is an ambiguity.

use serde::{Deserialize, Serialize};

use regula_core::BranchId;

/// Total order over branch ids, highest precedence first
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPriority {
    order: Vec<BranchId>,
}

impl BranchPriority {
    /// Build from an ordered list. Repeated ids keep their first position.
    pub fn new(order: impl IntoIterator<Item = BranchId>) -> Self {
        let mut seen = std::collections::HashSet::new();
        BranchPriority {
            order: order.into_iter().filter(|b| seen.insert(*b)).collect(),
        }
    }

    /// Position of a branch; lower is stronger
    pub fn rank(&self, branch: BranchId) -> Option<usize> {
        self.order.iter().position(|b| *b == branch)
    }

    /// Strongest of `candidates`, or `None` when any candidate is unranked
    pub fn pick(&self, candidates: &[BranchId]) -> Option<BranchId> {
        let mut best: Option<(usize, BranchId)> = None;
        for &candidate in candidates {
            let rank = self.rank(candidate)?;
            if best.map_or(true, |(r, _)| rank < r) {
                best = Some((rank, candidate));
            }
        }
        best.map(|(_, b)| b)
    }

    pub fn order(&self) -> &[BranchId] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_strongest() {
        let p = BranchPriority::new([BranchId::new(2), BranchId::new(1)]);
        assert_eq!(p.pick(&[BranchId::new(1), BranchId::new(2)]), Some(BranchId::new(2)));
    }

    #[test]
    fn test_pick_requires_every_candidate_ranked() {
        let p = BranchPriority::new([BranchId::new(2)]);
        assert_eq!(p.pick(&[BranchId::new(1), BranchId::new(2)]), None);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let p = BranchPriority::new([BranchId::new(3), BranchId::new(1), BranchId::new(3)]);
        assert_eq!(p.order(), &[BranchId::new(3), BranchId::new(1)]);
        assert_eq!(p.rank(BranchId::new(1)), Some(1));
    }
}
