//! Morph lineage queries over the flat `MorphHistoryEntry` edge list: one
//! parent may have many children, a child has at most one parent.

use uuid::Uuid;

use otx_schemas::morph::MorphHistoryEntry;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LineageTree {
    /// Nearest parent first, walking up until no parent is found.
    pub ancestors: Vec<Uuid>,
    /// Direct and transitive children, in discovery order.
    pub descendants: Vec<Uuid>,
}

/// Walk child -> parent one hop at a time, stopping at the first id with
/// no recorded parent.
fn ancestors_of(id: Uuid, history: &[MorphHistoryEntry]) -> Vec<Uuid> {
    let mut out = Vec::new();
    let mut current = id;
    while let Some(entry) = history.iter().find(|e| e.child_strategy_id == current) {
        out.push(entry.parent_strategy_id);
        current = entry.parent_strategy_id;
    }
    out
}

/// Recursively expand every child of `id`, depth-first.
fn descendants_of(id: Uuid, history: &[MorphHistoryEntry]) -> Vec<Uuid> {
    let mut out = Vec::new();
    for entry in history.iter().filter(|e| e.parent_strategy_id == id) {
        out.push(entry.child_strategy_id);
        out.extend(descendants_of(entry.child_strategy_id, history));
    }
    out
}

pub fn get_lineage_tree(id: Uuid, history: &[MorphHistoryEntry]) -> LineageTree {
    LineageTree {
        ancestors: ancestors_of(id, history),
        descendants: descendants_of(id, history),
    }
}

/// Sum `parent_pnl_at_morph_micros` across every ancestor, skipping edges
/// where the parent's P&L at morph time was never recorded.
pub fn get_cumulative_pnl(id: Uuid, history: &[MorphHistoryEntry]) -> i64 {
    let mut total = 0i64;
    let mut current = id;
    while let Some(entry) = history.iter().find(|e| e.child_strategy_id == current) {
        if let Some(pnl) = entry.parent_pnl_at_morph_micros {
            total = total.saturating_add(pnl);
        }
        current = entry.parent_strategy_id;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_schemas::strategy::StrategyKind;

    fn edge(parent: Uuid, child: Uuid, pnl: Option<i64>) -> MorphHistoryEntry {
        MorphHistoryEntry {
            parent_strategy_id: parent,
            child_strategy_id: child,
            parent_kind: StrategyKind::IronCondor,
            child_kind: StrategyKind::Spread,
            parent_pnl_at_morph_micros: pnl,
            reason: "test".to_string(),
            at_epoch_ms: 0,
        }
    }

    #[test]
    fn lineage_walks_ancestors_and_descendants() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let history = vec![edge(a, b, Some(1_000_000)), edge(b, c, Some(2_000_000))];

        let tree = get_lineage_tree(b, &history);
        assert_eq!(tree.ancestors, vec![a]);
        assert_eq!(tree.descendants, vec![c]);
    }

    #[test]
    fn root_has_no_ancestors() {
        let a = Uuid::new_v4();
        let tree = get_lineage_tree(a, &[]);
        assert!(tree.ancestors.is_empty());
        assert!(tree.descendants.is_empty());
    }

    #[test]
    fn cumulative_pnl_sums_ancestors_skipping_nulls() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let history = vec![edge(a, b, None), edge(b, c, Some(5_000_000))];

        assert_eq!(get_cumulative_pnl(c, &history), 5_000_000);
    }

    #[test]
    fn a_parent_can_have_multiple_children() {
        let a = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let history = vec![edge(a, b1, Some(1)), edge(a, b2, Some(2))];

        let tree = get_lineage_tree(a, &history);
        assert_eq!(tree.descendants.len(), 2);
        assert!(tree.descendants.contains(&b1));
        assert!(tree.descendants.contains(&b2));
    }
}
