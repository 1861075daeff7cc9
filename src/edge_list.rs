use std::collections::BTreeMap;

use crate::nfa::{Label, Nfa};

/// A single transition `from →_label to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
}

/// The NFA flattened into per-label arrays, tuned for the hot-path linear
/// scan the `advance*` kernels perform (component C).
///
/// Canonicalised (sorted, deduplicated per label) so structural equality
/// ("same relation") is a cheap derived `PartialEq`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeList {
    by_label: BTreeMap<Label, Vec<Edge>>,
}

impl EdgeList {
    pub fn from_nfa(nfa: &Nfa) -> Self {
        let mut by_label: BTreeMap<Label, Vec<Edge>> = BTreeMap::new();
        for (from, state) in nfa.states().iter().enumerate() {
            for (&label, tos) in &state.transitions {
                for &to in tos {
                    by_label.entry(label).or_default().push(Edge { from, to });
                }
            }
        }
        for edges in by_label.values_mut() {
            edges.sort_unstable();
            edges.dedup();
        }
        EdgeList { by_label }
    }

    pub fn edges_for(&self, label: Label) -> &[Edge] {
        self.by_label.get(&label).map_or(&[], |v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::parse_regex;

    #[test]
    fn flattens_symbol_and_wildcard_edges() {
        let nfa = parse_regex("ab").unwrap();
        let edges = EdgeList::from_nfa(&nfa);
        assert_eq!(edges.edges_for(Label::Symbol('a')).len(), 1);
        assert_eq!(edges.edges_for(Label::Symbol('z')).len(), 0);
    }

    #[test]
    fn equality_is_order_independent() {
        let nfa = parse_regex("a|b").unwrap();
        let a = EdgeList::from_nfa(&nfa);
        let b = EdgeList::from_nfa(&nfa);
        assert_eq!(a, b);
    }
}
