//! The `advance*` kernels (component F): given a "before" counter, produce
//! the delta of stepping one event through the automaton. Free functions
//! over [`EdgeList`] rather than methods on the NFA, since the edge list is
//! the representation the hot path actually scans.

use crate::counter::{Counter, StateCounter};
use crate::edge_list::EdgeList;
use crate::event::Event;
use crate::nfa::Label;

fn labels_for(event_type: char) -> [Label; 2] {
    [Label::Symbol(event_type), Label::Wildcard]
}

/// Count semiring: `Δ[v] += c[u]` for every edge `(u, v)` on `event_type` or
/// wildcard.
pub fn advance<T: Counter>(c: &StateCounter<T>, edges: &EdgeList, event_type: char) -> StateCounter<T> {
    let mut delta = StateCounter::new(c.len());
    for label in labels_for(event_type) {
        for edge in edges.edges_for(label) {
            delta[edge.to] += c[edge.from];
        }
    }
    delta
}

/// Sum semiring: `Δ[v] += sum_counter[u] + count_counter[u] * event.value`.
pub fn advance_sum<T: Counter>(
    count_counter: &StateCounter<T>,
    sum_counter: &StateCounter<T>,
    edges: &EdgeList,
    event: &Event,
) -> StateCounter<T> {
    let mut delta = StateCounter::new(count_counter.len());
    let value = T::from_i64(event.value);
    for label in labels_for(event.event_type) {
        for edge in edges.edges_for(label) {
            delta[edge.to] += sum_counter[edge.from] + count_counter[edge.from] * value;
        }
    }
    delta
}

/// Product semiring: `Δ` starts all-ones, then
/// `Δ[v] *= prod_counter[u] * pow(event.value, count_counter[u])`.
pub fn advance_prod<T: Counter>(
    count_counter: &StateCounter<T>,
    prod_counter: &StateCounter<T>,
    edges: &EdgeList,
    event: &Event,
) -> StateCounter<T> {
    let mut delta = StateCounter::filled(count_counter.len(), T::one());
    for label in labels_for(event.event_type) {
        for edge in edges.edges_for(label) {
            delta[edge.to] *= prod_counter[edge.from] * T::powi(event.value, count_counter[edge.from]);
        }
    }
    delta
}
