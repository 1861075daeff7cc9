//! Pluggable eviction policy (component J).
//!
//! A strategy answers "given the currently cached events, the current time,
//! and the incoming event, which cached index should be evicted?". Built-ins
//! are [`Fifo`] and [`NeverEvict`] (the default).

use crate::event::Event;

pub trait EvictionStrategy {
    /// `cached_events` is always full-length (`process_event` only consults
    /// a strategy when the cache has reached capacity).
    fn select(&self, cached_events: &[Event], current_time: u64, incoming: &Event) -> Option<usize>;
}

impl<F> EvictionStrategy for F
where
    F: Fn(&[Event], u64, &Event) -> Option<usize>,
{
    fn select(&self, cached_events: &[Event], current_time: u64, incoming: &Event) -> Option<usize> {
        self(cached_events, current_time, incoming)
    }
}

/// Always evicts the oldest cached event.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fifo;

impl EvictionStrategy for Fifo {
    fn select(&self, cached_events: &[Event], _current_time: u64, _incoming: &Event) -> Option<usize> {
        if cached_events.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Never evicts; the incoming event is dropped instead. The default when no
/// strategy is supplied.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverEvict;

impl EvictionStrategy for NeverEvict {
    fn select(&self, _cached_events: &[Event], _current_time: u64, _incoming: &Event) -> Option<usize> {
        None
    }
}
