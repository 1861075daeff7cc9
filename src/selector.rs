//! The selector core (component H) and the window/replay machinery it
//! shares with the window manager (component G) and replay engine
//! (component K).

use bon::bon;
use tracing::{debug, trace};

use crate::counter::{Counter, StateCounter};
use crate::edge_list::EdgeList;
use crate::error::ParseError;
use crate::eviction::{EvictionStrategy, NeverEvict};
use crate::event::Event;
use crate::nfa::{parse_regex, Nfa};
use crate::semiring::Semiring;

/// `{ event, state_counter, extra }` — component of the cache (§3).
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<T: Counter, S: Semiring<T>> {
    pub event: Event,
    pub state_counter: StateCounter<T>,
    pub extra: S::Extra,
}

/// The sliding window: `{ total_counter, total_extra, per_event_counters,
/// per_event_extra, start_idx }` (§3).
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Window<T: Counter, S: Semiring<T>> {
    total_counter: StateCounter<T>,
    total_extra: S::Extra,
    per_event_counters: crate::ring_buffer::RingBuffer<StateCounter<T>>,
    per_event_extra: crate::ring_buffer::RingBuffer<S::Extra>,
    pub(crate) start_idx: usize,
}

impl<T: Counter, S: Semiring<T>> Window<T, S> {
    fn new(capacity: usize, num_states: usize, initial_state_id: usize) -> Self {
        let mut w = Window {
            total_counter: StateCounter::new(num_states),
            total_extra: S::init_extra(num_states),
            per_event_counters: crate::ring_buffer::RingBuffer::new(capacity),
            per_event_extra: crate::ring_buffer::RingBuffer::new(capacity),
            start_idx: 0,
        };
        w.reset_counters(initial_state_id);
        w
    }

    fn reset_counters(&mut self, initial_state_id: usize) {
        let n = self.total_counter.len();
        self.total_counter = StateCounter::new(n);
        self.total_counter[initial_state_id] = T::one();
        S::reset_extra(&mut self.total_extra);
        self.per_event_counters.clear();
        self.per_event_extra.clear();
    }

    pub(crate) fn total_counter(&self) -> &StateCounter<T> {
        &self.total_counter
    }

    pub(crate) fn total_extra(&self) -> &S::Extra {
        &self.total_extra
    }

    /// Resets to the identity, then folds `events` through in order —
    /// the same fold `add_event` performs, but touching neither the cache
    /// nor the global totals.
    fn replay(&mut self, initial_state_id: usize, edges: &EdgeList, events: &[Event]) {
        self.reset_counters(initial_state_id);
        for event in events {
            let global_delta = crate::advance::advance(&self.total_counter, edges, event.event_type);
            let global_delta_extra = S::advance_extra(&self.total_counter, &self.total_extra, edges, event);

            let active_len = self.per_event_counters.len();
            for i in 0..active_len {
                let local_delta = crate::advance::advance(&self.per_event_counters[i], edges, event.event_type);
                let local_delta_extra =
                    S::advance_extra(&self.per_event_counters[i], &self.per_event_extra[i], edges, event);
                self.per_event_counters[i] += &local_delta;
                S::combine_extra(&mut self.per_event_extra[i], &local_delta_extra);
            }

            self.total_counter += &global_delta;
            S::combine_extra(&mut self.total_extra, &global_delta_extra);

            self.per_event_counters.push_back(global_delta);
            self.per_event_extra.push_back(global_delta_extra);
        }
    }
}

/// `|t1 - t2| <= window_size`.
fn in_shared_window(window_size: u64, t1: u64, t2: u64) -> bool {
    let (hi, lo) = if t1 > t2 { (t1, t2) } else { (t2, t1) };
    hi - lo <= window_size
}

/// The incremental, bounded summary of an event stream (component H).
///
/// Generic over the numeric element type `T` and the aggregation semiring
/// `S`; see [`crate::semiring::Count`], [`crate::semiring::Sum`] and
/// [`crate::semiring::Product`] for the three instantiations, and their
/// dedicated `impl` blocks below for the facades each exposes.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector<T: Counter, S: Semiring<T>> {
    automaton: Nfa,
    edges: EdgeList,
    capacity: usize,
    time_to_live: Option<u64>,
    cache: Vec<CacheEntry<T, S>>,
    total_counter: StateCounter<T>,
    total_detected_counter: StateCounter<T>,
    total_extra: S::Extra,
    total_detected_extra: S::Extra,
    window: Window<T, S>,
    current_time: u64,
}

#[bon]
impl<T: Counter, S: Semiring<T>> Selector<T, S> {
    /// Builds a selector. `query` is compiled into an NFA immediately;
    /// a malformed pattern rejects construction with a [`ParseError`].
    #[builder]
    pub fn new(
        #[builder(start_fn)] query: &str,
        summary_size: usize,
        time_window_size: u64,
        time_to_live: Option<u64>,
    ) -> Result<Self, ParseError> {
        let automaton = parse_regex(query)?;
        let edges = EdgeList::from_nfa(&automaton);
        let num_states = automaton.number_of_states();
        let initial = automaton.initial_state_id();

        let window = Window::new(time_window_size as usize, num_states, initial);

        Ok(Selector {
            automaton,
            edges,
            capacity: summary_size,
            time_to_live,
            cache: Vec::with_capacity(summary_size),
            total_counter: StateCounter::new(num_states),
            total_detected_counter: StateCounter::new(num_states),
            total_extra: S::init_extra(num_states),
            total_detected_extra: S::init_extra(num_states),
            window,
            current_time: 0,
        })
    }
}

impl<T: Counter, S: Semiring<T>> Selector<T, S> {
    pub fn automaton(&self) -> &Nfa {
        &self.automaton
    }

    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    pub fn time_window_size(&self) -> u64 {
        self.window.per_event_counters.capacity() as u64
    }

    pub fn cached_events(&self) -> &[CacheEntry<T, S>] {
        &self.cache
    }

    pub(crate) fn window_total_counter(&self) -> &StateCounter<T> {
        self.window.total_counter()
    }

    fn timestamp_at(&self, idx: usize) -> u64 {
        self.cache[idx].event.timestamp
    }

    fn window_size(&self) -> u64 {
        self.window.per_event_counters.capacity() as u64
    }

    fn in_shared_window(&self, t1: u64, t2: u64) -> bool {
        in_shared_window(self.window_size(), t1, t2)
    }

    /// Advances the selector with `event`, dropping it if the cache is full
    /// and no eviction strategy was supplied.
    pub fn process_event(&mut self, event: Event) {
        self.process_event_with(event, &NeverEvict);
    }

    /// As [`Self::process_event`], but with an explicit eviction strategy.
    pub fn process_event_with(&mut self, event: Event, strategy: &dyn EvictionStrategy) {
        let _span = tracing::trace_span!("process_event", event_type = %event.event_type, timestamp = event.timestamp).entered();

        self.current_time = event.timestamp;
        self.update_window(event.timestamp);
        self.purge_expired();

        if self.cache.len() == self.capacity {
            let events: Vec<Event> = self.cache.iter().map(|c| c.event).collect();
            if let Some(idx) = strategy.select(&events, self.current_time, &event) {
                debug!(idx, "evicting cached event to make room");
                self.remove_event(idx);
            }
        }

        if self.cache.len() < self.capacity {
            self.add_event(event);
        } else {
            trace!("cache full and no eviction selected; dropping event");
        }
    }

    fn update_window(&mut self, timestamp: u64) {
        Self::slide_window(&mut self.window, &self.cache, &self.automaton, &self.edges, timestamp);
    }

    /// Pops every per-event counter whose event no longer shares the window
    /// with `timestamp`, then — if any popped event could have initiated a
    /// path from the initial state — replays the survivors (component G).
    fn slide_window(
        window: &mut Window<T, S>,
        cache: &[CacheEntry<T, S>],
        automaton: &Nfa,
        edges: &EdgeList,
        timestamp: u64,
    ) {
        let window_size = window.per_event_counters.capacity() as u64;
        let mut removed_initiator = false;

        while !window.per_event_counters.is_empty()
            && !in_shared_window(window_size, timestamp, cache[window.start_idx].event.timestamp)
        {
            let event_type = cache[window.start_idx].event.event_type;
            window.start_idx += 1;
            removed_initiator |= automaton.initial_state_has_edge(event_type);
            window.per_event_counters.pop_front();
            window.per_event_extra.pop_front();
        }

        if removed_initiator {
            trace!(start_idx = window.start_idx, "initiator left the window; replaying");
            let events: Vec<Event> = cache[window.start_idx..window.start_idx + window.per_event_counters.len()]
                .iter()
                .map(|c| c.event)
                .collect();
            window.replay(automaton.initial_state_id(), edges, &events);
        }
    }

    fn replay_range(
        window: &mut Window<T, S>,
        cache: &[CacheEntry<T, S>],
        automaton: &Nfa,
        edges: &EdgeList,
        from: usize,
        to: usize,
    ) {
        window.start_idx = from;
        let events: Vec<Event> = cache[from..to].iter().map(|c| c.event).collect();
        window.replay(automaton.initial_state_id(), edges, &events);
    }

    fn add_event(&mut self, event: Event) {
        let global_delta = crate::advance::advance(&self.window.total_counter, &self.edges, event.event_type);
        let global_delta_extra =
            S::advance_extra(&self.window.total_counter, &self.window.total_extra, &self.edges, &event);

        let active_len = self.cache.len() - self.window.start_idx;
        for i in 0..active_len {
            let cache_idx = self.window.start_idx + i;
            let local_delta =
                crate::advance::advance(&self.window.per_event_counters[i], &self.edges, event.event_type);
            let local_delta_extra = S::advance_extra(
                &self.window.per_event_counters[i],
                &self.window.per_event_extra[i],
                &self.edges,
                &event,
            );

            self.cache[cache_idx].state_counter += &local_delta;
            S::combine_extra(&mut self.cache[cache_idx].extra, &local_delta_extra);

            self.window.per_event_counters[i] += &local_delta;
            S::combine_extra(&mut self.window.per_event_extra[i], &local_delta_extra);
        }

        self.window.total_counter += &global_delta;
        S::combine_extra(&mut self.window.total_extra, &global_delta_extra);

        self.total_counter += &global_delta;
        S::combine_extra(&mut self.total_extra, &global_delta_extra);

        self.total_detected_counter += &global_delta;
        S::combine_extra(&mut self.total_detected_extra, &global_delta_extra);

        self.window.per_event_counters.push_back(global_delta.clone());
        self.window.per_event_extra.push_back(global_delta_extra.clone());

        self.cache.push(CacheEntry {
            event,
            state_counter: global_delta,
            extra: global_delta_extra,
        });
    }

    /// Explicit removal of the cached event at `idx`. Panics if `idx` is out
    /// of range.
    pub fn remove_event(&mut self, idx: usize) {
        assert!(idx < self.cache.len(), "remove_event: index {idx} out of range");

        self.total_counter -= &self.cache[idx].state_counter;
        S::uncombine_extra(&mut self.total_extra, &self.cache[idx].extra);

        let removed_ts = self.cache[idx].event.timestamp;
        if idx < self.window.start_idx {
            self.window.start_idx -= 1;
        }
        self.cache.remove(idx);

        if self.cache.is_empty() {
            self.window.start_idx = 0;
            self.window.reset_counters(self.automaton.initial_state_id());
            return;
        }

        self.replay_affected_range(idx, removed_ts);

        if self.in_shared_window(self.current_time, removed_ts) {
            Self::replay_range(
                &mut self.window,
                &self.cache,
                &self.automaton,
                &self.edges,
                self.window.start_idx,
                self.cache.len(),
            );
        }
    }

    /// Repairs `state_counter`/`extra` of cached events whose sliding window
    /// overlapped the just-removed event at `removed_ts` (component K).
    fn replay_affected_range(&mut self, removed_idx: usize, removed_ts: u64) {
        if self.cache.is_empty() {
            return;
        }
        let w = self.window_size();

        let mut replay_start_idx = removed_idx.saturating_sub(w as usize);
        while replay_start_idx < self.cache.len()
            && !self.in_shared_window(removed_ts, self.timestamp_at(replay_start_idx))
        {
            replay_start_idx += 1;
        }
        if replay_start_idx >= self.cache.len() {
            return;
        }
        let replay_start_ts = self.timestamp_at(replay_start_idx);

        let mut time_window_replay_start_idx = replay_start_idx.saturating_sub(w as usize);
        while time_window_replay_start_idx < self.cache.len()
            && !self.in_shared_window(replay_start_ts, self.timestamp_at(time_window_replay_start_idx))
        {
            time_window_replay_start_idx += 1;
        }

        let num_states = self.automaton.number_of_states();
        let mut replay_window = Window::<T, S>::new(w as usize, num_states, self.automaton.initial_state_id());
        Self::replay_range(
            &mut replay_window,
            &self.cache,
            &self.automaton,
            &self.edges,
            time_window_replay_start_idx,
            replay_start_idx,
        );

        let mut idx = replay_start_idx;
        while idx < self.cache.len() {
            let relevant = self.in_shared_window(removed_ts, self.timestamp_at(idx))
                || self.in_shared_window(removed_ts, self.timestamp_at(replay_window.start_idx));
            if !relevant {
                break;
            }

            let ts = self.timestamp_at(idx);
            Self::slide_window(&mut replay_window, &self.cache, &self.automaton, &self.edges, ts);

            let event = self.cache[idx].event;
            let global_delta = crate::advance::advance(&replay_window.total_counter, &self.edges, event.event_type);
            let global_delta_extra = S::advance_extra(
                &replay_window.total_counter,
                &replay_window.total_extra,
                &self.edges,
                &event,
            );

            let active_len = idx - replay_window.start_idx;
            for i in 0..active_len {
                let cache_idx = replay_window.start_idx + i;
                let local_delta =
                    crate::advance::advance(&replay_window.per_event_counters[i], &self.edges, event.event_type);
                let local_delta_extra = S::advance_extra(
                    &replay_window.per_event_counters[i],
                    &replay_window.per_event_extra[i],
                    &self.edges,
                    &event,
                );

                if cache_idx >= replay_start_idx && self.in_shared_window(removed_ts, self.timestamp_at(cache_idx)) {
                    self.cache[cache_idx].state_counter += &local_delta;
                    S::combine_extra(&mut self.cache[cache_idx].extra, &local_delta_extra);
                }

                replay_window.per_event_counters[i] += &local_delta;
                S::combine_extra(&mut replay_window.per_event_extra[i], &local_delta_extra);
            }

            replay_window.total_counter += &global_delta;
            S::combine_extra(&mut replay_window.total_extra, &global_delta_extra);

            replay_window.per_event_counters.push_back(global_delta.clone());
            replay_window.per_event_extra.push_back(global_delta_extra.clone());

            if self.in_shared_window(removed_ts, self.timestamp_at(idx)) {
                self.cache[idx].state_counter = global_delta;
                self.cache[idx].extra = global_delta_extra;
            }

            idx += 1;
        }
    }

    /// Evicts every cached event older than `time_to_live`, repairing
    /// affected survivors and the window as it goes.
    fn purge_expired(&mut self) {
        let Some(ttl) = self.time_to_live else {
            return;
        };

        let mut purge_until = 0usize;
        while purge_until < self.cache.len()
            && self.current_time.saturating_sub(self.cache[purge_until].event.timestamp) > ttl
        {
            self.total_counter -= &self.cache[purge_until].state_counter;
            S::uncombine_extra(&mut self.total_extra, &self.cache[purge_until].extra);

            let removed_ts = self.cache[purge_until].event.timestamp;
            // Sentinel trick: mark the entry ignorable for the duration of
            // the replay rather than maintaining an out-of-band flag
            // (behaviourally equivalent, simpler; SPEC_FULL.md §9).
            self.cache[purge_until].event.timestamp = u64::MAX;
            self.replay_affected_range(purge_until + 1, removed_ts);

            purge_until += 1;
        }

        if purge_until == 0 {
            return;
        }
        debug!(purge_until, "purging expired cache entries");

        self.cache.drain(0..purge_until);

        if self.cache.is_empty() {
            self.window.start_idx = 0;
            self.window.reset_counters(self.automaton.initial_state_id());
            return;
        }

        if purge_until <= self.window.start_idx {
            self.window.start_idx -= purge_until;
        } else {
            let cap = self.window.per_event_counters.capacity();
            let new_start = self.cache.len().saturating_sub(cap);
            Self::replay_range(
                &mut self.window,
                &self.cache,
                &self.automaton,
                &self.edges,
                new_start,
                self.cache.len(),
            );
        }
    }
}

fn sum_over<T: Counter>(counter: &StateCounter<T>, automaton: &Nfa, want_final: bool) -> T {
    let mut total = T::zero();
    for (i, state) in automaton.states().iter().enumerate() {
        if state.is_final == want_final {
            total += counter[i];
        }
    }
    total
}

fn prod_over<T: Counter>(counter: &StateCounter<T>, automaton: &Nfa, want_final: bool) -> T {
    let mut total = T::one();
    for (i, state) in automaton.states().iter().enumerate() {
        if state.is_final == want_final {
            total *= counter[i];
        }
    }
    total
}

/// Count facade (component I): available on every semiring variant, since
/// all of them carry the count counter.
impl<T: Counter, S: Semiring<T>> Selector<T, S> {
    pub fn number_of_contained_complete_matches(&self) -> T {
        sum_over(&self.total_counter, &self.automaton, true)
    }

    pub fn number_of_contained_partial_matches(&self) -> T {
        sum_over(&self.total_counter, &self.automaton, false)
    }

    pub fn number_of_detected_complete_matches(&self) -> T {
        sum_over(&self.total_detected_counter, &self.automaton, true)
    }

    pub fn number_of_detected_partial_matches(&self) -> T {
        sum_over(&self.total_detected_counter, &self.automaton, false)
    }
}

/// Sum facade (component I), only meaningful on `Selector<T, Sum>`.
impl<T: Counter> Selector<T, crate::semiring::Sum> {
    pub fn sum_of_contained_complete_matches(&self) -> T {
        sum_over(&self.total_extra, &self.automaton, true)
    }

    pub fn sum_of_contained_partial_matches(&self) -> T {
        sum_over(&self.total_extra, &self.automaton, false)
    }

    pub fn sum_of_detected_complete_matches(&self) -> T {
        sum_over(&self.total_detected_extra, &self.automaton, true)
    }

    pub fn sum_of_detected_partial_matches(&self) -> T {
        sum_over(&self.total_detected_extra, &self.automaton, false)
    }
}

/// Product / geometric-mean facade (component I), only meaningful on
/// `Selector<T, Product>`.
impl<T: Counter> Selector<T, crate::semiring::Product> {
    pub fn prod_of_contained_complete_matches(&self) -> T {
        prod_over(&self.total_extra, &self.automaton, true)
    }

    pub fn prod_of_contained_partial_matches(&self) -> T {
        prod_over(&self.total_extra, &self.automaton, false)
    }

    pub fn prod_of_detected_complete_matches(&self) -> T {
        prod_over(&self.total_detected_extra, &self.automaton, true)
    }

    pub fn prod_of_detected_partial_matches(&self) -> T {
        prod_over(&self.total_detected_extra, &self.automaton, false)
    }

    pub fn geometric_mean_of_contained_complete_matches(&self) -> T {
        self.prod_of_contained_complete_matches()
            .geometric_root(self.number_of_contained_complete_matches())
    }

    pub fn geometric_mean_of_contained_partial_matches(&self) -> T {
        self.prod_of_contained_partial_matches()
            .geometric_root(self.number_of_contained_partial_matches())
    }

    pub fn geometric_mean_of_detected_complete_matches(&self) -> T {
        self.prod_of_detected_complete_matches()
            .geometric_root(self.number_of_detected_complete_matches())
    }

    pub fn geometric_mean_of_detected_partial_matches(&self) -> T {
        self.prod_of_detected_partial_matches()
            .geometric_root(self.number_of_detected_partial_matches())
    }
}

pub type CountSelector<T> = Selector<T, crate::semiring::Count>;
pub type SumSelector<T> = Selector<T, crate::semiring::Sum>;
pub type ProductSelector<T> = Selector<T, crate::semiring::Product>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{Count, Sum};

    fn ev(ty: char, value: i64, ts: u64) -> Event {
        Event::new(ty, value, ts)
    }

    #[test]
    fn sum_semiring_window_reset_is_zero_not_one() {
        let mut selector = Selector::<i64, Sum>::builder("a")
            .summary_size(4)
            .time_window_size(4)
            .build()
            .unwrap();
        selector.process_event(ev('a', 5, 0));
        assert_eq!(selector.sum_of_contained_complete_matches(), 5);
        // window resets to identity (all-zero) once the match ages out.
        selector.process_event(ev('z', 0, 10));
        assert_eq!(selector.sum_of_contained_complete_matches(), 0);
    }

    #[test]
    fn detected_total_never_shrinks_after_removal() {
        let mut selector = Selector::<i64, Count>::builder("ab")
            .summary_size(8)
            .time_window_size(8)
            .build()
            .unwrap();
        selector.process_event(ev('a', 0, 0));
        selector.process_event(ev('b', 0, 1));
        let detected_before = selector.number_of_detected_complete_matches();
        selector.remove_event(0);
        selector.process_event(ev('z', 0, 2));
        assert!(selector.number_of_detected_complete_matches() >= detected_before);
        assert!(selector.number_of_contained_complete_matches() <= detected_before);
    }

    #[test]
    fn purge_twice_without_advancing_time_is_a_no_op() {
        let mut selector = Selector::<i64, Count>::builder("a")
            .summary_size(4)
            .time_window_size(4)
            .time_to_live(1)
            .build()
            .unwrap();
        selector.process_event(ev('a', 0, 0));
        selector.process_event(ev('b', 0, 5));
        let after_first = selector.cached_events().to_vec();
        selector.purge_expired();
        assert_eq!(selector.cached_events().to_vec(), after_first);
    }

    #[test]
    fn removing_an_event_already_outside_the_window_leaves_the_window_total_untouched() {
        let mut selector = Selector::<i64, Count>::builder("ab")
            .summary_size(8)
            .time_window_size(2)
            .build()
            .unwrap();
        selector.process_event(ev('a', 0, 0));
        selector.process_event(ev('a', 0, 1));
        selector.process_event(ev('b', 0, 2));
        selector.process_event(ev('b', 0, 3));
        let before = selector.window_total_counter().clone();

        selector.remove_event(0); // timestamp 0, already > window_size=2 away from current_time=3
        assert_eq!(*selector.window_total_counter(), before);
    }

    #[derive(Clone, Default)]
    struct CaptureBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureBuffer {
        type Writer = CaptureBuffer;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn eviction_emits_a_debug_log_line() {
        let buffer = CaptureBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(buffer.clone())
            .without_time()
            .with_target(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut selector = Selector::<i64, Count>::builder("a")
                .summary_size(1)
                .time_window_size(4)
                .build()
                .unwrap();
            selector.process_event_with(ev('a', 0, 0), &crate::eviction::Fifo);
            selector.process_event_with(ev('b', 0, 1), &crate::eviction::Fifo);
        });

        let logged = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(
            logged.contains("evicting"),
            "expected an eviction debug line, got: {logged}"
        );
    }
}
