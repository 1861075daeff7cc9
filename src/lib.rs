/*!
Incremental, bounded-memory tracking of regex-pattern match statistics over
a sliding time window of typed events.

An [`Selector`] (and its [`CountSelector`], [`SumSelector`], [`ProductSelector`]
aliases) compiles a small regex-like pattern over an alphabet of event types
into an [`Nfa`](nfa::Nfa), then folds each incoming [`Event`] into a bounded
cache of per-event path-count (and, for `Sum`/`Product`, value-weighted)
summaries — without ever rescanning the whole window.

```
use summary_selector::{CountSelector, Event};

let mut selector = CountSelector::<i64>::builder("ab")
    .summary_size(16)
    .time_window_size(10)
    .build()
    .unwrap();

selector.process_event(Event::new('a', 0, 0));
selector.process_event(Event::new('b', 0, 1));
assert_eq!(selector.number_of_contained_complete_matches(), 1);
```
*/

mod advance;
mod counter;
mod edge_list;
mod error;
mod event;
mod eviction;
mod nfa;
mod ring_buffer;
mod selector;
mod semiring;

pub use counter::{Counter, StateCounter};
pub use edge_list::{Edge, EdgeList};
pub use error::ParseError;
pub use event::{parse_events, Event, EventParseError};
pub use eviction::{EvictionStrategy, Fifo, NeverEvict};
pub use nfa::{parse_regex, Label, Nfa, NfaState};
pub use ring_buffer::RingBuffer;
pub use selector::{CacheEntry, CountSelector, ProductSelector, Selector, SumSelector};
pub use semiring::{Count, Product, Semiring, Sum};
