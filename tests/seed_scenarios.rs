//! The concrete seed scenarios named in spec.md §8.

use summary_selector::{CountSelector, Event, Fifo, ProductSelector, SumSelector};

fn stream(triples: &[(char, i64, u64)]) -> Vec<Event> {
    triples.iter().map(|&(t, v, ts)| Event::new(t, v, ts)).collect()
}

#[test]
fn scenario_1_abcde_has_four_complete_matches() {
    let mut selector = CountSelector::<i64>::builder("a(b|c)d?e")
        .summary_size(10)
        .time_window_size(10)
        .build()
        .unwrap();
    for event in stream(&[('a', 0, 0), ('b', 0, 1), ('c', 0, 2), ('d', 0, 3), ('e', 0, 4)]) {
        selector.process_event(event);
    }
    assert_eq!(selector.number_of_contained_complete_matches(), 4);
}

#[test]
fn scenario_2_aabcde_has_twelve_complete_matches() {
    let mut selector = CountSelector::<i64>::builder("a(b|c)+d?e")
        .summary_size(10)
        .time_window_size(10)
        .build()
        .unwrap();
    for event in stream(&[
        ('a', 0, 0),
        ('a', 0, 1),
        ('b', 0, 2),
        ('c', 0, 3),
        ('d', 0, 4),
        ('e', 0, 5),
    ]) {
        selector.process_event(event);
    }
    assert_eq!(selector.number_of_contained_complete_matches(), 12);
}

#[test]
fn scenario_3_fifo_eviction_matches_replaying_only_the_surviving_tail() {
    let mut full = CountSelector::<i64>::builder("abc")
        .summary_size(3)
        .time_window_size(3)
        .build()
        .unwrap();
    for (i, c) in ('a'..='z').enumerate() {
        full.process_event_with(Event::new(c, 0, i as u64), &Fifo);
    }

    let mut tail = CountSelector::<i64>::builder("abc")
        .summary_size(3)
        .time_window_size(3)
        .build()
        .unwrap();
    for event in stream(&[('x', 0, 23), ('y', 0, 24), ('z', 0, 25)]) {
        tail.process_event_with(event, &Fifo);
    }

    assert_eq!(
        full.number_of_contained_complete_matches(),
        tail.number_of_contained_complete_matches()
    );
    assert_eq!(full.cached_events().len(), tail.cached_events().len());
}

#[test]
fn scenario_4_sum_semiring_count_and_sum() {
    let mut selector = SumSelector::<i64>::builder("a(b*c)*d")
        .summary_size(10)
        .time_window_size(10)
        .build()
        .unwrap();
    for event in stream(&[('a', 3, 0), ('b', 4, 1), ('a', 1, 2), ('b', 2, 3), ('c', 5, 4), ('d', 6, 5)]) {
        selector.process_event(event);
    }
    assert_eq!(selector.number_of_contained_complete_matches(), 8);
    assert_eq!(selector.sum_of_contained_complete_matches(), 140);
}

#[test]
fn scenario_5_product_semiring_count_product_and_geometric_mean() {
    let mut selector = ProductSelector::<f64>::builder("a(b*c)*d")
        .summary_size(10)
        .time_window_size(10)
        .build()
        .unwrap();
    for event in stream(&[('a', 3, 0), ('b', 5, 1), ('a', 2, 2), ('b', 4, 3), ('c', 2, 4), ('d', 5, 5)]) {
        selector.process_event(event);
    }
    assert_eq!(selector.number_of_contained_complete_matches(), 8.0);
    let prod = selector.prod_of_contained_complete_matches();
    assert!(
        (prod - 77_760_000_000_000.0).abs() < 1.0,
        "product was {prod}"
    );
    let mean = selector.geometric_mean_of_contained_complete_matches();
    assert!((mean - 54.493_478_530_0).abs() < 1e-3, "geometric mean was {mean}");
}

#[test]
fn scenario_6_skip_then_process_equals_process_then_remove_for_every_single_deletion() {
    let input = stream(&[
        ('a', 0, 0),
        ('a', 0, 1),
        ('b', 0, 2),
        ('c', 0, 3),
        ('d', 0, 4),
        ('c', 0, 5),
        ('e', 0, 6),
        ('b', 0, 7),
        ('d', 0, 8),
        ('e', 0, 9),
    ]);
    let tail_event = Event::new('e', 0, 100);

    for k in 0..input.len() {
        let mut skipped = CountSelector::<i64>::builder("a*b(c|d)+e")
            .summary_size(input.len() + 1)
            .time_window_size(42)
            .build()
            .unwrap();
        for (i, event) in input.iter().enumerate() {
            if i != k {
                skipped.process_event(*event);
            }
        }
        skipped.process_event(tail_event);

        let mut removed = CountSelector::<i64>::builder("a*b(c|d)+e")
            .summary_size(input.len() + 1)
            .time_window_size(42)
            .build()
            .unwrap();
        for event in &input {
            removed.process_event(*event);
        }
        removed.remove_event(k);
        removed.process_event(tail_event);

        assert_eq!(
            skipped.number_of_contained_complete_matches(),
            removed.number_of_contained_complete_matches(),
            "mismatch when deleting index {k}"
        );
    }
}
