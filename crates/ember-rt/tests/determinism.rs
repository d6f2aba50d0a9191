// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cross-module determinism scenarios (S1-S6 from the design document).
//!
//! These exercise the scheduler, channel, and select together the way a
//! unit test colocated in one module can't — each scenario spawns several
//! tasks and asserts on the resulting trace, not on one primitive in
//! isolation.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use ember_rt::select::{select, SelectCase};
use ember_rt::{channel, scheduler, Priority, Scheduler};

fn hash_of(items: &[String]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for item in items {
        item.hash(&mut hasher);
    }
    hasher.finish()
}

/// S1: buffered pipeline. Capacity 5; one producer sends 1..5 then
/// closes; one consumer iterates. Run repeatedly and check the hash of
/// the output stays the same every time.
#[test]
fn s1_buffered_pipeline_is_hash_stable() {
    fn run_once() -> Vec<String> {
        let sched = Scheduler::new();
        let trace = Rc::new(RefCell::new(Vec::new()));
        let ch = channel::<i32>(5);

        let producer_ch = ch.clone();
        sched.spawn(
            async move {
                for v in 1..=5 {
                    producer_ch.send(v).await.unwrap();
                }
                producer_ch.close();
            },
            Priority::Normal,
        );

        let consumer_trace = trace.clone();
        let consumer_ch = ch.clone();
        sched.spawn(
            async move {
                let mut iter = consumer_ch.iter();
                while let Some(v) = iter.next().await {
                    consumer_trace.borrow_mut().push(format!("recv-{v}"));
                }
            },
            Priority::Normal,
        );

        sched.run().unwrap();
        Rc::try_unwrap(trace).unwrap().into_inner()
    }

    let first = run_once();
    assert_eq!(
        first,
        vec!["recv-1", "recv-2", "recv-3", "recv-4", "recv-5"]
    );
    let first_hash = hash_of(&first);
    for _ in 0..100 {
        assert_eq!(hash_of(&run_once()), first_hash);
    }
}

/// S2: three tasks each send a distinct string on its own capacity-1
/// channel after sleeping 5/10/15 ticks; a consumer performs three
/// sequential 3-way selects and must observe them in wake order.
#[test]
fn s2_unbuffered_sleeps_resolve_selects_in_wake_order() {
    let sched = Scheduler::new();
    let trace = Rc::new(RefCell::new(Vec::new()));

    let ch1 = channel::<&'static str>(1);
    let ch2 = channel::<&'static str>(1);
    let ch3 = channel::<&'static str>(1);

    for (ch, ticks, label) in [
        (ch1.clone(), 5u64, "ch1"),
        (ch2.clone(), 10u64, "ch2"),
        (ch3.clone(), 15u64, "ch3"),
    ] {
        sched.spawn(
            async move {
                scheduler::sleep(ticks).await.unwrap();
                ch.send(label).await.unwrap();
            },
            Priority::Normal,
        );
    }

    let consumer_trace = trace.clone();
    sched.spawn(
        async move {
            for round in 1..=3 {
                let outcome = select(vec![
                    SelectCase::Recv(&ch1),
                    SelectCase::Recv(&ch2),
                    SelectCase::Recv(&ch3),
                ])
                .unwrap()
                .await;
                let from = outcome.value.unwrap_or("?");
                consumer_trace.borrow_mut().push(format!(
                    "select{round}-case{}-from-{from}",
                    outcome.case_index.unwrap()
                ));
            }
        },
        Priority::Normal,
    );

    sched.run().unwrap();
    assert_eq!(
        *trace.borrow(),
        vec![
            "select1-case0-from-ch1",
            "select2-case1-from-ch2",
            "select3-case2-from-ch3",
        ]
    );
}

/// S5: one to five receivers block on an unbuffered channel; a closer
/// closes after a few ticks; every receiver must observe `(None, false)`.
#[test]
fn s5_close_wakes_every_blocked_receiver() {
    for n in 1..=5 {
        let sched = Scheduler::new();
        let ch: ember_rt::Channel<i32> = channel(0);
        let results = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..n {
            let ch = ch.clone();
            let results = results.clone();
            sched.spawn(
                async move {
                    let outcome = ch.recv().await;
                    results.borrow_mut().push(outcome);
                },
                Priority::Normal,
            );
        }

        let closer_ch = ch.clone();
        sched.spawn(
            async move {
                scheduler::sleep(5).await.unwrap();
                closer_ch.close();
            },
            Priority::Normal,
        );

        sched.run().unwrap();
        let results = results.borrow();
        assert_eq!(results.len(), n);
        assert!(results.iter().all(|(v, ok)| v.is_none() && !ok));
    }
}

/// S6: a Low-priority task and a High-priority task are spawned with no
/// intervening suspension; the high-priority one must run first.
#[test]
fn s6_high_priority_runs_before_low_with_no_suspension() {
    let sched = Scheduler::new();
    let trace = Rc::new(RefCell::new(Vec::new()));

    let low_trace = trace.clone();
    sched.spawn(
        async move {
            low_trace.borrow_mut().push("L");
        },
        Priority::Low,
    );
    let high_trace = trace.clone();
    sched.spawn(
        async move {
            high_trace.borrow_mut().push("H");
        },
        Priority::High,
    );

    sched.run().unwrap();
    assert_eq!(*trace.borrow(), vec!["H", "L"]);
}

/// S3: FIFO fuzz. For a random capacity and a random value sequence, a
/// producer sends every value in order and closes; a consumer drains via
/// `iter()` and must see exactly that sequence back.
fn fifo_fuzz_case(capacity: usize, values: Vec<i32>) {
    let sched = Scheduler::new();
    let ch = channel::<i32>(capacity);
    let received = Rc::new(RefCell::new(Vec::new()));

    let producer_ch = ch.clone();
    let producer_values = values.clone();
    sched.spawn(
        async move {
            for v in producer_values {
                producer_ch.send(v).await.unwrap();
            }
            producer_ch.close();
        },
        Priority::Normal,
    );

    let consumer_received = received.clone();
    sched.spawn(
        async move {
            let mut iter = ch.iter();
            while let Some(v) = iter.next().await {
                consumer_received.borrow_mut().push(v);
            }
        },
        Priority::Normal,
    );

    sched.run().unwrap();
    assert_eq!(*received.borrow(), values);
}

proptest! {
    #[test]
    fn s3_fifo_fuzz(capacity in 0usize..5, values in proptest::collection::vec(any::<i32>(), 1..50)) {
        fifo_fuzz_case(capacity, values);
    }
}

/// S4: select determinism. For a fixed seed generating delays and
/// values across three channels, running the same program twice must
/// produce the identical sequence of `(case_index, value)` pairs.
#[test]
fn s4_select_sequence_is_deterministic_across_runs() {
    fn run_once(seed: u64) -> Vec<(usize, i32)> {
        // Same seed must reproduce the same delays/values every call —
        // the scheduler run that follows is what's actually under test.
        let mut rng = StdRng::seed_from_u64(seed);
        let delays: Vec<u64> = (0..3).map(|_| rng.gen_range(1..=20)).collect();
        let values: Vec<i32> = (0..3).map(|_| rng.gen_range(0..1000)).collect();

        let sched = Scheduler::new();
        let chans: Vec<_> = (0..3).map(|_| channel::<i32>(1)).collect();
        let trace = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let ch = chans[i].clone();
            let delay = delays[i];
            let value = values[i];
            sched.spawn(
                async move {
                    scheduler::sleep(delay).await.unwrap();
                    ch.send(value).await.unwrap();
                },
                Priority::Normal,
            );
        }

        let consumer_trace = trace.clone();
        let c0 = chans[0].clone();
        let c1 = chans[1].clone();
        let c2 = chans[2].clone();
        sched.spawn(
            async move {
                for _ in 0..3 {
                    let outcome = select(vec![
                        SelectCase::Recv(&c0),
                        SelectCase::Recv(&c1),
                        SelectCase::Recv(&c2),
                    ])
                    .unwrap()
                    .await;
                    consumer_trace
                        .borrow_mut()
                        .push((outcome.case_index.unwrap(), outcome.value.unwrap_or(-1)));
                }
            },
            Priority::Normal,
        );

        sched.run().unwrap();
        Rc::try_unwrap(trace).unwrap().into_inner()
    }

    let seed = 0xC0FFEE_u64;
    let first = run_once(seed);
    let second = run_once(seed);
    assert_eq!(first, second);
}
