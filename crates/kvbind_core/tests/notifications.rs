//! Change notification tests.

mod common;

use common::Recorder;
use kvbind_core::{BindOptions, ChangeEvent, ChangeType, Codec, Observable, Value};
use kvbind_testkit::TestContext;

#[test]
fn listeners_run_in_registration_order() {
    let t = TestContext::memory();
    let order = Recorder::new();
    let (a, b) = (order.clone(), order.clone());
    let _first = t.on_change("k", move |_| a.push("first"));
    let _second = t.on_change("k", move |_| b.push("second"));

    t.set_value("k", Value::Integer(1)).unwrap();
    assert_eq!(order.take(), vec!["first", "second"]);
}

#[test]
fn events_describe_the_change() {
    let t = TestContext::memory();
    let events = Recorder::new();
    let e = events.clone();
    let _sub = t.on_change("k", move |event: &ChangeEvent| e.push(event.clone()));

    t.set_value("k", Value::Integer(1)).unwrap();
    t.set_value("k", Value::Integer(2)).unwrap();
    t.remove("k").unwrap();

    let events = events.take();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].change_type, ChangeType::Write);
    assert_eq!(events[1].old_value, Some(Value::Integer(1)));
    assert_eq!(events[1].new_value, Some(Value::Integer(2)));
    assert_eq!(events[2].change_type, ChangeType::Remove);
    assert_eq!(events[2].new_value, None);
}

#[test]
fn observable_writes_are_published() {
    let t = TestContext::memory();
    let counter = Observable::new(0i64);
    t.bind("counter", &counter, Codec::storable(), BindOptions::new())
        .unwrap();
    let seen = Recorder::new();
    let s = seen.clone();
    let _sub = t.on_change("counter", move |event: &ChangeEvent| {
        s.push(event.new_value.clone())
    });

    counter.set(1);
    counter.set(1);
    counter.set(2);
    assert_eq!(
        seen.take(),
        vec![Some(Value::Integer(1)), Some(Value::Integer(2))]
    );
}

#[test]
fn unsubscribed_listeners_are_removed() {
    let t = TestContext::memory();
    let hits = Recorder::new();
    let h = hits.clone();
    let sub = t.on_change("k", move |_| h.push(()));
    assert_eq!(t.listener_count("k"), 1);

    sub.unsubscribe();
    assert_eq!(t.listener_count("k"), 0);
    t.set_value("k", Value::Null).unwrap();
    assert_eq!(hits.len(), 0);
}

#[test]
fn batch_collapses_into_one_notification() {
    let t = TestContext::memory();
    let events = Recorder::new();
    let e = events.clone();
    let _k = t.on_change("k", move |event: &ChangeEvent| e.push(event.clone()));
    let other = Recorder::new();
    let o = other.clone();
    let _other = t.on_change("other", move |_| o.push(()));

    let written = t
        .without_notifications(&["k"], |ctx| {
            for i in 1..=5 {
                ctx.set_value("k", Value::Integer(i)).unwrap();
                ctx.set_value("other", Value::Integer(i)).unwrap();
            }
            5
        })
        .unwrap();

    assert_eq!(written, 5);
    let events = events.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].change_type, ChangeType::Batch);
    assert_eq!(events[0].old_value, None);
    assert_eq!(events[0].new_value, Some(Value::Integer(5)));
    assert_eq!(other.len(), 0);
    assert_eq!(t.writes(), 10);
}

#[test]
fn batch_that_restores_the_value_still_notifies_once() {
    let t = TestContext::memory();
    t.set_value("k", Value::from("start")).unwrap();
    let events = Recorder::new();
    let e = events.clone();
    let _sub = t.on_change("k", move |event: &ChangeEvent| e.push(event.clone()));

    t.without_notifications(&["k"], |ctx| {
        for v in ["one", "two", "three", "start"] {
            ctx.set_value("k", Value::from(v)).unwrap();
        }
    })
    .unwrap();
    let batch = events.take();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].change_type, ChangeType::Batch);
    assert_eq!(batch[0].old_value, Some(Value::from("start")));
    assert_eq!(batch[0].new_value, Some(Value::from("start")));

    t.set_value("k", Value::from("after")).unwrap();
    assert_eq!(events.len(), 1);
}

#[test]
fn clear_all_notifies_watched_keys() {
    let t = TestContext::memory();
    t.set_value("a", Value::Integer(1)).unwrap();
    t.set_value("b", Value::Integer(2)).unwrap();
    let removed = Recorder::new();
    let r = removed.clone();
    let _sub = t.on_change("b", move |event: &ChangeEvent| {
        r.push((event.change_type, event.old_value.clone()))
    });

    t.clear_all().unwrap();
    assert_eq!(
        removed.take(),
        vec![(ChangeType::Remove, Some(Value::Integer(2)))]
    );
    assert!(t.keys().unwrap().is_empty());
}
