use crate::unit_tests::Recorder;
use crate::{AsyncError, Completion, Status, Stream, StreamError};

#[test]
fn test_buffered_items_flush_in_order() {
    let (port, stream) = Stream::<i32>::port();
    port.emit(1);
    port.emit(2);
    port.emit(3);

    let seen = Recorder::new();
    let sink = seen.clone();
    stream
        .listen(move |item, index| sink.push((*item, index)))
        .unwrap();

    assert_eq!(seen.events(), vec![(1, 0), (2, 1), (3, 2)]);
}

#[test]
fn test_emits_after_flush_deliver_immediately() {
    let (port, stream) = Stream::<i32>::port();
    port.emit(1);

    let seen = Recorder::new();
    let sink = seen.clone();
    stream.listen(move |item, index| sink.push((*item, index))).unwrap();
    assert_eq!(seen.len(), 1);

    port.emit(2);
    assert_eq!(seen.events(), vec![(1, 0), (2, 1)]);
}

#[test]
fn test_second_listen_fails() {
    let (port, stream) = Stream::<i32>::port();
    port.emit(1);

    let seen = Recorder::new();
    let first = seen.clone();
    let second = seen.clone();
    assert!(stream.listen(move |item, _| first.push(*item)).is_ok());
    assert_eq!(
        stream.listen(move |item, _| second.push(*item)),
        Err(StreamError::AlreadyListened)
    );

    port.emit(2);
    assert_eq!(seen.events(), vec![1, 2]);
}

#[test]
fn test_on_next_before_listen_waits_for_flush() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();
    let sink = seen.clone();
    stream.on_next(move |item, _| sink.push(*item));

    port.emit(1);
    assert!(seen.events().is_empty());

    stream.listen(|_, _| {}).unwrap();
    assert_eq!(seen.events(), vec![1]);
}

#[test]
fn test_fan_out_after_flush() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();

    let first = seen.clone();
    stream.listen(move |item, _| first.push(format!("first:{}", item))).unwrap();
    let second = seen.clone();
    stream.on_next(move |item, _| second.push(format!("second:{}", item)));

    port.emit(5);

    assert_eq!(seen.events(), vec!["first:5", "second:5"]);
}

#[test]
fn test_emit_from_observer_keeps_order() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();

    let sink = seen.clone();
    let producer = port.clone();
    stream
        .listen(move |item, index| {
            sink.push((*item, index));
            if *item == 1 {
                producer.emit(10);
            }
        })
        .unwrap();
    port.emit(1);
    port.emit(2);

    assert_eq!(seen.events(), vec![(1, 0), (10, 1), (2, 2)]);
}

#[test]
fn test_reentrant_emit_before_complete_is_delivered() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();
    let ended = Recorder::new();

    let sink = seen.clone();
    let producer = port.clone();
    stream
        .listen(move |item, index| {
            sink.push((*item, index));
            if *item == 1 {
                producer.emit(10);
                producer.complete();
                producer.emit(11);
            }
        })
        .unwrap();
    let end = ended.clone();
    stream.on_completed(move || end.push("completed"));

    port.emit(1);

    assert_eq!(seen.events(), vec![(1, 0), (10, 1)]);
    assert_eq!(ended.events(), vec!["completed"]);
    assert_eq!(stream.status(), Status::Resolved);
}

#[test]
fn test_reentrant_emit_before_throw_and_cancel_is_delivered() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();
    let sink = seen.clone();
    let producer = port.clone();
    stream
        .listen(move |item, _| {
            sink.push(*item);
            if *item == 1 {
                producer.emit(2);
                producer.throw(AsyncError::error("broken"));
                producer.complete();
            }
        })
        .unwrap();
    port.emit(1);
    assert_eq!(seen.events(), vec![1, 2]);
    assert_eq!(stream.status(), Status::Rejected);

    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();
    let sink = seen.clone();
    let producer = port.clone();
    let consumer = stream.clone();
    stream
        .listen(move |item, _| {
            sink.push(*item);
            if *item == 1 {
                producer.emit(2);
                consumer.cancel();
            }
        })
        .unwrap();
    port.emit(1);
    assert_eq!(seen.events(), vec![1, 2]);
    assert!(port.is_cancelled());
}

#[test]
fn test_status_transitions() {
    let (port, stream) = Stream::<i32>::port();
    assert_eq!(stream.status(), Status::Pending);

    port.emit(1);
    assert_eq!(stream.status(), Status::Emitting);

    port.complete();
    assert_eq!(stream.status(), Status::Resolved);
    assert_eq!(port.status(), Status::Resolved);
}

#[test]
fn test_emit_after_terminal_is_noop() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();
    let sink = seen.clone();
    stream.listen(move |item, _| sink.push(*item)).unwrap();

    port.complete();
    port.emit(1);
    port.throw(AsyncError::error("late"));

    assert!(seen.events().is_empty());
    assert_eq!(stream.status(), Status::Resolved);
}

#[test]
fn test_terminal_drops_unflushed_buffer() {
    let (port, stream) = Stream::<i32>::port();
    port.emit(1);
    port.complete();

    let seen = Recorder::new();
    let sink = seen.clone();
    assert!(stream.listen(move |item, _| sink.push(*item)).is_ok());

    assert!(seen.events().is_empty());
}

#[test]
fn test_terminal_observers_fire_once_then_end() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();

    let end = seen.clone();
    let completed = seen.clone();
    let cancelled = seen.clone();
    stream
        .on_end(move || end.push("end"))
        .on_completed(move || completed.push("completed"))
        .on_cancel(move || cancelled.push("cancel"));

    port.complete();
    port.complete();
    stream.cancel();

    assert_eq!(seen.events(), vec!["completed", "end"]);
}

#[test]
fn test_late_error_observer_replays() {
    let (port, stream) = Stream::<i32>::port();
    port.throw(AsyncError::error("broken"));

    let seen = Recorder::new();
    let sink = seen.clone();
    stream.on_error(move |error| sink.push(error.clone()));
    let end = seen.clone();
    stream.on_end(move || end.push(AsyncError::error("end")));

    assert_eq!(
        seen.events(),
        vec![AsyncError::error("broken"), AsyncError::error("end")]
    );
}

#[test]
fn test_cancel_reaches_producer() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();
    let hook = seen.clone();
    port.oncancel(move || hook.push("stop producing"));

    stream.cancel();

    assert!(port.is_cancelled());
    assert_eq!(seen.events(), vec!["stop producing"]);
}

#[test]
fn test_map_transforms_with_own_index() {
    let (port, stream) = Stream::<i32>::port();
    port.emit(1);
    port.emit(2);

    let mapped = stream.map(|item, index| Ok(format!("{}@{}", item, index)));
    let seen = Recorder::new();
    let sink = seen.clone();
    mapped.listen(move |item, _| sink.push(item.clone())).unwrap();
    port.emit(3);

    assert!(stream.is_listened());
    assert_eq!(seen.events(), vec!["1@0", "2@1", "3@2"]);
}

#[test]
fn test_map_drops_failed_items_only() {
    let (port, stream) = Stream::<i32>::port();
    let errors = Recorder::new();
    let error_sink = errors.clone();
    let mapped = stream.map_with(
        |item, _| {
            if *item % 2 == 0 {
                Err(AsyncError::error(format!("even {}", item)))
            } else {
                Ok(*item)
            }
        },
        move |error| error_sink.push(error),
        true,
    );
    let seen = Recorder::new();
    let sink = seen.clone();
    mapped.listen(move |item, _| sink.push(*item)).unwrap();

    for item in 1..=5 {
        port.emit(item);
    }
    port.complete();

    assert_eq!(seen.events(), vec![1, 3, 5]);
    assert_eq!(
        errors.events(),
        vec![AsyncError::error("even 2"), AsyncError::error("even 4")]
    );
    assert_eq!(mapped.status(), Status::Resolved);
}

#[test]
fn test_map_propagates_failure_and_cancel() {
    let (port, stream) = Stream::<i32>::port();
    let mapped = stream.map(|item, _| Ok(*item));
    port.throw(AsyncError::error("source failed"));
    assert_eq!(mapped.status(), Status::Rejected);

    let (_port, stream) = Stream::<i32>::port();
    let mapped = stream.map(|item, _| Ok(*item));
    stream.cancel();
    assert_eq!(mapped.status(), Status::Cancelled);
}

#[test]
fn test_map_bind_cancel() {
    let (_port, stream) = Stream::<i32>::port();
    let mapped = stream.map(|item, _| Ok(*item));
    mapped.cancel();
    assert_eq!(stream.status(), Status::Cancelled);

    let (_port, stream) = Stream::<i32>::port();
    let mapped = stream.map_with(|item, _| Ok(*item), |_| {}, false);
    mapped.cancel();
    assert_eq!(stream.status(), Status::Pending);
}

#[test]
fn test_map_after_listen_attaches_as_observer() {
    let (port, stream) = Stream::<i32>::port();
    port.emit(1);
    stream.listen(|_, _| {}).unwrap();

    let mapped = stream.map(|item, index| Ok((*item, index)));
    let seen = Recorder::new();
    let sink = seen.clone();
    mapped.listen(move |item, _| sink.push(*item)).unwrap();
    port.emit(2);

    assert_eq!(seen.events(), vec![(2, 0)]);
}

#[test]
fn test_panicking_item_observer_is_isolated() {
    let (port, stream) = Stream::<i32>::port();
    let seen = Recorder::new();
    stream.listen(|_, _| panic!("observer failure")).unwrap();
    let sink = seen.clone();
    stream.on_next(move |item, _| sink.push(*item));

    port.emit(1);
    port.emit(2);

    assert_eq!(seen.events(), vec![1, 2]);
}

#[test]
fn test_collect_gathers_items() {
    let (port, stream) = Stream::<i32>::port();
    port.emit(1);
    let collected = stream.collect().unwrap();
    port.emit(2);
    assert_eq!(collected.status(), Status::Pending);

    port.complete();

    assert_eq!(collected.completion(), Some(Completion::Resolved(vec![1, 2])));
    assert!(stream.collect().is_err());
}

#[test]
fn test_collect_follows_failure_and_cancel() {
    let (port, stream) = Stream::<i32>::port();
    let collected = stream.collect().unwrap();
    port.throw(AsyncError::error("broken"));
    assert_eq!(
        collected.completion(),
        Some(Completion::Rejected(AsyncError::error("broken")))
    );

    let (_port, stream) = Stream::<i32>::port();
    let collected = stream.collect().unwrap();
    collected.cancel();
    assert_eq!(stream.status(), Status::Cancelled);
}
