use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

use eventvisor::{
    BusConfig, BusError, BusState, Event, EventBus, EventId, EventType, HandlerError, HandlerFn,
    HandlerRef, PublishError, ShutdownPolicy, SubscribeError,
};

const WITHIN: Duration = Duration::from_secs(2);

fn constant(value: bool) -> HandlerRef {
    HandlerFn::arc("constant", move |_ev: Arc<Event>| async move {
        Ok::<_, HandlerError>(value)
    })
}

fn forever() -> HandlerRef {
    HandlerFn::arc("forever", |_ev: Arc<Event>| async move {
        std::future::pending::<()>().await;
        Ok::<_, HandlerError>(true)
    })
}

fn gated(gate: Arc<Notify>) -> HandlerRef {
    HandlerFn::arc("gated", move |_ev: Arc<Event>| {
        let gate = Arc::clone(&gate);
        async move {
            gate.notified().await;
            Ok::<_, HandlerError>(true)
        }
    })
}

fn started(cfg: BusConfig) -> EventBus {
    let bus = EventBus::new(cfg);
    bus.start().unwrap();
    bus
}

#[tokio::test]
async fn all_true_handlers_aggregate_to_true() {
    let bus = started(BusConfig::default());
    bus.subscribe("X", constant(true)).unwrap();
    bus.subscribe("X", constant(true)).unwrap();

    assert_eq!(bus.publish_and_wait(Event::new("X")).await, Ok(true));
}

#[tokio::test]
async fn one_false_handler_makes_aggregate_false() {
    let bus = started(BusConfig::default());
    bus.subscribe("Y", constant(true)).unwrap();
    bus.subscribe("Y", constant(false)).unwrap();

    assert_eq!(bus.publish_and_wait(Event::new("Y")).await, Ok(false));
}

#[tokio::test]
async fn no_handlers_is_vacuous_success() {
    let bus = started(BusConfig::default());
    bus.subscribe("other", constant(false)).unwrap();

    let res = timeout(Duration::from_millis(500), bus.publish_and_wait(Event::new("Z"))).await;
    assert_eq!(res.expect("vacuous publish must not hang"), Ok(true));
}

#[tokio::test]
async fn full_queue_suspends_publisher_until_loop_drains() {
    let bus = EventBus::new(BusConfig {
        queue_capacity: 2,
        ..BusConfig::default()
    });

    bus.publish(Event::new("d")).await.unwrap();
    bus.publish(Event::new("d")).await.unwrap();
    assert_eq!(bus.queued(), 2);
    assert_eq!(bus.try_publish(Event::new("d")), Err(PublishError::Full));

    let producer = bus.clone();
    let third = tokio::spawn(async move { producer.publish(Event::new("d")).await });
    sleep(Duration::from_millis(50)).await;
    assert!(!third.is_finished(), "third publish should be blocked by backpressure");

    bus.start().unwrap();
    let id = timeout(WITHIN, third).await.unwrap().unwrap().unwrap();
    assert!(!id.is_nil());
}

#[tokio::test]
async fn panicking_handler_does_not_stop_siblings() {
    let bus = started(BusConfig::default());
    let sibling_done = Arc::new(AtomicBool::new(false));

    bus.subscribe_fn("p", "panics", |_ev: Arc<Event>| async move {
        if true {
            panic!("handler exploded");
        }
        Ok::<_, HandlerError>(true)
    })
    .unwrap();
    let done = Arc::clone(&sibling_done);
    bus.subscribe_fn("p", "sibling", move |_ev: Arc<Event>| {
        let done = Arc::clone(&done);
        async move {
            sleep(Duration::from_millis(30)).await;
            done.store(true, Ordering::SeqCst);
            Ok::<_, HandlerError>(true)
        }
    })
    .unwrap();

    assert_eq!(bus.publish_and_wait(Event::new("p")).await, Ok(false));
    assert!(sibling_done.load(Ordering::SeqCst));

    // the loop survives the panic
    bus.subscribe("after", constant(true)).unwrap();
    assert_eq!(bus.publish_and_wait(Event::new("after")).await, Ok(true));
}

#[tokio::test]
async fn handler_error_counts_as_false() {
    let bus = started(BusConfig::default());
    bus.subscribe_fn("e", "fails", |_ev: Arc<Event>| async move {
        Err::<bool, _>(HandlerError::fail("db unavailable"))
    })
    .unwrap();
    bus.subscribe("e", constant(true)).unwrap();

    assert_eq!(bus.publish_and_wait(Event::new("e")).await, Ok(false));
}

#[tokio::test]
async fn events_are_dispatched_in_enqueue_order() {
    let bus = EventBus::new(BusConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    bus.subscribe_fn("seq", "recorder", move |ev: Arc<Event>| {
        let log = Arc::clone(&log);
        async move {
            if let Some(n) = ev.field("n").and_then(|v| v.as_u64()) {
                log.lock().unwrap().push(n);
            }
            Ok::<_, HandlerError>(true)
        }
    })
    .unwrap();

    for n in 0..40u64 {
        bus.publish(Event::new("seq").with_field("n", n)).await.unwrap();
    }
    bus.start().unwrap();
    for n in 40..50u64 {
        bus.publish(Event::new("seq").with_field("n", n)).await.unwrap();
    }
    let last = Event::new("seq").with_field("n", 50u64);
    assert_eq!(bus.publish_and_wait(last).await, Ok(true));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, (0..=50).collect::<Vec<u64>>());
}

#[tokio::test]
async fn shutdown_aborts_in_flight_wait_and_closes_queue() {
    let bus = started(BusConfig {
        grace: Duration::from_millis(100),
        ..BusConfig::default()
    });
    bus.subscribe("slow", forever()).unwrap();

    let producer = bus.clone();
    let waiting = tokio::spawn(async move { producer.publish_and_wait(Event::new("slow")).await });
    sleep(Duration::from_millis(20)).await;
    assert_eq!(bus.state(), BusState::Dispatching);
    assert_eq!(bus.pending(), 1);

    let res = bus.shutdown().await;
    assert!(matches!(res, Err(BusError::GraceExceeded { pending: 1, .. })));

    let outcome = timeout(WITHIN, waiting).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(PublishError::Aborted { .. })));

    assert_eq!(bus.state(), BusState::Stopped);
    assert_eq!(bus.publish(Event::new("slow")).await, Err(PublishError::Closed));
    assert_eq!(bus.publish_and_wait(Event::new("x")).await, Err(PublishError::Closed));
    assert_eq!(bus.try_publish(Event::new("x")), Err(PublishError::Closed));
    assert_eq!(bus.shutdown().await, Ok(()));
}

#[tokio::test]
async fn shutdown_drains_queue_of_never_started_bus() {
    let bus = EventBus::new(BusConfig::default());
    bus.subscribe("x", constant(true)).unwrap();

    let producer = bus.clone();
    let waiting = tokio::spawn(async move { producer.publish_and_wait(Event::new("x")).await });
    sleep(Duration::from_millis(20)).await;
    assert_eq!(bus.queued(), 1);

    bus.shutdown().await.unwrap();
    assert_eq!(timeout(WITHIN, waiting).await.unwrap().unwrap(), Ok(true));
    assert_eq!(bus.state(), BusState::Stopped);
    assert_eq!(bus.start(), Err(BusError::Stopped));
}

#[tokio::test]
async fn discard_policy_aborts_queued_waiters() {
    let bus = EventBus::new(BusConfig {
        shutdown: ShutdownPolicy::Discard,
        ..BusConfig::default()
    });
    bus.subscribe("x", constant(true)).unwrap();

    let producer = bus.clone();
    let waiting = tokio::spawn(async move { producer.publish_and_wait(Event::new("x")).await });
    sleep(Duration::from_millis(20)).await;

    bus.shutdown().await.unwrap();
    let outcome = timeout(WITHIN, waiting).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(PublishError::Aborted { .. })));
    assert_eq!(bus.pending(), 0);
}

#[tokio::test]
async fn shutdown_releases_publisher_blocked_on_full_queue() {
    let bus = EventBus::new(BusConfig {
        queue_capacity: 1,
        ..BusConfig::default()
    });
    bus.publish(Event::new("x")).await.unwrap();

    let producer = bus.clone();
    let blocked = tokio::spawn(async move { producer.publish(Event::new("x")).await });
    sleep(Duration::from_millis(20)).await;
    assert!(!blocked.is_finished());

    bus.shutdown().await.unwrap();
    assert_eq!(
        timeout(WITHIN, blocked).await.unwrap().unwrap(),
        Err(PublishError::Closed)
    );
}

#[tokio::test]
async fn start_is_allowed_once() {
    let bus = started(BusConfig::default());
    assert_eq!(bus.start(), Err(BusError::AlreadyStarted));
    assert_eq!(bus.state(), BusState::Idle);
    bus.shutdown().await.unwrap();
}

#[tokio::test]
async fn handler_timeout_contributes_false() {
    let bus = started(BusConfig {
        handler_timeout: Duration::from_millis(20),
        ..BusConfig::default()
    });
    bus.subscribe("t", forever()).unwrap();
    bus.subscribe("t", constant(true)).unwrap();

    let res = timeout(WITHIN, bus.publish_and_wait(Event::new("t"))).await;
    assert_eq!(res.unwrap(), Ok(false));
}

#[derive(Serialize, Deserialize)]
struct OrderCreated {
    order_id: u64,
}

impl EventType for OrderCreated {
    const TAG: &'static str = "order.created";
}

#[tokio::test]
async fn typed_handlers_narrow_payloads() {
    let bus = started(BusConfig::default());
    bus.subscribe_typed("positive", |o: OrderCreated| async move {
        Ok::<_, HandlerError>(o.order_id > 0)
    })
    .unwrap();
    assert_eq!(bus.tags().len(), 1);
    assert_eq!(bus.handler_count(OrderCreated::TAG), 1);

    let good = Event::typed(&OrderCreated { order_id: 9 }).unwrap();
    assert_eq!(bus.publish_and_wait(good).await, Ok(true));

    let foreign = Event::new(OrderCreated::TAG).with_field("order_id", "nine");
    assert_eq!(bus.publish_and_wait(foreign).await, Ok(false));
}

#[tokio::test]
async fn duplicate_in_flight_id_is_rejected() {
    let bus = started(BusConfig::default());
    let gate = Arc::new(Notify::new());
    bus.subscribe("g", gated(Arc::clone(&gate))).unwrap();

    let id = EventId::new();
    let producer = bus.clone();
    let first =
        tokio::spawn(async move { producer.publish_and_wait(Event::new("g").with_id(id)).await });
    sleep(Duration::from_millis(20)).await;

    assert_eq!(
        bus.publish_and_wait(Event::new("g").with_id(id)).await,
        Err(PublishError::DuplicateId { id })
    );

    gate.notify_one();
    assert_eq!(timeout(WITHIN, first).await.unwrap().unwrap(), Ok(true));
}

#[tokio::test]
async fn concurrent_mode_does_not_serialize_events() {
    let bus = started(BusConfig {
        max_in_flight: 0,
        ..BusConfig::default()
    });
    let gate = Arc::new(Notify::new());
    bus.subscribe("slow", gated(Arc::clone(&gate))).unwrap();
    bus.subscribe("fast", constant(true)).unwrap();

    let producer = bus.clone();
    let slow = tokio::spawn(async move { producer.publish_and_wait(Event::new("slow")).await });
    sleep(Duration::from_millis(20)).await;

    let fast = timeout(WITHIN, bus.publish_and_wait(Event::new("fast"))).await;
    assert_eq!(fast.unwrap(), Ok(true));
    assert!(!slow.is_finished());

    gate.notify_one();
    assert_eq!(timeout(WITHIN, slow).await.unwrap().unwrap(), Ok(true));
}

#[tokio::test]
async fn subscribe_while_running_is_visible_to_later_events() {
    let bus = started(BusConfig::default());
    assert_eq!(bus.publish_and_wait(Event::new("late")).await, Ok(true));

    bus.subscribe("late", constant(false)).unwrap();
    assert_eq!(bus.publish_and_wait(Event::new("late")).await, Ok(false));
}

#[tokio::test]
async fn publish_validates_event() {
    let bus = EventBus::new(BusConfig::default());

    let id = bus
        .publish(Event::new("x").with_id(EventId::nil()))
        .await
        .unwrap();
    assert!(!id.is_nil());

    assert_eq!(bus.publish(Event::new("")).await, Err(PublishError::EmptyTag));
    assert_eq!(bus.subscribe("", constant(true)), Err(SubscribeError::EmptyTag));
}

#[tokio::test]
async fn builder_registers_handlers() {
    let bus = EventBus::builder(BusConfig::default())
        .with_handler("a", constant(true))
        .with_handlers([("a", constant(true)), ("b", constant(false))])
        .build()
        .unwrap();
    assert_eq!(bus.handler_count("a"), 2);
    assert_eq!(bus.handler_count("b"), 1);

    bus.start().unwrap();
    assert_eq!(bus.publish_and_wait(Event::new("a")).await, Ok(true));
    assert_eq!(bus.publish_and_wait(Event::new("b")).await, Ok(false));

    let bad = EventBus::builder(BusConfig::default())
        .with_handler("", constant(true))
        .build();
    assert!(matches!(bad, Err(SubscribeError::EmptyTag)));
}

fn echo_ok_field() -> HandlerRef {
    HandlerFn::arc("echo-ok", |ev: Arc<Event>| async move {
        Ok::<_, HandlerError>(ev.field("ok").and_then(|v| v.as_bool()).unwrap_or(false))
    })
}

#[tokio::test]
async fn fire_and_forget_event_cannot_answer_waiter_with_same_id() {
    let bus = EventBus::new(BusConfig::default());
    bus.subscribe("dup", echo_ok_field()).unwrap();

    let id = EventId::new();
    bus.publish(Event::new("dup").with_id(id).with_field("ok", false))
        .await
        .unwrap();

    let producer = bus.clone();
    let waiting = tokio::spawn(async move {
        producer
            .publish_and_wait(Event::new("dup").with_id(id).with_field("ok", true))
            .await
    });
    sleep(Duration::from_millis(20)).await;
    assert_eq!(bus.pending(), 1);

    bus.start().unwrap();
    assert_eq!(timeout(WITHIN, waiting).await.unwrap().unwrap(), Ok(true));
    assert_eq!(bus.pending(), 0);
}

#[tokio::test]
async fn bounded_concurrency_holds_back_extra_events() {
    let bus = started(BusConfig {
        max_in_flight: 2,
        ..BusConfig::default()
    });
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();

    let g = Arc::clone(&gate);
    bus.subscribe_fn("work", "gated-recorder", move |ev: Arc<Event>| {
        let gate = Arc::clone(&g);
        let started_tx = started_tx.clone();
        async move {
            let n = ev.field("n").and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
            let _ = started_tx.send(n);
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| HandlerError::fail(e.to_string()))?;
            Ok::<_, HandlerError>(true)
        }
    })
    .unwrap();

    for n in 0..3u64 {
        bus.publish(Event::new("work").with_field("n", n)).await.unwrap();
    }

    let mut first = vec![
        timeout(WITHIN, started_rx.recv()).await.unwrap().unwrap(),
        timeout(WITHIN, started_rx.recv()).await.unwrap().unwrap(),
    ];
    first.sort_unstable();
    assert_eq!(first, vec![0, 1]);
    assert_eq!(bus.state(), BusState::Dispatching);

    let third = timeout(Duration::from_millis(100), started_rx.recv()).await;
    assert!(third.is_err(), "third event must wait for a free dispatch slot");

    gate.add_permits(1);
    let third = timeout(WITHIN, started_rx.recv()).await.unwrap().unwrap();
    assert_eq!(third, 2);

    gate.add_permits(2);
    bus.shutdown().await.unwrap();
    assert_eq!(bus.queued(), 0);
}

#[tokio::test]
async fn state_stays_dispatching_while_any_event_runs() {
    let bus = started(BusConfig {
        max_in_flight: 0,
        ..BusConfig::default()
    });
    let slow_gate = Arc::new(Notify::new());
    let quick_gate = Arc::new(Notify::new());
    bus.subscribe("slow", gated(Arc::clone(&slow_gate))).unwrap();
    bus.subscribe("quick", gated(Arc::clone(&quick_gate))).unwrap();

    let producer = bus.clone();
    let slow = tokio::spawn(async move { producer.publish_and_wait(Event::new("slow")).await });
    let producer = bus.clone();
    let quick = tokio::spawn(async move { producer.publish_and_wait(Event::new("quick")).await });
    sleep(Duration::from_millis(20)).await;

    quick_gate.notify_one();
    assert_eq!(timeout(WITHIN, quick).await.unwrap().unwrap(), Ok(true));
    assert_eq!(bus.state(), BusState::Dispatching);

    slow_gate.notify_one();
    assert_eq!(timeout(WITHIN, slow).await.unwrap().unwrap(), Ok(true));
    sleep(Duration::from_millis(20)).await;
    assert_eq!(bus.state(), BusState::Idle);
}

#[tokio::test]
async fn concurrent_shutdown_calls_wait_for_drain() {
    let bus = started(BusConfig::default());
    let gate = Arc::new(Notify::new());
    bus.subscribe("g", gated(Arc::clone(&gate))).unwrap();
    bus.publish(Event::new("g")).await.unwrap();
    sleep(Duration::from_millis(20)).await;

    let first = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.shutdown().await })
    };
    sleep(Duration::from_millis(20)).await;
    let second = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.shutdown().await })
    };
    sleep(Duration::from_millis(50)).await;
    assert!(!second.is_finished(), "second shutdown returned before the drain finished");
    assert!(bus.is_closed());
    assert_ne!(bus.state(), BusState::Stopped);

    gate.notify_one();
    assert_eq!(timeout(WITHIN, second).await.unwrap().unwrap(), Ok(()));
    assert_eq!(timeout(WITHIN, first).await.unwrap().unwrap(), Ok(()));
    assert_eq!(bus.state(), BusState::Stopped);
}

#[tokio::test]
async fn dropping_last_handle_stops_started_loop() {
    let bus = started(BusConfig::default());
    let marker = Arc::new(());
    let alive = Arc::downgrade(&marker);
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

    bus.subscribe_fn("drop", "holds-marker", move |ev: Arc<Event>| {
        let _marker = Arc::clone(&marker);
        let seen_tx = seen_tx.clone();
        async move {
            let _ = seen_tx.send(ev.id);
            Ok::<_, HandlerError>(true)
        }
    })
    .unwrap();

    let id = bus.publish(Event::new("drop")).await.unwrap();
    drop(bus);

    assert_eq!(timeout(WITHIN, seen_rx.recv()).await.unwrap(), Some(id));
    timeout(WITHIN, async {
        while alive.strong_count() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("dispatch loop should release the bus once every handle is gone");
}
