//! # Example: order_created
//!
//! Wires three handlers to one typed event and shows the outcomes a producer sees.
//!
//! Shows how to:
//! - Bind a payload type to a tag with [`EventType`].
//! - Register typed and raw handlers.
//! - Publish fire-and-forget and wait-for-result.
//! - Observe handler failures through `tracing`.
//!
//! ## Flow
//! ```text
//! main ──► EventBus::builder(cfg).with_handler("order.created", audit).build()
//!      ├─► subscribe_typed(reserve-stock), subscribe_typed(charge-card)
//!      ├─► start()
//!      ├─► publish_and_wait(order #1)  → true   (all handlers succeed)
//!      ├─► publish_and_wait(order #2)  → false  (charge-card fails, logged)
//!      ├─► publish(order.shipped)      → accepted (no handlers)
//!      └─► shutdown()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example order_created
//! ```

use std::sync::Arc;
use std::time::Duration;

use eventvisor::{BusConfig, Event, EventBus, EventType, HandlerError, HandlerFn, HandlerRef};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct OrderCreated {
    order_id: u64,
    total_cents: u64,
}

impl EventType for OrderCreated {
    const TAG: &'static str = "order.created";
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = BusConfig {
        queue_capacity: 64,
        handler_timeout: Duration::from_secs(2),
        ..BusConfig::default()
    };

    let audit: HandlerRef = HandlerFn::arc("audit", |ev: Arc<Event>| async move {
        println!("[audit] {} id={} payload={:?}", ev.tag, ev.id, ev.payload);
        Ok::<_, HandlerError>(true)
    });

    let bus = EventBus::builder(cfg)
        .with_handler(OrderCreated::TAG, audit)
        .build()?;

    bus.subscribe_typed("reserve-stock", |o: OrderCreated| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        println!("[stock] reserved items for order {}", o.order_id);
        Ok::<_, HandlerError>(true)
    })?;
    bus.subscribe_typed("charge-card", |o: OrderCreated| async move {
        if o.total_cents > 50_000 {
            return Err(HandlerError::fail(format!(
                "card declined for {} cents",
                o.total_cents
            )));
        }
        println!("[payments] charged {} cents", o.total_cents);
        Ok(true)
    })?;

    bus.start()?;

    let ok = bus
        .publish_and_wait(Event::typed(&OrderCreated {
            order_id: 1,
            total_cents: 4_200,
        })?)
        .await?;
    println!("order #1 handled: {ok}");

    let ok = bus
        .publish_and_wait(Event::typed(&OrderCreated {
            order_id: 2,
            total_cents: 99_000,
        })?)
        .await?;
    println!("order #2 handled: {ok}");

    let id = bus
        .publish(Event::new("order.shipped").with_field("order_id", 1))
        .await?;
    println!("order.shipped accepted as {id}");

    bus.shutdown().await?;
    Ok(())
}
