//! Order/payment correlation pipeline
//!
//! Orders arrive from an in-memory batch, payments from a channel fed by a
//! producer thread. Both are keyed by order id and joined; matched rows
//! are folded into a running revenue total.
//!
//! Usage: RUST_LOG=stream_relay=debug cargo run --example join_orders

use std::thread;
use stream_relay::{
    join, ChannelSource, IterableSource, Joined, Pipeline, PipelineError, Result as PipelineResult,
    Source,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parse "id,item,cents" order lines
fn parse_order(line: &str) -> PipelineResult<(u32, Row)> {
    let mut fields = line.split(',');
    let id = fields
        .next()
        .ok_or_else(|| PipelineError::StageError(format!("empty order line: {line:?}")))?
        .trim()
        .parse::<u32>()
        .map_err(PipelineError::transform)?;
    let item = fields.next().unwrap_or("unknown").trim().to_string();
    let cents = fields
        .next()
        .unwrap_or("0")
        .trim()
        .parse::<u64>()
        .map_err(PipelineError::transform)?;
    Ok((id, Row::Order { item, cents }))
}

#[derive(Debug, Clone)]
enum Row {
    Order { item: String, cents: u64 },
    Payment { method: String },
}

fn main() -> PipelineResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let orders = Pipeline::<&'static str>::with_id("orders").try_map(parse_order);
    let payments = Pipeline::<(u32, String)>::with_id("payments")
        .map(|(id, method)| (id, Row::Payment { method }));

    let Joined {
        target,
        left: orders,
        right: payments,
    } = join(orders, payments, 128)?;
    let revenue = target
        .map(|(id, rows)| match rows {
            (Row::Order { item, cents }, Row::Payment { method }) => {
                info!(order = id, %item, %method, cents, "order settled");
                cents
            }
            _ => 0,
        })
        .reduce(|total: &u64, cents| total + cents, 0)
        .map(|total| info!(total_cents = total, "running revenue"));

    let mut order_feed = IterableSource::new(
        "order-batch",
        vec!["1, lamp, 1999", "2, desk, 12500", "3, chair, 4999"],
    );
    order_feed.attach(orders);
    order_feed.start()?;

    let (publisher, mut payment_feed) = ChannelSource::bounded("payments-topic", 16);
    payment_feed.attach(payments);
    let producer = thread::spawn(move || {
        for (id, method) in [(2, "card"), (9, "cash"), (1, "transfer")] {
            if publisher.send((id, method.to_string())).is_err() {
                break;
            }
        }
    });
    payment_feed.start()?;
    let _ = producer.join();

    println!("{}", revenue.metrics_summary());
    Ok(())
}
