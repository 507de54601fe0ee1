//! Throughput self-test: hammers a running server with random orders over
//! the text protocol from several concurrent clients, then prints totals,
//! orders/sec, and mean ack latency.

use aggbook::protocol::{format_price, Side, ACK_LINE};
use futures::{SinkExt, StreamExt};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

const TEST_DURATION: Duration = Duration::from_secs(10);
const SERVER_ADDR: &str = "127.0.0.1:54000";

#[derive(Default)]
struct Stats {
    acked: AtomicU64,
    rejected: AtomicU64,
    latency_ns: AtomicU64,
}

#[tokio::main]
async fn main() {
    let num_clients = num_cpus::get();
    println!("starting throughput test");
    println!("clients: {num_clients}");
    println!("duration: {TEST_DURATION:?}");
    println!("server: {SERVER_ADDR}");

    let stats = Arc::new(Stats::default());

    for client_id in 0..num_clients {
        let stats = stats.clone();
        tokio::spawn(async move {
            run_client(client_id, stats).await;
        });
    }

    tokio::time::sleep(TEST_DURATION).await;

    let acked = stats.acked.load(Ordering::Relaxed);
    let rejected = stats.rejected.load(Ordering::Relaxed);
    let total = acked + rejected;
    let throughput = total as f64 / TEST_DURATION.as_secs_f64();
    let mean_latency_us = if total > 0 {
        stats.latency_ns.load(Ordering::Relaxed) as f64 / total as f64 / 1_000.0
    } else {
        0.0
    };

    println!("\n--- results ---");
    println!("orders sent:      {total}");
    println!("acked:            {acked}");
    println!("rejected:         {rejected}");
    println!("throughput:       {throughput:.2} orders/sec");
    println!("mean ack latency: {mean_latency_us:.2} µs");

    std::process::exit(0);
}

async fn run_client(client_id: usize, stats: Arc<Stats>) {
    let stream = match TcpStream::connect(SERVER_ADDR).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("[client {client_id}] connect failed: {e}");
            return;
        }
    };
    let mut framed = Framed::new(stream, LinesCodec::new());

    loop {
        let line = {
            let mut rng = rand::thread_rng();
            let side = if rng.gen::<bool>() {
                Side::Buy
            } else {
                Side::Sell
            };
            // Prices around a 100.0 midpoint, quantities 1-100.
            let price_ticks = rng.gen_range(990_000..=1_010_000);
            let quantity = rng.gen_range(1..=100u64);
            format!("{side} {} {quantity}", format_price(price_ticks))
        };

        let sent_at = Instant::now();
        if framed.send(line).await.is_err() {
            break;
        }
        match framed.next().await {
            Some(Ok(reply)) => {
                stats
                    .latency_ns
                    .fetch_add(sent_at.elapsed().as_nanos() as u64, Ordering::Relaxed);
                if reply == ACK_LINE {
                    stats.acked.fetch_add(1, Ordering::Relaxed);
                } else {
                    stats.rejected.fetch_add(1, Ordering::Relaxed);
                }
            }
            _ => break,
        }
    }
}
