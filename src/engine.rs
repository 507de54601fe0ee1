//! Single-writer matching engine.
//!
//! Any number of producers clone an [`EngineHandle`] and append orders to
//! an unbounded submission queue; one dedicated thread owns the
//! [`OrderBook`] and applies orders strictly in queue order. The book is
//! never reachable from producer contexts, so the matching code needs no
//! locking at all.
//!
//! Shutdown is cooperative: a shutdown request puts the loop into a
//! draining state that keeps consuming until the queue is empty, so no
//! order that made it into the queue is ever dropped.

use crate::book::{Fill, OrderBook};
use crate::protocol::Order;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace};

enum EngineCommand {
    Submit(Order),
    Shutdown,
}

/// Observer invoked after each order is applied. `seq` is the position of
/// the order in the global application sequence, starting at 1.
///
/// Matched quantity produces no notification to any counterparty in this
/// design; the sink exists so that decision stays explicit and callers who
/// do want the fills (tests, a future trade feed) can plug one in.
pub trait FillSink: Send {
    fn on_apply(&mut self, seq: u64, order: &Order, fills: &[Fill]);
}

/// Default sink: discards fills.
pub struct NullSink;

impl FillSink for NullSink {
    fn on_apply(&mut self, _seq: u64, _order: &Order, _fills: &[Fill]) {}
}

/// Returned by [`EngineHandle::submit`] once the engine has stopped and
/// the queue no longer accepts orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("engine stopped, submission queue closed")]
pub struct EngineClosed;

/// Cheaply clonable producer-side handle to the submission queue.
#[derive(Clone)]
pub struct EngineHandle {
    sender: UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Appends an order to the submission queue and wakes the engine.
    /// Never blocks; says nothing about the eventual match outcome.
    pub fn submit(&self, order: Order) -> Result<(), EngineClosed> {
        self.sender
            .send(EngineCommand::Submit(order))
            .map_err(|_| EngineClosed)
    }

    /// Asks the engine to drain the queue and stop. Idempotent and safe
    /// from any context.
    pub fn request_shutdown(&self) {
        let _ = self.sender.send(EngineCommand::Shutdown);
    }
}

/// The single writer: owns the book, consumes the queue.
pub struct Engine {
    book: OrderBook,
    receiver: UnboundedReceiver<EngineCommand>,
    sink: Box<dyn FillSink>,
    processed: u64,
    draining: bool,
}

impl Engine {
    pub fn new(book: OrderBook) -> (EngineHandle, Engine) {
        Engine::with_sink(book, Box::new(NullSink))
    }

    pub fn with_sink(book: OrderBook, sink: Box<dyn FillSink>) -> (EngineHandle, Engine) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            EngineHandle { sender },
            Engine {
                book,
                receiver,
                sink,
                processed: 0,
                draining: false,
            },
        )
    }

    /// Moves the engine onto its dedicated thread. The join handle yields
    /// the number of orders processed once the engine has stopped.
    pub fn spawn(self) -> std::io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("engine".to_string())
            .spawn(move || self.run())
    }

    /// The engine loop. Blocks while idle, applies one order at a time,
    /// and after a shutdown request keeps consuming until the queue is
    /// empty. Returns the processed-order count.
    pub fn run(mut self) -> u64 {
        info!("engine started");
        loop {
            let command = if self.draining {
                match self.receiver.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            } else {
                match self.receiver.blocking_recv() {
                    Some(command) => command,
                    // All handles dropped: nothing can ever arrive again.
                    None => break,
                }
            };

            match command {
                EngineCommand::Submit(order) => {
                    let fills = self.book.apply(order);
                    self.processed += 1;
                    trace!(
                        seq = self.processed,
                        side = %order.side,
                        price = order.price,
                        quantity = order.quantity,
                        fills = fills.len(),
                        "order applied"
                    );
                    self.sink.on_apply(self.processed, &order, &fills);
                }
                EngineCommand::Shutdown => {
                    debug!("shutdown requested, draining queue");
                    self.draining = true;
                }
            }
        }
        info!(processed = self.processed, book = %self.book, "engine stopped");
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Side;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink {
        log: Arc<Mutex<Vec<(u64, Order)>>>,
    }

    impl FillSink for RecordingSink {
        fn on_apply(&mut self, seq: u64, order: &Order, _fills: &[Fill]) {
            self.log.lock().unwrap().push((seq, *order));
        }
    }

    fn order(side: Side, price: u64, quantity: u64) -> Order {
        Order {
            side,
            price,
            quantity,
        }
    }

    #[test]
    fn test_single_producer_fifo_application() {
        let sink = RecordingSink::default();
        let (handle, engine) = Engine::with_sink(OrderBook::new(), Box::new(sink.clone()));

        let submitted: Vec<Order> = (1..=20)
            .map(|i| order(Side::Buy, 1_000_000 + i, i))
            .collect();
        for &o in &submitted {
            handle.submit(o).unwrap();
        }
        handle.request_shutdown();
        let processed = engine.run();

        assert_eq!(processed, submitted.len() as u64);
        let log = sink.log.lock().unwrap();
        let applied: Vec<Order> = log.iter().map(|&(_, o)| o).collect();
        assert_eq!(applied, submitted, "orders applied out of submission order");
        let seqs: Vec<u64> = log.iter().map(|&(seq, _)| seq).collect();
        assert_eq!(seqs, (1..=20).collect::<Vec<u64>>());
    }

    #[test]
    fn test_drain_on_shutdown_processes_everything_queued() {
        let (handle, engine) = Engine::new(OrderBook::new());

        // Shutdown is requested while 100 orders are still queued; all of
        // them must be applied before the engine stops.
        for i in 1..=100 {
            handle.submit(order(Side::Sell, 1_000_000 + i, 1)).unwrap();
        }
        handle.request_shutdown();

        assert_eq!(engine.run(), 100);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (handle, engine) = Engine::new(OrderBook::new());
        handle.submit(order(Side::Buy, 990_000, 5)).unwrap();
        handle.request_shutdown();
        handle.request_shutdown();
        handle.request_shutdown();
        assert_eq!(engine.run(), 1);
    }

    #[test]
    fn test_submit_after_stop_is_refused() {
        let (handle, engine) = Engine::new(OrderBook::new());
        handle.request_shutdown();
        engine.run();
        assert_eq!(
            handle.submit(order(Side::Buy, 990_000, 5)),
            Err(EngineClosed)
        );
    }

    #[test]
    fn test_concurrent_producers_fifo_per_producer() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 500;

        let sink = RecordingSink::default();
        let (handle, engine) = Engine::with_sink(OrderBook::new(), Box::new(sink.clone()));
        let engine_thread = engine.spawn().unwrap();

        // Each producer gets its own price; its sequence is encoded in the
        // quantity so interleavings remain checkable afterwards.
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for i in 1..=PER_PRODUCER {
                        handle.submit(order(Side::Buy, 1_000_000 + p, i)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        handle.request_shutdown();
        let processed = engine_thread.join().unwrap();
        assert_eq!(processed, PRODUCERS * PER_PRODUCER);

        let log = sink.log.lock().unwrap();
        // One total order across producers: seq stamps are dense and rising.
        for (i, &(seq, _)) in log.iter().enumerate() {
            assert_eq!(seq, i as u64 + 1);
        }
        // And each producer's own submissions appear in submission order.
        for p in 0..PRODUCERS {
            let quantities: Vec<u64> = log
                .iter()
                .filter(|(_, o)| o.price == 1_000_000 + p)
                .map(|(_, o)| o.quantity)
                .collect();
            assert_eq!(quantities, (1..=PER_PRODUCER).collect::<Vec<u64>>());
        }
    }
}
