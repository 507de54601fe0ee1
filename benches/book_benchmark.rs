use aggbook::book::OrderBook;
use aggbook::protocol::{Order, Side};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn matching_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("book matching");

    // Prefill a master book once; each iteration clones it, which is cheap
    // compared to rebuilding a thousand levels.
    let levels = 1_000u64;
    let mut master = OrderBook::new();
    for i in 0..levels {
        master.apply(Order {
            side: Side::Sell,
            price: 1_000_000 + i * 100,
            quantity: 10,
        });
    }

    group.bench_function("single fill against 1000-level book", |b| {
        b.iter_batched(
            || {
                (
                    master.clone(),
                    Order {
                        side: Side::Buy,
                        price: 1_000_000,
                        quantity: 10,
                    },
                )
            },
            |(mut book, order)| {
                book.apply(black_box(order));
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("sweep across 100 levels", |b| {
        b.iter_batched(
            || {
                (
                    master.clone(),
                    Order {
                        side: Side::Buy,
                        price: 1_000_000 + 99 * 100,
                        quantity: 10 * 100,
                    },
                )
            },
            |(mut book, order)| {
                book.apply(black_box(order));
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("resting insert into empty book", |b| {
        b.iter_batched(
            OrderBook::new,
            |mut book| {
                book.apply(black_box(Order {
                    side: Side::Buy,
                    price: 995_000,
                    quantity: 7,
                }));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, matching_benchmark);
criterion_main!(benches);
