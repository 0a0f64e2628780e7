use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, NaiveDate};
use pricebook_products::{
    reconcile, select_overlapping, weighted_average, DateRange, Price, PriceInterval,
    PriceIntervalId, ProductId,
};
use rust_decimal::Decimal;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

/// `count` back-to-back weekly intervals starting at `base()`.
fn weekly_history(product: ProductId, count: i64) -> Vec<PriceInterval> {
    (0..count)
        .map(|week| {
            let start = base() + Duration::days(week * 7);
            let range = DateRange::new(start, start + Duration::days(6)).unwrap();
            PriceInterval::new(
                PriceIntervalId::new(),
                product,
                range,
                Price::new(Decimal::from(week % 97)).unwrap(),
            )
        })
        .collect()
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for count in [10i64, 100, 1_000] {
        let product = ProductId::new();
        let history = weekly_history(product, count);
        // New interval spanning the middle half of the history.
        let new_range = DateRange::new(
            base() + Duration::days(count * 7 / 4 + 3),
            base() + Duration::days(count * 7 * 3 / 4 + 3),
        )
        .unwrap();
        let candidates = select_overlapping(&history, product, &new_range);

        group.throughput(Throughput::Elements(candidates.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &candidates, |b, candidates| {
            b.iter(|| reconcile(black_box(&new_range), black_box(candidates)));
        });
    }

    group.finish();
}

fn bench_weighted_average(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_average");

    for count in [10i64, 100, 1_000] {
        let product = ProductId::new();
        let history = weekly_history(product, count);
        let query = DateRange::new(base(), base() + Duration::days(count * 7)).unwrap();

        group.throughput(Throughput::Elements(history.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &history, |b, history| {
            b.iter(|| weighted_average(black_box(&query), black_box(history)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconcile, bench_weighted_average);
criterion_main!(benches);
