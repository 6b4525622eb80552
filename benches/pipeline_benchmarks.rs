use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use weather_station::station::{aggregate::summarize, convert, numeric_fields, ReadingData};
use weather_station::{ReadingBroadcaster, SqliteStore, Store};

fn raw_reading(i: usize) -> ReadingData {
    let value = json!({
        "dateutc": 1_700_000_000_000u64 + i as u64 * 60_000,
        "date": "2023-11-14T22:13:20.000Z",
        "tz": "Europe/Berlin",
        "macAddress": "00:11:22:33:44:55",
        "tempf": 60.0 + (i % 20) as f64,
        "tempinf": 70.5,
        "humidity": 40 + (i % 30),
        "humidityin": 38,
        "baromrelin": 29.92,
        "baromabsin": 29.5,
        "windspeedmph": (i % 15) as f64 * 1.5,
        "windgustmph": 12.3,
        "winddir": 270,
        "hourlyrainin": 0.01,
        "dailyrainin": 0.12,
        "solarradiation": 512.4,
        "uv": 4,
        "feelsLike": 61.2,
        "dewPoint": 45.3,
        "battout": 1,
        "lastRain": "2023-11-14T18:00:00.000Z"
    });
    value.as_object().cloned().unwrap_or_default()
}

/// Benchmark converting one raw reading to metric units
fn bench_convert(c: &mut Criterion) {
    let raw = raw_reading(0);

    c.bench_function("convert_reading", |b| b.iter(|| convert(black_box(&raw))));

    let converted = convert(&raw);
    c.bench_function("numeric_fields", |b| {
        b.iter(|| numeric_fields(black_box(&converted)))
    });
}

/// Benchmark the per-period recompute over growing reading counts
fn bench_summarize(c: &mut Criterion) {
    for count in [60, 1_440, 10_080].iter() {
        let readings: Vec<ReadingData> = (0..*count).map(|i| convert(&raw_reading(i))).collect();

        c.bench_with_input(
            BenchmarkId::new("summarize_period", count),
            &readings,
            |b, readings| b.iter(|| summarize(black_box(readings))),
        );
    }
}

/// Benchmark storing a reading in an in-memory database
fn bench_store_insert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Should create tokio runtime");
    let store = SqliteStore::open_in_memory().expect("Should open in-memory store");
    let converted = convert(&raw_reading(0));

    c.bench_function("store_insert_reading", |b| {
        b.to_async(&rt).iter(|| async {
            store
                .insert_reading(chrono::Utc::now(), "00:11:22:33:44:55", &converted)
                .await
                .expect("Should insert reading")
        })
    });
}

/// Benchmark publishing to a growing number of subscribers
fn bench_publish(c: &mut Criterion) {
    let reading = Arc::new(convert(&raw_reading(0)));

    for subscribers in [1, 10, 100].iter() {
        c.bench_with_input(
            BenchmarkId::new("publish_reading", subscribers),
            subscribers,
            |b, &subscribers| {
                let broadcaster = ReadingBroadcaster::with_capacity(1);
                let _subs: Vec<_> = (0..subscribers).map(|_| broadcaster.subscribe()).collect();
                b.iter(|| broadcaster.publish(Arc::clone(&reading)))
            },
        );
    }
}

criterion_group!(
    benches,
    bench_convert,
    bench_summarize,
    bench_store_insert,
    bench_publish
);
criterion_main!(benches);
