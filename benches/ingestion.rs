use affluence_import::ingestion::{ImportOptions, ingest};
use affluence_import::store::MemoryStore;
use affluence_import::types::{Restaurant, RestaurantId};
use chrono::{Duration, NaiveDate};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

const HEADER: &str = "date,attendance_count,occupancy_rate,is_full,weather_code,temp_max,temp_min,\
precipitation,wind_speed,is_holiday,is_school_vacation,is_weekend,holiday_name,vacation_name,day_of_week\n";

fn history_csv(rows: usize) -> String {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).expect("start date");
    let mut out = String::from(HEADER);
    for i in 0..rows {
        let day = start + Duration::days(i as i64);
        out.push_str(&format!(
            "{},{},{:.1},{},{},{:.1},{:.1},{:.1},{:.1},{},{},{},,,{}\n",
            day.format("%Y-%m-%d"),
            80 + i % 240,
            (i % 100) as f64,
            i % 7 == 0,
            i % 4,
            20.0 + (i % 15) as f64,
            10.0 + (i % 10) as f64,
            (i % 30) as f64 / 10.0,
            (i % 40) as f64,
            i % 50 == 0,
            i % 5 == 0,
            i % 7 >= 5,
            day.format("%A"),
        ));
    }
    out
}

fn bench_ingest(c: &mut Criterion) {
    let restaurant = Restaurant::new(RestaurantId(1), "Bench");
    let mut group = c.benchmark_group("ingest_memory_store");

    for rows in [1_000usize, 10_000] {
        let csv = history_csv(rows);
        group.throughput(Throughput::Elements(rows as u64));
        for batch_size in [20usize, 500] {
            let opts = ImportOptions {
                batch_size,
                ..Default::default()
            };
            group.bench_with_input(BenchmarkId::new(format!("batch_{batch_size}"), rows), &csv, |b, csv| {
                b.iter(|| {
                    let mut store = MemoryStore::new();
                    ingest(csv.as_bytes(), &restaurant, &mut store, &opts).expect("ingest benchmark")
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
