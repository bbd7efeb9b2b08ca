use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::TempDir;

use storeddict_core::{codec, StoreConfig, StoredDict, Value};

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    for validate in [true, false] {
        let name = if validate { "set_validated" } else { "set_unvalidated" };
        group.bench_function(name, |b| {
            let dir = TempDir::new().unwrap();
            let config = StoreConfig::default()
                .with_delay(Duration::from_secs(3600))
                .with_validation(validate)
                .with_dry_run(true);
            let store = StoredDict::open(dir.path().join("md.yml"), config).unwrap();

            let mut counter = 0u64;
            b.iter(|| {
                store.set(format!("key{}", counter % 1000), &counter).unwrap();
                counter += 1;
            });
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_hit", |b| {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::default().with_dry_run(true);
        let store = StoredDict::open(dir.path().join("md.yml"), config).unwrap();
        for i in 0..1000u64 {
            store.set(format!("key{}", i), &i).unwrap();
        }

        let mut counter = 0u64;
        b.iter(|| {
            black_box(store.get(&format!("key{}", counter % 1000)).unwrap());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("dump");
    group.sample_size(20);

    let mut contents = codec::Mapping::new();
    for i in 0..200u64 {
        contents.insert(format!("key{}", i), Value::from(format!("value {}", i)));
    }
    group.throughput(Throughput::Elements(contents.len() as u64));

    group.bench_function("dump_200_entries", |b| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("md.yml");
        b.iter(|| {
            codec::dump(&path, black_box(&contents), Some("bench"), false).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_dump);
criterion_main!(benches);
