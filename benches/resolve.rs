use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use fixture_warehouse::candidates::candidate_names;
use fixture_warehouse::names::{canonical_full_name, split_full_name};

const COUNTRY_SAMPLES: &[&str] = &[
    "England",
    "Republic of Ireland",
    "Côte d'Ivoire",
    "Bosnia-Herzegovina",
    "St. Kitts and Nevis",
    "Korea Republic",
    "United States",
];

const NAME_SAMPLES: &[&str] = &[
    "Cristiano Ronaldo",
    "Ludwig van Beethoven",
    "Jürgen Klopp Jr",
    "John A. Smith",
    "Pelé",
];

fn bench_candidate_names(c: &mut Criterion) {
    c.bench_function("candidate_names", |b| {
        b.iter(|| {
            for raw in COUNTRY_SAMPLES {
                black_box(candidate_names(black_box(raw)));
            }
        })
    });
}

fn bench_split_full_name(c: &mut Criterion) {
    c.bench_function("split_full_name", |b| {
        b.iter(|| {
            for raw in NAME_SAMPLES {
                black_box(split_full_name(black_box(raw)));
            }
        })
    });
}

fn bench_canonical_full_name(c: &mut Criterion) {
    c.bench_function("canonical_full_name", |b| {
        b.iter(|| {
            for raw in NAME_SAMPLES {
                black_box(canonical_full_name(black_box(raw)));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_candidate_names,
    bench_split_full_name,
    bench_canonical_full_name
);
criterion_main!(benches);
