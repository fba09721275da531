use criterion::{black_box, criterion_group, criterion_main, Criterion};

use libfsa::fsa::{path_zip, AcBuilder, Builder, Dawg, DoubleArrayAc, OrderedBuilder, WalkOrder};

// ── Hand-rolled LCG (no external deps) ──────────────────────────────────────

struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0
    }
    /// Returns a value in [0, bound).
    fn next_range(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

// ── Word and text generators ────────────────────────────────────────────────

fn generate_words(n: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = Lcg::new(seed);
    let mut set = std::collections::BTreeSet::new();
    while set.len() < n {
        let len = (rng.next_range(10) + 3) as usize; // 3..=12
        let word: Vec<u8> = (0..len).map(|_| b'a' + rng.next_range(26) as u8).collect();
        set.insert(word);
    }
    set.into_iter().collect() // already sorted & unique
}

fn generate_text(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    (0..len).map(|_| b'a' + rng.next_range(26) as u8).collect()
}

// ── Benchmarks ──────────────────────────────────────────────────────────────

fn bench_build(c: &mut Criterion) {
    let words = generate_words(20_000, 42);
    c.bench_function("build_ordered_20k", |b| {
        b.iter(|| {
            let mut builder = OrderedBuilder::<u32>::new();
            for w in black_box(&words) {
                builder.add_word(w.as_slice()).unwrap();
            }
            builder.finish().unwrap()
        });
    });

    c.bench_function("build_general_20k", |b| {
        b.iter(|| {
            let mut builder = Builder::<u32>::new();
            for w in black_box(&words) {
                builder.add_word(w.as_slice()).unwrap();
            }
            builder.finish()
        });
    });
}

fn bench_rank(c: &mut Criterion) {
    let words = generate_words(20_000, 42);
    let mut builder = OrderedBuilder::<u32>::new();
    for w in &words {
        builder.add_word(w.as_slice()).unwrap();
    }
    let plain = builder.finish().unwrap();
    let zipped = path_zip(&plain, WalkOrder::BreadthFirst, 2).unwrap();
    let dawg = Dawg::compile(zipped).unwrap();

    c.bench_function("index_20k_zipped", |b| {
        let mut i = 0;
        b.iter(|| {
            let w = &words[i % words.len()];
            i += 1;
            dawg.index(black_box(w.as_slice()))
        });
    });

    c.bench_function("nth_word_20k_zipped", |b| {
        let mut r = 0u64;
        b.iter(|| {
            r = (r + 1) % dawg.num_words();
            dawg.nth_word(black_box(r))
        });
    });
}

fn bench_scan(c: &mut Criterion) {
    let patterns = generate_words(500, 7);
    let text = generate_text(1 << 16, 99);
    let mut builder = AcBuilder::new();
    for p in &patterns {
        builder.add_pattern(p);
    }
    let sparse = builder.compile();
    let dense = DoubleArrayAc::compact(&sparse, WalkOrder::BreadthFirst);

    c.bench_function("scan_sparse_64k", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            sparse.scan(black_box(&text), |_, pats| hits += pats.len());
            hits
        });
    });

    c.bench_function("scan_dense_64k", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            dense.scan(black_box(&text), |_, pats| hits += pats.len());
            hits
        });
    });
}

criterion_group!(benches, bench_build, bench_rank, bench_scan);
criterion_main!(benches);
