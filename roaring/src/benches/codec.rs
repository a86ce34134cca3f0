use commonware_roaring::{FrozenBitmap, FrozenBuffer, Roaring, RoaringBitmap};
use criterion::{criterion_group, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn sample(n: usize) -> RoaringBitmap {
    let mut sampler = StdRng::seed_from_u64(0);
    let mut bitmap: RoaringBitmap = (0..n).map(|_| sampler.gen_range(0..1 << 26)).collect();
    for start in (0..n as u32).map(|i| i * 1_000_003) {
        bitmap.insert_range(start..start + 500);
    }
    bitmap.run_optimize();
    bitmap
}

fn bench_portable(c: &mut Criterion) {
    for n in [1_000, 100_000] {
        let bitmap = sample(n);
        let mut encoded = Vec::with_capacity(bitmap.portable_size());
        bitmap.serialize_portable(&mut encoded);

        c.bench_function(&format!("{}/serialize/n={}", module_path!(), n), |b| {
            b.iter(|| {
                let mut buf = Vec::with_capacity(bitmap.portable_size());
                bitmap.serialize_portable(&mut buf);
                buf
            })
        });
        c.bench_function(&format!("{}/deserialize/n={}", module_path!(), n), |b| {
            b.iter(|| RoaringBitmap::deserialize_portable(&mut encoded.as_slice()).unwrap())
        });
    }
}

fn bench_frozen(c: &mut Criterion) {
    for n in [1_000, 100_000] {
        let bitmap = sample(n);
        let buffer = FrozenBuffer::new(&bitmap);

        c.bench_function(&format!("{}/freeze/n={}", module_path!(), n), |b| {
            b.iter(|| FrozenBuffer::new(&bitmap))
        });
        c.bench_function(&format!("{}/view/n={}", module_path!(), n), |b| {
            b.iter(|| FrozenBitmap::view(buffer.as_bytes()).unwrap().len())
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_portable, bench_frozen
}
