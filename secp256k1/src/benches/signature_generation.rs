use commonware_secp256k1::{Config, Context, SecretKey};
use criterion::{criterion_group, BatchSize, Criterion};
use rand::{thread_rng, Rng};
use std::hint::black_box;

fn benchmark_signature_generation(c: &mut Criterion) {
    let context = Context::new(Config::default()).unwrap();
    let mut digest = [0u8; 32];
    thread_rng().fill(&mut digest);
    for compact in [false, true] {
        c.bench_function(&format!("{}/compact={}", module_path!(), compact), |b| {
            b.iter_batched(
                || SecretKey::generate(&mut thread_rng(), true).unwrap(),
                |secret| {
                    if compact {
                        black_box(context.sign_compact(&secret, &digest).unwrap());
                    } else {
                        black_box(context.sign(&secret, &digest).unwrap());
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, benchmark_signature_generation);
