use criterion::criterion_main;

mod signature_generation;

criterion_main!(
    signature_generation::benches,
    signature_verification::benches,
    recover_compact::benches,
    tweak::benches,
);
