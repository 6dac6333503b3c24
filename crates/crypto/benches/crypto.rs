//! Benchmarks for hashing, signing and identifier generation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use paycore_crypto::{
    ApiKeyManager, ApiKeyPrefix, HashingConfig, IdCategory, IdentifierGenerator, SecretHasher,
    WebhookSigner,
};

fn bench_secret_hasher(c: &mut Criterion) {
    let mut group = c.benchmark_group("secret_hasher");
    group.sample_size(10);

    for memory_kib in [8 * 1024, 64 * 1024] {
        let hasher = SecretHasher::new(HashingConfig {
            memory_kib,
            ..Default::default()
        })
        .unwrap();
        let stored = hasher.hash("correct horse battery staple").unwrap().to_string();

        group.bench_with_input(BenchmarkId::new("verify", memory_kib), &stored, |b, stored| {
            b.iter(|| hasher.verify(black_box("correct horse battery staple"), black_box(stored)))
        });
    }

    group.finish();
}

fn bench_webhook(c: &mut Criterion) {
    let mut group = c.benchmark_group("webhook");
    let signer = WebhookSigner::default();

    for size in [64, 1024, 64 * 1024].iter() {
        let payload = vec![b'x'; *size];
        let signed = signer.sign_now(&payload, b"whsec_bench").unwrap();

        group.bench_with_input(BenchmarkId::new("sign", size), size, |b, _| {
            b.iter(|| WebhookSigner::sign(black_box(&payload), b"whsec_bench", signed.timestamp))
        });
        group.bench_with_input(BenchmarkId::new("verify", size), size, |b, _| {
            b.iter(|| signer.verify_signed(black_box(&signed), b"whsec_bench"))
        });
    }

    group.finish();
}

fn bench_identifiers(c: &mut Criterion) {
    let generator = IdentifierGenerator::new();
    let manager = ApiKeyManager::new();

    c.bench_function("identifier_session", |b| {
        b.iter(|| generator.generate(black_box(&IdCategory::Session)))
    });
    c.bench_function("identifier_time_ordered", |b| {
        b.iter(|| generator.transaction_id())
    });
    c.bench_function("api_key_generate_and_digest", |b| {
        b.iter(|| {
            let key = manager.generate_api_key(ApiKeyPrefix::LiveSecret).unwrap();
            ApiKeyManager::digest(key.rendered())
        })
    });
}

criterion_group!(benches, bench_secret_hasher, bench_webhook, bench_identifiers);
criterion_main!(benches);
