//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Performance benchmarks for the OATH engine and the AEAD record
//! envelope -- the two operations a command handler does per request.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use oath_token_core::crypto::{lock_aead, unlock_aead};
use oath_token_core::oath::{hotp, totp};
use oath_token_core::records::XCHACHA20_MAC_LEN;
use rand::rngs::mock::StepRng;

fn bench_hotp(c: &mut Criterion) {
    let secret = b"12345678901234567890";
    c.bench_function("hotp_6_digits", |b| {
        b.iter(|| hotp(black_box(secret), black_box(42), black_box(6)));
    });
}

fn bench_totp(c: &mut Criterion) {
    let secret = b"12345678901234567890";
    c.bench_function("totp_6_digits", |b| {
        b.iter(|| totp(black_box(secret), black_box(1_700_000_000), black_box(30), black_box(6)));
    });
}

fn bench_record_lock_unlock(c: &mut Criterion) {
    let cdi = [0x42u8; 32];
    let aad = [0u8; 10];

    c.bench_function("record_lock_aead", |b| {
        let mut rng = StepRng::new(0, 1);
        b.iter(|| {
            let mut blob = [0u8; 68];
            let mut mac = [0u8; XCHACHA20_MAC_LEN];
            lock_aead(black_box(&mut blob), &cdi, &aad, &mut mac, &mut rng)
        });
    });

    c.bench_function("record_unlock_aead", |b| {
        let mut rng = StepRng::new(0, 1);
        let mut blob = [0u8; 68];
        let mut mac = [0u8; XCHACHA20_MAC_LEN];
        let nonce = lock_aead(&mut blob, &cdi, &aad, &mut mac, &mut rng);
        b.iter(|| {
            let mut working = blob;
            let _ = unlock_aead(black_box(&mut working), &cdi, &nonce, &mac, &aad);
        });
    });
}

criterion_group!(benches, bench_hotp, bench_totp, bench_record_lock_unlock);
criterion_main!(benches);
