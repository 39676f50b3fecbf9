use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serial_repl_bridge::receive::Utf8Decoder;
use serial_repl_bridge::{LogChannel, LogKind, PromptMatcher};
use std::time::Duration;

pub fn bench_prompt_match(c: &mut Criterion) {
    let matcher = PromptMatcher::new(">>> ");
    let chunk = "MicroPython v1.22.0 on 2024-01-01; Raspberry Pi Pico with RP2040\r\nType \"help()\" for more information.\r\n>>> ";
    c.bench_function("prompt_match_chunk", |b| {
        b.iter(|| black_box(matcher.is_prompt(black_box(chunk))))
    });
}

pub fn bench_decode_split_chunks(c: &mut Criterion) {
    let text = "température: 21.5°C\r\n".repeat(32);
    let bytes = text.as_bytes();
    c.bench_function("decode_split_chunks", |b| {
        b.iter(|| {
            let mut decoder = Utf8Decoder::new();
            let mut out = 0;
            for chunk in bytes.chunks(7) {
                out += decoder.decode(chunk).len();
            }
            black_box(out)
        })
    });
}

pub fn bench_log_append(c: &mut Criterion) {
    c.bench_function("received_log_append_with_subscriber", |b| {
        b.iter(|| {
            let log = LogChannel::new(LogKind::Received);
            log.subscribe(|entries| {
                black_box(entries.len());
            });
            for _ in 0..64 {
                log.append("x\r\n>>> ");
            }
            black_box(log.len())
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_prompt_match, bench_decode_split_chunks, bench_log_append
}
criterion_main!(benches);
