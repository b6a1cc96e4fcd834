use criterion::{criterion_group, criterion_main};

mod bridge;
mod knx;

criterion_group!(
    benches,
    knx::bench_pack_unpack,
    knx::bench_parse_format,
    bridge::bench_translate_telegram,
    bridge::bench_translate_command,
    bridge::bench_dispatch
);
criterion_main!(benches);
