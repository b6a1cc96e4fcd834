use criterion::{Criterion, Throughput};
use std::hint::black_box;
use knxbridge::knx::address::{GroupAddress, pack, unpack};
use rand::Rng;

pub fn bench_pack_unpack(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let raws: Vec<u16> = (0..1024).map(|_| rng.r#gen()).collect();

    let mut group = c.benchmark_group("pack_unpack");
    group.throughput(Throughput::Elements(raws.len() as u64));
    group.bench_function("pack_unpack", |b| {
        b.iter(|| {
            for &raw in &raws {
                let (main, middle, sub) = unpack(black_box(raw));
                let _ = black_box(pack(main.into(), middle.into(), sub.into()));
            }
        })
    });
    group.finish();
}

pub fn bench_parse_format(c: &mut Criterion) {
    let addresses = ["0/0/1", "1/0/7", "5/3/128", "31/7/255"];

    let mut group = c.benchmark_group("parse_format");
    group.throughput(Throughput::Elements(addresses.len() as u64));
    group.bench_function("parse_format", |b| {
        b.iter(|| {
            for text in addresses {
                let address: GroupAddress = black_box(text).parse().expect("valid address");
                black_box(address.to_topic_segment());
            }
        })
    });
    group.finish();
}
