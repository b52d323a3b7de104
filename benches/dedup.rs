//! Benchmarks for candidate extraction, deduplication and classification.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use wlmerge::aggregator::merge_and_deduplicate;
use wlmerge::identity::{extract_host_port, generate_config_key, DedupStrategy};
use wlmerge::link::extract_candidates;
use wlmerge::renumber::Renumberer;
use wlmerge::whitelist::WhitelistSet;

/// Mixed-protocol links; every fourth one repeats an earlier server under a new name
fn generate_links(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let n = if i % 4 == 3 { i - 3 } else { i };
            let a = (n % 256) as u8;
            let b = ((n / 256) % 256) as u8;
            match n % 3 {
                0 => format!(
                    "vless://uuid-{}@95.163.{}.{}:443?security=reality&sni=ya.ru&pbk=k{}&type=tcp#node{}",
                    n, b, a, n, i
                ),
                1 => format!("trojan://pw{}@host{}.example.com:443?sni=example.com#t{}", n, n, i),
                _ => format!("ss://YWVzLTI1Ni1nY206cGFzcw@10.{}.{}.1:8388#s{}", b, a, i),
            }
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_candidates");

    for size in [100, 1000, 10000] {
        let blob = generate_links(size).join("");
        group.bench_with_input(BenchmarkId::new("concatenated", size), &blob, |b, blob| {
            b.iter(|| black_box(extract_candidates(blob)));
        });
    }

    group.finish();
}

fn bench_identity(c: &mut Criterion) {
    let links = generate_links(1000);

    c.bench_function("extract_host_port_1000", |b| {
        b.iter(|| {
            for link in &links {
                black_box(extract_host_port(link));
            }
        });
    });

    c.bench_function("generate_config_key_1000", |b| {
        b.iter(|| {
            for link in &links {
                black_box(generate_config_key(link));
            }
        });
    });
}

fn bench_deduplicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_and_deduplicate");

    for size in [1000, 10000, 50000] {
        let links = generate_links(size);
        for strategy in [DedupStrategy::HostPort, DedupStrategy::Params] {
            group.bench_with_input(
                BenchmarkId::new(strategy.to_string(), size),
                &links,
                |b, links| {
                    b.iter(|| black_box(merge_and_deduplicate(links, strategy)));
                },
            );
        }
    }

    group.finish();
}

fn bench_classify_and_renumber(c: &mut Criterion) {
    let links = generate_links(10000);
    let whitelist = WhitelistSet::from_defaults();
    let renumberer = Renumberer::default();

    c.bench_function("is_whitelisted_10000", |b| {
        b.iter(|| links.iter().filter(|l| whitelist.is_whitelisted(l)).count());
    });

    c.bench_function("renumber_10000", |b| {
        b.iter(|| black_box(renumberer.renumber(&links)));
    });
}

criterion_group!(
    benches,
    bench_extract,
    bench_identity,
    bench_deduplicate,
    bench_classify_and_renumber
);
criterion_main!(benches);
