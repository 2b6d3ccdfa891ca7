//! 필터 벤치마크
//!
//! 규칙 파싱과 단일/다중 규칙 평가 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use conntrackd_core::event::{EventKind, FlowEvent, TcpState, IPPROTO_TCP};
use conntrackd_filter::{Filter, Parser};

fn sample_event() -> FlowEvent {
    FlowEvent {
        kind: EventKind::New,
        flow_id: 1337,
        protocol: IPPROTO_TCP,
        src_addr: "192.168.1.100".parse().unwrap(),
        dst_addr: "1.1.1.1".parse().unwrap(),
        src_port: 49152,
        dst_port: 443,
        tcp_state: Some(TcpState::SynSent),
    }
}

fn bench_parse(c: &mut Criterion) {
    let rules = [
        ("any", "log any"),
        ("address", "drop destination address 8.8.8.8 on port 53"),
        (
            "complex",
            "drop not (source network LOCAL or source network PRIVATE) \
             and protocol TCP and destination port 22",
        ),
    ];

    let mut group = c.benchmark_group("parse");
    for (name, rule) in rules {
        group.bench_with_input(BenchmarkId::from_parameter(name), rule, |b, rule| {
            b.iter(|| Parser::new(black_box(rule)).unwrap().parse_rule().unwrap());
        });
    }
    group.finish();
}

fn bench_evaluate_single(c: &mut Criterion) {
    let event = sample_event();
    let rules = [
        ("any", "log any"),
        ("protocol", "log protocol TCP"),
        ("network", "log destination network PUBLIC"),
        ("cidr", "log source address 192.168.0.0/16"),
        ("port_range", "log destination port 1-1024"),
    ];

    let mut group = c.benchmark_group("evaluate_single");
    group.throughput(Throughput::Elements(1));
    for (name, rule) in rules {
        let filter = Filter::build(&[rule]).unwrap();
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| filter.evaluate(black_box(&event)));
        });
    }
    group.finish();
}

fn bench_evaluate_scaling(c: &mut Criterion) {
    let event = sample_event();

    let mut group = c.benchmark_group("evaluate_scaling");
    for rule_count in [1usize, 10, 50, 100] {
        // 매칭되지 않는 규칙들 뒤에 매칭 규칙 하나: 최악 경로 측정
        let mut rules: Vec<String> = (0..rule_count - 1)
            .map(|i| format!("drop destination address 203.0.113.{}", i % 256))
            .collect();
        rules.push("log protocol TCP".to_owned());
        let filter = Filter::build(&rules).unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(rule_count),
            &filter,
            |b, filter| {
                b.iter(|| filter.evaluate(black_box(&event)));
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_evaluate_single,
    bench_evaluate_scaling
);
criterion_main!(benches);
