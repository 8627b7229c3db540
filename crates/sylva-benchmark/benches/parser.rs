use std::hint::black_box;

use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use sylva::Parser;
use sylva_benchmark::{edit, expression_grammar, program};

fn benchmark_parser(c: &mut Criterion) {
    let grammar = expression_grammar();
    let mut parser = Parser::new();
    parser.set_grammar(&grammar).unwrap();

    let mut group = c.benchmark_group("Parser Benchmark");
    for (name, lines) in [("Small", 20), ("Medium", 400), ("Large", 4000)] {
        let text = program(lines);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_code", name), &text, |b, text| {
            b.iter(|| black_box(parser.parse_str(text, None).unwrap()));
        });
    }

    let broken = program(400).replace(" = ", " ").replace(");", ";");
    group.throughput(Throughput::Bytes(broken.len() as u64));
    group.bench_with_input(BenchmarkId::new("parse_code", "Recovery"), &broken, |b, text| {
        b.iter(|| black_box(parser.parse_str(text, None).unwrap()));
    });
    group.finish();
}

fn benchmark_reparse(c: &mut Criterion) {
    let grammar = expression_grammar();
    let mut parser = Parser::new();
    parser.set_grammar(&grammar).unwrap();

    let text = program(4000);
    let tree = parser.parse_str(&text, None).unwrap();
    let middle = text.len() / 2;
    let start = middle + text[middle..].find("= ").unwrap() + 2;
    let (new_text, input_edit) = edit(&text, start, start, "1 + ");

    let mut edited = tree.clone();
    edited.edit(&input_edit).unwrap();

    c.bench_function("reparse_after_edit", |b| {
        b.iter(|| black_box(parser.parse_str(&new_text, Some(&edited)).unwrap()));
    });
}

criterion_group!(benches, benchmark_parser, benchmark_reparse);
criterion_main!(benches);
