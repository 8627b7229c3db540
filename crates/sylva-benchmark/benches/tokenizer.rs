use codspeed_criterion_compat::{
    Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use sylva::{Grammar, Length};
use sylva_benchmark::{expression_grammar, program};
use sylva_tokenizer::{Lexer, SourceText};

static IDENTIFIERS: &str =
    "it was the year when they finally immanentized the eschaton it was the year when they \
     finally immanentized the eschaton it was the year when they finally immanentized the \
     eschaton it was the year when they finally immanentized the eschaton it was the year when \
     they finally immanentized the eschaton it was the year when they finally immanentized the \
     eschaton it was the year when they finally immanentized the eschaton";

fn iterate(grammar: &Grammar, source: &SourceText) {
    let lexer = Lexer::new(grammar, source, &[]);
    let mut token = lexer.lex(Length::ZERO);
    while !token.is_end() {
        black_box(token);
        token = lexer.lex(token.end());
    }
}

fn bench_iterate(c: &mut Criterion) {
    let grammar = expression_grammar();
    let statements = program(200);
    let candidates = [("identifiers", IDENTIFIERS), ("statements", statements.as_str())];

    let mut group = c.benchmark_group("iterate");
    for (name, text) in candidates {
        let source = SourceText::from(text);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(name, &source, |b, source| b.iter(|| iterate(&grammar, source)));
    }
    group.finish();
}

criterion_group!(benches, bench_iterate);
criterion_main!(benches);
