use std::hint::black_box;

use codspeed_criterion_compat::{Criterion, criterion_group, criterion_main};
use sylva::{Parser, Query, QueryCursor};
use sylva_benchmark::{expression_grammar, program};

static SOURCE: &str = r#"
(assignment left: (identifier) @definition right: (_) @value)
(call function: (identifier) @callee (_)* @arguments)
(binary operator: ["+" "*"] @operator)
((comment) @doc . (assignment) @documented)
"#;

fn benchmark_query(c: &mut Criterion) {
    let grammar = expression_grammar();
    let mut parser = Parser::new();
    parser.set_grammar(&grammar).unwrap();
    let tree = parser.parse_str(&program(2000), None).unwrap();
    let query = Query::new(&grammar, SOURCE).unwrap();

    c.bench_function("compile_query", |b| {
        b.iter(|| black_box(Query::new(&grammar, SOURCE).unwrap()));
    });

    let mut cursor = QueryCursor::new();
    c.bench_function("query_matches", |b| {
        b.iter(|| {
            for found in cursor.exec(&query, tree.root_node()) {
                black_box(found);
            }
        });
    });

    c.bench_function("query_captures", |b| {
        b.iter(|| {
            let mut matches = cursor.exec(&query, tree.root_node());
            while let Some(capture) = matches.next_capture() {
                black_box(capture);
            }
        });
    });
}

criterion_group!(benches, benchmark_query);
criterion_main!(benches);
