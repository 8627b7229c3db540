use sylva::{Grammar, Parser, Query, QueryCursor, QueryErrorKind, Renderer, Rule, TokenPattern, Tree};

fn numbers() -> Grammar {
    Grammar::builder("numbers")
        .token("number", TokenPattern::regex("[0-9]+"))
        .rule("list", Rule::repeat(Rule::sym("number")))
        .build()
        .unwrap()
}

fn parse(grammar: &Grammar, text: &str) -> Tree {
    let mut parser = Parser::new();
    parser.set_grammar(grammar).unwrap();
    parser.parse_str(text, None).unwrap()
}

fn ranges(query: &Query, cursor: &mut QueryCursor, tree: &Tree) -> Vec<(usize, u32, u32)> {
    cursor
        .exec(query, tree.root_node())
        .flat_map(|found| {
            let pattern = found.pattern_index;
            found
                .captures
                .into_iter()
                .map(move |capture| (pattern, capture.node.start_byte(), capture.node.end_byte()))
        })
        .collect()
}

#[test]
fn match_limit_on_a_large_tree() {
    let grammar = numbers();
    let tree = parse(&grammar, &"7 ".repeat(9_999));
    assert_eq!(tree.root_node().named_child_count(), 9_999);

    let query = Query::new(&grammar, "(_) @node").unwrap();
    let mut cursor = QueryCursor::new();
    cursor.set_match_limit(10);
    let mut matches = cursor.exec(&query, tree.root_node());
    let found = matches.by_ref().count();
    assert!(found <= 10);
    assert!(matches.did_exceed_match_limit());
}

#[test]
fn executing_twice_gives_the_same_matches() {
    let grammar = numbers();
    let tree = parse(&grammar, "1 22 333 4444");
    let query = Query::new(&grammar, "(number) @n\n((number) @a . (number) @b)\n(list (number)+ @all)").unwrap();

    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(2..9);
    let first = ranges(&query, &mut cursor, &tree);
    let second = ranges(&query, &mut cursor, &tree);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn query_errors_render_against_the_source() {
    let grammar = numbers();
    let source = "(list\n  (nmber))";
    let error = Query::new(&grammar, source).unwrap_err();
    assert_eq!(error.kind, QueryErrorKind::NodeType);
    assert_eq!((error.row, error.column), (1, 3));

    let rendered = error.to_diagnostic().render(&Renderer::plain(), "query.scm", source).to_string();
    assert!(rendered.contains("invalid node type: unknown node type `nmber`"), "{rendered}");
}

#[test]
fn quantifier_over_a_long_sibling_list() {
    let grammar = numbers();
    let tree = parse(&grammar, &"7 ".repeat(10_000));
    let query = Query::new(&grammar, "(list (number)+ @all)\n(list . (number) @first (number)* @rest .)").unwrap();

    let mut cursor = QueryCursor::new();
    let found = cursor
        .exec(&query, tree.root_node())
        .map(|found| (found.pattern_index, found.captures.len()))
        .collect::<Vec<_>>();
    assert_eq!(found, [(0, 10_000), (1, 10_000)]);
}
