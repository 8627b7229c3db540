use std::fmt::Write as _;

use expect_test::expect;
use proptest::prelude::*;
use sylva::{
    Grammar, InputEdit, Length, Parser, Point, Preorder, Range, Renderer, Rule, TokenPattern, Tree,
    WalkEvent,
};

fn sum() -> Grammar {
    Grammar::builder("sum")
        .token("number", TokenPattern::regex("[0-9]+"))
        .token("plus", TokenPattern::literal("+"))
        .rule("expression", Rule::seq([Rule::sym("number"), Rule::sym("plus"), Rule::sym("number")]))
        .build()
        .unwrap()
}

fn lists() -> Grammar {
    Grammar::builder("lists")
        .token("number", TokenPattern::regex("[0-9]+"))
        .token("word", TokenPattern::regex("[a-z]+"))
        .rule("document", Rule::repeat(Rule::sym("_item")))
        .rule("_item", Rule::choice([Rule::sym("number"), Rule::sym("word"), Rule::sym("list")]))
        .rule(
            "list",
            Rule::seq([
                Rule::literal("["),
                Rule::optional(Rule::seq([
                    Rule::field("element", Rule::sym("_item")),
                    Rule::repeat(Rule::seq([Rule::literal(","), Rule::field("element", Rule::sym("_item"))])),
                ])),
                Rule::literal("]"),
            ]),
        )
        .build()
        .unwrap()
}

fn parser(grammar: &Grammar) -> Parser {
    let mut parser = Parser::new();
    parser.set_grammar(grammar).unwrap();
    parser
}

fn point_at(text: &str, byte: usize) -> Point {
    let before = &text[..byte];
    match before.rfind('\n') {
        Some(newline) => Point::new(before.matches('\n').count() as u32, (byte - newline - 1) as u32),
        None => Point::new(0, byte as u32),
    }
}

/// Kinds and ranges of every node in preorder.
fn shape(tree: &Tree) -> String {
    let mut out = String::new();
    for event in Preorder::new(tree.root_node()) {
        if let WalkEvent::Enter(node) = event {
            let missing = if node.is_missing() { "!" } else { "" };
            write!(out, "{}{missing}@{:?} ", node.kind(), node.byte_range()).unwrap();
        }
    }
    out
}

#[test]
fn number_plus_number() {
    let grammar = sum();
    assert_eq!(grammar.symbol_for_name("number", true), Some(1));
    assert_eq!(grammar.symbol_for_name("plus", true), Some(2));

    let mut engine = parser(&grammar);
    let mut tree = engine.parse_str("1+2", None).unwrap();
    let children = tree
        .root_node()
        .named_children()
        .map(|node| (node.kind(), node.start_byte(), node.end_byte()))
        .collect::<Vec<_>>();
    assert_eq!(children, [("number", 0, 1), ("plus", 1, 2), ("number", 2, 3)]);

    tree.edit(&InputEdit {
        start_byte: 1,
        old_end_byte: 1,
        new_end_byte: 2,
        start_position: Point::new(0, 1),
        old_end_position: Point::new(0, 1),
        new_end_position: Point::new(0, 2),
    })
    .unwrap();
    let new_tree = engine.parse_str("10+2", Some(&tree)).unwrap();
    expect![[r#"(expression (number) (plus) (number))"#]].assert_eq(&new_tree.root_node().to_sexp());

    let changed = tree
        .changed_ranges(&new_tree)
        .iter()
        .map(|range| (range.start_byte, range.end_byte))
        .collect::<Vec<_>>();
    assert_eq!(changed, [(0, 2)]);
}

#[test]
fn parsing_twice_gives_the_same_tree() {
    let grammar = lists();
    let text = "[1, [a, b], []] c [2,";
    let first = parser(&grammar).parse_str(text, None).unwrap();
    let second = parser(&grammar).parse_str(text, None).unwrap();
    assert_eq!(shape(&first), shape(&second));
    assert_eq!(first.root_node().to_sexp(), second.root_node().to_sexp());
    assert!(first.changed_ranges(&second).is_empty());
}

#[test]
fn rejected_ranges_keep_the_previous_ones() {
    let grammar = lists();
    let mut engine = parser(&grammar);
    let span = |start: u32, end: u32| {
        Range::new(Length::new(start, Point::new(0, start)), Length::new(end, Point::new(0, end)))
    };
    let valid = [span(0, 4), span(6, 10)];
    engine.set_included_ranges(&valid).unwrap();

    assert!(engine.set_included_ranges(&[span(0, 5), span(3, 8)]).is_err());
    assert!(engine.set_included_ranges(&[span(6, 10), span(0, 4)]).is_err());
    assert_eq!(engine.included_ranges(), valid);
}

#[test]
fn cursor_visits_every_node_once() {
    let grammar = lists();
    let tree = parser(&grammar).parse_str("[1, [a, b], []] c", None).unwrap();
    let root = tree.root_node();

    let expected = Preorder::new(root)
        .filter_map(|event| match event {
            WalkEvent::Enter(node) => Some(node),
            WalkEvent::Leave(_) => None,
        })
        .collect::<Vec<_>>();

    let mut cursor = tree.walk();
    let mut visited = vec![cursor.node()];
    'walk: loop {
        if cursor.goto_first_child() {
            visited.push(cursor.node());
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                visited.push(cursor.node());
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
    assert_eq!(visited, expected);
    assert_eq!(cursor.node(), root);
    assert_eq!(cursor.depth(), 0);
}

#[test]
fn post_order_traversal() {
    let grammar = lists();
    let text = "[1, [a]] b";
    let tree = parser(&grammar).parse_str(text, None).unwrap();
    let mut cursor = tree.walk();
    let mut out = String::new();

    'walk: loop {
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            let node = cursor.node();
            let field = cursor.field_name().map(|name| format!("{name}: ")).unwrap_or_default();
            writeln!(out, "{field}{} {:?}", node.kind(), node.text(text)).unwrap();
            if cursor.depth() == 0 {
                break 'walk;
            }
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            cursor.goto_parent();
        }
    }
    expect![[r#"
        [ "["
        element: number "1"
        , ","
        [ "["
        element: word "a"
        ] "]"
        element: list "[a]"
        ] "]"
        list "[1, [a]]"
        word "b"
        document "[1, [a]] b"
    "#]]
    .assert_eq(&out);
}

#[test]
fn diagnostics_render_against_the_text() {
    let grammar = sum();
    let text = "1+";
    let tree = parser(&grammar).parse_str(text, None).unwrap();
    expect![[r#"(expression (number) (plus) (MISSING number))"#]].assert_eq(&tree.root_node().to_sexp());

    let diagnostics = tree.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message(), "missing number");
    let rendered = diagnostics[0].render(&Renderer::plain(), "input.sum", text).to_string();
    assert!(rendered.contains("missing number"), "{rendered}");
    assert!(rendered.contains("input.sum"), "{rendered}");
}

#[test]
fn deeply_nested_lists() {
    let depth = 3_000;
    let grammar = lists();
    let mut engine = parser(&grammar);
    let text = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
    let mut tree = engine.parse_str(&text, None).unwrap();

    let expected = format!("(document (list{}{}", " element: (list".repeat(depth - 1), ")".repeat(depth + 1));
    assert_eq!(tree.root_node().to_sexp(), expected);

    let depth = depth as u32;
    let innermost = tree.root_node().descendant_for_byte_range(depth - 1, depth + 1).unwrap();
    assert_eq!((innermost.kind(), innermost.start_byte()), ("list", depth - 1));
    let parent = innermost.parent().unwrap();
    assert_eq!((parent.kind(), parent.start_byte(), parent.end_byte()), ("list", depth - 2, depth + 2));

    tree.edit(&InputEdit {
        start_byte: depth,
        old_end_byte: depth,
        new_end_byte: depth + 1,
        start_position: Point::new(0, depth),
        old_end_position: Point::new(0, depth),
        new_end_position: Point::new(0, depth + 1),
    })
    .unwrap();
    assert!(tree.root_node().has_changes());

    let new_text = format!("{}1{}", "[".repeat(depth as usize), "]".repeat(depth as usize));
    let incremental = engine.parse_str(&new_text, Some(&tree)).unwrap();
    let full = parser(&grammar).parse_str(&new_text, None).unwrap();
    assert_eq!(incremental.root_node().to_sexp(), full.root_node().to_sexp());
    assert!(incremental.root_node().to_sexp().contains("element: (list element: (number)))"));
    assert!(!tree.changed_ranges(&incremental).is_empty());
}

const FRAGMENTS: &[&str] = &["1", "23", "a", "bc", "[", "]", ",", " ", "\n"];

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..20).prop_map(|parts| parts.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn incremental_parse_matches_full_parse(
        old_text in text(),
        inserted in text(),
        start in any::<prop::sample::Index>(),
        removed in 0usize..5,
    ) {
        let grammar = lists();
        let mut engine = parser(&grammar);
        let mut tree = engine.parse_str(&old_text, None).unwrap();

        let start = start.index(old_text.len() + 1);
        let old_end = (start + removed).min(old_text.len());
        let new_text = format!("{}{inserted}{}", &old_text[..start], &old_text[old_end..]);
        let new_end = start + inserted.len();
        tree.edit(&InputEdit {
            start_byte: start as u32,
            old_end_byte: old_end as u32,
            new_end_byte: new_end as u32,
            start_position: point_at(&old_text, start),
            old_end_position: point_at(&old_text, old_end),
            new_end_position: point_at(&new_text, new_end),
        })
        .unwrap();

        let incremental = engine.parse_str(&new_text, Some(&tree)).unwrap();
        let full = parser(&grammar).parse_str(&new_text, None).unwrap();
        prop_assert_eq!(shape(&incremental), shape(&full));
    }
}
