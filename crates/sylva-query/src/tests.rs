use std::fmt::Write as _;

use expect_test::{Expect, expect};
use sylva_grammar::{Grammar, GrammarBuilder, Rule, TokenPattern};
use sylva_parse::Parser;
use sylva_tree::{Point, Tree};

use crate::{
    CaptureQuantifier, PredicateStep, Query, QueryCursor, QueryMatch, QueryPredicate,
    QueryPredicateArg,
};

fn builder() -> GrammarBuilder {
    let expression = Rule::sym("_expression");
    Grammar::builder("expr")
        .token("number", TokenPattern::regex("[0-9]+"))
        .token("identifier", TokenPattern::regex("[a-z_]+"))
        .token("comment", TokenPattern::regex("//[^\n]*"))
        .rule("program", Rule::repeat(Rule::sym("_statement")))
        .rule("_statement", Rule::choice([Rule::sym("assignment"), Rule::sym("expression_statement")]))
        .rule(
            "assignment",
            Rule::seq([
                Rule::field("left", Rule::sym("identifier")),
                Rule::literal("="),
                Rule::field("right", expression.clone()),
                Rule::literal(";"),
            ]),
        )
        .rule("expression_statement", Rule::seq([expression.clone(), Rule::literal(";")]))
        .rule("_expression", Rule::choice([Rule::sym("binary"), Rule::sym("_operand")]))
        .rule(
            "binary",
            Rule::seq([
                Rule::field("left", Rule::sym("_operand")),
                Rule::field("operator", Rule::choice([Rule::literal("+"), Rule::literal("-")])),
                Rule::field("right", expression.clone()),
            ]),
        )
        .rule(
            "_operand",
            Rule::choice([Rule::sym("number"), Rule::sym("call"), Rule::sym("identifier")]),
        )
        .rule(
            "call",
            Rule::seq([
                Rule::field("function", Rule::sym("identifier")),
                Rule::literal("("),
                Rule::optional(Rule::seq([
                    Rule::field("argument", expression.clone()),
                    Rule::repeat(Rule::seq([Rule::literal(","), Rule::field("argument", expression)])),
                ])),
                Rule::literal(")"),
            ]),
        )
        .extra("comment")
}

fn expr() -> Grammar {
    builder().build().unwrap()
}

fn parse(grammar: &Grammar, text: &str) -> Tree {
    let mut parser = Parser::new();
    parser.set_grammar(grammar).unwrap();
    parser.parse_str(text, None).unwrap()
}

fn format_match(out: &mut String, query: &Query, found: &QueryMatch<'_>, text: &str) {
    let captures = found
        .captures
        .iter()
        .map(|capture| {
            let name = &query.capture_names()[capture.index as usize];
            format!("@{name} {} {:?}", capture.node.kind(), capture.node.text(text))
        })
        .collect::<Vec<_>>();
    writeln!(out, "{}: {}", found.pattern_index, captures.join(", ")).unwrap();
}

fn run(query: &Query, cursor: &mut QueryCursor, tree: &Tree, text: &str) -> String {
    let mut out = String::new();
    for found in cursor.exec(query, tree.root_node()) {
        format_match(&mut out, query, &found, text);
    }
    out
}

fn check(source: &str, text: &str, expect: Expect) {
    let grammar = expr();
    let tree = parse(&grammar, text);
    let query = Query::new(&grammar, source).unwrap();
    expect.assert_eq(&run(&query, &mut QueryCursor::new(), &tree, text));
}

#[test]
fn fields_and_wildcards() {
    check(
        "(assignment left: (identifier) @name right: (_) @value)",
        "x = 1;\ny = f(2, z);\n",
        expect![[r#"
            0: @name identifier "x", @value number "1"
            0: @name identifier "y", @value call "f(2, z)"
        "#]],
    );
}

#[test]
fn anonymous_nodes_and_alternations() {
    check(
        r#"(binary operator: ["+" "-"] @op right: (_) @right)"#,
        "a + b - c;",
        expect![[r#"
            0: @op + "+", @right binary "b - c"
            0: @op - "-", @right identifier "c"
        "#]],
    );
}

#[test]
fn quantifiers_are_greedy() {
    check(
        "(call function: (identifier) @fn (identifier)* @arg)\n(call (number)+ @nums)",
        "f(x, 1, y);\ng();\n",
        expect![[r#"
            0: @fn identifier "f", @arg identifier "x", @arg identifier "y"
            1: @nums number "1"
            0: @fn identifier "g"
        "#]],
    );
}

#[test]
fn anchors() {
    check(
        "
        (program . (assignment) @first)
        (program . (expression_statement) @never)
        ((expression_statement) @a . (expression_statement) @b)
        ((expression_statement) @c (expression_statement) @d)
        (program (_) @last .)
        ",
        "x = 1;\ny;\n// note\nz;\n",
        expect![[r#"
            0: @first assignment "x = 1;"
            4: @last expression_statement "z;"
            3: @c expression_statement "y;", @d expression_statement "z;"
        "#]],
    );
}

#[test]
fn negated_fields() {
    check(
        "(call !argument) @empty",
        "f();\ng(1);\n",
        expect![[r#"
            0: @empty call "f()"
        "#]],
    );
}

#[test]
fn missing_and_error_nodes() {
    let source = "(MISSING) @missing\n(ERROR) @error\n(MISSING \"=\") @equals\n(MISSING number) @number";
    check(
        source,
        "x 1;",
        expect![[r#"
            0: @missing = ""
            2: @equals = ""
        "#]],
    );
    check(
        source,
        "x = @1;",
        expect![[r#"
            1: @error ERROR "@"
        "#]],
    );
}

#[test]
fn errors() {
    let grammar = expr();
    let sources = [
        "(assignment (nonexistent))",
        "(assignment nope: (identifier))",
        "(identifier (number))",
        r#"((identifier) @x (#eq? @y "a"))"#,
        "(assignment",
        "(assignment) @",
        "((identifier) (number)) @x",
        "left: (identifier)",
        "(assignment)\n(expression_statement\n  (bogus))",
        "((identifier) @x (#eq @x))",
        "[]",
        r#""nope""#,
    ];
    let mut out = String::new();
    for source in sources {
        let error = Query::new(&grammar, source).unwrap_err();
        writeln!(out, "{:?} {}: {error}", error.kind, error.offset).unwrap();
    }
    expect![[r#"
        NodeType 13: invalid node type at 0:13: unknown node type `nonexistent`
        Field 12: invalid field at 0:12: unknown field `nope`
        Structure 1: impossible pattern at 0:1: `identifier` is a token and has no children
        Capture 23: invalid capture at 0:23: unknown capture `@y`
        Syntax 0: invalid syntax at 0:0: unclosed `(`
        Syntax 14: invalid syntax at 0:14: expected a capture name after `@`
        Structure 0: impossible pattern at 0:0: a group cannot have a field or a capture
        Structure 0: impossible pattern at 0:0: a top-level pattern cannot have a field
        NodeType 38: invalid node type at 2:3: unknown node type `bogus`
        Syntax 18: invalid syntax at 0:18: predicate `#eq` must end in `?` or `!`
        Syntax 0: invalid syntax at 0:0: empty alternation
        NodeType 0: invalid node type at 0:0: unknown node type "nope"
    "#]]
    .assert_eq(&out);
}

#[test]
fn rejects_incompatible_grammar() {
    let grammar = builder().abi_version(12).build().unwrap();
    let error = Query::new(&grammar, "(program)").unwrap_err();
    expect![[r#"incompatible language at 0:0: grammar `expr` has ABI version 12"#]]
        .assert_eq(&error.to_string());
}

#[test]
fn metadata() {
    let grammar = expr();
    let query = Query::new(
        &grammar,
        r#"
(assignment left: (identifier) @name right: (_)? @value) @assignment
((call function: (identifier) @fn) (#eq? @fn "print"))
[(number) (identifier)]+ @atom
(expression_statement . (_) @first)
((assignment) (expression_statement))
"#,
    )
    .unwrap();

    assert_eq!(query.pattern_count(), 5);
    let names = query.capture_names().iter().map(|name| &**name).collect::<Vec<_>>();
    assert_eq!(names, ["name", "value", "assignment", "fn", "atom", "first"]);
    assert_eq!(query.capture_index_for_name("fn"), Some(3));
    assert_eq!(query.capture_index_for_name("nope"), None);

    let starts = (0..5).map(|pattern| query.start_byte_for_pattern(pattern).unwrap()).collect::<Vec<_>>();
    assert_eq!(starts, [1, 70, 125, 156, 192]);
    assert_eq!(query.start_byte_for_pattern(5), None);

    use CaptureQuantifier as Q;
    assert_eq!(query.capture_quantifiers(0), [Q::One, Q::ZeroOrOne, Q::One]);
    assert_eq!(query.capture_quantifiers(1), [Q::Zero, Q::Zero, Q::Zero, Q::One]);
    assert_eq!(query.capture_quantifier(2, 4), Q::OneOrMore);
    assert_eq!(query.capture_quantifier(0, 4), Q::Zero);
    assert_eq!(query.capture_quantifier(3, 5), Q::One);

    let rooted = (0..5).map(|pattern| query.is_pattern_rooted(pattern)).collect::<Vec<_>>();
    assert_eq!(rooted, [true, true, false, true, false]);
    let non_local = (0..5).map(|pattern| query.is_pattern_non_local(pattern)).collect::<Vec<_>>();
    assert_eq!(non_local, [false, false, true, false, true]);

    assert_eq!(query.step_count(), 11);
    let guaranteed =
        (0..11).map(|step| query.is_pattern_guaranteed_at_step(step)).collect::<Vec<_>>();
    assert_eq!(
        guaranteed,
        [false, true, true, false, true, true, true, false, true, false, true]
    );
    assert!(!query.is_pattern_guaranteed_at_step(11));

    assert_eq!(query.string_count(), 2);
    assert_eq!(query.string_value(0), Some("eq?"));
    assert_eq!(query.string_value(1), Some("print"));
    assert_eq!(query.string_value(2), None);
    assert_eq!(
        query.predicates_for_pattern(1),
        [PredicateStep::String(0), PredicateStep::Capture(3), PredicateStep::String(1), PredicateStep::Done]
    );
    assert!(query.predicates_for_pattern(0).is_empty());
    assert_eq!(
        query.general_predicates(1),
        [QueryPredicate {
            operator: "eq?".into(),
            args: vec![QueryPredicateArg::Capture(3), QueryPredicateArg::String("print".into())],
        }]
    );
}

#[test]
fn comments_and_bare_predicate_arguments() {
    let grammar = expr();
    let query = Query::new(
        &grammar,
        "; leading comment\n((identifier) @id ; trailing\n (#set! kind local))",
    )
    .unwrap();
    assert_eq!(query.pattern_count(), 1);
    assert_eq!(
        query.general_predicates(0),
        [QueryPredicate {
            operator: "set!".into(),
            args: vec![QueryPredicateArg::String("kind".into()), QueryPredicateArg::String("local".into())],
        }]
    );
}

#[test]
fn byte_and_point_ranges() {
    let grammar = expr();
    let text = "x = 1;\ny = 2;\nz = 3;\n";
    let tree = parse(&grammar, text);
    let query = Query::new(&grammar, "(assignment left: (identifier) @name)").unwrap();

    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(7..13);
    expect![[r#"
        0: @name identifier "y"
    "#]]
    .assert_eq(&run(&query, &mut cursor, &tree, text));

    let mut cursor = QueryCursor::new();
    cursor.set_point_range(Point::new(2, 0)..Point::MAX);
    expect![[r#"
        0: @name identifier "z"
    "#]]
    .assert_eq(&run(&query, &mut cursor, &tree, text));
}

#[test]
fn match_limit() {
    let grammar = expr();
    let text = "x;\n".repeat(100);
    let tree = parse(&grammar, &text);
    let query = Query::new(&grammar, "(identifier) @id").unwrap();

    let mut cursor = QueryCursor::new();
    cursor.set_match_limit(10);
    assert_eq!(cursor.match_limit(), 10);
    let mut matches = cursor.exec(&query, tree.root_node());
    assert_eq!(matches.by_ref().count(), 10);
    assert!(matches.did_exceed_match_limit());
    assert!(cursor.did_exceed_match_limit());

    cursor.set_match_limit(u32::MAX);
    assert_eq!(cursor.exec(&query, tree.root_node()).count(), 100);
    assert!(!cursor.did_exceed_match_limit());
}

#[test]
fn captures_in_document_order() {
    let grammar = expr();
    let text = "x = y;\n";
    let tree = parse(&grammar, text);
    let query = Query::new(&grammar, "(assignment right: (_) @value)\n(identifier) @id").unwrap();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.exec(&query, tree.root_node());
    let mut out = String::new();
    while let Some((found, index)) = matches.next_capture() {
        let capture = found.captures[index];
        let name = &query.capture_names()[capture.index as usize];
        writeln!(out, "{} #{}: @{name} {:?}", found.pattern_index, found.id, capture.node.text(text)).unwrap();
    }
    expect![[r#"
        1 #1: @id "x"
        0 #0: @value "y"
        1 #2: @id "y"
    "#]]
    .assert_eq(&out);
}

#[test]
fn removed_matches_stop_reporting_captures() {
    let grammar = expr();
    let text = "x = 1;";
    let tree = parse(&grammar, text);
    let query = Query::new(&grammar, "(assignment left: (_) @left right: (_) @right)\n(number) @num").unwrap();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.exec(&query, tree.root_node());
    let (first, index) = matches.next_capture().unwrap();
    assert_eq!((first.pattern_index, index), (0, 0));
    matches.remove_match(first.id);
    let (next, index) = matches.next_capture().unwrap();
    assert_eq!((next.pattern_index, index), (1, 0));
    assert_eq!(next.captures[0].node.kind(), "number");
    assert!(matches.next_capture().is_none());
}

#[test]
fn disabled_captures_and_patterns() {
    let grammar = expr();
    let text = "x = 1;";
    let tree = parse(&grammar, text);
    let mut query =
        Query::new(&grammar, "(assignment left: (_) @left right: (_) @right)\n(number) @num").unwrap();
    query.disable_capture("right");
    query.disable_capture("unknown");
    query.disable_pattern(1);
    query.disable_pattern(7);
    expect![[r#"
        0: @left identifier "x"
    "#]]
    .assert_eq(&run(&query, &mut QueryCursor::new(), &tree, text));
}

#[test]
fn nodes_for_capture_index() {
    let grammar = expr();
    let tree = parse(&grammar, "f(1, 2, 3);");
    let query = Query::new(&grammar, "(call (number)+ @arg)").unwrap();
    let mut cursor = QueryCursor::new();
    let found = cursor.exec(&query, tree.root_node()).next().unwrap();
    let args = found.nodes_for_capture_index(0).map(|node| node.start_byte()).collect::<Vec<_>>();
    assert_eq!(args, [2, 5, 8]);
}

#[test]
fn other_grammars_never_match() {
    let grammar = expr();
    let tree = parse(&grammar, "x;");
    let query = Query::new(&expr(), "(identifier) @id").unwrap();
    assert_eq!(QueryCursor::new().exec(&query, tree.root_node()).count(), 0);
}

#[test]
fn execution_is_deterministic() {
    let grammar = expr();
    let text = "x = a + f(b, 1);\n// c\ny;\nz = g();\n";
    let tree = parse(&grammar, text);
    let query = Query::new(
        &grammar,
        "(identifier) @id\n(call function: (_) @fn)\n[(number) (comment)] @leaf\n((_) @a (_) @b)",
    )
    .unwrap();
    let mut cursor = QueryCursor::new();
    let first = run(&query, &mut cursor, &tree, text);
    assert_eq!(first, run(&query, &mut cursor, &tree, text));
    assert_eq!(first, run(&query, &mut QueryCursor::default(), &tree, text));
}

#[test]
fn starts_at_the_given_node() {
    let grammar = expr();
    let text = "x = 1;\ny = 2;";
    let tree = parse(&grammar, text);
    let query = Query::new(&grammar, "(identifier) @id").unwrap();
    let second = tree.root_node().named_child(1).unwrap();
    let mut cursor = QueryCursor::new();
    let ids = cursor
        .exec(&query, second)
        .map(|found| found.captures[0].node.text(text).to_owned())
        .collect::<Vec<_>>();
    assert_eq!(ids, ["y"]);
}
