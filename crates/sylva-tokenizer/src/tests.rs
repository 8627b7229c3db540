use expect_test::expect;
use sylva_grammar::{END_SYMBOL, ERROR_SYMBOL, Grammar, Rule, TokenPattern};
use sylva_tree::{Length, Point, Range};

use crate::{Lexer, SourceText, Token};

fn grammar() -> Grammar {
    Grammar::builder("words")
        .token("identifier", TokenPattern::regex("[a-z_]+"))
        .token("number", TokenPattern::regex("[0-9]+"))
        .token("comment", TokenPattern::regex("#[^\n]*"))
        .rule(
            "program",
            Rule::repeat(Rule::choice([
                Rule::sym("identifier"),
                Rule::sym("number"),
                Rule::literal("if"),
                Rule::literal("=="),
                Rule::literal("="),
            ])),
        )
        .extra("comment")
        .build()
        .unwrap()
}

fn tokens(lexer: &Lexer<'_>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut position = Length::ZERO;
    loop {
        let token = lexer.lex(position);
        tokens.push(token);
        if token.is_end() {
            return tokens;
        }
        position = token.end();
    }
}

fn render(grammar: &Grammar, source: &SourceText, tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| {
            let start = source.to_utf8(token.start().bytes.into());
            let end = source.to_utf8(token.end().bytes.into());
            format!(
                "{} {:?} {:?} +{}{}",
                grammar.symbol_name(token.symbol).unwrap(),
                &source.as_str()[start..end],
                token.start().extent,
                token.lookahead_bytes,
                if token.is_extra { " extra" } else { "" },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn longest_match_then_literals_win() {
    let grammar = grammar();
    let source = SourceText::from("if iffy == x=1 # note\n  ?");
    let lexer = Lexer::new(&grammar, &source, &[]);
    let tokens = tokens(&lexer);

    expect![[r##"
        if "if" (0, 0) +1
        identifier "iffy" (0, 3) +1
        == "==" (0, 8) +0
        identifier "x" (0, 11) +1
        = "=" (0, 12) +1
        number "1" (0, 13) +1
        comment "# note" (0, 15) +1 extra
        ERROR "?" (1, 2) +0
        end "" (1, 3) +0"##]]
    .assert_eq(&render(&grammar, &source, &tokens));
    assert!(tokens[7].is_unknown());
    assert_eq!(tokens[7].symbol, ERROR_SYMBOL);
}

#[test]
fn trailing_padding_belongs_to_the_end_token() {
    let grammar = grammar();
    let source = SourceText::from("a \n ");
    let lexer = Lexer::new(&grammar, &source, &[]);
    let end = lexer.lex(Length::new(1, Point::new(0, 1)));

    assert_eq!(end.symbol, END_SYMBOL);
    assert_eq!(end.padding, Length::new(3, Point::new(1, 1)));
    assert_eq!(end.start(), Length::new(4, Point::new(1, 1)));
}

#[test]
fn gaps_between_included_ranges_are_skipped() {
    let grammar = grammar();
    let source = SourceText::from("<a>b<c>d</c>");
    let ranges = [
        Range::new(Length::new(1, Point::new(0, 1)), Length::new(2, Point::new(0, 2))),
        Range::new(Length::new(5, Point::new(0, 5)), Length::new(6, Point::new(0, 6))),
    ];
    let lexer = Lexer::new(&grammar, &source, &ranges);
    let tokens = tokens(&lexer);

    expect![[r#"
        identifier "a" (0, 1) +0
        identifier "c" (0, 5) +0
        end "" (0, 6) +0"#]]
    .assert_eq(&render(&grammar, &source, &tokens));
    assert_eq!(tokens[1].padding, Length::new(3, Point::new(0, 3)));
}

#[test]
fn utf16_positions_count_encoded_bytes() {
    let grammar = grammar();
    let units: Vec<u16> = "é = 12".encode_utf16().collect();
    let source = SourceText::from_utf16(&units);
    let lexer = Lexer::new(&grammar, &source, &[]);
    let tokens = tokens(&lexer);

    let starts = tokens.iter().map(|token| u32::from(token.start().bytes)).collect::<Vec<_>>();
    assert_eq!(starts, [0, 4, 8, 12]);
    assert!(tokens[0].is_unknown());
    assert_eq!(tokens[0].size, Length::new(2, Point::new(0, 2)));
    assert_eq!(tokens[2].size, Length::new(4, Point::new(0, 4)));
    assert!(tokens[3].is_end());
}
