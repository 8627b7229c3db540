//! Fixtures shared by the benchmarks.

use sylva::{Grammar, InputEdit, Point, Rule, TokenPattern};

/// Statements, calls and arithmetic, with line comments.
pub fn expression_grammar() -> Grammar {
    let expression = Rule::sym("_expression");
    Grammar::builder("expr")
        .token("number", TokenPattern::regex("[0-9]+"))
        .token("identifier", TokenPattern::regex("[a-z_][a-z0-9_]*"))
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
                Rule::field("operator", Rule::choice([Rule::literal("+"), Rule::literal("*")])),
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
        .build()
        .expect("benchmark grammar is valid")
}

/// `lines` statements of mixed shapes.
pub fn program(lines: usize) -> String {
    let mut text = String::new();
    for line in 0..lines {
        let statement = match line % 4 {
            0 => format!("value_{} = {line} + offset * 2;\n", line % 26),
            1 => format!("print(value, {line}, scale(x, y + 1));\n"),
            2 => "// keep going\n".to_owned(),
            _ => format!("total = total + f({line});\n"),
        };
        text.push_str(&statement);
    }
    text
}

/// Replaces `text[start..end]` with `inserted`, returning the new text and the edit.
pub fn edit(text: &str, start: usize, end: usize, inserted: &str) -> (String, InputEdit) {
    let new_text = format!("{}{inserted}{}", &text[..start], &text[end..]);
    let new_end = start + inserted.len();
    let edit = InputEdit {
        start_byte: start as u32,
        old_end_byte: end as u32,
        new_end_byte: new_end as u32,
        start_position: point_at(text, start),
        old_end_position: point_at(text, end),
        new_end_position: point_at(&new_text, new_end),
    };
    (new_text, edit)
}

fn point_at(text: &str, byte: usize) -> Point {
    let before = &text[..byte];
    let row = before.matches('\n').count();
    let column = before.rfind('\n').map_or(byte, |newline| byte - newline - 1);
    Point::new(row as u32, column as u32)
}
