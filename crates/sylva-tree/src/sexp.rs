use crate::{Children, Node};

struct Open<'tree> {
    children: Children<'tree>,
    visible: bool,
    /// Nothing visible has been written above this node.
    is_root: bool,
}

pub(crate) fn write_sexp(node: Node<'_>, out: &mut String) {
    let grammar = node.grammar();
    let mut stack = vec![open(node, None, true, out)];
    while let Some(top) = stack.last_mut() {
        match top.children.next_with_field() {
            Some((child, field)) => {
                let field = field.and_then(|field| grammar.field_name_for_id(field));
                let is_root = top.is_root && !top.visible && out.is_empty();
                let opened = open(child, field, is_root, out);
                stack.push(opened);
            }
            None => {
                if top.visible {
                    out.push(')');
                }
                stack.pop();
            }
        }
    }
}

fn open<'tree>(node: Node<'tree>, field: Option<&str>, is_root: bool, out: &mut String) -> Open<'tree> {
    let visible = node.is_named() || node.is_missing();
    if visible {
        if !is_root {
            out.push(' ');
        }
        if let Some(field) = field {
            out.push_str(field);
            out.push_str(": ");
        }
        out.push('(');
        if node.is_missing() {
            out.push_str("MISSING ");
            if node.is_named() {
                out.push_str(node.kind());
            } else {
                out.push('"');
                out.push_str(&node.kind().escape_default().to_string());
                out.push('"');
            }
        } else {
            out.push_str(node.kind());
        }
    }
    Open { children: node.children(), visible, is_root }
}
