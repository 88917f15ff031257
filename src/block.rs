//! Indentation-driven grouping of raw source lines into a tree of nodes.
//!
//! This pass knows nothing about statement syntax: it only decides which
//! lines belong to which block. Classification into statements happens in
//! [`crate::parser`].

use crate::diagnostics::Diagnostic;

/// One non-blank, non-comment source line and the block nested under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Line text with indentation and surrounding whitespace removed.
    pub text: String,
    pub children: Option<Vec<Node>>,
    /// 1-based line number in the source text.
    pub line: usize,
}

impl Node {
    pub fn new(text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            children: None,
            line,
        }
    }
}

pub fn parse_source(source: &str) -> Result<Vec<Node>, Diagnostic> {
    let lines: Vec<&str> = source.lines().collect();
    let (nodes, _) = parse_lines(&lines, 0, 0)?;
    Ok(nodes)
}

/// Parses the block whose members sit at exactly `base_indent` spaces,
/// starting at `start`. Returns the block and the index of the first line
/// that was not consumed.
pub fn parse_lines(
    lines: &[&str],
    base_indent: usize,
    start: usize,
) -> Result<(Vec<Node>, usize), Diagnostic> {
    let mut block: Vec<Node> = Vec::new();
    let mut idx = start;
    while idx < lines.len() {
        let line = lines[idx];
        if is_blank_or_comment(line) {
            idx += 1;
            continue;
        }
        let indent = indentation(line);
        if indent < base_indent {
            break;
        }
        if indent > base_indent {
            let Some(owner) = block.last_mut() else {
                return Err(Diagnostic::parse("inconsistent indentation").with_line(idx + 1));
            };
            if owner.children.is_some() {
                return Err(Diagnostic::parse("inconsistent indentation").with_line(idx + 1));
            }
            let (nested, next) = parse_lines(lines, indent, idx)?;
            owner.children = Some(nested);
            idx = next;
            continue;
        }
        block.push(Node::new(line.trim(), idx + 1));
        idx += 1;
    }
    Ok((block, idx))
}

/// Inverse of [`parse_source`] for normalized trees: four spaces per level.
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_into(nodes, 0, &mut out);
    out
}

fn render_into(nodes: &[Node], depth: usize, out: &mut String) {
    for node in nodes {
        out.push_str(&" ".repeat(depth * 4));
        out.push_str(&node.text);
        out.push('\n');
        if let Some(children) = &node.children {
            render_into(children, depth + 1, out);
        }
    }
}

/// Leading spaces only; tabs are not expanded.
fn indentation(line: &str) -> usize {
    line.chars().take_while(|ch| *ch == ' ').count()
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nests_by_indentation() {
        let nodes = parse_source(
            "function f(a):\n    if a:\n        print(a)\n    return a\nf(1)\n",
        )
        .unwrap();
        assert_eq!(nodes.len(), 2);
        let body = nodes[0].children.as_ref().unwrap();
        assert_eq!(body[0].text, "if a:");
        assert_eq!(body[0].children.as_ref().unwrap()[0].text, "print(a)");
        assert_eq!(body[0].children.as_ref().unwrap()[0].line, 3);
        assert_eq!(body[1].text, "return a");
        assert_eq!(nodes[1].text, "f(1)");
        assert!(nodes[1].children.is_none());
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let nodes = parse_source("# header\n\nx = 1\n   // stray comment\ny = 2\n").unwrap();
        let texts: Vec<_> = nodes.iter().map(|n| (n.text.as_str(), n.line)).collect();
        assert_eq!(texts, vec![("x = 1", 3), ("y = 2", 5)]);
    }

    #[test]
    fn leading_indented_line_is_an_error() {
        let err = parse_source("\n   x = 1\n").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.message.contains("inconsistent indentation"));
    }

    #[test]
    fn dedent_to_unknown_level_is_an_error() {
        let err = parse_source("if x:\n        a = 1\n    b = 2\n").unwrap_err();
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn render_then_parse_is_stable() {
        let source = "while i < 3:\n  i = i + 1\n  if i == 2:\n     print(i)\nprint(\"done\")\n";
        let first = parse_source(source).unwrap();
        let rendered = render(&first);
        let second = parse_source(&rendered).unwrap();
        assert_eq!(render(&second), rendered);
        assert_eq!(parse_source(&render(&second)).unwrap(), second);
    }
}
