use std::rc::Rc;

use crate::{
    ast::{BinaryOp, Branch, CallStmt, Expr, Literal, LoadTarget, Stmt, StmtKind, UnaryOp},
    block::{self, Node},
    diagnostics::Diagnostic,
    lexer::{Keyword, Lexer, Token, TokenKind},
};

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, Diagnostic> {
    let nodes = block::parse_source(source)?;
    parse_block(&nodes)
}

/// Classifies every node of one block. `elif`/`else:` siblings are folded
/// into the conditional that precedes them.
pub fn parse_block(nodes: &[Node]) -> Result<Vec<Stmt>, Diagnostic> {
    let mut statements = Vec::new();
    let mut idx = 0;
    while idx < nodes.len() {
        let node = &nodes[idx];
        let text = strip_comment(&node.text).trim();
        idx += 1;

        if let Some(condition) = conditional_header(text, "if") {
            let condition = parse_expression(condition).map_err(at_line(node.line))?;
            let mut branches = vec![Branch {
                condition,
                body: parse_child_block(node, "if")?,
            }];
            let mut else_branch = None;
            while let Some(next) = nodes.get(idx) {
                let next_text = strip_comment(&next.text).trim();
                if let Some(condition) = conditional_header(next_text, "elif") {
                    let condition = parse_expression(condition).map_err(at_line(next.line))?;
                    branches.push(Branch {
                        condition,
                        body: parse_child_block(next, "elif")?,
                    });
                    idx += 1;
                } else if next_text == "else:" {
                    else_branch = Some(parse_child_block(next, "else")?);
                    idx += 1;
                    break;
                } else {
                    break;
                }
            }
            statements.push(Stmt {
                kind: StmtKind::If {
                    branches,
                    else_branch,
                },
                line: node.line,
            });
            continue;
        }

        let stmt = parse_statement(node, text)?;
        statements.push(stmt);
    }
    Ok(statements)
}

fn parse_statement(node: &Node, text: &str) -> Result<Stmt, Diagnostic> {
    let line = node.line;
    let kind = if let Some(header) = function_header(text) {
        let (name, params, is_async) = header.map_err(at_line(line))?;
        let body = parse_child_block(node, "function")?;
        StmtKind::Function {
            name,
            params,
            body: Rc::from(body),
            is_async,
        }
    } else if let Some(call) = keyword_rest(text, "await").and_then(split_call) {
        StmtKind::Await(parse_call(call).map_err(at_line(line))?)
    } else if let Some(expr) = return_statement(text) {
        let value = expr.map(parse_expression).transpose().map_err(at_line(line))?;
        StmtKind::Return(value)
    } else if conditional_header(text, "elif").is_some() || text == "else:" {
        let keyword = if text == "else:" { "else" } else { "elif" };
        return Err(
            Diagnostic::parse(format!("`{keyword}` without a preceding `if`")).with_line(line),
        );
    } else if let Some(header) = for_header(text) {
        let (binding, start, end) = header.map_err(at_line(line))?;
        StmtKind::For {
            binding,
            start,
            end,
            body: parse_child_block(node, "for")?,
        }
    } else if let Some(condition) = conditional_header(text, "while") {
        StmtKind::While {
            condition: parse_expression(condition).map_err(at_line(line))?,
            body: parse_child_block(node, "while")?,
        }
    } else if let Some(("print", inner)) = split_call(text) {
        let args = split_arguments(inner)
            .iter()
            .map(|arg| parse_expression(arg))
            .collect::<Result<Vec<_>, _>>()
            .map_err(at_line(line))?;
        StmtKind::Print(args)
    } else if let Some((name, value)) = assignment(text) {
        StmtKind::Assign {
            name: name.to_string(),
            value: parse_expression(value).map_err(at_line(line))?,
        }
    } else if let Some(call) = split_call(text) {
        StmtKind::Call(parse_call(call).map_err(at_line(line))?)
    } else if let Some(load) = load_statement(text) {
        let (folder, target) = load.map_err(at_line(line))?;
        StmtKind::Load { folder, target }
    } else {
        return Err(Diagnostic::parse(format!("Unknown command: {text}")).with_line(line));
    };

    let opens_block = matches!(
        kind,
        StmtKind::Function { .. } | StmtKind::For { .. } | StmtKind::While { .. }
    );
    if !opens_block && node.children.is_some() {
        return Err(Diagnostic::parse(format!(
            "unexpected indented block after `{text}`"
        ))
        .with_line(line));
    }
    Ok(Stmt { kind, line })
}

fn parse_child_block(node: &Node, keyword: &str) -> Result<Vec<Stmt>, Diagnostic> {
    match &node.children {
        Some(children) => parse_block(children),
        None => Err(Diagnostic::parse(format!(
            "expected an indented block after `{keyword}`"
        ))
        .with_line(node.line)),
    }
}

fn at_line(line: usize) -> impl Fn(Diagnostic) -> Diagnostic {
    move |diag| {
        if diag.line.is_some() {
            diag
        } else {
            diag.with_line(line)
        }
    }
}

/// `keyword` followed by at least one space; returns the trimmed remainder.
fn keyword_rest<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// `if cond:` / `elif cond:` / `while cond:` → `cond`.
fn conditional_header<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let condition = keyword_rest(text, keyword)?.strip_suffix(':')?.trim();
    if condition.is_empty() {
        None
    } else {
        Some(condition)
    }
}

type FunctionHeader = (String, Vec<String>, bool);

fn function_header(text: &str) -> Option<Result<FunctionHeader, Diagnostic>> {
    let (rest, is_async) = match keyword_rest(text, "async") {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let rest = keyword_rest(rest, "function")?;
    let signature = rest.strip_suffix(':')?.trim_end();
    let (name, params) = signature.split_once('(')?;
    let name = name.trim_end();
    let params = params.strip_suffix(')')?;
    if !is_identifier(name) {
        return None;
    }
    let mut names = Vec::new();
    if !params.trim().is_empty() {
        for param in params.split(',').map(str::trim) {
            if !is_identifier(param) {
                return Some(Err(Diagnostic::parse(format!(
                    "invalid parameter name `{param}` in function `{name}`"
                ))));
            }
            names.push(param.to_string());
        }
    }
    Some(Ok((name.to_string(), names, is_async)))
}

fn return_statement(text: &str) -> Option<Option<&str>> {
    if text == "return" {
        return Some(None);
    }
    keyword_rest(text, "return").map(Some)
}

fn for_header(text: &str) -> Option<Result<(String, Expr, Expr), Diagnostic>> {
    let rest = keyword_rest(text, "for")?;
    let range = rest.strip_suffix("do")?;
    if !range.ends_with(char::is_whitespace) {
        return None;
    }
    let (binding, bounds) = range.split_once('=')?;
    Some(parse_for_range(binding.trim(), bounds))
}

fn parse_for_range(binding: &str, bounds: &str) -> Result<(String, Expr, Expr), Diagnostic> {
    if !is_identifier(binding) {
        return Err(Diagnostic::parse(format!(
            "invalid loop variable `{binding}`"
        )));
    }
    let bounds = split_arguments(bounds);
    let [start, end] = bounds.as_slice() else {
        return Err(Diagnostic::parse(
            "for loop expects `for name = start, end do`",
        ));
    };
    Ok((
        binding.to_string(),
        parse_expression(start)?,
        parse_expression(end)?,
    ))
}

fn assignment(text: &str) -> Option<(&str, &str)> {
    let end = text
        .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .unwrap_or(text.len());
    let name = &text[..end];
    if !is_identifier(name) {
        return None;
    }
    let rest = text[end..].trim_start().strip_prefix('=')?;
    if rest.starts_with('=') {
        return None;
    }
    let value = rest.trim();
    if value.is_empty() {
        None
    } else {
        Some((name, value))
    }
}

fn load_statement(text: &str) -> Option<Result<(String, LoadTarget), Diagnostic>> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let ["load", "from", folder, target] = words.as_slice() else {
        return None;
    };
    if !is_word(folder) {
        return Some(Err(Diagnostic::parse(format!(
            "invalid module folder `{folder}`"
        ))));
    }
    let target = if *target == "all" {
        LoadTarget::All
    } else {
        match target.split_once('.') {
            Some((stem, ext)) if is_word(stem) && is_word(ext) => {
                LoadTarget::File(target.to_string())
            }
            _ => {
                return Some(Err(Diagnostic::parse(format!(
                    "invalid module target `{target}`, expected `all` or a file name"
                ))));
            }
        }
    };
    Some(Ok((folder.to_string(), target)))
}

fn parse_call((callee, inner): (&str, &str)) -> Result<CallStmt, Diagnostic> {
    let args = split_arguments(inner)
        .iter()
        .map(|arg| parse_expression(arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CallStmt {
        callee: callee.to_string(),
        args,
    })
}

/// `name(inner)` spanning the whole text, with the opening parenthesis
/// matched by the final character.
fn split_call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    let name = &text[..open];
    if !is_identifier(name) || !text.ends_with(')') {
        return None;
    }
    let inner = &text[open + 1..text.len() - 1];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in inner.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth == 0 && quote.is_none() {
        Some((name, inner))
    } else {
        None
    }
}

/// Splits on commas that are outside every string literal and every
/// parenthesis or bracket pair. Pieces are trimmed; an empty tail is dropped.
pub fn split_arguments(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in text.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Cuts a trailing `//` or `#` comment that is not inside a string literal.
pub fn strip_comment(text: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev_slash = false;
    for (idx, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '#' => return &text[..idx],
            '/' if prev_slash => return &text[..idx - 1],
            _ => {}
        }
        prev_slash = ch == '/';
    }
    text
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

fn is_word(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|ch| ch.is_alphanumeric() || ch == '_')
}

pub fn parse_expression(source: &str) -> Result<Expr, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = ExprParser::new(tokens);
    let expr = parser.parse_expression()?;
    if !parser.check(TokenKind::Eof) {
        let token = parser.peek();
        return Err(parser.error(token, &format!("unexpected `{}` in `{source}`", token.lexeme)));
    }
    Ok(expr)
}

struct ExprParser {
    tokens: Vec<Token>,
    current: usize,
}

impl ExprParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches(TokenKind::DoublePipe) {
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches(TokenKind::DoubleAmpersand) {
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = if self.matches(TokenKind::EqualEqual) {
            Some(BinaryOp::Equal)
        } else if self.matches(TokenKind::BangEqual) {
            Some(BinaryOp::NotEqual)
        } else {
            None
        } {
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        while let Some(op) = if self.matches(TokenKind::LessEqual) {
            Some(BinaryOp::LessEqual)
        } else if self.matches(TokenKind::GreaterEqual) {
            Some(BinaryOp::GreaterEqual)
        } else if self.matches(TokenKind::Less) {
            Some(BinaryOp::Less)
        } else if self.matches(TokenKind::Greater) {
            Some(BinaryOp::Greater)
        } else {
            None
        } {
            let right = self.parse_term()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        while let Some(op) = if self.matches(TokenKind::Plus) {
            Some(BinaryOp::Add)
        } else if self.matches(TokenKind::Minus) {
            Some(BinaryOp::Sub)
        } else {
            None
        } {
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = if self.matches(TokenKind::Star) {
            Some(BinaryOp::Mul)
        } else if self.matches(TokenKind::Slash) {
            Some(BinaryOp::Div)
        } else if self.matches(TokenKind::Percent) {
            Some(BinaryOp::Mod)
        } else {
            None
        } {
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        if self.matches(TokenKind::Minus) {
            let right = self.parse_unary()?;
            Ok(Expr::Unary {
                op: UnaryOp::Negate,
                expr: Box::new(right),
            })
        } else if self.matches(TokenKind::Bang) {
            let right = self.parse_unary()?;
            Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(right),
            })
        } else if self.matches(TokenKind::Keyword(Keyword::Await)) {
            let right = self.parse_unary()?;
            Ok(Expr::Await(Box::new(right)))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(TokenKind::LParen) {
                let paren = self.advance();
                let Expr::Identifier(callee) = expr else {
                    return Err(self.error(&paren, "only named functions can be called"));
                };
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                expr = Expr::Call { callee, args };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket, "expected `]` after index")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Keyword(Keyword::True) => Ok(Expr::Literal(Literal::Bool(true))),
            TokenKind::Keyword(Keyword::False) => Ok(Expr::Literal(Literal::Bool(false))),
            TokenKind::Keyword(Keyword::Null) => Ok(Expr::Literal(Literal::Null)),
            TokenKind::Number => number_literal(&token)
                .map(Expr::Literal)
                .ok_or_else(|| self.error(&token, "invalid number literal")),
            TokenKind::String => Ok(Expr::Literal(Literal::String(token.lexeme.clone()))),
            TokenKind::Identifier => Ok(Expr::Identifier(token.lexeme.clone())),
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "expected `)` after expression")?;
                Ok(Expr::Group(Box::new(inner)))
            }
            TokenKind::Eof => Err(self.error(&token, "unexpected end of expression")),
            _ => Err(self.error(
                &token,
                &format!("unexpected `{}` in expression", token.lexeme),
            )),
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with `Eof`.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::parse(format!("{message} at column {}", token.offset + 1))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn number_literal(token: &Token) -> Option<Literal> {
    let lexeme = token.lexeme.as_str();
    if !lexeme.contains(['.', 'e', 'E']) {
        if let Ok(n) = lexeme.parse::<i64>() {
            return Some(Literal::Int(n));
        }
    }
    lexeme.parse::<f64>().ok().map(Literal::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<Stmt> {
        parse_program(source).expect("program should parse")
    }

    #[test]
    fn splits_only_top_level_commas() {
        assert_eq!(
            split_arguments(r#""a, b", f(1, 2), x[g(3, 4)] , 'c,d'"#),
            vec![r#""a, b""#, "f(1, 2)", "x[g(3, 4)]", "'c,d'"]
        );
        assert!(split_arguments("   ").is_empty());
    }

    #[test]
    fn strips_trailing_comments_outside_strings() {
        assert_eq!(strip_comment("x = 1 // note").trim(), "x = 1");
        assert_eq!(strip_comment("x = 2 # note").trim(), "x = 2");
        assert_eq!(strip_comment(r#"print("http://a#b")"#), r#"print("http://a#b")"#);
        assert_eq!(strip_comment("y = 4 / 2"), "y = 4 / 2");
    }

    #[test]
    fn classifies_statement_kinds() {
        let stmts = parse(
            "async function greet(name, greeting):\n    return greeting + name\n\
             await greet(\"a\", \"b\")\n\
             for i = 1, 3 do\n    print(i)\n\
             while false:\n    x = 1\n\
             total = 1 + 2\n\
             greet(\"x\")\n\
             load from modules all\n",
        );
        let kinds: Vec<&str> = stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Function { .. } => "function",
                StmtKind::Await(_) => "await",
                StmtKind::Return(_) => "return",
                StmtKind::If { .. } => "if",
                StmtKind::For { .. } => "for",
                StmtKind::While { .. } => "while",
                StmtKind::Print(_) => "print",
                StmtKind::Assign { .. } => "assign",
                StmtKind::Call(_) => "call",
                StmtKind::Load { .. } => "load",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["function", "await", "for", "while", "assign", "call", "load"]
        );
        match &stmts[0].kind {
            StmtKind::Function {
                name,
                params,
                is_async,
                body,
            } => {
                assert_eq!(name, "greet");
                assert_eq!(params, &vec!["name".to_string(), "greeting".to_string()]);
                assert!(*is_async);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected function, found {other:?}"),
        }
    }

    #[test]
    fn function_names_may_be_followed_by_spaces() {
        let stmts = parse("function f (a, b):\n    return a\nasync function  g ():\n    return 1\n");
        let headers: Vec<(&str, usize, bool)> = stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Function {
                    name,
                    params,
                    is_async,
                    ..
                } => (name.as_str(), params.len(), *is_async),
                other => panic!("expected function, found {other:?}"),
            })
            .collect();
        assert_eq!(headers, vec![("f", 2, false), ("g", 0, true)]);

        let err = parse_program("function f (a b):\n    return a\n").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Parse);
    }

    #[test]
    fn folds_elif_and_else_siblings() {
        let stmts = parse("if a:\n  x = 1\nelif b:\n  x = 2\nelif c:\n  x = 3\nelse:\n  x = 4\ny = 5\n");
        assert_eq!(stmts.len(), 2);
        match &stmts[0].kind {
            StmtKind::If {
                branches,
                else_branch,
            } => {
                assert_eq!(branches.len(), 3);
                assert_eq!(branches[1].condition, Expr::Identifier("b".into()));
                assert!(else_branch.is_some());
            }
            other => panic!("expected if, found {other:?}"),
        }
    }

    #[test]
    fn stray_else_is_rejected() {
        let err = parse_program("x = 1\nelse:\n  x = 2\n").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Parse);
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn equality_is_not_assignment() {
        let err = parse_program("a == b\n").unwrap_err();
        assert!(err.message.contains("Unknown command"), "{}", err.message);
    }

    #[test]
    fn block_headers_need_bodies() {
        let err = parse_program("while true:\nprint(1)\n").unwrap_err();
        assert!(err.message.contains("expected an indented block"));
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn plain_statements_cannot_own_blocks() {
        let err = parse_program("x = 1\n  y = 2\n").unwrap_err();
        assert!(err.message.contains("unexpected indented block"));
    }

    #[test]
    fn nested_errors_keep_their_own_line() {
        let err = parse_program("function f():\n    x = 1\n    x = (\n").unwrap_err();
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn expression_precedence() {
        let expr = parse_expression("1 + 2 * 3 == 7 && !done").unwrap();
        let expected = binary(
            BinaryOp::And,
            binary(
                BinaryOp::Equal,
                binary(
                    BinaryOp::Add,
                    Expr::Literal(Literal::Int(1)),
                    binary(
                        BinaryOp::Mul,
                        Expr::Literal(Literal::Int(2)),
                        Expr::Literal(Literal::Int(3)),
                    ),
                ),
                Expr::Literal(Literal::Int(7)),
            ),
            Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(Expr::Identifier("done".into())),
            },
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn calls_and_indexing() {
        let expr = parse_expression("get(array(1, 2), 0)[0]").unwrap();
        match expr {
            Expr::Index { target, .. } => match *target {
                Expr::Call { callee, args } => {
                    assert_eq!(callee, "get");
                    assert_eq!(args.len(), 2);
                }
                other => panic!("expected call, found {other:?}"),
            },
            other => panic!("expected index, found {other:?}"),
        }
        assert!(parse_expression("(f)(1)").is_err());
        assert!(parse_expression("1 +").is_err());
        assert!(parse_expression("1 2").is_err());
    }
}
