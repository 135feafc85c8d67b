//! Production compaction of chunk content.
//!
//! [`minify`] removes comments and collapses whitespace on the token stream.
//! A line break in the source stays a line break in the output, so automatic
//! semicolon insertion sees exactly the statements it saw before. Output is
//! never longer than input.

use crate::lexer::{self, Token, TokenKind};

pub fn minify(src: &str) -> String {
    let tokens = lexer::tokenize(src);
    let mut out = String::with_capacity(src.len());
    let mut prev: Option<&Token<'_>> = None;
    let mut line_break = false;
    let mut separated = false;

    for token in &tokens {
        if token.is_trivia() {
            separated = true;
            line_break |= token.has_line_break();
            continue;
        }
        if let Some(prev) = prev {
            if line_break {
                out.push('\n');
            } else if separated && needs_space(prev, token) {
                out.push(' ');
            }
        }
        out.push_str(token.text);
        prev = Some(token);
        line_break = false;
        separated = false;
    }
    out
}

/// Whether gluing `next` directly onto `prev` would lex differently.
fn needs_space(prev: &Token<'_>, next: &Token<'_>) -> bool {
    let (Some(last), Some(first)) = (prev.text.chars().last(), next.text.chars().next()) else {
        return false;
    };
    let wordy = |c: char| lexer::is_ident_part(c) || c == '\\';
    (wordy(last) && wordy(first))
        || (last == first && matches!(last, '+' | '-' | '/'))
        || (last == '/' && first == '*')
        || (last == '.' && first.is_ascii_digit())
        || (prev.kind == TokenKind::Number && first == '.')
}

/// Remove `console.*(...)` calls.
///
/// A call that forms a whole statement is deleted with its semicolon; one used
/// as an expression becomes `void 0`.
pub fn drop_console(src: &str) -> String {
    let tokens = lexer::tokenize(src);
    let sig = lexer::significant(&tokens);
    let mut edits: Vec<(usize, usize, &str)> = Vec::new();

    let mut n = 0;
    while n < sig.len() {
        let at = |k: usize| sig.get(k).map(|(_, t)| *t);
        let is_call = at(n).is_some_and(|t| t.is_ident("console"))
            && !(n > 0 && at(n - 1).is_some_and(|t| t.is_punct('.')))
            && at(n + 1).is_some_and(|t| t.is_punct('.'))
            && at(n + 2).is_some_and(|t| t.kind == TokenKind::Ident)
            && at(n + 3).is_some_and(|t| t.is_punct('('));
        if !is_call {
            n += 1;
            continue;
        }
        let Some(close) = matching_paren(&sig, n + 3) else {
            break;
        };

        let statement_start = n == 0
            || at(n - 1).is_some_and(|t| t.is_punct(';') || t.is_punct('{') || t.is_punct('}'));
        let semicolon = at(close + 1).filter(|t| t.is_punct(';'));
        let start = sig[n].1.start;
        match semicolon {
            Some(semi) if statement_start => edits.push((start, semi.end(), "")),
            _ => edits.push((start, sig[close].1.end(), "void 0")),
        }
        n = close + 1;
    }

    if edits.is_empty() {
        return src.to_string();
    }
    let mut out = String::with_capacity(src.len());
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        out.push_str(&src[cursor..start]);
        out.push_str(replacement);
        cursor = end;
    }
    out.push_str(&src[cursor..]);
    out
}

/// Index in `sig` of the `)` closing the `(` at `open`.
fn matching_paren(sig: &[(usize, &Token<'_>)], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (k, (_, token)) in sig.iter().enumerate().skip(open) {
        if token.kind != TokenKind::Punct {
            continue;
        }
        match token.text {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(k);
                }
            }
            _ => {}
        }
    }
    None
}
