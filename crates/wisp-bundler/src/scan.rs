//! Static scanning of transformed module code.
//!
//! After the transform pipeline every import has the registry form
//! `require("x")`, `require.ns("x")` or `require.lazy("x")`, so a single
//! token scan finds them. The same pass reads `module.hot.accept(...)` calls
//! into a declarative acceptance list.

use crate::lexer::{self, Token, TokenKind};

/// What one module's code references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Import specifiers in first-use order, without duplicates.
    pub specifiers: Vec<String>,
    /// Specifiers named by `module.hot.accept("x")`.
    pub accepted: Vec<String>,
    /// `module.hot.accept()` with no dependency list.
    pub self_accepting: bool,
}

pub fn scan(code: &str) -> ScanResult {
    let tokens = lexer::tokenize(code);
    let sig: Vec<&Token<'_>> = tokens.iter().filter(|t| !t.is_trivia()).collect();
    let mut result = ScanResult::default();

    let at = |n: usize| sig.get(n).copied();
    let punct = |n: usize, c: char| at(n).is_some_and(|t| t.is_punct(c));
    let ident = |n: usize, name: &str| at(n).is_some_and(|t| t.is_ident(name));

    for n in 0..sig.len() {
        let member_access = n > 0 && punct(n - 1, '.');
        if member_access {
            continue;
        }

        if ident(n, "require") {
            let call = if punct(n + 1, '(') {
                Some(n + 2)
            } else if punct(n + 1, '.')
                && (ident(n + 2, "ns") || ident(n + 2, "lazy"))
                && punct(n + 3, '(')
            {
                Some(n + 4)
            } else {
                None
            };
            let specifier = call
                .filter(|&arg| punct(arg + 1, ')'))
                .and_then(at)
                .and_then(Token::string_value);
            if let Some(specifier) = specifier {
                if !result.specifiers.contains(&specifier) {
                    result.specifiers.push(specifier);
                }
            }
            continue;
        }

        let hot_accept = ident(n, "module")
            && punct(n + 1, '.')
            && ident(n + 2, "hot")
            && punct(n + 3, '.')
            && ident(n + 4, "accept")
            && punct(n + 5, '(');
        if !hot_accept {
            continue;
        }
        let arg = n + 6;
        match at(arg) {
            Some(t) if t.kind == TokenKind::Str => {
                if let Some(specifier) = t.string_value() {
                    push_unique(&mut result.accepted, specifier);
                }
            }
            Some(t) if t.is_punct('[') => {
                let mut k = arg + 1;
                while let Some(t) = at(k) {
                    if t.is_punct(']') {
                        break;
                    }
                    if let Some(specifier) = t.string_value() {
                        push_unique(&mut result.accepted, specifier);
                    }
                    k += 1;
                }
            }
            // `accept()`, `accept(function ...)`, `accept(() => ...)`
            Some(_) => result.self_accepting = true,
            None => {}
        }
    }
    result
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
