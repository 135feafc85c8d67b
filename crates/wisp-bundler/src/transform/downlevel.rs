//! The `downlevel` stage: module syntax, constant replacement and block
//! scoped declarations.

use indexmap::IndexMap;
use wisp_config::EsTarget;

use super::esm;
use crate::lexer::{self, Token, TokenKind};

/// `define` entries split into dotted paths, longest first so that
/// `process.env.NODE_ENV` wins over a shorter `process.env`.
#[derive(Debug, Clone, Default)]
pub struct DefineTable {
    entries: Vec<(Vec<String>, String)>,
}

impl DefineTable {
    pub fn new(defines: &IndexMap<String, String>) -> Self {
        let mut entries: Vec<(Vec<String>, String)> = defines
            .iter()
            .map(|(key, value)| (key.split('.').map(str::to_string).collect(), value.clone()))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn run(src: &str, target: EsTarget, defines: &DefineTable) -> String {
    let code = esm::rewrite(src);
    let code = replace_defines(&code, defines);
    match target {
        EsTarget::Es5 => lower_block_scoped(&code),
        EsTarget::Es2015 => code,
    }
}

fn replace_defines(src: &str, defines: &DefineTable) -> String {
    if defines.is_empty() {
        return src.to_string();
    }
    let tokens = lexer::tokenize(src);
    let sig = lexer::significant(&tokens);
    let mut out = String::with_capacity(src.len());
    let mut copied = 0;
    let mut i = 0;

    while i < sig.len() {
        let token = sig[i].1;
        let member_access = i > 0 && sig[i - 1].1.is_punct('.');
        if token.kind != TokenKind::Ident || member_access {
            i += 1;
            continue;
        }
        let matched = defines
            .entries
            .iter()
            .find(|(parts, _)| matches_path(&sig[i..], parts));
        match matched {
            Some((parts, value)) => {
                let last = sig[i + parts.len() * 2 - 2].1;
                // Leave assignment targets alone.
                let assigned = sig
                    .get(i + parts.len() * 2 - 1)
                    .is_some_and(|(_, next)| next.is_punct('='))
                    && !sig
                        .get(i + parts.len() * 2)
                        .is_some_and(|(_, next)| next.is_punct('='));
                if assigned {
                    i += 1;
                    continue;
                }
                out.push_str(&src[copied..token.start]);
                out.push_str(value);
                copied = last.end();
                i += parts.len() * 2 - 1;
            }
            None => i += 1,
        }
    }
    out.push_str(&src[copied..]);
    out
}

/// `a . b . c` starting at `tokens[0]`.
fn matches_path(tokens: &[(usize, &Token<'_>)], parts: &[String]) -> bool {
    if tokens.len() < parts.len() * 2 - 1 {
        return false;
    }
    let all_parts = parts.iter().enumerate().all(|(n, part)| {
        let ident = tokens[n * 2].1;
        let dot_ok = n == 0 || tokens[n * 2 - 1].1.is_punct('.');
        dot_ok && ident.kind == TokenKind::Ident && ident.text == part
    });
    // `process.env` must not match the head of `process.env.HOME`.
    let continues = tokens
        .get(parts.len() * 2 - 1)
        .is_some_and(|(_, next)| next.is_punct('.'))
        && tokens
            .get(parts.len() * 2)
            .is_some_and(|(_, t)| t.kind == TokenKind::Ident);
    all_parts && !continues
}

/// Rewrites `let`/`const` declarations to `var`.
///
/// Only the keyword is replaced; per-iteration loop bindings and temporal
/// dead zones are not emulated.
fn lower_block_scoped(src: &str) -> String {
    let tokens = lexer::tokenize(src);
    let sig = lexer::significant(&tokens);
    let mut out = String::with_capacity(src.len());
    let mut copied = 0;

    for (n, &(index, token)) in sig.iter().enumerate() {
        if !(token.is_ident("let") || token.is_ident("const")) {
            continue;
        }
        let declares = sig.get(n + 1).is_some_and(|(_, next)| {
            next.kind == TokenKind::Ident || next.is_punct('{') || next.is_punct('[')
        });
        let statement_start = match n.checked_sub(1).map(|p| sig[p]) {
            None => true,
            Some((prev_index, prev)) => {
                prev.is_punct(';')
                    || prev.is_punct('{')
                    || prev.is_punct('}')
                    || prev.is_punct('(')
                    || prev.is_punct(')')
                    || prev.is_ident("else")
                    || prev.is_ident("do")
                    || tokens[prev_index + 1..index].iter().any(Token::has_line_break)
            }
        };
        if declares && statement_start {
            out.push_str(&src[copied..token.start]);
            out.push_str("var");
            copied = token.end();
        }
    }
    out.push_str(&src[copied..]);
    out
}
