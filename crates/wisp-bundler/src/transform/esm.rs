//! ES module syntax to the registry form understood by the chunk runtime.
//!
//! ```text
//! import a, { b as c } from "./x";   →  var __wisp_m0 = require.ns("./x");
//!                                       a → __wisp_m0.default, c → __wisp_m0.b
//! import * as ns from "./x";         →  var ns = require.ns("./x");
//! import "./x";                      →  require("./x");
//! import("./x")                      →  require.lazy("./x")
//! export const a = 1;                →  const a = 1;  + getter "a"
//! export default expr;               →  var __wisp_default = expr;
//! export { a as b } from "./x";      →  getter "b" reading the namespace
//! export * from "./x";               →  require.star(exports, require.ns("./x"));
//! ```
//!
//! Export getters and hoisted imports are emitted on the first line so the
//! rest of the module keeps its line numbers. Imported bindings stay live:
//! every reference is rewritten to a namespace member read. Local shadowing
//! of an imported name in a nested scope is not detected.

use indexmap::IndexMap;

use crate::lexer::{self, Token, TokenKind};

const DEFAULT_LOCAL: &str = "__wisp_default";

pub(crate) fn rewrite(src: &str) -> String {
    let tokens = lexer::tokenize(src);
    let mut rewriter = Rewriter {
        src,
        tokens: &tokens,
        sig: lexer::significant(&tokens),
        edits: Vec::new(),
        consumed: Vec::new(),
        imports: IndexMap::new(),
        header: Vec::new(),
        exports: Vec::new(),
        namespaces: 0,
        is_module: false,
    };
    rewriter.rewrite_statements();
    rewriter.rewrite_bindings();
    rewriter.finish()
}

enum Exported {
    /// A local binding, possibly itself an import.
    Local(String),
    Expr(String),
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

#[derive(Clone, Copy)]
struct Bracket {
    open: char,
    object: bool,
    pattern: bool,
}

struct Rewriter<'s, 't> {
    src: &'s str,
    tokens: &'t [Token<'s>],
    sig: Vec<(usize, &'t Token<'s>)>,
    edits: Vec<Edit>,
    /// Byte ranges of removed statements.
    consumed: Vec<(usize, usize)>,
    /// Local name → member expression.
    imports: IndexMap<String, String>,
    header: Vec<String>,
    exports: Vec<(String, Exported)>,
    namespaces: usize,
    is_module: bool,
}

impl<'s, 't> Rewriter<'s, 't> {
    fn tok(&self, n: usize) -> Option<&'t Token<'s>> {
        self.sig.get(n).map(|(_, t)| *t)
    }

    fn is_punct(&self, n: usize, c: char) -> bool {
        self.tok(n).is_some_and(|t| t.is_punct(c))
    }

    fn is_ident(&self, n: usize, name: &str) -> bool {
        self.tok(n).is_some_and(|t| t.is_ident(name))
    }

    fn prev_is_dot(&self, n: usize) -> bool {
        n > 0 && self.is_punct(n - 1, '.') && !(n > 1 && self.is_punct(n - 2, '.'))
    }

    fn line_break_before(&self, n: usize) -> bool {
        let (Some(&(prev, _)), Some(&(current, _))) = (
            n.checked_sub(1).and_then(|p| self.sig.get(p)),
            self.sig.get(n),
        ) else {
            return false;
        };
        self.tokens[prev + 1..current].iter().any(Token::has_line_break)
    }

    fn fresh_namespace(&mut self) -> String {
        let name = format!("__wisp_m{}", self.namespaces);
        self.namespaces += 1;
        name
    }

    fn remove(&mut self, start: usize, end: usize) {
        self.replace(start, end, String::new());
        self.consumed.push((start, end));
    }

    fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
        });
    }

    fn is_consumed(&self, offset: usize) -> bool {
        self.consumed
            .iter()
            .any(|&(start, end)| offset >= start && offset < end)
    }

    /// Index after the statement whose last token is `last`, and the byte
    /// offset where it ends. A trailing `;` belongs to the statement.
    fn statement_end(&self, last: usize) -> (usize, usize) {
        if self.is_punct(last + 1, ';') {
            (last + 2, self.sig[last + 1].1.end())
        } else {
            (last + 1, self.sig[last].1.end())
        }
    }

    fn rewrite_statements(&mut self) {
        let mut depth = 0i32;
        let mut n = 0;
        while let Some(token) = self.tok(n) {
            if token.is_ident("import") && !self.prev_is_dot(n) {
                if depth == 0 {
                    if let Some(next) = self.import_declaration(n) {
                        n = next;
                        continue;
                    }
                }
                if self.is_punct(n + 1, '(') {
                    self.replace(token.start, token.end(), "require.lazy");
                } else if self.is_punct(n + 1, '.') && self.is_ident(n + 2, "meta") {
                    let end = self.sig[n + 2].1.end();
                    self.replace(token.start, end, "module.meta");
                    n += 3;
                    continue;
                }
            }
            if token.is_ident("export") && depth == 0 && !self.prev_is_dot(n) {
                if let Some(next) = self.export_declaration(n) {
                    n = next;
                    continue;
                }
            }
            depth += brace_delta(token);
            n += 1;
        }
    }

    /// Returns the index to continue from, or `None` when `import` at `n` is
    /// not a declaration.
    fn import_declaration(&mut self, n: usize) -> Option<usize> {
        let start = self.sig[n].1.start;
        let mut k = n + 1;
        let first = self.tok(k)?;

        if first.kind == TokenKind::Str {
            let (next, end) = self.statement_end(k);
            self.header.push(format!("require({});", first.text));
            self.remove(start, end);
            self.is_module = true;
            return Some(next);
        }

        let mut default_local = None;
        let mut namespace = None;
        let mut named: Vec<(String, String)> = Vec::new();

        if first.kind == TokenKind::Ident && !first.is_ident("from") {
            default_local = Some(first.text.to_string());
            k += 1;
            if self.is_punct(k, ',') {
                k += 1;
            }
        }
        if self.is_punct(k, '*') {
            if !self.is_ident(k + 1, "as") {
                return None;
            }
            namespace = Some(ident_text(self.tok(k + 2)?)?.to_string());
            k += 3;
        } else if self.is_punct(k, '{') {
            k += 1;
            loop {
                if self.is_punct(k, '}') {
                    k += 1;
                    break;
                }
                let name_token = self.tok(k)?;
                let imported = match name_token.kind {
                    TokenKind::Ident => name_token.text.to_string(),
                    TokenKind::Str => name_token.string_value()?,
                    _ => return None,
                };
                k += 1;
                let local = if self.is_ident(k, "as") {
                    k += 2;
                    ident_text(self.tok(k - 1)?)?.to_string()
                } else {
                    imported.clone()
                };
                named.push((imported, local));
                if self.is_punct(k, ',') {
                    k += 1;
                }
            }
        }
        if default_local.is_none() && namespace.is_none() && named.is_empty() {
            return None;
        }
        if !self.is_ident(k, "from") {
            return None;
        }
        let source = self.tok(k + 1).filter(|t| t.kind == TokenKind::Str)?;
        let (next, end) = self.statement_end(k + 1);

        let var = match namespace {
            Some(ns) => ns,
            None => self.fresh_namespace(),
        };
        self.header
            .push(format!("var {var} = require.ns({});", source.text));
        if let Some(local) = default_local {
            self.imports.insert(local, format!("{var}.default"));
        }
        for (imported, local) in named {
            self.imports.insert(local, member(&var, &imported));
        }
        self.remove(start, end);
        self.is_module = true;
        Some(next)
    }

    fn export_declaration(&mut self, n: usize) -> Option<usize> {
        let export = self.sig[n].1;
        let next = self.tok(n + 1)?;

        if next.is_ident("default") {
            let after = self.tok(n + 2)?;
            self.is_module = true;
            match self.declaration_name(n + 2) {
                Some(Some(name)) => {
                    self.replace(export.start, after.start, "");
                    self.exports.push(("default".into(), Exported::Local(name)));
                }
                Some(None) => {
                    // Anonymous function or class declaration: make it an
                    // expression statement.
                    self.replace(export.start, after.start, format!("var {DEFAULT_LOCAL} = "));
                    if let Some(close) = self.declaration_body_end(n + 2) {
                        let end = self.sig[close].1.end();
                        if !self.is_punct(close + 1, ';') {
                            self.replace(end, end, ";");
                        }
                    }
                    self.exports
                        .push(("default".into(), Exported::Local(DEFAULT_LOCAL.into())));
                }
                None => {
                    self.replace(export.start, after.start, format!("var {DEFAULT_LOCAL} = "));
                    self.exports
                        .push(("default".into(), Exported::Local(DEFAULT_LOCAL.into())));
                }
            }
            return Some(n + 2);
        }

        if next.is_ident("var") || next.is_ident("let") || next.is_ident("const") {
            let names = self.declared_names(n + 2);
            self.replace(export.start, next.start, "");
            self.exports
                .extend(names.into_iter().map(|name| (name.clone(), Exported::Local(name))));
            self.is_module = true;
            return Some(n + 1);
        }

        if let Some(Some(name)) = self.declaration_name(n + 1) {
            self.replace(export.start, next.start, "");
            self.exports.push((name.clone(), Exported::Local(name)));
            self.is_module = true;
            return Some(n + 1);
        }

        if next.is_punct('*') {
            let mut k = n + 2;
            let alias = if self.is_ident(k, "as") {
                k += 2;
                Some(ident_text(self.tok(k - 1)?)?.to_string())
            } else {
                None
            };
            if !self.is_ident(k, "from") {
                return None;
            }
            let source = self.tok(k + 1).filter(|t| t.kind == TokenKind::Str)?;
            let (after, end) = self.statement_end(k + 1);
            match alias {
                Some(alias) => {
                    let var = self.fresh_namespace();
                    self.header
                        .push(format!("var {var} = require.ns({});", source.text));
                    self.exports.push((alias, Exported::Expr(var)));
                }
                None => self.header.push(format!(
                    "require.star(exports, require.ns({}));",
                    source.text
                )),
            }
            self.remove(export.start, end);
            self.is_module = true;
            return Some(after);
        }

        if next.is_punct('{') {
            let mut k = n + 2;
            let mut specifiers: Vec<(String, String)> = Vec::new();
            loop {
                if self.is_punct(k, '}') {
                    k += 1;
                    break;
                }
                let local = export_name(self.tok(k)?)?;
                k += 1;
                let exported = if self.is_ident(k, "as") {
                    k += 2;
                    export_name(self.tok(k - 1)?)?
                } else {
                    local.clone()
                };
                specifiers.push((local, exported));
                if self.is_punct(k, ',') {
                    k += 1;
                }
            }

            let (after, end) = if self.is_ident(k, "from") {
                let source = self.tok(k + 1).filter(|t| t.kind == TokenKind::Str)?;
                let var = self.fresh_namespace();
                self.header
                    .push(format!("var {var} = require.ns({});", source.text));
                for (local, exported) in specifiers {
                    self.exports
                        .push((exported, Exported::Expr(member(&var, &local))));
                }
                self.statement_end(k + 1)
            } else {
                for (local, exported) in specifiers {
                    self.exports.push((exported, Exported::Local(local)));
                }
                self.statement_end(k - 1)
            };
            self.remove(export.start, end);
            self.is_module = true;
            return Some(after);
        }

        None
    }

    /// For a `function`, `async function`, `function*` or `class` starting
    /// at `n`: `Some(Some(name))` when named, `Some(None)` when anonymous,
    /// `None` when `n` does not start such a declaration.
    fn declaration_name(&self, n: usize) -> Option<Option<String>> {
        let mut k = n;
        if self.is_ident(k, "async") && self.is_ident(k + 1, "function") && !self.line_break_before(k + 1)
        {
            k += 1;
        }
        if self.is_ident(k, "function") {
            k += 1;
            if self.is_punct(k, '*') {
                k += 1;
            }
        } else if self.is_ident(k, "class") {
            k += 1;
        } else {
            return None;
        }
        Some(
            self.tok(k)
                .filter(|t| t.kind == TokenKind::Ident && !t.is_ident("extends"))
                .map(|t| t.text.to_string()),
        )
    }

    /// Index of the `}` closing the body of the declaration at `n`.
    fn declaration_body_end(&self, n: usize) -> Option<usize> {
        let mut k = n;
        if self.is_ident(k, "class") {
            while !self.is_punct(k, '{') {
                self.tok(k)?;
                k += 1;
            }
            return self.matching(k);
        }
        while !self.is_punct(k, '(') {
            self.tok(k)?;
            k += 1;
        }
        let close_paren = self.matching(k)?;
        if self.is_punct(close_paren + 1, '{') {
            self.matching(close_paren + 1)
        } else {
            None
        }
    }

    /// Index of the bracket closing the one opened at `open`.
    fn matching(&self, open: usize) -> Option<usize> {
        let mut depth = 0i32;
        for k in open..self.sig.len() {
            let token = self.sig[k].1;
            depth += bracket_delta(token);
            if depth == 0 {
                return Some(k);
            }
        }
        None
    }

    /// Names bound by the declarators starting at `k`.
    fn declared_names(&self, mut k: usize) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(token) = self.tok(k) {
            if token.kind == TokenKind::Ident {
                names.push(token.text.to_string());
                k += 1;
            } else if token.is_punct('{') || token.is_punct('[') {
                let Some(close) = self.matching(k) else {
                    break;
                };
                names.extend(self.pattern_names(k, close));
                k = close + 1;
            } else {
                break;
            }
            if self.is_punct(k, '=') {
                k = self.skip_expression(k + 1);
            }
            if self.is_punct(k, ',') {
                k += 1;
            } else {
                break;
            }
        }
        names
    }

    /// Binding names inside a destructuring pattern.
    fn pattern_names(&self, open: usize, close: usize) -> Vec<String> {
        let mut names = Vec::new();
        let mut k = open + 1;
        while k < close {
            let token = self.sig[k].1;
            if token.is_punct('=') {
                k = self.skip_default(k + 1, close);
                continue;
            }
            let is_key = self.is_punct(k + 1, ':') || self.is_punct(k + 1, '(');
            if token.kind == TokenKind::Ident && !is_key {
                names.push(token.text.to_string());
            }
            k += 1;
        }
        names
    }

    /// Skips a default value inside a pattern, stopping at the `,` or bracket
    /// that ends it.
    fn skip_default(&self, mut k: usize, limit: usize) -> usize {
        let mut depth = 0i32;
        while k < limit {
            let token = self.sig[k].1;
            let delta = bracket_delta(token);
            if delta < 0 && depth == 0 {
                return k;
            }
            if token.is_punct(',') && depth == 0 {
                return k;
            }
            depth += delta;
            k += 1;
        }
        limit
    }

    /// Skips an initializer, stopping at a top-level `,` or `;`, a closing
    /// bracket, or a line break that cannot continue the expression.
    fn skip_expression(&self, mut k: usize) -> usize {
        let mut depth = 0i32;
        while let Some(token) = self.tok(k) {
            let delta = bracket_delta(token);
            if depth == 0 {
                if delta < 0 || token.is_punct(',') || token.is_punct(';') {
                    return k;
                }
                let prev = self.sig[k - 1].1;
                if self.line_break_before(k) && ends_expression(prev) && starts_statement(token) {
                    return k;
                }
            }
            depth += delta;
            k += 1;
        }
        k
    }

    fn rewrite_bindings(&mut self) {
        if self.imports.is_empty() {
            return;
        }
        let mut stack: Vec<Bracket> = Vec::new();
        let mut edits = Vec::new();

        for n in 0..self.sig.len() {
            let token = self.sig[n].1;
            let prev = n.checked_sub(1).and_then(|p| self.tok(p));

            match token.kind {
                TokenKind::Punct if token.is_punct('{') || token.is_punct('[') => {
                    let declares = prev.is_some_and(|p| {
                        p.is_ident("var") || p.is_ident("let") || p.is_ident("const")
                    });
                    let parent_pattern = stack.last().is_some_and(|b| b.pattern);
                    stack.push(Bracket {
                        open: if token.is_punct('{') { '{' } else { '[' },
                        object: token.is_punct('{') && opens_object(prev),
                        pattern: declares || parent_pattern,
                    });
                    continue;
                }
                TokenKind::Punct if token.is_punct('(') => {
                    stack.push(Bracket {
                        open: '(',
                        object: false,
                        pattern: false,
                    });
                    continue;
                }
                TokenKind::Punct if token.is_punct('}') || token.is_punct(']') || token.is_punct(')') => {
                    stack.pop();
                    continue;
                }
                TokenKind::Template => {
                    if token.text.starts_with('}') {
                        stack.pop();
                    }
                    if token.text.ends_with("${") {
                        stack.push(Bracket {
                            open: '$',
                            object: false,
                            pattern: false,
                        });
                    }
                    continue;
                }
                TokenKind::Ident => {}
                _ => continue,
            }

            let Some(replacement) = self.imports.get(token.text) else {
                continue;
            };
            if self.is_consumed(token.start) || self.prev_is_dot(n) {
                continue;
            }
            if prev.is_some_and(|p| {
                ["function", "class", "var", "let", "const"]
                    .iter()
                    .any(|kw| p.is_ident(kw))
            }) {
                continue;
            }
            let top = stack.last().copied();
            if top.is_some_and(|b| b.pattern) {
                continue;
            }
            let in_object = top.is_some_and(|b| b.open == '{' && b.object);
            let property_position = prev.is_some_and(|p| p.is_punct('{') || p.is_punct(','));
            if in_object && property_position {
                if self.is_punct(n + 1, ',') || self.is_punct(n + 1, '}') {
                    edits.push(Edit {
                        start: token.start,
                        end: token.end(),
                        text: format!("{}: {replacement}", token.text),
                    });
                }
                // Otherwise a key or a method name.
                continue;
            }
            edits.push(Edit {
                start: token.start,
                end: token.end(),
                text: replacement.clone(),
            });
        }
        self.edits.extend(edits);
    }

    fn finish(mut self) -> String {
        self.edits.sort_by_key(|edit| (edit.start, edit.end));
        let mut body = String::with_capacity(self.src.len() + 64);
        let mut copied = 0;
        for edit in &self.edits {
            if edit.start < copied {
                continue;
            }
            body.push_str(&self.src[copied..edit.start]);
            body.push_str(&edit.text);
            copied = edit.end;
        }
        body.push_str(&self.src[copied..]);

        if !self.is_module {
            return body;
        }

        let mut header = String::from("\"use strict\";");
        if !self.exports.is_empty() {
            let getters: Vec<String> = self
                .exports
                .iter()
                .map(|(name, exported)| {
                    let expr = match exported {
                        Exported::Local(local) => {
                            self.imports.get(local).cloned().unwrap_or_else(|| local.clone())
                        }
                        Exported::Expr(expr) => expr.clone(),
                    };
                    format!("{}: function () {{ return {expr}; }}", quote(name))
                })
                .collect();
            header.push_str(&format!(" require.define(exports, {{{}}});", getters.join(", ")));
        }
        for line in &self.header {
            header.push(' ');
            header.push_str(line);
        }
        header.push(' ');
        header + &body
    }
}

fn brace_delta(token: &Token<'_>) -> i32 {
    match token.kind {
        TokenKind::Punct if token.is_punct('{') => 1,
        TokenKind::Punct if token.is_punct('}') => -1,
        TokenKind::Template => {
            i32::from(token.text.ends_with("${")) - i32::from(token.text.starts_with('}'))
        }
        _ => 0,
    }
}

fn bracket_delta(token: &Token<'_>) -> i32 {
    match token.kind {
        TokenKind::Punct if token.is_punct('(') || token.is_punct('[') => 1,
        TokenKind::Punct if token.is_punct(')') || token.is_punct(']') => -1,
        _ => brace_delta(token),
    }
}

/// Whether a `{` after `prev` starts an object literal rather than a block.
fn opens_object(prev: Option<&Token<'_>>) -> bool {
    let Some(prev) = prev else {
        return false;
    };
    match prev.kind {
        TokenKind::Punct => ['(', ',', '=', ':', '[', '?', '!', '&', '|', '+', '-', '<', '>']
            .iter()
            .any(|&c| prev.is_punct(c)),
        TokenKind::Ident => ["return", "typeof", "in", "of", "yield", "await", "case"]
            .iter()
            .any(|kw| prev.is_ident(kw)),
        TokenKind::Template => prev.text.ends_with("${"),
        _ => false,
    }
}

fn ends_expression(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Ident | TokenKind::Number | TokenKind::Str | TokenKind::Regex => true,
        TokenKind::Template => token.text.ends_with('`'),
        TokenKind::Punct => token.is_punct(')') || token.is_punct(']') || token.is_punct('}'),
        _ => false,
    }
}

fn starts_statement(token: &Token<'_>) -> bool {
    matches!(
        token.kind,
        TokenKind::Ident | TokenKind::Number | TokenKind::Str
    ) || (token.kind == TokenKind::Template && token.text.starts_with('`'))
}

fn ident_text<'a>(token: &Token<'a>) -> Option<&'a str> {
    (token.kind == TokenKind::Ident).then_some(token.text)
}

fn export_name(token: &Token<'_>) -> Option<String> {
    match token.kind {
        TokenKind::Ident => Some(token.text.to_string()),
        TokenKind::Str => token.string_value(),
        _ => None,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(lexer::is_ident_start) && chars.all(lexer::is_ident_part)
}

fn member(object: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", quote(name))
    }
}

fn quote(name: &str) -> String {
    serde_json::Value::String(name.to_string()).to_string()
}
