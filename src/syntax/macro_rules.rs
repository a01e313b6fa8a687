//! A small `macro_rules!` expander for item-producing fixture macros.
//!
//! Matchers may contain literal tokens and the fragments `$x:ident`,
//! `$x:tt` and `$x:literal`. Rules with repetitions or other fragment kinds
//! never match.

use rustc_hash::FxHashMap;

use super::lexer::{Token, TokenKind, tokenize};
use crate::base::TextRange;

/// Expand `input` against the rules in `rules` (the text inside the
/// `macro_rules!` braces). Returns the transcription of the first matching
/// rule.
pub fn expand_macro_rules(rules: &str, input: &str) -> Option<String> {
    let rule_tokens = tokenize(rules);
    let input_tokens = tokenize(input);

    let mut pos = 0;
    while pos < rule_tokens.len() {
        let (matcher, after_matcher) = group(&rule_tokens, pos)?;
        if rule_tokens.get(after_matcher).map(|t| t.kind) != Some(TokenKind::FatArrow) {
            return None;
        }
        let (transcriber, after_rule) = group(&rule_tokens, after_matcher + 1)?;
        pos = after_rule;
        while rule_tokens.get(pos).is_some_and(|t| matches!(t.kind, TokenKind::Semi | TokenKind::Comma)) {
            pos += 1;
        }

        let matcher = Source { text: rules, tokens: &rule_tokens[matcher.0..matcher.1] };
        let transcriber = Source { text: rules, tokens: &rule_tokens[transcriber.0..transcriber.1] };
        let input = Source { text: input, tokens: &input_tokens };
        if let Some(bindings) = match_rule(&matcher, &input) {
            return Some(transcribe(&transcriber, &bindings));
        }
    }
    None
}

#[derive(Clone, Copy)]
struct Source<'a> {
    text: &'a str,
    tokens: &'a [Token],
}

impl<'a> Source<'a> {
    fn kind(&self, idx: usize) -> Option<TokenKind> {
        self.tokens.get(idx).map(|token| token.kind)
    }

    fn text(&self, idx: usize) -> &'a str {
        let text: &'a str = self.text;
        match self.tokens.get(idx) {
            Some(token) => &text[token.range],
            None => "",
        }
    }

    fn span(&self, from: usize, to: usize) -> &'a str {
        let text: &'a str = self.text;
        match (self.tokens.get(from), to.checked_sub(1).and_then(|last| self.tokens.get(last))) {
            (Some(first), Some(last)) if to > from => {
                &text[TextRange::new(first.range.start(), last.range.end())]
            }
            _ => "",
        }
    }
}

/// The token range strictly inside the delimited group starting at `open`,
/// and the index just past its closing delimiter.
fn group(tokens: &[Token], open: usize) -> Option<((usize, usize), usize)> {
    if !tokens.get(open)?.kind.is_open_delim() {
        return None;
    }
    let close = group_end(tokens, open)?;
    Some(((open + 1, close), close + 1))
}

fn group_end(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        if token.kind.is_open_delim() {
            depth += 1;
        } else if token.kind.is_close_delim() {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

fn match_rule<'a>(matcher: &Source<'_>, input: &Source<'a>) -> Option<FxHashMap<String, &'a str>> {
    let mut bindings = FxHashMap::default();
    let mut m = 0;
    let mut i = 0;

    while m < matcher.tokens.len() {
        if matcher.kind(m) == Some(TokenKind::Dollar) {
            match matcher.kind(m + 1) {
                Some(TokenKind::Ident)
                    if matcher.kind(m + 2) == Some(TokenKind::Colon)
                        && matcher.kind(m + 3) == Some(TokenKind::Ident) =>
                {
                    let name = matcher.text(m + 1).to_owned();
                    let end = match_fragment(matcher.text(m + 3), input, i)?;
                    bindings.insert(name, input.span(i, end));
                    i = end;
                    m += 4;
                    continue;
                }
                // Repetitions and anything else unsupported
                _ => return None,
            }
        }
        if input.kind(i) != matcher.kind(m) || input.text(i) != matcher.text(m) {
            return None;
        }
        i += 1;
        m += 1;
    }

    (i == input.tokens.len()).then_some(bindings)
}

/// Index just past the fragment of kind `fragment` starting at `start`.
fn match_fragment(fragment: &str, input: &Source<'_>, start: usize) -> Option<usize> {
    let kind = input.kind(start)?;
    match fragment {
        "ident" if kind == TokenKind::Ident => Some(start + 1),
        "literal" => match kind {
            TokenKind::Str | TokenKind::Char | TokenKind::Number => Some(start + 1),
            TokenKind::Ident if matches!(input.text(start), "true" | "false") => Some(start + 1),
            TokenKind::Punct
                if input.text(start) == "-" && input.kind(start + 1) == Some(TokenKind::Number) =>
            {
                Some(start + 2)
            }
            _ => None,
        },
        "tt" if kind.is_open_delim() => group_end(input.tokens, start).map(|close| close + 1),
        "tt" if !kind.is_close_delim() => Some(start + 1),
        _ => None,
    }
}

fn transcribe(transcriber: &Source<'_>, bindings: &FxHashMap<String, &str>) -> String {
    let mut out = String::new();
    let mut idx = 0;
    while idx < transcriber.tokens.len() {
        if !out.is_empty() {
            out.push(' ');
        }
        if transcriber.kind(idx) == Some(TokenKind::Dollar)
            && transcriber.kind(idx + 1) == Some(TokenKind::Ident)
        {
            if let Some(value) = bindings.get(transcriber.text(idx + 1)) {
                out.push_str(value);
                idx += 2;
                continue;
            }
        }
        out.push_str(transcriber.text(idx));
        idx += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_ident_fragment() {
        let rules = "($name:ident) => { pub fn $name() {} };";
        assert_eq!(expand_macro_rules(rules, "foo").as_deref(), Some("pub fn foo ( ) { }"));
    }

    #[test]
    fn test_expand_picks_first_matching_rule() {
        let rules = "(unit $n:ident) => { struct $n; }; ($n:ident) => { fn $n() {} }";
        assert_eq!(expand_macro_rules(rules, "unit S").as_deref(), Some("struct S ;"));
        assert_eq!(expand_macro_rules(rules, "g").as_deref(), Some("fn g ( ) { }"));
    }

    #[test]
    fn test_expand_tt_and_literal() {
        let rules = "($t:tt, $l:literal) => { const X: $t = $l; }";
        assert_eq!(
            expand_macro_rules(rules, "u8, -1").as_deref(),
            Some("const X : u8 = -1 ;")
        );
    }

    #[test]
    fn test_expand_keeps_dollar_crate() {
        let rules = "() => { use $crate::inner::*; }";
        let expanded = expand_macro_rules(rules, "").unwrap();
        assert_eq!(expanded, "use $ crate :: inner :: * ;");
    }

    #[test]
    fn test_expand_rejects_repetitions_and_leftovers() {
        assert_eq!(expand_macro_rules("($($x:ident),*) => {}", "a, b"), None);
        assert_eq!(expand_macro_rules("($x:ident) => {}", "a b"), None);
        assert_eq!(expand_macro_rules("($x:expr) => {}", "1"), None);
    }
}
