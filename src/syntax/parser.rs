//! Recursive-descent parser from tokens to [`ItemTree`].
//!
//! Only item structure is parsed. Function bodies, types and initializers are
//! skipped as balanced token runs.

use std::sync::Arc;

use super::lexer::{Token, TokenKind, tokenize};
use super::{
    CfgExpr, ImportAlias, Item, ItemAttrs, ItemKind, ItemTree, MacroCall, RawVisibility,
    StructShape, SyntaxError, UseTree, UseTreeKind, Variant,
};
use crate::base::{Name, TextRange};

/// Parse the item structure of `text`.
///
/// Never fails: malformed items are skipped and recorded in
/// [`ItemTree::errors`].
pub fn parse_item_tree(text: &str) -> ItemTree {
    let mut parser = Parser { text, tokens: tokenize(text), pos: 0, errors: Vec::new() };
    let items = parser.parse_items(false);
    ItemTree { items, errors: parser.errors }
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

// ============================================================================
// Token cursor
// ============================================================================

impl<'a> Parser<'a> {
    fn nth(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|token| token.kind)
    }

    fn current(&self) -> Option<TokenKind> {
        self.nth(0)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current() == Some(kind)
    }

    fn nth_text(&self, n: usize) -> &'a str {
        let text: &'a str = self.text;
        match self.tokens.get(self.pos + n) {
            Some(token) => &text[token.range],
            None => "",
        }
    }

    fn at_kw(&self, kw: &str) -> bool {
        self.nth_is_kw(0, kw)
    }

    fn nth_is_kw(&self, n: usize, kw: &str) -> bool {
        self.nth(n) == Some(TokenKind::Ident) && self.nth_text(n) == kw
    }

    fn bump(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<Name> {
        if !self.at(TokenKind::Ident) {
            return None;
        }
        let text = self.nth_text(0);
        self.bump();
        Some(Name::new(text.strip_prefix("r#").unwrap_or(text)))
    }

    fn range_from(&self, start: usize) -> TextRange {
        let first = self.tokens.get(start).or(self.tokens.last());
        let last = self.tokens.get(self.pos.saturating_sub(1)).or(first);
        match (first, last) {
            (Some(first), Some(last)) if last.range.end() >= first.range.start() => {
                TextRange::new(first.range.start(), last.range.end())
            }
            (Some(first), _) => first.range,
            _ => TextRange::default(),
        }
    }

    fn error(&mut self, start: usize, message: &str) {
        let range = self.range_from(start);
        self.errors.push(SyntaxError { range, message: Name::new(message) });
    }

    /// Index of the delimiter closing the one at `open`.
    fn matching_close(&self, open: usize) -> usize {
        let mut depth = 0usize;
        for (idx, token) in self.tokens.iter().enumerate().skip(open) {
            if token.kind.is_open_delim() {
                depth += 1;
            } else if token.kind.is_close_delim() {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return idx;
                }
            }
        }
        self.tokens.len()
    }

    /// Skip a delimited group, returning the text between the delimiters.
    fn delimited(&mut self) -> Option<&'a str> {
        if !self.current().is_some_and(TokenKind::is_open_delim) {
            return None;
        }
        let open = self.tokens[self.pos];
        let close_idx = self.matching_close(self.pos);
        let body_end = match self.tokens.get(close_idx) {
            Some(close) => close.range.start(),
            None => text_end(self.text),
        };
        self.pos = (close_idx + 1).min(self.tokens.len());
        let text: &'a str = self.text;
        Some(&text[TextRange::new(open.range.end(), body_end)])
    }

    /// Skip to the end of the current item: past a `;` or a `{..}` block at
    /// depth zero, or up to (not past) an unmatched `}`.
    fn skip_to_item_end(&mut self) {
        while let Some(kind) = self.current() {
            match kind {
                TokenKind::Semi => {
                    self.bump();
                    return;
                }
                TokenKind::LBrace => {
                    self.delimited();
                    return;
                }
                TokenKind::RBrace => return,
                kind if kind.is_open_delim() => {
                    self.delimited();
                }
                _ => self.bump(),
            }
        }
    }

    fn skip_generics(&mut self) {
        if !self.at(TokenKind::Lt) {
            return;
        }
        let mut depth = 0usize;
        while let Some(kind) = self.current() {
            match kind {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.bump();
                        return;
                    }
                }
                TokenKind::LBrace | TokenKind::RBrace | TokenKind::Semi => return,
                kind if kind.is_open_delim() => {
                    self.delimited();
                    continue;
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Skip a `where` clause up to the following `{`, `(` or `;`.
    fn skip_where_clause(&mut self) {
        if !self.eat_kw("where") {
            return;
        }
        while let Some(kind) = self.current() {
            match kind {
                TokenKind::LBrace | TokenKind::Semi | TokenKind::RBrace => return,
                TokenKind::Lt => self.skip_generics(),
                kind if kind.is_open_delim() => {
                    self.delimited();
                }
                _ => self.bump(),
            }
        }
    }
}

fn text_end(text: &str) -> crate::base::TextSize {
    crate::base::TextSize::of(text)
}

// ============================================================================
// Items
// ============================================================================

impl<'a> Parser<'a> {
    fn parse_items(&mut self, in_block: bool) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(kind) = self.current() {
            match kind {
                TokenKind::RBrace if in_block => break,
                TokenKind::RBrace => {
                    let start = self.pos;
                    self.bump();
                    self.error(start, "unmatched `}`");
                }
                TokenKind::Semi => self.bump(),
                _ => {
                    let start = self.pos;
                    self.parse_item(&mut items);
                    if self.pos == start {
                        self.bump();
                    }
                }
            }
        }
        items
    }

    fn parse_item(&mut self, items: &mut Vec<Item>) {
        let start = self.pos;
        let attrs = self.parse_outer_attrs();
        if self.current().is_none() || self.at(TokenKind::RBrace) {
            return;
        }
        let visibility = self.parse_visibility();
        self.skip_modifiers();

        if self.at_kw("extern") {
            if self.nth_is_kw(1, "crate") {
                return self.finish(items, start, attrs, visibility, Self::parse_extern_crate);
            }
            let block_at = if self.nth(1) == Some(TokenKind::Str) { 2 } else { 1 };
            if self.nth(block_at) == Some(TokenKind::LBrace) {
                self.pos += block_at + 1;
                let inner = self.parse_items(true);
                if !self.eat(TokenKind::RBrace) {
                    self.error(start, "unclosed extern block");
                }
                items.extend(inner.into_iter().map(|mut item| {
                    item.attrs.cfg = CfgExpr::and(attrs.cfg.clone(), item.attrs.cfg.take());
                    item
                }));
                return;
            }
            self.bump();
            self.eat(TokenKind::Str);
        }

        let kind = match self.nth_text(0) {
            "fn" if self.at(TokenKind::Ident) => self.parse_fn(),
            "struct" if self.at(TokenKind::Ident) => self.parse_struct(),
            "union" if self.nth(1) == Some(TokenKind::Ident) => {
                self.bump();
                self.named_then_skip(|name| ItemKind::Union { name })
            }
            "enum" if self.at(TokenKind::Ident) => self.parse_enum(),
            "trait" if self.at(TokenKind::Ident) => {
                self.bump();
                self.named_then_skip(|name| ItemKind::Trait { name })
            }
            "impl" if self.at(TokenKind::Ident) => {
                self.skip_to_item_end();
                Some(ItemKind::Impl)
            }
            "const" if self.at(TokenKind::Ident) => {
                self.bump();
                let name = self.ident().filter(|name| name != "_");
                self.skip_to_item_end();
                Some(ItemKind::Const { name })
            }
            "static" if self.at(TokenKind::Ident) => {
                self.bump();
                self.eat_kw("mut");
                self.named_then_skip(|name| ItemKind::Static { name })
            }
            "type" if self.at(TokenKind::Ident) => {
                self.bump();
                self.named_then_skip(|name| ItemKind::TypeAlias { name })
            }
            "mod" if self.at(TokenKind::Ident) => self.parse_module(),
            "use" if self.at(TokenKind::Ident) => self.parse_use(),
            "macro_rules" if self.nth(1) == Some(TokenKind::Bang) => self.parse_macro_rules(),
            "macro" if self.nth(1) == Some(TokenKind::Ident) => self.parse_macro_def(),
            _ => self.parse_macro_call(),
        };

        match kind {
            Some(kind) => items.push(Item { kind, visibility, attrs }),
            None => {
                self.skip_to_item_end();
                self.error(start, "expected an item");
            }
        }
    }

    fn finish(
        &mut self,
        items: &mut Vec<Item>,
        start: usize,
        attrs: ItemAttrs,
        visibility: RawVisibility,
        parse: fn(&mut Self) -> Option<ItemKind>,
    ) {
        match parse(self) {
            Some(kind) => items.push(Item { kind, visibility, attrs }),
            None => {
                self.skip_to_item_end();
                self.error(start, "expected an item");
            }
        }
    }

    fn skip_modifiers(&mut self) {
        loop {
            let is_modifier = match self.nth_text(0) {
                "unsafe" | "async" | "auto" | "safe" => self.at(TokenKind::Ident),
                "default" => self.nth(1) == Some(TokenKind::Ident),
                "const" => {
                    ["fn", "unsafe", "async", "extern"].iter().any(|kw| self.nth_is_kw(1, kw))
                }
                _ => false,
            };
            if !is_modifier {
                return;
            }
            self.bump();
        }
    }

    fn named_then_skip(&mut self, make: impl FnOnce(Name) -> ItemKind) -> Option<ItemKind> {
        let name = self.ident()?;
        self.skip_to_item_end();
        Some(make(name))
    }

    fn parse_fn(&mut self) -> Option<ItemKind> {
        self.bump();
        self.named_then_skip(|name| ItemKind::Fn { name })
    }

    fn parse_struct(&mut self) -> Option<ItemKind> {
        self.bump();
        let name = self.ident()?;
        self.skip_generics();
        let shape = self.parse_shape()?;
        Some(ItemKind::Struct { name, shape })
    }

    /// Body of a struct after its generics.
    fn parse_shape(&mut self) -> Option<StructShape> {
        loop {
            match self.current()? {
                TokenKind::Semi => {
                    self.bump();
                    return Some(StructShape::Unit);
                }
                TokenKind::LBrace => {
                    self.delimited();
                    return Some(StructShape::Record);
                }
                TokenKind::LParen => {
                    self.delimited();
                    self.skip_where_clause();
                    self.eat(TokenKind::Semi);
                    return Some(StructShape::Tuple);
                }
                TokenKind::Ident if self.at_kw("where") => self.skip_where_clause(),
                _ => return None,
            }
        }
    }

    fn parse_enum(&mut self) -> Option<ItemKind> {
        self.bump();
        let name = self.ident()?;
        self.skip_generics();
        self.skip_where_clause();
        if !self.eat(TokenKind::LBrace) {
            return None;
        }
        let mut variants = Vec::new();
        while !self.at(TokenKind::RBrace) {
            self.current()?;
            let before = self.pos;
            let attrs = self.parse_outer_attrs();
            self.parse_visibility();
            if let Some(variant) = self.ident() {
                let shape = match self.current() {
                    Some(TokenKind::LParen) => StructShape::Tuple,
                    Some(TokenKind::LBrace) => StructShape::Record,
                    _ => StructShape::Unit,
                };
                if shape != StructShape::Unit {
                    self.delimited();
                }
                variants.push(Variant { name: variant, shape, cfg: attrs.cfg });
            }
            // Skip a discriminant and anything unexpected up to the next variant
            while let Some(kind) = self.current() {
                match kind {
                    TokenKind::Comma => {
                        self.bump();
                        break;
                    }
                    TokenKind::RBrace => break,
                    kind if kind.is_open_delim() => {
                        self.delimited();
                    }
                    _ => self.bump(),
                }
            }
            if self.pos == before {
                self.bump();
            }
        }
        self.bump();
        Some(ItemKind::Enum { name, variants })
    }

    fn parse_module(&mut self) -> Option<ItemKind> {
        self.bump();
        let name = self.ident()?;
        if self.eat(TokenKind::Semi) {
            return Some(ItemKind::Module { name, body: None });
        }
        if !self.eat(TokenKind::LBrace) {
            return None;
        }
        let errors_before = self.errors.len();
        let items = self.parse_items(true);
        self.eat(TokenKind::RBrace);
        let errors = self.errors.split_off(errors_before);
        // Errors inside the module body are reported on the file tree too
        self.errors.extend(errors.iter().cloned());
        Some(ItemKind::Module { name, body: Some(ItemTree { items, errors }) })
    }

    fn parse_extern_crate(&mut self) -> Option<ItemKind> {
        self.bump();
        self.bump();
        let name = self.ident()?;
        let alias = if self.eat_kw("as") { Some(self.import_alias()?) } else { None };
        if !self.eat(TokenKind::Semi) {
            return None;
        }
        Some(ItemKind::ExternCrate { name, alias })
    }

    fn import_alias(&mut self) -> Option<ImportAlias> {
        let name = self.ident()?;
        Some(if name == "_" { ImportAlias::Underscore } else { ImportAlias::Named(name) })
    }

    fn parse_macro_rules(&mut self) -> Option<ItemKind> {
        self.bump();
        self.bump();
        let name = self.ident()?;
        let delim = self.current()?;
        let body = self.delimited()?;
        if delim != TokenKind::LBrace {
            self.eat(TokenKind::Semi);
        }
        Some(ItemKind::MacroRules { name, body: Arc::from(body) })
    }

    /// `macro m($x:ident) { .. }` is stored as the single rule
    /// `($x:ident) => { .. }`; `macro m { rules }` keeps its rules.
    fn parse_macro_def(&mut self) -> Option<ItemKind> {
        self.bump();
        let name = self.ident()?;
        let body = if self.at(TokenKind::LParen) {
            let args = self.delimited()?;
            if !self.at(TokenKind::LBrace) {
                return None;
            }
            let body = self.delimited()?;
            format!("({args}) => {{{body}}}")
        } else if self.at(TokenKind::LBrace) {
            self.delimited()?.to_owned()
        } else {
            return None;
        };
        Some(ItemKind::MacroDef { name, body: Arc::from(body) })
    }

    fn parse_macro_call(&mut self) -> Option<ItemKind> {
        let path = self.parse_path()?;
        if !self.eat(TokenKind::Bang) {
            return None;
        }
        let delim = self.current()?;
        let body = self.delimited()?;
        if delim != TokenKind::LBrace {
            self.eat(TokenKind::Semi);
        }
        Some(ItemKind::MacroCall(MacroCall { path, body: Arc::from(body) }))
    }

    /// `a::b::c`, `::a`, `$crate::a`.
    fn parse_path(&mut self) -> Option<Vec<Name>> {
        let mut segments = Vec::new();
        if self.eat(TokenKind::Colon2) {
            segments.push(Name::default());
        }
        loop {
            segments.push(self.path_segment()?);
            if !self.at(TokenKind::Colon2)
                || matches!(self.nth(1), Some(TokenKind::Star | TokenKind::LBrace))
            {
                return Some(segments);
            }
            self.bump();
        }
    }

    fn path_segment(&mut self) -> Option<Name> {
        if self.at(TokenKind::Dollar) && self.nth_is_kw(1, "crate") {
            self.pos += 2;
            return Some(Name::new(super::DOLLAR_CRATE));
        }
        self.ident()
    }
}

// ============================================================================
// Use trees
// ============================================================================

impl Parser<'_> {
    fn parse_use(&mut self) -> Option<ItemKind> {
        self.bump();
        let tree = self.parse_use_tree()?;
        if !self.eat(TokenKind::Semi) {
            return None;
        }
        Some(ItemKind::Use(tree))
    }

    fn parse_use_tree(&mut self) -> Option<UseTree> {
        let mut prefix = Vec::new();
        if self.eat(TokenKind::Colon2) {
            prefix.push(Name::default());
        }
        loop {
            match self.current()? {
                TokenKind::Star => {
                    self.bump();
                    return Some(UseTree { prefix, kind: UseTreeKind::Glob });
                }
                TokenKind::LBrace => {
                    self.bump();
                    let mut children = Vec::new();
                    while !self.eat(TokenKind::RBrace) {
                        children.push(self.parse_use_tree()?);
                        if !self.eat(TokenKind::Comma) && !self.at(TokenKind::RBrace) {
                            return None;
                        }
                    }
                    return Some(UseTree { prefix, kind: UseTreeKind::Group(children) });
                }
                _ => {
                    prefix.push(self.path_segment()?);
                    if self.eat(TokenKind::Colon2) {
                        continue;
                    }
                    let alias = if self.eat_kw("as") { Some(self.import_alias()?) } else { None };
                    return Some(UseTree { prefix, kind: UseTreeKind::Single { alias } });
                }
            }
        }
    }
}

// ============================================================================
// Attributes and visibility
// ============================================================================

impl Parser<'_> {
    fn parse_outer_attrs(&mut self) -> ItemAttrs {
        let mut attrs = ItemAttrs::default();
        while self.at(TokenKind::Pound) {
            let is_inner = self.nth(1) == Some(TokenKind::Bang);
            let open = self.pos + if is_inner { 2 } else { 1 };
            if self.tokens.get(open).map(|token| token.kind) != Some(TokenKind::LBracket) {
                return attrs;
            }
            let close = self.matching_close(open);
            self.pos = open + 1;
            if !is_inner {
                self.parse_attr(&mut attrs);
            }
            self.pos = (close + 1).min(self.tokens.len());
        }
        attrs
    }

    fn parse_attr(&mut self, attrs: &mut ItemAttrs) {
        match self.nth_text(0) {
            "cfg" if self.nth(1) == Some(TokenKind::LParen) => {
                self.pos += 2;
                if let Some(expr) = self.parse_cfg_expr() {
                    attrs.cfg = CfgExpr::and(attrs.cfg.take(), Some(expr));
                }
            }
            "macro_use" => attrs.macro_use = true,
            "macro_export" => attrs.macro_export = true,
            "path" if self.nth(1) == Some(TokenKind::Eq) && self.nth(2) == Some(TokenKind::Str) => {
                attrs.path = Some(unquote(self.nth_text(2)));
            }
            _ => {}
        }
    }

    fn parse_cfg_expr(&mut self) -> Option<CfgExpr> {
        let name = self.ident()?;
        match name.as_str() {
            "all" | "any" | "not" if self.at(TokenKind::LParen) => {
                self.bump();
                let mut exprs = Vec::new();
                while !self.eat(TokenKind::RParen) {
                    exprs.push(self.parse_cfg_expr()?);
                    if !self.eat(TokenKind::Comma) && !self.at(TokenKind::RParen) {
                        return None;
                    }
                }
                match name.as_str() {
                    "all" => Some(CfgExpr::All(exprs)),
                    "any" => Some(CfgExpr::Any(exprs)),
                    _ if exprs.len() == 1 => exprs.pop().map(|expr| CfgExpr::Not(Box::new(expr))),
                    _ => None,
                }
            }
            _ if self.at(TokenKind::Eq) && self.nth(1) == Some(TokenKind::Str) => {
                let value = unquote(self.nth_text(1));
                self.pos += 2;
                Some(CfgExpr::KeyValue { key: name, value })
            }
            _ => Some(CfgExpr::Atom(name)),
        }
    }

    fn parse_visibility(&mut self) -> RawVisibility {
        if !self.at_kw("pub") {
            return RawVisibility::Private;
        }
        self.bump();
        if !self.at(TokenKind::LParen) {
            return RawVisibility::Public;
        }
        let restricted = match self.nth_text(1) {
            "crate" if self.nth(2) == Some(TokenKind::RParen) => Some(RawVisibility::Crate),
            "super" if self.nth(2) == Some(TokenKind::RParen) => Some(RawVisibility::Super),
            "self" if self.nth(2) == Some(TokenKind::RParen) => Some(RawVisibility::SelfMod),
            "in" => {
                let saved = self.pos;
                self.pos += 2;
                match self.parse_path() {
                    Some(path) if self.eat(TokenKind::RParen) => {
                        return RawVisibility::In(path);
                    }
                    _ => {
                        self.pos = saved;
                        None
                    }
                }
            }
            _ => None,
        };
        match restricted {
            Some(vis) => {
                self.pos += 3;
                vis
            }
            // `pub (A, B)` in tuple position; not a restriction
            None => RawVisibility::Public,
        }
    }
}

fn unquote(literal: &str) -> Name {
    let start = literal.find('"').map_or(0, |idx| idx + 1);
    let end = literal.rfind('"').unwrap_or(literal.len());
    Name::new(literal.get(start..end.max(start)).unwrap_or_default())
}
