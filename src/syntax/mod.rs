//! Item trees: the item-level view of a source file.
//!
//! The collector never looks at expressions or types; it needs to know which
//! items a module declares, which `use` declarations and macro invocations it
//! contains, and how each item is gated by `#[cfg]`. [`ItemTree`] captures
//! exactly that, and [`parse_item_tree`] builds one from source text.

mod cfg;
mod lexer;
mod macro_rules;
mod parser;

use std::sync::Arc;

pub use cfg::{CfgExpr, CfgOptions};
pub use lexer::{Token, TokenKind, tokenize};
pub use macro_rules::expand_macro_rules;
pub use parser::parse_item_tree;

use crate::base::{Name, TextRange};

/// Marker segment for `$crate` in macro-expanded paths.
///
/// After expansion the collector inserts the defining crate's id as the
/// following segment: `$crate::foo` becomes `["$crate", "3", "foo"]`.
pub const DOLLAR_CRATE: &str = "$crate";

/// The items of one file, inline module body, or macro expansion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemTree {
    pub items: Vec<Item>,
    pub errors: Vec<SyntaxError>,
}

/// A single item together with its visibility and relevant attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub visibility: RawVisibility,
    pub attrs: ItemAttrs,
}

/// The attributes the collector cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemAttrs {
    /// Conjunction of all `#[cfg(..)]` attributes on the item.
    pub cfg: Option<CfgExpr>,
    pub macro_use: bool,
    pub macro_export: bool,
    /// `#[path = ".."]` on a `mod` declaration.
    pub path: Option<Name>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Fn { name: Name },
    Struct { name: Name, shape: StructShape },
    Union { name: Name },
    Enum { name: Name, variants: Vec<Variant> },
    Trait { name: Name },
    Impl,
    /// `name` is `None` for `const _: () = ..;`
    Const { name: Option<Name> },
    Static { name: Name },
    TypeAlias { name: Name },
    /// `body` is `None` for `mod foo;`
    Module { name: Name, body: Option<ItemTree> },
    Use(UseTree),
    ExternCrate { name: Name, alias: Option<ImportAlias> },
    MacroRules { name: Name, body: Arc<str> },
    /// Declarative macro 2.0: `macro name(..) { .. }`
    MacroDef { name: Name, body: Arc<str> },
    MacroCall(MacroCall),
}

impl ItemKind {
    /// The name the item is declared with, if it has one.
    pub fn name(&self) -> Option<&Name> {
        match self {
            ItemKind::Fn { name }
            | ItemKind::Struct { name, .. }
            | ItemKind::Union { name }
            | ItemKind::Enum { name, .. }
            | ItemKind::Trait { name }
            | ItemKind::Static { name }
            | ItemKind::TypeAlias { name }
            | ItemKind::Module { name, .. }
            | ItemKind::ExternCrate { name, .. }
            | ItemKind::MacroRules { name, .. }
            | ItemKind::MacroDef { name, .. } => Some(name),
            ItemKind::Const { name } => name.as_ref(),
            ItemKind::Impl | ItemKind::Use(_) | ItemKind::MacroCall(_) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StructShape {
    Unit,
    Tuple,
    Record,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    pub name: Name,
    pub shape: StructShape,
    pub cfg: Option<CfgExpr>,
}

/// A macro invocation in item position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroCall {
    pub path: Vec<Name>,
    /// The text between the invocation delimiters.
    pub body: Arc<str>,
}

/// Visibility as written, before it is resolved against the module tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RawVisibility {
    #[default]
    Private,
    Public,
    /// `pub(crate)`
    Crate,
    /// `pub(super)`
    Super,
    /// `pub(self)`
    SelfMod,
    /// `pub(in path)`
    In(Vec<Name>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportAlias {
    Named(Name),
    /// `as _`
    Underscore,
}

/// A `use` tree: `a::b`, `a::*`, `a::{b, c as d}`.
///
/// An absolute path (`::a`) starts with an empty segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UseTree {
    pub prefix: Vec<Name>,
    pub kind: UseTreeKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UseTreeKind {
    Single { alias: Option<ImportAlias> },
    Glob,
    Group(Vec<UseTree>),
}

/// One leaf of a flattened `use` tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatImport {
    pub path: Vec<Name>,
    pub kind: FlatImportKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlatImportKind {
    Named(Name),
    Underscore,
    Glob,
}

impl UseTree {
    /// Expand groups into one import per leaf.
    ///
    /// `self` inside a group imports the prefix itself. Leaves that would
    /// bind a path keyword (`use super;`) without an alias are dropped.
    pub fn flatten(&self) -> Vec<FlatImport> {
        let mut result = Vec::new();
        self.flatten_into(&[], &mut result);
        result
    }

    fn flatten_into(&self, outer: &[Name], acc: &mut Vec<FlatImport>) {
        let mut path: Vec<Name> = outer.iter().chain(&self.prefix).cloned().collect();
        match &self.kind {
            UseTreeKind::Glob => acc.push(FlatImport { path, kind: FlatImportKind::Glob }),
            UseTreeKind::Group(children) => {
                for child in children {
                    child.flatten_into(&path, acc);
                }
            }
            UseTreeKind::Single { alias } => {
                if path.last().is_some_and(|last| last == "self") && path.len() > 1 {
                    path.pop();
                }
                let Some(last) = path.last().cloned() else { return };
                let kind = match alias {
                    Some(ImportAlias::Underscore) => FlatImportKind::Underscore,
                    Some(ImportAlias::Named(alias)) => FlatImportKind::Named(alias.clone()),
                    None if is_path_keyword(&last) || last.is_empty() => return,
                    None => FlatImportKind::Named(last),
                };
                acc.push(FlatImport { path, kind });
            }
        }
    }
}

fn is_path_keyword(segment: &str) -> bool {
    matches!(segment, "self" | "super" | "crate" | DOLLAR_CRATE)
}

/// A malformed item that was skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub range: TextRange,
    pub message: Name,
}

impl ItemTree {
    /// Rewrite `$crate` paths to carry the id of the crate that defined the
    /// macro this tree was expanded from.
    pub fn with_dollar_crate(mut self, crate_segment: &Name) -> Self {
        fix_items(&mut self.items, crate_segment);
        self
    }
}

fn fix_items(items: &mut [Item], crate_segment: &Name) {
    for item in items {
        if let RawVisibility::In(path) = &mut item.visibility {
            fix_path(path, crate_segment);
        }
        match &mut item.kind {
            ItemKind::Use(tree) => fix_use_tree(tree, crate_segment, true),
            ItemKind::MacroCall(call) => fix_path(&mut call.path, crate_segment),
            ItemKind::Module { body: Some(body), .. } => fix_items(&mut body.items, crate_segment),
            _ => {}
        }
    }
}

fn fix_use_tree(tree: &mut UseTree, crate_segment: &Name, is_outermost: bool) {
    if is_outermost {
        fix_path(&mut tree.prefix, crate_segment);
    }
    let starts_empty = is_outermost && tree.prefix.is_empty();
    if let UseTreeKind::Group(children) = &mut tree.kind {
        for child in children {
            // `use {$crate::a, b};` - the group has no prefix of its own
            fix_use_tree(child, crate_segment, starts_empty);
        }
    }
}

fn fix_path(path: &mut Vec<Name>, crate_segment: &Name) {
    let already_fixed = path.get(1).is_some_and(|seg| seg.parse::<u32>().is_ok());
    if path.first().is_some_and(|first| first == DOLLAR_CRATE) && !already_fixed {
        path.insert(1, crate_segment.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(segments: &[&str]) -> Vec<Name> {
        segments.iter().map(|s| Name::new(s)).collect()
    }

    #[test]
    fn test_flatten_group() {
        let tree = UseTree {
            prefix: names(&["a"]),
            kind: UseTreeKind::Group(vec![
                UseTree { prefix: names(&["self"]), kind: UseTreeKind::Single { alias: None } },
                UseTree { prefix: names(&["b", "c"]), kind: UseTreeKind::Glob },
                UseTree {
                    prefix: names(&["d"]),
                    kind: UseTreeKind::Single { alias: Some(ImportAlias::Named(Name::new("e"))) },
                },
                UseTree {
                    prefix: names(&["T"]),
                    kind: UseTreeKind::Single { alias: Some(ImportAlias::Underscore) },
                },
            ]),
        };

        let flat = tree.flatten();
        assert_eq!(
            flat,
            vec![
                FlatImport { path: names(&["a"]), kind: FlatImportKind::Named(Name::new("a")) },
                FlatImport { path: names(&["a", "b", "c"]), kind: FlatImportKind::Glob },
                FlatImport { path: names(&["a", "d"]), kind: FlatImportKind::Named(Name::new("e")) },
                FlatImport { path: names(&["a", "T"]), kind: FlatImportKind::Underscore },
            ]
        );
    }

    #[test]
    fn test_flatten_drops_bare_keywords() {
        let tree = UseTree { prefix: names(&["super"]), kind: UseTreeKind::Single { alias: None } };
        assert!(tree.flatten().is_empty());
    }

    #[test]
    fn test_with_dollar_crate() {
        let tree = parse_item_tree("use $crate::inner::Foo; $crate::m!(); mod x { use $crate::*; }");
        let tree = tree.with_dollar_crate(&Name::new("7"));

        let ItemKind::Use(use_tree) = &tree.items[0].kind else { panic!("expected use") };
        assert_eq!(use_tree.prefix, names(&["$crate", "7", "inner", "Foo"]));
        let ItemKind::MacroCall(call) = &tree.items[1].kind else { panic!("expected macro call") };
        assert_eq!(call.path, names(&["$crate", "7", "m"]));
        let ItemKind::Module { body: Some(body), .. } = &tree.items[2].kind else {
            panic!("expected inline module")
        };
        let ItemKind::Use(inner) = &body.items[0].kind else { panic!("expected use") };
        assert_eq!(inner.prefix, names(&["$crate", "7"]));
    }
}
