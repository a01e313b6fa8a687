//! Macro definitions and the expander boundary.

use std::sync::Arc;

use super::{CrateId, ModPath};
use crate::syntax::{ItemTree, MacroCall, expand_macro_rules, parse_item_tree};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MacroKind {
    /// `macro_rules! name { .. }`
    Rules,
    /// `macro name(..) { .. }`
    Macro2,
}

/// A macro definition collected into a def map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MacroDefInfo {
    /// The crate that defines the macro; `$crate` in its expansion refers here.
    pub krate: CrateId,
    pub path: ModPath,
    pub kind: MacroKind,
    /// The rules, as written between the definition's braces.
    pub body: Arc<str>,
}

/// Expands macro invocations found while collecting items.
///
/// Returning `None` means the expansion failed; the collector records a
/// diagnostic and moves on. The returned tree may contain further macro
/// calls, which are collected like any others.
pub trait MacroExpander: Send + Sync {
    fn expand(&self, def: &MacroDefInfo, call: &MacroCall) -> Option<ItemTree>;
}

impl<F> MacroExpander for F
where
    F: Fn(&MacroDefInfo, &MacroCall) -> Option<ItemTree> + Send + Sync,
{
    fn expand(&self, def: &MacroDefInfo, call: &MacroCall) -> Option<ItemTree> {
        self(def, call)
    }
}

/// Expands declarative macros whose matchers only use `ident`, `tt` and
/// `literal` fragments.
#[derive(Clone, Copy, Debug, Default)]
pub struct MacroRulesExpander;

impl MacroExpander for MacroRulesExpander {
    fn expand(&self, def: &MacroDefInfo, call: &MacroCall) -> Option<ItemTree> {
        let expanded = expand_macro_rules(&def.body, &call.body)?;
        Some(parse_item_tree(&expanded))
    }
}
