//! Diagnostics: problems found while building a def map.
//!
//! None of these abort collection. They are recorded on the finished
//! [`CrateDefMap`](super::CrateDefMap) for consumers that want to surface
//! them.

use std::fmt;
use std::path::PathBuf;

use crate::base::{FileId, Name, TextRange};

use super::ModPath;

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }
}

/// What went wrong.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefDiagnosticKind {
    UnresolvedImport { path: Vec<Name> },
    UnresolvedMacroCall { path: Vec<Name> },
    MacroExpansionFailed { path: Vec<Name>, reason: Name },
    UnresolvedExternCrate { name: Name },
    /// `mod name;` with none of `candidates` present.
    MissingModuleFile { name: Name, candidates: Vec<PathBuf> },
    /// `file` is already the body of another module.
    ModuleShadowed { name: Name, file: FileId },
    UnresolvedVisibility { path: Vec<Name> },
    SyntaxError { range: TextRange, message: Name },
    IterationCapReached { passes: usize },
}

/// A diagnostic attached to the module it was found in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefDiagnostic {
    pub module: ModPath,
    /// The file containing the offending syntax, if known.
    pub file: Option<FileId>,
    pub kind: DefDiagnosticKind,
}

impl DefDiagnostic {
    pub fn new(module: ModPath, file: Option<FileId>, kind: DefDiagnosticKind) -> Self {
        Self { module, file, kind }
    }

    pub fn severity(&self) -> Severity {
        match self.kind {
            DefDiagnosticKind::ModuleShadowed { .. } | DefDiagnosticKind::IterationCapReached { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            DefDiagnosticKind::UnresolvedImport { .. } => codes::UNRESOLVED_IMPORT,
            DefDiagnosticKind::UnresolvedMacroCall { .. } => codes::UNRESOLVED_MACRO_CALL,
            DefDiagnosticKind::MacroExpansionFailed { .. } => codes::MACRO_EXPANSION_FAILED,
            DefDiagnosticKind::UnresolvedExternCrate { .. } => codes::UNRESOLVED_EXTERN_CRATE,
            DefDiagnosticKind::MissingModuleFile { .. } => codes::MISSING_MODULE_FILE,
            DefDiagnosticKind::ModuleShadowed { .. } => codes::MODULE_SHADOWED,
            DefDiagnosticKind::UnresolvedVisibility { .. } => codes::UNRESOLVED_VISIBILITY,
            DefDiagnosticKind::SyntaxError { .. } => codes::SYNTAX_ERROR,
            DefDiagnosticKind::IterationCapReached { .. } => codes::ITERATION_CAP_REACHED,
        }
    }
}

fn join(path: &[Name]) -> String {
    path.iter().map(Name::as_str).collect::<Vec<_>>().join("::")
}

impl fmt::Display for DefDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DefDiagnosticKind::UnresolvedImport { path } => {
                write!(f, "unresolved import `{}`", join(path))
            }
            DefDiagnosticKind::UnresolvedMacroCall { path } => {
                write!(f, "cannot find macro `{}`", join(path))
            }
            DefDiagnosticKind::MacroExpansionFailed { path, reason } => {
                write!(f, "failed to expand `{}!`: {reason}", join(path))
            }
            DefDiagnosticKind::UnresolvedExternCrate { name } => {
                write!(f, "can't find crate for `{name}`")
            }
            DefDiagnosticKind::MissingModuleFile { name, candidates } => {
                let candidates: Vec<_> = candidates.iter().map(|p| p.display().to_string()).collect();
                write!(f, "file not found for module `{name}` (tried {})", candidates.join(", "))
            }
            DefDiagnosticKind::ModuleShadowed { name, file } => {
                write!(f, "module `{name}` reuses {file}, which already belongs to another module")
            }
            DefDiagnosticKind::UnresolvedVisibility { path } => {
                write!(f, "failed to resolve visibility path `{}`", join(path))
            }
            DefDiagnosticKind::SyntaxError { message, .. } => write!(f, "syntax error: {message}"),
            DefDiagnosticKind::IterationCapReached { passes } => {
                write!(f, "name resolution stopped after {passes} passes without reaching a fixed point")
            }
        }
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Stable diagnostic codes.
pub mod codes {
    /// Unresolved import.
    pub const UNRESOLVED_IMPORT: &str = "E0432";
    /// `pub(in path)` does not name an ancestor module.
    pub const UNRESOLVED_VISIBILITY: &str = "E0433";
    /// `extern crate` of an unknown crate.
    pub const UNRESOLVED_EXTERN_CRATE: &str = "E0463";
    /// File not found for module.
    pub const MISSING_MODULE_FILE: &str = "E0583";
    /// Macro invocation path does not resolve.
    pub const UNRESOLVED_MACRO_CALL: &str = "D0001";
    /// The expander rejected the invocation, or the depth limit was hit.
    pub const MACRO_EXPANSION_FAILED: &str = "D0002";
    /// Malformed item skipped by the parser.
    pub const SYNTAX_ERROR: &str = "D0003";

    /// Duplicate `mod` declaration for the same file.
    pub const MODULE_SHADOWED: &str = "W0001";
    /// Collection hit the pass cap.
    pub const ITERATION_CAP_REACHED: &str = "W0002";
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics during def-map construction.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<DefDiagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    pub fn add(&mut self, diagnostic: DefDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Get all diagnostics.
    pub fn diagnostics(&self) -> &[DefDiagnostic] {
        &self.diagnostics
    }

    /// Get diagnostics for a specific file.
    pub fn diagnostics_for_file(&self, file: FileId) -> Vec<&DefDiagnostic> {
        self.diagnostics.iter().filter(|d| d.file == Some(file)).collect()
    }

    /// Count errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity() == Severity::Error).count()
    }

    /// Count warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity() == Severity::Warning).count()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Take all diagnostics.
    pub fn finish(self) -> Vec<DefDiagnostic> {
        self.diagnostics
    }
}
