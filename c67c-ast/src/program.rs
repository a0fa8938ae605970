//! The `Program` type is the sole hand-off point between the (out-of-scope) parser and the core.

use std::collections::HashMap;

use crate::ast::Stmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Which top-level names a compiled module exposes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ExportVisibility {
    /// Every top-level binding is exported.
    All,
    /// Only the named bindings are exported.
    Named(Vec<String>),
}

impl Default for ExportVisibility {
    fn default() -> Self {
        ExportVisibility::All
    }
}

/// One field of a C struct layout, as supplied by the (out-of-scope) C header ingestion
/// component so FFI code can compute correct field offsets without the core parsing headers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StructLayout {
    /// The struct's name as referenced from source.
    pub name: String,
    /// `(field name, byte offset, byte size)`, in declaration order.
    pub fields: Vec<(String, u32, u32)>,
    /// Total size of the struct in bytes, including tail padding.
    pub size: u32,
    /// Required alignment in bytes.
    pub align: u32,
}

/// The full unit the core ingests from the external parser.
///
/// No other parser output reaches the core: the optimizer and codegen pipelines only ever see
/// `statements`, consulting `namespaces`/`structs`/`exports` only to resolve names that the AST
/// itself leaves qualified or external.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Program {
    /// Top-level statements, in source order.
    pub statements: Vec<Stmt>,
    /// Which top-level names this module exports.
    #[cfg_attr(feature = "enable-serde", serde(default))]
    pub exports: ExportVisibility,
    /// `namespace.function -> resolved name`, populated by the external import resolver.
    pub namespaces: HashMap<String, String>,
    /// C struct layouts, populated by the external header-ingestion component.
    pub structs: Vec<StructLayout>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_program_exports_everything() {
        let p = Program::default();
        assert_eq!(p.exports, ExportVisibility::All);
        assert!(p.statements.is_empty());
    }
}
