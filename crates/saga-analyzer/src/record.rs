//! The normalized structural description of one analyzed file. This is
//! what the run orchestrator serializes next to the generated prose.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Result of analyzing a single source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub file_path: String,
    pub module_docstring: Option<String>,
    pub imports: Vec<ImportInfo>,
    pub classes: Vec<ClassInfo>,
    pub functions: Vec<FunctionInfo>,
    pub constants: Vec<ConstantInfo>,
    /// Line count of the input text; filled even when parsing fails.
    pub loc: usize,
    pub complexity: u32,
    pub has_main: bool,
    pub decorators_used: BTreeSet<String>,
    /// Top-level modules imported from outside the standard library.
    pub dependencies: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl Analysis {
    /// An empty record for `path` with only the line count filled.
    pub fn empty(path: &str, loc: usize) -> Self {
        Self {
            file_path: path.to_string(),
            module_docstring: None,
            imports: Vec::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            constants: Vec::new(),
            loc,
            complexity: 0,
            has_main: false,
            decorators_used: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            failure: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Why a file could not be fully analyzed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Failure {
    /// The source could not be parsed.
    Parse(String),
    /// The parse succeeded but the traversal hit an internal limit.
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import a.b [as c]`
    Import,
    /// `from a.b import c [as d]`
    From,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportInfo {
    pub kind: ImportKind,
    pub module: String,
    /// Imported name; only present for from-imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub line: usize,
    /// Relative-import depth: one leading dot per level, 0 = absolute.
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub line: usize,
    pub docstring: Option<String>,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub methods: Vec<FunctionInfo>,
    pub attributes: Vec<AttributeInfo>,
    pub is_exception: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metaclass: Option<String>,
}

/// An annotated class-level attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_annotation: String,
    pub line: usize,
    pub has_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub line: usize,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
    pub args: Vec<ArgInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    pub is_async: bool,
    pub is_generator: bool,
    /// Exception type names this body may raise, sorted and deduped.
    pub raises: Vec<String>,
    pub is_method: bool,
    pub is_classmethod: bool,
    pub is_staticmethod: bool,
    pub is_property: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    Positional,
    VarArg,
    KwArg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgInfo {
    pub name: String,
    pub kind: ArgKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    pub has_default: bool,
}

/// An UPPER_CASE module-level binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantInfo {
    pub name: String,
    pub line: usize,
    /// Rough runtime category of the assigned value ("str", "list", ...).
    pub value_kind: String,
}
