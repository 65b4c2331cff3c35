//! Structural analysis of Python source files.
//!
//! The entry point is [`analyze`]: one call per file, returning an
//! [`Analysis`] describing the file's shape (imports, classes, functions,
//! constants, metrics). The call is total: malformed input produces a
//! record with a failure marker, never an error.

pub mod analyze;
pub mod ast;
pub mod lex;
pub mod parse;
pub mod record;

pub use analyze::analyze;
pub use parse::ParseError;
pub use record::{
    Analysis, ArgInfo, ArgKind, ClassInfo, ConstantInfo, Failure, FunctionInfo, ImportInfo,
    ImportKind,
};
