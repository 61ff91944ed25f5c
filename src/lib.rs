pub use crate::compiler::{compile, compile_with, CompileOptions};
pub use crate::decompiler::decompile;
pub use crate::errors::{HypernoteError, Result};
pub use crate::syntax::{CompiledDoc, Dependencies, HypernoteMeta, NodeKind, UiNode};

pub mod compiler;
pub mod decompiler;
pub mod errors;
pub mod syntax;
pub mod template;
