use thiserror::Error;

use crate::model::ir::IrError;
use crate::sql::compiler::CompileError;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Crate-level error for callers that work across module boundaries. The
/// per-module error enums stay the precise types; this wraps them where one
/// umbrella is more convenient than three.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ir(#[from] IrError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Message(String),
}

impl CoreError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
