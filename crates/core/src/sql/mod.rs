//! SQL Generation & Screening
//!
//! Everything between IR and warehouse text lives here: identifier quoting,
//! the dialect compiler, and the read-only validator that screens each
//! statement on its way out. The compiler refuses bad identifiers and the
//! validator re-checks the finished text, so neither layer trusts the other.

pub mod compiler;
pub mod ident;
pub mod lexer;
pub mod validator;

pub use compiler::{compile, CompileError, CompiledQuery};
pub use ident::{check_identifier, quote_column, quote_table, scalar_literal, string_literal};
pub use lexer::{strip_comments_and_strings, StrippedSql};
pub use validator::{validate_sql, RejectReason, Verdict, FORBIDDEN_KEYWORDS};
