use std::{error::Error, str::FromStr};

pub mod assembler;
pub mod ast;
pub mod clock;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod driver;
pub mod error;
pub mod macros;
pub mod objcode;
pub mod opcodes;
pub mod parser;
pub mod provider;
pub mod session;
pub mod symtab;
pub mod value;

#[cfg(test)]
mod tests;

pub use assembler::{assemble, Assembly, EngineError, SourceLocation};
pub use context::Options;
pub use provider::{FileSystemProvider, MemoryProvider, SourceProvider};
pub use session::{CancelToken, Session};

/// A place in a source file. `file` indexes the run's file list; `line` and
/// `column` are zero based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub file: usize,
    pub line: usize,
    pub column: usize,
}

pub fn parse_defines<T, U>(s: &str) -> Result<(T, U), Box<dyn Error + Send + Sync + 'static>>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid SYMBOL=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}
