use std::{
    io,
    ops::Range,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;

use crate::{
    ast::AstNode,
    context::{DocumentContext, DocumentLink, Engine, Options, SaveRequest},
    diagnostic::{dedup_diagnostics, Diagnostic, Severity},
    driver::SourceDriver,
    error::Cancelled,
    macros::MacroTable,
    objcode::ObjectCode,
    provider::SourceProvider,
    session::CancelToken,
    symtab::SymbolTable,
    Pos,
};

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("cant read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

/// A file position resolved back to its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

/// Runs both passes over `path`.
pub fn assemble(
    path: &Path,
    provider: &dyn SourceProvider,
    options: Options,
    cancel: &CancelToken,
) -> Result<Assembly, EngineError> {
    let text = provider
        .read_text(path)
        .map_err(|source| EngineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let mut ctx = DocumentContext::new(options);
    let file = ctx.file_id(path);

    for pass in 0..2 {
        tracing::trace!("starting pass {}", pass + 1);
        ctx.begin_pass(pass);
        let mut engine = Engine {
            ctx: &mut ctx,
            provider,
            cancel,
        };
        let mut driver = SourceDriver::new(file, &text, 0, Vec::new(), None);
        driver.process(&mut engine);
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
    }

    tracing::debug!(
        "{} bytes of object code, {} symbols, {} macros",
        ctx.objcode.used_bytes(),
        ctx.symbols.len(),
        ctx.macros.iter().count()
    );
    Ok(Assembly { ctx })
}

/// The finished state of a run, read-only.
pub struct Assembly {
    ctx: DocumentContext,
}

impl Assembly {
    pub fn context(&self) -> &DocumentContext {
        &self.ctx
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.ctx.symbols
    }

    pub fn macros(&self) -> &MacroTable {
        &self.ctx.macros
    }

    pub fn objcode(&self) -> &ObjectCode {
        &self.ctx.objcode
    }

    pub fn memory(&self, range: Range<usize>) -> &[u8] {
        self.ctx.objcode.slice(range.start, range.end)
    }

    /// Deduplicated diagnostics for every file that produced any.
    pub fn diagnostics(&self) -> IndexMap<PathBuf, Vec<Diagnostic>> {
        self.ctx
            .all_diagnostics()
            .filter_map(|(file, diags)| {
                let path = self.ctx.file_path(file)?;
                Some((path.to_path_buf(), dedup_diagnostics(diags)))
            })
            .collect()
    }

    pub fn diagnostics_for(&self, path: &Path) -> Vec<Diagnostic> {
        self.ctx
            .find_file(path)
            .map(|file| dedup_diagnostics(self.ctx.diagnostics(file)))
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.ctx.all_diagnostics().any(|(_, diags)| {
            diags
                .iter()
                .any(|diag| diag.severity == Severity::Error)
        })
    }

    pub fn ast(&self, path: &Path, line: usize) -> Option<&AstNode> {
        self.ctx.ast(self.ctx.find_file(path)?, line)
    }

    pub fn saves(&self) -> &[SaveRequest] {
        self.ctx.saves()
    }

    pub fn links(&self) -> &[DocumentLink] {
        self.ctx.links()
    }

    pub fn printed(&self) -> &[String] {
        self.ctx.printed()
    }

    pub fn locate(&self, pos: Pos) -> Option<SourceLocation> {
        Some(SourceLocation {
            path: self.ctx.file_path(pos.file)?.to_path_buf(),
            line: pos.line,
            column: pos.column,
        })
    }

    /// Where the byte at `addr` was assembled, followed by each macro call
    /// site it was expanded from, innermost first.
    pub fn source_chain(&self, addr: usize) -> Vec<SourceLocation> {
        let mut chain = Vec::new();
        let mut entry = self.ctx.objcode.source_map(addr);
        while let Some(here) = entry {
            if let Some(path) = self.ctx.file_path(here.file) {
                chain.push(SourceLocation {
                    path: path.to_path_buf(),
                    line: here.line,
                    column: here.column,
                });
            }
            entry = here
                .parent
                .and_then(|id| self.ctx.objcode.call_site(id))
                .copied();
        }
        chain
    }

    /// Definition and references of a fully scoped symbol name.
    pub fn rename_locations(&self, name: &str) -> Vec<SourceLocation> {
        self.ctx
            .symbols
            .rename_locations(name)
            .into_iter()
            .filter_map(|pos| self.locate(pos))
            .collect()
    }
}
