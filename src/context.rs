use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::SystemTime,
};

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::AstNode,
    diagnostic::Diagnostic,
    macros::MacroTable,
    objcode::ObjectCode,
    provider::SourceProvider,
    session::CancelToken,
    symtab::SymbolTable,
    value::Value,
    Pos,
};

pub const MAX_INCLUDE_DEPTH: usize = 64;
pub const MAX_EVAL_DEPTH: usize = 32;

/// Inputs that stay fixed for a whole run.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub defines: Vec<(String, f64)>,
    pub cpu: u8,
    /// Filename used by `SAVE` when none is given.
    pub default_output: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub exec: usize,
    pub reload: usize,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Include,
    IncBin,
    PutFile,
    PutText,
    PutBasic,
}

/// A file named by a directive, positioned on its quoted name.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLink {
    pub kind: LinkKind,
    pub target: PathBuf,
    pub pos: Pos,
    pub len: usize,
}

/// The `rand()`-style generator behind `RND`.
#[derive(Debug, Clone, Copy)]
pub struct Lcg(u32);

impl Lcg {
    pub const MAX: u32 = 32767;

    pub fn seed(&mut self, seed: u32) {
        self.0 = seed;
    }

    pub fn rand(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1103515245).wrapping_add(12345);
        (self.0 / 65536) % 32768
    }
}

/// Every mutable structure belonging to one assembly of one document.
pub struct DocumentContext {
    pub symbols: SymbolTable,
    pub objcode: ObjectCode,
    pub macros: MacroTable,
    pub options: Options,
    pub time: SystemTime,
    pub rng: Lcg,
    pub include_depth: usize,
    /// Nested EVAL and ASM sub-parsers.
    pub eval_depth: usize,
    pass: u8,
    next_scope_id: usize,
    files: IndexSet<PathBuf>,
    diagnostics: IndexMap<usize, Vec<Diagnostic>>,
    asts: IndexMap<usize, BTreeMap<usize, AstNode>>,
    saves: Vec<SaveRequest>,
    links: Vec<DocumentLink>,
    printed: Vec<String>,
}

impl DocumentContext {
    pub fn new(options: Options) -> Self {
        let mut symbols = SymbolTable::new();
        for (name, value) in &options.defines {
            symbols.add(name, Value::Number(*value), false, None);
        }
        Self {
            symbols,
            objcode: ObjectCode::new(),
            macros: MacroTable::new(),
            options,
            time: SystemTime::now(),
            rng: Lcg(0),
            include_depth: 0,
            eval_depth: 0,
            pass: 0,
            next_scope_id: 0,
            files: IndexSet::new(),
            diagnostics: IndexMap::new(),
            asts: IndexMap::new(),
            saves: Vec::new(),
            links: Vec::new(),
            printed: Vec::new(),
        }
    }

    pub fn begin_pass(&mut self, pass: u8) {
        self.pass = pass;
        self.next_scope_id = 0;
        self.include_depth = 0;
        self.eval_depth = 0;
        self.rng.seed(0);
        self.objcode.begin_pass(pass == 0, self.options.cpu);
        self.symbols
            .change("CPU", Value::Number(self.options.cpu as f64));
        self.asts.clear();
        self.saves.clear();
        self.links.clear();
        self.printed.clear();
    }

    pub fn pass(&self) -> u8 {
        self.pass
    }

    pub fn is_first_pass(&self) -> bool {
        self.pass == 0
    }

    pub fn is_second_pass(&self) -> bool {
        self.pass == 1
    }

    pub fn next_scope_id(&mut self) -> usize {
        self.next_scope_id += 1;
        self.next_scope_id
    }

    pub fn file_id(&mut self, path: &Path) -> usize {
        self.files.insert_full(path.to_path_buf()).0
    }

    pub fn file_path(&self, id: usize) -> Option<&Path> {
        self.files.get_index(id).map(PathBuf::as_path)
    }

    pub fn find_file(&self, path: &Path) -> Option<usize> {
        self.files.get_index_of(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    pub fn report(&mut self, file: usize, diag: Diagnostic) {
        self.diagnostics.entry(file).or_default().push(diag);
    }

    pub fn diagnostics(&self, file: usize) -> &[Diagnostic] {
        self.diagnostics.get(&file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_diagnostics(&self) -> impl Iterator<Item = (usize, &[Diagnostic])> {
        self.diagnostics
            .iter()
            .map(|(file, diags)| (*file, diags.as_slice()))
    }

    /// Keeps the first tree seen for a line.
    pub fn record_ast(&mut self, file: usize, line: usize, node: AstNode) {
        self.asts
            .entry(file)
            .or_default()
            .entry(line)
            .or_insert(node);
    }

    pub fn ast(&self, file: usize, line: usize) -> Option<&AstNode> {
        self.asts.get(&file)?.get(&line)
    }

    pub fn asts(&self, file: usize) -> impl Iterator<Item = (usize, &AstNode)> {
        self.asts
            .get(&file)
            .into_iter()
            .flat_map(|lines| lines.iter().map(|(line, node)| (*line, node)))
    }

    pub fn add_save(&mut self, save: SaveRequest) {
        self.saves.push(save);
    }

    pub fn saves(&self) -> &[SaveRequest] {
        &self.saves
    }

    pub fn add_link(&mut self, link: DocumentLink) {
        self.links.push(link);
    }

    pub fn links(&self) -> &[DocumentLink] {
        &self.links
    }

    pub fn print(&mut self, text: String) {
        tracing::info!("{text}");
        self.printed.push(text);
    }

    pub fn printed(&self) -> &[String] {
        &self.printed
    }
}

/// What a driver needs besides its own stacks.
pub struct Engine<'a> {
    pub ctx: &'a mut DocumentContext,
    pub provider: &'a dyn SourceProvider,
    pub cancel: &'a CancelToken,
}
