use indexmap::IndexMap;

use crate::Pos;

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
    /// Location of the `MACRO` line; the body starts on the following line.
    pub defined_at: Pos,
}

impl Macro {
    pub fn new(name: &str, defined_at: Pos) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            body: String::new(),
            defined_at,
        }
    }

    pub fn add_param(&mut self, param: &str) {
        self.params.push(param.to_string());
    }

    pub fn add_line(&mut self, line: &str) {
        self.body.push_str(line);
        self.body.push('\n');
    }
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: IndexMap<String, Macro>,
    references: IndexMap<String, Vec<Pos>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn add(&mut self, mac: Macro) {
        self.macros.insert(mac.name.clone(), mac);
    }

    pub fn add_reference(&mut self, name: &str, pos: Pos) {
        let refs = self.references.entry(name.to_string()).or_default();
        if !refs.contains(&pos) {
            refs.push(pos);
        }
    }

    pub fn references(&self, name: &str) -> &[Pos] {
        self.references.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values()
    }
}
