use indexmap::IndexMap;

use crate::{value::Value, Pos};

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub value: Value,
    pub is_label: bool,
    pub defined_at: Option<Pos>,
    pub references: Vec<Pos>,
}

/// Scoped symbols, keyed by their fully suffixed name (`name@id_count...`).
#[derive(Debug, Clone)]
pub struct SymbolTable {
    syms: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            syms: IndexMap::new(),
        };
        table.seed();
        table
    }

    fn seed(&mut self) {
        self.add("PI", Value::Number(std::f64::consts::PI), false, None);
        self.add("P%", Value::Number(0.0), false, None);
        self.add("TRUE", Value::Number(-1.0), false, None);
        self.add("FALSE", Value::Number(0.0), false, None);
        self.add("CPU", Value::Number(0.0), false, None);
    }

    pub fn reset(&mut self) {
        self.syms.clear();
        self.seed();
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.syms.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.syms.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.syms.get(name).map(|sym| &sym.value)
    }

    /// Inserts a new symbol. Returns false if the name was already taken.
    pub fn add(&mut self, name: &str, value: Value, is_label: bool, pos: Option<Pos>) -> bool {
        if self.syms.contains_key(name) {
            return false;
        }
        self.syms.insert(
            name.to_string(),
            Symbol {
                value,
                is_label,
                defined_at: pos,
                references: Vec::new(),
            },
        );
        true
    }

    pub fn change(&mut self, name: &str, value: Value) {
        if let Some(sym) = self.syms.get_mut(name) {
            sym.value = value;
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Symbol> {
        self.syms.shift_remove(name)
    }

    pub fn add_reference(&mut self, name: &str, pos: Pos) {
        if let Some(sym) = self.syms.get_mut(name) {
            if !sym.references.contains(&pos) {
                sym.references.push(pos);
            }
        }
    }

    /// Every location that spells this symbol: its definition followed by all references.
    pub fn rename_locations(&self, name: &str) -> Vec<Pos> {
        let Some(sym) = self.syms.get(name) else {
            return Vec::new();
        };
        sym.defined_at
            .iter()
            .chain(sym.references.iter())
            .copied()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.syms.iter().map(|(name, sym)| (name.as_str(), sym))
    }

    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips the scope suffix from a full symbol name.
pub fn base_name(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> Pos {
        Pos {
            file: 0,
            line,
            column,
        }
    }

    #[test]
    fn predefined() {
        let table = SymbolTable::new();
        assert_eq!(Some(&Value::Number(-1.0)), table.value("TRUE"));
        assert_eq!(Some(&Value::Number(0.0)), table.value("FALSE"));
        assert!(table.is_defined("PI"));
        assert!(table.is_defined("P%"));
        assert!(table.is_defined("CPU"));
    }

    #[test]
    fn add_refuses_duplicates() {
        let mut table = SymbolTable::new();
        assert!(table.add("foo", Value::from(1), false, Some(pos(0, 0))));
        assert!(!table.add("foo", Value::from(2), false, Some(pos(1, 0))));
        assert_eq!(Some(&Value::from(1)), table.value("foo"));
        table.change("foo", Value::from(3));
        assert_eq!(Some(&Value::from(3)), table.value("foo"));
    }

    #[test]
    fn rename_locations_lists_definition_first() {
        let mut table = SymbolTable::new();
        table.add("loop@1_0", Value::from(0x2000), true, Some(pos(3, 1)));
        table.add_reference("loop@1_0", pos(5, 5));
        table.add_reference("loop@1_0", pos(5, 5));
        table.add_reference("loop@1_0", pos(9, 4));
        assert_eq!(
            vec![pos(3, 1), pos(5, 5), pos(9, 4)],
            table.rename_locations("loop@1_0")
        );
        assert!(table.rename_locations("missing").is_empty());
    }

    #[test]
    fn base_name_strips_scopes() {
        assert_eq!("n", base_name("n@3_2@1_0"));
        assert_eq!("plain", base_name("plain"));
    }
}
