#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstKind {
    Line,
    Command,
    Function,
    Expression,
    VariableDeclaration,
    BinaryOp,
    Assembly,
    Value,
    MacroCall,
    Symbol,
}

/// Syntax tree node; `column` is the byte offset of the construct in its line.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: AstKind,
    pub value: String,
    pub column: usize,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: AstKind, value: impl Into<String>, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            column,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    pub fn push(&mut self, child: AstNode) {
        self.children.push(child);
    }

    /// Depth-first, parents before children.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    pub fn find(&self, kind: AstKind) -> impl Iterator<Item = &AstNode> {
        self.walk().filter(move |node| node.kind == kind)
    }

    /// The innermost node starting at or before `column`, preferring later siblings.
    pub fn node_at(&self, column: usize) -> Option<&AstNode> {
        if self.column > column && self.kind != AstKind::Line {
            return None;
        }
        self.children
            .iter()
            .rev()
            .find_map(|child| child.node_at(column))
            .or(Some(self))
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
