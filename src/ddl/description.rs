// Structured descriptions of captured CREATE TABLE / DROP TABLE commands.

use crate::table::Table;

/// Relation persistence, as stored in `pg_class.relpersistence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Permanent,
    Unlogged,
    Temporary,
}

impl Persistence {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "p" => Some(Persistence::Permanent),
            "u" => Some(Persistence::Unlogged),
            "t" => Some(Persistence::Temporary),
            _ => None,
        }
    }
}

/// A column type as written: qualified name parts plus modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnType {
    pub names: Vec<String>,
    pub typmods: Vec<i32>,
    pub array_dims: usize,
}

impl ColumnType {
    pub fn named(names: &[&str]) -> Self {
        ColumnType {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableElement {
    Column(ColumnDefinition),
    /// Anything else found among the table elements (LIKE, table
    /// constraints), kept by kind for diagnostics.
    Other(String),
}

/// A captured `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlDescription {
    pub table: Table,
    pub persistence: Persistence,
    pub if_not_exists: bool,
    /// `PARTITION BY <strategy>`
    pub partition_spec: Option<String>,
    /// `PARTITION OF <parent> FOR VALUES ...`
    pub partition_bound: bool,
    pub inherits: Vec<Table>,
    /// `OF <type>`
    pub of_type: Option<String>,
    pub elements: Vec<TableElement>,
}

impl DdlDescription {
    pub fn new(table: Table) -> Self {
        DdlDescription {
            table,
            persistence: Persistence::Permanent,
            if_not_exists: false,
            partition_spec: None,
            partition_bound: false,
            inherits: Vec::new(),
            of_type: None,
            elements: Vec::new(),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.elements.iter().filter_map(|element| match element {
            TableElement::Column(column) => Some(column),
            TableElement::Other(_) => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropBehavior {
    Restrict,
    Cascade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub table: Table,
    pub persistence: Persistence,
}

/// A captured `DROP TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropDescription {
    pub targets: Vec<DropTarget>,
    pub if_exists: bool,
    pub behavior: DropBehavior,
}
