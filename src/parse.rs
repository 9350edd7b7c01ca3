use crate::ddl::description::{DdlDescription, DropBehavior};
use crate::table::Table;

/// A DDL statement as understood by the capture step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDdl {
    CreateTable(DdlDescription),
    /// Targets are not resolved yet; their persistence comes from the catalog.
    DropTable {
        tables: Vec<Table>,
        if_exists: bool,
        behavior: DropBehavior,
    },
    /// Any other statement, named by its command kind.
    Unsupported(String),
}

/// One statement of the input, with its own source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    pub text: String,
    pub ddl: ParsedDdl,
}

pub trait Parse {
    fn parse_statements(&self, sql: &str) -> anyhow::Result<Vec<ParsedStatement>>;

    fn parse_ddl(&self, sql: &str) -> anyhow::Result<Vec<ParsedDdl>> {
        Ok(self
            .parse_statements(sql)?
            .into_iter()
            .map(|statement| statement.ddl)
            .collect())
    }
}
