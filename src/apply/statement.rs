/// How the apply engine treats a replayed statement, decided by its exact,
/// case-sensitive keyword prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Begin,
    /// `CREATE` or `DROP`: must report a utility result.
    Ddl,
    /// Must report an insert result.
    Insert,
    Commit,
    /// Anything else is passed through as-is.
    Other,
}

impl StatementKind {
    pub fn classify(statement: &str) -> Self {
        if statement.starts_with("BEGIN") {
            StatementKind::Begin
        } else if statement.starts_with("CREATE") || statement.starts_with("DROP") {
            StatementKind::Ddl
        } else if statement.starts_with("INSERT") {
            StatementKind::Insert
        } else if statement.starts_with("COMMIT") {
            StatementKind::Commit
        } else {
            StatementKind::Other
        }
    }
}
