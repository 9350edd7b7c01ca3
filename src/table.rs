// src/table.rs
// Relation names as they appear in captured DDL and encoded statements.

use std::fmt;
use std::str::FromStr;

/// Words that must be quoted when used as an identifier.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "system_user", "table",
    "then", "to", "trailing", "true", "union", "unique", "user", "using", "variadic", "when",
    "where", "window", "with",
];

/// Quote an identifier only if it would not survive the parser unquoted.
pub fn quote_identifier(ident: &str) -> String {
    let safe = ident
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !RESERVED_KEYWORDS.contains(&ident);
    if safe {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
}

impl FromStr for Table {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((schema, name)) = s.split_once('.') {
            Ok(Table {
                schema: Some(schema.to_string()),
                name: name.to_string(),
            })
        } else {
            Ok(Table {
                schema: None,
                name: s.to_string(),
            })
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(
                f,
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(&self.name)
            ),
            None => write!(f, "{}", quote_identifier(&self.name)),
        }
    }
}

impl Table {
    pub fn new(schema: &str, name: &str) -> Self {
        Table {
            schema: (!schema.is_empty()).then(|| schema.to_string()),
            name: name.to_string(),
        }
    }

    /// Fill in `default_schema` when the name was written unqualified.
    pub fn qualified(mut self, default_schema: &str) -> Self {
        if self.schema.is_none() {
            self.schema = Some(default_schema.to_string());
        }
        self
    }
}
