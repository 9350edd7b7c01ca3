// Builds the SQL text of replicated statements.

use itertools::Itertools;
use tracing::{info, warn};

use crate::ddl::description::{ColumnType, DdlDescription, DropBehavior, DropDescription, Persistence};
use crate::encode::literal::{TypeClass, encode_literal};
use crate::table::{Table, quote_identifier};

/// Placeholder written for an out-of-line value that was not fetched.
pub const UNCHANGED_TOAST_DATUM: &str = "unchanged-toast-datum";

/// One attribute of a relation's tuple descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub type_class: TypeClass,
    pub dropped: bool,
    pub generated: bool,
    pub system: bool,
}

impl Attribute {
    pub fn new(name: &str, type_class: TypeClass) -> Self {
        Attribute {
            name: name.to_string(),
            type_class,
            dropped: false,
            generated: false,
            system: false,
        }
    }

    fn is_replicated(&self) -> bool {
        !(self.dropped || self.generated || self.system)
    }
}

/// A column value in its canonical text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Null,
    Text(String),
    /// Out-of-line value that is not resident in the change record.
    UnchangedToast,
}

impl Datum {
    pub fn text(value: &str) -> Self {
        Datum::Text(value.to_string())
    }
}

/// A relation as seen by the row-change hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub table: Table,
    pub attributes: Vec<Attribute>,
}

/// A captured row change; tuples are positionally aligned with
/// `Relation::attributes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    Insert { new: Vec<Datum> },
    Update { old: Option<Vec<Datum>>, new: Vec<Datum> },
    Delete { old: Option<Vec<Datum>> },
}

/// Filter and project a tuple into aligned `(column, literal)` pairs.
///
/// Dropped, generated and system attributes are skipped, and so are null
/// values: a skipped attribute disappears from both sides at once.
pub fn project(attributes: &[Attribute], tuple: &[Datum]) -> Vec<(String, String)> {
    attributes
        .iter()
        .zip(tuple.iter().chain(std::iter::repeat(&Datum::Null)))
        .filter(|(attr, _)| attr.is_replicated())
        .filter_map(|(attr, datum)| {
            let literal = match datum {
                Datum::Null => return None,
                Datum::UnchangedToast => UNCHANGED_TOAST_DATUM.to_string(),
                Datum::Text(text) => encode_literal(attr.type_class, text),
            };
            Some((quote_identifier(&attr.name), literal))
        })
        .collect()
}

/// Encode a row change as a single statement.
pub fn encode_change(relation: &Relation, change: &RowChange) -> String {
    match change {
        RowChange::Insert { new } => encode_insert(&relation.table, &relation.attributes, new),
        RowChange::Update { .. } => encode_update(&relation.table),
        RowChange::Delete { .. } => encode_delete(&relation.table),
    }
}

/// `INSERT INTO <schema>.<table> ( <cols> ) VALUES ( <literals> );`
pub fn encode_insert(table: &Table, attributes: &[Attribute], new: &[Datum]) -> String {
    let pairs = project(attributes, new);
    if pairs.is_empty() {
        return format!("INSERT INTO {table} DEFAULT VALUES;");
    }
    format!(
        "INSERT INTO {table} ( {} ) VALUES ( {} );",
        pairs.iter().map(|(column, _)| column).join(", "),
        pairs.iter().map(|(_, literal)| literal).join(", "),
    )
}

/// Only the statement prefix; column and predicate reconstruction is not
/// implemented.
pub fn encode_update(table: &Table) -> String {
    format!("UPDATE {table} SET")
}

/// Only the statement prefix; the predicate is not reconstructed.
pub fn encode_delete(table: &Table) -> String {
    format!("DELETE FROM {table}")
}

fn render_type(column_type: &ColumnType) -> String {
    let mut rendered = column_type.names.join(".");
    if !column_type.typmods.is_empty() {
        rendered.push_str(&format!("({})", column_type.typmods.iter().join(",")));
    }
    for _ in 0..column_type.array_dims {
        rendered.push_str("[]");
    }
    rendered
}

/// `CREATE TABLE [IF NOT EXISTS] <schema>.<table> ( <col> <type>, ... );`
///
/// The description must have passed the guard; non-column elements are not
/// rendered.
pub fn encode_create_table(ddl: &DdlDescription) -> String {
    let columns = ddl
        .columns()
        .map(|column| {
            format!(
                "{} {}",
                quote_identifier(&column.name),
                render_type(&column.column_type)
            )
        })
        .join(", ");
    format!(
        "CREATE TABLE {} {} ( {} );",
        if ddl.if_not_exists { "IF NOT EXISTS" } else { "" },
        ddl.table,
        columns
    )
}

/// `DROP TABLE [IF EXISTS] <t1>, <t2> RESTRICT|CASCADE;`
///
/// Targets that are not permanent tables are left out. Returns `None` when
/// nothing is left to drop.
pub fn encode_drop_table(drop: &DropDescription) -> Option<String> {
    let targets: Vec<&Table> = drop
        .targets
        .iter()
        .filter(|target| {
            if target.persistence != Persistence::Permanent {
                info!(table = %target.table, persistence = ?target.persistence, "not replicating drop of non-permanent table");
                return false;
            }
            true
        })
        .map(|target| &target.table)
        .collect();
    if targets.is_empty() {
        warn!("DROP TABLE has no permanent targets left, skipping");
        return None;
    }
    Some(format!(
        "DROP TABLE {}{} {};",
        if drop.if_exists { "IF EXISTS " } else { "" },
        targets.iter().join(", "),
        match drop.behavior {
            DropBehavior::Restrict => "RESTRICT",
            DropBehavior::Cascade => "CASCADE",
        }
    ))
}
