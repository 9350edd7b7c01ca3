// src/pg_query_parser.rs

use anyhow::{Context, anyhow};
use itertools::Itertools;
use pg_query::NodeEnum;
use pg_query::protobuf::{self, a_const};

use crate::ddl::description::{
    ColumnDefinition, ColumnType, DdlDescription, DropBehavior, Persistence, TableElement,
};
use crate::table::Table;
use crate::{Parse, ParsedDdl, ParsedStatement};

pub struct PgQueryParser;

impl Parse for PgQueryParser {
    fn parse_statements(&self, sql: &str) -> anyhow::Result<Vec<ParsedStatement>> {
        let result = pg_query::parse(sql).with_context(|| format!("failed to parse {sql:?}"))?;
        let mut parsed = Vec::new();
        for stmt in &result.protobuf.stmts {
            let Some(node) = stmt.stmt.as_ref().and_then(|s| s.node.as_ref()) else {
                continue;
            };
            let text = statement_text(sql, stmt)?;
            let ddl = match node {
                NodeEnum::CreateStmt(create_stmt) => {
                    ParsedDdl::CreateTable(describe_create(create_stmt)?)
                }
                NodeEnum::DropStmt(drop_stmt)
                    if drop_stmt.remove_type == protobuf::ObjectType::ObjectTable as i32 =>
                {
                    describe_drop(drop_stmt)?
                }
                other => ParsedDdl::Unsupported(node_kind(other)),
            };
            parsed.push(ParsedStatement { text, ddl });
        }
        Ok(parsed)
    }
}

/// Cut one statement out of `sql`. A zero length runs to the end of the input.
fn statement_text(sql: &str, stmt: &protobuf::RawStmt) -> anyhow::Result<String> {
    let start = usize::try_from(stmt.stmt_location)?;
    let end = match usize::try_from(stmt.stmt_len)? {
        0 => sql.len(),
        len => start + len,
    };
    sql.get(start..end)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| anyhow!("statement at byte {start} is outside the input"))
}

fn describe_create(create_stmt: &protobuf::CreateStmt) -> anyhow::Result<DdlDescription> {
    let relation = create_stmt
        .relation
        .as_ref()
        .ok_or_else(|| anyhow!("CREATE TABLE without a relation"))?;
    let mut ddl = DdlDescription::new(Table::new(&relation.schemaname, &relation.relname));
    ddl.persistence =
        Persistence::from_code(&relation.relpersistence).unwrap_or(Persistence::Permanent);
    ddl.if_not_exists = create_stmt.if_not_exists;
    ddl.partition_spec = create_stmt.partspec.as_ref().map(|spec| {
        spec.part_params
            .iter()
            .filter_map(|param| match param.node.as_ref() {
                Some(NodeEnum::PartitionElem(elem)) => Some(elem.name.clone()),
                _ => None,
            })
            .join(", ")
    });
    ddl.partition_bound = create_stmt.partbound.is_some();
    ddl.inherits = create_stmt
        .inh_relations
        .iter()
        .filter_map(|node| match node.node.as_ref() {
            Some(NodeEnum::RangeVar(parent)) => Some(Table::new(&parent.schemaname, &parent.relname)),
            _ => None,
        })
        .collect();
    ddl.of_type = create_stmt
        .of_typename
        .as_ref()
        .map(|type_name| column_type(type_name).names.join("."));
    ddl.elements = create_stmt
        .table_elts
        .iter()
        .filter_map(|node| node.node.as_ref())
        .map(|node| match node {
            NodeEnum::ColumnDef(column) => TableElement::Column(ColumnDefinition {
                name: column.colname.clone(),
                column_type: column
                    .type_name
                    .as_ref()
                    .map(column_type)
                    .unwrap_or_default(),
            }),
            NodeEnum::Constraint(_) => TableElement::Other("table constraint".to_string()),
            NodeEnum::TableLikeClause(_) => TableElement::Other("LIKE".to_string()),
            other => TableElement::Other(node_kind(other)),
        })
        .collect();
    Ok(ddl)
}

fn describe_drop(drop_stmt: &protobuf::DropStmt) -> anyhow::Result<ParsedDdl> {
    let mut tables = Vec::new();
    for object in &drop_stmt.objects {
        let Some(NodeEnum::List(list)) = object.node.as_ref() else {
            continue;
        };
        let names = string_values(&list.items);
        let table = match names.as_slice() {
            [name] => Table::new("", name),
            [schema, name] => Table::new(schema, name),
            [_catalog, schema, name] => Table::new(schema, name),
            _ => anyhow::bail!("unexpected DROP TABLE target {names:?}"),
        };
        tables.push(table);
    }
    let behavior = if drop_stmt.behavior == protobuf::DropBehavior::DropCascade as i32 {
        DropBehavior::Cascade
    } else {
        DropBehavior::Restrict
    };
    Ok(ParsedDdl::DropTable {
        tables,
        if_exists: drop_stmt.missing_ok,
        behavior,
    })
}

fn column_type(type_name: &protobuf::TypeName) -> ColumnType {
    ColumnType {
        names: string_values(&type_name.names),
        typmods: type_name
            .typmods
            .iter()
            .filter_map(|node| match node.node.as_ref() {
                Some(NodeEnum::AConst(constant)) => match &constant.val {
                    Some(a_const::Val::Ival(value)) => Some(value.ival),
                    _ => None,
                },
                _ => None,
            })
            .collect(),
        array_dims: type_name.array_bounds.len(),
    }
}

fn string_values(nodes: &[protobuf::Node]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|node| match node.node.as_ref() {
            Some(NodeEnum::String(s)) => Some(s.sval.clone()),
            _ => None,
        })
        .collect()
}

/// Name a statement or table element for log lines and skip reports.
fn node_kind(node: &NodeEnum) -> String {
    let kind = match node {
        NodeEnum::AlterTableStmt(_) => "AlterTableStmt",
        NodeEnum::RenameStmt(_) => "RenameStmt",
        NodeEnum::IndexStmt(_) => "IndexStmt",
        NodeEnum::DropStmt(_) => "DropStmt",
        NodeEnum::TruncateStmt(_) => "TruncateStmt",
        NodeEnum::CreateTableAsStmt(_) => "CreateTableAsStmt",
        NodeEnum::ViewStmt(_) => "ViewStmt",
        NodeEnum::CreateSeqStmt(_) => "CreateSeqStmt",
        NodeEnum::AlterSeqStmt(_) => "AlterSeqStmt",
        NodeEnum::CreateSchemaStmt(_) => "CreateSchemaStmt",
        NodeEnum::CreateFunctionStmt(_) => "CreateFunctionStmt",
        NodeEnum::CreateTrigStmt(_) => "CreateTrigStmt",
        NodeEnum::CreateDomainStmt(_) => "CreateDomainStmt",
        NodeEnum::CompositeTypeStmt(_) => "CompositeTypeStmt",
        NodeEnum::CreateEnumStmt(_) => "CreateEnumStmt",
        NodeEnum::CommentStmt(_) => "CommentStmt",
        NodeEnum::GrantStmt(_) => "GrantStmt",
        NodeEnum::InsertStmt(_) => "InsertStmt",
        NodeEnum::UpdateStmt(_) => "UpdateStmt",
        NodeEnum::DeleteStmt(_) => "DeleteStmt",
        NodeEnum::MergeStmt(_) => "MergeStmt",
        NodeEnum::SelectStmt(_) => "SelectStmt",
        NodeEnum::CopyStmt(_) => "CopyStmt",
        NodeEnum::VariableSetStmt(_) => "VariableSetStmt",
        NodeEnum::TransactionStmt(_) => "TransactionStmt",
        NodeEnum::DoStmt(_) => "DoStmt",
        NodeEnum::Constraint(_) => "Constraint",
        NodeEnum::TableLikeClause(_) => "TableLikeClause",
        _ => "utility statement",
    };
    kind.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(sql: &str) -> ParsedDdl {
        let mut parsed = PgQueryParser.parse_ddl(sql).unwrap();
        assert_eq!(parsed.len(), 1);
        parsed.remove(0)
    }

    fn create(sql: &str) -> DdlDescription {
        match parse_one(sql) {
            ParsedDdl::CreateTable(ddl) => ddl,
            other => panic!("expected CREATE TABLE, got {other:?}"),
        }
    }

    #[test]
    fn test_create_table_columns() {
        let ddl = create("CREATE TABLE public.orders (id int, amt numeric(10,2), note text)");
        assert_eq!(ddl.table, Table::new("public", "orders"));
        assert_eq!(ddl.persistence, Persistence::Permanent);
        assert!(!ddl.if_not_exists);
        let columns: Vec<_> = ddl.columns().collect();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].column_type.names, vec!["pg_catalog", "int4"]);
        assert_eq!(columns[1].column_type.typmods, vec![10, 2]);
        assert_eq!(columns[2].column_type.names, vec!["text"]);
    }

    #[test]
    fn test_create_table_clauses() {
        let ddl = create("CREATE TEMP TABLE scratch (id int)");
        assert_eq!(ddl.persistence, Persistence::Temporary);
        assert_eq!(ddl.table.schema, None);

        let ddl = create("CREATE UNLOGGED TABLE IF NOT EXISTS s.fast (id int)");
        assert_eq!(ddl.persistence, Persistence::Unlogged);
        assert!(ddl.if_not_exists);

        let ddl = create("CREATE TABLE m (id int, at date) PARTITION BY RANGE (at)");
        assert_eq!(ddl.partition_spec.as_deref(), Some("at"));

        let ddl = create("CREATE TABLE child (x int) INHERITS (parent)");
        assert_eq!(ddl.inherits, vec![Table::new("", "parent")]);

        let ddl = create("CREATE TABLE typed OF some_type");
        assert_eq!(ddl.of_type.as_deref(), Some("some_type"));

        let ddl = create("CREATE TABLE c (id int, PRIMARY KEY (id))");
        assert_eq!(
            ddl.elements[1],
            TableElement::Other("table constraint".to_string())
        );
    }

    #[test]
    fn test_drop_table() {
        match parse_one("DROP TABLE IF EXISTS a, s.b CASCADE") {
            ParsedDdl::DropTable {
                tables,
                if_exists,
                behavior,
            } => {
                assert_eq!(tables, vec![Table::new("", "a"), Table::new("s", "b")]);
                assert!(if_exists);
                assert_eq!(behavior, DropBehavior::Cascade);
            }
            other => panic!("expected DROP TABLE, got {other:?}"),
        }
    }

    #[test]
    fn test_other_statements_are_unsupported() {
        assert_eq!(
            parse_one("ALTER TABLE t ADD COLUMN x int"),
            ParsedDdl::Unsupported("AlterTableStmt".to_string())
        );
        assert!(matches!(parse_one("DROP INDEX idx"), ParsedDdl::Unsupported(_)));
    }

    #[test]
    fn test_multiple_statements() {
        let parsed = PgQueryParser
            .parse_ddl("CREATE TABLE a (id int); DROP TABLE b")
            .unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_statements_keep_their_own_text() {
        let parsed = PgQueryParser
            .parse_statements("CREATE TABLE a (id int);\n  INSERT INTO a VALUES (1);DROP TABLE a")
            .unwrap();
        let texts: Vec<_> = parsed.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["CREATE TABLE a (id int)", "INSERT INTO a VALUES (1)", "DROP TABLE a"]
        );
        assert_eq!(parsed[1].ddl, ParsedDdl::Unsupported("InsertStmt".to_string()));
    }
}
