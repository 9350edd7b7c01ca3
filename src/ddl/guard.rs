// Checks that a captured CREATE TABLE can be deparsed faithfully.

use crate::ddl::description::{DdlDescription, Persistence, TableElement};
use crate::error::RejectReason;

/// Accept or reject a `CREATE TABLE` description. Checks run in a fixed
/// order and the first failing one is reported.
pub fn verify(ddl: &DdlDescription) -> Result<(), RejectReason> {
    if ddl.persistence != Persistence::Permanent {
        return Err(RejectReason::NotPermanent);
    }
    if ddl.partition_spec.is_some() {
        return Err(RejectReason::Partitioned);
    }
    if ddl.partition_bound {
        return Err(RejectReason::PartitionOf);
    }
    if !ddl.inherits.is_empty() {
        return Err(RejectReason::Inherited);
    }
    if ddl.of_type.is_some() {
        return Err(RejectReason::Typed);
    }
    for element in &ddl.elements {
        match element {
            TableElement::Other(kind) => return Err(RejectReason::TableElement(kind.clone())),
            TableElement::Column(column) => {
                if column.column_type.names.iter().all(|n| n.is_empty()) {
                    return Err(RejectReason::MissingTypeName(column.name.clone()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::description::{ColumnDefinition, ColumnType};
    use crate::table::Table;

    fn accepted() -> DdlDescription {
        let mut ddl = DdlDescription::new(Table::new("public", "orders"));
        ddl.elements = vec![
            TableElement::Column(ColumnDefinition {
                name: "id".to_string(),
                column_type: ColumnType::named(&["int"]),
            }),
            TableElement::Column(ColumnDefinition {
                name: "amt".to_string(),
                column_type: ColumnType::named(&["numeric"]),
            }),
        ];
        ddl
    }

    #[test]
    fn test_accepts_plain_table() {
        assert_eq!(verify(&accepted()), Ok(()));
    }

    #[test]
    fn test_rejects_partition_spec() {
        let mut ddl = accepted();
        ddl.partition_spec = Some("RANGE".to_string());
        assert_eq!(verify(&ddl), Err(RejectReason::Partitioned));
    }

    #[test]
    fn test_rejects_each_unsupported_clause() {
        let mut ddl = accepted();
        ddl.persistence = Persistence::Unlogged;
        assert_eq!(verify(&ddl), Err(RejectReason::NotPermanent));

        let mut ddl = accepted();
        ddl.partition_bound = true;
        assert_eq!(verify(&ddl), Err(RejectReason::PartitionOf));

        let mut ddl = accepted();
        ddl.inherits.push(Table::new("public", "parent"));
        assert_eq!(verify(&ddl), Err(RejectReason::Inherited));

        let mut ddl = accepted();
        ddl.of_type = Some("order_type".to_string());
        assert_eq!(verify(&ddl), Err(RejectReason::Typed));

        let mut ddl = accepted();
        ddl.elements.push(TableElement::Other("LIKE".to_string()));
        assert_eq!(verify(&ddl), Err(RejectReason::TableElement("LIKE".to_string())));

        let mut ddl = accepted();
        ddl.elements.push(TableElement::Column(ColumnDefinition {
            name: "broken".to_string(),
            column_type: ColumnType::default(),
        }));
        assert_eq!(verify(&ddl), Err(RejectReason::MissingTypeName("broken".to_string())));
    }

    #[test]
    fn test_first_failing_check_wins() {
        let mut ddl = accepted();
        ddl.persistence = Persistence::Temporary;
        ddl.inherits.push(Table::new("public", "parent"));
        ddl.of_type = Some("t".to_string());
        assert_eq!(verify(&ddl), Err(RejectReason::NotPermanent));
    }
}
