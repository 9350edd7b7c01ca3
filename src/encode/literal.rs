// Rendering of column values as SQL literals.

/// Coarse classification of a column type, enough to decide quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Numeric,
    Bit,
    Boolean,
    Generic,
}

impl TypeClass {
    /// Classify a type by its (possibly schema-qualified) name, e.g. `int4`,
    /// `pg_catalog.numeric` or `bit varying`.
    pub fn from_type_name(name: &str) -> Self {
        let name = name.strip_prefix("pg_catalog.").unwrap_or(name);
        match name {
            "int2" | "int4" | "int8" | "smallint" | "integer" | "int" | "bigint" | "oid"
            | "float4" | "float8" | "real" | "double precision" | "numeric" | "decimal" => {
                TypeClass::Numeric
            }
            "bit" | "varbit" | "bit varying" => TypeClass::Bit,
            "bool" | "boolean" => TypeClass::Boolean,
            _ => TypeClass::Generic,
        }
    }
}

impl From<&postgres::types::Type> for TypeClass {
    fn from(ty: &postgres::types::Type) -> Self {
        TypeClass::from_type_name(ty.name())
    }
}

/// Render `text`, the canonical output form of a value, as a literal.
/// Special float values (Inf, NaN) are passed through like any number.
pub fn encode_literal(class: TypeClass, text: &str) -> String {
    match class {
        TypeClass::Numeric => text.to_string(),
        TypeClass::Bit => format!("B'{text}'"),
        TypeClass::Boolean => {
            if text == "t" {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        TypeClass::Generic => format!("'{}'", text.replace('\'', "''")),
    }
}
