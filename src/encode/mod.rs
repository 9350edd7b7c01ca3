pub mod literal;
pub mod statement;

pub use literal::{TypeClass, encode_literal};
pub use statement::{
    Attribute, Datum, Relation, RowChange, encode_change, encode_create_table, encode_delete,
    encode_drop_table, encode_insert, encode_update, project,
};
