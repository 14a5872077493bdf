//! Static description of the local schema
//!
//! Entity tables store each record as a JSON document keyed by `id`. Secondary
//! indexes are expression indexes over `json_extract(data, '$.<field>')`.
//! Table and field names reach SQL only after being looked up here.

use crate::error::{Error, Result};

/// Reserved table holding pending mutations
pub const SYNC_QUEUE_TABLE: &str = "sync_queue";

/// Reserved table holding mutations that exhausted their retries
pub const DEAD_LETTER_TABLE: &str = "sync_dead_letter";

/// An entity table and its indexed JSON fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub indexes: &'static [&'static str],
}

impl TableDef {
    pub fn has_index(&self, field: &str) -> bool {
        self.indexes.contains(&field)
    }

    /// Name of the expression index over `field`
    pub fn index_name(&self, field: &str) -> String {
        format!("idx_{}_{field}", self.name)
    }
}

/// Entity tables of the scheduling dashboard
pub const ENTITY_TABLES: &[TableDef] = &[
    TableDef {
        name: "agendamentos",
        indexes: &["cliente_id", "profissional_id", "servico_id", "status", "data"],
    },
    TableDef {
        name: "clientes",
        indexes: &["email", "telefone"],
    },
    TableDef {
        name: "profissionais",
        indexes: &["status"],
    },
    TableDef {
        name: "servicos",
        indexes: &["categoria"],
    },
];

/// Look up an entity table by name
pub fn table(name: &str) -> Result<&'static TableDef> {
    ENTITY_TABLES
        .iter()
        .find(|table| table.name == name)
        .ok_or_else(|| Error::UnknownTable(name.to_string()))
}

/// Look up an indexed field, returning the owning table
pub fn indexed_field(table_name: &str, field: &str) -> Result<&'static TableDef> {
    let table = table(table_name)?;
    if table.has_index(field) {
        Ok(table)
    } else {
        Err(Error::UnknownIndex {
            table: table_name.to_string(),
            field: field.to_string(),
        })
    }
}
