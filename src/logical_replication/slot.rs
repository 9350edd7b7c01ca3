// Slot management for logical replication

use crate::lsn::Lsn;

pub const DEFAULT_SLOT_NAME: &str = "pg_follower_tmp_slot";
pub const DEFAULT_PLUGIN_NAME: &str = "pg_follower";

/// A temporary logical slot, dropped by the server when the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub plugin: String,
}

impl Default for Slot {
    fn default() -> Self {
        Slot::new(DEFAULT_SLOT_NAME, DEFAULT_PLUGIN_NAME)
    }
}

impl Slot {
    pub fn new(name: &str, plugin: &str) -> Self {
        Slot {
            name: name.to_string(),
            plugin: plugin.to_string(),
        }
    }

    pub fn create_command(&self) -> String {
        format!(
            "CREATE_REPLICATION_SLOT {} TEMPORARY LOGICAL {}",
            self.name, self.plugin
        )
    }

    pub fn start_command(&self, start_lsn: Lsn) -> String {
        format!("START_REPLICATION SLOT {} LOGICAL {}", self.name, start_lsn)
    }

    /// Fetch the confirmed_flush_lsn for this slot from the database.
    pub fn confirmed_flush_lsn<C: postgres::GenericClient>(
        &self,
        client: &mut C,
    ) -> anyhow::Result<Option<Lsn>> {
        let row = client.query_opt(
            "SELECT confirmed_flush_lsn FROM pg_replication_slots WHERE slot_name = $1",
            &[&self.name],
        )?;
        Ok(row
            .and_then(|row| row.get::<_, Option<postgres::types::PgLsn>>(0))
            .map(|lsn| Lsn(u64::from(lsn))))
    }
}
