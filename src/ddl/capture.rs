// DDL capture: turn executed DDL into canonical statements and publish them
// as transactional logical messages, so they travel in commit order with the
// row changes of the same transaction.

use anyhow::Result;
use postgres::GenericClient;
use tracing::{debug, info, warn};

use crate::ddl::description::{DropDescription, DropTarget, Persistence};
use crate::ddl::guard;
use crate::encode::{encode_create_table, encode_drop_table};
use crate::error::RejectReason;
use crate::lsn::Lsn;
use crate::pg_query_parser::PgQueryParser;
use crate::table::Table;
use crate::{Parse, ParsedDdl};

/// Prefix identifying logical messages produced by this capture step.
pub const DDL_MESSAGE_PREFIX: &str = "pg_follower";

/// Resolves a possibly unqualified relation name to its catalog entry.
pub trait PersistenceLookup {
    fn resolve(&mut self, table: &Table) -> Result<Option<DropTarget>>;
}

/// Catalog-backed lookup through any client or open transaction.
pub struct CatalogLookup<'a, C: GenericClient>(pub &'a mut C);

impl<C: GenericClient> PersistenceLookup for CatalogLookup<'_, C> {
    fn resolve(&mut self, table: &Table) -> Result<Option<DropTarget>> {
        let row = self.0.query_opt(
            "SELECT n.nspname, c.relname, c.relpersistence
             FROM pg_class c
             JOIN pg_namespace n ON n.oid = c.relnamespace
             WHERE c.oid = to_regclass($1)",
            &[&table.to_string()],
        )?;
        Ok(row.and_then(|row| {
            let schema: String = row.get(0);
            let name: String = row.get(1);
            let code: i8 = row.get(2);
            Persistence::from_code(&(code as u8 as char).to_string()).map(|persistence| {
                DropTarget {
                    table: Table::new(&schema, &name),
                    persistence,
                }
            })
        }))
    }
}

/// An open upstream transaction that captured statements run and publish in.
pub trait CaptureSession: PersistenceLookup {
    fn run(&mut self, statement: &str) -> Result<()>;
    fn publish(&mut self, prefix: &str, text: &str) -> Result<Lsn>;
}

impl<C: GenericClient> CaptureSession for CatalogLookup<'_, C> {
    fn run(&mut self, statement: &str) -> Result<()> {
        self.0.batch_execute(statement)?;
        Ok(())
    }

    fn publish(&mut self, prefix: &str, text: &str) -> Result<Lsn> {
        publish(&mut *self.0, prefix, text)
    }
}

/// No catalog at hand: names are placed in the default schema and DROP
/// targets are taken as permanent tables.
pub struct NoCatalog;

impl PersistenceLookup for NoCatalog {
    fn resolve(&mut self, _table: &Table) -> Result<Option<DropTarget>> {
        Ok(None)
    }
}

/// What the capture step decided for one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Canonical text to publish.
    Publish(String),
    /// Outside the supported subset; dropped.
    Rejected { table: Table, reason: RejectReason },
    /// Not a replicated command, or nothing left to replicate.
    Skipped(String),
}

pub struct DdlCapture<P: Parse = PgQueryParser> {
    parser: P,
    default_schema: String,
    prefix: String,
}

impl DdlCapture<PgQueryParser> {
    pub fn new(default_schema: &str) -> Self {
        Self::with_parser(PgQueryParser, default_schema)
    }
}

impl<P: Parse> DdlCapture<P> {
    pub fn with_parser(parser: P, default_schema: &str) -> Self {
        DdlCapture {
            parser,
            default_schema: default_schema.to_string(),
            prefix: DDL_MESSAGE_PREFIX.to_string(),
        }
    }

    /// Decide, statement by statement, what would be published for `sql`
    /// without running it.
    pub fn capture(
        &self,
        sql: &str,
        lookup: &mut impl PersistenceLookup,
    ) -> Result<Vec<CaptureOutcome>> {
        let mut outcomes = Vec::new();
        for statement in self.parser.parse_statements(sql)? {
            outcomes.push(self.decide(statement.ddl, lookup)?);
        }
        Ok(outcomes)
    }

    /// Execute `sql` on the upstream and publish the captured statements in
    /// the same transaction.
    pub fn execute(&self, client: &mut postgres::Client, sql: &str) -> Result<Vec<CaptureOutcome>> {
        let mut transaction = client.transaction()?;
        let outcomes = self.execute_in(&mut CatalogLookup(&mut transaction), sql)?;
        transaction.commit()?;
        Ok(outcomes)
    }

    /// Run `sql` one statement at a time, publishing each captured statement
    /// right after it ran so the message lands between the row changes
    /// around it.
    pub fn execute_in(
        &self,
        session: &mut impl CaptureSession,
        sql: &str,
    ) -> Result<Vec<CaptureOutcome>> {
        let mut outcomes = Vec::new();
        for statement in self.parser.parse_statements(sql)? {
            let outcome = match statement.ddl {
                // Targets are looked up while they still exist.
                parsed @ ParsedDdl::DropTable { .. } => {
                    let outcome = self.decide(parsed, session)?;
                    session.run(&statement.text)?;
                    outcome
                }
                parsed => {
                    session.run(&statement.text)?;
                    self.decide(parsed, session)?
                }
            };
            if let CaptureOutcome::Publish(text) = &outcome {
                let lsn = session.publish(&self.prefix, text)?;
                info!(%lsn, statement = %text, "published DDL");
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn decide(&self, parsed: ParsedDdl, lookup: &mut impl PersistenceLookup) -> Result<CaptureOutcome> {
        let outcome = match parsed {
            ParsedDdl::CreateTable(mut ddl) => match guard::verify(&ddl) {
                Ok(()) => {
                    ddl.table = match lookup.resolve(&ddl.table)? {
                        Some(created) => created.table,
                        None => ddl.table.qualified(&self.default_schema),
                    };
                    let text = encode_create_table(&ddl);
                    debug!(statement = %text, "deparse result");
                    CaptureOutcome::Publish(text)
                }
                Err(reason) => {
                    warn!(table = %ddl.table, %reason, "CREATE TABLE not replicated");
                    CaptureOutcome::Rejected {
                        table: ddl.table,
                        reason,
                    }
                }
            },
            ParsedDdl::DropTable {
                tables,
                if_exists,
                behavior,
            } => {
                let mut targets = Vec::with_capacity(tables.len());
                for table in tables {
                    let target = match lookup.resolve(&table)? {
                        Some(target) => target,
                        None => DropTarget {
                            table: table.qualified(&self.default_schema),
                            persistence: Persistence::Permanent,
                        },
                    };
                    targets.push(target);
                }
                let drop = DropDescription {
                    targets,
                    if_exists,
                    behavior,
                };
                match encode_drop_table(&drop) {
                    Some(text) => {
                        debug!(statement = %text, "deparse result");
                        CaptureOutcome::Publish(text)
                    }
                    None => CaptureOutcome::Skipped("DROP TABLE".to_string()),
                }
            }
            ParsedDdl::Unsupported(kind) => {
                warn!(command = %kind, "this DDL is not supported");
                CaptureOutcome::Skipped(kind)
            }
        };
        Ok(outcome)
    }
}

/// Emit `text` as a transactional logical message tagged with `prefix`.
pub fn publish<C: GenericClient>(client: &mut C, prefix: &str, text: &str) -> Result<Lsn> {
    let row = client.query_one(
        "SELECT pg_logical_emit_message(true, $1::text, $2::text)",
        &[&prefix, &text],
    )?;
    let lsn: postgres::types::PgLsn = row.get(0);
    Ok(Lsn(u64::from(lsn)))
}
