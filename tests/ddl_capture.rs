mod common;

// Requires a running Postgres with wal_level=logical; run with --ignored.

use pg_follower::ddl::{CaptureOutcome, CatalogLookup, DDL_MESSAGE_PREFIX, DdlCapture};
use pg_follower::logical_replication::Slot;
use serial_test::serial;

fn peek_changes(client: &mut postgres::Client, slot: &Slot) -> Vec<String> {
    client
        .query(
            "SELECT data FROM pg_logical_slot_peek_changes($1, NULL, NULL)",
            &[&slot.name],
        )
        .unwrap()
        .iter()
        .map(|row| row.get::<_, String>(0))
        .collect()
}

fn peek_messages(client: &mut postgres::Client, slot: &Slot) -> Vec<String> {
    peek_changes(client, slot)
        .into_iter()
        .filter(|line| line.starts_with("message:"))
        .collect()
}

fn create_slot(client: &mut postgres::Client) -> Slot {
    let slot = Slot::new(&common::unique_slot_name(), "test_decoding");
    client
        .query(
            "SELECT pg_create_logical_replication_slot($1, $2)",
            &[&slot.name, &slot.plugin],
        )
        .unwrap();
    slot
}

fn drop_slot(client: &mut postgres::Client, slot: &Slot) {
    client
        .query("SELECT pg_drop_replication_slot($1)", &[&slot.name])
        .unwrap();
}

#[test]
#[ignore]
#[serial]
fn test_captured_ddl_is_executed_and_published() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    let slot = create_slot(&mut client);

    let outcomes = DdlCapture::new("public")
        .execute(&mut client, "CREATE TABLE orders (id int, amt numeric(10,2))")
        .unwrap();
    assert_eq!(
        outcomes,
        vec![CaptureOutcome::Publish(
            "CREATE TABLE  public.orders ( id pg_catalog.int4, amt pg_catalog.numeric(10,2) );"
                .to_string()
        )]
    );
    let exists: bool = client
        .query_one("SELECT to_regclass('public.orders') IS NOT NULL", &[])
        .unwrap()
        .get(0);
    assert!(exists);

    let messages = peek_messages(&mut client, &slot);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("transactional: 1"));
    assert!(messages[0].contains(&format!("prefix: {DDL_MESSAGE_PREFIX}")));
    assert!(messages[0].contains("CREATE TABLE  public.orders"));

    drop_slot(&mut client, &slot);
}

#[test]
#[ignore]
#[serial]
fn test_drop_resolves_persistence_from_catalog() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    client
        .batch_execute("CREATE TABLE keep (id int); CREATE TEMP TABLE scratch (id int)")
        .unwrap();

    let capture = DdlCapture::new("public");
    let outcomes = capture
        .capture("DROP TABLE keep, scratch", &mut CatalogLookup(&mut client))
        .unwrap();
    assert_eq!(
        outcomes,
        vec![CaptureOutcome::Publish("DROP TABLE public.keep RESTRICT;".to_string())]
    );

    let outcomes = capture
        .capture("DROP TABLE scratch", &mut CatalogLookup(&mut client))
        .unwrap();
    assert_eq!(outcomes, vec![CaptureOutcome::Skipped("DROP TABLE".to_string())]);
}

#[test]
#[ignore]
#[serial]
fn test_rejected_ddl_still_executes_upstream() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    let outcomes = DdlCapture::new("public")
        .execute(
            &mut client,
            "CREATE TABLE measurements (at date) PARTITION BY RANGE (at)",
        )
        .unwrap();
    assert!(matches!(outcomes[0], CaptureOutcome::Rejected { .. }));
    let exists: bool = client
        .query_one("SELECT to_regclass('public.measurements') IS NOT NULL", &[])
        .unwrap()
        .get(0);
    assert!(exists);
}

#[test]
#[ignore]
#[serial]
fn test_temp_table_dropped_in_the_same_input_is_not_published() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    let slot = create_slot(&mut client);

    let outcomes = DdlCapture::new("public")
        .execute(&mut client, "CREATE TEMP TABLE t (id int); DROP TABLE t")
        .unwrap();
    assert!(matches!(outcomes[0], CaptureOutcome::Rejected { .. }));
    assert_eq!(outcomes[1], CaptureOutcome::Skipped("DROP TABLE".to_string()));
    assert!(peek_messages(&mut client, &slot).is_empty());

    drop_slot(&mut client, &slot);
}

#[test]
#[ignore]
#[serial]
fn test_ddl_message_precedes_rows_written_after_it() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    let slot = create_slot(&mut client);

    DdlCapture::new("public")
        .execute(&mut client, "CREATE TABLE a (id int); INSERT INTO a VALUES (1)")
        .unwrap();

    let changes = peek_changes(&mut client, &slot);
    let message = changes
        .iter()
        .position(|line| line.starts_with("message:") && line.contains("CREATE TABLE  public.a"))
        .expect("DDL message decoded");
    let insert = changes
        .iter()
        .position(|line| line.starts_with("table public.a: INSERT"))
        .expect("row change decoded");
    assert!(message < insert, "{changes:?}");

    drop_slot(&mut client, &slot);
}

#[test]
#[ignore]
#[serial]
fn test_created_table_is_published_in_the_schema_it_landed_in() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    client
        .batch_execute("CREATE SCHEMA app; SET search_path = app")
        .unwrap();

    let outcomes = DdlCapture::new("public")
        .execute(&mut client, "CREATE TABLE orders (id int)")
        .unwrap();
    assert_eq!(
        outcomes,
        vec![CaptureOutcome::Publish(
            "CREATE TABLE  app.orders ( id pg_catalog.int4 );".to_string()
        )]
    );

    let outcomes = DdlCapture::new("public")
        .execute(&mut client, "DROP TABLE orders")
        .unwrap();
    assert_eq!(
        outcomes,
        vec![CaptureOutcome::Publish("DROP TABLE app.orders RESTRICT;".to_string())]
    );
}
