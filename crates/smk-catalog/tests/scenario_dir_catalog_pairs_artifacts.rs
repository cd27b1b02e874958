use smk_catalog::{DirCatalog, EmbeddedCatalog};
use smk_core::Catalog;
use std::fs;

fn write(dir: &std::path::Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn dir_catalog_pairs_up_and_down_files_sorted_by_identifier() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    write(root, "002_add_email.up.sql", "alter table users add column email text");
    write(root, "002_add_email.down.sql", "alter table users drop column email");
    write(root, "001_create_users.sql", "create table users (id int primary key)");
    write(root, "001_create_users.down.sql", "drop table users");
    write(root, "003_seed.sql", "insert into users (id) values (1)");
    write(root, "notes.txt", "not a migration");

    let entries = DirCatalog::new(root).entries()?;
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["001_create_users", "002_add_email", "003_seed"]);

    assert_eq!(entries[0].forward, b"create table users (id int primary key)");
    assert_eq!(entries[0].reverse.as_deref(), Some(&b"drop table users"[..]));
    assert!(entries[1].is_reversible());
    // Bare single-file naming is forward-only.
    assert!(entries[2].reverse.is_none());
    assert!(!entries[2].is_reversible());
    Ok(())
}

#[test]
fn dir_catalog_walks_subdirectories() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let nested = tmp.path().join("2024");
    fs::create_dir_all(&nested)?;
    write(tmp.path(), "002_b.sql", "select 2");
    write(&nested, "001_a.up.sql", "select 1");
    write(&nested, "001_a.down.sql", "select -1");

    let entries = DirCatalog::new(tmp.path()).entries()?;
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["001_a", "002_b"]);
    assert!(entries[0].is_reversible());
    Ok(())
}

#[test]
fn missing_directory_is_an_empty_catalog() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let entries = DirCatalog::new(tmp.path().join("does-not-exist")).entries()?;
    assert!(entries.is_empty());
    Ok(())
}

#[test]
fn duplicate_forward_artifacts_fail_the_read() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "001_a.sql", "select 1");
    write(tmp.path(), "001_a.up.sql", "select 1");

    let err = DirCatalog::new(tmp.path()).entries().unwrap_err();
    assert!(err.to_string().contains("duplicate forward artifact"));
}

#[test]
fn reverse_only_identifier_has_empty_forward_body() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write(tmp.path(), "001_a.down.sql", "drop table a");

    let entries = DirCatalog::new(tmp.path()).entries()?;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].forward.is_empty());
    Ok(())
}

static EMBEDDED: &[(&str, &str)] = &[
    ("migrations/002_orders.up.sql", "create table orders (id int)"),
    ("migrations/001_users.up.sql", "create table users (id int)"),
    ("migrations/001_users.down.sql", "drop table users"),
    ("migrations/README.md", "docs"),
];

#[test]
fn embedded_catalog_uses_the_same_pairing_rules() -> anyhow::Result<()> {
    let entries = EmbeddedCatalog::new(EMBEDDED).entries()?;
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["001_users", "002_orders"]);
    assert!(entries[0].is_reversible());
    assert!(!entries[1].is_reversible());
    Ok(())
}
