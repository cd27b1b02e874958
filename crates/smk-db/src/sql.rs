/// Bookkeeping statements for one table and dialect.
///
/// The table name is spliced in verbatim; `BackendConfig::new` has already
/// validated it as a plain identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookkeepingSql {
    pub create_table: String,
    pub select_applied: String,
    pub insert: String,
    pub delete: String,
}

impl BookkeepingSql {
    pub fn postgres(table: &str) -> Self {
        Self {
            create_table: format!(
                r#"
                create table if not exists {table} (
                    version varchar(255) primary key,
                    applied_at timestamp with time zone not null default current_timestamp
                )
                "#
            ),
            // applied_at is the transaction start time; one migration per
            // transaction keeps it strictly increasing in practice.
            select_applied: format!("select version from {table} order by applied_at, version"),
            insert: format!("insert into {table} (version) values ($1)"),
            delete: format!("delete from {table} where version = $1"),
        }
    }

    pub fn sqlite(table: &str) -> Self {
        Self {
            create_table: format!(
                r#"
                create table if not exists {table} (
                    version text primary key,
                    applied_at datetime not null default current_timestamp
                )
                "#
            ),
            // current_timestamp has second resolution; rowid breaks ties in
            // insertion order.
            select_applied: format!("select version from {table} order by applied_at, rowid"),
            insert: format!("insert into {table} (version) values (?)"),
            delete: format!("delete from {table} where version = ?"),
        }
    }
}
