//! Declarative schema migration.
//!
//! The target schema is applied to a pristine in-memory database and the
//! live database is diffed against it through `sqlite_master`. New tables and
//! indices are created, tables whose definition changed are rebuilt with their
//! common columns copied over, and anything that would drop data is refused
//! unless destructive changes are allowed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use regex::Regex;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Connection, Pool, Row, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;

#[derive(Debug, Default)]
struct SchemaSnapshot {
    tables: BTreeMap<String, String>,
    indices: BTreeMap<String, String>,
    user_version: i64,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct TableChange {
    pub name: String,
    pub added_columns: Vec<String>,
    pub removed_columns: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SchemaDiff {
    pub new_tables: Vec<String>,
    pub removed_tables: Vec<String>,
    pub changed_tables: Vec<TableChange>,
    pub new_indices: Vec<String>,
    pub removed_indices: Vec<String>,
    pub changed_indices: Vec<String>,
    pub user_version: Option<i64>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.new_tables.is_empty()
            && self.removed_tables.is_empty()
            && self.changed_tables.is_empty()
            && self.new_indices.is_empty()
            && self.removed_indices.is_empty()
            && self.changed_indices.is_empty()
            && self.user_version.is_none()
    }

    pub fn is_destructive(&self) -> bool {
        !self.removed_tables.is_empty()
            || !self.removed_indices.is_empty()
            || self
                .changed_tables
                .iter()
                .any(|table| !table.removed_columns.is_empty())
    }
}

pub struct Migrator {
    pool: Pool<Sqlite>,
    target_schema: String,
    allow_destructive: bool,
}

impl Migrator {
    pub fn new(pool: Pool<Sqlite>, target_schema: &str, allow_destructive: bool) -> Self {
        Self {
            pool,
            target_schema: target_schema.to_string(),
            allow_destructive,
        }
    }

    /// Reads `ALLOW_DESTRUCTIVE_MIGRATIONS` (default `false`).
    pub fn from_env(pool: Pool<Sqlite>, target_schema: &str) -> Self {
        let allow_destructive = std::env::var("ALLOW_DESTRUCTIVE_MIGRATIONS")
            .ok()
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(false);

        Self::new(pool, target_schema, allow_destructive)
    }

    async fn pristine_snapshot(&self) -> Result<SchemaSnapshot, AppError> {
        let pristine = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        if !self.target_schema.trim().is_empty() {
            sqlx::raw_sql(&self.target_schema)
                .execute(&pristine)
                .await
                .map_err(|e| AppError::Internal(format!("Invalid target schema: {}", e)))?;
        }

        let mut conn = pristine.acquire().await?;
        let snapshot = snapshot(&mut conn).await?;
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    pub async fn diff(&self) -> Result<SchemaDiff, AppError> {
        let target = self.pristine_snapshot().await?;
        let mut conn = self.pool.acquire().await?;
        compute_diff(&mut conn, &target).await
    }

    /// Brings the live database in line with the target schema. Returns
    /// whether anything changed.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<bool, AppError> {
        info!("Starting declarative database migration");

        let target = self.pristine_snapshot().await?;
        let mut conn = self.pool.acquire().await?;

        // Dropping the old copy of a rebuilt table must not cascade into the
        // tables that reference it.
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;
        let result = self.migrate_in(&mut conn, &target).await;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await?;

        result
    }

    async fn migrate_in(
        &self,
        conn: &mut SqliteConnection,
        target: &SchemaSnapshot,
    ) -> Result<bool, AppError> {
        let mut tx = conn.begin().await?;

        let diff = compute_diff(&mut tx, target).await?;
        if diff.is_empty() {
            tx.commit().await?;
            info!("No schema changes needed");
            return Ok(false);
        }

        if diff.is_destructive() && !self.allow_destructive {
            tx.rollback().await?;
            return Err(AppError::Internal(format!(
                "Migration would remove data (tables {:?}, indices {:?}, columns {:?}); set ALLOW_DESTRUCTIVE_MIGRATIONS=true to permit this",
                diff.removed_tables,
                diff.removed_indices,
                diff.changed_tables
                    .iter()
                    .filter(|t| !t.removed_columns.is_empty())
                    .map(|t| format!("{}.{:?}", t.name, t.removed_columns))
                    .collect::<Vec<_>>(),
            )));
        }

        let mut statements = 0u32;

        for name in &diff.new_tables {
            apply(&mut tx, &format!("create table {}", name), &target.tables[name]).await?;
            statements += 1;
        }

        for change in &diff.changed_tables {
            statements += rebuild_table(&mut tx, change, &target.tables[&change.name]).await?;
        }

        for name in &diff.removed_tables {
            apply(&mut tx, &format!("drop table {}", name), &format!("DROP TABLE {}", name))
                .await?;
            statements += 1;
        }

        // A rebuilt table loses its indices, so every target index is
        // recreated unless it still exists unchanged.
        let live_indices = snapshot(&mut tx).await?.indices;
        for (name, sql) in &live_indices {
            let keep = target
                .indices
                .get(name)
                .is_some_and(|target_sql| normalize_sql(target_sql) == normalize_sql(sql));
            if !keep {
                apply(&mut tx, &format!("drop index {}", name), &format!("DROP INDEX {}", name))
                    .await?;
                statements += 1;
            }
        }
        let live_indices = snapshot(&mut tx).await?.indices;
        for (name, sql) in &target.indices {
            if !live_indices.contains_key(name) {
                apply(&mut tx, &format!("create index {}", name), sql).await?;
                statements += 1;
            }
        }

        if let Some(version) = diff.user_version {
            apply(
                &mut tx,
                "set user_version",
                &format!("PRAGMA user_version = {}", version),
            )
            .await?;
            statements += 1;
        }

        tx.commit().await?;
        info!(statements, "Migration completed");
        Ok(statements > 0)
    }
}

async fn apply(conn: &mut SqliteConnection, description: &str, sql: &str) -> Result<(), AppError> {
    info!("Database migration: {} with SQL:\n{}", description, sql);
    sqlx::query(sql).execute(&mut *conn).await?;
    Ok(())
}

async fn rebuild_table(
    conn: &mut SqliteConnection,
    change: &TableChange,
    target_sql: &str,
) -> Result<u32, AppError> {
    let temp_name = format!("{}_migration_new", change.name);
    let header = Regex::new(&format!(
        r#"(?i)^\s*CREATE\s+TABLE\s+(IF\s+NOT\s+EXISTS\s+)?"?{}"?"#,
        regex::escape(&change.name)
    ))
    .map_err(|e| AppError::Internal(format!("Bad table name pattern: {}", e)))?;
    let temp_sql = header
        .replace(target_sql, format!("CREATE TABLE {}", temp_name))
        .to_string();

    apply(conn, &format!("create staging table for {}", change.name), &temp_sql).await?;

    let live_columns = table_columns(conn, &change.name).await?;
    let target_columns = table_columns(conn, &temp_name).await?;
    let common: Vec<&String> = live_columns.intersection(&target_columns).collect();

    let mut statements = 1;
    if !common.is_empty() {
        let columns = common
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        apply(
            conn,
            &format!("copy rows into new {}", change.name),
            &format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                temp_name, columns, columns, change.name
            ),
        )
        .await?;
        statements += 1;
    }

    apply(
        conn,
        &format!("drop old {}", change.name),
        &format!("DROP TABLE {}", change.name),
    )
    .await?;
    apply(
        conn,
        &format!("rename staging table to {}", change.name),
        &format!("ALTER TABLE {} RENAME TO {}", temp_name, change.name),
    )
    .await?;

    Ok(statements + 2)
}

async fn snapshot(conn: &mut SqliteConnection) -> Result<SchemaSnapshot, AppError> {
    let mut snapshot = SchemaSnapshot::default();

    let rows = sqlx::query(
        "SELECT type, name, sql FROM sqlite_master
         WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(&mut *conn)
    .await?;

    for row in rows {
        let kind: String = row.get(0);
        let name: String = row.get(1);
        let sql: String = row.get(2);
        match kind.as_str() {
            "table" => {
                snapshot.tables.insert(name, sql);
            }
            "index" => {
                snapshot.indices.insert(name, sql);
            }
            _ => {}
        }
    }

    snapshot.user_version = sqlx::query("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await?
        .get::<i64, _>(0);

    Ok(snapshot)
}

async fn table_columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<BTreeSet<String>, AppError> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(|row| row.get::<String, _>(1)).collect())
}

async fn compute_diff(
    conn: &mut SqliteConnection,
    target: &SchemaSnapshot,
) -> Result<SchemaDiff, AppError> {
    let live = snapshot(conn).await?;
    let mut diff = SchemaDiff::default();

    for (name, target_sql) in &target.tables {
        match live.tables.get(name) {
            None => diff.new_tables.push(name.clone()),
            Some(live_sql) if normalize_sql(live_sql) != normalize_sql(target_sql) => {
                let live_columns = table_columns(conn, name).await?;
                let target_columns = target_columns(target_sql, name).await?;
                diff.changed_tables.push(TableChange {
                    name: name.clone(),
                    added_columns: target_columns.difference(&live_columns).cloned().collect(),
                    removed_columns: live_columns.difference(&target_columns).cloned().collect(),
                });
            }
            Some(_) => {}
        }
    }
    diff.removed_tables = live
        .tables
        .keys()
        .filter(|name| !target.tables.contains_key(*name))
        .cloned()
        .collect();

    for (name, target_sql) in &target.indices {
        match live.indices.get(name) {
            None => diff.new_indices.push(name.clone()),
            Some(live_sql) if normalize_sql(live_sql) != normalize_sql(target_sql) => {
                diff.changed_indices.push(name.clone())
            }
            Some(_) => {}
        }
    }
    diff.removed_indices = live
        .indices
        .keys()
        .filter(|name| !target.indices.contains_key(*name))
        .cloned()
        .collect();

    if live.user_version != target.user_version && target.user_version != 0 {
        diff.user_version = Some(target.user_version);
    }

    Ok(diff)
}

// Column names of a table that only exists in the target schema.
async fn target_columns(table_sql: &str, table: &str) -> Result<BTreeSet<String>, AppError> {
    let scratch = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query(table_sql).execute(&scratch).await?;
    let mut conn = scratch.acquire().await?;
    table_columns(&mut conn, table).await
}

pub fn normalize_sql(sql: &str) -> String {
    static PATTERNS: once_cell::sync::Lazy<[(Regex, &'static str); 4]> =
        once_cell::sync::Lazy::new(|| {
            [
                (Regex::new(r"--[^\n]*(\n|$)").expect("comment pattern"), " "),
                (Regex::new(r"\s+").expect("whitespace pattern"), " "),
                (Regex::new(r" *([(),]) *").expect("punctuation pattern"), "$1"),
                (Regex::new(r#""(\w+)""#).expect("quote pattern"), "$1"),
            ]
        });

    let mut normalized = sql.to_string();
    for (pattern, replacement) in PATTERNS.iter() {
        normalized = pattern.replace_all(&normalized, *replacement).to_string();
    }
    normalized.trim().to_string()
}

pub fn read_schema_file(path: &Path) -> Result<String, AppError> {
    Ok(std::fs::read_to_string(path)?)
}
