use std::path::Path;

use pykids::db::migrations::read_schema_file;
use pykids::db::{CURRENT_SCHEMA, Migrator, SchemaDiff};
use anyhow::Context;
use sqlx::SqlitePool;

#[tokio::main]
async fn main() {
    let diff = match schema_diff().await {
        Ok(diff) => diff,
        Err(e) => {
            eprintln!("Failed to check for destructive changes: {:#}", e);
            std::process::exit(2);
        }
    };

    if !diff.is_destructive() {
        println!("Changes passed the check ✓");
        return;
    }

    println!("Destructive changes detected:");
    print_string_vec(&diff.removed_tables, "    Table removed:");
    print_string_vec(&diff.removed_indices, "    Index removed:");
    for table in diff.changed_tables.iter().filter(|t| !t.removed_columns.is_empty()) {
        let table_prefix = format!("    Column removed from table {}:", table.name);
        print_string_vec(&table.removed_columns, &table_prefix);
    }
    std::process::exit(1);
}

fn print_string_vec(vec: &[String], prefix: &str) {
    for string in vec {
        println!("{} {}", prefix, string)
    }
}

/// Diffs `DATABASE_URL` against the schema in `SCHEMA_PATH`, or against the
/// built-in schema when no path is given.
async fn schema_diff() -> anyhow::Result<SchemaDiff> {
    let schema = match std::env::var("SCHEMA_PATH") {
        Ok(path) => read_schema_file(Path::new(&path))
            .with_context(|| format!("reading schema file {}", path))?,
        Err(_) => CURRENT_SCHEMA.to_string(),
    };

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let pool = SqlitePool::connect(&database_url)
        .await
        .with_context(|| format!("connecting to {}", database_url))?;

    let diff = Migrator::new(pool, &schema, false).diff().await?;
    Ok(diff)
}
