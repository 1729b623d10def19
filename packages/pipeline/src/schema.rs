use sqlx::postgres::PgConnection;

use crate::error::Result;
use crate::models::Table;

pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {schema}")
}

pub fn drop_tables_sql(schema: &str) -> String {
    let tables: Vec<String> = Table::ALL
        .iter()
        .map(|t| format!("{schema}.{}", t.name()))
        .collect();
    format!("DROP TABLE IF EXISTS {}", tables.join(", "))
}

pub fn create_table_sql(schema: &str, table: Table) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                format!("    {} {} primary key", c.name, c.sql_type)
            } else {
                format!("    {} {}", c.name, c.sql_type)
            }
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {schema}.{}\n(\n{}\n)",
        table.name(),
        columns.join(",\n")
    )
}

/// Create the schema and the five star-schema tables if they are absent.
///
/// With `drop_before_create` the tables are dropped first, so the run that
/// follows replaces their contents completely. Each statement commits on
/// its own.
#[tracing::instrument(skip(conn))]
pub async fn prepare_schema(
    conn: &mut PgConnection,
    schema: &str,
    drop_before_create: bool,
) -> Result<()> {
    sqlx::query(&create_schema_sql(schema))
        .execute(&mut *conn)
        .await?;

    if drop_before_create {
        tracing::info!("dropping existing tables");
        sqlx::query(&drop_tables_sql(schema))
            .execute(&mut *conn)
            .await?;
    }

    for table in Table::ALL {
        sqlx::query(&create_table_sql(schema, table))
            .execute(&mut *conn)
            .await?;
        tracing::debug!(%table, "table ready");
    }

    tracing::info!("schema prepared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_customer_table_sql() {
        assert_eq!(
            create_table_sql("etl", Table::Customer),
            "CREATE TABLE IF NOT EXISTS etl.customer\n(\n    account_number varchar primary key,\n    customer varchar,\n    account_name varchar,\n    account_status varchar\n)"
        );
    }

    #[test]
    fn test_fact_tables_use_serial_click_id() {
        let sql = create_table_sql("etl", Table::AdClick);
        assert!(sql.contains("click_id serial primary key"));
        assert!(sql.contains("spend numeric"));

        let sql = create_table_sql("etl", Table::AdSearch);
        assert!(sql.contains("gregorian_date date"));
    }

    #[test]
    fn test_drop_tables_sql_names_all_tables() {
        assert_eq!(
            drop_tables_sql("staging"),
            "DROP TABLE IF EXISTS staging.customer, staging.ad_group, staging.ad_type, staging.ad_search, staging.ad_click"
        );
    }
}
