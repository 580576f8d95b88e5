use once_cell::sync::OnceCell;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};

static DB_CONN: OnceCell<DatabaseConnection> = OnceCell::new();

pub async fn initialize_database(db_path: Option<&str>) -> anyhow::Result<()> {
    if DB_CONN.get().is_some() {
        return Ok(());
    }

    let db_file = db_path.unwrap_or("target/db/app.db");
    if let Some(parent) = std::path::Path::new(db_file).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let absolute_path = if std::path::Path::new(db_file).is_absolute() {
        std::path::PathBuf::from(db_file)
    } else {
        std::env::current_dir()?.join(db_file)
    };
    // Normalize path separators and ensure proper URL form on Windows
    let normalized = absolute_path.to_string_lossy().replace('\\', "/");
    let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
    let prefix = if needs_leading_slash { "/" } else { "" };
    let db_url = format!("sqlite://{}{}?mode=rwc", prefix, normalized);
    let conn = Database::connect(&db_url).await?;

    // Ensure required tables exist (minimal schema bootstrap)
    let create_orders_table = r#"
        CREATE TABLE IF NOT EXISTS a001_sales_order (
            id TEXT PRIMARY KEY NOT NULL,
            file_name TEXT NOT NULL,
            order_number TEXT,
            customer_name TEXT,
            order_date TEXT,
            line_items TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0
        );
    "#;
    conn.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        create_orders_table.to_string(),
    ))
    .await?;

    tracing::info!("Database initialized at {}", absolute_path.display());

    // Параллельная инициализация: проигравший просто закрывает своё соединение
    let _ = DB_CONN.set(conn);
    Ok(())
}

pub fn get_connection() -> &'static DatabaseConnection {
    DB_CONN
        .get()
        .expect("database not initialized, call initialize_database first")
}

/// Тестовая БД: уникальный файл во временной директории, инициализируется
/// один раз на процесс
#[cfg(test)]
pub async fn init_test_database() {
    use tokio::sync::OnceCell as AsyncOnceCell;
    static TEST_DB: AsyncOnceCell<()> = AsyncOnceCell::const_new();
    TEST_DB
        .get_or_init(|| async {
            let path =
                std::env::temp_dir().join(format!("a001-sales-order-test-{}.db", uuid::Uuid::new_v4()));
            initialize_database(Some(&path.to_string_lossy()))
                .await
                .expect("test database init");
        })
        .await;
}
