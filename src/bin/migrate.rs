use std::env;

use ayika::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = env::var("DATABASE_PATH").unwrap_or_else(|_| "ayika.db".to_string());
    println!("Applying schema to {}...", path);

    let pool = db::init_pool(&path, 1).await?;
    db::migrate(&pool).await?;

    println!("Migration completed successfully.");
    Ok(())
}
