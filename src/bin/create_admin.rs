//! Creates a staff account, or promotes an existing one with the same email.
//!
//! Usage: `create_admin <username> <email> <password>`; missing arguments fall
//! back to `ADMIN_USERNAME`, `ADMIN_EMAIL` and `ADMIN_PASSWORD`.

use std::env;

use anyhow::{anyhow, Context};
use ayika::{auth, db, validation};

fn arg_or_env(args: &[String], index: usize, var: &str) -> anyhow::Result<String> {
    args.get(index)
        .cloned()
        .or_else(|| env::var(var).ok())
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("missing argument #{index} (or {var})"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let username = arg_or_env(&args, 1, "ADMIN_USERNAME")?;
    let email = arg_or_env(&args, 2, "ADMIN_EMAIL")?.trim().to_lowercase();
    let password = arg_or_env(&args, 3, "ADMIN_PASSWORD")?;

    if !validation::is_valid_email(&email) {
        return Err(anyhow!("invalid email address: {email}"));
    }
    let problems = validation::password_problems(&password);
    if !problems.is_empty() {
        return Err(anyhow!("password rejected: {}", problems.join(" ")));
    }

    let path = env::var("DATABASE_PATH").unwrap_or_else(|_| "ayika.db".to_string());
    let pool = db::init_pool(&path, 1).await?;
    db::migrate(&pool).await?;

    let hash = auth::hash_password(&password)?;
    let id = db::users::upsert_admin(&pool, username, email.clone(), hash).await?;
    println!("Admin account ready: {} (id {})", email, id);
    Ok(())
}
