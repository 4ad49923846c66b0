use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS must be a number")?
            .unwrap_or(10);

        Ok(Self { url, max_connections })
    }

    pub async fn create_pool(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await
    }
}
