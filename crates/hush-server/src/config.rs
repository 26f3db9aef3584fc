use anyhow::{Context, Result};

const DEV_SECRET: &str = "dev-secret-change-me";

/// Server settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: String,
    pub host: String,
    pub port: u16,
    pub max_page: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("HUSH_PORT", "3000");
        let max_page = var("HUSH_MAX_PAGE", "200");

        Ok(Self {
            jwt_secret: var("HUSH_JWT_SECRET", DEV_SECRET),
            db_path: var("HUSH_DB_PATH", "hush.db"),
            host: var("HUSH_HOST", "0.0.0.0"),
            port: port
                .parse()
                .with_context(|| format!("HUSH_PORT is not a port number: {port}"))?,
            max_page: max_page
                .parse()
                .with_context(|| format!("HUSH_MAX_PAGE is not a number: {max_page}"))?,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_SECRET
    }
}
