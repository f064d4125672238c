use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Seeds the sample teams and members at startup.
    Local,
    #[default]
    Default,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub skip_migrations: bool,
    pub profile: Profile,
    pub max_connections: u32,
    /// Empty allows every origin.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let flag = |key: &str| {
            lookup(key)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false)
        };

        let port = match lookup("PORT") {
            Some(port) => port.parse::<u16>().context("PORT must be a valid number")?,
            None => 8080,
        };

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(n) => n
                .parse::<u32>()
                .context("DB_MAX_CONNECTIONS must be a positive number")?,
            None => 10,
        };

        let profile = match lookup("APP_PROFILE").as_deref() {
            Some("local") => Profile::Local,
            _ => Profile::Default,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            skip_migrations: flag("SKIP_MIGRATIONS"),
            profile,
            max_connections,
            allowed_origins,
        })
    }
}
