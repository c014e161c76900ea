pub mod domain;
pub mod ingest;
pub mod query;
pub mod scoring;
pub mod storage;

pub mod config {
    use crate::scoring::WeightTable;
    use anyhow::Context;
    use std::str::FromStr;

    pub const DEFAULT_INGEST_MAX_PAGES: u32 = 50;
    pub const DEFAULT_RATINGS_API_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_PORT: u16 = 9090;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub ratings_api_url: Option<String>,
        pub ratings_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub ingest_max_pages: u32,
        pub ratings_api_timeout_secs: u64,
        pub brokerage_weights: WeightTable,
        pub ingest_on_startup: bool,
        pub cors_allowed_origins: Vec<String>,
        pub port: u16,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Builds settings from an arbitrary key lookup. Blank values count as unset; malformed
        /// optional values are errors rather than silently falling back to defaults.
        pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
        where
            F: Fn(&str) -> Option<String>,
        {
            let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            let ingest_max_pages = parse_opt::<u32>(get("INGEST_MAX_PAGES"), "INGEST_MAX_PAGES")?
                .unwrap_or(DEFAULT_INGEST_MAX_PAGES);
            anyhow::ensure!(ingest_max_pages >= 1, "INGEST_MAX_PAGES must be >= 1");

            let ratings_api_timeout_secs =
                parse_opt::<u64>(get("RATINGS_API_TIMEOUT_SECS"), "RATINGS_API_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_RATINGS_API_TIMEOUT_SECS);
            anyhow::ensure!(
                ratings_api_timeout_secs >= 1,
                "RATINGS_API_TIMEOUT_SECS must be >= 1"
            );

            let brokerage_weights = match get("BROKERAGE_WEIGHTS") {
                Some(raw) => WeightTable::from_json(&raw).context("invalid BROKERAGE_WEIGHTS")?,
                None => WeightTable::default_table(),
            };

            let ingest_on_startup = match get("INGEST_ON_STARTUP") {
                Some(raw) => parse_bool(&raw).context("invalid INGEST_ON_STARTUP")?,
                None => false,
            };

            let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            // Unlike the other knobs, a malformed PORT falls back to the default.
            let port = get("PORT")
                .and_then(|raw| raw.trim().parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT);

            Ok(Self {
                database_url: get("DATABASE_URL"),
                ratings_api_url: get("RATINGS_API_URL"),
                ratings_api_key: get("RATINGS_API_KEY"),
                sentry_dsn: get("SENTRY_DSN"),
                ingest_max_pages,
                ratings_api_timeout_secs,
                brokerage_weights,
                ingest_on_startup,
                cors_allowed_origins,
                port,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_ratings_api_url(&self) -> anyhow::Result<&str> {
            self.ratings_api_url
                .as_deref()
                .context("RATINGS_API_URL is required")
        }

        pub fn require_ratings_api_key(&self) -> anyhow::Result<&str> {
            self.ratings_api_key
                .as_deref()
                .context("RATINGS_API_KEY is required")
        }

        /// Checks every value the services cannot start without.
        pub fn require_all(&self) -> anyhow::Result<()> {
            self.require_database_url()?;
            self.require_ratings_api_url()?;
            self.require_ratings_api_key()?;
            Ok(())
        }
    }

    fn parse_opt<T>(raw: Option<String>, key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{key} is invalid ({v:?}): {e}"))
        })
        .transpose()
    }

    fn parse_bool(raw: &str) -> anyhow::Result<bool> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("expected a boolean, got {other:?}"),
        }
    }

}
