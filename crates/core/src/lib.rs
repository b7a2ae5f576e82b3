pub mod domain;
pub mod llm;
pub mod orchestrator;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self::from_lookup(|key| std::env::var(key).ok()))
        }

        fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
            let non_empty = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

            Self {
                gemini_api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")),
                sentry_dsn: non_empty("SENTRY_DSN"),
            }
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }
    }

}
