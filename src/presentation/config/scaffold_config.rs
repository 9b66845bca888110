use std::time::Duration;

/// Runs the console against the in-memory backend instead of a live server.
#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    pub enabled: bool,
    pub response_delay: Duration,
}

impl ScaffoldConfig {
    pub fn from_vars(scaffold_mode: Option<&str>, response_delay_ms: Option<&str>) -> Self {
        Self {
            enabled: scaffold_mode
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            response_delay: Duration::from_millis(
                response_delay_ms.and_then(|v| v.parse().ok()).unwrap_or(0),
            ),
        }
    }
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self::from_vars(
            std::env::var("SCAFFOLD_MODE").ok().as_deref(),
            std::env::var("MOCK_RESPONSE_DELAY").ok().as_deref(),
        )
    }
}
