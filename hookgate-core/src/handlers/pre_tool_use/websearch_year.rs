use async_trait::async_trait;
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, Handler, HandlerCategory, HandlerError};
use crate::handlers::static_regex;

/// Oldest year treated as "stale" rather than historical
const FIRST_CHECKED_YEAR: i32 = 2020;

static YEAR: Lazy<Regex> = Lazy::new(|| static_regex(r"\b(20\d{2})\b"));

/// Blocks web searches pinned to a past year, which surface outdated results
pub struct WebSearchYearHandler {
    current_year: i32,
}

impl WebSearchYearHandler {
    /// Uses the configured year, or today's year when none is set
    pub fn new(current_year: Option<i32>) -> Self {
        Self {
            current_year: current_year.unwrap_or_else(|| chrono::Local::now().year()),
        }
    }

    fn stale_year(&self, query: &str) -> Option<i32> {
        YEAR.captures_iter(query)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .find(|year| (FIRST_CHECKED_YEAR..self.current_year).contains(year))
    }

    fn query(event: &Event) -> Option<&str> {
        if event.tool_name() != "WebSearch" {
            return None;
        }
        event.str_param("query")
    }
}

#[async_trait]
impl Handler for WebSearchYearHandler {
    fn name(&self) -> &str {
        "validate-websearch-year"
    }

    fn priority(&self) -> u8 {
        55
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::ToolUsage
    }

    fn matches(&self, event: &Event) -> bool {
        Self::query(event).is_some_and(|query| self.stale_year(query).is_some())
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let query = Self::query(event).unwrap_or_default();
        let current = self.current_year;

        Ok(Decision::deny(format!(
            "🚫 BLOCKED: WebSearch query contains outdated year\n\n\
             Query: {query}\n\n\
             Current year is {current}. Don't search for old years.\n\n\
             ✅ CORRECT APPROACH:\n  \
               - Use {current} for current information\n  \
               - Remove the year when searching general topics\n  \
               - Only use old years when researching history"
        )))
    }
}
