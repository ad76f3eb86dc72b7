use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{Decision, Event, FailureMode, Handler, HandlerCategory, HandlerError};
use crate::handlers::{file_path, static_regex, truncate};

const CHECKED_EXTENSIONS: [&str; 4] = [".md", ".ejs", ".html", ".txt"];
const CHECKED_DIRS: [&str; 3] = ["private_html", "docs", "CLAUDE"];
const MAX_LISTED: usize = 5;
const LINE_PREVIEW_CHARS: usize = 80;

static SPELLINGS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("color", "colour"),
        ("favor", "favour"),
        ("behavior", "behaviour"),
        ("organize", "organise"),
        ("recognize", "recognise"),
        ("analyze", "analyse"),
        ("center", "centre"),
        ("meter", "metre"),
        ("liter", "litre"),
    ]
    .into_iter()
    .map(|(american, british)| (static_regex(&format!(r"(?i)\b{american}\b")), british))
    .collect()
});

#[derive(Debug, PartialEq)]
struct Spelling {
    line: usize,
    american: String,
    british: &'static str,
    text: String,
}

/// Flags American spellings in prose files; never blocks
pub struct BritishEnglishHandler;

impl BritishEnglishHandler {
    fn new_text(event: &Event) -> Option<&str> {
        match event.tool_name() {
            "Write" => event.str_param("content"),
            "Edit" => event.str_param("new_string"),
            _ => None,
        }
    }

    fn is_content_file(path: &str) -> bool {
        CHECKED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
            && CHECKED_DIRS.iter().any(|dir| path.contains(dir))
    }

    /// American spellings outside fenced code blocks, one per pattern per line
    fn find_spellings(content: &str) -> Vec<Spelling> {
        let mut found = Vec::new();
        let mut in_fence = false;

        for (idx, line) in content.lines().enumerate() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            for (pattern, british) in SPELLINGS.iter() {
                if let Some(hit) = pattern.find(line) {
                    found.push(Spelling {
                        line: idx + 1,
                        american: hit.as_str().to_string(),
                        british: *british,
                        text: truncate(line.trim(), LINE_PREVIEW_CHARS),
                    });
                }
            }
        }
        found
    }
}

#[async_trait]
impl Handler for BritishEnglishHandler {
    fn name(&self) -> &str {
        "enforce-british-english"
    }

    fn priority(&self) -> u8 {
        60
    }

    fn category(&self) -> HandlerCategory {
        HandlerCategory::ToolUsage
    }

    fn failure_mode(&self) -> FailureMode {
        FailureMode::Advisory
    }

    fn matches(&self, event: &Event) -> bool {
        event.is_tool(&["Write", "Edit"])
            && file_path(event).is_some_and(Self::is_content_file)
            && Self::new_text(event).is_some_and(|text| !Self::find_spellings(text).is_empty())
    }

    async fn handle(&self, event: &Event) -> Result<Decision, HandlerError> {
        let path = file_path(event).unwrap_or_default();
        let spellings = Self::find_spellings(Self::new_text(event).unwrap_or_default());

        let mut warning = format!("⚠️  American English detected in {path}:\n");
        for s in spellings.iter().take(MAX_LISTED) {
            warning.push_str(&format!(
                "  Line {}: '{}' → use '{}'\n    {}\n",
                s.line, s.american, s.british, s.text
            ));
        }
        if spellings.len() > MAX_LISTED {
            warning.push_str(&format!(
                "  ... and {} more issue(s)\n",
                spellings.len() - MAX_LISTED
            ));
        }
        warning.push_str(
            "\nPlease use British English. Ignore this if the spelling is intentional \
             (a quote, an API name).",
        );

        Ok(Decision::allow_with_context(warning))
    }
}
