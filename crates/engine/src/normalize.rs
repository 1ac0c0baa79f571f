// Model response normalization
//
// The model is asked to answer with a markdown bullet list and nothing else.
// It does not always comply, so every answer is reduced to the bullet items
// it contains: commentary lines are filtered out, and each bullet is stripped
// of bold markers, numeric annotations and enumeration prefixes.

use std::sync::OnceLock;

use regex::Regex;

/// Phrases marking a line as commentary rather than content (matched
/// case-insensitively as substrings).
pub const DEFAULT_FILTER_KEYWORDS: &[&str] = &[
    "response:",
    "here is",
    "list below",
    "results:",
    "pure result list",
    "could not generate a valid response",
    "no valid command",
    "error",
    "hint",
    "summary",
    "this is about",
    "here's what you asked for",
    "based on your command",
    "okay",
    "please refer",
    "provided for you below",
    "here is the de-duplicated list",
    "these are the extracted company names",
    "here are the differences",
    "difference list below",
    "hello",
    "this is your",
    "as per your request",
    "certainly",
];

/// `* content`: asterisk, at least one whitespace, then the item.
fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*\s+(.+)$").unwrap())
}

/// Trailing `(1234)` annotation.
fn numeric_annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\d+\)$").unwrap())
}

/// Leading `1. `, `2) ` or `3.) ` enumeration, or the same marker glued to
/// a letter (`1.Beta`). The letter is captured so it can be put back; a digit
/// after the marker (`1.5 kg`) is content.
fn enumeration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:\.\)?|\))(?:\s+|(\p{L}))").unwrap())
}

#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    /// Lowercased filter phrases
    keywords: Vec<String>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::with_keywords(DEFAULT_FILTER_KEYWORDS.iter().copied())
    }
}

impl ResponseNormalizer {
    /// Normalizer using exactly the given filter phrases.
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Add filter phrases on top of the current set.
    pub fn extend_keywords<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Extract the ordered list items from a raw model response.
    ///
    /// Never fails: text without any bullet lines yields an empty list.
    pub fn normalize(&self, raw: &str) -> Vec<String> {
        let mut items = Vec::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // A bullet wins over the keyword filter: "* Error Corp" is content.
            if !line.starts_with('*') && self.is_explanatory(line) {
                continue;
            }

            let Some(caps) = bullet_re().captures(line) else {
                continue;
            };

            let item = clean_item(&caps[1]);
            if !item.is_empty() {
                items.push(item);
            }
        }

        log::debug!("normalized {} item(s) from {} byte response", items.len(), raw.len());
        items
    }

    fn is_explanatory(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Normalize with the default keyword set.
pub fn normalize(raw: &str) -> Vec<String> {
    ResponseNormalizer::default().normalize(raw)
}

fn clean_item(content: &str) -> String {
    let item = strip_bold(content);
    let item = numeric_annotation_re().replace(item, "");
    // "**Acme** (12)" leaves closing markers behind the annotation
    let item = strip_bold(&item);
    let item = enumeration_re().replace(item, "${1}");
    item.trim().to_string()
}

fn strip_bold(s: &str) -> &str {
    s.trim().trim_start_matches('*').trim_end_matches('*').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_bullets_in_order() {
        let raw = "* Acme\n* Beta LLC\n* Gamma";
        assert_eq!(normalize(raw), vec!["Acme", "Beta LLC", "Gamma"]);
    }

    #[test]
    fn test_commentary_only_is_empty() {
        let raw = "Here is the list you asked for.\nI hope this helps!\n\nHave a nice day";
        assert!(normalize(raw).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \n\n\t").is_empty());
    }

    #[test]
    fn test_strips_numeric_annotation() {
        assert_eq!(normalize("* Acme Corp (4453)"), vec!["Acme Corp"]);
    }

    #[test]
    fn test_keeps_non_numeric_parenthetical() {
        assert_eq!(normalize("* Acme Corp (Germany)"), vec!["Acme Corp (Germany)"]);
        assert_eq!(normalize("* Acme (12) Holdings"), vec!["Acme (12) Holdings"]);
    }

    #[test]
    fn test_strips_enumeration_once() {
        assert_eq!(normalize("* 1. Beta LLC"), vec!["Beta LLC"]);
        assert_eq!(normalize("* 2) Gamma"), vec!["Gamma"]);
        assert_eq!(normalize("* 3.) Delta"), vec!["Delta"]);
        assert_eq!(normalize("* 1. 2. Epsilon"), vec!["2. Epsilon"]);
    }

    #[test]
    fn test_strips_enumeration_glued_to_item() {
        assert_eq!(normalize("* 1.Beta LLC"), vec!["Beta LLC"]);
        assert_eq!(normalize("* 2)Gamma"), vec!["Gamma"]);
        assert_eq!(normalize("* 3.)Ölwerk"), vec!["Ölwerk"]);
    }

    #[test]
    fn test_leading_digits_without_marker_are_content() {
        assert_eq!(normalize("* 3M Company"), vec!["3M Company"]);
        assert_eq!(normalize("* 1.5 kg"), vec!["1.5 kg"]);
        assert_eq!(normalize("* 42"), vec!["42"]);
    }

    #[test]
    fn test_strips_bold_markers() {
        assert_eq!(normalize("* **Acme Corp**"), vec!["Acme Corp"]);
        assert_eq!(normalize("* **1. Acme Corp (17)**"), vec!["Acme Corp"]);
    }

    #[test]
    fn test_keyword_line_skipped_unless_bullet() {
        let raw = "Summary of results:\n* Error Prone Inc\n* Hello Kitty Ltd\nHint: check column C";
        assert_eq!(normalize(raw), vec!["Error Prone Inc", "Hello Kitty Ltd"]);
    }

    #[test]
    fn test_non_bullet_lines_discarded() {
        let raw = "- dash item\n1. numbered\n*no space\n* kept\n  * indented kept  ";
        assert_eq!(normalize(raw), vec!["kept", "indented kept"]);
    }

    #[test]
    fn test_marker_only_bullets_dropped() {
        let raw = "* **\n* ****\n* (12)\n* real";
        assert_eq!(normalize(raw), vec!["real"]);
    }

    #[test]
    fn test_mixed_response() {
        let raw = "Certainly! Based on your command, the companies are:\n\n\
                   * **Acme Corp** (4453)\n\
                   * 2. Beta LLC\n\
                   * Gamma GmbH\n\n\
                   Let me know if you need anything else.";
        assert_eq!(normalize(raw), vec!["Acme Corp", "Beta LLC", "Gamma GmbH"]);
    }

    #[test]
    fn test_crlf_lines() {
        assert_eq!(normalize("* a\r\n* b\r\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_custom_keywords_keep_bullet_precedence() {
        let normalizer = ResponseNormalizer::with_keywords(["acme"]);
        let raw = "Acme report follows\n* Acme Corp\nhere is a line";
        assert_eq!(normalizer.normalize(raw), vec!["Acme Corp"]);
    }

    #[test]
    fn test_extend_keywords() {
        let normalizer = ResponseNormalizer::default().extend_keywords(["  Note:  ", "error"]);
        assert!(normalizer.keywords().contains(&"note:".to_string()));
        assert_eq!(
            normalizer.keywords().iter().filter(|k| k.as_str() == "error").count(),
            1
        );
    }
}
