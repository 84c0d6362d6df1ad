//! 朗读脚本：去掉Markdown标记，限制长度

use std::sync::LazyLock;

use regex::Regex;

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("link pattern"));

static HORIZONTAL_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-*_]\s*){3,}$").expect("rule pattern"));

static TABLE_DIVIDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|?\s*:?-{3,}").expect("table pattern"));

const MARKUP_CHARS: [char; 6] = ['#', '*', '_', '`', '>', '|'];

/// 生成适合朗读的纯文本，超过max_chars时在词边界截断
pub fn prepare_narration(markdown: &str, max_chars: usize) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut in_code_block = false;

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block || HORIZONTAL_RULE.is_match(trimmed) || TABLE_DIVIDER.is_match(trimmed) {
            continue;
        }

        let without_links = LINK.replace_all(trimmed, "$1");
        let cleaned: String = without_links
            .chars()
            .filter(|c| !MARKUP_CHARS.contains(c))
            .collect();
        words.extend(cleaned.split_whitespace().map(str::to_string));
    }

    truncate_at_word(&words.join(" "), max_chars)
}

fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(index) if index > 0 => cut[..index].trim_end().to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_markers_are_removed() {
        let markdown = "# Solar Report\n\n**Efficiency** rose to _24%_ in `2024`.\n\n---\n\n> See [the study](https://example.com) for details.";
        let script = prepare_narration(markdown, 4500);

        assert_eq!(
            script,
            "Solar Report Efficiency rose to 24% in 2024. See the study for details."
        );
    }

    #[test]
    fn test_code_blocks_and_tables_are_skipped() {
        let markdown = "Intro\n```rust\nfn main() {}\n```\n| Year | Value |\n|---|---|\n| 2024 | 24% |";
        let script = prepare_narration(markdown, 4500);

        assert!(!script.contains("fn main"));
        assert!(!script.contains("---"));
        assert!(script.starts_with("Intro Year Value 2024 24%"));
    }

    #[test]
    fn test_truncates_at_word_boundary() {
        let markdown = "alpha beta gamma delta";
        assert_eq!(prepare_narration(markdown, 13), "alpha beta");
        assert!(prepare_narration(&"word ".repeat(2000), 4500).chars().count() <= 4500);
    }
}
