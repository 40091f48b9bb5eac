//! crates/photo_story_core/src/story_text.rs
//!
//! Local post-processing of model output: title extraction and chapter parsing.
//!
//! Chapter headings follow this grammar, matched at the start of a line:
//!
//! ```text
//! heading := decoration* "第" numeral+ "章" rest-of-line
//! decoration := "#" | "*" | whitespace
//! numeral := [0-9] | [０-９] | 一 二 三 四 五 六 七 八 九 十 百
//! ```

use crate::domain::Chapter;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum number of characters kept from a generated title.
pub const MAX_TITLE_CHARS: usize = 20;

/// Title used when neither the model nor the story yields one.
pub const UNTITLED: &str = "無題の物語";

static ENUMERATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[#>]+\s*)?(?:[0-9０-９]+\s*[.．、,)）:：]|[-+*・●•])\s*")
        .expect("enumeration marker pattern is valid")
});

fn is_title_decoration(c: char) -> bool {
    c.is_whitespace() || matches!(c, '*' | '#' | '「' | '」' | '『' | '』' | '"' | '“' | '”')
}

/// Derives a title from a model response: first non-empty line, emphasis and
/// leading enumeration marker removed, truncated to [`MAX_TITLE_CHARS`].
pub fn extract_title(raw: &str) -> String {
    let Some(first_line) = raw.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return String::new();
    };
    let undecorated = first_line.trim_matches(is_title_decoration);
    let stripped = ENUMERATION_MARKER.replace(undecorated, "");
    stripped
        .trim_matches(is_title_decoration)
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// A title for stories saved before a title was generated.
pub fn fallback_title(story: &str) -> String {
    let title = extract_title(story);
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

fn is_numeral(c: char) -> bool {
    c.is_ascii_digit()
        || ('０'..='９').contains(&c)
        || matches!(c, '一' | '二' | '三' | '四' | '五' | '六' | '七' | '八' | '九' | '十' | '百')
}

/// Returns the chapter label and the remainder of the line when `line` is a heading.
fn parse_heading(line: &str) -> Option<(String, &str)> {
    let line = line.trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace());
    let after_marker = line.strip_prefix('第')?;
    let numeral_len: usize = after_marker
        .chars()
        .take_while(|c| is_numeral(*c))
        .map(char::len_utf8)
        .sum();
    if numeral_len == 0 {
        return None;
    }
    let (numerals, after_numerals) = after_marker.split_at(numeral_len);
    let rest = after_numerals.strip_prefix('章')?;
    let rest = rest.trim_matches(|c: char| matches!(c, '*' | ':' | '：') || c.is_whitespace());
    Some((format!("{numerals}章"), rest))
}

fn push_chapter(chapters: &mut Vec<Chapter>, label: Option<String>, body: &str) {
    let body = body.trim();
    if label.is_none() && body.is_empty() {
        return;
    }
    chapters.push(Chapter {
        label,
        body: body.to_string(),
    });
}

/// Splits a story into chapters. Text without headings becomes a single
/// unlabeled chapter; text before the first heading becomes an unlabeled
/// leading chapter.
pub fn split_chapters(text: &str) -> Vec<Chapter> {
    let mut chapters = Vec::new();
    let mut label: Option<String> = None;
    let mut body = String::new();

    for line in text.lines() {
        match parse_heading(line) {
            Some((heading, rest)) => {
                push_chapter(&mut chapters, label.take(), &body);
                body.clear();
                label = Some(heading);
                body.push_str(rest);
            }
            None => {
                body.push('\n');
                body.push_str(line);
            }
        }
    }
    push_chapter(&mut chapters, label, &body);
    chapters
}
