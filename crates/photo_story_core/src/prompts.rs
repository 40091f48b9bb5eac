//! crates/photo_story_core/src/prompts.rs
//!
//! Prompt templates sent to the generative model.

use crate::domain::StoryStyle;

pub const CAPTION_PROMPT: &str =
    "この画像を文学的に表現した情景描写を40〜60文字で作ってください。日本語。";

const STORY_TEMPLATE: &str = r#"
以下の情景描写から物語を生成してください。

● 文体の雰囲気：
{tone}

● 文字数：
500〜900文字

● 情景描写：
{captions}
"#;

const CHAPTERED_STORY_TEMPLATE: &str = r#"
以下の情景描写から、画像ごとに一つの章を持つ物語を生成してください。

● 文体の雰囲気：
{tone}

● 文字数：
全体で500〜900文字

● 構成：
全{count}章。各章は必ず行頭の「第N章 見出し」という形式で始めてください（Nは1からの半角数字）。

● 情景描写（画像の順番）：
{captions}
"#;

const TITLE_TEMPLATE: &str = r#"
次の物語にふさわしいタイトルの候補を3つ、番号付きの箇条書きで挙げてください。
各タイトルは20文字以内にしてください。

● 物語：
{story}
"#;

/// Builds the story prompt from the captions and style. Several captions
/// request one chapter per image.
pub fn story_prompt(captions: &[String], style: StoryStyle) -> String {
    match captions {
        [single] => STORY_TEMPLATE
            .replace("{tone}", style.tone())
            .replace("{captions}", single),
        many => {
            let numbered = many
                .iter()
                .enumerate()
                .map(|(i, caption)| format!("{}. {}", i + 1, caption))
                .collect::<Vec<_>>()
                .join("\n");
            CHAPTERED_STORY_TEMPLATE
                .replace("{tone}", style.tone())
                .replace("{count}", &many.len().to_string())
                .replace("{captions}", &numbered)
        }
    }
}

pub fn title_prompt(story: &str) -> String {
    TITLE_TEMPLATE.replace("{story}", story)
}
