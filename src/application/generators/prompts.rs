//! Prompt 模板
//!
//! 每个生成器家族一个固定的 system prompt，外加各操作的 user prompt 构建函数。

use serde::Deserialize;

/// 请求中携带的小说元信息（可选，均可为空）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NovelMeta {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub world_setting: Option<String>,
    pub style_guide: Option<String>,
}

impl NovelMeta {
    /// 渲染非空字段；全部为空时返回 None
    pub fn render(&self) -> Option<String> {
        let lines: Vec<String> = [
            ("Title", &self.title),
            ("Genre", &self.genre),
            ("Description", &self.description),
            ("World setting", &self.world_setting),
            ("Style guide", &self.style_guide),
        ]
        .iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}: {}", label, v))
        })
        .collect();

        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

pub const CHARACTER_SYSTEM: &str = "You are a character designer for fiction writers. \
Build believable, specific characters whose motivations drive the story. \
Reply with a single JSON object and nothing else.";

pub const PLOT_SYSTEM: &str = "You are a plot consultant for fiction writers. \
Suggest plot points that raise the stakes and follow from what is already established. \
Reply with a single JSON object and nothing else.";

pub const CHAPTER_SYSTEM: &str = "You are a novelist drafting chapters in the author's established voice. \
Write vivid, concrete prose with natural dialogue and keep continuity with earlier chapters.";

pub const STORYLINE_SYSTEM: &str = "You are a story architect. You design storylines as graphs of narrative beats. \
Nodes are referenced by their zero-based position in the nodes array. \
Reply with a single JSON object and nothing else.";

pub const SETTING_SYSTEM: &str = "You are a worldbuilding assistant. \
Create settings that are internally consistent and full of story potential. \
Reply with a single JSON object and nothing else.";

pub const STYLE_SYSTEM: &str = "You are a writing coach who describes prose style precisely. \
Reply with a single JSON object and nothing else.";

pub const GOAL_SYSTEM: &str = "You are a writing coach who sets realistic word-count goals. \
Answer with numbers only.";

pub const CHAT_SYSTEM: &str = "You are a creative writing partner. \
Help the author brainstorm, answer questions about their story and draft passages on request.";

/// 列表渲染为项目符号；空列表返回 None
pub fn bullets(heading: &str, items: &[String]) -> Option<String> {
    let rendered: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("- {}", item))
        .collect();
    (!rendered.is_empty()).then(|| format!("{}:\n{}", heading, rendered.join("\n")))
}

/// 可选的单行字段
pub fn line(label: &str, value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| format!("{}: {}", label, v))
}

/// 拼接非空段落，最后附上输出要求
pub fn compose(task: &str, sections: Vec<Option<String>>, output: &str) -> String {
    let mut parts = vec![task.to_string()];
    parts.extend(sections.into_iter().flatten());
    if !output.is_empty() {
        parts.push(output.to_string());
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_renders_only_present_fields() {
        let meta = NovelMeta {
            title: Some("The Gate".into()),
            genre: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(meta.render().as_deref(), Some("Title: The Gate"));
        assert!(NovelMeta::default().render().is_none());
    }

    #[test]
    fn test_compose_skips_empty_sections() {
        let prompt = compose(
            "Write a chapter.",
            vec![None, bullets("Characters", &["Mira".into()]), line("Outline", Some(""))],
            "Return JSON.",
        );
        assert_eq!(prompt, "Write a chapter.\n\nCharacters:\n- Mira\n\nReturn JSON.");
    }
}
