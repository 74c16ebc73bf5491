//! Renders search results as a Telegram Markdown reply.

use crate::data_models::SearchResult;

pub const NOT_FOUND: &str = "К сожалению, по вашему запросу ничего не найдено.";
pub const MULTIPLE_SOURCES: &str = "Найдено несколько источников по запросу.";
pub const SOURCES_LABEL: &str = "Источники:";
pub const DISCLAIMER: &str = "Ответ основан на общедоступных данных. Если ответ вас не устраивает, \
попробуйте перефразировать свой запрос, система еще не откалибрована полностью. \
Проверяйте источники для уверенности.";

/// How many leading results contribute their snippet to the summary.
const SUMMARY_SNIPPETS: usize = 2;

/// Builds the reply: a summary from the first snippets, a numbered source list and a disclaimer.
pub fn format_answer(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NOT_FOUND.to_string();
    }

    let sources = results
        .iter()
        .enumerate()
        .map(|(idx, result)| source_line(idx + 1, result))
        .collect::<Vec<String>>()
        .join("\n");

    format!(
        "{}\n\n*{}*\n{}\n\n_{}_",
        summarize(results),
        SOURCES_LABEL,
        sources,
        DISCLAIMER
    )
}

pub fn summarize(results: &[SearchResult]) -> String {
    let sentences = results
        .iter()
        .take(SUMMARY_SNIPPETS)
        .filter_map(|r| sentence(&r.snippet))
        .collect::<Vec<String>>();

    if sentences.is_empty() {
        MULTIPLE_SOURCES.to_string()
    } else {
        escape_markdown(&sentences.join(" "))
    }
}

/// `snippet` with exactly one closing period, or `None` when there is nothing to say.
fn sentence(snippet: &str) -> Option<String> {
    let body = snippet.trim().trim_end_matches('.').trim_end();
    if body.is_empty() {
        return None;
    }
    Some(format!("{body}."))
}

pub fn source_line(index: usize, result: &SearchResult) -> String {
    let title = result.title.trim();
    let text = if title.is_empty() { result.url.as_str() } else { title };
    format!("{}. [{}]({})", index, link_text(text), link_target(&result.url))
}

/// A bare `)` would end the link target, as in `.../Ovulation_(biology)`.
fn link_target(url: &str) -> String {
    url.replace(')', "%29")
}

/// Brackets would close the link entity early.
fn link_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            other => other,
        })
        .collect()
}

/// Escapes the characters legacy Markdown treats as entity markers outside of entities.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
