use sourcebot::data_models::SearchResult;
use sourcebot::formatter::*;

fn result(i: usize, snippet: &str) -> SearchResult {
    SearchResult::new(format!("Статья {i}"), snippet, format!("https://example.org/{i}"))
}

#[test]
fn test_empty_results_are_not_found() {
    assert_eq!(format_answer(&[]), NOT_FOUND);
}

#[test]
fn test_layout() {
    let results = vec![
        result(1, "Овуляция наступает в середине цикла"),
        result(2, "Длится около суток..."),
        result(3, "Этот фрагмент не попадает в резюме"),
    ];
    let answer = format_answer(&results);

    let expected = format!(
        "Овуляция наступает в середине цикла. Длится около суток.\n\n\
         *Источники:*\n\
         1. [Статья 1](https://example.org/1)\n\
         2. [Статья 2](https://example.org/2)\n\
         3. [Статья 3](https://example.org/3)\n\n\
         _{DISCLAIMER}_"
    );
    assert_eq!(answer, expected);
}

#[test]
fn test_is_deterministic() {
    let results = vec![result(1, "a_b"), result(2, "")];
    assert_eq!(format_answer(&results), format_answer(&results));
}

#[test]
fn test_blank_snippets_use_generic_summary() {
    let results = vec![result(1, "  "), result(2, "..."), result(3, "Поздний фрагмент")];
    assert_eq!(summarize(&results), MULTIPLE_SOURCES);
}

#[test]
fn test_one_result_summary() {
    let results = vec![result(1, "Единственный фрагмент")];
    let answer = format_answer(&results);
    assert!(answer.starts_with("Единственный фрагмент.\n\n"));
    assert!(answer.contains("1. [Статья 1]"));
    assert!(!answer.contains("2. ["));
}

#[test]
fn test_summary_markdown_is_escaped() {
    let results = vec![result(1, "уровень *ЛГ* и прогестерон_2")];
    assert_eq!(summarize(&results), "уровень \\*ЛГ\\* и прогестерон\\_2.");
}
