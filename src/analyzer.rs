use porter_stemmer::stem;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

static FILLER_FORMS: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

/// Conversational padding users put in front of a question, in lemma form.
pub const DEFAULT_FILLER_LEMMAS: &[&str] = &[
    "слушать",
    "подсказывать",
    "сказывать",
    "рассказывать",
    "интересно",
    "ну",
    "вот",
    "ладно",
    "короче",
    "значить",
    "мочь",
    "можешь",
    "если",
    "а",
    "пожалуйста",
    "объяснить",
    "расскажи",
    "объясни",
    "сказать",
    "подскажи",
    "скажи",
];

fn get_filler_forms() -> &'static HashMap<&'static str, &'static str> {
    FILLER_FORMS.get_or_init(|| {
        HashMap::from([
            // Imperatives and 2nd person forms of the filler verbs
            ("слушай", "слушать"),
            ("слушайте", "слушать"),
            ("послушай", "слушать"),
            ("подскажите", "подсказывать"),
            ("подсказываешь", "подсказывать"),
            ("расскажите", "рассказывать"),
            ("рассказывай", "рассказывать"),
            ("рассказываешь", "рассказывать"),
            ("объясните", "объяснить"),
            ("объяснишь", "объяснить"),
            ("скажите", "сказать"),
            ("скажешь", "сказать"),
            ("можете", "мочь"),
            ("может", "мочь"),
            ("могу", "мочь"),
            ("мог", "мочь"),
            ("могла", "мочь"),
            ("значит", "значить"),
        ])
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextToken {
    pub term: String,
    pub pos: usize,
    /// Byte offset of the token in the text it was cut from.
    pub offset: usize,
}

impl TextToken {
    pub fn new(term: impl Into<String>, pos: usize, offset: usize) -> Self {
        Self {
            term: term.into(),
            pos,
            offset,
        }
    }

    /// Tokens made only of punctuation or symbols are not words.
    pub fn is_word(&self) -> bool {
        self.term.chars().any(|c| c.is_alphanumeric())
    }

    /// The term with leading and trailing punctuation removed.
    pub fn word(&self) -> &str {
        self.term.trim_matches(|c: char| !c.is_alphanumeric())
    }
}

impl std::ops::Deref for TextToken {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.term
    }
}

/// A tokenizer receives a stream of characters, breaks it up into individual tokens (usually individual words),
/// and outputs a stream of tokens. Every token remembers where it started so callers can slice the
/// original text instead of re-joining terms.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<TextToken>;
}

/// Breaks text on whitespace only, so "ну, расскажи" becomes [ну,, расскажи].
pub struct WhiteSpaceTokenizer;

impl Tokenizer for WhiteSpaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<TextToken> {
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;
        for (idx, c) in text.char_indices() {
            match (c.is_whitespace(), start) {
                (true, Some(s)) => {
                    tokens.push(TextToken::new(&text[s..idx], tokens.len(), s));
                    start = None;
                }
                (false, None) => start = Some(idx),
                _ => {}
            }
        }
        if let Some(s) = start {
            tokens.push(TextToken::new(&text[s..], tokens.len(), s));
        }
        tokens
    }
}

/// Splits words from punctuation the way a sentence segmenter would:
/// "ну, расскажи про что-то?" becomes [ну, ",", расскажи, про, что-то, "?"].
/// Hyphens and apostrophes stay inside a word when they follow a letter or digit.
pub struct WordTokenizer;

impl WordTokenizer {
    fn is_joiner(c: char) -> bool {
        matches!(c, '-' | '\'' | '’')
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<TextToken> {
        let mut tokens = Vec::new();
        let mut word_start: Option<usize> = None;

        for (idx, c) in text.char_indices() {
            if c.is_alphanumeric() || (word_start.is_some() && Self::is_joiner(c)) {
                if word_start.is_none() {
                    word_start = Some(idx);
                }
                continue;
            }

            if let Some(s) = word_start.take() {
                tokens.push(TextToken::new(&text[s..idx], tokens.len(), s));
            }
            if !c.is_whitespace() {
                tokens.push(TextToken::new(
                    &text[idx..idx + c.len_utf8()],
                    tokens.len(),
                    idx,
                ));
            }
        }

        if let Some(s) = word_start {
            tokens.push(TextToken::new(&text[s..], tokens.len(), s));
        }
        tokens
    }
}

/// Maps a surface word to the base form used for filler matching.
pub trait Lemmatizer: Send + Sync {
    fn lemma(&self, word: &str) -> String;
}

/// Case folding only. Good enough when the filler set lists every form it cares about.
pub struct LowerCaseLemmatizer;

impl Lemmatizer for LowerCaseLemmatizer {
    fn lemma(&self, word: &str) -> String {
        word.to_lowercase()
    }
}

/// Looks inflected forms up in a form -> lemma table, falling back to the lowercased word.
pub struct DictionaryLemmatizer {
    forms: HashMap<String, String>,
}

impl DictionaryLemmatizer {
    pub fn new<I, F, L>(forms: I) -> Self
    where
        I: IntoIterator<Item = (F, L)>,
        F: Into<String>,
        L: Into<String>,
    {
        Self {
            forms: forms
                .into_iter()
                .map(|(form, lemma)| (form.into().to_lowercase(), lemma.into()))
                .collect(),
        }
    }
}

impl Default for DictionaryLemmatizer {
    fn default() -> Self {
        Self::new(get_filler_forms().iter().map(|(f, l)| (*f, *l)))
    }
}

impl Lemmatizer for DictionaryLemmatizer {
    fn lemma(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        match self.forms.get(&lower) {
            Some(lemma) => lemma.clone(),
            None => lower,
        }
    }
}

/// Porter stems as a stand-in for lemmas, for English filler sets.
/// The filler set must then hold stems too ("pleas", "tell").
pub struct PorterStemLemmatizer;

impl Lemmatizer for PorterStemLemmatizer {
    fn lemma(&self, word: &str) -> String {
        stem(&word.to_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct FillerWords {
    lemmas: HashSet<String>,
}

impl FillerWords {
    pub fn new<I, S>(lemmas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lemmas: lemmas.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, lemma: &str) -> bool {
        self.lemmas.contains(lemma)
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }
}

impl Default for FillerWords {
    fn default() -> Self {
        Self::new(DEFAULT_FILLER_LEMMAS.iter().copied())
    }
}

/// Strips the conversational lead-in from a user's question before it is searched.
///
/// Only the leading run of filler words is removed: once a token that is not a filler
/// shows up, the rest of the text is kept verbatim, apart from cosmetic trimming.
pub struct QueryNormalizer {
    tokenizer: Box<dyn Tokenizer>,
    lemmatizer: Box<dyn Lemmatizer>,
    fillers: FillerWords,
}

impl Default for QueryNormalizer {
    fn default() -> Self {
        Self::new(
            Box::new(WordTokenizer),
            Box::new(DictionaryLemmatizer::default()),
            FillerWords::default(),
        )
    }
}

impl QueryNormalizer {
    pub fn new(
        tokenizer: Box<dyn Tokenizer>,
        lemmatizer: Box<dyn Lemmatizer>,
        fillers: FillerWords,
    ) -> Self {
        Self {
            tokenizer,
            lemmatizer,
            fillers,
        }
    }

    pub fn fillers(&self) -> &FillerWords {
        &self.fillers
    }

    /// Cleans `raw` for searching. Never returns an empty string for a non-empty input.
    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let text = raw.trim();
        let tokens = self.tokenizer.tokenize(text);

        let Some(start) = self.content_start(&tokens) else {
            return raw.to_string();
        };
        // A tokenizer handing back offsets outside the text must not take us down.
        let Some(rest) = text.get(start..) else {
            return raw.to_string();
        };

        let cleaned = tidy(rest);
        if cleaned.is_empty() {
            raw.to_string()
        } else {
            cleaned
        }
    }

    /// Offset of the first token that is not a filler. Punctuation is never a filler, so a
    /// comma ends the lead-in just like a content word does.
    fn content_start(&self, tokens: &[TextToken]) -> Option<usize> {
        tokens
            .iter()
            .find(|t| !t.is_word() || !self.fillers.contains(&self.lemmatizer.lemma(t.word())))
            .map(|t| t.offset)
    }
}

fn tidy(text: &str) -> String {
    let text = text.trim_start_matches(|c: char| c == ',' || c == '.' || c.is_whitespace());
    let text = text.trim_end_matches(|c: char| matches!(c, '?' | '!' | '.') || c.is_whitespace());
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
