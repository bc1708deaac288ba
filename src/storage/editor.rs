//! Sentence and word editing engine behind the structured WRITE protocol.
//!
//! File content is a sequence of sentences, each terminated by `.`, `!` or
//! `?` except possibly the last. A write payload is a list of lines of the
//! form `<word_index> <words...>` closed by the sentinel line `ETIRW`; the
//! word index is 1-based into the target sentence and every inserted word
//! that carries a terminator closes the current sentence and opens a fresh
//! empty one right after it.
//!
//! Everything in this module is pure; the protocol dialogue and disk I/O
//! live in the connection handlers.

use crate::proto::END_OF_WRITE;

/// Characters that end a sentence.
pub const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// A validation failure, carrying the message surfaced as INVALID_INDEX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditError(pub String);

impl EditError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// One parsed payload line: an insertion point and the words to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditLine {
    pub word_index: usize,
    pub words: Vec<String>,
}

/// Splits content into sentences, consuming up to and including each
/// terminator and skipping the spaces that follow it. A trailing
/// unterminated remainder forms the final sentence.
pub fn split_sentences(content: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if TERMINATORS.contains(&c) {
            sentences.push(std::mem::take(&mut current));
            while chars.peek().is_some_and(|&n| n == ' ') {
                chars.next();
            }
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Parses the raw payload into edit lines, stopping at the sentinel.
/// Blank lines are skipped; anything after the sentinel is ignored.
pub fn parse_payload(data: &str) -> Result<Vec<EditLine>, EditError> {
    let mut lines = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if line == END_OF_WRITE {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let index_token = tokens.next().unwrap_or_default();
        let word_index: usize = index_token
            .parse()
            .map_err(|_| EditError::new(format!("line must start with a word index: {line:?}")))?;
        lines.push(EditLine {
            word_index,
            words: tokens.map(str::to_owned).collect(),
        });
    }
    Ok(lines)
}

/// Applies a parsed payload to `content` at sentence `sentence_num`,
/// returning the rewritten file content.
pub fn apply_write(
    content: &str,
    sentence_num: i32,
    lines: &[EditLine],
) -> Result<String, EditError> {
    let mut sentences = split_sentences(content);
    let count = sentences.len();

    if sentence_num < 0 || sentence_num as usize > count {
        return Err(EditError::new(format!(
            "sentence index {sentence_num} out of range, file has {count} sentences"
        )));
    }
    let mut current = sentence_num as usize;

    if current == count {
        if count > 0 && !ends_terminated(&sentences[count - 1]) {
            return Err(EditError::new(
                "previous sentence must be completed before appending a new one",
            ));
        }
        sentences.push(String::new());
    }

    let mut words: Vec<String> =
        sentences[current].split_whitespace().map(str::to_owned).collect();

    for line in lines {
        let mut index = line.word_index;
        for word in &line.words {
            if index < 1 || index > words.len() + 1 {
                return Err(EditError::new(format!(
                    "word index {index} out of range, sentence has {} words",
                    words.len()
                )));
            }
            words.insert(index - 1, word.clone());
            index += 1;
            if word.chars().any(|c| TERMINATORS.contains(&c)) {
                sentences[current] = words.join(" ");
                current += 1;
                sentences.insert(current, String::new());
                words.clear();
                index = 1;
            }
        }
    }
    sentences[current] = words.join(" ");

    Ok(reassemble(&sentences))
}

fn ends_terminated(sentence: &str) -> bool {
    sentence
        .trim_end()
        .chars()
        .last()
        .is_some_and(|c| TERMINATORS.contains(&c))
}

/// Joins sentences with single spaces, dropping empty ones.
fn reassemble(sentences: &[String]) -> String {
    sentences
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
