use crate::parser::{Word, WordSegment};

/// Expand parsed words into final argument strings.
/// Unquoted text gets tilde and glob expansion; quoted text is literal.
pub fn expand_words(words: &[Word]) -> Vec<String> {
    words.iter().flat_map(|word| expand_word(word)).collect()
}

/// Expand a redirect target: tilde only, a filename never fans out.
pub fn expand_path(word: &Word) -> String {
    word.iter()
        .enumerate()
        .map(|(i, segment)| match segment {
            WordSegment::Unquoted(text) if i == 0 => expand_tilde(text),
            WordSegment::Unquoted(text) | WordSegment::Quoted(text) => text.clone(),
        })
        .collect()
}

fn expand_word(segments: &[WordSegment]) -> Vec<String> {
    let mut literal = String::new();
    // Same text with quoted glob characters escaped.
    let mut pattern = String::new();
    let mut is_globbable = false;

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            WordSegment::Quoted(text) => {
                literal.push_str(text);
                pattern.push_str(&glob::Pattern::escape(text));
            }
            WordSegment::Unquoted(text) => {
                // Tilde only counts at the very start of the word.
                let expanded = if i == 0 { expand_tilde(text) } else { text.clone() };
                is_globbable |= contains_glob_chars(&expanded);
                literal.push_str(&expanded);
                pattern.push_str(&expanded);
            }
        }
    }

    if is_globbable {
        expand_globs(&pattern, literal)
    } else {
        vec![literal]
    }
}

// ── Tilde Expansion ──

fn expand_tilde(token: &str) -> String {
    if token == "~" {
        return home_dir();
    }
    match token.strip_prefix("~/") {
        Some(rest) => format!("{}/{rest}", home_dir()),
        // ~username is not supported
        None => token.to_string(),
    }
}

pub(crate) fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| "~".to_string())
}

// ── Glob Expansion ──

fn contains_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

/// Match `pattern` against the filesystem; `literal` is the word to keep
/// when nothing matches.
fn expand_globs(pattern: &str, literal: String) -> Vec<String> {
    match glob::glob(pattern) {
        Ok(paths) => {
            let mut matches: Vec<String> = paths
                .filter_map(|entry| entry.ok())
                .map(|path| path.to_string_lossy().into_owned())
                .collect();

            if matches.is_empty() {
                vec![literal]
            } else {
                matches.sort();
                matches
            }
        }
        Err(_) => vec![literal],
    }
}
