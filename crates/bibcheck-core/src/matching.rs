use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// LaTeX text-formatting commands whose argument is kept (`\emph{x}` → `x`).
static LATEX_COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:emph|textbf|textit|textsc|texttt|textrm|mathrm|mbox)\s*").unwrap());

/// Any remaining control word such as `\LaTeX` or `\&`.
static LATEX_CONTROL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([A-Za-z]+|.)").unwrap());

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").unwrap());

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "of", "and", "or", "for", "to", "in", "on", "with", "by", "at", "from",
        "is", "are", "via", "using", "towards", "toward", "its", "into", "as",
    ]
    .into_iter()
    .collect()
});

/// Remove LaTeX markup from a BibTeX value: protective braces, formatting
/// commands and escapes. Inline math delimiters are dropped, their content kept.
pub fn strip_latex(text: &str) -> String {
    let text = LATEX_COMMAND_RE.replace_all(text, "");
    let text = LATEX_CONTROL_RE.replace_all(&text, "$1");
    text.replace(['{', '}', '$'], "")
}

/// Normalize a title for comparison: lowercase ASCII alphanumerics only.
///
/// Steps (order matters):
/// 1. Strip LaTeX markup
/// 2. Unescape common HTML entities (DBLP titles sometimes carry them)
/// 3. Transliterate Greek letters and common math symbols
/// 4. Unicode NFKD normalization, then strip to ASCII (drops diacritics)
/// 5. Keep only `[a-zA-Z0-9]`, lowercased
pub fn normalize_title(title: &str) -> String {
    let title = strip_latex(title);

    let title = title
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let title = title
        .replace(['α', 'Α'], "alpha")
        .replace(['β', 'Β'], "beta")
        .replace(['γ', 'Γ'], "gamma")
        .replace(['δ', 'Δ'], "delta")
        .replace(['ε', 'Ε'], "epsilon")
        .replace(['θ', 'Θ'], "theta")
        .replace(['λ', 'Λ'], "lambda")
        .replace(['μ', 'Μ'], "mu")
        .replace(['π', 'Π'], "pi")
        .replace(['σ', 'ς', 'Σ'], "sigma")
        .replace(['τ', 'Τ'], "tau")
        .replace(['φ', 'Φ'], "phi")
        .replace(['ω', 'Ω'], "omega")
        .replace('∞', "infinity")
        .replace('√', "sqrt")
        .replace('≤', "leq")
        .replace('≥', "geq")
        .replace('→', "to");

    let normalized: String = title.nfkd().filter(|c| c.is_ascii()).collect();

    NON_ALNUM.replace_all(&normalized, "").to_lowercase()
}

/// Similarity of two titles in `[0, 1]` after normalization.
///
/// The base score is the normalized Levenshtein ratio. A conservative prefix
/// rule lifts the score to 0.95 when the shorter title (at least 30 normalized
/// characters) is a prefix of the longer one and both agree on having a
/// subtitle after `?` or `!`, or the shorter covers at least 70% of the longer.
pub fn title_similarity(title_a: &str, title_b: &str) -> f64 {
    let norm_a = normalize_title(title_a);
    let norm_b = normalize_title(title_b);

    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }

    let score = rapidfuzz::fuzz::ratio(norm_a.chars(), norm_b.chars());
    if score >= 0.95 {
        return score;
    }

    let (shorter, longer) = if norm_a.len() <= norm_b.len() {
        (&norm_a, &norm_b)
    } else {
        (&norm_b, &norm_a)
    };

    if shorter.len() < 30 || !longer.starts_with(shorter.as_str()) {
        return score;
    }

    let has_subtitle = |t: &str| {
        let lower = t.to_lowercase();
        match lower.rfind(['?', '!']) {
            Some(pos) => lower[pos + 1..].chars().any(|c| c.is_alphanumeric()),
            None => false,
        }
    };

    if has_subtitle(title_a) != has_subtitle(title_b) {
        let coverage = shorter.len() as f64 / longer.len() as f64;
        if coverage < 0.70 {
            return score;
        }
    }

    score.max(0.95)
}

/// Check if two titles refer to the same work (similarity ≥ 0.95).
#[cfg(test)]
fn titles_match(title_a: &str, title_b: &str) -> bool {
    title_similarity(title_a, title_b) >= 0.95
}

/// Extract up to `n` significant words from a title for a search query.
///
/// LaTeX markup is stripped first. Stop words and very short words are
/// skipped, but short alphanumeric terms like "L2", "3D" or "5G" are kept.
/// Titles with fewer than three significant words fall back to all words.
pub fn get_query_words(title: &str, n: usize) -> Vec<String> {
    let plain = strip_latex(title);
    let ascii: String = plain.nfkd().filter(|c| c.is_ascii()).collect();
    let all_words: Vec<&str> = WORD_RE.find_iter(&ascii).map(|m| m.as_str()).collect();

    let significant: Vec<&str> = all_words
        .iter()
        .copied()
        .filter(|w| is_significant(w))
        .collect();

    if significant.len() >= 3 {
        significant.into_iter().take(n).map(String::from).collect()
    } else {
        all_words.into_iter().take(n).map(String::from).collect()
    }
}

fn is_significant(w: &str) -> bool {
    if STOP_WORDS.contains(w.to_lowercase().as_str()) {
        return false;
    }
    if w.len() >= 3 {
        return true;
    }
    let has_letter = w.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = w.chars().any(|c| c.is_ascii_digit());
    has_letter && has_digit
}
