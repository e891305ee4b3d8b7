//! Free-text cleanup ahead of handle scanning.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Lowercase and apply Unicode compatibility decomposition (NFKD).
///
/// Profile text is full of styled and fullwidth variants (`＠ｕｓｅｒ`,
/// mathematical bold, ligatures); folding collapses them onto the plain
/// forms the matcher grammars operate on.
#[must_use]
pub fn fold(input: &str) -> String {
    input.to_lowercase().nfkd().collect()
}

/// Scrub and tokenize a free-text blob for handle scanning.
///
/// Characters outside letters, numbers, punctuation, separators and the
/// explicit `@ . ^ $` allow-set are replaced with spaces, the result is
/// folded with [`fold`], and the outcome is split on the separator set
/// people actually type between handles. Empty tokens are dropped.
#[must_use]
pub fn scan_tokens(text: &str) -> Vec<String> {
    let scrubbed = SCRUB.replace_all(text, " ");
    let folded = fold(&scrubbed);
    SEPARATORS
        .split(&folded)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

static SCRUB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\p{P}\p{Z}\n@.^$]").expect("valid scrub pattern"));

// Commas, quote glyphs, hashes, brackets, pipes, ellipses, whitespace and
// sentence-final periods. A period directly inside a token ("vis.social")
// is not a separator.
static SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#",|\s|“|”|"|'|#|\(|\)|\[|\]|《|》|\?|・|\||…|\.\s"#)
        .expect("valid separator pattern")
});
