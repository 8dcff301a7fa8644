//! Matching keys for artist and track names.
//!
//! Last.fm and the local library are catalogued independently, so the same
//! track can be spelled "Björk" in one and "BJORK" in the other. Both sides
//! are reduced to a [`NormalizedKey`] before they are compared.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;

/// A dense, lower-case ASCII key derived from a display name.
///
/// Two display names refer to the same entity iff their keys are equal.
pub type NormalizedKey = String;

/// Anything that is not a letter, digit or underscore.
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]").unwrap());

/// Reduce a display name to its matching key.
///
/// Steps, in order: transliterate to ASCII (folding diacritics and
/// non-Latin scripts), lower-case, drop a leading `"the "` or trailing
/// `" the"`, then remove every non-word character.
///
/// The function is pure and idempotent. Degenerate input yields an empty
/// key.
///
/// ```rust
/// use lastfm_playcount_sync::normalize;
///
/// assert_eq!(normalize("The Beatles"), "beatles");
/// assert_eq!(normalize("Björk"), normalize("BJORK"));
/// assert_eq!(normalize("Hey Jude"), "heyjude");
/// ```
pub fn normalize(raw: &str) -> NormalizedKey {
    let folded = any_ascii(raw).to_lowercase();

    let trimmed = folded.strip_prefix("the ").unwrap_or(&folded);
    let trimmed = trimmed.strip_suffix(" the").unwrap_or(trimmed);

    NON_WORD.replace_all(trimmed, "").into_owned()
}
