//! Banned-word content filter

/// Check whether a transcript contains any banned word
///
/// Matching is case-insensitive substring matching; the first hit
/// short-circuits.
#[must_use]
pub fn check<S: AsRef<str>>(transcript: &str, banned_words: &[S]) -> bool {
    let transcript = transcript.to_lowercase();
    banned_words
        .iter()
        .any(|word| transcript.contains(&word.as_ref().to_lowercase()))
}
