//! Strict completion-marker parsing.
//!
//! A loop stops only when the transcript carries the structured marker
//! `<promise>TOKEN</promise>` whose token exactly matches the loop's
//! configured completion promise. Substring hits and markers wrapping any
//! other text are ignored, so a stale or copy-pasted marker from a
//! different task can never complete the wrong loop.

const OPEN_TAG: &str = "<promise>";
const CLOSE_TAG: &str = "</promise>";

/// Extract the inner text of every well-formed promise marker, in order.
pub fn find_markers(transcript: &str) -> Vec<&str> {
    let mut markers = Vec::new();
    let mut rest = transcript;

    while let Some(open) = rest.find(OPEN_TAG) {
        let after_open = &rest[open + OPEN_TAG.len()..];
        match after_open.find(CLOSE_TAG) {
            Some(close) => {
                markers.push(&after_open[..close]);
                rest = &after_open[close + CLOSE_TAG.len()..];
            }
            None => break,
        }
    }

    markers
}

/// Whether the transcript contains a marker wrapping exactly `promise`.
///
/// Whitespace around the token inside the tag is tolerated; the token
/// itself must match exactly. Several markers may appear in one
/// transcript; any one exact match counts.
pub fn contains_promise(transcript: &str, promise: &str) -> bool {
    if promise.is_empty() {
        return false;
    }
    find_markers(transcript)
        .iter()
        .any(|inner| inner.trim() == promise)
}
