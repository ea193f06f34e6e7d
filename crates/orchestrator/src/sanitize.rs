//! Cleanup of generated text before it is shown or stored.

/// Strip markdown emphasis markers (`**bold**`, `*italic*`).
///
/// Every `*` is removed and everything else is left as is, so applying it
/// twice gives the same result as applying it once.
pub fn sanitize(text: &str) -> String {
    text.replace('*', "")
}
