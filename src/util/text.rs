use std::borrow::Cow;

/// Returns `true` for characters XML 1.0 cannot carry, even escaped.
fn is_xml_forbidden(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Strips characters that are not allowed in an XML 1.0 document.
///
/// Feed titles come from remote documents and occasionally carry stray
/// control bytes (form feeds, vertical tabs, NULs). Tab, newline and
/// carriage return are kept.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
///
/// # Examples
///
/// ```
/// use feed_digest::util::strip_control_chars;
///
/// assert_eq!(strip_control_chars("Plain title"), "Plain title");
/// assert_eq!(strip_control_chars("Bad\u{0C}title"), "Badtitle");
/// ```
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_forbidden) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|c| !is_xml_forbidden(*c)).collect())
}
