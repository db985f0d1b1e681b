/// Normalizes a feed title taken from remote metadata.
///
/// Control characters (including terminal escape sequences) are dropped,
/// line breaks and tabs become single spaces, and surrounding whitespace
/// is trimmed. Titles are stored as OPML attributes and printed by `ls`,
/// so they must stay on one line.
///
/// ```
/// use rainfeeds::util::clean_title;
///
/// assert_eq!(clean_title("  Daily\nNews\x1b "), "Daily News");
/// ```
pub fn clean_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    out
}
