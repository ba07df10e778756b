use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) are preserved,
/// dangerous tags (<script>, <iframe>) and event-handler attributes are
/// stripped. Applied to every user-authored rich text field (post bodies,
/// comments, chat messages) before it reaches the database.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
