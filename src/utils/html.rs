use ammonia;

/// Clean user-supplied rich text using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive, dangerous
/// tags (like <script>, <iframe>) and event-handler attributes are stripped.
/// Applied to question prompts and redemption delivery details before they
/// are persisted, as a fail-safe against stored XSS in the admin panel.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("Ship to <b>Main St</b><script>alert(1)</script>");
        assert_eq!(cleaned, "Ship to <b>Main St</b>");
    }
}
