//! The chat page served at `/`. It only composes the header (mode switcher)
//! and the chat widget; the widget talks to `/api/chat` on its own.

pub const INDEX_HTML: &str = include_str!("index.html");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_has_switcher_and_widget() {
        assert!(INDEX_HTML.contains("id=\"mode-switcher\""));
        assert!(INDEX_HTML.contains("id=\"chat\""));
        assert!(INDEX_HTML.contains("/api/chat"));
    }
}
