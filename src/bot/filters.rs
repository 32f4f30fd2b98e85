//! Cheap checks run before anything touches the network.

const LINK_KEYWORDS: &[&str] = &[
    "link",
    "buy",
    "website",
    "url",
    "how to buy",
    "where can i get",
];

/// Returns `true` when the comment looks like someone asking where or how to buy.
///
/// Those are left to humans, the bot never posts purchase links publicly.
pub fn is_asking_for_link(text: &str) -> bool {
    let lower = text.to_lowercase();

    LINK_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        || (lower.contains("send") && lower.contains("link"))
}

/// Case-sensitive on purpose, matches the username exactly as the platform reports it.
pub fn is_own_account(author: &str, own_username: &str) -> bool {
    author == own_username
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_requests() {
        for text in [
            "Where can I buy this?",
            "link pls",
            "Send me the LINK",
            "what's your website",
            "drop the URL",
            "Where can I get one?",
            "How to buy??",
        ] {
            assert!(is_asking_for_link(text), "`{}` should be a link request", text);
        }
    }

    #[test]
    fn test_regular_comments() {
        for text in [
            "This broke after one use",
            "Love it 😍",
            "How long does a bottle last?",
            "Do you ship to Dubai?",
            "",
        ] {
            assert!(!is_asking_for_link(text), "`{}` isn't a link request", text);
        }
    }

    #[test]
    fn test_substring_matches_inside_words() {
        // plain substring matching, "buyer" still counts
        assert!(is_asking_for_link("first time buyer here"));
    }

    #[test]
    fn test_own_account() {
        assert!(is_own_account("reginaldmen", "reginaldmen"));
        assert!(!is_own_account("ReginaldMen", "reginaldmen"));
        assert!(!is_own_account("someone", "reginaldmen"));
    }
}
