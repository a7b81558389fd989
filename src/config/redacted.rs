use super::Settings;

/// Debug view of [`Settings`] that never prints the bot token.
pub struct Redacted<'a>(pub(crate) &'a Settings);

impl std::fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0;
        f.debug_struct("Settings")
            .field("server_url", &s.server_url)
            .field("team", &s.team)
            .field("log_channel", &s.log_channel)
            .field("bot_id", &s.bot_id)
            .field("bot_token", &mask(&s.bot_token))
            .field("prefix", &s.prefix)
            .field("websocket_url", &s.websocket_url)
            .finish()
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&Redacted(self), f)
    }
}

fn mask(s: &str) -> String {
    match s.get(..3) {
        Some(head) if s.len() > 6 => format!("{head}***"),
        _ => "***".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_tokens() {
        assert_eq!(mask("abc"), "***");
        assert_eq!(mask("abcdefghij"), "abc***");
    }

    #[test]
    fn settings_debug_hides_token() {
        let settings = Settings {
            server_url: "https://chat.example.com".into(),
            team: "devs".into(),
            log_channel: "bot-log".into(),
            bot_token: "supersecrettoken".into(),
            bot_id: "bot123".into(),
            prefix: "!xkcd".into(),
            websocket_url: "wss://chat.example.com".into(),
        };
        let shown = format!("{settings:?}");
        assert!(!shown.contains("supersecrettoken"));
        assert!(shown.contains("sup***"));
    }
}
