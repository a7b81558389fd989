/// What a prefixed chat message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Latest,
    Issue(i64),
    /// Two tokens, but the second is not a number. Carries the offending token.
    InvalidNumber(String),
}

/// Interprets a message that already passed the prefix check.
///
/// `daily` anywhere in the text (even inside another word) means the latest comic.
/// Otherwise the message must split on single spaces into exactly two tokens;
/// anything else yields `None` and gets no reply.
pub fn parse_command(message: &str) -> Option<Command> {
    if message.contains("daily") {
        return Some(Command::Latest);
    }

    let parts: Vec<&str> = message.split(' ').collect();
    if parts.len() != 2 {
        return None;
    }

    Some(match parse_issue_number(parts[1]) {
        Some(n) => Command::Issue(n),
        None => Command::InvalidNumber(parts[1].to_string()),
    })
}

/// Integer literal with optional sign and base prefix (`0x`, `0o`, `0b`, or a
/// leading `0` for octal). `_` may separate digits.
pub fn parse_issue_number(token: &str) -> Option<i64> {
    let (negative, unsigned) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    let lower = unsigned.to_ascii_lowercase();
    let (radix, digits, prefixed) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest, true)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest, true)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest, true)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..], true)
    } else {
        (10, lower.as_str(), false)
    };

    if !underscores_ok(digits, prefixed) {
        return None;
    }

    let digits: String = digits.chars().filter(|c| *c != '_').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let signed = if negative { format!("-{digits}") } else { digits };
    i64::from_str_radix(&signed, radix).ok()
}

/// Every `_` sits between two digits; a base prefix counts as a digit on its left.
fn underscores_ok(digits: &str, prefixed: bool) -> bool {
    let bytes = digits.as_bytes();
    bytes.iter().enumerate().all(|(i, b)| {
        if *b != b'_' {
            return true;
        }
        let left_ok = if i == 0 { prefixed } else { bytes[i - 1] != b'_' };
        let right_ok = bytes.get(i + 1).is_some_and(|next| *next != b'_');
        left_ok && right_ok
    })
}
