//! Small shared helpers.

/// Mask credential-bearing values in a command line before it is logged or
/// shipped to the remote log stream.
///
/// Whitespace is normalized to single spaces; the result is for display
/// only, never for re-execution.
pub fn mask_secrets(command: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut mask_next = false;
    for token in command.split_whitespace() {
        if mask_next {
            out.push("***".to_string());
            mask_next = false;
            continue;
        }
        if let Some((key, _)) = token.split_once('=')
            && is_sensitive_key(key)
        {
            out.push(format!("{key}=***"));
            continue;
        }
        if matches!(token, "--token" | "--password" | "--api-key" | "--secret") {
            out.push(token.to_string());
            mask_next = true;
            continue;
        }
        out.push(token.to_string());
    }
    out.join(" ")
}

fn is_sensitive_key(key: &str) -> bool {
    let upper = key.trim_start_matches('-').to_ascii_uppercase();
    const SUFFIXES: [&str; 6] = ["TOKEN", "SECRET", "PASSWORD", "PASSWD", "API_KEY", "ACCESS_KEY"];
    SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}
