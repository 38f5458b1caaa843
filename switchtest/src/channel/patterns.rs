//! Prompt patterns for Cisco-style switch CLIs.
//!
//! The device's prompt is the only completion marker on a line-oriented
//! console. These patterns cover the user, enable, and configuration
//! mode prompts plus the login prompts seen during session setup.

use regex::bytes::Regex;

/// User EXEC mode prompt (`switch>`).
pub const USER_PROMPT: &str = r"[A-Za-z0-9._-]+>\s*$";

/// Privileged EXEC mode prompt (`switch#`).
pub const ENABLE_PROMPT: &str = r"[A-Za-z0-9._-]+#\s*$";

/// Global configuration mode prompt (`switch(config)#`).
pub const CONFIG_PROMPT: &str = r"[A-Za-z0-9._-]+\(config\)#\s*$";

/// Interface configuration mode prompt (`switch(config-if)#`).
pub const INTERFACE_PROMPT: &str = r"[A-Za-z0-9._-]+\(config-if\)#\s*$";

/// VLAN configuration mode prompt (`switch(config-vlan)#`).
pub const VLAN_PROMPT: &str = r"[A-Za-z0-9._-]+\(config-vlan\)#\s*$";

/// Login password prompt.
pub const PASSWORD_PROMPT: &str = r"[Pp]assword:\s*$";

/// Login username prompt.
pub const USERNAME_PROMPT: &str = r"[Uu]sername:\s*$";

/// Compile a prompt pattern, anchoring it to end-of-line if the author
/// did not. Patterns are multiline so a prompt preceded by command
/// output still matches.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let anchored = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{pattern}\\s*$")
    };
    Regex::new(&format!("(?m){anchored}"))
}

/// Pattern matching any command-mode prompt (user, enable, or any of
/// the configuration modes). Transports use this as their default
/// completion marker so mode changes do not stall a read.
pub fn any_command_prompt() -> Regex {
    let combined = [
        CONFIG_PROMPT,
        INTERFACE_PROMPT,
        VLAN_PROMPT,
        ENABLE_PROMPT,
        USER_PROMPT,
    ]
    .iter()
    .map(|p| format!("(?:{p})"))
    .collect::<Vec<_>>()
    .join("|");

    // The constituent patterns are compile-checked by the tests below.
    Regex::new(&format!("(?m){combined}")).unwrap_or_else(|_| Regex::new(r"[#>]\s*$").unwrap())
}

/// Pattern matching a login prompt or any command-mode prompt. Used
/// while a session is being brought up, where either can appear next.
pub fn prompt_or_login() -> Regex {
    let command = [
        CONFIG_PROMPT,
        INTERFACE_PROMPT,
        VLAN_PROMPT,
        ENABLE_PROMPT,
        USER_PROMPT,
    ]
    .iter()
    .map(|p| format!("(?:{p})"))
    .collect::<Vec<_>>()
    .join("|");

    Regex::new(&format!(
        "(?m)(?:{USERNAME_PROMPT})|(?:{PASSWORD_PROMPT})|{command}"
    ))
    .unwrap_or_else(|_| Regex::new(r"(?m)[#>:]\s*$").unwrap())
}

/// Pattern matching either login prompt.
pub fn login_prompt() -> Regex {
    Regex::new(&format!("(?m)(?:{USERNAME_PROMPT})|(?:{PASSWORD_PROMPT})"))
        .unwrap_or_else(|_| Regex::new(r"(?m)(?:Username|Password):\s*$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_prompt_matches() {
        let pattern = compile_prompt_pattern(ENABLE_PROMPT).unwrap();
        assert!(pattern.is_match(b"switch#"));
        assert!(pattern.is_match(b"some output\r\nswitch# "));
        assert!(!pattern.is_match(b"switch>"));
    }

    #[test]
    fn test_config_mode_prompts() {
        let any = any_command_prompt();
        assert!(any.is_match(b"sw-01(config)#"));
        assert!(any.is_match(b"sw-01(config-if)# "));
        assert!(any.is_match(b"sw-01(config-vlan)#"));
        assert!(any.is_match(b"sw-01>"));
    }

    #[test]
    fn test_unanchored_pattern_gets_anchor() {
        let pattern = compile_prompt_pattern(r"router#").unwrap();
        assert!(pattern.is_match(b"router# "));
        assert!(!pattern.is_match(b"router# show version in progress"));
    }

    #[test]
    fn test_login_prompts() {
        let login = login_prompt();
        assert!(login.is_match(b"Username: "));
        assert!(login.is_match(b"\r\nPassword:"));
        assert!(!login.is_match(b"switch#"));
    }

    #[test]
    fn test_prompt_not_matched_mid_output() {
        let pattern = compile_prompt_pattern(USER_PROMPT).unwrap();
        // `>` inside a table row must not count as a prompt.
        assert!(!pattern.is_match(b"10 -> Fa0/1 forwarding"));
    }
}
