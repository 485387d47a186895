//! Environment prompt: platform, shell, cwd, today's date.

use chrono::Utc;

pub fn environment_prompt(cwd: &str) -> String {
    let platform = std::env::consts::OS;
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "unknown".to_string());
    let today = Utc::now().format("%Y-%m-%d");
    format!("Platform: {platform}\nShell: {shell}\nWorking directory: {cwd}\nToday's date: {today}")
}

/// `[agent.prompt?, environmentPrompt(), user.system?]` joined by newlines.
pub fn system_prompt(agent_prompt: Option<&str>, cwd: &str, user_system: Option<&str>) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(p) = agent_prompt {
        parts.push(p.to_string());
    }
    parts.push(environment_prompt(cwd));
    if let Some(s) = user_system {
        parts.push(s.to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_prompt_lists_the_four_fields() {
        let prompt = environment_prompt("/work");
        assert!(prompt.contains("Platform:"));
        assert!(prompt.contains("Shell:"));
        assert!(prompt.contains("/work"));
        assert!(prompt.contains("Today's date:"));
    }

    #[test]
    fn system_prompt_omits_absent_pieces() {
        let parts = system_prompt(None, "/work", None);
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn system_prompt_includes_agent_and_user_pieces_when_present() {
        let parts = system_prompt(Some("be helpful"), "/work", Some("be terse"));
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "be helpful");
        assert_eq!(parts[2], "be terse");
    }
}
