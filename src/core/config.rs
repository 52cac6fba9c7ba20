use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-repository `git config` values (`user.name`, `remote.origin.url`, ...).
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    settings: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.settings.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.settings.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.settings.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.settings.iter()
    }

    pub fn user_name(&self, fallback: &str) -> String {
        self.get("user.name")
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn user_email(&self, fallback: &str) -> String {
        self.get("user.email")
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn remote_url(&self, remote: &str) -> Option<&String> {
        self.get(&format!("remote.{}.url", remote))
    }
}

/// Config keys are `section.name` or `section.subsection.name`.
pub fn is_valid_key(key: &str) -> bool {
    let parts: Vec<&str> = key.split('.').collect();
    parts.len() >= 2
        && parts.iter().all(|p| !p.is_empty())
        && parts[0].chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_identity_falls_back() {
        let mut config = Config::new();
        assert_eq!(config.user_name("Sandbox User"), "Sandbox User");
        config.set("user.name", "Test User");
        config.set("user.email", "test@example.com");
        assert_eq!(config.user_name("x"), "Test User");
        assert_eq!(config.user_email("x"), "test@example.com");
    }

    #[test]
    fn key_validation() {
        assert!(is_valid_key("user.name"));
        assert!(is_valid_key("branch.main.remote"));
        assert!(!is_valid_key("user"));
        assert!(!is_valid_key("user."));
    }
}
