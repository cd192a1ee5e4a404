use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Credentials for an edit-mode account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub username: String,
    /// Hex-encoded SHA-256 of the password
    pub password_hash: String,
}

impl AdminUser {
    pub fn new(username: &str, password: &str) -> Self {
        AdminUser {
            username: username.to_string(),
            password_hash: hash_password(password),
        }
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password_hash == hash_password(password)
    }
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Persisted session settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub admin_status: bool,
    #[serde(default)]
    pub custom_admin_user: Option<AdminUser>,
}

/// Partial settings write; `None` fields are left untouched in the store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsPatch {
    pub admin_status: Option<bool>,
    pub custom_admin_user: Option<AdminUser>,
}

impl SettingsPatch {
    pub fn admin_status(status: bool) -> Self {
        SettingsPatch {
            admin_status: Some(status),
            custom_admin_user: None,
        }
    }

    /// Merge this patch into `settings`
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(status) = self.admin_status {
            settings.admin_status = status;
        }
        if let Some(user) = &self.custom_admin_user {
            settings.custom_admin_user = Some(user.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_user_matches_only_its_own_credentials() {
        let user = AdminUser::new("ops", "hunter22");
        assert!(user.matches("ops", "hunter22"));
        assert!(!user.matches("ops", "hunter23"));
        assert!(!user.matches("OPS", "hunter22"));
        assert_ne!(user.password_hash, "hunter22");
    }

    #[test]
    fn patch_leaves_unspecified_fields() {
        let mut settings = Settings {
            admin_status: false,
            custom_admin_user: Some(AdminUser::new("ops", "secret1")),
        };
        SettingsPatch::admin_status(true).apply_to(&mut settings);
        assert!(settings.admin_status);
        assert_eq!(settings.custom_admin_user.unwrap().username, "ops");
    }

    #[test]
    fn settings_defaults_on_empty_object() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert!(!s.admin_status);
        assert!(s.custom_admin_user.is_none());
    }
}
