//! Edit-mode credentials.

use crate::model::settings::AdminUser;

/// Shortest password accepted for a new admin account
pub const MIN_PASSWORD_LEN: usize = 6;

/// Accounts that can always log in, alongside any custom admin
const DEMO_USERS: [(&str, &str); 2] = [("admin", "password123"), ("editor", "editpass")];

/// Error type for login and admin reset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("new admin username cannot be empty")]
    EmptyUsername,
    #[error("new admin password must be at least {min} characters long", min = MIN_PASSWORD_LEN)]
    PasswordTooShort,
    #[error("passwords do not match")]
    PasswordMismatch,
}

/// Check credentials against the custom admin first, then the built-in accounts.
pub fn authenticate(
    custom: Option<&AdminUser>,
    username: &str,
    password: &str,
) -> Result<(), AdminError> {
    if custom.is_some_and(|user| user.matches(username, password)) {
        return Ok(());
    }
    if DEMO_USERS
        .iter()
        .any(|(u, p)| *u == username && *p == password)
    {
        return Ok(());
    }
    tracing::info!(username, "login rejected");
    Err(AdminError::InvalidCredentials)
}

/// Validate reset input and build the replacement admin account.
///
/// The username is trimmed; the password is taken verbatim.
pub fn new_admin(username: &str, password: &str, confirm: &str) -> Result<AdminUser, AdminError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AdminError::EmptyUsername);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AdminError::PasswordTooShort);
    }
    if password != confirm {
        return Err(AdminError::PasswordMismatch);
    }
    Ok(AdminUser::new(username, password))
}
