use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
}

/// Form input for a credential change, validated before it leaves the process.
#[derive(Debug, Clone, Default)]
pub struct CredentialChangeForm {
    pub current_password: String,
    pub new_username: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialChange {
    pub current_password: String,
    #[serde(rename = "username", skip_serializing_if = "Option::is_none")]
    pub new_username: Option<String>,
    #[serde(rename = "password", skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

impl CredentialChangeForm {
    pub fn validate(self) -> ControlResult<CredentialChange> {
        if self.current_password.is_empty() {
            return Err(ControlError::validation("Current password is required"));
        }
        let new_username = non_empty(self.new_username);
        let new_password = non_empty(self.new_password);
        if new_username.is_none() && new_password.is_none() {
            return Err(ControlError::validation(
                "Enter a new username or password to change",
            ));
        }
        if let Some(password) = &new_password {
            if *password != self.confirm_password {
                return Err(ControlError::validation("New passwords do not match"));
            }
            if password.chars().count() < MIN_PASSWORD_LEN {
                return Err(ControlError::validation(format!(
                    "Password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
        }
        Ok(CredentialChange {
            current_password: self.current_password,
            new_username,
            new_password,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
