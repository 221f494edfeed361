use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{
    DeleteAccountRequest, LoginRequest, RegisterRequest, ResetPasswordBody, ResetRequestBody,
    UpdateProfileRequest,
};
use crate::error::FieldError;

const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    } else if !is_valid_email(email) {
        errors.push(FieldError::new(
            "email",
            "Please provide a valid email address",
        ));
    }
}

fn check_new_password(password: &str, param: &str, errors: &mut Vec<FieldError>) {
    if password.is_empty() {
        errors.push(FieldError::new(param, "Password is required"));
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            param,
            "Password must be at least 6 characters long",
        ));
    }
}

fn check_name(name: Option<&str>, param: &str, label: &str, errors: &mut Vec<FieldError>) {
    if let Some(name) = name {
        if name.trim().chars().count() < MIN_NAME_LEN {
            errors.push(FieldError::new(
                param,
                &format!("{label} must be at least 2 characters long"),
            ));
        }
    }
}

pub fn validate_register(body: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(&body.email, &mut errors);
    check_new_password(&body.password, "password", &mut errors);
    if let Some(confirm) = &body.confirm_password {
        if confirm != &body.password {
            errors.push(FieldError::new("confirmPassword", "Passwords do not match"));
        }
    }
    check_name(body.first_name.as_deref(), "firstName", "First name", &mut errors);
    check_name(body.last_name.as_deref(), "lastName", "Last name", &mut errors);
    errors
}

pub fn validate_login(body: &LoginRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(&body.email, &mut errors);
    if body.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    errors
}

pub fn validate_reset_request(body: &ResetRequestBody) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(&body.email, &mut errors);
    errors
}

/// Confirm-password equality is checked here, before any store access.
pub fn validate_reset_password(body: &ResetPasswordBody) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if body.token.is_empty() {
        errors.push(FieldError::new("token", "Reset token is required"));
    }
    check_new_password(&body.password, "password", &mut errors);
    if let Some(confirm) = &body.confirm_password {
        if confirm != &body.password {
            errors.push(FieldError::new("confirmPassword", "Passwords do not match"));
        }
    }
    errors
}

pub fn validate_update_profile(body: &UpdateProfileRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_name(body.first_name.as_deref(), "firstName", "First name", &mut errors);
    check_name(body.last_name.as_deref(), "lastName", "Last name", &mut errors);
    if let Some(new_password) = &body.new_password {
        check_new_password(new_password, "newPassword", &mut errors);
        if body.current_password.as_deref().unwrap_or_default().is_empty() {
            errors.push(FieldError::new(
                "currentPassword",
                "Current password is required when setting new password",
            ));
        }
    }
    errors
}

pub fn validate_delete_account(body: &DeleteAccountRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if body.password.is_empty() {
        errors.push(FieldError::new(
            "password",
            "Password is required to confirm account deletion",
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_and_rejects() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn register_requires_email_and_password() {
        let body = RegisterRequest {
            email: String::new(),
            password: String::new(),
            confirm_password: None,
            first_name: None,
            last_name: None,
        };
        let errors = validate_register(&body);
        let params: Vec<_> = errors.iter().map(|e| e.param.as_str()).collect();
        assert!(params.contains(&"email"));
        assert!(params.contains(&"password"));
    }

    #[test]
    fn register_confirm_password_must_match_when_present() {
        let body = RegisterRequest {
            email: "a@x.com".into(),
            password: "secret1".into(),
            confirm_password: Some("different".into()),
            first_name: None,
            last_name: None,
        };
        let errors = validate_register(&body);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].param, "confirmPassword");
    }

    #[test]
    fn register_confirm_password_is_optional() {
        let body = RegisterRequest {
            email: "a@x.com".into(),
            password: "secret1".into(),
            confirm_password: None,
            first_name: None,
            last_name: None,
        };
        assert!(validate_register(&body).is_empty());
    }

    #[test]
    fn short_password_rejected() {
        let body = RegisterRequest {
            email: "a@x.com".into(),
            password: "short".into(),
            confirm_password: None,
            first_name: None,
            last_name: None,
        };
        let errors = validate_register(&body);
        assert_eq!(errors[0].param, "password");
    }

    #[test]
    fn update_profile_password_change_needs_current() {
        let body = UpdateProfileRequest {
            first_name: None,
            last_name: None,
            current_password: None,
            new_password: Some("newpass1".into()),
        };
        let errors = validate_update_profile(&body);
        assert!(errors.iter().any(|e| e.param == "currentPassword"));
    }
}
