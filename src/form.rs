//! Get Involved contact form
//!
//! Field names follow the HTML form (`email_id`, `g-recaptcha-response`).
//! Error strings are per field so the page can show them next to inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field name → validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Raw form body as posted by the browser
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email_id: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub message: String,
    /// Hidden honeypot; humans never fill it in
    #[serde(default)]
    pub website: String,
    #[serde(default, rename = "g-recaptcha-response")]
    pub captcha_token: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Speaker,
    Volunteer,
    Attendee,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Speaker, Role::Volunteer, Role::Attendee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Speaker => "speaker",
            Role::Volunteer => "volunteer",
            Role::Attendee => "attendee",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Speaker => "Speaker",
            Role::Volunteer => "Volunteer",
            Role::Attendee => "Attendee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or(())
    }
}

/// A form that passed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub affiliation: String,
    pub role: Role,
    pub message: String,
}

impl ContactForm {
    /// Honeypot filled in
    pub fn is_bot(&self) -> bool {
        !self.website.trim().is_empty()
    }

    pub fn has_captcha_token(&self) -> bool {
        !self.captcha_token.trim().is_empty()
    }

    pub fn validate(&self) -> Result<ContactSubmission, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim();
        let email = self.email_id.trim();
        let affiliation = self.affiliation.trim();
        let message = self.message.trim();

        check_length(&mut errors, "name", name, 2, 80);
        if check_length(&mut errors, "email_id", email, 4, 80) && !is_valid_email(email) {
            push(&mut errors, "email_id", "Invalid email address.".to_string());
        }
        check_length(&mut errors, "affiliation", affiliation, 4, 80);
        check_length(&mut errors, "message", message, 4, 800);

        let role = if self.role.trim().is_empty() {
            push(&mut errors, "role", "This field is required.".to_string());
            None
        } else {
            match self.role.parse::<Role>() {
                Ok(role) => Some(role),
                Err(()) => {
                    push(&mut errors, "role", "Not a valid choice.".to_string());
                    None
                }
            }
        };

        match role {
            Some(role) if errors.is_empty() => Ok(ContactSubmission {
                name: name.to_string(),
                email: email.to_string(),
                affiliation: affiliation.to_string(),
                role,
                message: message.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

/// Required + length bounds; true when the value passed
fn check_length(errors: &mut FieldErrors, field: &str, value: &str, min: usize, max: usize) -> bool {
    if value.is_empty() {
        push(errors, field, "This field is required.".to_string());
        return false;
    }
    let len = value.chars().count();
    if len < min || len > max {
        push(
            errors,
            field,
            format!("Field must be between {min} and {max} characters long."),
        );
        return false;
    }
    true
}

fn push(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

/// Structural address check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> ContactForm {
        ContactForm {
            name: "Ann Lee".to_string(),
            email_id: "ann@x.com".to_string(),
            affiliation: "Princeton".to_string(),
            role: "speaker".to_string(),
            message: "I'd love to talk about urban resilience.".to_string(),
            website: String::new(),
            captcha_token: "token".to_string(),
            csrf_token: "csrf".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        let submission = valid_form().validate().unwrap();
        assert_eq!(submission.name, "Ann Lee");
        assert_eq!(submission.role, Role::Speaker);
    }

    #[test]
    fn test_length_bounds() {
        let mut form = valid_form();
        form.name = "A".to_string();
        form.message = "x".repeat(801);
        form.affiliation = "abc".to_string();

        let errors = form.validate().unwrap_err();
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("message"));
        assert!(errors.contains_key("affiliation"));
        assert!(!errors.contains_key("email_id"));
        assert_eq!(
            errors["name"],
            vec!["Field must be between 2 and 80 characters long.".to_string()]
        );
    }

    #[test]
    fn test_missing_fields_are_required() {
        let errors = ContactForm::default().validate().unwrap_err();
        for field in ["name", "email_id", "affiliation", "role", "message"] {
            assert_eq!(errors[field], vec!["This field is required.".to_string()], "{field}");
        }
    }

    #[test]
    fn test_invalid_role_and_email() {
        let mut form = valid_form();
        form.role = "organizer".to_string();
        form.email_id = "not-an-email".to_string();

        let errors = form.validate().unwrap_err();
        assert_eq!(errors["role"], vec!["Not a valid choice.".to_string()]);
        assert_eq!(errors["email_id"], vec!["Invalid email address.".to_string()]);
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("ann@x.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ann@x"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("ann@@x.com"));
        assert!(!is_valid_email("ann lee@x.com"));
        assert!(!is_valid_email("ann@x..com"));
    }

    #[test]
    fn test_honeypot() {
        let mut form = valid_form();
        assert!(!form.is_bot());
        form.website = "http://spam.example".to_string();
        assert!(form.is_bot());
    }

    #[test]
    fn test_deserialize_urlencoded_field_names() {
        let form: ContactForm = serde_json::from_value(serde_json::json!({
            "name": "Ann",
            "email_id": "ann@x.com",
            "g-recaptcha-response": "abc",
            "csrf_token": "ignored"
        }))
        .unwrap();
        assert_eq!(form.captcha_token, "abc");
        assert!(form.has_captcha_token());
        assert!(form.role.is_empty());
    }
}
