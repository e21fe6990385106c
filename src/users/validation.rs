//! Declarative field rules checked before any store or mail call.
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AccountError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Required,
    Email,
    /// Must equal the named field exactly.
    SameAs(&'static str),
}

#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    /// Surrounding whitespace is ignored; secrets are taken verbatim.
    pub trim: bool,
    pub rules: &'static [Rule],
}

/// Request bodies expose their raw field values by name.
pub trait Fields {
    fn field(&self, name: &str) -> Option<&str>;
}

#[derive(Debug)]
pub struct Schema(pub &'static [FieldSpec]);

impl Schema {
    /// Collects one message per failing field; the first failing rule wins.
    pub fn validate<F: Fields + ?Sized>(&self, input: &F) -> Result<(), AccountError> {
        let mut errors = Vec::new();
        for spec in self.0 {
            let value = input
                .field(spec.name)
                .map(|v| if spec.trim { v.trim() } else { v })
                .filter(|v| !v.is_empty());
            for rule in spec.rules {
                let failed = match rule {
                    Rule::Required if value.is_none() => Some(format!("{} is required.", spec.label)),
                    Rule::Email => value
                        .filter(|v| !is_valid_email(v))
                        .map(|_| format!("{} must be a valid email.", spec.label)),
                    Rule::SameAs(other) => value
                        .filter(|v| input.field(other) != Some(*v))
                        .map(|_| "Passwords must match.".to_string()),
                    Rule::Required => None,
                };
                if let Some(msg) = failed {
                    errors.push(msg);
                    break;
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AccountError::Validation(errors))
        }
    }
}

const EMAIL: FieldSpec = FieldSpec {
    name: "email",
    label: "Email",
    trim: true,
    rules: &[Rule::Required, Rule::Email],
};

const PASSWORD: FieldSpec = FieldSpec {
    name: "password",
    label: "Password",
    trim: false,
    rules: &[Rule::Required],
};

const PASSWORD_CONFIRMATION: FieldSpec = FieldSpec {
    name: "password_confirmation",
    label: "Password confirmation",
    trim: false,
    rules: &[Rule::Required, Rule::SameAs("password")],
};

pub const LOGIN: Schema = Schema(&[EMAIL, PASSWORD]);

pub const REGISTER: Schema = Schema(&[
    FieldSpec {
        name: "name",
        label: "Name",
        trim: true,
        rules: &[Rule::Required],
    },
    EMAIL,
    PASSWORD,
    PASSWORD_CONFIRMATION,
]);

pub const FORGOT_PASSWORD: Schema = Schema(&[EMAIL]);

pub const RESET_PASSWORD: Schema = Schema(&[PASSWORD, PASSWORD_CONFIRMATION]);
