use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Field name to the messages that field failed with.
#[derive(Clone, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<&'static str>>);

impl ValidationErrors {
    fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.entry(field).or_default().push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[&'static str] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn require(errors: &mut ValidationErrors, field: &'static str, value: &str, message: &'static str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, message);
        false
    } else {
        true
    }
}

fn require_email(errors: &mut ValidationErrors, value: &str, missing: &'static str) {
    if require(errors, "email", value, missing) && !fast_chemail::is_valid_email(value.trim()) {
        errors.add("email", "Please enter a valid email address.");
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        require(&mut errors, "first_name", &self.first_name, "Please enter your first name.");
        require(&mut errors, "last_name", &self.last_name, "Please enter your last name.");
        require_email(&mut errors, &self.email, "Please enter your email.");
        if require(&mut errors, "password", &self.password, "Please enter your password")
            && self.password.chars().count() < crate::models::user::Password::min_len()
        {
            errors.add("password", "Password must be at least 6 characters.");
        }
        errors.into_result()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        require_email(&mut errors, &self.email, "Please enter your email address.");
        require(&mut errors, "password", &self.password, "Please enter a password");
        errors.into_result()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct AddressForm {
    pub address: String,
}

impl AddressForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        require(&mut errors, "address", &self.address, "Please enter an address.");
        errors.into_result()
    }
}
