use serde::Deserialize;

use crate::error::{ AppError, Result };
use crate::validation::{ self, FieldError };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    PersonalDetails,
    Account,
    Terms,
}

impl RegistrationStep {
    pub fn all() -> &'static [RegistrationStep] {
        &[RegistrationStep::PersonalDetails, RegistrationStep::Account, RegistrationStep::Terms]
    }

    pub fn next(&self) -> Option<RegistrationStep> {
        match self {
            RegistrationStep::PersonalDetails => Some(RegistrationStep::Account),
            RegistrationStep::Account => Some(RegistrationStep::Terms),
            RegistrationStep::Terms => None,
        }
    }
}

/// Data collected by the three-step sign-up wizard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub accept_terms: bool,
}

impl RegistrationForm {
    /// Errors for one wizard step; an empty list lets the wizard advance.
    pub fn validate_step(&self, step: RegistrationStep) -> Vec<FieldError> {
        let mut errors = Vec::new();

        match step {
            RegistrationStep::PersonalDetails => {
                errors.extend(validation::required("firstName", &self.first_name));
                errors.extend(validation::required("lastName", &self.last_name));

                if let Some(missing) = validation::required("email", &self.email) {
                    errors.push(missing);
                } else if !validation::email(self.email.trim()) {
                    errors.push(FieldError::new("email", "Invalid email format"));
                }

                if let Some(missing) = validation::required("phone", &self.phone) {
                    errors.push(missing);
                } else if !validation::phone(self.phone.trim()) {
                    errors.push(FieldError::new("phone", "Invalid phone number"));
                }
            }
            RegistrationStep::Account => {
                errors.extend(validation::required("country", &self.country));

                if let Err(message) = validation::password_strength(&self.password) {
                    errors.push(FieldError::new("password", message));
                }
                if self.password != self.confirm_password {
                    errors.push(FieldError::new("confirmPassword", "Passwords do not match"));
                }
            }
            RegistrationStep::Terms => {
                if !self.accept_terms {
                    errors.push(FieldError::new("acceptTerms", "You must accept the terms"));
                }
            }
        }

        errors
    }

    /// Validate every step; the first error is returned.
    pub fn validate(&self) -> Result<()> {
        for step in RegistrationStep::all() {
            if let Some(error) = self.validate_step(*step).into_iter().next() {
                return Err(AppError::from(error));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form(email: &str) -> RegistrationForm {
        RegistrationForm {
            first_name: "Alice".to_string(),
            last_name: "Martin".to_string(),
            email: email.to_string(),
            phone: "+33 6 12 34 56 78".to_string(),
            country: "FR".to_string(),
            password: "Passw0rd!".to_string(),
            confirm_password: "Passw0rd!".to_string(),
            accept_terms: true,
        }
    }

    #[test]
    fn test_valid_form_passes_every_step() {
        let form = valid_form("alice@example.com");
        for step in RegistrationStep::all() {
            assert!(form.validate_step(*step).is_empty(), "step {:?} failed", step);
        }
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_personal_step_reports_each_field() {
        let form = RegistrationForm { email: "nope".to_string(), ..Default::default() };
        let fields: Vec<String> = form
            .validate_step(RegistrationStep::PersonalDetails)
            .into_iter()
            .map(|e| e.field)
            .collect();

        assert_eq!(fields, vec!["firstName", "lastName", "email", "phone"]);
    }

    #[test]
    fn test_account_step_checks_confirmation() {
        let mut form = valid_form("alice@example.com");
        form.confirm_password = "Passw0rd?".to_string();

        let errors = form.validate_step(RegistrationStep::Account);
        assert_eq!(errors, vec![FieldError::new("confirmPassword", "Passwords do not match")]);
    }

    #[test]
    fn test_validate_returns_first_failing_step() {
        let mut form = valid_form("alice@example.com");
        form.accept_terms = false;
        form.password = "weak".to_string();
        form.confirm_password = "weak".to_string();

        match form.validate() {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "password"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_step_order() {
        assert_eq!(RegistrationStep::PersonalDetails.next(), Some(RegistrationStep::Account));
        assert_eq!(RegistrationStep::Terms.next(), None);
    }
}
