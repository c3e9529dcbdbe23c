use crate::models::{CreateClient, UpdateClient};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Tax PIN: a letter, nine digits, a letter (e.g. `A123456789Z`).
pub static PIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][0-9]{9}[A-Z]$").expect("PIN pattern is valid"));

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,

    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar: Option<String>,

    #[validate(regex(path = *PIN_REGEX, message = "Invalid PIN format. Example: A123456789Z"))]
    pub pin_number: Option<String>,

    #[serde(default)]
    pub vat_registered: bool,

    pub company_id: Uuid,
}

impl From<CreateClientRequest> for CreateClient {
    fn from(req: CreateClientRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            phone: req.phone,
            avatar: req.avatar,
            pin_number: req.pin_number,
            vat_registered: req.vat_registered,
            company_id: req.company_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    #[validate(length(min = 1, message = "Phone number cannot be empty"))]
    pub phone: Option<String>,

    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar: Option<String>,

    #[validate(regex(path = *PIN_REGEX, message = "Invalid PIN format. Example: A123456789Z"))]
    pub pin_number: Option<String>,

    pub vat_registered: Option<bool>,

    pub company_id: Option<Uuid>,
}

impl From<UpdateClientRequest> for UpdateClient {
    fn from(req: UpdateClientRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            phone: req.phone,
            avatar: req.avatar,
            pin_number: req.pin_number,
            vat_registered: req.vat_registered,
            company_id: req.company_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListClientsQuery {
    pub company_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateClientRequest {
        CreateClientRequest {
            name: "Jane".into(),
            email: "jane@example.com".into(),
            phone: "+254700000001".into(),
            avatar: None,
            pin_number: Some("A123456789Z".into()),
            vat_registered: false,
            company_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn accepts_valid_client() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn pin_must_match_format() {
        for bad in ["a123456789z", "A12345678Z", "A1234567890Z", "1234567890A"] {
            let mut req = valid();
            req.pin_number = Some(bad.into());
            let err = req.validate().expect_err(bad);
            let errors = err.field_errors();
            assert!(errors.contains_key("pin_number"), "{} should be rejected", bad);
        }
    }

    #[test]
    fn pin_is_optional() {
        let mut req = valid();
        req.pin_number = None;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn avatar_must_be_url() {
        let mut req = valid();
        req.avatar = Some("not a url".into());
        assert!(req.validate().is_err());
    }
}
