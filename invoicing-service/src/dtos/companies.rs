use crate::models::{CreateCompany, UpdateCompany};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, message = "Company name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,

    #[validate(url(message = "Invalid website URL"))]
    pub website: String,

    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,

    #[validate(url(message = "Invalid logo URL"))]
    pub logo: Option<String>,

    #[serde(default)]
    pub pin_number: String,

    #[serde(default)]
    pub vat_registered: bool,

    #[serde(default)]
    #[validate(range(min = 0, message = "Employee count cannot be negative"))]
    pub employee_count: i32,
}

impl From<CreateCompanyRequest> for CreateCompany {
    fn from(req: CreateCompanyRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            phone: req.phone,
            website: req.website,
            address: req.address,
            logo: req.logo,
            pin_number: req.pin_number,
            vat_registered: req.vat_registered,
            employee_count: req.employee_count,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, message = "Company name cannot be empty"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    #[validate(length(min = 1, message = "Phone number cannot be empty"))]
    pub phone: Option<String>,

    #[validate(url(message = "Invalid website URL"))]
    pub website: Option<String>,

    #[validate(length(min = 1, message = "Address cannot be empty"))]
    pub address: Option<String>,

    #[validate(url(message = "Invalid logo URL"))]
    pub logo: Option<String>,

    pub pin_number: Option<String>,

    pub vat_registered: Option<bool>,

    #[validate(range(min = 0, message = "Employee count cannot be negative"))]
    pub employee_count: Option<i32>,
}

impl From<UpdateCompanyRequest> for UpdateCompany {
    fn from(req: UpdateCompanyRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            phone: req.phone,
            website: req.website,
            address: req.address,
            logo: req.logo,
            pin_number: req.pin_number,
            vat_registered: req.vat_registered,
            employee_count: req.employee_count,
        }
    }
}
