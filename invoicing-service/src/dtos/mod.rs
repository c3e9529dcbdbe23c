//! Request and response bodies for the HTTP API.

pub mod clients;
pub mod companies;
pub mod invoices;

use crate::services::invoices::MAX_STORED_AMOUNT;
use rust_decimal::Decimal;
use validator::ValidationError;

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn storable(value: &Decimal) -> Result<(), ValidationError> {
    if *value > MAX_STORED_AMOUNT {
        return Err(validation_error(
            "too_large",
            "Value must not exceed 999999999999999.9999",
        ));
    }
    Ok(())
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(validation_error("non_negative", "Value must not be negative"));
    }
    storable(value)
}

pub(crate) fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(validation_error("positive", "Value must be greater than zero"));
    }
    storable(value)
}

pub(crate) fn percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(validation_error("percentage", "Value must be between 0 and 100"));
    }
    Ok(())
}
