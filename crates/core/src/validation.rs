//! Required-field gate applied to inbound product and review payloads before
//! they reach the catalog store.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::product::ProductFields;
use crate::domain::review::ReviewFields;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn required(field: &str, label: &str) -> Self {
        Self { field: field.to_string(), message: format!("{label} is required!") }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self { field: field.to_string(), message: message.into() }
    }
}

/// Raw product form values as received from the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
}

impl ProductInput {
    /// Sets a form field by name. Unrecognized fields are ignored and never
    /// reach the persisted record.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "brand" => &mut self.brand,
            "description" => &mut self.description,
            "price" => &mut self.price,
            "category" => &mut self.category,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn validate(self) -> Result<ProductFields, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = required(self.name, "name", "Name", &mut errors);
        let brand = required(self.brand, "brand", "Brand", &mut errors);
        let description = required(self.description, "description", "Description", &mut errors);
        let price = required(self.price, "price", "Price", &mut errors).and_then(|raw| {
            match Decimal::from_str(raw.trim()) {
                Ok(price) => Some(price),
                Err(_) => {
                    errors.push(FieldError::invalid("price", "Price must be a number!"));
                    None
                }
            }
        });

        match (name, brand, description, price) {
            (Some(name), Some(brand), Some(description), Some(price)) if errors.is_empty() => {
                Ok(ProductFields { name, brand, description, price, category: present(self.category) })
            }
            _ => Err(errors),
        }
    }
}

/// Raw review body. `rate` may arrive as a number or a numeric string.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReviewInput {
    pub rate: Option<Value>,
    pub comment: Option<String>,
}

impl ReviewInput {
    pub fn validate(self) -> Result<ReviewFields, Vec<FieldError>> {
        let mut errors = Vec::new();

        let rate = match self.rate {
            None | Some(Value::Null) => {
                errors.push(FieldError::required("rate", "Rate"));
                None
            }
            Some(value) => match parse_rate(&value) {
                Some(rate) => Some(rate),
                None => {
                    errors.push(FieldError::invalid("rate", "Rate must be a whole number!"));
                    None
                }
            },
        };
        let comment = required(self.comment, "comment", "Comment", &mut errors);

        match (rate, comment) {
            (Some(rate), Some(comment)) => Ok(ReviewFields { rate, comment }),
            _ => Err(errors),
        }
    }
}

pub(crate) fn parse_rate(value: &Value) -> Option<u8> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|rate| u8::try_from(rate).ok()),
        Value::String(raw) => raw.trim().parse::<u8>().ok(),
        _ => None,
    }
}

fn required(
    value: Option<String>,
    field: &str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let value = present(value);
    if value.is_none() {
        errors.push(FieldError::required(field, label));
    }
    value
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
