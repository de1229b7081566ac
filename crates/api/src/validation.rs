//! Field validation for request bodies.
//!
//! Failures surface as 422 with a `field: message` detail. Rules that depend on
//! stored state (stock, ownership, order status) live in the services and
//! surface as 400.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{AddressInput, PaymentMethodInput, ProductInput};

static ZIP_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\s-]{4,10}$").expect("Invalid regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{10,15}$").expect("Invalid regex"));

static EXPIRATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("Invalid regex"));

/// Maximum page size for paginated listings.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

type Result<T> = std::result::Result<T, ValidationError>;

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {min} and {max} characters"),
        ));
    }
    Ok(())
}

fn check_max(field: &'static str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        )),
        _ => Ok(()),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Keep only digits and `+`.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// Validate and normalize an address body.
///
/// # Errors
///
/// Returns the first field that breaks its rule.
pub fn validate_address(input: AddressInput) -> Result<AddressInput> {
    let address_name = trimmed(input.address_name);
    check_max("address_name", address_name.as_deref(), 50)?;

    let address_line1 = input.address_line1.trim().to_string();
    check_len("address_line1", &address_line1, 5, 200)?;

    let address_line2 = trimmed(input.address_line2);
    check_max("address_line2", address_line2.as_deref(), 200)?;

    let country = input.country.trim().to_string();
    check_len("country", &country, 2, 100)?;
    let state = input.state.trim().to_string();
    check_len("state", &state, 2, 100)?;
    let city = input.city.trim().to_string();
    check_len("city", &city, 2, 100)?;

    let zip_code = input.zip_code.trim().to_string();
    if !ZIP_CODE_RE.is_match(&zip_code) {
        return Err(ValidationError::new(
            "zip_code",
            "must be 4 to 10 letters, digits, spaces or dashes",
        ));
    }

    let recipient_name = input.recipient_name.trim().to_string();
    check_len("recipient_name", &recipient_name, 2, 100)?;

    let phone_number = normalize_phone(&input.phone_number);
    if !PHONE_RE.is_match(&phone_number) {
        return Err(ValidationError::new(
            "phone_number",
            "must contain 10 to 15 digits",
        ));
    }

    Ok(AddressInput {
        address_name,
        address_line1,
        address_line2,
        country,
        state,
        city,
        zip_code,
        recipient_name,
        phone_number,
        is_default: input.is_default,
    })
}

/// Validate a payment method body.
///
/// # Errors
///
/// Returns the first field that breaks its rule.
pub fn validate_payment_method(input: &PaymentMethodInput) -> Result<()> {
    if input.provider_ref.trim().is_empty() {
        return Err(ValidationError::new("provider_ref", "is required"));
    }

    if let Some(last_four) = &input.last_four
        && (last_four.len() != 4 || !last_four.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(ValidationError::new("last_four", "must be exactly 4 digits"));
    }

    if let Some(expiration) = &input.expiration_date
        && !EXPIRATION_RE.is_match(expiration)
    {
        return Err(ValidationError::new(
            "expiration_date",
            "must be MM/YY with a month between 01 and 12",
        ));
    }

    if input.payment_type.is_card() && input.last_four.is_none() {
        return Err(ValidationError::new("last_four", "is required for cards"));
    }

    Ok(())
}

/// Validate a product body.
///
/// # Errors
///
/// Returns the first field that breaks its rule.
pub fn validate_product(input: &ProductInput) -> Result<()> {
    check_len("name", input.name.trim(), 1, 255)?;
    if input.price <= Decimal::ZERO {
        return Err(ValidationError::new("price", "must be greater than 0"));
    }
    if input.stock < 0 {
        return Err(ValidationError::new("stock", "must not be negative"));
    }
    check_max("brand", input.brand.as_deref(), 100)?;
    check_max("sku", input.sku.as_deref(), 100)?;
    Ok(())
}

/// Validate a category name.
///
/// # Errors
///
/// Returns an error when the name is empty or longer than 100 characters.
pub fn validate_category_name(name: &str) -> Result<()> {
    check_len("name", name.trim(), 1, 100)
}

/// Validate a review rating.
///
/// # Errors
///
/// Returns an error outside 1..=5.
pub fn validate_rating(rating: i32) -> Result<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::new("rating", "must be between 1 and 5"))
    }
}

/// Validate a new password against the identity provider's default policy.
///
/// # Errors
///
/// Returns an error when the password is shorter than 8 characters or lacks an
/// uppercase letter, a lowercase letter, or a digit.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(ValidationError::new(
            "password",
            "must be at least 8 characters",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "password",
            "must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::new(
            "password",
            "must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("password", "must contain a digit"));
    }
    Ok(())
}

/// Validate a quantity sent to the cart.
///
/// # Errors
///
/// Returns an error below 1.
pub fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(ValidationError::new("quantity", "must be at least 1"));
    }
    Ok(())
}

/// `page` / `limit` query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_page() -> i64 {
    1
}

const fn default_limit() -> i64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    /// Build from optional query values, falling back to page 1 of 20.
    #[must_use]
    pub fn from_query(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page),
            limit: limit.unwrap_or_else(default_limit),
        }
    }

    /// Check bounds.
    ///
    /// # Errors
    ///
    /// Returns an error when `page < 1` or `limit` is outside 1..=100.
    pub fn validate(self) -> Result<Self> {
        if self.page < 1 {
            return Err(ValidationError::new("page", "must be at least 1"));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&self.limit) {
            return Err(ValidationError::new(
                "limit",
                format!("must be between 1 and {MAX_PAGE_LIMIT}"),
            ));
        }
        Ok(self)
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub const fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use befit_core::PaymentType;

    use super::*;

    fn address() -> AddressInput {
        AddressInput {
            address_name: Some("  Casa ".to_string()),
            address_line1: "Calle Roble 15".to_string(),
            address_line2: Some(String::new()),
            country: "Mexico".to_string(),
            state: "Jalisco".to_string(),
            city: "Guadalajara".to_string(),
            zip_code: "44100".to_string(),
            recipient_name: "Luis Perez".to_string(),
            phone_number: "(33) 1234-5678".to_string(),
            is_default: false,
        }
    }

    fn card() -> PaymentMethodInput {
        PaymentMethodInput {
            payment_type: PaymentType::CreditCard,
            provider_ref: "pm_card_visa".to_string(),
            card_brand: Some("visa".to_string()),
            last_four: Some("4242".to_string()),
            expiration_date: Some("08/29".to_string()),
            is_default: false,
        }
    }

    #[test]
    fn test_address_is_normalized() {
        let valid = validate_address(address()).unwrap();
        assert_eq!(valid.address_name.as_deref(), Some("Casa"));
        assert_eq!(valid.address_line2, None);
        assert_eq!(valid.phone_number, "3312345678");
    }

    #[test]
    fn test_address_rejects_short_line() {
        let mut input = address();
        input.address_line1 = "Av 1".to_string();
        assert_eq!(validate_address(input).unwrap_err().field, "address_line1");
    }

    #[test]
    fn test_address_rejects_bad_zip_and_phone() {
        let mut input = address();
        input.zip_code = "12".to_string();
        assert_eq!(validate_address(input).unwrap_err().field, "zip_code");

        let mut input = address();
        input.phone_number = "555-1234".to_string();
        assert_eq!(validate_address(input).unwrap_err().field, "phone_number");
    }

    #[test]
    fn test_international_phone_keeps_plus() {
        assert_eq!(normalize_phone("+52 (55) 1234 5678"), "+525512345678");
    }

    #[test]
    fn test_payment_method_rules() {
        assert!(validate_payment_method(&card()).is_ok());

        let mut input = card();
        input.expiration_date = Some("13/29".to_string());
        assert_eq!(
            validate_payment_method(&input).unwrap_err().field,
            "expiration_date"
        );

        let mut input = card();
        input.last_four = Some("42a2".to_string());
        assert_eq!(validate_payment_method(&input).unwrap_err().field, "last_four");

        let mut input = card();
        input.provider_ref = "  ".to_string();
        assert_eq!(
            validate_payment_method(&input).unwrap_err().field,
            "provider_ref"
        );
    }

    #[test]
    fn test_paypal_needs_no_card_digits() {
        let input = PaymentMethodInput {
            payment_type: PaymentType::Paypal,
            provider_ref: "vault_8kd9".to_string(),
            card_brand: None,
            last_four: None,
            expiration_date: None,
            is_default: true,
        };
        assert!(validate_payment_method(&input).is_ok());
    }

    #[test]
    fn test_product_rules() {
        let mut input: ProductInput =
            serde_json::from_str(r#"{"name": "BCAA", "price": "250.00", "stock": 5}"#).unwrap();
        assert!(validate_product(&input).is_ok());

        input.price = Decimal::ZERO;
        assert_eq!(validate_product(&input).unwrap_err().field, "price");

        input.price = Decimal::ONE;
        input.stock = -1;
        assert_eq!(validate_product(&input).unwrap_err().field, "stock");
    }

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password("Str0ngPass").is_ok());
        assert!(validate_password("Sh0rt").is_err());
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("ALLUPPERCASE1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
    }

    #[test]
    fn test_pagination() {
        let page = Pagination { page: 3, limit: 20 }.validate().unwrap();
        assert_eq!(page.offset(), 40);
        assert_eq!(page.total_pages(41), 3);
        assert_eq!(page.total_pages(0), 0);

        assert!(Pagination { page: 0, limit: 20 }.validate().is_err());
        assert!(Pagination { page: 1, limit: 101 }.validate().is_err());

        let page = Pagination::from_query(None, Some(50));
        assert_eq!((page.page, page.limit), (1, 50));
    }

    #[test]
    fn test_error_display() {
        let err = validate_rating(9).unwrap_err();
        assert_eq!(err.to_string(), "rating: must be between 1 and 5");
    }
}
