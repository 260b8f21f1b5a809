//! Book model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Book with its loanable stock
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    /// Amount charged when the book is loaned
    pub price: Decimal,
    /// Copies on the shelf; decremented by active loans
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create or replace book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 3, message = "Title must be at least 3 characters"))]
    pub title: String,
    #[validate(length(min = 3, message = "Author must be at least 3 characters"))]
    pub author: String,
    #[validate(custom(function = "non_negative_price"))]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Available copies must be 0 or more"))]
    pub available_copies: i32,
}

fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO || *price > super::max_amount() {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must be a valid non-negative number".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(price: Decimal, copies: i32) -> BookInput {
        BookInput {
            title: "Dom Casmurro".into(),
            author: "Machado de Assis".into(),
            price,
            available_copies: copies,
        }
    }

    #[test]
    fn rejects_out_of_range_price_and_stock() {
        assert!(input(Decimal::new(-1, 2), 1).validate().is_err());
        assert!(input(Decimal::new(1500, 2), -1).validate().is_err());
        assert!(input(Decimal::ZERO, 0).validate().is_ok());
        assert!(input(Decimal::new(1_000_000_000_000, 2), 1).validate().is_err());
    }
}
