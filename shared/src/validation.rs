//! Validation utilities for the Apparel Wholesale Platform

use rust_decimal::Decimal;

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate product code format (3-20 uppercase alphanumeric, dashes allowed)
pub fn validate_product_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 {
        return Err("Product code must be at least 3 characters");
    }
    if code.len() > 20 {
        return Err("Product code must be at most 20 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Product code must be uppercase alphanumeric or dashes");
    }
    Ok(())
}

/// Validate a color or size label (non-empty, at most 40 characters)
pub fn validate_variant_label(label: &str) -> Result<(), &'static str> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err("Color/size label cannot be empty");
    }
    if trimmed.len() > 40 {
        return Err("Color/size label must be at most 40 characters");
    }
    Ok(())
}

/// Validate a stock count (non-negative)
pub fn validate_stock_count(count: i64) -> Result<(), &'static str> {
    if count < 0 {
        return Err("Stock count cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate a requested line quantity (positive, sane upper bound)
pub fn validate_line_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    if quantity > 1_000_000 {
        return Err("Quantity exceeds maximum line size");
    }
    Ok(())
}

/// Validate a wholesale unit price (non-negative)
pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Unit price cannot be negative");
    }
    Ok(())
}

/// Validate order number format: PREFIX-YYYY-NNNN (e.g., "PO-2024-0001")
pub fn validate_order_number(order_number: &str) -> Result<(), &'static str> {
    let parts: Vec<&str> = order_number.split('-').collect();

    if parts.len() != 3 {
        return Err("Order number must be in format PREFIX-YYYY-NNNN");
    }
    if parts[0].is_empty() || !parts[0].chars().all(|c| c.is_ascii_uppercase()) {
        return Err("Order number prefix must be uppercase letters");
    }
    if parts[1].len() != 4 || !parts[1].chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid year in order number");
    }
    if parts[2].len() < 4 || !parts[2].chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid sequence number in order number");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Catalog Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_product_code_valid() {
        assert!(validate_product_code("AWP-TEE-0042").is_ok());
        assert!(validate_product_code("HOODIE1").is_ok());
        assert!(validate_product_code("ABC").is_ok());
    }

    #[test]
    fn test_validate_product_code_invalid() {
        assert!(validate_product_code("AB").is_err()); // Too short
        assert!(validate_product_code("A-VERY-LONG-PRODUCT-CODE").is_err()); // Too long
        assert!(validate_product_code("awp-tee").is_err()); // Lowercase
        assert!(validate_product_code("AWP_TEE").is_err()); // Underscore
    }

    #[test]
    fn test_validate_variant_label() {
        assert!(validate_variant_label("black").is_ok());
        assert!(validate_variant_label("XL").is_ok());
        assert!(validate_variant_label("").is_err());
        assert!(validate_variant_label("   ").is_err());
        assert!(validate_variant_label(&"x".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_stock_count() {
        assert!(validate_stock_count(0).is_ok());
        assert!(validate_stock_count(500).is_ok());
        assert!(validate_stock_count(-1).is_err());
    }

    // ========================================================================
    // Order Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_line_quantity() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(10_000).is_ok());
        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(-5).is_err());
        assert!(validate_line_quantity(2_000_000).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Decimal::ZERO).is_ok());
        assert!(validate_unit_price(Decimal::from(1250)).is_ok());
        assert!(validate_unit_price(Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_validate_order_number_valid() {
        assert!(validate_order_number("PO-2024-0001").is_ok());
        assert!(validate_order_number("PO-2024-99999").is_ok());
    }

    #[test]
    fn test_validate_order_number_invalid() {
        assert!(validate_order_number("PO-24-0001").is_err());
        assert!(validate_order_number("po-2024-0001").is_err());
        assert!(validate_order_number("PO20240001").is_err());
        assert!(validate_order_number("PO-2024-1").is_err());
    }
}
