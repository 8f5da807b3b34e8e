//! Validation utilities for the Fertilizer Procurement Platform
//!
//! Input checks applied before records enter the settlement engine.

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::models::{Allocation, DeliveryOrder, Distribution, UnionDistribution, PORT_COUNTRIES};

// ============================================================================
// Batch Validations
// ============================================================================

/// Validate agreed batch quantity and rate
pub fn validate_batch_terms(quantity: Decimal, rate: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Batch quantity cannot be negative");
    }
    if rate < Decimal::ZERO {
        return Err("Batch rate cannot be negative");
    }
    Ok(())
}

pub fn validate_batch_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Batch name is required");
    }
    if name.chars().count() > 200 {
        return Err("Batch name must be at most 200 characters");
    }
    Ok(())
}

/// Validate purchasing year (2000-2100)
pub fn validate_batch_year(year: i32) -> Result<(), &'static str> {
    if !(2000..=2100).contains(&year) {
        return Err("Batch year must be between 2000 and 2100");
    }
    Ok(())
}

/// Validate letter of credit number
pub fn validate_lc_number(lc_number: &str) -> Result<(), &'static str> {
    if lc_number.trim().is_empty() {
        return Err("LC number is required");
    }
    if lc_number.chars().count() > 200 {
        return Err("LC number must be at most 200 characters");
    }
    Ok(())
}

// ============================================================================
// Delivery Order Validations
// ============================================================================

pub fn validate_vessel(vessel: &str) -> Result<(), &'static str> {
    let vessel = vessel.trim();
    if vessel.is_empty() {
        return Err("Vessel is required");
    }
    if vessel.chars().count() > 200 {
        return Err("Vessel must be at most 200 characters");
    }
    Ok(())
}

pub fn validate_bill_of_loading(bill_of_loading: &str) -> Result<(), &'static str> {
    if bill_of_loading.trim().is_empty() {
        return Err("Bill of loading is required");
    }
    Ok(())
}

/// Validate a union-level allocated quantity
pub fn validate_union_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Union quantity cannot be negative");
    }
    Ok(())
}

/// Validate received quantity, shortage and over-supply of a union delivery
pub fn validate_union_distribution(union: &UnionDistribution) -> Result<(), &'static str> {
    validate_union_quantity(union.quantity)?;
    if union.shortage < Decimal::ZERO {
        return Err("Shortage cannot be negative");
    }
    if union.over < Decimal::ZERO {
        return Err("Over-supply cannot be negative");
    }
    Ok(())
}

pub fn validate_allocation(allocation: &Allocation) -> Result<(), &'static str> {
    for union in &allocation.union_allocations {
        validate_union_quantity(union.quantity)?;
    }
    Ok(())
}

pub fn validate_distribution(distribution: &Distribution) -> Result<(), &'static str> {
    for union in &distribution.union_distributions {
        validate_union_distribution(union)?;
    }
    Ok(())
}

/// Validate that each buyer has at most one allocation and one distribution
pub fn validate_unique_buyers(order: &DeliveryOrder) -> Result<(), &'static str> {
    let mut seen = HashSet::new();
    if !order.allocations.iter().all(|a| seen.insert(a.buyer_id)) {
        return Err("A buyer can only have one allocation per delivery order");
    }
    seen.clear();
    if !order.distributions.iter().all(|d| seen.insert(d.buyer_id)) {
        return Err("A buyer can only have one distribution per delivery order");
    }
    Ok(())
}

/// Validate a delivery order and every child record
pub fn validate_delivery_order(order: &DeliveryOrder) -> Result<(), &'static str> {
    validate_bill_of_loading(&order.bill_of_loading)?;
    validate_unique_buyers(order)?;
    for allocation in &order.allocations {
        validate_allocation(allocation)?;
    }
    for distribution in &order.distributions {
        validate_distribution(distribution)?;
    }
    Ok(())
}

// ============================================================================
// Reference Data Validations
// ============================================================================

/// Validate that a port lies in one of the supported countries
pub fn validate_port_country(country: &str) -> Result<(), &'static str> {
    if PORT_COUNTRIES.contains(&country) {
        Ok(())
    } else {
        Err("Unsupported port country")
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a number entered with thousands separators, e.g. `"12,500.75"`
pub fn parse_formatted_decimal(input: &str) -> Result<Decimal, &'static str> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err("Number is required");
    }
    Decimal::from_str(&cleaned).map_err(|_| "Enter a number")
}
