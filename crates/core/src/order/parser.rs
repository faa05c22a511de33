//! Parser for orders typed at the reception.
//!
//! Grammar: `TYPE SIZE xN[; TYPE SIZE xN]*`, e.g. `regina XXL x2; fantasia M x1`.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::{Command, OrderError, Pizza, PizzaSize, PizzaType};

/// Largest quantity accepted for a single group.
pub const MAX_QUANTITY: u32 = 99;

static GROUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)\s+([A-Za-z]+)\s+x(\d+)$").unwrap());

/// Parse one order line into a command with a fresh identity.
pub fn parse_order(line: &str) -> Result<Command, OrderError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(OrderError::Empty);
    }

    let mut pizzas = Vec::new();
    for group in line.split(';') {
        let group = group.trim();
        let caps = GROUP_REGEX
            .captures(group)
            .ok_or_else(|| OrderError::Malformed(group.to_string()))?;

        let pizza_type: PizzaType = caps[1].parse()?;
        let size: PizzaSize = caps[2].parse()?;
        // Only digits are captured, so the sole parse failure is overflow.
        let quantity: u32 = caps[3].parse().unwrap_or(u32::MAX);
        if quantity == 0 || quantity > MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let pizza = Pizza::new(pizza_type, size);
        pizzas.extend(std::iter::repeat(pizza).take(quantity as usize));
    }

    Ok(Command::new(pizzas))
}
