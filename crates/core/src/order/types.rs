//! Pizza and command value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderError;

// ============================================================================
// Pizza
// ============================================================================

/// Kind of pizza on the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PizzaType {
    Regina,
    Margarita,
    Americana,
    Fantasia,
}

impl PizzaType {
    /// Every pizza on the menu.
    pub const ALL: [PizzaType; 4] = [
        PizzaType::Regina,
        PizzaType::Margarita,
        PizzaType::Americana,
        PizzaType::Fantasia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PizzaType::Regina => "Regina",
            PizzaType::Margarita => "Margarita",
            PizzaType::Americana => "Americana",
            PizzaType::Fantasia => "Fantasia",
        }
    }
}

impl fmt::Display for PizzaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PizzaType {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PizzaType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::UnknownType(s.to_string()))
    }
}

/// Pizza size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PizzaSize {
    S,
    M,
    L,
    XL,
    XXL,
}

impl PizzaSize {
    pub const ALL: [PizzaSize; 5] = [
        PizzaSize::S,
        PizzaSize::M,
        PizzaSize::L,
        PizzaSize::XL,
        PizzaSize::XXL,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PizzaSize::S => "S",
            PizzaSize::M => "M",
            PizzaSize::L => "L",
            PizzaSize::XL => "XL",
            PizzaSize::XXL => "XXL",
        }
    }
}

impl fmt::Display for PizzaSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PizzaSize {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PizzaSize::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::UnknownSize(s.to_string()))
    }
}

/// One line of a command. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pizza {
    pizza_type: PizzaType,
    size: PizzaSize,
}

impl Pizza {
    pub fn new(pizza_type: PizzaType, size: PizzaSize) -> Self {
        Self { pizza_type, size }
    }

    pub fn pizza_type(&self) -> PizzaType {
        self.pizza_type
    }

    pub fn size(&self) -> PizzaSize {
        self.size
    }
}

impl fmt::Display for Pizza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pizza_type, self.size)
    }
}

// ============================================================================
// Command
// ============================================================================

/// Unique identifier for a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Creates a new random `CommandId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommandId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A customer order: an identified, ordered list of pizzas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    id: CommandId,
    pizzas: Vec<Pizza>,
}

impl Command {
    /// Create a command with a fresh identity.
    pub fn new(pizzas: Vec<Pizza>) -> Self {
        Self {
            id: CommandId::new(),
            pizzas,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn pizzas(&self) -> &[Pizza] {
        &self.pizzas
    }

    pub fn pizza(&self, index: usize) -> Option<&Pizza> {
        self.pizzas.get(index)
    }

    pub fn len(&self) -> usize {
        self.pizzas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pizzas.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command {} [", self.id)?;
        for (i, pizza) in self.pizzas.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", pizza)?;
        }
        f.write_str("]")
    }
}
