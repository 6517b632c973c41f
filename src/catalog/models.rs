use serde::{Deserialize, Serialize};

pub type IngredientId = u32;
pub type DispenserId = u32;
pub type DispenserTypeId = u32;
pub type RecipeId = u32;
pub type OrderId = u32;

/// Fixed dispenser type categories known to the rig's firmware.
pub mod dispenser_types {
    use super::DispenserTypeId;

    pub const OPTIC: DispenserTypeId = 1;
    pub const MIXER: DispenserTypeId = 2;
    pub const DASHER: DispenserTypeId = 3;
    pub const SYRINGE: DispenserTypeId = 4;
    pub const CONVEYOR: DispenserTypeId = 5;
    pub const STIRRER: DispenserTypeId = 6;
    pub const SLICE: DispenserTypeId = 7;
    pub const UMBRELLA: DispenserTypeId = 8;
}

/// How a recipe quantity translates into dispense commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispenseMode {
    /// Quantity scales a duration; one command per ingredient.
    TimeBased,
    /// Quantity is a number of discrete pulses; one command per unit.
    CountBased,
}

impl DispenseMode {
    pub fn for_type(type_id: DispenserTypeId) -> Self {
        match type_id {
            dispenser_types::MIXER | dispenser_types::SYRINGE => DispenseMode::TimeBased,
            _ => DispenseMode::CountBased,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenserType {
    pub id: DispenserTypeId,
    pub name: String,
    /// Device units per recipe unit.
    #[serde(default = "default_unit_size")]
    pub unit_size: u32,
    /// Manual types are handled by the bartender, never by the rig.
    #[serde(default)]
    pub manual: bool,
}

fn default_unit_size() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub dispenser_type_id: DispenserTypeId,
    /// Calibration value passed to the dispenser (pulse size or ms per unit).
    #[serde(default)]
    pub dispenser_param: u32,
    #[serde(default)]
    pub alcoholic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispenser {
    pub id: DispenserId,
    pub name: String,
    pub dispenser_type_id: DispenserTypeId,
    pub rail_position: i32,
    /// Ingredient currently loaded, if any.
    #[serde(default)]
    pub ingredient_id: Option<IngredientId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub ingredient_id: IngredientId,
    pub seq: u32,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    #[serde(default)]
    pub glass_type_id: Option<u32>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
}

impl Recipe {
    /// Ingredients in their explicit sequence order.
    pub fn ordered_ingredients(&self) -> Vec<&RecipeIngredient> {
        let mut ordered: Vec<_> = self.ingredients.iter().collect();
        ordered.sort_by_key(|ri| ri.seq);
        ordered
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub recipe_id: RecipeId,
}

/// One required ingredient of an order, joined with the dispensing data the
/// compiler needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIngredient {
    pub ingredient_id: IngredientId,
    pub qty: u32,
    pub dispenser_param: u32,
    pub dispenser_type_id: DispenserTypeId,
    pub unit_size: u32,
    pub manual: bool,
}

impl OrderIngredient {
    pub fn mode(&self) -> DispenseMode {
        DispenseMode::for_type(self.dispenser_type_id)
    }
}

/// Where an ingredient can currently be dispensed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenserSlot {
    pub rail_position: i32,
    pub dispenser_id: DispenserId,
}
