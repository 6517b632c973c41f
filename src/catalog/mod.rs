pub mod memory;
pub mod models;

pub use memory::MemoryCatalog;
pub use models::*;

use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Order {0:05} not found")]
    UnknownOrder(OrderId),

    #[error("Recipe {0} not found")]
    UnknownRecipe(RecipeId),

    #[error("Ingredient {0} not found")]
    UnknownIngredient(IngredientId),

    #[error("Dispenser {0} not found")]
    UnknownDispenser(DispenserId),

    #[error("Dispenser type {0} not found")]
    UnknownDispenserType(DispenserTypeId),

    #[error("Ingredient {ingredient_id} cannot be loaded into dispenser {dispenser_id} (type mismatch)")]
    DispenserTypeMismatch {
        dispenser_id: DispenserId,
        ingredient_id: IngredientId,
    },

    #[error("No order ids left to assign")]
    OrderIdsExhausted,

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Read-only view of the drinks catalog used to compile orders.
///
/// Implementations answer from a point-in-time snapshot; nothing ties a
/// lookup to a later transmission.
pub trait Catalog: Send + Sync {
    /// Required machine-dispensed ingredients of an order, in recipe
    /// sequence order. Manual ingredients are left out.
    fn order_ingredients(&self, order_id: OrderId) -> Result<Vec<OrderIngredient>>;

    /// The dispenser currently loaded with `ingredient_id`, if any.
    fn current_dispenser(&self, ingredient_id: IngredientId) -> Result<Option<DispenserSlot>>;

    fn order_contains_alcohol(&self, order_id: OrderId) -> Result<bool>;
}

impl<T: Catalog + ?Sized> Catalog for Arc<T> {
    fn order_ingredients(&self, order_id: OrderId) -> Result<Vec<OrderIngredient>> {
        (**self).order_ingredients(order_id)
    }

    fn current_dispenser(&self, ingredient_id: IngredientId) -> Result<Option<DispenserSlot>> {
        (**self).current_dispenser(ingredient_id)
    }

    fn order_contains_alcohol(&self, order_id: OrderId) -> Result<bool> {
        (**self).order_contains_alcohol(order_id)
    }
}

impl<T: Catalog + ?Sized> Catalog for &T {
    fn order_ingredients(&self, order_id: OrderId) -> Result<Vec<OrderIngredient>> {
        (**self).order_ingredients(order_id)
    }

    fn current_dispenser(&self, ingredient_id: IngredientId) -> Result<Option<DispenserSlot>> {
        (**self).current_dispenser(ingredient_id)
    }

    fn order_contains_alcohol(&self, order_id: OrderId) -> Result<bool> {
        (**self).order_contains_alcohol(order_id)
    }
}
