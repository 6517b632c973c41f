pub mod manager;

pub use manager::{BarManager, OrderDispatch};

use crate::catalog::{CatalogError, IngredientId, OrderId};
use crate::compiler::CompileError;
use crate::serial::SerialError;

#[derive(Debug, thiserror::Error)]
pub enum BarError {
    #[error("Missing ingredient(s): order {order_id:05} needs ingredient {ingredient_id}")]
    MissingIngredient {
        order_id: OrderId,
        ingredient_id: IngredientId,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Hardware link error: {0}")]
    Link(#[from] SerialError),
}

impl From<CompileError> for BarError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::MissingIngredientMapping { order_id, ingredient_id } => {
                BarError::MissingIngredient { order_id, ingredient_id }
            }
            CompileError::Catalog(e) => BarError::Catalog(e),
        }
    }
}

impl BarError {
    /// The order can never be made with the current dispenser setup.
    pub fn is_unfulfillable(&self) -> bool {
        matches!(self, BarError::MissingIngredient { .. })
    }
}

pub type Result<T> = std::result::Result<T, BarError>;
