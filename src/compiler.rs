//! Translation of drink orders into rig command batches.
//!
//! Compilation is synchronous and all-or-nothing: either every required
//! ingredient resolves to a loaded dispenser and a full batch comes back, or
//! the order fails and nothing is produced.
use crate::catalog::{
    Catalog, CatalogError, DispenseMode, DispenserId, IngredientId, OrderId, OrderIngredient,
};
use crate::serial::protocol::{Command, CommandBatch, HOME_POSITION};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Order {order_id:05} needs ingredient {ingredient_id}, which is not loaded in any dispenser")]
    MissingIngredientMapping {
        order_id: OrderId,
        ingredient_id: IngredientId,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, CompileError>;

pub struct OrderCompiler<C> {
    catalog: C,
    home_position: i32,
}

impl<C: Catalog> OrderCompiler<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            home_position: HOME_POSITION,
        }
    }

    pub fn with_home_position(mut self, home_position: i32) -> Self {
        self.home_position = home_position;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Build the command batch for `order_id`:
    /// `C`, then `M <rail>` plus dispense commands per ingredient in recipe
    /// order, then `M <home>` and `G`.
    pub fn compile(&self, order_id: OrderId) -> Result<CommandBatch> {
        let ingredients = self.catalog.order_ingredients(order_id)?;
        log::info!("Compiling order {:05} ({} ingredients)", order_id, ingredients.len());

        let mut commands = vec![Command::Clear];

        for ingredient in &ingredients {
            if ingredient.manual {
                log::debug!("Skipping manual ingredient {}", ingredient.ingredient_id);
                continue;
            }

            let slot = self
                .catalog
                .current_dispenser(ingredient.ingredient_id)?
                .ok_or_else(|| {
                    log::warn!(
                        "Order {:05}: ingredient {} is not loaded in any dispenser",
                        order_id,
                        ingredient.ingredient_id
                    );
                    CompileError::MissingIngredientMapping {
                        order_id,
                        ingredient_id: ingredient.ingredient_id,
                    }
                })?;
            log::debug!(
                "Ingredient {} is on dispenser {} at rail position {}",
                ingredient.ingredient_id,
                slot.dispenser_id,
                slot.rail_position
            );

            commands.push(Command::Move { position: slot.rail_position });
            push_dispense(&mut commands, slot.dispenser_id, ingredient);
        }

        commands.push(Command::Move { position: self.home_position });
        commands.push(Command::Go);

        Ok(CommandBatch::for_order(order_id, commands))
    }

    /// Whether the order needs an age check before it is served.
    pub fn requires_id_check(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.catalog.order_contains_alcohol(order_id)?)
    }
}

fn push_dispense(commands: &mut Vec<Command>, dispenser: DispenserId, ingredient: &OrderIngredient) {
    match ingredient.mode() {
        DispenseMode::TimeBased => commands.push(Command::Dispense {
            dispenser,
            param: u64::from(ingredient.qty) * u64::from(ingredient.dispenser_param),
        }),
        DispenseMode::CountBased => {
            let pulse = Command::Dispense {
                dispenser,
                param: u64::from(ingredient.dispenser_param),
            };
            commands.extend(std::iter::repeat(pulse).take(ingredient.qty as usize));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{dispenser_types, DispenserSlot, IngredientId};
    use std::collections::HashMap;

    /// Fixed answers for the compiler's three catalog questions.
    #[derive(Default)]
    struct FixedCatalog {
        ingredients: Vec<OrderIngredient>,
        slots: HashMap<IngredientId, DispenserSlot>,
        alcoholic: bool,
    }

    impl FixedCatalog {
        fn with(mut self, id: IngredientId, type_id: u32, qty: u32, param: u32, slot: Option<(i32, u32)>) -> Self {
            self.ingredients.push(OrderIngredient {
                ingredient_id: id,
                qty,
                dispenser_param: param,
                dispenser_type_id: type_id,
                unit_size: 1,
                manual: false,
            });
            if let Some((rail_position, dispenser_id)) = slot {
                self.slots.insert(id, DispenserSlot { rail_position, dispenser_id });
            }
            self
        }
    }

    impl Catalog for FixedCatalog {
        fn order_ingredients(&self, order_id: OrderId) -> crate::catalog::Result<Vec<OrderIngredient>> {
            if order_id == 404 {
                return Err(CatalogError::UnknownOrder(order_id));
            }
            Ok(self.ingredients.clone())
        }

        fn current_dispenser(&self, ingredient_id: IngredientId) -> crate::catalog::Result<Option<DispenserSlot>> {
            Ok(self.slots.get(&ingredient_id).copied())
        }

        fn order_contains_alcohol(&self, _order_id: OrderId) -> crate::catalog::Result<bool> {
            Ok(self.alcoholic)
        }
    }

    const GIN: IngredientId = 10;
    const TONIC: IngredientId = 20;

    fn gin_and_tonic() -> FixedCatalog {
        FixedCatalog::default()
            .with(GIN, dispenser_types::OPTIC, 2, 100, Some((5, 3)))
            .with(TONIC, dispenser_types::MIXER, 1, 3000, Some((9, 7)))
    }

    #[test]
    fn compiles_gin_and_tonic() {
        let batch = OrderCompiler::new(gin_and_tonic()).compile(1).unwrap();
        assert_eq!(batch.lines(), vec!["C", "M 5", "D 3 100", "D 3 100", "M 9", "D 7 3000", "M 0", "G"]);
        assert_eq!(batch.kind(), crate::serial::BatchKind::Order(1));
    }

    #[test]
    fn time_based_quantity_scales_duration() {
        let catalog = FixedCatalog::default().with(1, dispenser_types::SYRINGE, 3, 250, Some((2, 4)));
        let batch = OrderCompiler::new(catalog).compile(1).unwrap();
        assert_eq!(batch.lines(), vec!["C", "M 2", "D 4 750", "M 0", "G"]);
    }

    #[test]
    fn zero_quantity_still_moves() {
        let catalog = FixedCatalog::default().with(1, dispenser_types::DASHER, 0, 80, Some((12, 6)));
        let batch = OrderCompiler::new(catalog).compile(1).unwrap();
        assert_eq!(batch.lines(), vec!["C", "M 12", "M 0", "G"]);
    }

    #[test]
    fn missing_dispenser_fails_whole_order() {
        let catalog = gin_and_tonic().with(30, dispenser_types::OPTIC, 1, 100, None);
        let err = OrderCompiler::new(catalog).compile(8).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MissingIngredientMapping { order_id: 8, ingredient_id: 30 }
        ));
    }

    #[test]
    fn output_mirrors_catalog_order() {
        let reversed = FixedCatalog::default()
            .with(TONIC, dispenser_types::MIXER, 1, 3000, Some((9, 7)))
            .with(GIN, dispenser_types::OPTIC, 2, 100, Some((5, 3)));
        let batch = OrderCompiler::new(reversed).compile(1).unwrap();
        assert_eq!(batch.lines(), vec!["C", "M 9", "D 7 3000", "M 5", "D 3 100", "D 3 100", "M 0", "G"]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let compiler = OrderCompiler::new(gin_and_tonic());
        let first = compiler.compile(1).unwrap();
        let second = compiler.compile(1).unwrap();
        assert_eq!(first.commands(), second.commands());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn manual_entries_are_skipped() {
        let mut catalog = gin_and_tonic();
        catalog.ingredients.push(OrderIngredient {
            ingredient_id: 99,
            qty: 1,
            dispenser_param: 0,
            dispenser_type_id: 9,
            unit_size: 1,
            manual: true,
        });
        let batch = OrderCompiler::new(catalog).compile(1).unwrap();
        assert_eq!(batch.len(), 8);
    }

    #[test]
    fn empty_recipe_still_homes_and_executes() {
        let batch = OrderCompiler::new(FixedCatalog::default()).with_home_position(3).compile(1).unwrap();
        assert_eq!(batch.lines(), vec!["C", "M 3", "G"]);
    }

    #[test]
    fn catalog_failures_propagate() {
        let err = OrderCompiler::new(gin_and_tonic()).compile(404).unwrap_err();
        assert!(matches!(err, CompileError::Catalog(CatalogError::UnknownOrder(404))));
    }

    #[test]
    fn id_check_follows_alcohol_content() {
        let mut catalog = gin_and_tonic();
        catalog.alcoholic = true;
        assert!(OrderCompiler::new(catalog).requires_id_check(1).unwrap());
        assert!(!OrderCompiler::new(gin_and_tonic()).requires_id_check(1).unwrap());
    }
}
