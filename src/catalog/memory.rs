use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use super::models::*;
use super::{Catalog, CatalogError, Result};

/// Serialized form of a catalog, as stored in a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub dispenser_types: Vec<DispenserType>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub dispensers: Vec<Dispenser>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

#[derive(Debug, Default)]
struct Inner {
    dispenser_types: HashMap<DispenserTypeId, DispenserType>,
    ingredients: HashMap<IngredientId, Ingredient>,
    dispensers: BTreeMap<DispenserId, Dispenser>,
    recipes: HashMap<RecipeId, Recipe>,
    orders: BTreeMap<OrderId, Order>,
}

/// Catalog held in memory, keyed by identifier.
///
/// Dispensers live in an ordered map, so an ingredient loaded into several
/// dispensers resolves to the one with the lowest id.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: RwLock<Inner>,
}

impl MemoryCatalog {
    pub fn new(data: CatalogData) -> Result<Self> {
        let inner = Inner {
            dispenser_types: data.dispenser_types.into_iter().map(|t| (t.id, t)).collect(),
            ingredients: data.ingredients.into_iter().map(|i| (i.id, i)).collect(),
            dispensers: data.dispensers.into_iter().map(|d| (d.id, d)).collect(),
            recipes: data.recipes.into_iter().map(|r| (r.id, r)).collect(),
            orders: data.orders.into_iter().map(|o| (o.id, o)).collect(),
        };
        inner.validate()?;

        log::debug!(
            "Catalog loaded: {} ingredients, {} dispensers, {} recipes, {} orders",
            inner.ingredients.len(),
            inner.dispensers.len(),
            inner.recipes.len(),
            inner.orders.len()
        );
        Ok(Self { inner: RwLock::new(inner) })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        log::info!("Loaded catalog from {}", path.display());
        Ok(catalog)
    }

    /// Write the current state back as JSON, so placed orders and dispenser
    /// assignments outlive the process.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot()?)?;
        std::fs::write(path, json)?;
        log::debug!("Saved catalog to {}", path.display());
        Ok(())
    }

    pub fn snapshot(&self) -> Result<CatalogData> {
        let inner = self.read()?;
        let mut ingredients: Vec<_> = inner.ingredients.values().cloned().collect();
        ingredients.sort_by_key(|i| i.id);
        let mut dispenser_types: Vec<_> = inner.dispenser_types.values().cloned().collect();
        dispenser_types.sort_by_key(|t| t.id);
        let mut recipes: Vec<_> = inner.recipes.values().cloned().collect();
        recipes.sort_by_key(|r| r.id);

        Ok(CatalogData {
            dispenser_types,
            ingredients,
            dispensers: inner.dispensers.values().cloned().collect(),
            recipes,
            orders: inner.orders.values().cloned().collect(),
        })
    }

    pub fn recipe(&self, recipe_id: RecipeId) -> Result<Recipe> {
        let inner = self.read()?;
        inner.recipes.get(&recipe_id).cloned().ok_or(CatalogError::UnknownRecipe(recipe_id))
    }

    pub fn order(&self, order_id: OrderId) -> Result<Order> {
        let inner = self.read()?;
        inner.orders.get(&order_id).cloned().ok_or(CatalogError::UnknownOrder(order_id))
    }

    pub fn ingredient(&self, ingredient_id: IngredientId) -> Result<Ingredient> {
        let inner = self.read()?;
        inner
            .ingredients
            .get(&ingredient_id)
            .cloned()
            .ok_or(CatalogError::UnknownIngredient(ingredient_id))
    }

    pub fn dispensers(&self) -> Result<Vec<Dispenser>> {
        Ok(self.read()?.dispensers.values().cloned().collect())
    }

    /// Load `ingredient_id` into a dispenser, or empty it with `None`. The
    /// ingredient must be of the dispenser's type.
    pub fn assign_dispenser(
        &self,
        dispenser_id: DispenserId,
        ingredient_id: Option<IngredientId>,
    ) -> Result<()> {
        let mut inner = self.write()?;

        if let Some(ingredient_id) = ingredient_id {
            let ingredient = inner
                .ingredients
                .get(&ingredient_id)
                .ok_or(CatalogError::UnknownIngredient(ingredient_id))?;
            let dispenser = inner
                .dispensers
                .get(&dispenser_id)
                .ok_or(CatalogError::UnknownDispenser(dispenser_id))?;
            if ingredient.dispenser_type_id != dispenser.dispenser_type_id {
                return Err(CatalogError::DispenserTypeMismatch { dispenser_id, ingredient_id });
            }
        }

        let dispenser = inner
            .dispensers
            .get_mut(&dispenser_id)
            .ok_or(CatalogError::UnknownDispenser(dispenser_id))?;
        dispenser.ingredient_id = ingredient_id;
        log::info!("Dispenser {} now holds {:?}", dispenser_id, ingredient_id);
        Ok(())
    }

    /// Recipes that can be made right now: every machine-dispensed ingredient
    /// is loaded somewhere. Sorted by name.
    pub fn available_recipes(&self) -> Result<Vec<Recipe>> {
        let inner = self.read()?;
        let mut available = Vec::new();

        for recipe in inner.recipes.values() {
            let mut makeable = true;
            for ri in &recipe.ingredients {
                if inner.is_manual(ri.ingredient_id)? {
                    continue;
                }
                if inner.slot_for(ri.ingredient_id).is_none() {
                    makeable = false;
                    break;
                }
            }
            if makeable {
                available.push(recipe.clone());
            }
        }

        available.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(available)
    }

    /// Record a new order for `recipe_id` with the next free order id.
    pub fn place_order(&self, recipe_id: RecipeId) -> Result<Order> {
        let mut inner = self.write()?;
        if !inner.recipes.contains_key(&recipe_id) {
            return Err(CatalogError::UnknownRecipe(recipe_id));
        }

        let id = match inner.orders.keys().next_back() {
            None => 1,
            Some(last) => last.checked_add(1).ok_or(CatalogError::OrderIdsExhausted)?,
        };
        let order = Order { id, recipe_id };
        inner.orders.insert(id, order.clone());
        log::info!("Order {:05} placed for recipe {}", id, recipe_id);
        Ok(order)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".into()))
    }
}

impl Inner {
    fn validate(&self) -> Result<()> {
        for ingredient in self.ingredients.values() {
            self.dispenser_type(ingredient.dispenser_type_id)?;
        }
        for dispenser in self.dispensers.values() {
            self.dispenser_type(dispenser.dispenser_type_id)?;
            if let Some(ingredient_id) = dispenser.ingredient_id {
                if !self.ingredients.contains_key(&ingredient_id) {
                    return Err(CatalogError::UnknownIngredient(ingredient_id));
                }
            }
        }
        for recipe in self.recipes.values() {
            for ri in &recipe.ingredients {
                if !self.ingredients.contains_key(&ri.ingredient_id) {
                    return Err(CatalogError::UnknownIngredient(ri.ingredient_id));
                }
            }
        }
        for order in self.orders.values() {
            if !self.recipes.contains_key(&order.recipe_id) {
                return Err(CatalogError::UnknownRecipe(order.recipe_id));
            }
        }
        Ok(())
    }

    fn dispenser_type(&self, type_id: DispenserTypeId) -> Result<&DispenserType> {
        self.dispenser_types
            .get(&type_id)
            .ok_or(CatalogError::UnknownDispenserType(type_id))
    }

    fn is_manual(&self, ingredient_id: IngredientId) -> Result<bool> {
        let ingredient = self
            .ingredients
            .get(&ingredient_id)
            .ok_or(CatalogError::UnknownIngredient(ingredient_id))?;
        Ok(self.dispenser_type(ingredient.dispenser_type_id)?.manual)
    }

    fn slot_for(&self, ingredient_id: IngredientId) -> Option<DispenserSlot> {
        self.dispensers
            .values()
            .find(|d| d.ingredient_id == Some(ingredient_id))
            .map(|d| DispenserSlot {
                rail_position: d.rail_position,
                dispenser_id: d.id,
            })
    }

    fn order_recipe(&self, order_id: OrderId) -> Result<&Recipe> {
        let order = self.orders.get(&order_id).ok_or(CatalogError::UnknownOrder(order_id))?;
        self.recipes
            .get(&order.recipe_id)
            .ok_or(CatalogError::UnknownRecipe(order.recipe_id))
    }
}

impl Catalog for MemoryCatalog {
    fn order_ingredients(&self, order_id: OrderId) -> Result<Vec<OrderIngredient>> {
        let inner = self.read()?;
        let recipe = inner.order_recipe(order_id)?;

        let mut required = Vec::with_capacity(recipe.ingredients.len());
        for ri in recipe.ordered_ingredients() {
            let ingredient = inner
                .ingredients
                .get(&ri.ingredient_id)
                .ok_or(CatalogError::UnknownIngredient(ri.ingredient_id))?;
            let dispenser_type = inner.dispenser_type(ingredient.dispenser_type_id)?;
            if dispenser_type.manual {
                continue;
            }
            required.push(OrderIngredient {
                ingredient_id: ingredient.id,
                qty: ri.qty,
                dispenser_param: ingredient.dispenser_param,
                dispenser_type_id: dispenser_type.id,
                unit_size: dispenser_type.unit_size,
                manual: false,
            });
        }
        Ok(required)
    }

    fn current_dispenser(&self, ingredient_id: IngredientId) -> Result<Option<DispenserSlot>> {
        Ok(self.read()?.slot_for(ingredient_id))
    }

    fn order_contains_alcohol(&self, order_id: OrderId) -> Result<bool> {
        let inner = self.read()?;
        let recipe = inner.order_recipe(order_id)?;
        Ok(recipe.ingredients.iter().any(|ri| {
            inner
                .ingredients
                .get(&ri.ingredient_id)
                .is_some_and(|i| i.alcoholic)
        }))
    }
}
