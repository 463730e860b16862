use chrono::Utc;
use common::{ItemCategory, ItemId, UserId};
use store::{ItemRecord, StockChange};
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_UNIT_LEN: usize = 50;

/// Field-level validation failures for catalog items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Item name must be between 1 and 255 characters")]
    InvalidName,

    #[error("Unit of measure must be between 1 and 50 characters")]
    InvalidUnit,

    #[error("Par level must be greater than 0 (got {0})")]
    InvalidParLevel(i32),

    #[error("Current quantity cannot be negative (got {0})")]
    NegativeQuantity(i32),
}

fn check_name(name: &str) -> Result<(), CatalogError> {
    let len = name.trim().chars().count();
    if len == 0 || name.chars().count() > MAX_NAME_LEN {
        return Err(CatalogError::InvalidName);
    }
    Ok(())
}

fn check_unit(unit: &str) -> Result<(), CatalogError> {
    let len = unit.trim().chars().count();
    if len == 0 || unit.chars().count() > MAX_UNIT_LEN {
        return Err(CatalogError::InvalidUnit);
    }
    Ok(())
}

fn check_par_level(par_level: i32) -> Result<(), CatalogError> {
    if par_level <= 0 {
        return Err(CatalogError::InvalidParLevel(par_level));
    }
    Ok(())
}

fn check_quantity(quantity: i32) -> Result<(), CatalogError> {
    if quantity < 0 {
        return Err(CatalogError::NegativeQuantity(quantity));
    }
    Ok(())
}

/// A new catalog item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub category: ItemCategory,
    pub unit_of_measure: String,
    pub par_level: i32,
    pub current_quantity: i32,
}

impl NewItem {
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_name(&self.name)?;
        check_unit(&self.unit_of_measure)?;
        check_par_level(self.par_level)?;
        check_quantity(self.current_quantity)
    }

    pub(crate) fn into_record(self, created_by: UserId) -> ItemRecord {
        let now = Utc::now();
        ItemRecord {
            id: ItemId::new(),
            name: self.name,
            description: self.description,
            category: self.category,
            unit_of_measure: self.unit_of_measure,
            par_level: self.par_level,
            current_quantity: self.current_quantity,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an item; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ItemCategory>,
    pub unit_of_measure: Option<String>,
    pub par_level: Option<i32>,
    pub current_quantity: Option<i32>,
}

impl ItemChanges {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(unit) = &self.unit_of_measure {
            check_unit(unit)?;
        }
        if let Some(par_level) = self.par_level {
            check_par_level(par_level)?;
        }
        if let Some(quantity) = self.current_quantity {
            check_quantity(quantity)?;
        }
        Ok(())
    }

    /// Applies the descriptive changes and returns the quantity change, which
    /// must go through the store's stock write.
    pub(crate) fn apply_to(self, item: &mut ItemRecord) -> Option<StockChange> {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(description) = self.description {
            item.description = Some(description);
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(unit) = self.unit_of_measure {
            item.unit_of_measure = unit;
        }
        if let Some(par_level) = self.par_level {
            item.par_level = par_level;
        }
        item.updated_at = Utc::now();
        self.current_quantity.map(|quantity| StockChange::Set {
            item_id: item.id,
            quantity,
        })
    }
}
