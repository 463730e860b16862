use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// Catalog category of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    #[serde(rename = "Produce")]
    Produce,
    #[serde(rename = "Dairy")]
    Dairy,
    #[serde(rename = "Meat & Seafood")]
    MeatSeafood,
    #[serde(rename = "Dry Goods")]
    DryGoods,
    #[serde(rename = "Canned Goods")]
    CannedGoods,
    #[serde(rename = "Beverages")]
    Beverages,
    #[serde(rename = "Frozen Foods")]
    FrozenFoods,
    #[serde(rename = "Other")]
    Other,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 8] = [
        ItemCategory::Produce,
        ItemCategory::Dairy,
        ItemCategory::MeatSeafood,
        ItemCategory::DryGoods,
        ItemCategory::CannedGoods,
        ItemCategory::Beverages,
        ItemCategory::FrozenFoods,
        ItemCategory::Other,
    ];

    /// Returns the display name, which is also the stored and wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Produce => "Produce",
            ItemCategory::Dairy => "Dairy",
            ItemCategory::MeatSeafood => "Meat & Seafood",
            ItemCategory::DryGoods => "Dry Goods",
            ItemCategory::CannedGoods => "Canned Goods",
            ItemCategory::Beverages => "Beverages",
            ItemCategory::FrozenFoods => "Frozen Foods",
            ItemCategory::Other => "Other",
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("item category", s))
    }
}
