use crate::types::{DataAccessError, Result, NO_CATEGORY};
use std::collections::HashMap;

/// Categories the pipeline understands.
pub const SUPPORTED_AGGREGATION_CATEGORIES: &[&str] = &[
    "business",
    "entertainment",
    "health",
    "politics",
    "products",
    "science-and-technology",
    "sports",
    "us",
    "world",
    "world_africa",
    "world_americas",
    "world_asia",
    "world_europe",
    "world_middleeast",
];

/// Maps an aggregator's native category names onto the supported internal
/// set. Unmapped categories fall back to [`NO_CATEGORY`].
pub struct AggregatorCategoryMapper {
    mapper: HashMap<String, String>,
}

impl AggregatorCategoryMapper {
    /// Build a mapper. Every mapped-to value must be a supported category.
    pub fn new(mapper: HashMap<String, String>) -> Result<Self> {
        for value in mapper.values() {
            if !SUPPORTED_AGGREGATION_CATEGORIES.contains(&value.as_str()) {
                return Err(DataAccessError::Validation(format!(
                    "category mapping target '{value}' is not a supported category"
                )));
            }
        }
        Ok(Self { mapper })
    }

    pub fn category(&self, aggregator_category: &str) -> &str {
        self.mapper
            .get(aggregator_category)
            .map(String::as_str)
            .unwrap_or(NO_CATEGORY)
    }
}
