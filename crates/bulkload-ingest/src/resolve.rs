//! Natural-key reference resolution
//!
//! Order rows point at customers and products by business code, and
//! products point at categories the same way. The resolver memoizes
//! code → id lookups for the duration of one ingestion run, negative
//! results included, so a code repeated across thousands of rows costs
//! one query. Resolvers are created per job and dropped with it; the
//! cache never outlives the run.

use async_trait::async_trait;
use std::collections::HashMap;

/// Entities that can be referenced by natural code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefEntity {
    Customer,
    Product,
    Category,
}

/// Backend lookup of a surrogate id by natural code
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn find_id_by_code(
        &self,
        entity: RefEntity,
        code: &str,
    ) -> Result<Option<i64>, sqlx::Error>;
}

pub struct ReferenceResolver<'a> {
    lookup: &'a dyn ReferenceLookup,
    cache: HashMap<(RefEntity, String), Option<i64>>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(lookup: &'a dyn ReferenceLookup) -> Self {
        Self {
            lookup,
            cache: HashMap::new(),
        }
    }

    pub async fn customer_id(&mut self, code: &str) -> Result<Option<i64>, sqlx::Error> {
        self.resolve(RefEntity::Customer, code.trim().to_owned()).await
    }

    pub async fn product_id(&mut self, code: &str) -> Result<Option<i64>, sqlx::Error> {
        self.resolve(RefEntity::Product, code.trim().to_owned()).await
    }

    /// Category codes are case-insensitive, normalized to uppercase
    pub async fn category_id(&mut self, code: &str) -> Result<Option<i64>, sqlx::Error> {
        self.resolve(RefEntity::Category, code.trim().to_uppercase()).await
    }

    async fn resolve(
        &mut self,
        entity: RefEntity,
        code: String,
    ) -> Result<Option<i64>, sqlx::Error> {
        if let Some(cached) = self.cache.get(&(entity, code.clone())) {
            return Ok(*cached);
        }
        let found = self.lookup.find_id_by_code(entity, &code).await?;
        self.cache.insert((entity, code), found);
        Ok(found)
    }
}
