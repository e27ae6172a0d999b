use std::path::PathBuf;

use sampler_core::SizeRange;

use crate::error::HarvestError;
use crate::provider::SearchQuery;

/// Only files up to this size are searchable via the provider's code
/// search index.
pub const MAX_SEARCHABLE_FILE_SIZE: u64 = 393_216;

/// Configuration surface consumed by the harvest core.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Search query terms, without size qualifiers.
    pub query: String,
    pub min_size: u64,
    pub max_size: u64,
    /// Width of the initial size strata.
    pub stratum_size: u64,
    /// Maximum number of results a single query can exhaustively return
    /// via pagination. Provider policy, injected here.
    pub ceiling: u64,
    pub include_forks: bool,
    pub throttle: bool,
    pub per_page: u32,
    pub checkpoint_path: PathBuf,
    pub database_path: PathBuf,
}

impl HarvestConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            min_size: 1,
            max_size: MAX_SEARCHABLE_FILE_SIZE,
            stratum_size: 1,
            ceiling: 1000,
            include_forks: false,
            throttle: true,
            per_page: 100,
            checkpoint_path: PathBuf::from("sampling.jsonl"),
            database_path: PathBuf::from("results.db"),
        }
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.query.trim().is_empty() {
            return Err(HarvestError::InvalidConfig("query must not be empty".into()));
        }
        if self.min_size < 1 {
            return Err(HarvestError::InvalidConfig("min-size must be positive".into()));
        }
        if self.min_size > self.max_size {
            return Err(HarvestError::InvalidConfig(
                "min-size must be less than or equal to max-size".into(),
            ));
        }
        if self.max_size > MAX_SEARCHABLE_FILE_SIZE {
            return Err(HarvestError::InvalidConfig(format!(
                "max-size must be less than or equal to {MAX_SEARCHABLE_FILE_SIZE}"
            )));
        }
        if self.stratum_size < 1 {
            return Err(HarvestError::InvalidConfig(
                "stratum-size must be positive".into(),
            ));
        }
        if self.ceiling < 1 {
            return Err(HarvestError::InvalidConfig("ceiling must be positive".into()));
        }
        if self.per_page < 1 {
            return Err(HarvestError::InvalidConfig("per-page must be positive".into()));
        }
        Ok(())
    }

    pub fn bounds(&self) -> SizeRange {
        SizeRange::new(self.min_size, self.max_size)
    }

    pub fn search_query(&self) -> SearchQuery {
        SearchQuery {
            terms: self.query.clone(),
            include_forks: self.include_forks,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_cover_searchable_sizes() {
        let config = HarvestConfig::new("language:solidity");
        config.validate().unwrap();
        assert_eq!(config.bounds(), SizeRange::new(1, MAX_SEARCHABLE_FILE_SIZE));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let mut config = HarvestConfig::new("q");
        config.min_size = 10;
        config.max_size = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_max() {
        let mut config = HarvestConfig::new("q");
        config.max_size = MAX_SEARCHABLE_FILE_SIZE + 1;
        assert!(config.validate().is_err());
    }
}
