use filemart_types::Amount;
use serde::{Deserialize, Serialize};

/// Limits applied by the marketplace core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Upper bound on files a single owner may register. Keeps `display`
    /// and `list_all_files` bounded.
    pub max_files_per_owner: usize,
    pub max_locator_len: usize,
    pub max_name_len: usize,
    /// Smallest accepted bid. Zero bids are rejected regardless.
    pub min_bid: Amount,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_files_per_owner: 10_000,
            max_locator_len: 2048,
            max_name_len: 256,
            min_bid: Amount::new(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: MarketConfig = serde_json::from_str(r#"{"max_name_len": 16}"#).unwrap();
        assert_eq!(cfg.max_name_len, 16);
        assert_eq!(cfg.max_files_per_owner, 10_000);
        assert_eq!(cfg.min_bid, Amount::new(1));
    }
}
