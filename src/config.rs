use std::collections::HashMap;
use thiserror::Error;

/// An asset admitted for trading, with its native decimal scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSpec {
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub rate_api_url: String,
    /// Protocol fee on released custody, in basis points.
    pub fee_bps: u32,
    /// Window for the offer owner to accept and the seller to fund.
    pub accept_window_secs: i64,
    /// Window for the buyer to mark a funded deal paid.
    pub payment_window_secs: i64,
    /// Liveness window an assertion must survive unchallenged.
    pub assertion_liveness_secs: i64,
    /// Minimum collateral bonded behind an assertion.
    pub assertion_bond_min: u128,
    /// Long-term stewards exempt from the bond threshold.
    pub stewards: Vec<String>,
    pub assets: Vec<AssetSpec>,
    pub fiats: Vec<String>,
    pub methods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16)?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let rate_api_url = env_map
            .get("RATE_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("RATE_API_URL".to_string()))?;

        let fee_bps = parse_or(&env_map, "FEE_BPS", 100u32)?;
        if fee_bps > 1_000 {
            return Err(ConfigError::InvalidValue(
                "FEE_BPS".to_string(),
                "must not exceed 1000 (10%)".to_string(),
            ));
        }

        let accept_window_secs = parse_or(&env_map, "ACCEPT_WINDOW_SECS", 86_400i64)?;
        let payment_window_secs = parse_or(&env_map, "PAYMENT_WINDOW_SECS", 86_400i64)?;
        let assertion_liveness_secs = parse_or(&env_map, "ASSERTION_LIVENESS_SECS", 7_200i64)?;
        for (key, value) in [
            ("ACCEPT_WINDOW_SECS", accept_window_secs),
            ("PAYMENT_WINDOW_SECS", payment_window_secs),
            ("ASSERTION_LIVENESS_SECS", assertion_liveness_secs),
        ] {
            if value <= 0 {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    "must be positive".to_string(),
                ));
            }
        }

        let assertion_bond_min = parse_or(&env_map, "ASSERTION_BOND_MIN", 100_000_000u128)?;

        let stewards = parse_list(&env_map, "STEWARDS", "");
        let fiats = parse_list(&env_map, "FIATS", "USD,EUR,GBP");
        let methods = parse_list(&env_map, "METHODS", "bank_transfer,cash_deposit,mobile_money");
        let assets = parse_assets(
            env_map
                .get("ASSETS")
                .map(|s| s.as_str())
                .unwrap_or("BTC:8,ETH:18,USDC:6"),
        )?;

        Ok(Config {
            port,
            database_path,
            rate_api_url,
            fee_bps,
            accept_window_secs,
            payment_window_secs,
            assertion_liveness_secs,
            assertion_bond_min,
            stewards,
            assets,
            fiats,
            methods,
        })
    }

    pub fn asset_decimals(&self, symbol: &str) -> Option<u8> {
        self.assets
            .iter()
            .find(|a| a.symbol == symbol)
            .map(|a| a.decimals)
    }
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(
                key.to_string(),
                format!("could not parse {:?}", raw),
            )
        }),
    }
}

fn parse_list(env_map: &HashMap<String, String>, key: &str, default: &str) -> Vec<String> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `"BTC:8,ETH:18"` into asset specs.
fn parse_assets(raw: &str) -> Result<Vec<AssetSpec>, ConfigError> {
    let mut assets = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (symbol, decimals) = entry.split_once(':').ok_or_else(|| {
            ConfigError::InvalidValue(
                "ASSETS".to_string(),
                format!("expected SYMBOL:DECIMALS, got {:?}", entry),
            )
        })?;
        let decimals = decimals.trim().parse::<u8>().map_err(|_| {
            ConfigError::InvalidValue(
                "ASSETS".to_string(),
                format!("invalid decimals in {:?}", entry),
            )
        })?;
        assets.push(AssetSpec {
            symbol: symbol.trim().to_string(),
            decimals,
        });
    }
    if assets.is_empty() {
        return Err(ConfigError::InvalidValue(
            "ASSETS".to_string(),
            "at least one asset is required".to_string(),
        ));
    }
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "RATE_API_URL".to_string(),
            "https://rates.example.test".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.fee_bps, 100);
        assert_eq!(config.accept_window_secs, 86_400);
        assert_eq!(config.assertion_liveness_secs, 7_200);
        assert_eq!(config.asset_decimals("BTC"), Some(8));
        assert_eq!(config.asset_decimals("DOGE"), None);
        assert!(config.fiats.contains(&"USD".to_string()));
        assert!(config.stewards.is_empty());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_rate_api_url() {
        let mut env_map = setup_required_env();
        env_map.remove("RATE_API_URL");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "RATE_API_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_fee_cap() {
        let mut env_map = setup_required_env();
        env_map.insert("FEE_BPS".to_string(), "2000".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FEE_BPS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_asset_spec() {
        let mut env_map = setup_required_env();
        env_map.insert("ASSETS".to_string(), "BTC".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "ASSETS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_nonpositive_window_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("PAYMENT_WINDOW_SECS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PAYMENT_WINDOW_SECS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_steward_list_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("STEWARDS".to_string(), "alice, bob,".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.stewards, vec!["alice".to_string(), "bob".to_string()]);
    }
}
