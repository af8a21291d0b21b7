use core::time::Duration;
pub use match_common::config::Game;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub url: String,
    pub access_token: String,
    pub require_https: bool,
    pub timeout_secs: u64,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            url: "https://localhost:8443".to_string(),
            access_token: String::new(),
            require_https: true,
            timeout_secs: 10,
        }
    }
}

impl Store {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn access_token(&self) -> Option<&str> {
        if self.access_token.is_empty() {
            None
        } else {
            Some(&self.access_token)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub game: Game,
    pub store: Store,
    /// Keep everything in memory instead of talking to the store
    pub offline: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ser_store() {
        let s: Store = Default::default();
        let serialized = toml::to_string(&s).unwrap();
        let deser = toml::from_str(&serialized);
        assert_eq!(deser, Ok(s));
    }

    #[test]
    fn test_ser_config() {
        let config: Config = Default::default();
        let serialized = toml::to_string(&config).unwrap();
        let deser = toml::from_str(&serialized);
        assert_eq!(deser, Ok(config));
    }

    #[test]
    fn test_empty_token_is_none() {
        let mut s = Store::default();
        assert_eq!(s.access_token(), None);
        s.access_token = "abc".to_string();
        assert_eq!(s.access_token(), Some("abc"));
        assert_eq!(s.timeout(), Duration::from_secs(10));
    }
}
