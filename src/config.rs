use rand::Rng;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG: &str = "movie_explorer=debug,actix_web=info";
const MIN_KEY_LEN: usize = 32;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("MOVIES_SECRET_KEY must be at least 32 bytes, got {0}")]
    ShortKey(usize),
    #[error("{0} is not valid unicode")]
    NotUnicode(&'static str),
    #[error("MOVIES_BCRYPT_COST must be a number between 4 and 31, got {0:?}")]
    BadCost(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    /// `None` runs on a temporary database that disappears on exit.
    pub db_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub secret_key: Vec<u8>,
    /// Whether a random key was generated because none was configured.
    pub ephemeral_key: bool,
    pub secure_cookie: bool,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|name| match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(name)),
        })
    }

    fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&'static str) -> Result<Option<String>, ConfigError>,
    {
        let bind = lookup("MOVIES_BIND")?.unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let db_path = lookup("MOVIES_DB_PATH")?.map(PathBuf::from);
        let catalog_path = lookup("MOVIES_CATALOG")?.map(PathBuf::from);
        let secure_cookie = lookup("MOVIES_SECURE_COOKIE")?
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let bcrypt_cost = match lookup("MOVIES_BCRYPT_COST")? {
            Some(cost) => match cost.parse::<u32>() {
                Ok(n) if n >= 4 && n <= 31 => n,
                _ => return Err(ConfigError::BadCost(cost)),
            },
            None => bcrypt::DEFAULT_COST,
        };
        let (secret_key, ephemeral_key) = match lookup("MOVIES_SECRET_KEY")? {
            Some(key) if key.len() < MIN_KEY_LEN => return Err(ConfigError::ShortKey(key.len())),
            Some(key) => (key.into_bytes(), false),
            None => (rand::thread_rng().gen::<[u8; 32]>().to_vec(), true),
        };
        Ok(Config {
            bind,
            db_path,
            catalog_path,
            secret_key,
            ephemeral_key,
            secure_cookie,
            bcrypt_cost,
        })
    }

    pub fn open_db(&self) -> sled::Result<sled::Db> {
        match &self.db_path {
            Some(path) => sled::Config::new().path(path).open(),
            None => sled::Config::new().temporary(true).open(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(
        vars: &'static [(&'static str, &'static str)],
    ) -> impl Fn(&'static str) -> Result<Option<String>, ConfigError> {
        let vars: HashMap<_, _> = vars.iter().cloned().collect();
        move |name| Ok(vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert!(config.db_path.is_none());
        assert!(config.ephemeral_key);
        assert_eq!(config.secret_key.len(), 32);
        assert!(!config.secure_cookie);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn explicit_values() {
        let config = Config::from_lookup(lookup_in(&[
            ("MOVIES_BIND", "0.0.0.0:9000"),
            ("MOVIES_DB_PATH", "/tmp/movies"),
            ("MOVIES_SECRET_KEY", "0123456789abcdef0123456789abcdef"),
            ("MOVIES_SECURE_COOKIE", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/movies")));
        assert!(!config.ephemeral_key);
        assert!(config.secure_cookie);
    }

    #[test]
    fn short_key_is_rejected() {
        let err = Config::from_lookup(lookup_in(&[("MOVIES_SECRET_KEY", "short")])).unwrap_err();
        assert_eq!(err, ConfigError::ShortKey(5));
        let err = Config::from_lookup(lookup_in(&[("MOVIES_BCRYPT_COST", "99")])).unwrap_err();
        assert_eq!(err, ConfigError::BadCost("99".to_owned()));
    }
}
