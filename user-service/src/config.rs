use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub database_url: String,

    pub jwt_secret_key: String,

    #[serde(default = "default_jwt_expiration_secs")]
    pub jwt_expiration_secs: u64,

    pub server_port: u16,
}

// Ten hours.
fn default_jwt_expiration_secs() -> u64 {
    36_000
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }
}
