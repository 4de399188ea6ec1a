use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use super::error::{Error, Result};

#[derive(Debug, PartialEq)]
pub enum Storage {
    Postgres { database_url: String },
    Memory,
}

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub storage: Storage,
    pub pool_size: u32,
    pub query_timeout: Duration,
    pub session_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse(&lookup, "PORT", 3000)?;
        let ip: IpAddr = parse(&lookup, "LISTEN_IP", IpAddr::from([127, 0, 0, 1]))?;

        let storage = match lookup("STORAGE").as_ref().map(String::as_str) {
            None | Some("postgres") => Storage::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| Error::Config("DATABASE_URL must be set!".into()))?,
            },
            Some("memory") => Storage::Memory,
            Some(other) => {
                return Err(Error::Config(format!(
                    "STORAGE must be `postgres` or `memory`, not `{}`",
                    other
                )))
            }
        };

        let pool_size: u32 = parse(&lookup, "DATABASE_POOL_SIZE", 10)?;
        let timeout_secs: u64 = parse(&lookup, "DATABASE_TIMEOUT_SECS", 5)?;
        let ttl_hours: i64 = parse(&lookup, "SESSION_TTL_HOURS", 24)?;

        Ok(Config {
            listen_addr: SocketAddr::new(ip, port),
            storage,
            pool_size,
            query_timeout: Duration::from_secs(timeout_secs),
            session_ttl: chrono::Duration::hours(ttl_hours),
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => {
            T::from_str(&raw).map_err(|_| Error::Config(format!("Failed to parse ${}", key)))
        }
        None => Ok(default),
    }
}
