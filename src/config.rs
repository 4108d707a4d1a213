use crate::error::{Error, Result};
use crate::services::debounce_service::DebouncePolicy;
use chrono::Duration;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub detector_url: String,
    pub admin_api_key: Option<String>,
    pub frame_rps: u32,
    pub public_rps: u32,
    pub abandon_after_secs: i64,
    pub sweep_interval_secs: u64,
    pub debounce: DebouncePolicy,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
            detector_url: get_env("DETECTOR_URL")?,
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
            frame_rps: get_env_parse("FRAME_RPS")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            abandon_after_secs: get_env_or("ABANDON_AFTER_SECS", 120)?,
            sweep_interval_secs: get_env_or("SWEEP_INTERVAL_SECS", 30)?,
            debounce: debounce_from_env()?,
        })
    }
}

fn debounce_from_env() -> Result<DebouncePolicy> {
    let defaults = DebouncePolicy::default();
    Ok(DebouncePolicy {
        no_face_frames: get_env_or("NO_FACE_FRAMES", defaults.no_face_frames)?,
        no_face_grace: secs_or("NO_FACE_GRACE_SECS", defaults.no_face_grace)?,
        phone_sustain: millis_or("PHONE_SUSTAIN_MS", defaults.phone_sustain)?,
        phone_cooldown: secs_or("PHONE_COOLDOWN_SECS", defaults.phone_cooldown)?,
        head_sustain: millis_or("HEAD_SUSTAIN_MS", defaults.head_sustain)?,
        head_cooldown: secs_or("HEAD_COOLDOWN_SECS", defaults.head_cooldown)?,
        gaze_sustain: millis_or("GAZE_SUSTAIN_MS", defaults.gaze_sustain)?,
        gaze_cooldown: secs_or("GAZE_COOLDOWN_SECS", defaults.gaze_cooldown)?,
        identity_threshold: get_env_or(
            "IDENTITY_DISTANCE_THRESHOLD",
            defaults.identity_threshold,
        )?,
        identity_frames: get_env_or("IDENTITY_MISMATCH_FRAMES", defaults.identity_frames)?,
    })
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(_) => get_env_parse(name),
        Err(_) => Ok(default),
    }
}

fn secs_or(name: &str, default: Duration) -> Result<Duration> {
    get_env_or(name, default.num_seconds()).map(Duration::seconds)
}

fn millis_or(name: &str, default: Duration) -> Result<Duration> {
    get_env_or(name, default.num_milliseconds()).map(Duration::milliseconds)
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
