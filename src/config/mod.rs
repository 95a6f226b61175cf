// src/config/mod.rs
//! Configuration system for pgp-compose
//!
//! Central, lazy-loaded global config from TOML with an env override for
//! the file location. Everything has a built-in default, so a missing file
//! is not an error.

pub use app::{
    config_path, load, load_from, Config, EncryptionSettings, ProfileSettings, VerifySettings,
};

mod app;
mod defaults;
