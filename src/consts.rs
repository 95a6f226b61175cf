// src/consts.rs
//! Shared constants — security parameters and defaults

/// Seconds added to the verification time on the first detached-verify
/// attempt, tolerating signer clocks that run ahead (two days).
pub const CREATION_TIME_OFFSET_SECS: i64 = 60 * 60 * 24 * 2;

/// Name of the profile used when none is configured
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Name of the RFC 9580 (v6 keys, AEAD) profile
pub const CRYPTO_REFRESH_PROFILE_NAME: &str = "rfc9580";

/// Name of the conservative RFC 4880 (v4, RSA) profile
pub const LEGACY_PROFILE_NAME: &str = "rfc4880";

/// Notation carrying the signing context of a signature
pub const SIGNING_CONTEXT_NOTATION: &str = "context@proton.ch";

// Iterated+salted S2K: the largest count OpenPGP can represent
pub const S2K_ITERATED_COUNT: u32 = 65_011_712;

// Argon2 S2K parameters (RFC 9580 §3.7.1.4 second recommended option)
pub const ARGON2_PASSES: u8 = 3;
pub const ARGON2_PARALLELISM: u8 = 4;
pub const ARGON2_MEMORY_EXPONENT: u8 = 16;

/// Env var overriding the config file location
pub const CONFIG_ENV_VAR: &str = "PGP_COMPOSE_CONFIG";

/// File name of the config below the platform config dir
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory below the platform config dir
pub const CONFIG_DIR_NAME: &str = "pgp-compose";
