// src/config/defaults.rs
use crate::config::app::{EncryptionSettings, ProfileSettings, VerifySettings};
use crate::consts::{CREATION_TIME_OFFSET_SECS, DEFAULT_PROFILE_NAME};
use crate::enums::SecurityLevel;

pub fn default_profile() -> ProfileSettings {
    ProfileSettings {
        name: DEFAULT_PROFILE_NAME.into(),
        security_level: SecurityLevel::Standard,
    }
}

pub fn default_encryption() -> EncryptionSettings {
    EncryptionSettings {
        compress: false,
        utf8: false,
    }
}

pub fn default_verify() -> VerifySettings {
    VerifySettings {
        creation_time_offset_secs: CREATION_TIME_OFFSET_SECS,
    }
}
