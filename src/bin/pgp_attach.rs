// src/bin/pgp_attach.rs
//! Attachment tool — split-encrypt files for a key, and back
//!
//! ```text
//! pgp_attach keygen  <name> <email> <key.asc>
//! pgp_attach encrypt <key.asc> <file>                 → <file>.keys + <file>.pgp
//! pgp_attach decrypt <key.asc> <file.keys> <file.pgp> [out]
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pgp_compose::{KeyRing, Passphrase, PgpHandle};
use rpassword::read_password;
use tracing::{info, warn};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let pgp = PgpHandle::from_config(pgp_compose::load_config())
        .context("Failed to build handle from config")?;
    info!(profile = pgp.profile().name(), "pgp_attach");

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["keygen", name, email, out] => keygen(&pgp, name, email, Path::new(out)),
        ["encrypt", key, file] => encrypt(&pgp, Path::new(key), Path::new(file)),
        ["decrypt", key, keys, data] => decrypt(&pgp, Path::new(key), Path::new(keys), Path::new(data), None),
        ["decrypt", key, keys, data, out] => {
            decrypt(&pgp, Path::new(key), Path::new(keys), Path::new(data), Some(Path::new(out)))
        }
        _ => bail!(
            "usage: pgp_attach keygen <name> <email> <key.asc>\n       \
             pgp_attach encrypt <key.asc> <file>\n       \
             pgp_attach decrypt <key.asc> <file.keys> <file.pgp> [out]"
        ),
    }
}

fn keygen(pgp: &PgpHandle, name: &str, email: &str, out: &Path) -> Result<()> {
    let level = pgp_compose::load_config().profile.security_level;
    let key = pgp.generate_key(name, email, level)?;
    let passphrase = prompt(&format!("Passphrase for {email} (empty for none): "))?;
    let key = if passphrase.expose_secret().is_empty() {
        warn!("storing key without a passphrase");
        key
    } else {
        pgp.lock_key(&key, &passphrase)?
    };
    std::fs::write(out, key.armored()?).with_context(|| format!("Failed to write {}", out.display()))?;
    info!(fingerprint = ?key.fingerprints(), "KEY → {}", out.display());
    Ok(())
}

fn encrypt(pgp: &PgpHandle, key: &Path, file: &Path) -> Result<()> {
    let recipients = read_keyring(key)?.to_public();
    let plain = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let split = pgp.encrypt_attachment(&plain, &filename, &recipients)?;

    let keys_path = with_suffix(file, "keys");
    let data_path = with_suffix(file, "pgp");
    std::fs::write(&keys_path, &split.key_packets)?;
    std::fs::write(&data_path, &split.data_packet)?;
    info!("ENCRYPTED → {} + {}", keys_path.display(), data_path.display());
    Ok(())
}

fn decrypt(pgp: &PgpHandle, key: &Path, keys: &Path, data: &Path, out: Option<&Path>) -> Result<()> {
    let mut ring = read_keyring(key)?;
    if !ring.is_unlocked() {
        let passphrase = prompt(&format!("Passphrase for {}: ", key.display()))?;
        ring = ring.unlock(&passphrase).context("Wrong passphrase?")?;
    }
    let key_packets = std::fs::read(keys)?;
    let data_packet = std::fs::read(data)?;

    let message = pgp.decrypt_attachment(&key_packets, &data_packet, &ring)?;

    let out_path = match out {
        Some(path) => path.to_path_buf(),
        None if !message.metadata.filename.is_empty() => data
            .with_file_name(Path::new(&message.metadata.filename).file_name().unwrap_or_default()),
        None => data.with_extension("out"),
    };
    if out_path.exists() {
        bail!("{} already exists", out_path.display());
    }
    std::fs::write(&out_path, message.plaintext())?;
    info!("DECRYPTED → {}", out_path.display());
    Ok(())
}

fn read_keyring(path: &Path) -> Result<KeyRing> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(KeyRing::from_bytes(&bytes)?)
}

fn prompt(label: &str) -> Result<Passphrase> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(Passphrase::new(read_password()?.into_bytes()))
}

fn with_suffix(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
