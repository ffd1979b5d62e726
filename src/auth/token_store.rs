use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "mail_harvest";
pub const PASSWORD_ENV: &str = "MAIL_HARVEST_PASSWORD";

/// Save the harvesting admin's password into the OS keyring
pub fn save_admin_password(admin_user: &str, password: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, admin_user);
    entry?
        .set_password(password)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load the admin password from the keyring
pub fn load_admin_password(admin_user: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, admin_user);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Keyring first, then the environment.
pub fn resolve_admin_password(admin_user: &str) -> Result<String> {
    load_admin_password(admin_user)?
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .ok_or_else(|| {
            anyhow!(
                "no password for {admin_user}: run `mail_harvest set-password --user {admin_user}` or set {PASSWORD_ENV}"
            )
        })
}
