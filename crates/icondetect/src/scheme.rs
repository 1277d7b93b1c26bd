//! URI scheme registration for the notification "Restart" callback.
//!
//! The scheme lives under `HKEY_CLASSES_ROOT\<scheme>`:
//!
//! ```text
//! <scheme>                       @="URL:<app> Protocol", "URL Protocol"=""
//! <scheme>\shell\open\command    @="\"<exe>\" \"%1\""
//! ```

use icondetect_core::{Error, Result, join_key};
use icondetect_store::{Access, KeyStore, StoreKey};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const COMMAND_KEY: &str = r"shell\open\command";

// <scheme>://<target>[/...]
static URI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*)://(?P<target>[^/]+)").unwrap()
});

/// Whether `scheme` has a key. Any store failure counts as not registered.
pub fn is_registered<S: KeyStore>(store: &S, scheme: &str) -> bool {
    store.open_key(scheme, Access::Read).is_ok()
}

/// Point `scheme` at `exe`.
pub fn register<S: KeyStore>(store: &S, app: &str, scheme: &str, exe: &Path) -> Result<()> {
    let key = store
        .create_key(scheme)
        .map_err(|e| Error::store_unavailable(scheme, e))?;
    key.set_default_value(&format!("URL:{} Protocol", app))
        .and_then(|_| key.set_string("URL Protocol", ""))
        .map_err(|e| Error::entry_write(scheme, e))?;

    let command_path = join_key(scheme, COMMAND_KEY);
    let command = store
        .create_key(&command_path)
        .map_err(|e| Error::entry_write(command_path.as_str(), e))?;
    command
        .set_default_value(&format!("\"{}\" \"%1\"", exe.display()))
        .map_err(|e| Error::entry_write(command_path.as_str(), e))?;

    log::debug!("registered {}:// -> {}", scheme, exe.display());
    Ok(())
}

/// Register `scheme`, removing a previous registration first.
pub fn reregister<S: KeyStore>(store: &S, app: &str, scheme: &str, exe: &Path) -> Result<()> {
    if is_registered(store, scheme) {
        log::info!("URI scheme already registered, re-registering");
        unregister(store, scheme)?;
    }
    register(store, app, scheme, exe)
}

/// Delete the scheme key tree. An absent scheme is not an error.
pub fn unregister<S: KeyStore>(store: &S, scheme: &str) -> Result<()> {
    match store.delete_tree(scheme) {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(Error::store_unavailable(scheme, e)),
    }
}

/// `<scheme>://<target>`
pub fn restart_uri(scheme: &str, target: &str) -> String {
    format!("{}://{}", scheme, target)
}

/// Extract the image name from `<scheme>://<image>[/...]`.
///
/// The scheme must match `scheme` (ASCII case-insensitively, as the shell
/// treats it).
pub fn parse_restart_uri(uri: &str, scheme: &str) -> Result<String> {
    let captures = URI_PATTERN
        .captures(uri.trim())
        .ok_or_else(|| Error::process(format!("invalid URI: {}", uri)))?;
    if !captures["scheme"].eq_ignore_ascii_case(scheme) {
        return Err(Error::process(format!(
            "unexpected scheme in {}, expected {}://",
            uri, scheme
        )));
    }
    Ok(captures["target"].to_string())
}
