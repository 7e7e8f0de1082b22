//! Secret backends for reading the Synthetic Monitoring access token.
//!
//! Supported: 1Password (`op`), Bitwarden (`bw`), KeePassXC (`keepassxc-cli`).
//! Each backend is configured through `SM_*` env vars and is skipped when unconfigured.

use std::process::{Command, Stdio};

/// Default field/attribute names holding the token in each backend.
const OP_DEFAULT_FIELD: &str = "ACCESS_TOKEN";
const KPXC_DEFAULT_ATTRIBUTE: &str = "Password";

/// Read a trimmed, non-empty env var.
fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read secret from a subprocess; stderr is discarded so it never reaches the caller's output.
fn run_cmd(args: &[&str], env_extra: &[(&str, &str)]) -> Option<String> {
    let (bin, rest) = args.split_first()?;
    let mut cmd = Command::new(bin);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in env_extra {
        cmd.env(k, v);
    }
    let out = cmd.output().ok()?;
    if !out.status.success() {
        tracing::debug!(backend = %bin, "secret backend exited with failure");
        return None;
    }
    String::from_utf8(out.stdout)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 1Password CLI (`op read`).
///
/// Configure via:
/// - `SM_OP_ENTRY_PATH`: `op://Vault/Item` (field name from `SM_OP_FIELD`, default `ACCESS_TOKEN`)
/// - Or `SM_OP_VAULT` + `SM_OP_ITEM` + optional `SM_OP_FIELD`
pub fn one_password() -> Option<String> {
    let field = std::env::var("SM_OP_FIELD").unwrap_or_else(|_| OP_DEFAULT_FIELD.to_string());
    let field = field.trim();
    if field.is_empty() {
        return None;
    }

    let uri = match env_nonempty("SM_OP_ENTRY_PATH") {
        Some(path) => format!("{}/{}", path.trim_end_matches('/'), field),
        None => {
            let vault = env_nonempty("SM_OP_VAULT")?;
            let item = env_nonempty("SM_OP_ITEM")?;
            format!("op://{}/{}/{}", vault, item, field)
        }
    };
    run_cmd(&["op", "read", &uri], &[])
}

/// Bitwarden CLI (`bw get password`).
///
/// Configure via:
/// - `SM_BW_ITEM_ID`: UUID of the login item
/// - `SM_BW_SESSION`: optional session key (from `bw unlock --raw`), passed on as `BW_SESSION`
pub fn bitwarden() -> Option<String> {
    let id = env_nonempty("SM_BW_ITEM_ID")?;
    match env_nonempty("SM_BW_SESSION") {
        Some(session) => run_cmd(
            &["bw", "get", "password", &id],
            &[("BW_SESSION", session.as_str())],
        ),
        None => run_cmd(&["bw", "get", "password", &id], &[]),
    }
}

/// KeePassXC CLI (`keepassxc-cli show`).
///
/// Configure via:
/// - `SM_KPXC_DB`: path to the .kdbx database file
/// - `SM_KPXC_ENTRY`: entry title or path (e.g. "Synthetic Monitoring" or "Grafana/SM")
/// - `SM_KPXC_ATTRIBUTE`: attribute name (default `Password`)
pub fn keepassxc() -> Option<String> {
    let db = env_nonempty("SM_KPXC_DB")?;
    let entry = env_nonempty("SM_KPXC_ENTRY")?;
    let attr = std::env::var("SM_KPXC_ATTRIBUTE")
        .unwrap_or_else(|_| KPXC_DEFAULT_ATTRIBUTE.to_string());
    let attr = attr.trim();
    if attr.is_empty() {
        return None;
    }
    run_cmd(&["keepassxc-cli", "show", "-a", attr, &db, &entry], &[])
}
