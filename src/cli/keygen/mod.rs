//! Generate-key command - writes a private JWKS for `auth.jwks_path`

use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::infrastructure::auth::{JwkSet, RsaSigningKey};

#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    /// File to write; stdout when omitted
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Key id published in the JWKS; derived from the key when omitted
    #[arg(long)]
    pub key_id: Option<String>,
}

/// Generate the key and write the JWKS document
pub async fn run(args: KeygenArgs) -> anyhow::Result<()> {
    let key = tokio::task::spawn_blocking(move || RsaSigningKey::generate(args.key_id)).await??;
    let document = private_jwks(&key)?;

    match args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, document)?;
            eprintln!("Wrote signing key '{}' to {}", key.key_id(), path.display());
        }
        None => println!("{}", document),
    }

    Ok(())
}

fn private_jwks(key: &RsaSigningKey) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JwkSet {
        keys: vec![key.private_jwk()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::auth::test_support::test_signing_key;

    #[test]
    fn test_private_jwks_loads_back() {
        let key = test_signing_key();

        let document = private_jwks(&key).unwrap();
        let loaded = RsaSigningKey::from_jwks_json(&document, Some("test-key")).unwrap();

        assert_eq!(loaded.key_id(), "test-key");
        assert!(document.contains("\"d\""));
    }
}
