//! Wallet management module

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::path::Path;
use std::sync::Arc;
use zeroize::Zeroizing;

const KEYPAIR_LEN: usize = 64;

/// Owner of the trading keypair
#[derive(Clone)]
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

impl WalletManager {
    /// Load a keypair file: a solana-keygen JSON array or 64 raw bytes
    ///
    /// A leading `~/` expands to the home directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_home(path.as_ref());
        let raw = Zeroizing::new(
            std::fs::read(&path)
                .with_context(|| format!("Failed to read keypair file: {}", path.display()))?,
        );

        let bytes = if raw.len() == KEYPAIR_LEN {
            raw
        } else {
            let parsed: Vec<u8> =
                serde_json::from_slice(&raw).context("Failed to parse keypair JSON")?;
            Zeroizing::new(parsed)
        };

        Ok(Self::from_keypair(keypair_from_bytes(&bytes)?))
    }

    /// Parse a base58 private key, as exported by browser wallets
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .context("Failed to decode base58 private key")?,
        );
        Ok(Self::from_keypair(keypair_from_bytes(&bytes)?))
    }

    /// Create a new wallet manager from a keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != KEYPAIR_LEN {
        anyhow::bail!(
            "Invalid keypair length: expected {} bytes, got {}",
            KEYPAIR_LEN,
            bytes.len()
        );
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}

fn expand_home(path: &Path) -> std::path::PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => Path::new(&home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_keypair_file() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let wallet = WalletManager::from_file(file.path()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_raw_keypair_file() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&keypair.to_bytes()).unwrap();

        let wallet = WalletManager::from_file(file.path()).unwrap();
        assert_eq!(wallet.keypair().pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_rejects_zero_and_short_keys() {
        let mut zero = tempfile::NamedTempFile::new().unwrap();
        zero.write_all(&[0u8; 64]).unwrap();
        let err = WalletManager::from_file(zero.path()).unwrap_err();
        assert!(err.to_string().contains("all-zero"));

        let mut short = tempfile::NamedTempFile::new().unwrap();
        short.write_all(b"[1, 2, 3]").unwrap();
        let err = WalletManager::from_file(short.path()).unwrap_err();
        assert!(err.to_string().contains("expected 64 bytes, got 3"));
    }

    #[test]
    fn test_base58_private_key() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();

        let wallet = WalletManager::from_base58(&format!(" {}\n", encoded)).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());

        let err = WalletManager::from_base58("0OIl").unwrap_err();
        assert!(err.to_string().contains("base58"));

        let short = bs58::encode([7u8; 32]).into_string();
        let err = WalletManager::from_base58(&short).unwrap_err();
        assert!(err.to_string().contains("expected 64 bytes, got 32"));

        let zero = bs58::encode([0u8; 64]).into_string();
        assert!(WalletManager::from_base58(&zero).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(WalletManager::from_file("/nonexistent/id.json").is_err());
    }
}
