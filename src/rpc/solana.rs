use super::config::{ConfigError, RpcConfig};
use super::errors::{RpcError, RpcResult};
use super::{RpcTransport, SignatureStatus, SimulationOutcome};
use crate::confirm::ConfirmationLevel;
use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::{
    RpcSendTransactionConfig, RpcSimulateTransactionAccountsConfig, RpcSimulateTransactionConfig,
};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::Transaction,
};
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};
use std::time::Duration;

/// Transport over the nonblocking solana JSON-RPC client
pub struct SolanaTransport {
    client: RpcClient,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl SolanaTransport {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig, timeout: Duration) -> Self {
        let endpoint = url.into();
        let client = RpcClient::new_with_timeout_and_commitment(endpoint.clone(), timeout, commitment);
        Self {
            client,
            endpoint,
            commitment,
        }
    }

    /// Build from the resolved RPC configuration
    pub fn from_config(config: &RpcConfig) -> Result<Self, ConfigError> {
        let url = config.resolve_url()?;
        let commitment = config.commitment_config()?;
        // HTTP-level timeout; the resilient client enforces the logical deadline
        let timeout = config.timeout().unwrap_or(Duration::from_secs(30));
        Ok(Self::new(url, commitment, timeout))
    }

    fn map_err(&self, err: solana_client::client_error::ClientError) -> RpcError {
        RpcError::from_client_error(err, &self.endpoint)
    }
}

#[async_trait]
impl RpcTransport for SolanaTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_account(&self, address: &Pubkey) -> RpcResult<Option<Account>> {
        self.client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| self.map_err(e))
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> RpcResult<Vec<Option<Account>>> {
        let accounts = self
            .client
            .get_multiple_accounts_with_commitment(addresses, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| self.map_err(e))?;

        if accounts.len() != addresses.len() {
            return Err(RpcError::malformed(format!(
                "getMultipleAccounts returned {} entries for {} addresses",
                accounts.len(),
                addresses.len()
            )));
        }
        Ok(accounts)
    }

    async fn get_latest_blockhash(&self) -> RpcResult<Hash> {
        self.client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map(|(hash, _)| hash)
            .map_err(|e| self.map_err(e))
    }

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
        accounts: &[Pubkey],
    ) -> RpcResult<SimulationOutcome> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            accounts: (!accounts.is_empty()).then(|| RpcSimulateTransactionAccountsConfig {
                encoding: Some(UiAccountEncoding::Base64),
                addresses: accounts.iter().map(|k| k.to_string()).collect(),
            }),
            ..RpcSimulateTransactionConfig::default()
        };

        let result = self
            .client
            .simulate_transaction_with_config(transaction, config)
            .await
            .map_err(|e| self.map_err(e))?
            .value;

        let post_accounts = result
            .accounts
            .unwrap_or_default()
            .into_iter()
            .map(|ui| ui.and_then(|ui| ui.decode::<Account>()))
            .collect();

        Ok(SimulationOutcome {
            err: result.err,
            logs: result.logs.unwrap_or_default(),
            accounts: post_accounts,
            units_consumed: result.units_consumed,
        })
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        skip_preflight: bool,
    ) -> RpcResult<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> RpcResult<Vec<Option<SignatureStatus>>> {
        let statuses = self
            .client
            .get_signature_statuses(signatures)
            .await
            .map_err(|e| self.map_err(e))?
            .value;

        Ok(statuses
            .into_iter()
            .map(|status| {
                status.map(|status| SignatureStatus {
                    slot: status.slot,
                    level: status.confirmation_status.as_ref().map(level_from_status).or_else(
                        || match status.confirmations {
                            None => Some(ConfirmationLevel::Finalized),
                            Some(_) => Some(ConfirmationLevel::Processed),
                        },
                    ),
                    err: status.err,
                })
            })
            .collect())
    }
}

fn level_from_status(status: &TransactionConfirmationStatus) -> ConfirmationLevel {
    match status {
        TransactionConfirmationStatus::Processed => ConfirmationLevel::Processed,
        TransactionConfirmationStatus::Confirmed => ConfirmationLevel::Confirmed,
        TransactionConfirmationStatus::Finalized => ConfirmationLevel::Finalized,
    }
}
