//! Signing, submission and confirmation
//!
//! [`TxSubmitter`] turns an instruction list into a signed legacy transaction,
//! sends it through the block-engine relay when one is configured (falling
//! back to the node otherwise) and polls signature status until the requested
//! depth is reached.

use crate::jito::{JitoClient, SendResult};
use crate::observability::TraceContext;
use crate::rpc::{ConfigError, ResilientClient};
use crate::tx_builder::errors::{TradeError, TradeResult};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::Transaction,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

/// Status poll period
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How deep a transaction must be before it counts as confirmed
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationLevel::Processed => "processed",
            ConfirmationLevel::Confirmed => "confirmed",
            ConfirmationLevel::Finalized => "finalized",
        }
    }

    /// True when a status reported at `reached` satisfies this level
    ///
    /// A status without a level is visible to the node, which is enough
    /// for `Processed` and nothing deeper.
    pub fn is_satisfied_by(&self, reached: Option<ConfirmationLevel>) -> bool {
        reached.unwrap_or(ConfirmationLevel::Processed) >= *self
    }
}

impl fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(ConfirmationLevel::Processed),
            "confirmed" => Ok(ConfirmationLevel::Confirmed),
            "finalized" => Ok(ConfirmationLevel::Finalized),
            other => Err(ConfigError::ValidationError(format!(
                "unknown confirmation level '{}' (expected processed, confirmed or finalized)",
                other
            ))),
        }
    }
}

/// Poll `signature` every [`POLL_INTERVAL`] until it reaches `level`
pub async fn wait_for_confirmation(
    client: &ResilientClient,
    cancel: &CancellationToken,
    signature: &Signature,
    level: ConfirmationLevel,
) -> TradeResult<()> {
    poll_confirmation(client, cancel, signature, level, POLL_INTERVAL).await
}

/// Status errors are transient here: the tick is skipped and polling
/// continues until the status resolves or `cancel` fires.
#[instrument(skip(client, cancel), fields(%signature, %level))]
async fn poll_confirmation(
    client: &ResilientClient,
    cancel: &CancellationToken,
    signature: &Signature,
    level: ConfirmationLevel,
    period: Duration,
) -> TradeResult<()> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let signatures = [*signature];
    let mut polls: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(TradeError::Cancelled(format!(
                    "confirmation of {} abandoned after {} polls",
                    signature, polls
                )));
            }
            _ = ticker.tick() => {}
        }
        polls += 1;

        let status = match client.poll_signature_statuses(cancel, &signatures).await {
            Ok(mut statuses) => statuses.pop().flatten(),
            Err(e) if cancel.is_cancelled() => {
                return Err(TradeError::Cancelled(e.to_string()));
            }
            Err(e) => {
                debug!(error = %e, polls, "Status query failed, skipping tick");
                continue;
            }
        };

        let Some(status) = status else {
            continue;
        };

        if let Some(error) = status.err {
            warn!(slot = status.slot, %error, "Transaction failed on chain");
            return Err(TradeError::ExecutionFailed {
                signature: signature.to_string(),
                error,
            });
        }

        if level.is_satisfied_by(status.level) {
            info!(slot = status.slot, polls, "Transaction confirmed");
            return Ok(());
        }
    }
}

/// Sign `transaction` with the signers matching its required keys, in key order
///
/// Extra signers are ignored; a missing one is an error.
pub fn sign_transaction(transaction: &mut Transaction, signers: &[&dyn Signer]) -> TradeResult<()> {
    let required = transaction.message.header.num_required_signatures as usize;
    let message = transaction.message_data();

    let mut signatures = Vec::with_capacity(required);
    for key in transaction.message.account_keys.iter().take(required) {
        let signer = signers
            .iter()
            .find(|s| s.pubkey() == *key)
            .ok_or_else(|| TradeError::Signing(format!("missing signer for {}", key)))?;
        let signature = signer
            .try_sign_message(&message)
            .map_err(|e| TradeError::Signing(format!("{}: {}", key, e)))?;
        signatures.push(signature);
    }

    transaction.signatures = signatures;
    Ok(())
}

/// Signs, sends and confirms transactions
#[derive(Debug, Clone)]
pub struct TxSubmitter {
    client: ResilientClient,
    jito: Option<Arc<JitoClient>>,
    skip_preflight: bool,
    poll_interval: Duration,
}

impl TxSubmitter {
    pub fn new(client: ResilientClient) -> Self {
        Self {
            client,
            jito: None,
            skip_preflight: false,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Route sends through the block-engine relay
    pub fn with_jito(mut self, jito: Arc<JitoClient>) -> Self {
        self.jito = Some(jito);
        self
    }

    pub fn with_skip_preflight(mut self, skip_preflight: bool) -> Self {
        self.skip_preflight = skip_preflight;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Build a transaction paid by `payer` on a fresh blockhash and sign it
    #[instrument(skip_all, fields(%payer, instructions = instructions.len()))]
    pub async fn sign(
        &self,
        cancel: &CancellationToken,
        payer: &Pubkey,
        signers: &[&dyn Signer],
        instructions: &[Instruction],
    ) -> TradeResult<Transaction> {
        let blockhash = self.client.get_latest_blockhash(cancel).await?;
        let mut transaction = Transaction::new_unsigned(Message::new(instructions, Some(payer)));
        transaction.message.recent_blockhash = blockhash;
        sign_transaction(&mut transaction, signers)?;
        debug!(%blockhash, "Transaction signed");
        Ok(transaction)
    }

    /// Submit a signed transaction
    #[instrument(skip_all, fields(relay = self.jito.is_some()))]
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        transaction: &Transaction,
    ) -> TradeResult<Signature> {
        let signature = match &self.jito {
            Some(jito) => {
                let sent = jito.send_transaction(cancel, transaction).await?;
                info!(signature = %sent.signature, bundle_id = %sent.bundle_id, "Sent via relay");
                sent.signature
            }
            None => {
                let signature = self
                    .client
                    .send_transaction(cancel, transaction, self.skip_preflight)
                    .await?;
                info!(%signature, "Sent via RPC");
                signature
            }
        };
        Ok(signature)
    }

    pub async fn confirm(
        &self,
        cancel: &CancellationToken,
        signature: &Signature,
        level: ConfirmationLevel,
    ) -> TradeResult<()> {
        poll_confirmation(&self.client, cancel, signature, level, self.poll_interval).await
    }

    pub async fn send_and_confirm(
        &self,
        cancel: &CancellationToken,
        transaction: &Transaction,
        level: ConfirmationLevel,
    ) -> TradeResult<Signature> {
        let ctx = TraceContext::new("send_and_confirm");
        let signature = self
            .send(cancel, transaction)
            .instrument(ctx.child("send").span())
            .await?;
        self.confirm(cancel, &signature, level)
            .instrument(ctx.child("confirm").span())
            .await?;
        debug!(correlation_id = %ctx.correlation_id, elapsed_ms = ctx.elapsed_ms(), "Send and confirm done");
        Ok(signature)
    }

    /// Submit through the relay and wait for the bundle itself to land
    ///
    /// Requires a relay; the node is never used as a fallback here.
    pub async fn send_via_relay_and_confirm(
        &self,
        cancel: &CancellationToken,
        transaction: &Transaction,
    ) -> TradeResult<SendResult> {
        let jito = self.jito.as_ref().ok_or_else(|| {
            TradeError::ConfigurationIncomplete("relay send requires jito endpoints".to_string())
        })?;
        let ctx = TraceContext::new("send_via_relay_and_confirm");

        let sent = jito
            .send_transaction(cancel, transaction)
            .instrument(ctx.child("send").span())
            .await?;
        info!(signature = %sent.signature, bundle_id = %sent.bundle_id, "Sent via relay");
        let status = jito
            .wait_for_bundle(cancel, &sent.bundle_id)
            .instrument(ctx.child("confirm").span())
            .await?;
        info!(slot = status.slot, elapsed_ms = ctx.elapsed_ms(), "Bundle confirmed");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{RpcConfig, RpcError, SignatureStatus};
    use crate::test_utils::MockTransport;
    use solana_sdk::instruction::InstructionError;
    use solana_sdk::signature::Keypair;
    use solana_sdk::system_instruction;
    use solana_sdk::transaction::TransactionError;

    fn client(transport: Arc<MockTransport>) -> ResilientClient {
        let mut config = RpcConfig::from_url("http://mock");
        config.rate_limit.rps = 0.0;
        config.retry = crate::rpc::RetryConfig::disabled();
        ResilientClient::new(transport, config).unwrap()
    }

    fn status(level: Option<ConfirmationLevel>) -> Option<SignatureStatus> {
        Some(SignatureStatus {
            slot: 42,
            err: None,
            level,
        })
    }

    #[test]
    fn test_level_parse_and_order() {
        assert_eq!(
            "Finalized".parse::<ConfirmationLevel>().unwrap(),
            ConfirmationLevel::Finalized
        );
        assert!("instant".parse::<ConfirmationLevel>().is_err());
        assert!(ConfirmationLevel::Processed < ConfirmationLevel::Confirmed);
        assert_eq!(ConfirmationLevel::default(), ConfirmationLevel::Confirmed);

        assert!(ConfirmationLevel::Processed.is_satisfied_by(None));
        assert!(!ConfirmationLevel::Confirmed.is_satisfied_by(Some(ConfirmationLevel::Processed)));
        assert!(ConfirmationLevel::Confirmed.is_satisfied_by(Some(ConfirmationLevel::Finalized)));
    }

    #[test]
    fn test_sign_requires_every_signer() {
        let payer = Keypair::new();
        let other = Keypair::new();
        let ix = system_instruction::transfer(&other.pubkey(), &payer.pubkey(), 1);
        let mut tx = Transaction::new_unsigned(Message::new(&[ix], Some(&payer.pubkey())));

        let err = sign_transaction(&mut tx, &[&payer]).unwrap_err();
        assert!(err.to_string().contains(&format!("missing signer for {}", other.pubkey())));

        let unrelated = Keypair::new();
        sign_transaction(&mut tx, &[&other, &unrelated, &payer]).unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_requested_depth() {
        let transport = Arc::new(MockTransport::new());
        transport.push_statuses(Ok(vec![None]));
        transport.push_statuses(Err(RpcError::transport("mock", "reset")));
        transport.push_statuses(Ok(vec![status(Some(ConfirmationLevel::Processed))]));
        transport.push_statuses(Ok(vec![status(Some(ConfirmationLevel::Confirmed))]));

        let token = CancellationToken::new();
        wait_for_confirmation(
            &client(transport.clone()),
            &token,
            &Signature::default(),
            ConfirmationLevel::Confirmed,
        )
        .await
        .unwrap();
        assert_eq!(transport.calls("getSignatureStatuses"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_waits_for_next_tick() {
        let transport = Arc::new(MockTransport::new());
        transport.push_statuses(Err(RpcError::transport("mock", "reset")));
        transport.push_statuses(Ok(vec![status(Some(ConfirmationLevel::Confirmed))]));

        // default retry policy: the poller must not inherit its backoff
        let mut config = RpcConfig::from_url("http://mock");
        config.rate_limit.rps = 0.0;
        let client = ResilientClient::new(transport.clone(), config).unwrap();

        let token = CancellationToken::new();
        let start = Instant::now();
        wait_for_confirmation(
            &client,
            &token,
            &Signature::default(),
            ConfirmationLevel::Confirmed,
        )
        .await
        .unwrap();
        assert_eq!(start.elapsed(), POLL_INTERVAL * 2);
        assert_eq!(transport.calls("getSignatureStatuses"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processed_accepts_any_status() {
        let transport = Arc::new(MockTransport::new());
        transport.push_statuses(Ok(vec![status(None)]));

        let token = CancellationToken::new();
        wait_for_confirmation(
            &client(transport.clone()),
            &token,
            &Signature::default(),
            ConfirmationLevel::Processed,
        )
        .await
        .unwrap();
        assert_eq!(transport.calls("getSignatureStatuses"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_chain_failure_is_terminal() {
        let transport = Arc::new(MockTransport::new());
        transport.push_statuses(Ok(vec![Some(SignatureStatus {
            slot: 7,
            err: Some(TransactionError::InstructionError(
                1,
                InstructionError::Custom(6004),
            )),
            level: Some(ConfirmationLevel::Confirmed),
        })]));

        let token = CancellationToken::new();
        let err = wait_for_confirmation(
            &client(transport),
            &token,
            &Signature::default(),
            ConfirmationLevel::Finalized,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TradeError::ExecutionFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let transport = Arc::new(MockTransport::new());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(550)).await;
            canceller.cancel();
        });

        let err = wait_for_confirmation(
            &client(transport.clone()),
            &token,
            &Signature::default(),
            ConfirmationLevel::Confirmed,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TradeError::Cancelled(_)));
        assert_eq!(err.category(), "confirmation");
        assert_eq!(transport.calls("getSignatureStatuses"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_send_confirm_over_rpc() {
        let transport = Arc::new(MockTransport::new());
        transport.push_statuses(Ok(vec![status(Some(ConfirmationLevel::Finalized))]));
        let submitter = TxSubmitter::new(client(transport.clone())).with_skip_preflight(true);

        let payer = Keypair::new();
        let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 5);
        let token = CancellationToken::new();
        let tx = submitter
            .sign(&token, &payer.pubkey(), &[&payer], &[ix])
            .await
            .unwrap();
        assert_eq!(tx.message.recent_blockhash, transport.blockhash());

        let signature = submitter
            .send_and_confirm(&token, &tx, ConfirmationLevel::Finalized)
            .await
            .unwrap();
        assert_eq!(signature, tx.signatures[0]);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_relay_confirm_requires_relay() {
        let transport = Arc::new(MockTransport::new());
        let submitter = TxSubmitter::new(client(transport.clone()));

        let payer = Keypair::new();
        let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 5);
        let mut tx = Transaction::new_unsigned(Message::new(&[ix], Some(&payer.pubkey())));
        sign_transaction(&mut tx, &[&payer]).unwrap();

        let err = submitter
            .send_via_relay_and_confirm(&CancellationToken::new(), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::ConfigurationIncomplete(_)));
        assert!(transport.sent().is_empty());
    }
}
