//! Test Utilities Module
//!
//! Scripted in-memory transport for deterministic pipeline tests. Serves
//! canned accounts, simulation results and signature statuses, and counts
//! calls per RPC method so tests can assert on round trips.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::rpc::{RpcError, RpcResult, RpcTransport, SignatureStatus, SimulationOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use std::collections::{HashMap, VecDeque};

/// Length of an SPL token account
pub const TOKEN_ACCOUNT_LEN: usize = 165;

/// Length of an SPL mint
pub const MINT_LEN: usize = 82;

type SimulationHandler =
    Box<dyn Fn(&Transaction, &[Pubkey]) -> RpcResult<SimulationOutcome> + Send + Sync>;

/// Mock transport for testing
///
/// Without a simulation handler the dry run reports the current stored state
/// of the requested accounts, i.e. a zero delta.
pub struct MockTransport {
    accounts: Mutex<HashMap<Pubkey, Account>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, VecDeque<RpcError>>>,
    simulation: Mutex<Option<SimulationHandler>>,
    simulated: Mutex<Vec<(Transaction, Vec<Pubkey>)>>,
    statuses: Mutex<VecDeque<RpcResult<Vec<Option<SignatureStatus>>>>>,
    sent: Mutex<Vec<Transaction>>,
    blockhash: Hash,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            simulation: Mutex::new(None),
            simulated: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            blockhash: Hash::new_from_array([7u8; 32]),
        }
    }

    /// Store an account
    pub fn set_account(&self, address: Pubkey, owner: Pubkey, lamports: u64, data: Vec<u8>) {
        self.accounts.lock().insert(
            address,
            Account {
                lamports,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().remove(address);
    }

    /// Store an initialized mint owned by `token_program`
    pub fn set_mint(&self, mint: Pubkey, token_program: Pubkey) {
        let mut data = vec![0u8; MINT_LEN];
        data[44] = 6;
        data[45] = 1;
        self.set_account(mint, token_program, 1_461_600, data);
    }

    /// Store a token account holding `amount`
    pub fn set_token_account(
        &self,
        address: Pubkey,
        token_program: Pubkey,
        mint: Pubkey,
        owner: Pubkey,
        amount: u64,
    ) {
        self.accounts
            .lock()
            .insert(address, token_account(token_program, mint, owner, amount));
    }

    /// Number of times `method` reached the transport
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    /// Fail the next `times` calls of `method` with `err`
    pub fn fail_next(&self, method: &'static str, times: usize, err: RpcError) {
        let mut failures = self.failures.lock();
        let queue = failures.entry(method).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    /// Replace the default dry-run behaviour
    pub fn on_simulate<F>(&self, handler: F)
    where
        F: Fn(&Transaction, &[Pubkey]) -> RpcResult<SimulationOutcome> + Send + Sync + 'static,
    {
        *self.simulation.lock() = Some(Box::new(handler));
    }

    /// Every simulated transaction with its requested accounts
    pub fn simulated(&self) -> Vec<(Transaction, Vec<Pubkey>)> {
        self.simulated.lock().clone()
    }

    /// Queue one `getSignatureStatuses` answer; an empty queue answers "unknown"
    pub fn push_statuses(&self, response: RpcResult<Vec<Option<SignatureStatus>>>) {
        self.statuses.lock().push_back(response);
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().clone()
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    fn record(&self, method: &'static str) -> RpcResult<()> {
        *self.calls.lock().entry(method).or_insert(0) += 1;
        match self.failures.lock().get_mut(method).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Token account with `amount` at the standard offset
pub fn token_account(token_program: Pubkey, mint: Pubkey, owner: Pubkey, amount: u64) -> Account {
    let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
    data[..32].copy_from_slice(mint.as_ref());
    data[32..64].copy_from_slice(owner.as_ref());
    data[64..72].copy_from_slice(&amount.to_le_bytes());
    data[108] = 1;
    Account {
        lamports: 2_039_280,
        data,
        owner: token_program,
        executable: false,
        rent_epoch: 0,
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    fn endpoint(&self) -> &str {
        "mock://transport"
    }

    async fn get_account(&self, address: &Pubkey) -> RpcResult<Option<Account>> {
        self.record("getAccountInfo")?;
        Ok(self.accounts.lock().get(address).cloned())
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> RpcResult<Vec<Option<Account>>> {
        self.record("getMultipleAccounts")?;
        let accounts = self.accounts.lock();
        Ok(addresses.iter().map(|k| accounts.get(k).cloned()).collect())
    }

    async fn get_latest_blockhash(&self) -> RpcResult<Hash> {
        self.record("getLatestBlockhash")?;
        Ok(self.blockhash)
    }

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
        accounts: &[Pubkey],
    ) -> RpcResult<SimulationOutcome> {
        self.record("simulateTransaction")?;
        self.simulated
            .lock()
            .push((transaction.clone(), accounts.to_vec()));

        if let Some(handler) = self.simulation.lock().as_ref() {
            return handler(transaction, accounts);
        }

        let stored = self.accounts.lock();
        Ok(SimulationOutcome {
            err: None,
            logs: vec!["Program log: mock".to_string()],
            accounts: accounts.iter().map(|k| stored.get(k).cloned()).collect(),
            units_consumed: Some(50_000),
        })
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        _skip_preflight: bool,
    ) -> RpcResult<Signature> {
        self.record("sendTransaction")?;
        self.sent.lock().push(transaction.clone());
        Ok(transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_default())
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> RpcResult<Vec<Option<SignatureStatus>>> {
        self.record("getSignatureStatuses")?;
        match self.statuses.lock().pop_front() {
            Some(response) => response,
            None => Ok(vec![None; signatures.len()]),
        }
    }
}
