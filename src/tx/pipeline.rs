//! Single-signer transaction pipeline
//!
//! One attempt runs these stages strictly in order:
//!
//! 1. fetch account state (sequence, account number, latest height)
//! 2. compose the fee-less envelope
//! 3. sign it with a throwaway signature
//! 4. simulate and price the fee
//! 5. compose again with the fee
//! 6. sign the final envelope
//! 7. broadcast
//!
//! Any stage error aborts the attempt. Attempts through one pipeline are serialized
//! so concurrent callers never race on the signer's sequence number.
//!
//! A SYNC broadcast only passes CheckTx, so the REST account endpoint keeps serving
//! the committed sequence until the block lands. The pipeline remembers the sequence
//! after its last accepted broadcast and signs with whichever is higher.

use super::envelope::{compose, ComposeArgs};
use crate::audit::{AttemptContext, AttemptResult, AttemptStatus, AuditLog};
use crate::chain::{AccountSource, TxOutcome, TxService};
use crate::config::ChainConfig;
use crate::wallet::{FeeSimulator, SecureWallet};
use crate::{Error, Result};
use cosmrs::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct TxPipeline {
    wallet: Arc<SecureWallet>,
    chain: ChainConfig,
    accounts: Arc<dyn AccountSource>,
    service: Arc<dyn TxService>,
    simulator: FeeSimulator,
    audit: Option<AuditLog>,
    /// Sequence expected by the node's check state after our last accepted broadcast.
    /// Held for the whole attempt.
    next_sequence: Mutex<Option<u64>>,
}

impl TxPipeline {
    pub fn new(
        wallet: Arc<SecureWallet>,
        chain: ChainConfig,
        accounts: Arc<dyn AccountSource>,
        service: Arc<dyn TxService>,
    ) -> Result<Self> {
        let simulator = FeeSimulator::from_chain_config(service.clone(), &chain)?;
        Ok(Self {
            wallet,
            chain,
            accounts,
            service,
            simulator,
            audit: None,
            next_sequence: Mutex::new(None),
        })
    }

    /// Record every attempt in the given audit log
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn wallet(&self) -> &SecureWallet {
        &self.wallet
    }

    pub fn address(&self) -> &str {
        self.wallet.address()
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Run one attempt and return the node's outcome, successful or not
    pub async fn sign_and_broadcast(&self, messages: Vec<Any>, memo: &str) -> Result<TxOutcome> {
        if messages.is_empty() {
            return Err(Error::InvalidArgument(
                "Transaction needs at least one message".to_string(),
            ));
        }

        let mut next_sequence = self.next_sequence.lock().await;

        let ctx = AttemptContext::new(
            self.wallet.address(),
            messages.iter().map(|m| m.type_url.clone()).collect(),
            memo,
        );
        if let Some(audit) = &self.audit {
            audit.record_start(&ctx).await;
        }

        let started = Instant::now();
        let result = self.attempt(&messages, memo, *next_sequence).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok((sequence, outcome)) if outcome.code == 0 => *next_sequence = Some(sequence + 1),
            Ok((_, outcome)) if outcome.code == WRONG_SEQUENCE_CODE => *next_sequence = None,
            Err(e) if is_sequence_mismatch(e) => *next_sequence = None,
            _ => {}
        }
        let result = result.map(|(_, outcome)| outcome);

        match &result {
            Ok(outcome) if outcome.success() => {
                tracing::info!(hash = %outcome.hash, gas_used = outcome.gas_used, duration_ms, "Transaction accepted");
            }
            Ok(outcome) => {
                tracing::warn!(hash = %outcome.hash, code = outcome.code, raw_log = %outcome.raw_log, "Transaction rejected");
            }
            Err(e) => {
                tracing::error!(error = %e, attempt_id = %ctx.attempt_id, "Transaction attempt failed");
            }
        }

        if let Some(audit) = &self.audit {
            let (attempt, status) = match &result {
                Ok(outcome) => (
                    AttemptResult {
                        tx_hash: Some(outcome.hash.clone()),
                        gas_wanted: Some(outcome.gas_wanted),
                        gas_used: Some(outcome.gas_used),
                        error: (!outcome.success()).then(|| outcome.raw_log.clone()),
                    },
                    if outcome.success() {
                        AttemptStatus::Success
                    } else {
                        AttemptStatus::Rejected
                    },
                ),
                Err(e) => (
                    AttemptResult {
                        error: Some(e.to_string()),
                        ..Default::default()
                    },
                    AttemptStatus::Error,
                ),
            };
            audit
                .record_complete(&ctx, &attempt, status, duration_ms)
                .await;
        }

        result
    }

    /// Run one attempt, treating an unsuccessful outcome as `Error::ChainRejection`
    pub async fn execute(&self, messages: Vec<Any>, memo: &str) -> Result<TxOutcome> {
        self.sign_and_broadcast(messages, memo).await?.into_result()
    }

    /// Returns the sequence the transaction was signed with alongside the outcome
    async fn attempt(
        &self,
        messages: &[Any],
        memo: &str,
        cached_sequence: Option<u64>,
    ) -> Result<(u64, TxOutcome)> {
        let mut state = self
            .accounts
            .fetch_account_state(self.wallet.address())
            .await?;
        if let Some(cached) = cached_sequence.filter(|cached| *cached > state.sequence) {
            tracing::debug!(
                committed = state.sequence,
                pending = cached,
                "Using sequence after pending broadcast"
            );
            state.sequence = cached;
        }
        tracing::debug!(
            sequence = state.sequence,
            account_number = state.account_number,
            latest_height = state.latest_height,
            "Fetched account state"
        );

        let public_key = self.wallet.public_key_any();
        let args = ComposeArgs {
            public_key: &public_key,
            messages,
            memo,
            state,
            chain_id: &self.chain.chain_id,
            fee: None,
            timeout_block_buffer: self.chain.timeout_block_buffer,
            simulation_gas_limit: self.chain.simulation_gas_limit,
        };

        let pre_fee = compose(&args);
        let throwaway = self.wallet.sign(&pre_fee.sign_bytes)?;
        let fee = self.simulator.simulate_fee(&pre_fee, &throwaway).await?;

        let unsigned = compose(&ComposeArgs {
            fee: Some(&fee),
            ..args
        });
        let signature = self.wallet.sign(&unsigned.sign_bytes)?;
        let signed = unsigned.into_signed(&signature);

        tracing::info!(
            hash = %signed.hash,
            gas_wanted = fee.gas_wanted,
            fee = %format!("{}{}", fee.amount, fee.denom),
            "Broadcasting transaction"
        );
        let outcome = self.service.broadcast(signed.tx_bytes).await?;
        Ok((state.sequence, outcome))
    }
}

/// `ErrWrongSequence` in the SDK's root codespace
const WRONG_SEQUENCE_CODE: u32 = 32;

/// The node rejected our sequence; the cached value can no longer be trusted
fn is_sequence_mismatch(error: &Error) -> bool {
    match error {
        Error::Simulation(msg) => msg.contains("account sequence mismatch"),
        _ => false,
    }
}

impl std::fmt::Debug for TxPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxPipeline")
            .field("wallet", &self.wallet)
            .field("chain_id", &self.chain.chain_id)
            .field("simulator", &self.simulator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::AccountInfo;
    use crate::config::{KeyStyle, Network};
    use crate::tx::envelope::tx_hash;
    use async_trait::async_trait;
    use cosmrs::proto::cosmos::tx::v1beta1::{AuthInfo, TxRaw};
    use cosmrs::proto::prost::Message;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::NamedTempFile;

    pub(crate) const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    pub(crate) struct FakeAccounts {
        pub sequence: AtomicU64,
    }

    impl FakeAccounts {
        pub fn new() -> Self {
            Self {
                sequence: AtomicU64::new(3),
            }
        }
    }

    #[async_trait]
    impl AccountSource for FakeAccounts {
        async fn account(&self, _address: &str) -> Result<AccountInfo> {
            Ok(AccountInfo {
                account_number: 42,
                sequence: self.sequence.load(Ordering::SeqCst),
            })
        }

        async fn latest_height(&self) -> Result<u64> {
            Ok(1_000)
        }
    }

    /// Records every call; simulation can be made to fail, broadcast returns a fixed code
    pub(crate) struct FakeTxService {
        pub simulate_error: Option<String>,
        pub gas_used: u64,
        pub code: u32,
        pub raw_log: String,
        pub simulated: StdMutex<Vec<Vec<u8>>>,
        pub broadcasts: StdMutex<Vec<Vec<u8>>>,
    }

    impl FakeTxService {
        pub fn accepting() -> Self {
            Self {
                simulate_error: None,
                gas_used: 100_000,
                code: 0,
                raw_log: String::new(),
                simulated: StdMutex::new(Vec::new()),
                broadcasts: StdMutex::new(Vec::new()),
            }
        }

        pub fn broadcast_count(&self) -> usize {
            self.broadcasts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TxService for FakeTxService {
        async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64> {
            self.simulated.lock().unwrap().push(tx_bytes);
            match &self.simulate_error {
                Some(msg) => Err(Error::Simulation(msg.clone())),
                None => Ok(self.gas_used),
            }
        }

        async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome> {
            let hash = tx_hash(&tx_bytes);
            self.broadcasts.lock().unwrap().push(tx_bytes);
            Ok(TxOutcome {
                hash,
                code: self.code,
                gas_wanted: 120_000,
                gas_used: self.gas_used,
                raw_log: self.raw_log.clone(),
                height: 1_001,
            })
        }
    }

    pub(crate) fn wallet() -> Arc<SecureWallet> {
        Arc::new(SecureWallet::from_mnemonic(TEST_MNEMONIC, KeyStyle::Ethereum, "inj").unwrap())
    }

    pub(crate) fn pipeline(service: Arc<FakeTxService>) -> TxPipeline {
        pipeline_with(Arc::new(FakeAccounts::new()), service)
    }

    pub(crate) fn pipeline_with(
        accounts: Arc<dyn AccountSource>,
        service: Arc<dyn TxService>,
    ) -> TxPipeline {
        TxPipeline::new(
            wallet(),
            Network::InjectiveTestnet.chain_config(),
            accounts,
            service,
        )
        .unwrap()
    }

    /// Node whose REST view stays at the committed sequence while CheckTx state
    /// advances with every accepted broadcast
    pub(crate) struct CheckStateNode {
        committed_sequence: u64,
        pub check_sequence: AtomicU64,
        pub events: StdMutex<Vec<&'static str>>,
        in_flight: AtomicU64,
        pub max_in_flight: AtomicU64,
        broadcast_sequences: StdMutex<Vec<u64>>,
    }

    impl CheckStateNode {
        pub fn new(sequence: u64) -> Self {
            Self {
                committed_sequence: sequence,
                check_sequence: AtomicU64::new(sequence),
                events: StdMutex::new(Vec::new()),
                in_flight: AtomicU64::new(0),
                max_in_flight: AtomicU64::new(0),
                broadcast_sequences: StdMutex::new(Vec::new()),
            }
        }

        pub fn broadcast_sequences(&self) -> Vec<u64> {
            self.broadcast_sequences.lock().unwrap().clone()
        }

        fn check_sequence(&self, tx_bytes: &[u8]) -> Result<u64> {
            let raw = TxRaw::decode(tx_bytes).unwrap();
            let auth = AuthInfo::decode(raw.auth_info_bytes.as_slice()).unwrap();
            let got = auth.signer_infos[0].sequence;
            let expected = self.check_sequence.load(Ordering::SeqCst);
            if got != expected {
                return Err(Error::Simulation(format!(
                    "account sequence mismatch, expected {}, got {}",
                    expected, got
                )));
            }
            Ok(got)
        }

        fn leave(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AccountSource for CheckStateNode {
        async fn account(&self, _address: &str) -> Result<AccountInfo> {
            self.events.lock().unwrap().push("account");
            let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(AccountInfo {
                account_number: 42,
                sequence: self.committed_sequence,
            })
        }

        async fn latest_height(&self) -> Result<u64> {
            Ok(1_000)
        }
    }

    #[async_trait]
    impl TxService for CheckStateNode {
        async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64> {
            self.events.lock().unwrap().push("simulate");
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            if let Err(e) = self.check_sequence(&tx_bytes) {
                self.leave();
                return Err(e);
            }
            Ok(100_000)
        }

        async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<TxOutcome> {
            self.events.lock().unwrap().push("broadcast");
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            let sequence = self.check_sequence(&tx_bytes);
            self.leave();
            let sequence = sequence?;
            self.check_sequence.fetch_add(1, Ordering::SeqCst);
            self.broadcast_sequences.lock().unwrap().push(sequence);
            Ok(TxOutcome {
                hash: tx_hash(&tx_bytes),
                code: 0,
                gas_wanted: 120_000,
                gas_used: 100_000,
                raw_log: String::new(),
                height: 0,
            })
        }
    }

    fn message() -> Any {
        Any {
            type_url: "/cosmwasm.wasm.v1.MsgExecuteContract".to_string(),
            value: b"msg".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_failed_simulation_never_broadcasts() {
        let service = Arc::new(FakeTxService {
            simulate_error: Some("execute wasm contract failed".to_string()),
            ..FakeTxService::accepting()
        });
        let pipeline = pipeline(service.clone());

        let err = pipeline
            .sign_and_broadcast(vec![message()], "")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Simulation(_)));
        assert_eq!(service.simulated.lock().unwrap().len(), 1);
        assert_eq!(service.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_carries_simulated_fee() {
        let service = Arc::new(FakeTxService::accepting());
        let pipeline = pipeline(service.clone());

        let outcome = pipeline.execute(vec![message()], "memo").await.unwrap();
        assert!(outcome.success());

        let broadcasts = service.broadcasts.lock().unwrap();
        let raw = TxRaw::decode(broadcasts[0].as_slice()).unwrap();
        let auth = AuthInfo::decode(raw.auth_info_bytes.as_slice()).unwrap();
        let fee = auth.fee.unwrap();

        // 1.2 * 100_000 gas at 500000000inj
        assert_eq!(fee.gas_limit, 120_000);
        assert_eq!(fee.amount[0].amount, "60000000000000");
        assert_eq!(fee.amount[0].denom, "inj");
        assert_eq!(auth.signer_infos[0].sequence, 3);
        assert_eq!(raw.signatures[0].len(), 64);
        assert_eq!(outcome.hash, tx_hash(&broadcasts[0]));
    }

    #[tokio::test]
    async fn test_simulated_and_broadcast_envelopes_differ() {
        let service = Arc::new(FakeTxService::accepting());
        let pipeline = pipeline(service.clone());
        pipeline.execute(vec![message()], "").await.unwrap();

        let simulated = TxRaw::decode(service.simulated.lock().unwrap()[0].as_slice()).unwrap();
        let broadcast = TxRaw::decode(service.broadcasts.lock().unwrap()[0].as_slice()).unwrap();

        assert_eq!(simulated.body_bytes, broadcast.body_bytes);
        assert_ne!(simulated.auth_info_bytes, broadcast.auth_info_bytes);
        // the throwaway signature is not reused
        assert_ne!(simulated.signatures, broadcast.signatures);
    }

    #[tokio::test]
    async fn test_execute_maps_rejection() {
        let service = Arc::new(FakeTxService {
            code: 5,
            raw_log: "insufficient funds".to_string(),
            ..FakeTxService::accepting()
        });
        let pipeline = pipeline(service.clone());

        // the raw outcome is returned as-is
        let outcome = pipeline.sign_and_broadcast(vec![message()], "").await.unwrap();
        assert_eq!(outcome.code, 5);

        let err = pipeline.execute(vec![message()], "").await.unwrap_err();
        assert!(matches!(err, Error::ChainRejection { code: 5, .. }));
    }

    #[tokio::test]
    async fn test_empty_message_list_rejected() {
        let service = Arc::new(FakeTxService::accepting());
        let pipeline = pipeline(service.clone());
        let err = pipeline.sign_and_broadcast(vec![], "").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(service.simulated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_attempts_are_serialized() {
        let node = Arc::new(CheckStateNode::new(3));
        let pipeline = Arc::new(pipeline_with(node.clone(), node.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.execute(vec![message()], "").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(node.max_in_flight.load(Ordering::SeqCst), 1);
        // every account read happens after the previous broadcast
        let events = node.events.lock().unwrap().clone();
        assert_eq!(events.len(), 12);
        for chunk in events.chunks(3) {
            assert_eq!(chunk, ["account", "simulate", "broadcast"]);
        }
        assert_eq!(node.broadcast_sequences(), vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_sequential_attempts_advance_past_committed_sequence() {
        // the REST account endpoint keeps serving 3 while the mempool moves on
        let node = Arc::new(CheckStateNode::new(3));
        let pipeline = pipeline_with(node.clone(), node.clone());

        for _ in 0..3 {
            pipeline.execute(vec![message()], "").await.unwrap();
        }
        assert_eq!(node.broadcast_sequences(), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_sequence_mismatch_drops_cached_sequence() {
        let node = Arc::new(CheckStateNode::new(3));
        let pipeline = pipeline_with(node.clone(), node.clone());
        pipeline.execute(vec![message()], "").await.unwrap();

        // the pending tx is evicted; check state falls back to the committed sequence
        node.check_sequence.store(3, Ordering::SeqCst);

        let err = pipeline.execute(vec![message()], "").await.unwrap_err();
        assert!(matches!(err, Error::Simulation(ref msg) if msg.contains("sequence mismatch")));

        pipeline.execute(vec![message()], "").await.unwrap();
        assert_eq!(node.broadcast_sequences(), vec![3, 3]);
    }

    #[tokio::test]
    async fn test_rejected_broadcast_keeps_sequence() {
        let service = Arc::new(FakeTxService {
            code: 5,
            raw_log: "insufficient funds".to_string(),
            ..FakeTxService::accepting()
        });
        let pipeline = pipeline(service.clone());
        let _ = pipeline.execute(vec![message()], "").await;
        let _ = pipeline.execute(vec![message()], "").await;

        let broadcasts = service.broadcasts.lock().unwrap();
        for tx in broadcasts.iter() {
            let raw = TxRaw::decode(tx.as_slice()).unwrap();
            let auth = AuthInfo::decode(raw.auth_info_bytes.as_slice()).unwrap();
            assert_eq!(auth.signer_infos[0].sequence, 3);
        }
    }

    #[tokio::test]
    async fn test_attempts_are_audited() {
        let temp_file = NamedTempFile::new().unwrap();
        let service = Arc::new(FakeTxService {
            simulate_error: Some("out of gas".to_string()),
            ..FakeTxService::accepting()
        });
        let pipeline = pipeline(service).with_audit_log(AuditLog::new(temp_file.path()));

        let _ = pipeline.execute(vec![message()], "swap").await;

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("tx_attempt_start"));
        assert!(content.contains("tx_attempt_complete"));
        assert!(content.contains("\"status\":\"error\""));
        assert!(content.contains("out of gas"));
    }
}
