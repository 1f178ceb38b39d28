//! Shared fixtures for the integration tests
//!
//! `FakeChain` plays the foreign-chain node: it serves deposit logs by
//! block range, answers sends from a script and mines accepted
//! transactions.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eth_minter::deposit::deposit_event_topic;
use eth_minter::signing::SignRequest;
use eth_minter::state::MinterEvent;
use eth_minter::storage::{StorageError, StorageResult};
use eth_minter::types::{keccak256, Address, HostIdentity, Wei, WEI_PER_GWEI};
use eth_minter::{
    EventStore, FeeEstimatorConfig, LocalKeySigner, MemoryEventStore, Minter, MinterInit,
    MinterSettings, RpcOutcome, RpcTransport, ScannerConfig, SigningError, SigningOrchestrator,
    StateHandle, ThresholdSigner,
};

pub const HELPER: &str = "0x907b6efc1a398fd88a8161b3ca02eec8eaf72ca1";
pub const DESTINATION: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

/// Answer to the next `eth_sendRawTransaction`
#[derive(Debug, Clone)]
pub enum SendScript {
    Accept,
    /// The transaction was already mined earlier
    NonceTooLowMined,
    /// The nonce was consumed by another transaction
    NonceTooLowUnknown,
    Reply(RpcOutcome<Value>),
}

#[derive(Default)]
struct ChainState {
    tip: u64,
    finalized: u64,
    logs: Vec<(u64, Value)>,
    send_script: VecDeque<SendScript>,
    /// Raw transactions in the order they were submitted
    submitted: Vec<String>,
    /// Transaction hash -> block it was mined in
    mined: HashMap<String, u64>,
    get_logs_ranges: Vec<(u64, u64)>,
    limit_exceeded_above: Option<u64>,
    offline: HashSet<String>,
}

/// Scripted foreign-chain node
pub struct FakeChain {
    inner: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new(tip: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ChainState {
                tip,
                ..ChainState::default()
            }),
        })
    }

    pub fn set_tip(&self, tip: u64) {
        self.inner.lock().unwrap().tip = tip;
    }

    pub fn set_finalized(&self, block: u64) {
        self.inner.lock().unwrap().finalized = block;
    }

    pub fn add_log(&self, log: Value) {
        let block = log["blockNumber"]
            .as_str()
            .and_then(|b| u64::from_str_radix(b.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);
        self.inner.lock().unwrap().logs.push((block, log));
    }

    pub fn script_send(&self, script: SendScript) {
        self.inner.lock().unwrap().send_script.push_back(script);
    }

    /// Fail `eth_getLogs` with a limit error for ranges wider than `blocks`
    pub fn limit_log_ranges(&self, blocks: u64) {
        self.inner.lock().unwrap().limit_exceeded_above = Some(blocks);
    }

    pub fn set_offline(&self, method: &str, offline: bool) {
        let mut inner = self.inner.lock().unwrap();
        if offline {
            inner.offline.insert(method.to_string());
        } else {
            inner.offline.remove(method);
        }
    }

    pub fn submitted(&self) -> Vec<String> {
        self.inner.lock().unwrap().submitted.clone()
    }

    pub fn get_logs_ranges(&self) -> Vec<(u64, u64)> {
        self.inner.lock().unwrap().get_logs_ranges.clone()
    }

    fn send(inner: &mut ChainState, raw: &str) -> RpcOutcome<Value> {
        inner.submitted.push(raw.to_string());
        let hash = raw_hash(raw);
        let tip = inner.tip;

        match inner.send_script.pop_front().unwrap_or(SendScript::Accept) {
            SendScript::Accept => {
                inner.mined.entry(hash.clone()).or_insert(tip);
                RpcOutcome::Result(Value::from(hash))
            }
            SendScript::NonceTooLowMined => {
                inner.mined.entry(hash).or_insert(tip);
                nonce_too_low()
            }
            SendScript::NonceTooLowUnknown => nonce_too_low(),
            SendScript::Reply(outcome) => outcome,
        }
    }
}

fn nonce_too_low() -> RpcOutcome<Value> {
    RpcOutcome::Error {
        code: -32000,
        message: "nonce too low".to_string(),
    }
}

fn hex_quantity(n: u128) -> String {
    format!("{:#x}", n)
}

fn param_block(value: &Value) -> u64 {
    value
        .as_str()
        .and_then(|b| u64::from_str_radix(b.trim_start_matches("0x"), 16).ok())
        .unwrap_or(0)
}

/// Transaction hash of a `0x`-prefixed raw transaction
pub fn raw_hash(raw: &str) -> String {
    let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap();
    format!("0x{}", hex::encode(keccak256(&bytes)))
}

pub fn fee_history() -> Value {
    let gwei = |n: u128| hex_quantity(n * WEI_PER_GWEI);
    json!({
        "oldestBlock": "0x64",
        "baseFeePerGas": [gwei(10), gwei(10), gwei(10), gwei(10), gwei(10), gwei(11)],
        "reward": [[gwei(1)], [gwei(1)], [gwei(2)], [gwei(2)], [gwei(2)]],
    })
}

#[async_trait]
impl RpcTransport for FakeChain {
    async fn call(&self, method: &str, params: Value) -> RpcOutcome<Value> {
        let mut inner = self.inner.lock().unwrap();

        if inner.offline.contains(method) {
            return RpcOutcome::TransportFailure(format!("{} offline", method));
        }

        match method {
            "eth_blockNumber" => RpcOutcome::Result(Value::from(hex_quantity(inner.tip as u128))),
            "eth_getBlockByNumber" => {
                let number = match params[0].as_str() {
                    Some("finalized") | Some("safe") => inner.finalized,
                    _ => inner.tip,
                };
                RpcOutcome::Result(json!({
                    "number": hex_quantity(number as u128),
                    "baseFeePerGas": hex_quantity(10 * WEI_PER_GWEI),
                }))
            }
            "eth_getLogs" => {
                let from = param_block(&params[0]["fromBlock"]);
                let to = param_block(&params[0]["toBlock"]);
                inner.get_logs_ranges.push((from, to));

                if let Some(limit) = inner.limit_exceeded_above {
                    if to - from + 1 > limit {
                        return RpcOutcome::Error {
                            code: -32005,
                            message: "query returned more than 10000 results".to_string(),
                        };
                    }
                }

                let logs: Vec<Value> = inner
                    .logs
                    .iter()
                    .filter(|(block, _)| (from..=to).contains(block))
                    .map(|(_, log)| log.clone())
                    .collect();
                RpcOutcome::Result(Value::from(logs))
            }
            "eth_feeHistory" => RpcOutcome::Result(fee_history()),
            "eth_sendRawTransaction" => {
                let raw = params[0].as_str().unwrap_or_default().to_string();
                Self::send(&mut inner, &raw)
            }
            "eth_getTransactionByHash" => {
                let hash = params[0].as_str().unwrap_or_default();
                match inner.mined.get(hash) {
                    Some(block) => RpcOutcome::Result(json!({
                        "hash": hash,
                        "nonce": "0x0",
                        "from": "0x0000000000000000000000000000000000000001",
                        "to": DESTINATION,
                        "value": "0x1",
                        "blockNumber": hex_quantity(*block as u128),
                    })),
                    None => RpcOutcome::Result(Value::Null),
                }
            }
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap_or_default();
                match inner.mined.get(hash) {
                    Some(block) => RpcOutcome::Result(json!({
                        "transactionHash": hash,
                        "blockNumber": hex_quantity(*block as u128),
                        "gasUsed": hex_quantity(21_000),
                        "effectiveGasPrice": hex_quantity(12 * WEI_PER_GWEI),
                        "status": "0x1",
                    })),
                    None => RpcOutcome::Result(Value::Null),
                }
            }
            "eth_getTransactionCount" => RpcOutcome::Result(Value::from("0x5")),
            _ => RpcOutcome::Error {
                code: -32601,
                message: format!("method {} not found", method),
            },
        }
    }
}

/// A `ReceivedEth` log emitted by the helper contract
pub fn deposit_log(tx: u8, log_index: u64, block: u64, beneficiary: &str, amount: Wei) -> Value {
    let sender = Address::new([0xaa; 20]).to_topic();
    let principal = HostIdentity::from_bytes(beneficiary.as_bytes())
        .unwrap()
        .to_topic();

    let mut data = [0u8; 32];
    data[16..].copy_from_slice(&amount.to_be_bytes());

    json!({
        "address": HELPER,
        "topics": [
            format!("0x{}", hex::encode(deposit_event_topic())),
            format!("0x{}", hex::encode(sender)),
            format!("0x{}", hex::encode(principal)),
        ],
        "data": format!("0x{}", hex::encode(data)),
        "blockNumber": hex_quantity(block as u128),
        "transactionHash": format!("0x{}", hex::encode([tx; 32])),
        "logIndex": hex_quantity(log_index as u128),
        "removed": false,
    })
}

pub fn identity(name: &str) -> HostIdentity {
    HostIdentity::from_bytes(name.as_bytes()).unwrap()
}

/// Signing service that is unavailable for its first `failures` requests
pub struct FlakySigner {
    inner: LocalKeySigner,
    failures: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl FlakySigner {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalKeySigner::generate("minter"),
            failures: AtomicUsize::new(failures),
            sign_calls: AtomicUsize::new(0),
        })
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThresholdSigner for FlakySigner {
    async fn public_key(&self, key_id: String) -> Result<Vec<u8>, SigningError> {
        self.inner.public_key(key_id).await
    }

    async fn sign(&self, request: SignRequest) -> Result<[u8; 64], SigningError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SigningError::Unavailable("quorum not reached".to_string()));
        }
        self.inner.sign(request).await
    }

    fn signer_type(&self) -> &'static str {
        "flaky"
    }
}

/// Audit log whose next appends fail
pub struct FailingStore {
    inner: MemoryEventStore,
    failures: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: MemoryEventStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures: AtomicUsize::new(0),
        })
    }

    pub fn fail_next(&self, appends: usize) {
        self.failures.store(appends, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventStore for FailingStore {
    async fn append(&self, events: &[MinterEvent]) -> StorageResult<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Database("disk I/O error".to_string()));
        }
        self.inner.append(events).await
    }

    async fn load(&self) -> StorageResult<Vec<MinterEvent>> {
        self.inner.load().await
    }

    async fn count(&self) -> StorageResult<u64> {
        self.inner.count().await
    }
}

pub fn init() -> MinterInit {
    MinterInit {
        key_id: "minter".to_string(),
        chain_id: 11_155_111,
        helper_contract: HELPER.parse().unwrap(),
        last_scraped_block: 100,
        first_sequence_number: 0,
    }
}

pub fn settings() -> MinterSettings {
    MinterSettings {
        poll_interval: Duration::from_millis(10),
        ..MinterSettings::default()
    }
}

/// A minter over `chain` together with its ledger and audit log
pub struct Harness {
    pub minter: Minter,
    pub state: Arc<StateHandle>,
    pub store: MemoryEventStore,
}

pub async fn harness(chain: Arc<FakeChain>, signer: Arc<dyn ThresholdSigner>) -> Harness {
    harness_with_store(chain, signer, MemoryEventStore::new()).await
}

pub async fn harness_with_store(
    chain: Arc<FakeChain>,
    signer: Arc<dyn ThresholdSigner>,
    store: MemoryEventStore,
) -> Harness {
    let event_store: Arc<dyn EventStore> = Arc::new(store.clone());
    harness_with(chain, signer, store, event_store, init(), settings()).await
}

/// `store` is the log contents, `event_store` the log the ledger writes through
pub async fn harness_with(
    chain: Arc<FakeChain>,
    signer: Arc<dyn ThresholdSigner>,
    store: MemoryEventStore,
    event_store: Arc<dyn EventStore>,
    init: MinterInit,
    settings: MinterSettings,
) -> Harness {
    let state = Arc::new(StateHandle::restore(init, event_store).await.unwrap());

    let minter = Minter::new(
        state.clone(),
        chain,
        Arc::new(SigningOrchestrator::new(signer, "minter")),
        ScannerConfig {
            confirmation_depth: 12,
            max_block_spread: 500,
        },
        FeeEstimatorConfig::default(),
        settings,
    );

    Harness {
        minter,
        state,
        store,
    }
}
