//! Deposit Scanner
//!
//! Each cycle scans `(last_scraped_block, tip - confirmation_depth]` for
//! deposit logs in chunks of at most `max_block_spread` blocks. A chunk is
//! committed as one batch: every classification of the chunk plus the cursor
//! move. Overlapping cycles are skipped.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::parser::{classify_log, deposit_event_topic};
use crate::common::{log_deposit_event, MinterError};
use crate::rpc::{EthRpcClient, GetLogsParam, LogEntry};
use crate::state::{InvariantViolation, MinterEvent, StateHandle};
use crate::types::{Address, DepositClassification};

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Blocks below the tip that are never scanned
    pub confirmation_depth: u64,
    /// Largest block range per `eth_getLogs` request
    pub max_block_spread: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            confirmation_depth: 12,
            max_block_spread: 500,
        }
    }
}

/// Result of one scan cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Cursor before the cycle
    pub from_block: u64,
    /// Cursor after the cycle
    pub to_block: u64,
    pub chunks: usize,
    pub minted: usize,
    pub invalid: usize,
    /// Logs without identifiers or already classified
    pub skipped: usize,
}

impl ScanReport {
    pub fn has_activity(&self) -> bool {
        self.minted > 0 || self.invalid > 0 || self.skipped > 0
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blocks ({}, {}]: {} chunks, {} minted, {} invalid, {} skipped",
            self.from_block, self.to_block, self.chunks, self.minted, self.invalid, self.skipped
        )
    }
}

#[derive(Debug, Default)]
struct ChunkOutcome {
    minted: usize,
    invalid: usize,
    skipped: usize,
}

/// Deposit scanner
pub struct DepositScanner {
    client: EthRpcClient,
    state: Arc<StateHandle>,
    config: ScannerConfig,
    /// Held for the duration of a cycle
    cycle: Mutex<()>,
}

impl DepositScanner {
    pub fn new(client: EthRpcClient, state: Arc<StateHandle>, config: ScannerConfig) -> Self {
        Self {
            client,
            state,
            config,
            cycle: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Run one scan cycle
    ///
    /// Returns `Ok(None)` when another cycle is still running. On error the
    /// chunks committed before the failure stay committed.
    pub async fn scan(&self) -> Result<Option<ScanReport>, MinterError> {
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("deposit scan already running, skipping cycle");
                return Ok(None);
            }
        };

        let tip = self.client.block_number().await?;
        let safe_tip = tip.saturating_sub(self.config.confirmation_depth);

        let (cursor, helper_contract) = self
            .state
            .read(|s| (s.last_scraped_block(), s.helper_contract()))
            .await;

        let mut report = ScanReport {
            from_block: cursor,
            to_block: cursor,
            ..ScanReport::default()
        };

        let mut from = cursor.saturating_add(1);
        let mut spread = self.config.max_block_spread.max(1);

        while from <= safe_tip {
            let to = from.saturating_add(spread - 1).min(safe_tip);
            let filter = GetLogsParam {
                from_block: from,
                to_block: to,
                address: helper_contract,
                topic0: deposit_event_topic(),
            };

            let logs = match self.client.get_logs(&filter).await {
                Ok(logs) => logs,
                Err(e) if e.is_limit_exceeded() && to > from => {
                    spread = ((to - from + 1) / 2).max(1);
                    tracing::info!(
                        from_block = from,
                        to_block = to,
                        spread,
                        "log query too large, halving block range"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let outcome = self.commit_chunk(&helper_contract, from, to, &logs).await?;

            report.chunks += 1;
            report.minted += outcome.minted;
            report.invalid += outcome.invalid;
            report.skipped += outcome.skipped;
            report.to_block = to;
            from = to + 1;
        }

        Ok(Some(report))
    }

    /// Classify the logs of `[from, to]` and commit them with the cursor move
    async fn commit_chunk(
        &self,
        helper_contract: &Address,
        from: u64,
        to: u64,
        logs: &[LogEntry],
    ) -> Result<ChunkOutcome, MinterError> {
        let mut outcome = ChunkOutcome::default();

        let classifications: Vec<DepositClassification> = logs
            .iter()
            .filter_map(|log| {
                let classified = classify_log(log, helper_contract, from, to);
                if classified.is_none() {
                    outcome.skipped += 1;
                    tracing::warn!(
                        block_number = ?log.block_number,
                        transaction_hash = ?log.transaction_hash,
                        log_index = ?log.log_index,
                        "deposit log without transaction hash or log index, skipping"
                    );
                }
                classified
            })
            .collect();

        let accepted = self
            .state
            .commit_with(|state| {
                let cursor = state.last_scraped_block();
                if cursor != from - 1 {
                    return Err(MinterError::from(InvariantViolation::CursorRegression {
                        current: cursor,
                        proposed: to,
                    }));
                }

                let mut seen = HashSet::new();
                let mut events = Vec::with_capacity(classifications.len() + 1);
                let mut accepted = Vec::new();

                for classification in &classifications {
                    let source = *classification.source();
                    if state.is_classified(&source) || !seen.insert(source) {
                        continue;
                    }

                    events.push(match classification {
                        DepositClassification::Minted(minted) => {
                            MinterEvent::AcceptedDeposit(minted.clone())
                        }
                        DepositClassification::Invalid(invalid) => {
                            MinterEvent::InvalidDeposit(invalid.clone())
                        }
                    });
                    accepted.push(classification.clone());
                }

                events.push(MinterEvent::SyncedToBlock { block_number: to });
                Ok((events, accepted))
            })
            .await?;

        outcome.skipped += classifications.len() - accepted.len();

        for classification in &accepted {
            match classification {
                DepositClassification::Minted(minted) => {
                    outcome.minted += 1;
                    log_deposit_event(
                        "deposit_minted",
                        &minted.source.to_string(),
                        &minted.event.beneficiary.to_string(),
                        minted.event.amount,
                        Some(minted.block_number),
                        None,
                    );
                }
                DepositClassification::Invalid(invalid) => {
                    outcome.invalid += 1;
                    log_deposit_event(
                        "deposit_invalid",
                        &invalid.source.to_string(),
                        "",
                        0,
                        invalid.block_number,
                        Some(&invalid.reason.to_string()),
                    );
                }
            }
        }

        Ok(outcome)
    }
}
