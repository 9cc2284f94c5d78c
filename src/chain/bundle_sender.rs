// Relay bundle submission with independent tip confirmation.
//
// Wraps the signed swap transactions together with a tip payment into one
// bundle, posts it to a block-engine endpoint chosen round-robin, then polls
// the chain for the tip signature. The relay gives no synchronous guarantee
// that a bundle lands, so an HTTP 200 is never treated as success and the
// tip signature is confirmed against the blockhash validity window instead.
// This boundary reports failures, it never raises them.

use rand::Rng;
use serde::Deserialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::chain::constants::JITO_TIP_ACCOUNTS;
use crate::config::RelayConfig;
use crate::error::{BotError, BotResult};

const RELAY_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONFIRM_POLL_INTERVAL_MS: u64 = 400;

/// Outcome of one bundle submission attempt.
#[derive(Debug, Clone)]
pub struct BundleOutcome {
    pub confirmed: bool,
    pub tip_signature: Option<Signature>,
    pub bundle_id: Option<String>,
}

impl BundleOutcome {
    fn failed() -> Self {
        Self {
            confirmed: false,
            tip_signature: None,
            bundle_id: None,
        }
    }
}

/// `sendBundle` JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RelayResponse {
    result: Option<String>,
    error: Option<RelayError>,
}

#[derive(Debug, Deserialize)]
struct RelayError {
    code: i64,
    message: String,
}

/// Relay endpoint for a given submission counter: plain round-robin so
/// consecutive submissions spread evenly across the endpoint list.
pub fn endpoint_index(sequence: u64, endpoint_count: usize) -> usize {
    if endpoint_count == 0 {
        return 0;
    }
    (sequence % endpoint_count as u64) as usize
}

/// Serialize every transaction to base58 in bundle order.
pub fn encode_bundle(transactions: &[VersionedTransaction]) -> BotResult<Vec<String>> {
    transactions
        .iter()
        .map(|tx| {
            let bytes = bincode::serialize(tx).map_err(|e| {
                BotError::InvalidConfiguration(format!("transaction encoding failed: {}", e))
            })?;
            Ok(bs58::encode(bytes).into_string())
        })
        .collect()
}

fn pick_tip_account() -> Pubkey {
    let index = rand::thread_rng().gen_range(0..JITO_TIP_ACCOUNTS.len());
    JITO_TIP_ACCOUNTS[index]
}

pub struct BundleSender {
    rpc_client: Arc<RpcClient>,
    http_client: reqwest::Client,
    endpoints: Vec<String>,
    tip_lamports: u64,
    confirm_timeout: Duration,
}

impl BundleSender {
    pub fn new(rpc_client: Arc<RpcClient>, config: &RelayConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(RELAY_REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        info!(
            "Initialized BundleSender with {} relay endpoints, tip={} lamports",
            config.endpoints.len(),
            config.tip_lamports
        );
        Self {
            rpc_client,
            http_client,
            endpoints: config.endpoints.clone(),
            tip_lamports: config.tip_lamports,
            confirm_timeout: config.confirm_timeout(),
        }
    }

    /// Submit `transactions` as one bundle behind a freshly signed tip
    /// payment, then confirm the tip on-chain. Always returns an outcome;
    /// relay or network failures surface as `confirmed: false`.
    pub async fn submit(
        &self,
        transactions: &[VersionedTransaction],
        payer: &Keypair,
        sequence: u64,
    ) -> BundleOutcome {
        if transactions.is_empty() {
            warn!("Bundle submission skipped: no transactions to send");
            return BundleOutcome::failed();
        }
        if self.endpoints.is_empty() {
            warn!("Bundle submission skipped: no relay endpoints configured");
            return BundleOutcome::failed();
        }

        // one blockhash serves both the tip transaction and the expiry check
        // in the confirmation loop
        let (blockhash, last_valid_block_height) = match self
            .rpc_client
            .get_latest_blockhash_with_commitment(self.rpc_client.commitment())
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!("Bundle submission aborted: blockhash fetch failed: {}", e);
                return BundleOutcome::failed();
            }
        };

        let tip_account = pick_tip_account();
        let tip_ix =
            system_instruction::transfer(&payer.pubkey(), &tip_account, self.tip_lamports);
        let message = Message::new_with_blockhash(&[tip_ix], Some(&payer.pubkey()), &blockhash);
        let tip_tx = match VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[payer])
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Bundle submission aborted: tip signing failed: {}", e);
                return BundleOutcome::failed();
            }
        };
        let tip_signature = tip_tx.signatures[0];

        // tip first, then the payload in caller order
        let mut bundle = Vec::with_capacity(transactions.len() + 1);
        bundle.push(tip_tx);
        bundle.extend_from_slice(transactions);

        let encoded = match encode_bundle(&bundle) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Bundle submission aborted: {}", e);
                return BundleOutcome::failed();
            }
        };

        let endpoint = &self.endpoints[endpoint_index(sequence, self.endpoints.len())];
        let bundle_id = match self.post_bundle(endpoint, &encoded).await {
            Ok(id) => id,
            Err(e) => {
                // bundles only reach the chain through the relay, so a failed
                // post means this one is not landing
                warn!("Bundle submission to {} failed: {}", endpoint, e);
                return BundleOutcome {
                    confirmed: false,
                    tip_signature: Some(tip_signature),
                    bundle_id: None,
                };
            }
        };
        debug!(
            "Bundle {} accepted by {}, awaiting tip {} confirmation",
            bundle_id, endpoint, tip_signature
        );

        let confirmed = match self
            .confirm_tip(&tip_signature, last_valid_block_height)
            .await
        {
            Ok(confirmed) => confirmed,
            Err(e) => {
                warn!("Tip confirmation gave up: {}", e);
                false
            }
        };
        if confirmed {
            info!("✅ Bundle {} landed, tip {} confirmed", bundle_id, tip_signature);
        } else {
            warn!("Bundle {} not confirmed within its window", bundle_id);
        }

        BundleOutcome {
            confirmed,
            tip_signature: Some(tip_signature),
            bundle_id: Some(bundle_id),
        }
    }

    async fn post_bundle(&self, endpoint: &str, encoded: &[String]) -> BotResult<String> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [encoded],
        });

        let response = self
            .http_client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Transport(format!("relay request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| BotError::Transport(format!("relay rejected request: {}", e)))?;

        let payload: RelayResponse = response
            .json()
            .await
            .map_err(|e| BotError::Transport(format!("relay response unreadable: {}", e)))?;
        if let Some(err) = payload.error {
            return Err(BotError::Transport(format!(
                "relay error {}: {}",
                err.code, err.message
            )));
        }
        payload
            .result
            .ok_or_else(|| BotError::Transport("relay response missing bundle id".to_string()))
    }

    /// Poll the tip signature until it confirms, errors, or can no longer
    /// land because the chain moved past the blockhash validity window.
    async fn confirm_tip(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
    ) -> BotResult<bool> {
        let outcome = tokio::time::timeout(self.confirm_timeout, async {
            loop {
                match self.rpc_client.get_signature_statuses(&[*signature]).await {
                    Ok(response) => {
                        if let Some(Some(status)) = response.value.first() {
                            if status.err.is_some() {
                                warn!("Tip {} landed with an error: {:?}", signature, status.err);
                                return false;
                            }
                            if matches!(
                                status.confirmation_status,
                                Some(TransactionConfirmationStatus::Confirmed)
                                    | Some(TransactionConfirmationStatus::Finalized)
                            ) {
                                return true;
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Error checking tip status: {}", e);
                    }
                }

                match self.rpc_client.get_block_height().await {
                    Ok(height) if height > last_valid_block_height => {
                        warn!(
                            "Tip {} expired: block height {} past {}",
                            signature, height, last_valid_block_height
                        );
                        return false;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Error checking block height: {}", e);
                    }
                }

                sleep(Duration::from_millis(CONFIRM_POLL_INTERVAL_MS)).await;
            }
        })
        .await;

        match outcome {
            Ok(confirmed) => Ok(confirmed),
            Err(_) => Err(BotError::ConfirmationTimeout(*signature)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;

    fn signed_transfer(lamports: u64) -> VersionedTransaction {
        let from = Keypair::new();
        let to = Pubkey::new_unique();
        let ix = system_instruction::transfer(&from.pubkey(), &to, lamports);
        let message = Message::new_with_blockhash(&[ix], Some(&from.pubkey()), &Hash::default());
        VersionedTransaction::try_new(VersionedMessage::Legacy(message), &[&from]).unwrap()
    }

    fn offline_sender() -> BundleSender {
        let config = RelayConfig {
            endpoints: vec!["http://127.0.0.1:1/api/v1/bundles".to_string()],
            tip_lamports: 1_000,
            confirm_timeout_ms: 500,
        };
        BundleSender::new(
            Arc::new(RpcClient::new("http://127.0.0.1:1".to_string())),
            &config,
        )
    }

    #[test]
    fn test_endpoint_round_robin_visits_each_once() {
        let count = 5;
        let mut visited = vec![0u32; count];
        for sequence in 0..count as u64 {
            visited[endpoint_index(sequence, count)] += 1;
        }
        assert!(visited.iter().all(|&n| n == 1));

        // wraps back to the first endpoint
        assert_eq!(endpoint_index(count as u64, count), 0);
        // degenerate list never panics
        assert_eq!(endpoint_index(7, 0), 0);
    }

    #[test]
    fn test_relay_response_shapes() {
        let ok: RelayResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":"abc123","id":1}"#).unwrap();
        assert_eq!(ok.result.as_deref(), Some("abc123"));
        assert!(ok.error.is_none());

        let err: RelayResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"invalid params"},"id":1}"#,
        )
        .unwrap();
        assert!(err.result.is_none());
        let detail = err.error.unwrap();
        assert_eq!(detail.code, -32602);
        assert_eq!(detail.message, "invalid params");
    }

    #[test]
    fn test_encode_bundle_preserves_order() {
        let first = signed_transfer(100);
        let second = signed_transfer(200);
        let first_sig = first.signatures[0];

        let encoded = encode_bundle(&[first, second]).unwrap();
        assert_eq!(encoded.len(), 2);

        let bytes = bs58::decode(&encoded[0]).into_vec().unwrap();
        let decoded: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.signatures[0], first_sig);
    }

    #[tokio::test]
    async fn test_submit_empty_bundle_returns_unconfirmed() {
        let sender = offline_sender();
        let payer = Keypair::new();

        let outcome = sender.submit(&[], &payer, 0).await;
        assert!(!outcome.confirmed);
        assert!(outcome.tip_signature.is_none());
        assert!(outcome.bundle_id.is_none());
    }

    #[tokio::test]
    async fn test_submit_unreachable_rpc_returns_unconfirmed() {
        let sender = offline_sender();
        let payer = Keypair::new();
        let tx = signed_transfer(500);

        // blockhash fetch fails against the dead endpoint; submit must
        // still hand back an outcome instead of raising
        let outcome = sender.submit(&[tx], &payer, 3).await;
        assert!(!outcome.confirmed);
    }
}
