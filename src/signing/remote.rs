//! Remote Threshold Signer
//!
//! HTTP client for the signing service. The service owns the key shares; this
//! side only ever sees the public key and finished signatures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SignRequest, SigningError, ThresholdSigner};

/// Public key request
#[derive(Debug, Serialize)]
struct PublicKeyRequest<'a> {
    key_id: &'a str,
}

/// Public key response
#[derive(Debug, Deserialize)]
struct PublicKeyResponse {
    public_key: String,
}

/// Signing request body
#[derive(Debug, Serialize)]
struct SignBody<'a> {
    request_id: String,
    key_id: &'a str,
    digest: String,
}

/// Signing response
#[derive(Debug, Deserialize)]
struct SignResponse {
    signature: String,
}

/// Threshold signer reached over HTTP
pub struct RemoteSigner {
    base_url: String,
    http_client: reqwest::Client,
}

impl RemoteSigner {
    pub fn new(base_url: &str) -> Result<Self, SigningError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SigningError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, SigningError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SigningError::Unavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(SigningError::Rejected(format!("{}: {}", status, text)));
        }
        if !status.is_success() {
            return Err(SigningError::Unavailable(format!("{}: {}", url, status)));
        }

        response
            .json()
            .await
            .map_err(|e| SigningError::Unavailable(format!("undecodable response: {}", e)))
    }
}

#[async_trait]
impl ThresholdSigner for RemoteSigner {
    async fn public_key(&self, key_id: String) -> Result<Vec<u8>, SigningError> {
        let response: PublicKeyResponse = self
            .post("/public_key", &PublicKeyRequest { key_id: &key_id })
            .await?;

        hex::decode(response.public_key.trim_start_matches("0x"))
            .map_err(|e| SigningError::InvalidKey(e.to_string()))
    }

    async fn sign(&self, request: SignRequest) -> Result<[u8; 64], SigningError> {
        let body = SignBody {
            request_id: uuid::Uuid::new_v4().to_string(),
            key_id: &request.key_id,
            digest: hex::encode(request.digest),
        };

        tracing::debug!(request_id = %body.request_id, key_id = %request.key_id, "remote sign");

        let response: SignResponse = self.post("/sign", &body).await?;
        decode_signature(&response.signature)
    }

    fn signer_type(&self) -> &'static str {
        "remote-threshold"
    }
}

fn decode_signature(hex_sig: &str) -> Result<[u8; 64], SigningError> {
    let bytes = hex::decode(hex_sig.trim_start_matches("0x"))
        .map_err(|e| SigningError::Rejected(format!("invalid signature hex: {}", e)))?;

    if bytes.len() != 64 {
        return Err(SigningError::Rejected(format!(
            "signature must be 64 bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = [0u8; 64];
    out.copy_from_slice(&bytes);
    Ok(out)
}
