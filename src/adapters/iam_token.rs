//! MSK IAM bearer tokens for SASL/OAUTHBEARER

use async_trait::async_trait;
use aws_config::Region;
use aws_msk_iam_sasl_signer::generate_auth_token;
use tracing::debug;

use crate::error::{Error, Result};

use super::TokenProvider;

/// Signs MSK IAM tokens with the ambient AWS credential chain
///
/// Credentials are resolved on every call, so each connection attempt gets a
/// fresh token signed with whatever the provider chain currently returns.
#[derive(Clone, Debug)]
pub struct MskIamTokenProvider {
    region: Region,
}

impl MskIamTokenProvider {
    pub fn new(region: Region) -> Self {
        Self { region }
    }
}

#[async_trait]
impl TokenProvider for MskIamTokenProvider {
    async fn token(&self) -> Result<String> {
        let (token, expiration_ms) = generate_auth_token(self.region.clone())
            .await
            .map_err(|e| Error::data_plane(format!("Failed to sign MSK IAM token: {}", e)))?;

        debug!(expiration_ms = expiration_ms, "Generated MSK IAM auth token");
        Ok(token)
    }
}

/// Initial client response for SASL/OAUTHBEARER (RFC 7628)
pub fn oauthbearer_client_response(token: &str) -> Vec<u8> {
    format!("n,,\x01auth=Bearer {}\x01\x01", token).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauthbearer_client_response_framing() {
        let bytes = oauthbearer_client_response("abc.def");
        assert_eq!(bytes, b"n,,\x01auth=Bearer abc.def\x01\x01".to_vec());
    }
}
