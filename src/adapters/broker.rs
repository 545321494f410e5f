//! Kafka data plane client
//!
//! Speaks just enough of the Kafka wire protocol to authenticate with
//! SASL/OAUTHBEARER over TLS and issue a CreateAcls batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use kafka_protocol::messages::create_acls_request::AclCreation;
use kafka_protocol::messages::{
    CreateAclsRequest, CreateAclsResponse, RequestHeader, ResponseHeader, SaslAuthenticateRequest,
    SaslAuthenticateResponse, SaslHandshakeRequest, SaslHandshakeResponse,
};
use kafka_protocol::protocol::{Decodable, Encodable, HeaderVersion, StrBytes};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{AclRule, GrantOutcome, GrantRejection};

use super::iam_token::oauthbearer_client_response;
use super::tls::{server_name, split_host_port, tls_connector};
use super::{BrokerAuthClient, BrokerSession, TokenProvider};

const SASL_HANDSHAKE_KEY: i16 = 17;
const SASL_HANDSHAKE_VERSION: i16 = 1;
const SASL_AUTHENTICATE_KEY: i16 = 36;
const SASL_AUTHENTICATE_VERSION: i16 = 1;
const CREATE_ACLS_KEY: i16 = 30;
const CREATE_ACLS_VERSION: i16 = 1;

const OAUTHBEARER: &str = "OAUTHBEARER";

/// Largest response frame accepted from a broker
const MAX_FRAME_BYTES: i32 = 16 * 1024 * 1024;

/// Broker client authenticating with MSK IAM over TLS
pub struct KafkaBrokerClient {
    tokens: Arc<dyn TokenProvider>,
    client_id: String,
    timeout: Duration,
}

impl KafkaBrokerClient {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        client_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            client_id: client_id.into(),
            timeout,
        }
    }

    async fn connect_one(&self, address: &str) -> Result<KafkaSession<TlsStream<TcpStream>>> {
        let (host, port) = split_host_port(address)?;
        let connector = tls_connector()?;
        let name = server_name(host)?;

        let tcp = with_timeout(self.timeout, address, TcpStream::connect((host, port))).await?;
        let stream = with_timeout(self.timeout, address, connector.connect(name, tcp)).await?;

        let mut session = KafkaSession::new(stream, address, &self.client_id, self.timeout);
        // A fresh token per connection attempt
        let token = self.tokens.token().await?;
        session.authenticate(&token).await?;
        Ok(session)
    }
}

#[async_trait]
impl BrokerAuthClient for KafkaBrokerClient {
    async fn connect(&self, targets: &[String]) -> Result<Box<dyn BrokerSession>> {
        let mut last_error = None;
        for address in targets {
            match self.connect_one(address).await {
                Ok(session) => {
                    info!(broker = %address, "Authenticated with broker");
                    return Ok(Box::new(session));
                }
                Err(e) => {
                    warn!(broker = %address, error = %e, "Broker connection failed, trying next");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::data_plane("No broker addresses to connect to")))
    }
}

/// Connection to one broker, authenticated once `authenticate` succeeds
struct KafkaSession<S> {
    stream: S,
    address: String,
    client_id: StrBytes,
    correlation_id: i32,
    timeout: Duration,
}

impl<S> KafkaSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn new(stream: S, address: &str, client_id: &str, timeout: Duration) -> Self {
        Self {
            stream,
            address: address.to_string(),
            client_id: StrBytes::from_string(client_id.to_string()),
            correlation_id: 0,
            timeout,
        }
    }

    async fn authenticate(&mut self, token: &str) -> Result<()> {
        let handshake: SaslHandshakeResponse = self
            .round_trip(
                SASL_HANDSHAKE_KEY,
                SASL_HANDSHAKE_VERSION,
                &SaslHandshakeRequest::default()
                    .with_mechanism(StrBytes::from_static_str(OAUTHBEARER)),
            )
            .await?;
        if handshake.error_code != 0 {
            let offered: Vec<String> =
                handshake.mechanisms.iter().map(|m| m.to_string()).collect();
            return Err(Error::data_plane(format!(
                "Broker {} rejected SASL mechanism {}: {} (offered: {})",
                self.address,
                OAUTHBEARER,
                error_code_name(handshake.error_code),
                offered.join(", ")
            )));
        }

        let auth: SaslAuthenticateResponse = self
            .round_trip(
                SASL_AUTHENTICATE_KEY,
                SASL_AUTHENTICATE_VERSION,
                &SaslAuthenticateRequest::default()
                    .with_auth_bytes(Bytes::from(oauthbearer_client_response(token))),
            )
            .await?;
        if auth.error_code != 0 {
            return Err(Error::data_plane(format!(
                "SASL authentication with {} failed: {}{}",
                self.address,
                error_code_name(auth.error_code),
                auth.error_message
                    .as_ref()
                    .filter(|m| !m.is_empty())
                    .map(|m| format!(" ({})", m.to_string()))
                    .unwrap_or_default()
            )));
        }

        debug!(
            broker = %self.address,
            session_lifetime_ms = auth.session_lifetime_ms,
            "SASL authentication succeeded"
        );
        Ok(())
    }

    async fn round_trip<Req, Resp>(
        &mut self,
        api_key: i16,
        version: i16,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Encodable + HeaderVersion,
        Resp: Decodable + HeaderVersion,
    {
        self.correlation_id += 1;
        let correlation_id = self.correlation_id;

        let header = RequestHeader::default()
            .with_request_api_key(api_key)
            .with_request_api_version(version)
            .with_correlation_id(correlation_id)
            .with_client_id(Some(self.client_id.clone()));

        let mut body = BytesMut::new();
        header
            .encode(&mut body, Req::header_version(version))
            .map_err(|e| Error::data_plane(format!("Failed to encode request header: {}", e)))?;
        request.encode(&mut body, version).map_err(|e| {
            Error::data_plane(format!(
                "Failed to encode request (api key {}): {}",
                api_key, e
            ))
        })?;

        let mut frame = BytesMut::with_capacity(body.len() + 4);
        frame.put_i32(body.len() as i32);
        frame.extend_from_slice(&body);

        let address = self.address.clone();
        let timeout = self.timeout;
        let mut response = with_timeout(timeout, &address, async {
            self.stream.write_all(&frame).await?;
            self.stream.flush().await?;
            read_frame(&mut self.stream).await
        })
        .await?;

        let response_header = ResponseHeader::decode(&mut response, Resp::header_version(version))
            .map_err(|e| Error::data_plane(format!("Failed to decode response header: {}", e)))?;
        if response_header.correlation_id != correlation_id {
            return Err(Error::data_plane(format!(
                "Broker {} answered correlation id {} to request {}",
                self.address, response_header.correlation_id, correlation_id
            )));
        }

        Resp::decode(&mut response, version).map_err(|e| {
            Error::data_plane(format!(
                "Failed to decode response (api key {}): {}",
                api_key, e
            ))
        })
    }
}

#[async_trait]
impl<S> BrokerSession for KafkaSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn create_acls(&mut self, rules: &[AclRule]) -> Result<Vec<GrantOutcome>> {
        let creations: Vec<AclCreation> = rules.iter().map(to_acl_creation).collect();
        let request = CreateAclsRequest::default().with_creations(creations);

        let response: CreateAclsResponse = self
            .round_trip(CREATE_ACLS_KEY, CREATE_ACLS_VERSION, &request)
            .await?;

        Ok(response
            .results
            .iter()
            .map(|result| {
                if result.error_code == 0 {
                    Ok(())
                } else {
                    Err(GrantRejection {
                        error_code: result.error_code,
                        message: result
                            .error_message
                            .as_ref()
                            .map(|m| m.to_string())
                            .filter(|m| !m.is_empty())
                            .unwrap_or_else(|| error_code_name(result.error_code).to_string()),
                    })
                }
            })
            .collect())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        debug!(broker = %self.address, "Closing broker connection");
        let address = self.address.clone();
        with_timeout(self.timeout, &address, self.stream.shutdown()).await
    }
}

fn to_acl_creation(rule: &AclRule) -> AclCreation {
    AclCreation::default()
        .with_resource_type(rule.resource_type.code())
        .with_resource_name(StrBytes::from_string(rule.resource_name.clone()))
        .with_resource_pattern_type(rule.pattern_type.code())
        .with_principal(StrBytes::from_string(rule.principal.clone()))
        .with_host(StrBytes::from_string(rule.host.clone()))
        .with_operation(rule.operation.code())
        .with_permission_type(rule.permission.code())
}

/// Read one size-prefixed response frame
async fn read_frame<S>(stream: &mut S) -> std::io::Result<Bytes>
where
    S: AsyncRead + Unpin,
{
    let len = stream.read_i32().await?;
    if !(0..=MAX_FRAME_BYTES).contains(&len) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid response frame length {}", len),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

async fn with_timeout<T, F>(timeout: Duration, address: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::data_plane(format!("I/O error with broker {}: {}", address, e))),
        Err(_) => Err(Error::data_plane(format!(
            "Broker {} did not respond within {:?}",
            address, timeout
        ))),
    }
}

/// Names for the error codes these requests can return
fn error_code_name(code: i16) -> &'static str {
    match code {
        0 => "NONE",
        29 => "TOPIC_AUTHORIZATION_FAILED",
        31 => "CLUSTER_AUTHORIZATION_FAILED",
        33 => "UNSUPPORTED_SASL_MECHANISM",
        34 => "ILLEGAL_SASL_STATE",
        35 => "UNSUPPORTED_VERSION",
        42 => "INVALID_REQUEST",
        54 => "SECURITY_DISABLED",
        58 => "SASL_AUTHENTICATION_FAILED",
        _ => "UNKNOWN_SERVER_ERROR",
    }
}
