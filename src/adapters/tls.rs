//! TLS setup for broker connections
//!
//! MSK brokers present certificates issued by Amazon Trust Services, so the
//! webpki root set is enough to verify them.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};

/// Build a TLS connector trusting the webpki roots
pub fn tls_connector() -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::data_plane(format!("Failed to configure TLS: {}", e)))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Split a `host:port` broker address
pub fn split_host_port(address: &str) -> Result<(&str, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| Error::data_plane(format!("Broker address '{}' has no port", address)))?;
    let port = port.parse::<u16>().map_err(|_| {
        Error::data_plane(format!("Broker address '{}' has an invalid port", address))
    })?;
    if host.is_empty() {
        return Err(Error::data_plane(format!(
            "Broker address '{}' has no host",
            address
        )));
    }
    Ok((host, port))
}

/// TLS server name for a broker host
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|e| Error::data_plane(format!("Invalid broker host name '{}': {}", host, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        let (host, port) =
            split_host_port("b-1-public.demo.abc123.c2.kafka.eu-west-1.amazonaws.com:9198")
                .unwrap();
        assert_eq!(host, "b-1-public.demo.abc123.c2.kafka.eu-west-1.amazonaws.com");
        assert_eq!(port, 9198);
    }

    #[test]
    fn test_split_host_port_rejects_malformed() {
        assert!(split_host_port("broker-without-port").is_err());
        assert!(split_host_port("broker:notaport").is_err());
        assert!(split_host_port(":9098").is_err());
    }

    #[test]
    fn test_server_name_and_connector() {
        assert!(server_name("b-1.demo.kafka.eu-west-1.amazonaws.com").is_ok());
        assert!(tls_connector().is_ok());
    }
}
