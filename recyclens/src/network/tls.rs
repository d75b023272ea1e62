//! TLS client configuration for the Live API socket

use std::sync::Arc;

use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_tungstenite::Connector;
use tracing::{debug, warn};

use crate::network::error::{NetworkError, NetworkResult};

/// Build a connector that verifies the server against the OS trust store
///
/// # Errors
/// Returns `NetworkError::InvalidConfig` if no usable root certificate
/// could be loaded.
pub fn native_roots_connector() -> NetworkResult<Connector> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        warn!("Skipping unreadable system certificate: {}", err);
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    debug!(added, ignored, "Loaded system root certificates");

    if roots.is_empty() {
        return Err(NetworkError::InvalidConfig(
            "no system root certificates available".to_string(),
        ));
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Connector::Rustls(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_uses_rustls() {
        // CI containers may ship without a trust store
        match native_roots_connector() {
            Ok(connector) => assert!(matches!(connector, Connector::Rustls(_))),
            Err(e) => assert!(matches!(e, NetworkError::InvalidConfig(_))),
        }
    }
}
