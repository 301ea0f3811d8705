//! # TLS
//!
//! rustls client configuration for peer and orderer connections.
//!
//! Server chains are checked by the standard WebPKI verifier against the
//! configured roots only. Every certificate in the presented chain must
//! then also be inside its validity window at handshake time.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::warn;

use crate::config::EndpointConfig;
use crate::domain::FabricError;

/// Build the client configuration for `config`, with ALPN `h2`.
pub fn client_config(config: &EndpointConfig) -> Result<Arc<ClientConfig>, FabricError> {
    let provider = Arc::new(ring::default_provider());
    let verifier = date_checking_verifier(config, provider.clone())?;

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FabricError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    let mut tls = match (config.client_cert_pem(), config.tls_client_key_pem.as_deref()) {
        (Some(cert_pem), Some(key_pem)) => builder
            .with_client_auth_cert(parse_certificates(cert_pem)?, parse_private_key(key_pem)?)
            .map_err(|e| FabricError::Tls(format!("invalid client credentials: {e}")))?,
        (Some(_), None) => {
            return Err(FabricError::Tls(
                "client certificate configured without a private key".to_string(),
            ))
        }
        _ => builder.with_no_client_auth(),
    };
    tls.alpn_protocols = vec![b"h2".to_vec()];

    Ok(Arc::new(tls))
}

fn date_checking_verifier(
    config: &EndpointConfig,
    provider: Arc<CryptoProvider>,
) -> Result<CertificateDateVerifier, FabricError> {
    let mut roots = RootCertStore::empty();
    for pem in &config.tls_ca_certs_pem {
        for cert in parse_certificates(pem)? {
            roots
                .add(cert)
                .map_err(|e| FabricError::Tls(format!("invalid root certificate: {e}")))?;
        }
    }
    if roots.is_empty() {
        return Err(FabricError::Tls(format!(
            "no root certificates configured for {}",
            config.url
        )));
    }

    let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
        .build()
        .map_err(|e| FabricError::Tls(e.to_string()))?;
    Ok(CertificateDateVerifier { inner })
}

/// DER of the first client certificate, when one is configured.
pub fn client_cert_der(config: &EndpointConfig) -> Result<Option<Vec<u8>>, FabricError> {
    match config.client_cert_pem() {
        Some(pem) => Ok(parse_certificates(pem)?
            .into_iter()
            .next()
            .map(|cert| cert.to_vec())),
        None => Ok(None),
    }
}

/// Name sent in SNI and checked against the server certificate.
pub fn server_name(config: &EndpointConfig) -> Result<ServerName<'static>, FabricError> {
    let name = config.tls_server_name();
    ServerName::try_from(name.clone())
        .map_err(|_| FabricError::Tls(format!("invalid server name [{name}]")))
}

fn parse_certificates(pem: &str) -> Result<Vec<CertificateDer<'static>>, FabricError> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FabricError::Tls(format!("failed to parse certificate PEM: {e}")))?;
    if certs.is_empty() {
        return Err(FabricError::Tls("no certificate found in PEM".to_string()));
    }
    Ok(certs)
}

fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>, FabricError> {
    rustls_pemfile::private_key(&mut pem.as_bytes())
        .map_err(|e| FabricError::Tls(format!("failed to parse private key PEM: {e}")))?
        .ok_or_else(|| FabricError::Tls("no private key found in PEM".to_string()))
}

/// Reject any certificate whose validity window does not contain `now`.
pub fn check_validity(certs: &[CertificateDer<'_>], now: UnixTime) -> Result<(), rustls::Error> {
    let now = now.as_secs() as i64;
    for der in certs {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| rustls::Error::General(format!("failed to parse certificate: {e}")))?;
        let validity = cert.validity();

        if now < validity.not_before.timestamp() {
            return Err(rustls::Error::General(format!(
                "certificate [{}] is not valid until later date",
                cert.subject()
            )));
        }
        if now > validity.not_after.timestamp() {
            return Err(rustls::Error::General(format!(
                "certificate [{}] has expired",
                cert.subject()
            )));
        }
    }
    Ok(())
}

/// WebPKI verification followed by a date check of the whole chain.
#[derive(Debug)]
struct CertificateDateVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for CertificateDateVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verified =
            self.inner
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;

        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());
        check_validity(&chain, now).map_err(|err| {
            warn!(server = ?server_name, error = %err, "server certificate rejected");
            err
        })?;

        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{date_time_ymd, BasicConstraints, Certificate, CertificateParams, IsCa, KeyPair};

    struct Issued {
        ca: Certificate,
        leaf: Certificate,
        leaf_key: KeyPair,
    }

    fn issue(not_before: (i32, u8, u8), not_after: (i32, u8, u8)) -> Issued {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let mut leaf_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        leaf_params.not_before = date_time_ymd(not_before.0, not_before.1, not_before.2);
        leaf_params.not_after = date_time_ymd(not_after.0, not_after.1, not_after.2);
        let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

        Issued { ca, leaf, leaf_key }
    }

    fn endpoint(ca_pem: String) -> EndpointConfig {
        EndpointConfig {
            tls_ca_certs_pem: vec![ca_pem],
            ..EndpointConfig::new("grpcs://localhost:7051")
        }
    }

    fn localhost() -> ServerName<'static> {
        ServerName::try_from("localhost").unwrap()
    }

    #[test]
    fn test_current_certificate_passes() {
        let issued = issue((2000, 1, 1), (4000, 1, 1));
        assert!(check_validity(&[issued.leaf.der().clone()], UnixTime::now()).is_ok());
    }

    #[test]
    fn test_future_certificate_rejected() {
        let issued = issue((3900, 1, 1), (4000, 1, 1));
        let err = check_validity(&[issued.leaf.der().clone()], UnixTime::now()).unwrap_err();
        assert!(err.to_string().contains("not valid until later date"));
    }

    #[test]
    fn test_expired_certificate_rejected() {
        let issued = issue((2000, 1, 1), (2001, 1, 1));
        let err = check_validity(&[issued.leaf.der().clone()], UnixTime::now()).unwrap_err();
        assert!(err.to_string().contains("has expired"));
    }

    #[test]
    fn test_verifier_accepts_chain_from_configured_root() {
        let issued = issue((2000, 1, 1), (4000, 1, 1));
        let config = endpoint(issued.ca.pem());
        let verifier = date_checking_verifier(&config, Arc::new(ring::default_provider())).unwrap();

        let verified = verifier.verify_server_cert(
            issued.leaf.der(),
            &[],
            &localhost(),
            &[],
            UnixTime::now(),
        );
        assert!(verified.is_ok());

        let tls = client_config(&config).unwrap();
        assert_eq!(tls.alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[test]
    fn test_verifier_rejects_unknown_root() {
        let trusted = issue((2000, 1, 1), (4000, 1, 1));
        let other = issue((2000, 1, 1), (4000, 1, 1));
        let verifier =
            date_checking_verifier(&endpoint(trusted.ca.pem()), Arc::new(ring::default_provider()))
                .unwrap();

        let verified = verifier.verify_server_cert(
            other.leaf.der(),
            &[],
            &localhost(),
            &[],
            UnixTime::now(),
        );
        assert!(verified.is_err());
    }

    #[test]
    fn test_no_roots_is_an_error() {
        let err = client_config(&EndpointConfig::new("grpcs://peer0:7051")).unwrap_err();
        assert!(matches!(err, FabricError::Tls(_)));
    }

    #[test]
    fn test_mutual_tls_credentials() {
        let issued = issue((2000, 1, 1), (4000, 1, 1));
        let config = EndpointConfig {
            tls_client_cert_pem: Some(issued.leaf.pem()),
            tls_client_key_pem: Some(issued.leaf_key.serialize_pem()),
            ..endpoint(issued.ca.pem())
        };

        let tls = client_config(&config).unwrap();
        assert!(tls.client_auth_cert_resolver.has_certs());
        assert_eq!(
            client_cert_der(&config).unwrap(),
            Some(issued.leaf.der().to_vec())
        );
    }

    #[test]
    fn test_certificate_without_key_rejected() {
        let issued = issue((2000, 1, 1), (4000, 1, 1));
        let config = EndpointConfig {
            tls_client_cert_pem: Some(issued.leaf.pem()),
            ..endpoint(issued.ca.pem())
        };
        assert!(matches!(client_config(&config), Err(FabricError::Tls(_))));
    }

    #[test]
    fn test_no_client_certificate_has_no_der() {
        let config = EndpointConfig::new("grpcs://peer0:7051");
        assert_eq!(client_cert_der(&config).unwrap(), None);
    }
}
