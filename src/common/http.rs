use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use tracing::{debug, warn};

/// Type alias for the pooled Hyper client shared by all sessions of a source.
pub type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// TLS checks requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsOptions {
    pub verify_certificate: bool,
    pub verify_host: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify_certificate: true,
            verify_host: true,
        }
    }
}

/// Build a Hyper client with HTTP/2, connection pooling and a TLS connector
/// that prefers native roots but falls back to the bundled WebPKI store.
///
/// Turning off either TLS check accepts any server certificate; rustls has
/// no way to check the chain while ignoring the host name.
pub fn build_hyper_client(tls: TlsOptions) -> Result<HyperClient> {
    let https_builder = if tls.verify_certificate && tls.verify_host {
        HttpsConnectorBuilder::new()
            .with_native_roots()
            .unwrap_or_else(|err| {
                debug!("falling back to webpki roots (native roots unavailable: {err})");
                HttpsConnectorBuilder::new().with_webpki_roots()
            })
    } else {
        warn!(
            verify_certificate = tls.verify_certificate,
            verify_host = tls.verify_host,
            "TLS certificate verification disabled"
        );
        HttpsConnectorBuilder::new().with_tls_config(unverified_tls_config()?)
    };

    let https = https_builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(Client::builder(TokioExecutor::new())
        .http2_adaptive_window(true)
        .pool_max_idle_per_host(16)
        .build::<_, Full<Bytes>>(https))
}

fn unverified_tls_config() -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth();
    Ok(config)
}

/// Accepts every certificate, but still verifies handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
