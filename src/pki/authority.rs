//! Authority and leaf certificate generation using rcgen.

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::error::{PkiError, PkiResult};
use crate::config::AltName;

/// Backdating applied to `not_before` to tolerate clock skew.
const CLOCK_SKEW: Duration = Duration::minutes(5);

/// Returns `(not_before, not_after)` for a certificate issued now.
fn validity_window(validity: Duration) -> PkiResult<(OffsetDateTime, OffsetDateTime)> {
    let now = OffsetDateTime::now_utc();
    let not_after = now
        .checked_add(validity)
        .ok_or(PkiError::InvalidValidity(validity))?;
    Ok((now - CLOCK_SKEW, not_after))
}

/// A self-signed certificate authority.
///
/// Authorities are constrained to path length 0: they sign leaves only,
/// never intermediates.
pub struct Authority {
    name: String,
    cert_pem: String,
    key_pair: KeyPair,
    /// Kept to build an `Issuer` when signing leaves.
    params: CertificateParams,
}

impl Authority {
    /// Generates a new authority named `name`.
    pub fn generate(name: &str, validity: Duration) -> PkiResult<Self> {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, name);
        dn.push(DnType::OrganizationName, "internal-ssl");

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        (params.not_before, params.not_after) = validity_window(validity)?;

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        debug!("generated authority {}", name);

        Ok(Self {
            name: name.to_string(),
            cert_pem: cert.pem(),
            key_pair,
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the authority certificate in PEM format.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Returns the authority private key in PKCS#8 PEM format.
    pub fn key_pem(&self) -> String {
        self.key_pair.serialize_pem()
    }

    /// Issues a leaf certificate for `name`, valid for every identity in
    /// `alt_names`.
    ///
    /// Leaves carry both the server and client auth purposes so the same
    /// pair can terminate or initiate a mutually authenticated connection.
    pub fn issue_leaf(
        &self,
        name: &str,
        alt_names: &[AltName],
        validity: Duration,
    ) -> PkiResult<Leaf> {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, name);

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.subject_alt_names = alt_names
            .iter()
            .map(|alt| match alt {
                AltName::Ip(addr) => Ok(SanType::IpAddress(*addr)),
                AltName::Dns(dns) => dns
                    .as_str()
                    .try_into()
                    .map(SanType::DnsName)
                    .map_err(|_| PkiError::InvalidDnsName(dns.clone())),
            })
            .collect::<PkiResult<_>>()?;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];

        (params.not_before, params.not_after) = validity_window(validity)?;

        let key_pair = KeyPair::generate()?;
        let issuer = Issuer::from_params(&self.params, &self.key_pair);
        let cert = params.signed_by(&key_pair, &issuer)?;

        debug!("issued {} signed by {}", name, self.name);

        Ok(Leaf {
            name: name.to_string(),
            issuer: self.name.clone(),
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }
}

/// A leaf certificate and its private key, both PEM encoded.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub name: String,
    /// Name of the signing authority.
    pub issuer: String,
    pub cert_pem: String,
    pub key_pem: String,
}
