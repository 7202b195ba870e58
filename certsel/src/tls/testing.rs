//! Certificate minting for unit tests

use super::Certificate;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509, X509Builder, X509NameBuilder, X509NameRef};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn days_from_now(days: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    now + days * 86400
}

pub fn generate_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn build(
    common_name: &str,
    sans: &[&str],
    not_after: i64,
    key: &PKey<Private>,
    issuer: Option<&TestCa>,
    is_ca: bool,
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    let name = name.build();
    builder.set_subject_name(&name).unwrap();
    let issuer_name: &X509NameRef = match issuer {
        Some(ca) => ca.cert.subject_name(),
        None => &name,
    };
    builder.set_issuer_name(issuer_name).unwrap();

    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(days_from_now(-1) as _).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after as _).unwrap())
        .unwrap();

    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }

    if !sans.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for name in sans {
            san.dns(name);
        }
        let extension = san
            .build(&builder.x509v3_context(issuer.map(|ca| &*ca.cert), None))
            .unwrap();
        builder.append_extension(extension).unwrap();
    }

    let signing_key = issuer.map(|ca| &ca.key).unwrap_or(key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// A signing authority for test certificates
pub struct TestCa {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestCa {
    /// Self-signed root
    pub fn new(common_name: &str) -> Self {
        let key = generate_key();
        let cert = build(common_name, &[], days_from_now(3650), &key, None, true);
        Self { cert, key }
    }

    /// Intermediate authority signed by this one
    pub fn intermediate(&self, common_name: &str) -> Self {
        let key = generate_key();
        let cert = build(
            common_name,
            &[],
            days_from_now(1825),
            &key,
            Some(self),
            true,
        );
        Self { cert, key }
    }

    pub fn issue_parts(
        &self,
        common_name: &str,
        sans: &[&str],
        not_after: i64,
    ) -> (X509, PKey<Private>) {
        let key = generate_key();
        let cert = build(common_name, sans, not_after, &key, Some(self), false);
        (cert, key)
    }

    /// Leaf signed by this authority, with no intermediates attached
    pub fn issue(&self, common_name: &str, sans: &[&str], not_after: i64) -> Arc<Certificate> {
        let (cert, key) = self.issue_parts(common_name, sans, not_after);
        Arc::new(Certificate::from_parts(cert, Vec::new(), key).unwrap())
    }
}

pub fn self_signed(common_name: &str, sans: &[&str], not_after: i64) -> Arc<Certificate> {
    let key = generate_key();
    let cert = build(common_name, sans, not_after, &key, None, false);
    Arc::new(Certificate::from_parts(cert, Vec::new(), key).unwrap())
}
