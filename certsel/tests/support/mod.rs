use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use certsel::Certificate;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509, X509Builder, X509NameBuilder};

pub fn unix_days_from_now(days: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    now + days * 86400
}

fn new_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

/// PEM-encoded leaf bundle and key, as an issuance workflow would hand them over
#[allow(dead_code)]
pub struct PemPair {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

#[allow(dead_code)]
impl PemPair {
    pub fn certificate(&self) -> Arc<Certificate> {
        Arc::new(Certificate::from_pem(&self.cert_pem, &self.key_pem).unwrap())
    }

    pub fn write_to(&self, dir: &Path) -> (PathBuf, PathBuf) {
        let cert_path = dir.join("fullchain.pem");
        let key_path = dir.join("privkey.pem");
        std::fs::write(&cert_path, &self.cert_pem).unwrap();
        std::fs::write(&key_path, &self.key_pem).unwrap();
        (cert_path, key_path)
    }
}

/// Test certificate authority
pub struct Authority {
    cert: X509,
    key: PKey<Private>,
    chain: Vec<X509>,
}

#[allow(dead_code)]
impl Authority {
    pub fn root(common_name: &str) -> Self {
        let key = new_key();
        let cert = sign(common_name, &[], unix_days_from_now(3650), &key, None, true);
        Self {
            cert,
            key,
            chain: Vec::new(),
        }
    }

    pub fn intermediate(&self, common_name: &str) -> Self {
        let key = new_key();
        let cert = sign(
            common_name,
            &[],
            unix_days_from_now(1825),
            &key,
            Some(self),
            true,
        );
        let mut chain = vec![cert.clone()];
        chain.extend(self.chain.iter().cloned());
        Self { cert, key, chain }
    }

    pub fn root_pem(&self) -> Vec<u8> {
        self.cert.to_pem().unwrap()
    }

    /// Leaf followed by every intermediate up to (not including) the root
    pub fn issue_pem(&self, common_name: &str, sans: &[&str], expires_in_days: i64) -> PemPair {
        let key = new_key();
        let leaf = sign(
            common_name,
            sans,
            unix_days_from_now(expires_in_days),
            &key,
            Some(self),
            false,
        );

        let mut cert_pem = leaf.to_pem().unwrap();
        for cert in &self.chain {
            cert_pem.extend(cert.to_pem().unwrap());
        }
        PemPair {
            cert_pem,
            key_pem: key.private_key_to_pem_pkcs8().unwrap(),
        }
    }

    pub fn issue(&self, common_name: &str, sans: &[&str], expires_in_days: i64) -> Arc<Certificate> {
        self.issue_pem(common_name, sans, expires_in_days)
            .certificate()
    }
}

#[allow(dead_code)]
pub fn self_signed(common_name: &str, sans: &[&str], expires_in_days: i64) -> Arc<Certificate> {
    let key = new_key();
    let cert = sign(
        common_name,
        sans,
        unix_days_from_now(expires_in_days),
        &key,
        None,
        false,
    );
    Arc::new(Certificate::from_parts(cert, Vec::new(), key).unwrap())
}

fn sign(
    common_name: &str,
    sans: &[&str],
    not_after: i64,
    key: &PKey<Private>,
    issuer: Option<&Authority>,
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
    match issuer {
        Some(ca) => builder.set_issuer_name(ca.cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }

    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(unix_days_from_now(-1) as _).unwrap())
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
