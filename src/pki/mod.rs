//! Self-contained PKI generator.
//!
//! Synthesizes RSA-2048 key pairs and X.509v3 certificates for a small,
//! fixed trust hierarchy (three independent CAs, a handful of leaves), and
//! publishes them as named artifacts into an [`ArtifactStore`].
//!
//! Every key here is RSA-2048 with `e = 65537` rather than rcgen's default
//! ECDSA — rcgen cannot generate RSA keys itself, so the `rsa` crate
//! generates the key pair and rcgen imports it for signing.

use std::collections::HashMap;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, Ia5String, IsCa, KeyPair,
    SanType,
};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::store::ArtifactStore;
use crate::{Error, Result};

const RSA_KEY_BITS: usize = 2048;

/// Whether a generated subject is a CA or a leaf certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Ca,
    Leaf,
}

/// Declarative row of the subject table. Order matters: a leaf references
/// its issuer by name, and the issuer must already have been generated.
struct SubjectSpec {
    name: &'static str,
    role: Role,
    issuer: Option<&'static str>,
    not_before_days: i64,
    not_after_days: i64,
    keycrt: bool,
}

/// The complete, ordered subject table. Reordering this breaks issuance
/// (a leaf's issuer must precede it).
const SUBJECTS: &[SubjectSpec] = &[
    SubjectSpec { name: "ca1", role: Role::Ca, issuer: None, not_before_days: 0, not_after_days: 14, keycrt: false },
    SubjectSpec { name: "server1", role: Role::Leaf, issuer: Some("ca1"), not_before_days: 0, not_after_days: 14, keycrt: false },
    SubjectSpec { name: "server1x", role: Role::Leaf, issuer: Some("ca1"), not_before_days: -15, not_after_days: -1, keycrt: false },
    SubjectSpec { name: "ca2", role: Role::Ca, issuer: None, not_before_days: 0, not_after_days: 14, keycrt: false },
    SubjectSpec { name: "server2", role: Role::Leaf, issuer: Some("ca2"), not_before_days: 0, not_after_days: 14, keycrt: false },
    SubjectSpec { name: "client2", role: Role::Leaf, issuer: Some("ca2"), not_before_days: 0, not_after_days: 14, keycrt: true },
    SubjectSpec { name: "ca3", role: Role::Ca, issuer: None, not_before_days: 0, not_after_days: 14, keycrt: false },
    SubjectSpec { name: "server3", role: Role::Leaf, issuer: Some("ca3"), not_before_days: 0, not_after_days: 14, keycrt: false },
];

/// A generated subject: its signing key pair, its freshly-issued
/// certificate, the traditional-PEM form of its private key, and a pointer
/// to its issuer (`None` for a self-signed root).
struct Generated {
    key_pair: KeyPair,
    cert: rcgen::Certificate,
    key_pem: String,
    parent: Option<&'static str>,
}

/// Builds the full PKI for a given hostname and returns it as an
/// [`ArtifactStore`].
///
/// # Errors
///
/// Returns an error if RSA key generation, certificate signing, or artifact
/// insertion fails. This is always startup-fatal.
pub fn generate(hostname: &str) -> Result<ArtifactStore> {
    // One reference instant for the whole run so that all validity windows
    // stay deterministic relative to each other.
    let now = OffsetDateTime::now_utc();

    let mut subjects: HashMap<&'static str, Generated> = HashMap::new();
    let mut store = ArtifactStore::new();

    for spec in SUBJECTS {
        let generated = issue_subject(spec, hostname, now, &subjects)?;
        debug!(subject = spec.name, role = ?spec.role, "issued certificate");
        subjects.insert(spec.name, generated);
    }

    for spec in SUBJECTS {
        emit_artifacts(spec, &subjects, &mut store)?;
    }

    info!(subjects = SUBJECTS.len(), hostname, "PKI generated");
    Ok(store)
}

fn issue_subject(
    spec: &SubjectSpec,
    hostname: &str,
    now: OffsetDateTime,
    subjects: &HashMap<&'static str, Generated>,
) -> Result<Generated> {
    let rsa_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_KEY_BITS)
        .map_err(|e| Error::Pki(format!("RSA key generation failed for '{}': {e}", spec.name)))?;
    let key_pem = rsa_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|e| Error::Pki(format!("PKCS1 PEM encoding failed for '{}': {e}", spec.name)))?
        .to_string();
    let pkcs8_pem = rsa_key
        .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
        .map_err(|e| Error::Pki(format!("PKCS8 PEM encoding failed for '{}': {e}", spec.name)))?;
    let key_pair = KeyPair::from_pem(&pkcs8_pem)
        .map_err(|e| Error::Pki(format!("rcgen key import failed for '{}': {e}", spec.name)))?;

    let mut params = CertificateParams::default();
    params.distinguished_name = subject_dn(spec, hostname);
    params.not_before = now + Duration::days(spec.not_before_days);
    params.not_after = now + Duration::days(spec.not_after_days);

    let cert = match spec.role {
        Role::Ca => {
            // Critical basicConstraints, CA=TRUE, pathLen=1: exactly one
            // level of intermediate is permitted by design.
            params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
            params
                .self_signed(&key_pair)
                .map_err(|e| Error::Pki(format!("CA '{}' self-signing failed: {e}", spec.name)))?
        }
        Role::Leaf => {
            let dns = Ia5String::try_from(hostname)
                .map_err(|e| Error::Pki(format!("invalid hostname '{hostname}' for SAN: {e}")))?;
            params.subject_alt_names = vec![SanType::DnsName(dns)];

            let issuer_name = spec
                .issuer
                .expect("leaf subject must declare an issuer in the subject table");
            let issuer = subjects.get(issuer_name).unwrap_or_else(|| {
                panic!("issuer '{issuer_name}' must be generated before '{}'", spec.name)
            });

            params
                .signed_by(&key_pair, &issuer.cert, &issuer.key_pair)
                .map_err(|e| Error::Pki(format!("leaf '{}' signing failed: {e}", spec.name)))?
        }
    };

    Ok(Generated {
        key_pair,
        cert,
        key_pem,
        parent: spec.issuer,
    })
}

/// Subject DN: CAs get a fixed CN, leaves get the configured hostname as
/// CN (and as the sole SAN entry).
fn subject_dn(spec: &SubjectSpec, hostname: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, format!("Org {}", spec.name));
    match spec.role {
        Role::Ca => dn.push(DnType::CommonName, "The Certificate Authority"),
        Role::Leaf => dn.push(DnType::CommonName, hostname),
    }
    dn
}

/// Emit `NAME.key`, `NAME.crt`, and (if requested) `NAME.keycrt` for one
/// subject into the store.
fn emit_artifacts(
    spec: &SubjectSpec,
    subjects: &HashMap<&'static str, Generated>,
    store: &mut ArtifactStore,
) -> Result<()> {
    let me = &subjects[spec.name];

    store.insert(format!("{}.key", spec.name), me.key_pem.clone().into_bytes())?;

    // Chain-up order: subject's own cert first, then walk parent pointers
    // up to (and including) the self-signed root.
    let mut chain_pem = String::new();
    let mut cursor = Some(spec.name);
    while let Some(name) = cursor {
        let subject = &subjects[name];
        chain_pem.push_str(&subject.cert.pem());
        cursor = subject.parent;
    }
    let chain_bytes = chain_pem.into_bytes();
    store.insert(format!("{}.crt", spec.name), chain_bytes.clone())?;

    if spec.keycrt {
        let mut combined = me.key_pem.clone().into_bytes();
        combined.extend_from_slice(&chain_bytes);
        store.insert(format!("{}.keycrt", spec.name), combined)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_parser::certificate::X509Certificate;
    use x509_parser::prelude::FromDer;
    use x509_parser::pem::Pem;

    fn parse_chain(pem_bytes: &[u8]) -> Vec<Vec<u8>> {
        Pem::iter_from_buffer(pem_bytes)
            .map(|pem| pem.expect("valid PEM block").contents)
            .collect()
    }

    #[test]
    fn generates_all_expected_artifact_names() {
        let store = generate("localhost.localdomain").unwrap();
        for name in [
            "ca1.key", "ca1.crt", "server1.key", "server1.crt", "server1x.key",
            "server1x.crt", "ca2.key", "ca2.crt", "server2.key", "server2.crt",
            "client2.key", "client2.crt", "client2.keycrt", "ca3.key", "ca3.crt",
            "server3.key", "server3.crt",
        ] {
            assert!(store.get(name).is_some(), "missing artifact {name}");
        }
    }

    #[test]
    fn client2_keycrt_is_key_then_crt_concatenation() {
        let store = generate("localhost.localdomain").unwrap();
        let key = store.get("client2.key").unwrap();
        let crt = store.get("client2.crt").unwrap();
        let keycrt = store.get("client2.keycrt").unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&key);
        expected.extend_from_slice(&crt);
        assert_eq!(&*keycrt, expected.as_slice());
    }

    #[test]
    fn only_client2_gets_a_keycrt_artifact() {
        let store = generate("localhost.localdomain").unwrap();
        for name in ["ca1", "server1", "server1x", "ca2", "server2", "ca3", "server3"] {
            assert!(store.get(&format!("{name}.keycrt")).is_none());
        }
    }

    #[test]
    fn server_cert_chain_ends_at_self_signed_root() {
        let store = generate("localhost.localdomain").unwrap();
        let crt = store.get("server2.crt").unwrap();
        let der_blocks = parse_chain(&crt);
        assert_eq!(der_blocks.len(), 2, "server2 -> ca2, two certs in chain");

        let (_, leaf) = X509Certificate::from_der(&der_blocks[0]).unwrap();
        let (_, root) = X509Certificate::from_der(&der_blocks[1]).unwrap();

        assert_eq!(leaf.issuer(), root.subject());
        assert_eq!(root.issuer(), root.subject(), "root must be self-signed");
    }

    #[test]
    fn ca_certificate_has_critical_basic_constraints_with_path_len_one() {
        let store = generate("localhost.localdomain").unwrap();
        let crt = store.get("ca3.crt").unwrap();
        let der_blocks = parse_chain(&crt);
        let (_, ca) = X509Certificate::from_der(&der_blocks[0]).unwrap();

        let bc = ca
            .basic_constraints()
            .unwrap()
            .expect("ca cert must carry basicConstraints");
        assert!(bc.critical, "basicConstraints must be critical on a CA cert");
        assert!(bc.value.ca);
        assert_eq!(bc.value.path_len_constraint, Some(1));
    }

    #[test]
    fn leaf_certificate_san_contains_exactly_the_hostname() {
        let store = generate("db.example.test").unwrap();
        let crt = store.get("server1.crt").unwrap();
        let der_blocks = parse_chain(&crt);
        let (_, leaf) = X509Certificate::from_der(&der_blocks[0]).unwrap();

        let san = leaf
            .subject_alternative_name()
            .unwrap()
            .expect("leaf must carry SAN");
        assert!(!san.critical, "leaf SAN must be non-critical");

        let names: Vec<String> = san
            .value
            .general_names
            .iter()
            .filter_map(|n| match n {
                x509_parser::extensions::GeneralName::DNSName(d) => Some((*d).to_owned()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["db.example.test".to_string()]);
    }

    #[test]
    fn expired_server_has_notafter_in_the_past() {
        let store = generate("localhost.localdomain").unwrap();
        let crt = store.get("server1x.crt").unwrap();
        let der_blocks = parse_chain(&crt);
        let (_, leaf) = X509Certificate::from_der(&der_blocks[0]).unwrap();

        let not_after = leaf.validity().not_after.timestamp();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        assert!(not_after < now, "server1x must already be expired");
    }

    #[test]
    fn duplicate_insert_into_store_is_rejected() {
        let mut store = ArtifactStore::new();
        store.insert("ca1.key".to_string(), vec![1, 2, 3]).unwrap();
        let err = store.insert("ca1.key".to_string(), vec![4, 5, 6]);
        assert!(err.is_err());
    }
}
