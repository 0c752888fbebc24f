// src/types.rs
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Text that `x509_print` emits for the CT poison extension (1.3.6.1.4.1.11129.2.4.3)
pub const PRECERTIFICATE_POISON_MARKER: &str = "CT Precertificate Poison";

const CRTSH_BASE_URL: &str = "https://crt.sh/";
const CRTSH_LINT_OPTIONS: &str = "cablint,x509lint,zlint";

/// Whether a logged entry is a final certificate or a precertificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateType {
    Certificate,
    Precertificate,
}

impl CertificateType {
    /// Classify a certificate from its printable rendering
    pub fn classify(printable: &str) -> Self {
        if printable.contains(PRECERTIFICATE_POISON_MARKER) {
            CertificateType::Precertificate
        } else {
            CertificateType::Certificate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Certificate => "Certificate",
            CertificateType::Precertificate => "Precertificate",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Certificate" => Ok(CertificateType::Certificate),
            "Precertificate" => Ok(CertificateType::Precertificate),
            other => Err(format!("unknown certificate type '{}'", other)),
        }
    }
}

/// A certificate issued by the queried CA, together with its derived facts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// crt.sh certificate ID
    pub certificate_id: i64,

    /// Raw serial number bytes
    pub serial_number: Vec<u8>,

    pub subject_distinguished_name: String,

    pub certificate_type: CertificateType,

    /// Start of the validity window
    pub not_before: DateTime<Utc>,

    /// End of the validity window
    pub not_after: DateTime<Utc>,

    /// Earliest CT log entry referencing this certificate
    pub first_seen: DateTime<Utc>,

    /// At least one CRL entry of the issuing CA carries this serial number
    pub revoked: bool,

    /// `not_after` lies before the instant the selection ran
    pub expired: bool,

    /// Number of lint issues recorded for this certificate
    pub lint_errors: u64,
}

impl Certificate {
    /// Link to the certificate on crt.sh, with lint output enabled
    pub fn crtsh_link(&self) -> String {
        format!(
            "{}?id={}&opt={}",
            CRTSH_BASE_URL, self.certificate_id, CRTSH_LINT_OPTIONS
        )
    }

    /// Serial number as dash-separated upper-case hex pairs (`0A-1B-FF`)
    pub fn hex_serial_number(&self) -> String {
        let encoded = hex::encode_upper(&self.serial_number);
        let pairs: Vec<&str> = encoded
            .as_bytes()
            .chunks(2)
            .map(|pair| std::str::from_utf8(pair).unwrap_or_default())
            .collect();
        pairs.join("-")
    }

    /// Result ordering: newest sighting first, then ascending certificate ID
    pub fn selection_order(a: &Certificate, b: &Certificate) -> Ordering {
        b.first_seen
            .cmp(&a.first_seen)
            .then_with(|| a.certificate_id.cmp(&b.certificate_id))
    }
}

impl Serialize for Certificate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;

        let mut state = serializer.serialize_struct("Certificate", 12)?;
        state.serialize_field("CertificateID", &self.certificate_id.to_string())?;
        state.serialize_field(
            "SerialNumber",
            &base64::engine::general_purpose::STANDARD.encode(&self.serial_number),
        )?;
        state.serialize_field("SubjectDistinguishedName", &self.subject_distinguished_name)?;
        state.serialize_field("CertificateType", self.certificate_type.as_str())?;
        state.serialize_field("NotBefore", &self.not_before)?;
        state.serialize_field("NotAfter", &self.not_after)?;
        state.serialize_field("FirstSeen", &self.first_seen)?;
        state.serialize_field("Revoked", &self.revoked)?;
        state.serialize_field("Expired", &self.expired)?;
        state.serialize_field("LintErrors", &self.lint_errors)?;
        state.serialize_field("CrtSHLink", &self.crtsh_link())?;
        state.serialize_field("HexSerialNumber", &self.hex_serial_number())?;
        state.end()
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.certificate_id, self.certificate_type, self.subject_distinguished_name
        )?;
        if self.revoked {
            write!(f, " (revoked)")?;
        }
        if self.lint_errors > 0 {
            write!(f, " ({} lint errors)", self.lint_errors)?;
        }
        Ok(())
    }
}

/// A certification authority as recorded in the `ca` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CertificationAuthority {
    pub id: i64,
    pub name: String,
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default = "default_linting_applies")]
    pub linting_applies: bool,
    /// Maintained by crt.sh, never written here
    #[serde(default)]
    pub no_of_certs_issued: i64,
}

fn default_linting_applies() -> bool { true }
