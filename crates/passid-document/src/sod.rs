//! ASN.1 structures carried inside the SOD.

use der::asn1::{Any, ObjectIdentifier, OctetString};
use der::{Decode, Reader, Sequence, SliceReader, Tag, Tagged};
use spki::AlgorithmIdentifierOwned;

use crate::error::DocumentError;

/// `id-messageDigest` (PKCS #9).
pub const MESSAGE_DIGEST_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

/// A CMS attribute with its value set left undecoded.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct RawAttribute {
    oid: ObjectIdentifier,
    values: Any,
}

/// ICAO 9303 `LDSSecurityObject`, the SOD's encapsulated content.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct LdsSecurityObject {
    pub version: u8,
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub data_group_hashes: Vec<DataGroupHash>,
    #[asn1(optional = "true")]
    pub lds_version_info: Option<Any>,
}

/// Hash of one data group.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DataGroupHash {
    pub number: u8,
    pub hash: OctetString,
}

impl LdsSecurityObject {
    /// Decode the DER encapsulated content.
    pub fn from_der_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::from_der(bytes).map_err(|e| {
            DocumentError::MalformedAsn1(format!("encapsulated content: {}", e))
        })
    }

    /// Hash of data group `number`, if present.
    pub fn data_group(&self, number: u8) -> Option<&[u8]> {
        self.data_group_hashes
            .iter()
            .find(|dg| dg.number == number)
            .map(|dg| dg.hash.as_bytes())
    }
}

/// Extract the message-digest value from DER signed attributes
/// (`SET OF Attribute`).
pub fn message_digest(signed_attributes: &[u8]) -> Result<Vec<u8>, DocumentError> {
    let malformed = |e: der::Error| DocumentError::MalformedAsn1(format!("signed attributes: {}", e));

    let set = Any::from_der(signed_attributes).map_err(malformed)?;
    if set.tag() != Tag::Set {
        return Err(DocumentError::MalformedAsn1(format!(
            "signed attributes must be a SET, found {}",
            set.tag()
        )));
    }

    let mut reader = SliceReader::new(set.value()).map_err(malformed)?;
    while !reader.is_finished() {
        let attribute: RawAttribute = reader.decode().map_err(malformed)?;
        if attribute.oid != MESSAGE_DIGEST_OID {
            continue;
        }
        if attribute.values.tag() != Tag::Set {
            return Err(DocumentError::MalformedAsn1(
                "message-digest values must be a SET".into(),
            ));
        }
        let mut values = SliceReader::new(attribute.values.value()).map_err(malformed)?;
        let digest: OctetString = values.decode().map_err(malformed)?;
        return Ok(digest.as_bytes().to_vec());
    }

    Err(DocumentError::DigestMismatch(
        "signed attributes carry no message digest".into(),
    ))
}
