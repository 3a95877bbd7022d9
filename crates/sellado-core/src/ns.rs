#![forbid(unsafe_code)]

//! XML namespace constants used across the library.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XAdES 1.3.2 namespace
pub const XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";

/// Exclusive C14N namespace
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";

/// Prefix bound to [`DSIG`] in generated signatures.
pub const DSIG_PREFIX: &str = "ds";

/// Prefix bound to [`XADES`] in generated signatures.
pub const XADES_PREFIX: &str = "etsi";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const OBJECT: &str = "Object";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";

    // KeyInfo elements
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_VALUE: &str = "KeyValue";
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
    pub const X509_ISSUER_NAME: &str = "X509IssuerName";
    pub const X509_SERIAL_NUMBER: &str = "X509SerialNumber";

    // Exc C14N
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";

    // XAdES elements
    pub const QUALIFYING_PROPERTIES: &str = "QualifyingProperties";
    pub const SIGNED_PROPERTIES: &str = "SignedProperties";
    pub const SIGNED_SIGNATURE_PROPERTIES: &str = "SignedSignatureProperties";
    pub const SIGNING_TIME: &str = "SigningTime";
    pub const SIGNING_CERTIFICATE: &str = "SigningCertificate";
    pub const CERT: &str = "Cert";
    pub const CERT_DIGEST: &str = "CertDigest";
    pub const ISSUER_SERIAL: &str = "IssuerSerial";
    pub const SIGNATURE_PRODUCTION_PLACE: &str = "SignatureProductionPlace";
    pub const CITY: &str = "City";
    pub const STATE_OR_PROVINCE: &str = "StateOrProvince";
    pub const POSTAL_CODE: &str = "PostalCode";
    pub const COUNTRY_NAME: &str = "CountryName";
    pub const SIGNER_ROLE: &str = "SignerRole";
    pub const CLAIMED_ROLES: &str = "ClaimedRoles";
    pub const CLAIMED_ROLE: &str = "ClaimedRole";
    pub const SIGNED_DATA_OBJECT_PROPERTIES: &str = "SignedDataObjectProperties";
    pub const DATA_OBJECT_FORMAT: &str = "DataObjectFormat";
    pub const DESCRIPTION: &str = "Description";
    pub const MIME_TYPE: &str = "MimeType";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const TYPE: &str = "Type";
    pub const ALGORITHM: &str = "Algorithm";
    pub const TARGET: &str = "Target";
    pub const OBJECT_REFERENCE: &str = "ObjectReference";
    pub const PREFIX_LIST: &str = "PrefixList";
}
