// crates/carledger-core/src/core/policy.rs
// ============================================================================
// Module: Validation Policies
// Description: Threshold-policy wire format and typed per-key policy values.
// Purpose: Encode, decode, and describe key-level endorsement policies.
// Dependencies: prost, thiserror, crate::core::transport
// ============================================================================

//! ## Overview
//! A key-level validation policy is a signature-policy envelope: a boolean
//! threshold expression (`OutOf(n, ...)`) whose leaves reference signer
//! principals by index. This module models the envelope with `prost` so the
//! bytes the host evaluates can be produced and inspected structurally.
//!
//! [`ValidationPolicy`] is the typed value the contract works with. The two
//! canonical policies are fixed literals reproduced bit-exact; any other byte
//! string is carried opaquely as [`ValidationPolicy::Custom`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use prost::Message;
use thiserror::Error;

use crate::core::transport::TransportError;
use crate::core::transport::decode_transport;
use crate::core::transport::encode_transport;

// ============================================================================
// SECTION: Canonical Literals
// ============================================================================

/// Wire bytes of the accept-all policy.
pub const ACCEPT_ALL_POLICY_BYTES: [u8; 23] = [
    0x12, 0x08, 0x12, 0x06, 0x08, 0x01, 0x12, 0x02, 0x08, 0x00, 0x1A, 0x0B, 0x12, 0x09, 0x0A, 0x07,
    0x48, 0x6F, 0x6E, 0x65, 0x4D, 0x53, 0x50,
];

/// Wire bytes of the reject-all policy (unsatisfiable threshold).
pub const REJECT_ALL_POLICY_BYTES: [u8; 6] = [0x12, 0x04, 0x12, 0x02, 0x08, 0x01];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// Bytes are not a valid signature-policy envelope.
    #[error("invalid policy encoding: {0}")]
    Wire(String),
    /// Principal cannot be represented as an organization role.
    #[error("unsupported principal at index {index}: {reason}")]
    UnsupportedPrincipal {
        /// Identity index in the envelope.
        index: usize,
        /// Why the principal was rejected.
        reason: String,
    },
    /// Role name is not recognized.
    #[error("unknown role type: {0}")]
    UnknownRole(String),
}

// ============================================================================
// SECTION: Wire Format
// ============================================================================

/// Protobuf messages for the signature-policy envelope.
#[allow(
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "prost derives generate accessor helpers without docs."
)]
pub mod wire {
    /// Envelope wrapping a policy rule and the principals it references.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SignaturePolicyEnvelope {
        /// Envelope format version.
        #[prost(int32, tag = "1")]
        pub version: i32,
        /// Root rule.
        #[prost(message, optional, tag = "2")]
        pub rule: Option<SignaturePolicy>,
        /// Principals referenced by `signed_by` indexes.
        #[prost(message, repeated, tag = "3")]
        pub identities: Vec<MspPrincipal>,
    }

    /// Policy rule node.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SignaturePolicy {
        /// Leaf or threshold node.
        #[prost(oneof = "signature_policy::Type", tags = "1, 2")]
        pub r#type: Option<signature_policy::Type>,
    }

    /// Rule node variants.
    pub mod signature_policy {
        /// Leaf or threshold node.
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Type {
            /// Signature from the identity at this index.
            #[prost(int32, tag = "1")]
            SignedBy(i32),
            /// At least `n` of the nested rules.
            #[prost(message, tag = "2")]
            NOutOf(super::NOutOf),
        }
    }

    /// Threshold node.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NOutOf {
        /// Number of rules that must be satisfied.
        #[prost(int32, tag = "1")]
        pub n: i32,
        /// Candidate rules.
        #[prost(message, repeated, tag = "2")]
        pub rules: Vec<SignaturePolicy>,
    }

    /// Principal reference with its classification.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct MspPrincipal {
        /// How `principal` is encoded.
        #[prost(enumeration = "PrincipalClassification", tag = "1")]
        pub principal_classification: i32,
        /// Encoded principal.
        #[prost(bytes = "vec", tag = "2")]
        pub principal: Vec<u8>,
    }

    /// Organization role principal.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct MspRole {
        /// Membership service provider identifier.
        #[prost(string, tag = "1")]
        pub msp_identifier: String,
        /// Role within the organization.
        #[prost(enumeration = "MspRoleType", tag = "2")]
        pub role: i32,
    }

    /// Principal classifications.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum PrincipalClassification {
        /// Organization role.
        Role = 0,
        /// Organizational unit.
        OrganizationUnit = 1,
        /// Specific identity.
        Identity = 2,
        /// Anonymity class.
        Anonymity = 3,
        /// Combination of principals.
        Combined = 4,
    }

    /// Organization role types.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum MspRoleType {
        /// Any member.
        Member = 0,
        /// Administrator.
        Admin = 1,
        /// Client identity.
        Client = 2,
        /// Peer identity.
        Peer = 3,
        /// Orderer identity.
        Orderer = 4,
    }
}

use wire::MspPrincipal;
use wire::MspRole;
use wire::MspRoleType;
use wire::PrincipalClassification;
use wire::SignaturePolicy;
use wire::SignaturePolicyEnvelope;
use wire::signature_policy::Type as RuleType;

impl MspRoleType {
    /// Returns the lower-case label used in policy expressions.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Client => "client",
            Self::Peer => "peer",
            Self::Orderer => "orderer",
        }
    }

    /// Parses a role label (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::UnknownRole`] for unrecognized labels.
    pub fn parse(label: &str) -> Result<Self, PolicyError> {
        match label.to_ascii_lowercase().as_str() {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "client" => Ok(Self::Client),
            "peer" => Ok(Self::Peer),
            "orderer" => Ok(Self::Orderer),
            _ => Err(PolicyError::UnknownRole(label.to_string())),
        }
    }
}

/// Decodes envelope wire bytes.
///
/// # Errors
///
/// Returns [`PolicyError::Wire`] when the bytes are not a valid envelope.
pub fn decode_envelope(bytes: &[u8]) -> Result<SignaturePolicyEnvelope, PolicyError> {
    SignaturePolicyEnvelope::decode(bytes).map_err(|err| PolicyError::Wire(err.to_string()))
}

/// Encodes an envelope to wire bytes.
#[must_use]
pub fn encode_envelope(envelope: &SignaturePolicyEnvelope) -> Vec<u8> {
    envelope.encode_to_vec()
}

/// Builds a leaf rule requiring the identity at `index`.
#[must_use]
pub const fn signed_by(index: i32) -> SignaturePolicy {
    SignaturePolicy {
        r#type: Some(RuleType::SignedBy(index)),
    }
}

/// Builds a threshold rule requiring `n` of `rules`.
#[must_use]
pub fn n_out_of(n: i32, rules: Vec<SignaturePolicy>) -> SignaturePolicy {
    SignaturePolicy {
        r#type: Some(RuleType::NOutOf(wire::NOutOf {
            n,
            rules,
        })),
    }
}

/// Builds a role principal for an organization.
#[must_use]
pub fn role_principal(msp_identifier: &str, role: MspRoleType) -> MspPrincipal {
    let role = MspRole {
        msp_identifier: msp_identifier.to_string(),
        role: role.into(),
    };
    MspPrincipal {
        principal_classification: PrincipalClassification::Role.into(),
        principal: role.encode_to_vec(),
    }
}

/// Decodes the organization role carried by a principal.
///
/// # Errors
///
/// Returns [`PolicyError::UnsupportedPrincipal`] when the principal is not a
/// role or its payload does not decode.
pub fn principal_role(
    index: usize,
    principal: &MspPrincipal,
) -> Result<(String, MspRoleType), PolicyError> {
    let unsupported = |reason: String| PolicyError::UnsupportedPrincipal {
        index,
        reason,
    };
    if principal.principal_classification != i32::from(PrincipalClassification::Role) {
        return Err(unsupported(format!(
            "classification {} is not a role",
            principal.principal_classification
        )));
    }
    let role = MspRole::decode(principal.principal.as_slice())
        .map_err(|err| unsupported(err.to_string()))?;
    let role_type = MspRoleType::try_from(role.role)
        .map_err(|_| unsupported(format!("role type {} is unknown", role.role)))?;
    Ok((role.msp_identifier, role_type))
}

// ============================================================================
// SECTION: Expression Rendering
// ============================================================================

/// Renders an envelope as a policy expression, e.g. `OutOf(1, 'Org1MSP.member')`.
#[must_use]
pub fn describe(envelope: &SignaturePolicyEnvelope) -> String {
    envelope.rule.as_ref().map_or_else(
        || "None".to_string(),
        |rule| describe_rule(rule, &envelope.identities),
    )
}

/// Renders a single rule node.
fn describe_rule(rule: &SignaturePolicy, identities: &[MspPrincipal]) -> String {
    match &rule.r#type {
        None => "None".to_string(),
        Some(RuleType::SignedBy(index)) => {
            let resolved = usize::try_from(*index).ok().and_then(|position| {
                identities
                    .get(position)
                    .and_then(|principal| principal_role(position, principal).ok())
            });
            match resolved {
                Some((msp, role)) => format!("'{msp}.{}'", role.label()),
                None => format!("SignedBy({index})"),
            }
        }
        Some(RuleType::NOutOf(threshold)) => {
            let mut out = format!("OutOf({}", threshold.n);
            for nested in &threshold.rules {
                out.push_str(", ");
                out.push_str(&describe_rule(nested, identities));
            }
            out.push(')');
            out
        }
    }
}

// ============================================================================
// SECTION: Typed Policy
// ============================================================================

/// Per-key validation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Canonical accept-all policy.
    AcceptAll,
    /// Canonical reject-all policy; freezes the key.
    RejectAll,
    /// Caller-supplied policy bytes, carried opaquely.
    Custom(Vec<u8>),
}

impl ValidationPolicy {
    /// Classifies raw policy bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes == ACCEPT_ALL_POLICY_BYTES {
            Self::AcceptAll
        } else if bytes == REJECT_ALL_POLICY_BYTES {
            Self::RejectAll
        } else {
            Self::Custom(bytes)
        }
    }

    /// Returns the wire bytes for this policy.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::AcceptAll => &ACCEPT_ALL_POLICY_BYTES,
            Self::RejectAll => &REJECT_ALL_POLICY_BYTES,
            Self::Custom(bytes) => bytes,
        }
    }

    /// Decodes a policy from transport text.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the text is not valid base64.
    pub fn from_transport(text: &str) -> Result<Self, TransportError> {
        decode_transport(text).map(Self::from_bytes)
    }

    /// Encodes the policy as transport text.
    #[must_use]
    pub fn to_transport(&self) -> String {
        encode_transport(self.as_bytes())
    }

    /// Decodes the policy structurally.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Wire`] for custom bytes that are not an envelope.
    pub fn envelope(&self) -> Result<SignaturePolicyEnvelope, PolicyError> {
        decode_envelope(self.as_bytes())
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptAll => f.write_str("accept-all"),
            Self::RejectAll => f.write_str("reject-all"),
            Self::Custom(bytes) => write!(f, "custom({} bytes)", bytes.len()),
        }
    }
}
