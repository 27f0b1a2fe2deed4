// crates/carledger-core/src/core/endorsement.rs
// ============================================================================
// Module: Key Endorsement Policy Builder
// Description: Organization-set builder for key-level endorsement policies.
// Purpose: Produce envelope bytes requiring every listed organization.
// Dependencies: crate::core::policy
// ============================================================================

//! ## Overview
//! [`KeyEndorsementPolicy`] edits the set of organizations whose endorsement a
//! key requires. The produced envelope lists identities sorted by MSP
//! identifier and requires all of them: `OutOf(len, SignedBy(0), ...)`.
//! An empty set encodes `OutOf(0)`, which any endorsement satisfies.

use std::collections::BTreeMap;

use crate::core::policy::PolicyError;
use crate::core::policy::decode_envelope;
use crate::core::policy::encode_envelope;
use crate::core::policy::n_out_of;
use crate::core::policy::principal_role;
use crate::core::policy::role_principal;
use crate::core::policy::signed_by;
use crate::core::policy::wire::MspRoleType;
use crate::core::policy::wire::SignaturePolicyEnvelope;

/// Organization-based endorsement policy for a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEndorsementPolicy {
    /// Required organizations keyed by MSP identifier.
    orgs: BTreeMap<String, MspRoleType>,
}

impl KeyEndorsementPolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses existing envelope bytes, collecting their role principals.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when the bytes do not decode or reference a
    /// principal that is not an organization role.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PolicyError> {
        let envelope = decode_envelope(bytes)?;
        let mut orgs = BTreeMap::new();
        for (index, principal) in envelope.identities.iter().enumerate() {
            let (msp, role) = principal_role(index, principal)?;
            orgs.insert(msp, role);
        }
        Ok(Self {
            orgs,
        })
    }

    /// Adds organizations with the given role, replacing any existing role.
    pub fn add_orgs<I, S>(&mut self, role: MspRoleType, orgs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for org in orgs {
            self.orgs.insert(org.into(), role);
        }
    }

    /// Removes organizations from the policy.
    pub fn del_orgs<I, S>(&mut self, orgs: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for org in orgs {
            self.orgs.remove(org.as_ref());
        }
    }

    /// Lists the required organizations in sorted order.
    #[must_use]
    pub fn list_orgs(&self) -> Vec<String> {
        self.orgs.keys().cloned().collect()
    }

    /// Builds the structured envelope.
    #[must_use]
    pub fn envelope(&self) -> SignaturePolicyEnvelope {
        let identities = self.orgs.iter().map(|(msp, role)| role_principal(msp, *role)).collect();
        let rules = (0 .. self.orgs.len())
            .map(|index| signed_by(i32::try_from(index).unwrap_or(i32::MAX)))
            .collect();
        let required = i32::try_from(self.orgs.len()).unwrap_or(i32::MAX);
        SignaturePolicyEnvelope {
            version: 0,
            rule: Some(n_out_of(required, rules)),
            identities,
        }
    }

    /// Encodes the policy to envelope bytes.
    #[must_use]
    pub fn policy(&self) -> Vec<u8> {
        encode_envelope(&self.envelope())
    }
}
