//! Key material for the coordinator's certificate authorities.
//!
//! Certificate issuance itself lives outside this workspace; the guard only
//! tracks which key pair is authoritative for a given state. The root CA key
//! is derived from the seed and stable across transitions, the mesh CA key
//! rotates with every manifest transition.

use p256::ecdsa::{SigningKey, VerifyingKey};

/// The CA key pair bundle for one state snapshot.
#[derive(Clone)]
pub struct CertAuthority {
    root_ca_key: SigningKey,
    mesh_ca_key: SigningKey,
}

impl CertAuthority {
    /// Bundles the root and mesh CA keys for a state.
    pub fn new(root_ca_key: SigningKey, mesh_ca_key: SigningKey) -> Self {
        Self {
            root_ca_key,
            mesh_ca_key,
        }
    }

    /// The root CA key for this state.
    pub fn root_ca_key(&self) -> &SigningKey {
        &self.root_ca_key
    }

    /// The mesh CA key for this state.
    pub fn mesh_ca_key(&self) -> &SigningKey {
        &self.mesh_ca_key
    }

    /// The public half of the mesh CA key.
    pub fn mesh_ca_verifying_key(&self) -> VerifyingKey {
        self.mesh_ca_key.verifying_key().clone()
    }
}

impl std::fmt::Debug for CertAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertAuthority").finish_non_exhaustive()
    }
}
