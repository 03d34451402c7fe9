// 2.3 signature.rs: off-chain order signatures. the engine only needs
// "who signed this order, if anyone". `HmacVerifier` is a shared-secret
// implementation used by the simulator and tests.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;

use crate::order::Order;
use crate::types::AccountId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Claimed signer. only trusted once the verifier accepts the tag.
    pub signer: AccountId,
    pub tag: Vec<u8>,
}

pub trait SignatureVerifier {
    /// The signer identity, or `None` when the signature does not check out.
    fn recover_signer(&self, order: &Order, signature: &Signature) -> Option<AccountId>;
}

#[derive(Debug, Clone, Default)]
pub struct HmacVerifier {
    keys: HashMap<AccountId, Vec<u8>>,
}

impl HmacVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_key(&mut self, account: AccountId, key: impl Into<Vec<u8>>) {
        self.keys.insert(account, key.into());
    }

    fn mac_for(&self, account: AccountId) -> Option<HmacSha256> {
        let key = self.keys.get(&account)?;
        HmacSha256::new_from_slice(key).ok()
    }

    /// Signs the order's content hash with the account's key.
    pub fn sign(&self, order: &Order, account: AccountId) -> Option<Signature> {
        let mut mac = self.mac_for(account)?;
        mac.update(order.hash().as_bytes());
        Some(Signature {
            signer: account,
            tag: mac.finalize().into_bytes().to_vec(),
        })
    }
}

impl SignatureVerifier for HmacVerifier {
    fn recover_signer(&self, order: &Order, signature: &Signature) -> Option<AccountId> {
        let mut mac = self.mac_for(signature.signer)?;
        mac.update(order.hash().as_bytes());
        mac.verify_slice(&signature.tag).ok()?;
        Some(signature.signer)
    }
}
