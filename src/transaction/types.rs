/// Transaction types for powledger
use serde::{Deserialize, Serialize};

/// Sender sentinel marking a block-reward transaction.
pub const SYSTEM_SENDER: &str = "SYSTEM";

/// Separator used when building the signed message.
pub const MESSAGE_SEPARATOR: char = ':';

/// A value transfer between two account identifiers.
///
/// Identifiers are hex-encoded secp256k1 public keys, except for the
/// [`SYSTEM_SENDER`] sentinel. The signature is the hex-encoded compact ECDSA
/// signature over [`Transaction::signable_message`]. Reward transactions
/// carry no signature.
///
/// Field order here is the wire order; hashing goes through
/// [`crate::codec`] which fixes its own key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
    #[serde(default)]
    pub signature: Option<String>,
}

impl Transaction {
    /// An unsigned transfer. Use [`Transaction::with_signature`] or
    /// [`crate::crypto::KeyPair::sign_transfer`] to attach a signature.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            signature: None,
        }
    }

    /// Block reward paid to `recipient`.
    pub fn reward(recipient: impl Into<String>, amount: u64) -> Self {
        Transaction::new(SYSTEM_SENDER, recipient, amount)
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn is_reward(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// `sender:recipient:amount`, the bytes covered by the signature.
    pub fn signable_message(&self) -> Vec<u8> {
        signable_message(&self.sender, &self.recipient, self.amount)
    }
}

pub fn signable_message(sender: &str, recipient: &str, amount: u64) -> Vec<u8> {
    format!(
        "{}{sep}{}{sep}{}",
        sender,
        recipient,
        amount,
        sep = MESSAGE_SEPARATOR
    )
    .into_bytes()
}
