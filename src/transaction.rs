//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BalanceSheet, Block};
    use crate::crypto::KeyPair;
    use crate::error::ChainError;

    fn funded(keypair: &KeyPair, amount: u64) -> BalanceSheet {
        BalanceSheet::from_chain(&[Block::new(
            1,
            "0".to_string(),
            vec![Transaction::reward(keypair.public_key_hex(), amount)],
        )])
    }

    #[test]
    fn test_signable_message_format() {
        let tx = Transaction::new("02ab", "03cd", 5);
        assert_eq!(tx.signable_message(), b"02ab:03cd:5".to_vec());
    }

    #[test]
    fn test_tx_validation_success() {
        let keypair = KeyPair::generate();
        let tx = keypair.sign_transfer("bob", 5);
        assert!(tx.validate_shape().is_ok());
        assert!(tx.validate_with_balances(&funded(&keypair, 10)).is_ok());
    }

    #[test]
    fn test_exact_balance_is_spendable() {
        let keypair = KeyPair::generate();
        let tx = keypair.sign_transfer("bob", 10);
        assert!(tx.validate_with_balances(&funded(&keypair, 10)).is_ok());
    }

    #[test]
    fn test_insufficient_funds() {
        let keypair = KeyPair::generate();
        let tx = keypair.sign_transfer("bob", 11);
        assert_eq!(
            tx.validate_with_balances(&funded(&keypair, 10)),
            Err(ChainError::InsufficientFunds {
                sender: keypair.public_key_hex(),
                balance: 10,
                amount: 11,
            })
        );
    }

    #[test]
    fn test_signature_checked_before_balance() {
        let keypair = KeyPair::generate();
        let mut tx = keypair.sign_transfer("bob", 11);
        tx.amount = 12;
        assert_eq!(
            tx.validate_with_balances(&BalanceSheet::new()),
            Err(ChainError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_recipient_fails() {
        let keypair = KeyPair::generate();
        let mut tx = keypair.sign_transfer("bob", 5);
        tx.recipient = "mallory".to_string();
        assert_eq!(tx.validate_signature(), Err(ChainError::InvalidSignature));
    }

    #[test]
    fn test_shape_rejections() {
        let keypair = KeyPair::generate();
        let good = keypair.sign_transfer("bob", 5);

        let mut empty_recipient = good.clone();
        empty_recipient.recipient.clear();
        let mut zero = good.clone();
        zero.amount = 0;
        let mut unsigned = good.clone();
        unsigned.signature = None;
        let mut blank_signature = good.clone();
        blank_signature.signature = Some(String::new());
        let mut colon = good.clone();
        colon.recipient = "bob:evil".to_string();
        let system = Transaction::reward("bob", 5).with_signature("00");

        for tx in [empty_recipient, zero, unsigned, blank_signature, colon, system] {
            assert!(
                matches!(tx.validate_shape(), Err(ChainError::MalformedInput(_))),
                "expected MalformedInput for {:?}",
                tx
            );
        }
    }

    #[test]
    fn test_wire_shape_null_signature() {
        let tx: Transaction =
            serde_json::from_str(r#"{"sender":"SYSTEM","recipient":"m","amount":1,"signature":null}"#)
                .unwrap();
        assert!(tx.is_reward());
        assert_eq!(tx, Transaction::reward("m", 1));
    }
}
