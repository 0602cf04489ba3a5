/// Validation logic for transactions separated from type definitions
use crate::blockchain::BalanceSheet;
use crate::error::ChainError;
use crate::transaction::types::{Transaction, MESSAGE_SEPARATOR, SYSTEM_SENDER};

impl Transaction {
    /// Stateless shape checks for a transaction entering through submission.
    ///
    /// Runs before any cryptography so malformed requests are cheap to reject.
    pub fn validate_shape(&self) -> Result<(), ChainError> {
        if self.sender.is_empty() {
            return Err(ChainError::MalformedInput(
                "Sender cannot be empty".to_string(),
            ));
        }
        if self.recipient.is_empty() {
            return Err(ChainError::MalformedInput(
                "Recipient cannot be empty".to_string(),
            ));
        }
        if self.sender == SYSTEM_SENDER {
            return Err(ChainError::MalformedInput(
                "Reward transactions cannot be submitted".to_string(),
            ));
        }
        if self.sender.contains(MESSAGE_SEPARATOR) || self.recipient.contains(MESSAGE_SEPARATOR) {
            return Err(ChainError::MalformedInput(format!(
                "Identifiers cannot contain '{}'",
                MESSAGE_SEPARATOR
            )));
        }
        if self.amount == 0 {
            return Err(ChainError::MalformedInput(
                "Amount must be greater than zero".to_string(),
            ));
        }
        match self.signature.as_deref() {
            None | Some("") => Err(ChainError::MalformedInput(
                "Transaction not signed".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Checks the signature over `sender:recipient:amount`.
    pub fn validate_signature(&self) -> Result<(), ChainError> {
        let signature = self.signature.as_deref().unwrap_or_default();
        if crate::crypto::verify_signature(&self.sender, signature, &self.signable_message()) {
            Ok(())
        } else {
            Err(ChainError::InvalidSignature)
        }
    }

    /// Full validation against a balance snapshot that already includes
    /// pending debits.
    pub fn validate_with_balances(&self, balances: &BalanceSheet) -> Result<(), ChainError> {
        self.validate_signature()?;

        let balance = balances.balance_of(&self.sender);
        if balance < i128::from(self.amount) {
            return Err(ChainError::InsufficientFunds {
                sender: self.sender.clone(),
                balance,
                amount: self.amount,
            });
        }
        Ok(())
    }
}
