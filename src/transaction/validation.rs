/// Validation logic for transfer requests separated from type definitions
use crate::amount::Amount;
use crate::crypto::{Verifier, SYSTEM_ADDRESS};
use crate::error::ChainError;
use crate::transaction::types::{TransferRequest, MAX_DATA_SIZE};

impl TransferRequest {
    /// Stateless validation: addresses, amount and payload bounds.
    /// Does NOT look at balances or signatures.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.sender.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Sender address cannot be empty".to_string(),
            ));
        }
        if self.recipient.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Recipient address cannot be empty".to_string(),
            ));
        }
        if self.sender == SYSTEM_ADDRESS {
            return Err(ChainError::InvalidTransaction(
                "The system address cannot send transfers".to_string(),
            ));
        }
        if self.amount < Amount::ZERO {
            return Err(ChainError::InvalidTransaction(
                "Transfer amount cannot be negative".to_string(),
            ));
        }
        if self.data.len() > MAX_DATA_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Payload too large: {} bytes (max: {})",
                self.data.len(),
                MAX_DATA_SIZE
            )));
        }
        Ok(())
    }

    /// Checks that the request carries a valid signature from the sender's key.
    pub fn verify_signature(&self, verifier: &dyn Verifier) -> Result<(), ChainError> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| ChainError::InvalidSignature("Transfer not signed".to_string()))?;

        let signer = signature.signer_address();
        if signer != self.sender {
            return Err(ChainError::InvalidSignature(format!(
                "Signed by {} but sender is {}",
                signer, self.sender
            )));
        }

        verifier
            .verify(&self.signable_message(), signature)
            .map_err(|e| ChainError::InvalidSignature(e.to_string()))
    }
}
