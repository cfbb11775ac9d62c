use thiserror::Error;

use obscura_privacy::{
    AccountError, AccountErrorCode, ComponentError, MerkleTreeError, MerkleTreeErrorCode,
    UtxoError, UtxoErrorCode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectInUtxosErrorCode {
    #[error("public spl amount without mint")]
    NoPublicMintProvided,
    #[error("public mint without spl amount")]
    PublicSplAmountUndefined,
    #[error("no public amounts provided")]
    NoPublicAmountsProvided,
    #[error("relayer fee undefined")]
    RelayerFeeUndefined,
    #[error("relayer fee defined")]
    RelayerFeeDefined,
    #[error("invalid number of recipients")]
    InvalidNumberOfRecipients,
    #[error("invalid number of mints")]
    InvalidNumberOfMints,
    #[error("no utxos provided")]
    NoUtxosProvided,
    #[error("failed to find utxo combination")]
    FailedToFindUtxoCombination,
    #[error("failed to select sol utxo")]
    FailedToSelectSolUtxo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransactionParametersErrorCode {
    #[error("exceeded max utxos")]
    ExceededMaxUtxos,
    #[error("no utxos provided")]
    NoUtxosProvided,
    #[error("exceeded max assets")]
    ExceededMaxAssets,
    #[error("relayer defined")]
    RelayerDefined,
    #[error("relayer undefined")]
    RelayerUndefined,
    #[error("relayer invalid")]
    RelayerInvalid,
    #[error("invalid public amount")]
    InvalidPublicAmount,
    #[error("spl sender undefined")]
    SplSenderUndefined,
    #[error("sol sender undefined")]
    SolSenderUndefined,
    #[error("sender defined")]
    SenderDefined,
    #[error("spl recipient undefined")]
    SplRecipientUndefined,
    #[error("sol recipient undefined")]
    SolRecipientUndefined,
    #[error("recipient defined")]
    RecipientDefined,
    #[error("message merkle tree undefined")]
    MessageMerkleTreeUndefined,
    #[error("message undefined")]
    MessageUndefined,
    #[error("invalid number of recipients")]
    InvalidNumberOfRecipients,
    #[error("invalid number of mints")]
    InvalidNumberOfMints,
    #[error("utxo: {0}")]
    Utxo(UtxoErrorCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProverErrorCode {
    #[error("input utxo not in merkle tree")]
    InputUtxoNotInTree,
    #[error("proof generation failed")]
    ProofGenerationFailed,
    #[error("invalid proof")]
    InvalidProof,
    #[error("account: {0}")]
    Account(AccountErrorCode),
    #[error("merkle tree: {0}")]
    MerkleTree(MerkleTreeErrorCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerErrorCode {
    #[error("invalid discriminator")]
    InvalidDiscriminator,
    #[error("account data too short")]
    AccountDataTooShort,
    #[error("trailing bytes")]
    TrailingBytes,
}

pub type SelectInUtxosError = ComponentError<SelectInUtxosErrorCode>;
pub type TransactionParametersError = ComponentError<TransactionParametersErrorCode>;
pub type ProverError = ComponentError<ProverErrorCode>;
pub type LedgerError = ComponentError<LedgerErrorCode>;

// obscura-privacy errors re-tagged for `map_err`

pub(crate) fn utxo_error(err: UtxoError) -> TransactionParametersError {
    err.map_kind(TransactionParametersErrorCode::Utxo)
}

pub(crate) fn account_error(err: AccountError) -> ProverError {
    err.map_kind(ProverErrorCode::Account)
}

pub(crate) fn merkle_error(err: MerkleTreeError) -> ProverError {
    err.map_kind(ProverErrorCode::MerkleTree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utxo_error_is_wrapped() {
        let err = utxo_error(UtxoError::new(
            UtxoErrorCode::NegativeAmount,
            "Utxo::new",
            "amount -3",
        ));
        assert_eq!(
            err.kind,
            TransactionParametersErrorCode::Utxo(UtxoErrorCode::NegativeAmount)
        );
        assert_eq!(err.to_string(), "Utxo::new: utxo: negative amount: amount -3");
    }
}
