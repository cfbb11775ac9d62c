//! Output Creation
//!
//! ```text
//! change_sol = Σin.sol + shield(public_sol) - unshield(public_sol) - Σrecipient.sol - fee
//! change_spl = Σin.spl + shield(public_spl) - unshield(public_spl) - Σrecipient.spl
//! ```

use rand::Rng;

use obscura_privacy::{LookupTables, Pubkey, Utxo, UtxoConfig, UtxoOwner};

use crate::action::Action;
use crate::error::{TransactionParametersError, TransactionParametersErrorCode, utxo_error};
use crate::verifier::VerifierConfig;

/// Shielded payment to another owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub owner: UtxoOwner,
    /// Non-native asset sent, [`Pubkey::NATIVE`] for native-only payments
    pub mint: Pubkey,
    pub spl_amount: u64,
    pub sol_amount: u64,
}

impl Recipient {
    pub fn spl_mint(&self) -> Option<Pubkey> {
        (!self.mint.is_native()).then_some(self.mint)
    }
}

/// Input for [`create_out_utxos`]
#[derive(Debug, Clone)]
pub struct CreateOutUtxos<'a> {
    pub action: Action,
    pub in_utxos: &'a [Utxo],
    pub recipients: &'a [Recipient],
    /// Owner of the change output
    pub change_owner: UtxoOwner,
    pub public_mint: Option<Pubkey>,
    pub public_spl_amount: u64,
    pub public_sol_amount: u64,
    pub relayer_fee: u64,
    pub verifier: &'a VerifierConfig,
}

/// Build recipient outputs followed by the change output
pub fn create_out_utxos<R: Rng>(
    params: CreateOutUtxos<'_>,
    tables: &LookupTables,
    rng: &mut R,
) -> Result<Vec<Utxo>, TransactionParametersError> {
    const ORIGIN: &str = "create_out_utxos";

    if params.recipients.len() >= params.verifier.out_utxos {
        return Err(TransactionParametersError::new(
            TransactionParametersErrorCode::InvalidNumberOfRecipients,
            ORIGIN,
            format!(
                "{} recipients leave no room for change in {} outputs",
                params.recipients.len(),
                params.verifier.out_utxos
            ),
        ));
    }

    let mint = single_mint(&params)?;

    let sol_in: i128 = params.in_utxos.iter().map(|u| u.sol_amount() as i128).sum();
    let spl_in: i128 = match mint {
        Some(mint) => params
            .in_utxos
            .iter()
            .map(|u| u.amount_of(&mint) as i128)
            .sum(),
        None => 0,
    };
    let sol_out: i128 = params.recipients.iter().map(|r| r.sol_amount as i128).sum();
    let spl_out: i128 = params.recipients.iter().map(|r| r.spl_amount as i128).sum();

    let (public_sol, public_spl) = match params.action {
        Action::Shield => (
            params.public_sol_amount as i128,
            params.public_spl_amount as i128,
        ),
        Action::Unshield => (
            -(params.public_sol_amount as i128),
            -(params.public_spl_amount as i128),
        ),
        Action::Transfer => (0, 0),
    };

    let change_sol = sol_in + public_sol - sol_out - params.relayer_fee as i128;
    let change_spl = spl_in + public_spl - spl_out;

    let mut outputs = Vec::with_capacity(params.recipients.len() + 1);
    for recipient in params.recipients {
        let config = match recipient.spl_mint() {
            Some(spl) => UtxoConfig::new(recipient.owner).with_assets(
                vec![Pubkey::NATIVE, spl],
                vec![recipient.sol_amount as i128, recipient.spl_amount as i128],
            ),
            None => UtxoConfig::new(recipient.owner)
                .with_assets(vec![Pubkey::NATIVE], vec![recipient.sol_amount as i128]),
        };
        outputs.push(Utxo::new(config, tables, rng).map_err(utxo_error)?);
    }

    let change = match mint {
        Some(spl) => UtxoConfig::new(params.change_owner)
            .with_assets(vec![Pubkey::NATIVE, spl], vec![change_sol, change_spl]),
        None => UtxoConfig::new(params.change_owner)
            .with_assets(vec![Pubkey::NATIVE], vec![change_sol]),
    };
    outputs.push(Utxo::new(change, tables, rng).map_err(utxo_error)?);

    log::debug!(
        "{} outputs: {} recipients, change sol {change_sol} spl {change_spl}",
        params.action,
        params.recipients.len()
    );
    Ok(outputs)
}

/// The one non-native mint the outputs may hold
fn single_mint(params: &CreateOutUtxos<'_>) -> Result<Option<Pubkey>, TransactionParametersError> {
    let mut mint: Option<Pubkey> = None;
    let mut add = |candidate: Pubkey| -> Result<(), TransactionParametersError> {
        match mint {
            Some(existing) if existing != candidate => Err(TransactionParametersError::new(
                TransactionParametersErrorCode::InvalidNumberOfMints,
                "create_out_utxos",
                format!("outputs would hold {existing} and {candidate}"),
            )),
            _ => {
                mint = Some(candidate);
                Ok(())
            }
        }
    };

    if let Some(public_mint) = params.public_mint.filter(|m| !m.is_native()) {
        add(public_mint)?;
    }
    for utxo in params.in_utxos {
        if let Some(spl) = utxo.spl_asset() {
            add(spl)?;
        }
    }
    for recipient in params.recipients {
        match recipient.spl_mint() {
            Some(spl) => add(spl)?,
            None if recipient.spl_amount > 0 => {
                return Err(TransactionParametersError::new(
                    TransactionParametersErrorCode::InvalidNumberOfMints,
                    "create_out_utxos",
                    "recipient spl amount without mint",
                ));
            }
            None => {}
        }
    }
    Ok(mint)
}
