//! UTXO Selection
//!
//! Picks at most two input UTXOs that cover a shielded transaction.
//!
//! ```text
//! spl phase:  largest mint holder ──► short? ──► later holders crossing the threshold,
//!             smallest first, until the pair also covers the native amount
//! sol phase:  native-only candidates ──► any candidates holding at most one mint
//! patch:      native shortfall ──► native-only candidates ──► mint holders
//! ```
//!
//! Shields need no coverage; existing balances are merged into the deposit instead.

use obscura_privacy::{Pubkey, Utxo};

use crate::action::Action;
use crate::error::{SelectInUtxosError, SelectInUtxosErrorCode};
use crate::outputs::Recipient;

/// Largest number of inputs the selection returns
pub const MAX_SELECTED_UTXOS: usize = 2;

const ORIGIN: &str = "select_in_utxos";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub action: Action,
    pub public_mint: Option<Pubkey>,
    pub public_spl_amount: Option<u64>,
    pub public_sol_amount: Option<u64>,
    /// Required for unshield and transfer, forbidden for shield
    pub relayer_fee: Option<u64>,
    pub recipients: Vec<Recipient>,
    /// Clamped to `1..=MAX_SELECTED_UTXOS`
    pub max_in_utxos: usize,
}

impl SelectionRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            public_mint: None,
            public_spl_amount: None,
            public_sol_amount: None,
            relayer_fee: None,
            recipients: Vec::new(),
            max_in_utxos: MAX_SELECTED_UTXOS,
        }
    }

    pub fn with_public_spl(mut self, mint: Pubkey, amount: u64) -> Self {
        self.public_mint = Some(mint);
        self.public_spl_amount = Some(amount);
        self
    }

    pub fn with_public_sol(mut self, amount: u64) -> Self {
        self.public_sol_amount = Some(amount);
        self
    }

    pub fn with_relayer_fee(mut self, fee: u64) -> Self {
        self.relayer_fee = Some(fee);
        self
    }

    pub fn with_recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    fn max_inputs(&self) -> usize {
        self.max_in_utxos.clamp(1, MAX_SELECTED_UTXOS)
    }
}

fn fail(kind: SelectInUtxosErrorCode, message: impl Into<String>) -> SelectInUtxosError {
    SelectInUtxosError::new(kind, ORIGIN, message)
}

/// Select the inputs for `request` out of `utxos`
///
/// The returned UTXOs are clones in selection order: the spl carrying input
/// first, the native patch second.
pub fn select_in_utxos(
    utxos: &[Utxo],
    request: &SelectionRequest,
) -> Result<Vec<Utxo>, SelectInUtxosError> {
    let mint = check_request(request)?;

    if utxos.is_empty() {
        return match request.action {
            Action::Shield => Ok(Vec::new()),
            _ => Err(fail(
                SelectInUtxosErrorCode::NoUtxosProvided,
                format!("{} needs at least one input", request.action),
            )),
        };
    }

    let selected = match request.action {
        Action::Shield => select_for_shield(utxos, mint, request),
        Action::Unshield | Action::Transfer => select_for_spend(utxos, mint, request)?,
    };

    log::debug!(
        "{} selected {} of {} utxos: sol {} spl {}",
        request.action,
        selected.len(),
        utxos.len(),
        selected.iter().map(|&i| utxos[i].sol_amount() as u128).sum::<u128>(),
        selected
            .iter()
            .map(|&i| mint.map_or(0, |m| utxos[i].amount_of(&m) as u128))
            .sum::<u128>(),
    );
    Ok(selected.into_iter().map(|i| utxos[i].clone()).collect())
}

/// Validate the request and return the one non-native mint it moves
fn check_request(request: &SelectionRequest) -> Result<Option<Pubkey>, SelectInUtxosError> {
    let public_mint = request.public_mint.filter(|m| !m.is_native());

    match (public_mint, request.public_spl_amount) {
        (None, Some(amount)) if amount > 0 => {
            return Err(fail(
                SelectInUtxosErrorCode::NoPublicMintProvided,
                format!("public spl amount {amount} without mint"),
            ));
        }
        (Some(mint), None) => {
            return Err(fail(
                SelectInUtxosErrorCode::PublicSplAmountUndefined,
                format!("public mint {mint} without amount"),
            ));
        }
        _ => {}
    }

    if request.action == Action::Unshield
        && request.public_spl_amount.is_none()
        && request.public_sol_amount.is_none()
    {
        return Err(fail(
            SelectInUtxosErrorCode::NoPublicAmountsProvided,
            "unshield without public amounts",
        ));
    }

    match (request.action.uses_relayer(), request.relayer_fee) {
        (true, None) => {
            return Err(fail(
                SelectInUtxosErrorCode::RelayerFeeUndefined,
                format!("{} requires a relayer fee", request.action),
            ));
        }
        (false, Some(fee)) => {
            return Err(fail(
                SelectInUtxosErrorCode::RelayerFeeDefined,
                format!("shield does not pay a relayer fee, got {fee}"),
            ));
        }
        _ => {}
    }

    if request.action == Action::Transfer && request.recipients.len() != 1 {
        return Err(fail(
            SelectInUtxosErrorCode::InvalidNumberOfRecipients,
            format!("transfer to {} recipients", request.recipients.len()),
        ));
    }

    let mut mint = public_mint;
    for recipient in &request.recipients {
        if let Some(recipient_mint) = recipient.spl_mint() {
            match mint {
                Some(m) if m != recipient_mint => {
                    return Err(fail(
                        SelectInUtxosErrorCode::InvalidNumberOfMints,
                        format!("recipient mint {recipient_mint} differs from {m}"),
                    ));
                }
                _ => mint = Some(recipient_mint),
            }
        }
    }
    Ok(mint)
}

/// Whether `utxo` holds a non-native asset other than `mint`
///
/// Without a requested mint any token is allowed; [`holds_one_mint`] keeps a
/// selection to a single one.
fn holds_foreign_mint(utxo: &Utxo, mint: Option<Pubkey>) -> bool {
    match mint {
        Some(mint) => utxo.spl_asset().is_some_and(|spl| spl != mint),
        None => false,
    }
}

/// Whether the UTXOs at `selection` hold at most one distinct non-native asset
fn holds_one_mint(utxos: &[Utxo], selection: &[usize]) -> bool {
    let mut mints = selection.iter().filter_map(|&i| utxos[i].spl_asset());
    match mints.next() {
        Some(first) => mints.all(|m| m == first),
        None => true,
    }
}

fn select_for_shield(utxos: &[Utxo], mint: Option<Pubkey>, request: &SelectionRequest) -> Vec<usize> {
    let mut selected = Vec::new();

    if let Some(mint) = mint {
        if let Some(i) = largest_by(utxos, |u| u.amount_of(&mint), |u| u.spl_asset() == Some(mint)) {
            selected.push(i);
        }
    }

    if request.public_sol_amount.is_some_and(|a| a > 0) || mint.is_none() {
        if let Some(i) = largest_by(utxos, Utxo::sol_amount, |u| u.spl_asset().is_none()) {
            selected.push(i);
        }
    }

    selected.truncate(request.max_inputs());
    selected
}

/// Index of the largest UTXO passing `filter`, the earliest one on ties
fn largest_by(
    utxos: &[Utxo],
    amount: impl Fn(&Utxo) -> u64,
    filter: impl Fn(&Utxo) -> bool,
) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (i, utxo) in utxos.iter().enumerate().filter(|(_, u)| filter(u)) {
        let value = amount(utxo);
        if best.is_none_or(|(_, b)| value > b) {
            best = Some((i, value));
        }
    }
    best.map(|(i, _)| i)
}

fn select_for_spend(
    utxos: &[Utxo],
    mint: Option<Pubkey>,
    request: &SelectionRequest,
) -> Result<Vec<usize>, SelectInUtxosError> {
    let max = request.max_inputs();
    let unshield = request.action == Action::Unshield;

    let required_spl = u128::from(if unshield {
        request.public_spl_amount.unwrap_or(0)
    } else {
        0
    }) + request
        .recipients
        .iter()
        .map(|r| u128::from(r.spl_amount))
        .sum::<u128>();

    let required_sol = u128::from(if unshield {
        request.public_sol_amount.unwrap_or(0)
    } else {
        0
    }) + request
        .recipients
        .iter()
        .map(|r| u128::from(r.sol_amount))
        .sum::<u128>()
        + u128::from(request.relayer_fee.unwrap_or(0));

    let spl_of = |i: usize| mint.map_or(0, |m| u128::from(utxos[i].amount_of(&m)));
    let sol_of = |i: usize| u128::from(utxos[i].sol_amount());

    let sol_sum = |selection: &[usize]| selection.iter().map(|&i| sol_of(i)).sum::<u128>();

    // sol phase
    if required_spl == 0 {
        let native_only = sorted_desc(
            (0..utxos.len()).filter(|&i| utxos[i].spl_asset().is_none()),
            sol_of,
        );
        if let Some(selected) = biggest_to_threshold(&native_only, sol_of, required_sol, max) {
            return Ok(selected);
        }

        let candidates = sorted_desc(
            (0..utxos.len()).filter(|&i| !holds_foreign_mint(&utxos[i], mint)),
            sol_of,
        );
        return threshold_options(&candidates, sol_of, required_sol, max)
            .into_iter()
            .find(|option| holds_one_mint(utxos, option))
            .ok_or_else(|| {
                fail(
                    SelectInUtxosErrorCode::FailedToSelectSolUtxo,
                    format!("no {max} utxos hold {required_sol} native"),
                )
            });
    }

    // spl phase
    let mint = mint.ok_or_else(|| {
        fail(
            SelectInUtxosErrorCode::NoPublicMintProvided,
            "spl amount requested without mint",
        )
    })?;
    let candidates = sorted_desc(
        (0..utxos.len()).filter(|&i| utxos[i].spl_asset() == Some(mint)),
        spl_of,
    );
    let options = threshold_options(&candidates, spl_of, required_spl, max);
    let mut selected = match options.first() {
        None => {
            return Err(fail(
                SelectInUtxosErrorCode::FailedToFindUtxoCombination,
                format!("no {max} utxos hold {required_spl} of {mint}"),
            ));
        }
        Some(single) if single.len() == 1 => single.clone(),
        Some(pair) => {
            // both slots are taken, so the pair itself has to cover the native amount
            let shortfall = required_sol.saturating_sub(sol_sum(pair));
            return options
                .iter()
                .find(|option| sol_sum(option) >= required_sol)
                .cloned()
                .ok_or_else(|| {
                    fail(
                        SelectInUtxosErrorCode::FailedToSelectSolUtxo,
                        format!("native shortfall of {shortfall}"),
                    )
                });
        }
    };

    let selected_sol = sol_sum(&selected);
    if selected_sol >= required_sol {
        return Ok(selected);
    }

    let remaining: Vec<usize> = (0..utxos.len())
        .filter(|i| !selected.contains(i) && !holds_foreign_mint(&utxos[*i], Some(mint)))
        .collect();
    let patch_order: Vec<usize> = sorted_desc(
        remaining.iter().copied().filter(|&i| utxos[i].spl_asset().is_none()),
        sol_of,
    )
    .into_iter()
    .chain(sorted_desc(
        remaining.iter().copied().filter(|&i| utxos[i].spl_asset().is_some()),
        sol_of,
    ))
    .collect();

    // the spl phase only takes a second slot when the first falls short
    if selected.len() < max {
        let shortfall = required_sol - selected_sol;
        if let Some(&patch) = patch_order.iter().find(|&&i| sol_of(i) >= shortfall) {
            selected.push(patch);
            return Ok(selected);
        }
    }

    Err(fail(
        SelectInUtxosErrorCode::FailedToSelectSolUtxo,
        format!("native shortfall of {}", required_sol - selected_sol),
    ))
}

/// Stable descending sort of candidate indices
fn sorted_desc(indices: impl Iterator<Item = usize>, amount: impl Fn(usize) -> u128) -> Vec<usize> {
    let mut sorted: Vec<usize> = indices.collect();
    sorted.sort_by(|a, b| amount(*b).cmp(&amount(*a)));
    sorted
}

/// Take the largest candidate, then the smallest later one that crosses `threshold`
fn biggest_to_threshold(
    candidates: &[usize],
    amount: impl Fn(usize) -> u128,
    threshold: u128,
    max: usize,
) -> Option<Vec<usize>> {
    threshold_options(candidates, amount, threshold, max)
        .into_iter()
        .next()
}

/// Selections reaching `threshold` in order of preference
///
/// The largest candidate alone if it suffices, otherwise paired with every
/// later candidate that crosses the threshold, smallest first. Candidates of
/// equal amount keep their order.
fn threshold_options(
    candidates: &[usize],
    amount: impl Fn(usize) -> u128,
    threshold: u128,
    max: usize,
) -> Vec<Vec<usize>> {
    let Some((&first, rest)) = candidates.split_first() else {
        return Vec::new();
    };
    let first_amount = amount(first);
    if first_amount >= threshold {
        return vec![vec![first]];
    }
    if max < 2 {
        return Vec::new();
    }

    let needed = threshold - first_amount;
    let mut seconds: Vec<usize> = rest
        .iter()
        .copied()
        .filter(|&candidate| amount(candidate) >= needed)
        .collect();
    seconds.sort_by_key(|&candidate| amount(candidate));
    seconds.into_iter().map(|second| vec![first, second]).collect()
}
