//! Interpreters turn the outcome of a finalized app into payouts.
//!
//! At install time the parameters the interpreter is configured with are
//! derived from the deposits ([compute_interpreter_parameters]); at uninstall
//! time the outcome computed by the app is mapped to free balance increments
//! using the same parameters ([compute_free_balance_increments]).

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{app_instance::Deposits, CoinTransfer, TokenIndexedCoinTransferMap};
use crate::{
    abiencode::{
        encode,
        types::{Address, U256},
        Token,
    },
    config::NetworkContext,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpreterError {
    #[error("{outcome_type} requires both deposits in the same asset, got {initiator} and {responder}")]
    DifferentAssets {
        outcome_type: OutcomeType,
        initiator: Address,
        responder: Address,
    },
    #[error("unknown outcome type `{0}`")]
    UnknownOutcomeType(String),
    #[error("outcome pays out {total} of token {token}, the limit is {limit}")]
    ExceedsLimit {
        token: Address,
        total: U256,
        limit: U256,
    },
    #[error("outcome does not fit the {0} interpreter")]
    OutcomeMismatch(OutcomeType),
    #[error("amount overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeType {
    TwoPartyFixedOutcome,
    SingleAssetTwoPartyCoinTransfer,
    MultiAssetMultiPartyCoinTransfer,
}

impl OutcomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::TwoPartyFixedOutcome => "TWO_PARTY_FIXED_OUTCOME",
            OutcomeType::SingleAssetTwoPartyCoinTransfer => "SINGLE_ASSET_TWO_PARTY_COIN_TRANSFER",
            OutcomeType::MultiAssetMultiPartyCoinTransfer => {
                "MULTI_ASSET_MULTI_PARTY_COIN_TRANSFER"
            }
        }
    }
}

impl fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeType {
    type Err = InterpreterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            OutcomeType::TwoPartyFixedOutcome,
            OutcomeType::SingleAssetTwoPartyCoinTransfer,
            OutcomeType::MultiAssetMultiPartyCoinTransfer,
        ]
        .into_iter()
        .find(|t| t.as_str() == s)
        .ok_or_else(|| InterpreterError::UnknownOutcomeType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoPartyFixedOutcomeInterpreterParams {
    pub player_addrs: [Address; 2],
    pub amount: U256,
    pub token_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleAssetTwoPartyCoinTransferInterpreterParams {
    pub limit: U256,
    pub token_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiAssetMultiPartyCoinTransferInterpreterParams {
    pub limit: Vec<U256>,
    pub token_addresses: Vec<Address>,
}

/// Exactly one parameter set per app, selected by its outcome type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcomeType", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterpreterParams {
    TwoPartyFixedOutcome(TwoPartyFixedOutcomeInterpreterParams),
    SingleAssetTwoPartyCoinTransfer(SingleAssetTwoPartyCoinTransferInterpreterParams),
    MultiAssetMultiPartyCoinTransfer(MultiAssetMultiPartyCoinTransferInterpreterParams),
}

impl InterpreterParams {
    pub fn outcome_type(&self) -> OutcomeType {
        match self {
            InterpreterParams::TwoPartyFixedOutcome(_) => OutcomeType::TwoPartyFixedOutcome,
            InterpreterParams::SingleAssetTwoPartyCoinTransfer(_) => {
                OutcomeType::SingleAssetTwoPartyCoinTransfer
            }
            InterpreterParams::MultiAssetMultiPartyCoinTransfer(_) => {
                OutcomeType::MultiAssetMultiPartyCoinTransfer
            }
        }
    }

    /// Value tree matching the encodings the interpreter contracts decode:
    /// - `tuple(address[2] playerAddrs, uint256 amount, address tokenAddress)`
    /// - `tuple(uint256 limit, address tokenAddress)`
    /// - `tuple(uint256[] limit, address[] tokenAddresses)`
    pub fn to_token(&self) -> Token {
        match self {
            InterpreterParams::TwoPartyFixedOutcome(p) => Token::Tuple(vec![
                Token::FixedArray(p.player_addrs.iter().copied().map(Token::Address).collect()),
                Token::Uint(p.amount),
                Token::Address(p.token_address),
            ]),
            InterpreterParams::SingleAssetTwoPartyCoinTransfer(p) => {
                Token::Tuple(vec![Token::Uint(p.limit), Token::Address(p.token_address)])
            }
            InterpreterParams::MultiAssetMultiPartyCoinTransfer(p) => Token::Tuple(vec![
                Token::Array(p.limit.iter().copied().map(Token::Uint).collect()),
                Token::Array(p.token_addresses.iter().copied().map(Token::Address).collect()),
            ]),
        }
    }

    /// `abi.encode(params)`, the `bytes` handed to the interpreter.
    pub fn encode(&self) -> Vec<u8> {
        encode(&[self.to_token()])
    }

    pub fn interpreter_address(&self, network: &NetworkContext) -> Address {
        match self.outcome_type() {
            OutcomeType::TwoPartyFixedOutcome => network.two_party_fixed_outcome_interpreter,
            OutcomeType::SingleAssetTwoPartyCoinTransfer => {
                network.single_asset_two_party_coin_transfer_interpreter
            }
            OutcomeType::MultiAssetMultiPartyCoinTransfer => {
                network.multi_asset_multi_party_coin_transfer_interpreter
            }
        }
    }
}

/// Derive the interpreter parameters of an app from its deposits.
///
/// `players` are the free balance addresses of the app initiator and
/// responder. With `disable_limit` coin transfer apps may pay out up to
/// `U256::MAX`, which is only safe if the app logic itself bounds payouts.
pub fn compute_interpreter_parameters(
    outcome_type: OutcomeType,
    deposits: &Deposits,
    players: [Address; 2],
    disable_limit: bool,
) -> Result<InterpreterParams, InterpreterError> {
    let same_asset = deposits.initiator_deposit_asset_id == deposits.responder_deposit_asset_id;
    let different_assets = || InterpreterError::DifferentAssets {
        outcome_type,
        initiator: deposits.initiator_deposit_asset_id,
        responder: deposits.responder_deposit_asset_id,
    };
    let limit = |amount: U256| if disable_limit { U256::MAX } else { amount };

    match outcome_type {
        OutcomeType::TwoPartyFixedOutcome => {
            if !same_asset {
                return Err(different_assets());
            }
            Ok(InterpreterParams::TwoPartyFixedOutcome(
                TwoPartyFixedOutcomeInterpreterParams {
                    player_addrs: players,
                    amount: deposits.total()?,
                    token_address: deposits.initiator_deposit_asset_id,
                },
            ))
        }
        OutcomeType::SingleAssetTwoPartyCoinTransfer => {
            if !same_asset {
                return Err(different_assets());
            }
            Ok(InterpreterParams::SingleAssetTwoPartyCoinTransfer(
                SingleAssetTwoPartyCoinTransferInterpreterParams {
                    limit: limit(deposits.total()?),
                    token_address: deposits.initiator_deposit_asset_id,
                },
            ))
        }
        OutcomeType::MultiAssetMultiPartyCoinTransfer => {
            let params = if same_asset {
                MultiAssetMultiPartyCoinTransferInterpreterParams {
                    limit: vec![limit(deposits.total()?)],
                    token_addresses: vec![deposits.initiator_deposit_asset_id],
                }
            } else {
                MultiAssetMultiPartyCoinTransferInterpreterParams {
                    limit: vec![
                        limit(deposits.initiator_deposit),
                        limit(deposits.responder_deposit),
                    ],
                    token_addresses: vec![
                        deposits.initiator_deposit_asset_id,
                        deposits.responder_deposit_asset_id,
                    ],
                }
            };
            Ok(InterpreterParams::MultiAssetMultiPartyCoinTransfer(params))
        }
    }
}

/// Outcome of a [OutcomeType::TwoPartyFixedOutcome] app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TwoPartyOutcome {
    SendToAddrOne,
    SendToAddrTwo,
    SplitAndSendToBothAddrs,
}

/// What an app computes once it is finalized, in the shape its interpreter
/// expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppOutcome {
    TwoPartyFixed(TwoPartyOutcome),
    SingleAssetCoinTransfer([CoinTransfer; 2]),
    /// One list of transfers per token of the interpreter params.
    MultiAssetCoinTransfer(Vec<Vec<CoinTransfer>>),
}

/// Map an app outcome to the amounts it adds to the free balance.
pub fn compute_free_balance_increments(
    params: &InterpreterParams,
    outcome: &AppOutcome,
) -> Result<TokenIndexedCoinTransferMap, InterpreterError> {
    let mut increments = TokenIndexedCoinTransferMap::new();

    match (params, outcome) {
        (InterpreterParams::TwoPartyFixedOutcome(p), AppOutcome::TwoPartyFixed(outcome)) => {
            let [one, two] = p.player_addrs;
            let payouts = match outcome {
                TwoPartyOutcome::SendToAddrOne => [(one, p.amount)],
                TwoPartyOutcome::SendToAddrTwo => [(two, p.amount)],
                TwoPartyOutcome::SplitAndSendToBothAddrs => {
                    // The odd unit goes to the second player, nothing is lost.
                    let half = p.amount / 2;
                    credit(&mut increments, p.token_address, one, half)?;
                    [(two, p.amount - half)]
                }
            };
            for (to, amount) in payouts {
                credit(&mut increments, p.token_address, to, amount)?;
            }
        }
        (
            InterpreterParams::SingleAssetTwoPartyCoinTransfer(p),
            AppOutcome::SingleAssetCoinTransfer(transfers),
        ) => {
            credit_all(&mut increments, p.token_address, transfers, p.limit)?;
        }
        (
            InterpreterParams::MultiAssetMultiPartyCoinTransfer(p),
            AppOutcome::MultiAssetCoinTransfer(per_token),
        ) => {
            let tokens = p.token_addresses.len();
            if per_token.len() != tokens || p.limit.len() != tokens {
                return Err(InterpreterError::OutcomeMismatch(params.outcome_type()));
            }
            let limits = p.token_addresses.iter().zip(&p.limit);
            for ((token, limit), transfers) in limits.zip(per_token) {
                credit_all(&mut increments, *token, transfers, *limit)?;
            }
        }
        _ => return Err(InterpreterError::OutcomeMismatch(params.outcome_type())),
    }

    Ok(increments)
}

fn credit(
    increments: &mut TokenIndexedCoinTransferMap,
    token: Address,
    to: Address,
    amount: U256,
) -> Result<(), InterpreterError> {
    let entry = increments
        .entry(token)
        .or_default()
        .entry(to)
        .or_insert_with(U256::zero);
    *entry = entry.checked_add(amount).ok_or(InterpreterError::Overflow)?;
    Ok(())
}

fn credit_all(
    increments: &mut TokenIndexedCoinTransferMap,
    token: Address,
    transfers: &[CoinTransfer],
    limit: U256,
) -> Result<(), InterpreterError> {
    let mut total = U256::zero();
    for transfer in transfers {
        total = total
            .checked_add(transfer.amount)
            .ok_or(InterpreterError::Overflow)?;
    }
    if total > limit {
        return Err(InterpreterError::ExceedsLimit {
            token,
            total,
            limit,
        });
    }
    for transfer in transfers {
        credit(increments, token, transfer.to, transfer.amount)?;
    }
    Ok(())
}
