use super::{interpreter::*, *};
use crate::{
    abiencode::Token,
    config::FreeBalanceConfig,
    sig::{ChannelSigner, Signer},
};
use rand::{rngs::StdRng, SeedableRng};

const NATIVE: Address = Address::ZERO;
const TOKEN: Address = Address([0xee; 20]);

fn counter(n: u64) -> Token {
    Token::Tuple(vec![Token::Uint(n.into())])
}

fn counter_interface() -> AppInterface {
    AppInterface {
        addr: Address([0x44; 20]),
        state_encoding: "tuple(uint256 counter)".to_string(),
        action_encoding: Some("tuple(uint256 increment)".to_string()),
    }
}

fn identifiers() -> [Identifier; 2] {
    let mut rng = StdRng::seed_from_u64(42);
    [
        Signer::new(&mut rng).identifier(),
        Signer::new(&mut rng).identifier(),
    ]
}

fn channel() -> StateChannel {
    let [alice, bob] = identifiers();
    StateChannel::setup_channel(
        Address([0x01; 20]),
        CriticalStateChannelAddresses {
            proxy_factory: Address([0x02; 20]),
            multisig_mastercopy: Address([0x03; 20]),
        },
        Address([0x11; 20]),
        alice,
        bob,
        &FreeBalanceConfig::default(),
    )
    .unwrap()
}

/// Both parties deposited 10 of the native token.
fn funded_channel() -> StateChannel {
    let channel = channel();
    let [alice, bob] = *channel.multisig_owners();
    let fb = channel
        .free_balance_state()
        .unwrap()
        .deposit(NATIVE, alice, 10u64.into())
        .unwrap()
        .deposit(NATIVE, bob, 10u64.into())
        .unwrap();
    channel.set_free_balance(fb).unwrap()
}

fn deposits(a: u64, asset_a: Address, b: u64, asset_b: Address) -> Deposits {
    Deposits {
        initiator_deposit: a.into(),
        initiator_deposit_asset_id: asset_a,
        responder_deposit: b.into(),
        responder_deposit_asset_id: asset_b,
    }
}

fn proposal(
    channel: &StateChannel,
    deposits: Deposits,
    outcome_type: OutcomeType,
) -> AppInstanceProposal {
    let [initiator, responder] = *channel.user_identifiers();
    let mut p = AppInstanceProposal {
        identity_hash: Hash::default(),
        multisig_address: channel.multisig_address(),
        initiator_identifier: initiator,
        responder_identifier: responder,
        app_interface: counter_interface(),
        app_seq_no: channel.monotonic_num_proposed_apps() + 1,
        deposits,
        default_timeout: 100,
        state_timeout: 10,
        initial_state: counter(0),
        outcome_type,
        meta: Default::default(),
        disable_limit: false,
    };
    p.identity_hash = p.identity().hash();
    p
}

fn install(
    channel: &StateChannel,
    p: AppInstanceProposal,
) -> Result<(StateChannel, Hash), ModelError> {
    let channel = channel.add_proposal(p.clone())?;
    let app = AppInstance::from_proposal(&p, p.interpreter_params()?);
    let decrements = p.deposits.decrements(p.participants());
    let hash = app.identity_hash();
    Ok((channel.install_app(app, &decrements)?, hash))
}

fn free_balance_after(
    channel: &StateChannel,
    hash: &Hash,
    outcome: &AppOutcome,
) -> Result<FreeBalance, ModelError> {
    let app = channel.get_app_instance(hash)?;
    let increments = compute_free_balance_increments(app.interpreter_params(), outcome)?;
    channel
        .free_balance_state()?
        .remove_active_app(*hash)?
        .apply_increments(&increments)
}

#[test]
fn setup_channel_starts_empty() {
    let channel = channel();
    let [alice, bob] = identifiers();

    assert_eq!(
        channel.multisig_owners(),
        &[alice.signer_address(), bob.signer_address()]
    );
    assert_eq!(channel.free_balance().latest_version_number(), 1);
    assert_eq!(channel.free_balance().app_seq_no(), FREE_BALANCE_APP_SEQ_NO);
    assert_eq!(channel.schema_version(), SCHEMA_VERSION);

    let fb = channel.free_balance_state().unwrap();
    assert_eq!(fb.tokens().copied().collect::<Vec<_>>(), vec![NATIVE]);
    assert_eq!(fb.total(NATIVE).unwrap(), U256::zero());
    assert!(fb.active_apps().is_empty());
    assert!(channel.most_recently_installed_app_instance().is_none());
}

#[test]
fn setup_channel_rejects_single_participant() {
    let [alice, _] = identifiers();
    let err = StateChannel::setup_channel(
        Address([0x01; 20]),
        CriticalStateChannelAddresses {
            proxy_factory: Address([0x02; 20]),
            multisig_mastercopy: Address([0x03; 20]),
        },
        Address([0x11; 20]),
        alice,
        alice,
        &FreeBalanceConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ModelError::SameParticipant(_)));
}

#[test]
fn free_balance_state_roundtrips_through_token() {
    let channel = funded_channel();
    let fb = channel.free_balance_state().unwrap();
    let decoded = FreeBalance::from_state(*fb.owners(), &fb.to_state()).unwrap();
    assert_eq!(decoded, fb);
    crate::abiencode::check_encoding(FREE_BALANCE_STATE_ENCODING, &fb.to_state()).unwrap();
}

#[test]
fn install_moves_same_asset_deposits_into_app() {
    let channel = funded_channel();
    let [alice, bob] = *channel.multisig_owners();
    let p = proposal(
        &channel,
        deposits(3, NATIVE, 4, NATIVE),
        OutcomeType::SingleAssetTwoPartyCoinTransfer,
    );

    // Both decrements share the token entry instead of replacing each other.
    let decrements = p.deposits.decrements(p.participants());
    assert_eq!(decrements.len(), 1);
    assert_eq!(decrements[&NATIVE].len(), 2);

    let (installed, hash) = install(&channel, p).unwrap();
    let fb = installed.free_balance_state().unwrap();
    assert_eq!(fb.balance(NATIVE, alice), U256::from(7));
    assert_eq!(fb.balance(NATIVE, bob), U256::from(6));
    assert_eq!(fb.active_apps(), &[hash]);
    assert_eq!(installed.free_balance().latest_version_number(), 3);
    assert!(installed.proposed_app_instances().is_empty());
    assert_eq!(installed.monotonic_num_proposed_apps(), 1);

    let app = installed.get_app_instance(&hash).unwrap();
    assert_eq!(app.latest_version_number(), 1);
    assert_eq!(
        app.interpreter_params(),
        &InterpreterParams::SingleAssetTwoPartyCoinTransfer(
            SingleAssetTwoPartyCoinTransferInterpreterParams {
                limit: 7u64.into(),
                token_address: NATIVE,
            }
        )
    );
    assert_eq!(
        installed
            .most_recently_installed_app_instance()
            .map(AppInstance::identity_hash),
        Some(hash)
    );
}

#[test]
fn install_rejects_insufficient_funds() {
    let channel = funded_channel();
    let p = proposal(
        &channel,
        deposits(11, NATIVE, 0, NATIVE),
        OutcomeType::SingleAssetTwoPartyCoinTransfer,
    );
    let err = install(&channel, p).unwrap_err();
    assert!(matches!(
        err,
        ModelError::InsufficientFunds { available, requested, .. }
            if available == U256::from(10) && requested == U256::from(11)
    ));

    let [alice, _] = *channel.user_identifiers();
    channel
        .assert_sufficient_funds_within_free_balance(&alice, NATIVE, 10u64.into())
        .unwrap();
    assert!(channel
        .assert_sufficient_funds_within_free_balance(&alice, TOKEN, 1u64.into())
        .is_err());
}

#[test]
fn install_twice_is_rejected() {
    let channel = funded_channel();
    let p = proposal(
        &channel,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    let (installed, hash) = install(&channel, p.clone()).unwrap();
    let app = installed.get_app_instance(&hash).unwrap().clone();
    let err = installed
        .install_app(app, &p.deposits.decrements(p.participants()))
        .unwrap_err();
    assert!(matches!(err, ModelError::AppAlreadyInstalled(h) if h == hash));
}

#[test]
fn proposals_take_the_next_sequence_number() {
    let channel = funded_channel();
    let mut p = proposal(
        &channel,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    p.app_seq_no = 2;
    p.identity_hash = p.identity().hash();
    assert!(matches!(
        channel.add_proposal(p).unwrap_err(),
        ModelError::InvalidAppSeqNo { expected: 1, got: 2 }
    ));

    let p = proposal(
        &channel,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    let hash = p.identity_hash;
    let with_proposal = channel.add_proposal(p).unwrap();
    let without = with_proposal.remove_proposal(&hash).unwrap();

    // Rejected proposals do not give back their sequence number.
    assert_eq!(without.monotonic_num_proposed_apps(), 1);
    let next = proposal(
        &without,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    assert_eq!(next.app_seq_no, 2);
    assert_ne!(next.identity_hash, hash);
}

#[test]
fn proposal_with_wrong_identity_hash_is_rejected() {
    let channel = funded_channel();
    let mut p = proposal(
        &channel,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    p.identity_hash = Hash([7; 32]);
    assert!(matches!(
        channel.add_proposal(p).unwrap_err(),
        ModelError::IdentityHashMismatch { .. }
    ));
}

#[test]
fn proposal_state_must_match_encoding() {
    let channel = funded_channel();
    let mut p = proposal(
        &channel,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    p.initial_state = Token::Bool(true);
    assert!(matches!(
        channel.add_proposal(p).unwrap_err(),
        ModelError::Abi(_)
    ));
}

#[test]
fn state_versions_increase_by_one() {
    let channel = funded_channel();
    let p = proposal(
        &channel,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    let (channel, hash) = install(&channel, p).unwrap();

    for version in [0, 1, 3] {
        let err = channel.set_state(&hash, counter(1), version, 10).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidVersionNumber { current: 1, proposed } if proposed == version
        ));
    }

    let channel = channel
        .apply_action(&hash, counter(1), counter(1), 2, 20)
        .unwrap();
    let app = channel.get_app_instance(&hash).unwrap();
    assert_eq!(app.latest_version_number(), 2);
    assert_eq!(app.latest_state(), &counter(1));
    assert_eq!(app.latest_action(), Some(&counter(1)));
    assert_eq!(app.state_timeout(), 20);

    // The action is not part of the identity.
    assert_eq!(app.identity_hash(), hash);
}

#[test]
fn set_state_checks_encoding() {
    let channel = funded_channel();
    let p = proposal(
        &channel,
        deposits(1, NATIVE, 1, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    let (channel, hash) = install(&channel, p).unwrap();
    let err = channel
        .set_state(&hash, Token::Tuple(vec![Token::Bool(false)]), 2, 10)
        .unwrap_err();
    assert!(matches!(err, ModelError::Abi(_)));
}

#[test]
fn uninstall_conserves_value() {
    let channel = funded_channel();
    let [alice, bob] = *channel.multisig_owners();
    let p = proposal(
        &channel,
        deposits(3, NATIVE, 4, NATIVE),
        OutcomeType::SingleAssetTwoPartyCoinTransfer,
    );
    let (installed, hash) = install(&channel, p).unwrap();

    let outcome = AppOutcome::SingleAssetCoinTransfer([
        CoinTransfer::new(alice, 6u64.into()),
        CoinTransfer::new(bob, 1u64.into()),
    ]);
    let updated = free_balance_after(&installed, &hash, &outcome).unwrap();
    let uninstalled = installed.uninstall_app(&hash, updated).unwrap();

    let fb = uninstalled.free_balance_state().unwrap();
    assert_eq!(fb.balance(NATIVE, alice), U256::from(13));
    assert_eq!(fb.balance(NATIVE, bob), U256::from(7));
    assert_eq!(
        fb.total(NATIVE).unwrap(),
        channel.free_balance_state().unwrap().total(NATIVE).unwrap()
    );
    assert!(fb.active_apps().is_empty());
    assert!(uninstalled.app_instances().is_empty());
    assert_eq!(uninstalled.free_balance().latest_version_number(), 4);
}

#[test]
fn uninstall_rejects_minted_value() {
    let channel = funded_channel();
    let [alice, bob] = *channel.multisig_owners();
    let p = proposal(
        &channel,
        deposits(3, NATIVE, 4, NATIVE),
        OutcomeType::SingleAssetTwoPartyCoinTransfer,
    );
    let (installed, hash) = install(&channel, p).unwrap();

    // Pays out less than deposited.
    let outcome = AppOutcome::SingleAssetCoinTransfer([
        CoinTransfer::new(alice, 1u64.into()),
        CoinTransfer::new(bob, 1u64.into()),
    ]);
    let updated = free_balance_after(&installed, &hash, &outcome).unwrap();
    assert!(matches!(
        installed.uninstall_app(&hash, updated).unwrap_err(),
        ModelError::ValueNotConserved { expected, actual, .. }
            if expected == U256::from(20) && actual == U256::from(15)
    ));

    // Mints value out of thin air.
    let minted = installed
        .free_balance_state()
        .unwrap()
        .remove_active_app(hash)
        .unwrap()
        .deposit(NATIVE, alice, 100u64.into())
        .unwrap();
    assert!(matches!(
        installed.uninstall_app(&hash, minted).unwrap_err(),
        ModelError::ValueNotConserved { .. }
    ));

    // Keeps the app active.
    let still_active = installed.free_balance_state().unwrap();
    assert!(matches!(
        installed.uninstall_app(&hash, still_active).unwrap_err(),
        ModelError::AppStillActive(_)
    ));
}

#[test]
fn uninstall_reports_overflowing_totals() {
    let channel = funded_channel();
    let [alice, bob] = *channel.multisig_owners();
    let p = proposal(
        &channel,
        deposits(3, NATIVE, 4, NATIVE),
        OutcomeType::SingleAssetTwoPartyCoinTransfer,
    );
    let (installed, hash) = install(&channel, p).unwrap();

    let maxed = installed
        .free_balance_state()
        .unwrap()
        .remove_active_app(hash)
        .unwrap()
        .deposit(NATIVE, alice, U256::MAX - U256::from(7))
        .unwrap()
        .deposit(NATIVE, bob, U256::MAX - U256::from(6))
        .unwrap();
    assert_eq!(maxed.balance(NATIVE, alice), U256::MAX);
    assert!(matches!(maxed.total(NATIVE), Err(ModelError::Overflow)));
    assert!(matches!(
        installed.uninstall_app(&hash, maxed).unwrap_err(),
        ModelError::Overflow
    ));
}

#[test]
fn state_channel_roundtrips_through_json() {
    let channel = funded_channel();
    let p = proposal(
        &channel,
        deposits(3, NATIVE, 4, NATIVE),
        OutcomeType::TwoPartyFixedOutcome,
    );
    let (channel, _) = install(&channel, p).unwrap();
    let json = serde_json::to_string(&channel).unwrap();
    let back: StateChannel = serde_json::from_str(&json).unwrap();
    assert_eq!(back, channel);
}

// Interpreter parameters

fn players() -> [Address; 2] {
    [Address([0xaa; 20]), Address([0xbb; 20])]
}

#[test]
fn two_party_fixed_outcome_sums_deposits() {
    let params = compute_interpreter_parameters(
        OutcomeType::TwoPartyFixedOutcome,
        &deposits(3, TOKEN, 4, TOKEN),
        players(),
        false,
    )
    .unwrap();
    assert_eq!(
        params,
        InterpreterParams::TwoPartyFixedOutcome(TwoPartyFixedOutcomeInterpreterParams {
            player_addrs: players(),
            amount: 7u64.into(),
            token_address: TOKEN,
        })
    );
}

#[test]
fn single_asset_outcomes_require_same_asset() {
    for outcome_type in [
        OutcomeType::TwoPartyFixedOutcome,
        OutcomeType::SingleAssetTwoPartyCoinTransfer,
    ] {
        let err = compute_interpreter_parameters(
            outcome_type,
            &deposits(3, TOKEN, 4, NATIVE),
            players(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, InterpreterError::DifferentAssets { .. }));
    }
}

#[test]
fn disable_limit_lifts_coin_transfer_limit() {
    let params = compute_interpreter_parameters(
        OutcomeType::SingleAssetTwoPartyCoinTransfer,
        &deposits(3, TOKEN, 4, TOKEN),
        players(),
        true,
    )
    .unwrap();
    assert_eq!(
        params,
        InterpreterParams::SingleAssetTwoPartyCoinTransfer(
            SingleAssetTwoPartyCoinTransferInterpreterParams {
                limit: U256::MAX,
                token_address: TOKEN,
            }
        )
    );
}

#[test]
fn multi_asset_params() {
    let same = compute_interpreter_parameters(
        OutcomeType::MultiAssetMultiPartyCoinTransfer,
        &deposits(3, TOKEN, 4, TOKEN),
        players(),
        false,
    )
    .unwrap();
    assert_eq!(
        same,
        InterpreterParams::MultiAssetMultiPartyCoinTransfer(
            MultiAssetMultiPartyCoinTransferInterpreterParams {
                limit: vec![7u64.into()],
                token_addresses: vec![TOKEN],
            }
        )
    );

    let different = compute_interpreter_parameters(
        OutcomeType::MultiAssetMultiPartyCoinTransfer,
        &deposits(3, TOKEN, 4, NATIVE),
        players(),
        false,
    )
    .unwrap();
    assert_eq!(
        different,
        InterpreterParams::MultiAssetMultiPartyCoinTransfer(
            MultiAssetMultiPartyCoinTransferInterpreterParams {
                limit: vec![3u64.into(), 4u64.into()],
                token_addresses: vec![TOKEN, NATIVE],
            }
        )
    );
}

#[test]
fn interpreter_params_encoding() {
    let params = InterpreterParams::SingleAssetTwoPartyCoinTransfer(
        SingleAssetTwoPartyCoinTransferInterpreterParams {
            limit: 7u64.into(),
            token_address: TOKEN,
        },
    );
    let mut expected = [0u8; 64];
    expected[31] = 7;
    expected[44..].copy_from_slice(&[0xee; 20]);
    assert_eq!(params.encode(), expected.to_vec());
}

#[test]
fn unknown_outcome_type_is_an_error() {
    assert_eq!(
        "TWO_PARTY_FIXED_OUTCOME".parse::<OutcomeType>().unwrap(),
        OutcomeType::TwoPartyFixedOutcome
    );
    assert_eq!(
        "REFUND_OUTCOME".parse::<OutcomeType>().unwrap_err(),
        InterpreterError::UnknownOutcomeType("REFUND_OUTCOME".to_string())
    );
    assert!(serde_json::from_str::<OutcomeType>("\"REFUND_OUTCOME\"").is_err());
}

#[test]
fn split_outcome_loses_nothing() {
    let params = InterpreterParams::TwoPartyFixedOutcome(TwoPartyFixedOutcomeInterpreterParams {
        player_addrs: players(),
        amount: 7u64.into(),
        token_address: TOKEN,
    });
    let increments = compute_free_balance_increments(
        &params,
        &AppOutcome::TwoPartyFixed(TwoPartyOutcome::SplitAndSendToBothAddrs),
    )
    .unwrap();
    let [one, two] = players();
    assert_eq!(increments[&TOKEN][&one], U256::from(3));
    assert_eq!(increments[&TOKEN][&two], U256::from(4));

    let increments = compute_free_balance_increments(
        &params,
        &AppOutcome::TwoPartyFixed(TwoPartyOutcome::SendToAddrTwo),
    )
    .unwrap();
    assert_eq!(increments[&TOKEN].len(), 1);
    assert_eq!(increments[&TOKEN][&two], U256::from(7));
}

#[test]
fn coin_transfers_above_limit_are_rejected() {
    let params = InterpreterParams::SingleAssetTwoPartyCoinTransfer(
        SingleAssetTwoPartyCoinTransferInterpreterParams {
            limit: 7u64.into(),
            token_address: TOKEN,
        },
    );
    let [one, two] = players();
    let err = compute_free_balance_increments(
        &params,
        &AppOutcome::SingleAssetCoinTransfer([
            CoinTransfer::new(one, 5u64.into()),
            CoinTransfer::new(two, 3u64.into()),
        ]),
    )
    .unwrap_err();
    assert_eq!(
        err,
        InterpreterError::ExceedsLimit {
            token: TOKEN,
            total: 8u64.into(),
            limit: 7u64.into(),
        }
    );

    let err = compute_free_balance_increments(
        &params,
        &AppOutcome::TwoPartyFixed(TwoPartyOutcome::SendToAddrOne),
    )
    .unwrap_err();
    assert!(matches!(err, InterpreterError::OutcomeMismatch(_)));
}
