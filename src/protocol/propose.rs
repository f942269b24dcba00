//! Propose: agree on a new app and sign its initial state, before any funds
//! are committed to it.

use super::{
    context::{expect_signature, verify_counterparty, Context},
    Effects, PersistCommand, ProtocolError, ProtocolOutput,
};
use crate::{
    channel::{AppInstanceProposal, ModelError, StateChannel},
    commitment::{AppIdentity, Commitment},
    messages::{ProposeParams, ProtocolMessage, Seq, StepPayload},
};

/// The proposal both sides derive from their own snapshot. The sequence
/// number is the next one of the channel, so a stale snapshot on either side
/// produces a different identity hash and the signatures will not match.
fn build_proposal(
    channel: &StateChannel,
    params: &ProposeParams,
) -> Result<AppInstanceProposal, ProtocolError> {
    let app_seq_no = channel
        .monotonic_num_proposed_apps()
        .checked_add(1)
        .ok_or(ModelError::Overflow)?;
    let identity = AppIdentity {
        multisig_address: params.multisig_address,
        channel_nonce: app_seq_no,
        participants: [
            params.initiator_identifier.signer_address(),
            params.responder_identifier.signer_address(),
        ],
        app_definition: params.app_interface.addr,
        default_timeout: params.default_timeout,
    };

    let proposal = AppInstanceProposal {
        identity_hash: identity.hash(),
        multisig_address: params.multisig_address,
        initiator_identifier: params.initiator_identifier,
        responder_identifier: params.responder_identifier,
        app_interface: params.app_interface.clone(),
        app_seq_no,
        deposits: params.deposits.clone(),
        default_timeout: params.default_timeout,
        state_timeout: params.state_timeout,
        initial_state: params.initial_state.clone(),
        outcome_type: params.outcome_type,
        meta: params.meta.clone(),
        disable_limit: params.disable_limit,
    };
    proposal.interpreter_params()?;

    let deposits = &proposal.deposits;
    channel.assert_sufficient_funds_within_free_balance(
        &proposal.initiator_identifier,
        deposits.initiator_deposit_asset_id,
        deposits.initiator_deposit,
    )?;
    channel.assert_sufficient_funds_within_free_balance(
        &proposal.responder_identifier,
        deposits.responder_deposit_asset_id,
        deposits.responder_deposit,
    )?;
    Ok(proposal)
}

/// Post-state and the validation context of both roles.
async fn prepare(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &ProposeParams,
) -> Result<(StateChannel, AppInstanceProposal), ProtocolError> {
    let channel = ctx.load_channel().await?;
    let proposal = build_proposal(&channel, params)?;
    let next = channel.add_proposal(proposal.clone())?;

    let mut validation = ctx.validation(Some(&channel), None);
    validation.proposal = Some(proposal.clone());
    fx.validate(validation).await?;
    Ok((next, proposal))
}

pub(crate) async fn initiate(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &ProposeParams,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let (channel, proposal) = prepare(ctx, fx, params).await?;

    let mut initial_state = ctx.proposal_commitment(&channel, &proposal);
    let mine = fx.sign(initial_state.hash_to_sign()).await?;

    let reply = fx
        .send_and_wait(ctx.message(
            counterparty,
            Seq::Step(1),
            StepPayload::Signature { signature: mine },
        ))
        .await?;
    let theirs = expect_signature(&reply)?;
    verify_counterparty(&counterparty, initial_state.hash_to_sign(), theirs)?;
    initial_state.add_signatures(counterparty.signer_address(), mine, theirs)?;

    fx.persist(PersistCommand::CreateProposal {
        channel: channel.clone(),
        app_identity_hash: proposal.identity_hash,
        initial_state,
    })
    .await?;

    Ok(ProtocolOutput {
        channel,
        app_identity_hash: Some(proposal.identity_hash),
    })
}

pub(crate) async fn respond(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &ProposeParams,
    msg: &ProtocolMessage,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let (channel, proposal) = prepare(ctx, fx, params).await?;

    let mut initial_state = ctx.proposal_commitment(&channel, &proposal);
    let theirs = expect_signature(msg)?;
    verify_counterparty(&counterparty, initial_state.hash_to_sign(), theirs)?;
    let mine = fx.sign(initial_state.hash_to_sign()).await?;
    initial_state.add_signatures(counterparty.signer_address(), mine, theirs)?;

    fx.persist(PersistCommand::CreateProposal {
        channel: channel.clone(),
        app_identity_hash: proposal.identity_hash,
        initial_state,
    })
    .await?;

    fx.send(ctx.message(
        counterparty,
        Seq::Unassigned,
        StepPayload::Signature { signature: mine },
    ))
    .await?;

    Ok(ProtocolOutput {
        channel,
        app_identity_hash: Some(proposal.identity_hash),
    })
}
