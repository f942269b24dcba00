//! Install: move the deposits of a proposal out of the free balance and into
//! the app.
//!
//! Two commitments are signed. The conditional transaction pays out the app
//! once it is finalized, the free balance update removes the deposits from
//! the free balance. A party only signs the free balance update once it holds
//! the counterparty's signature on the conditional transaction.

use super::{
    context::{expect_persisted, expect_signature, expect_signatures, verify_counterparty, Context},
    Effects, PersistCommand, ProtocolError, ProtocolOutput,
};
use crate::{
    channel::{AppInstance, StateChannel},
    commitment::Commitment,
    messages::{InstallParams, ProtocolMessage, Seq, StepPayload},
};

async fn prepare(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &InstallParams,
) -> Result<(StateChannel, AppInstance), ProtocolError> {
    let channel = ctx.load_channel().await?;
    let proposal = channel.get_proposal(&params.app_identity_hash)?.clone();

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

    let app = AppInstance::from_proposal(&proposal, proposal.interpreter_params()?);
    let decrements = deposits.decrements(proposal.participants());
    let next = channel.install_app(app.clone(), &decrements)?;

    let mut validation = ctx.validation(Some(&channel), Some(&app));
    validation.proposal = Some(proposal);
    fx.validate(validation).await?;
    Ok((next, app))
}

pub(crate) async fn initiate(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &InstallParams,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let them = counterparty.signer_address();
    let (channel, app) = prepare(ctx, fx, params).await?;

    let mut conditional = ctx.conditional_commitment(&channel, &app);
    let my_conditional = fx.sign(conditional.hash_to_sign()).await?;

    let reply = fx
        .send_and_wait(ctx.message(
            counterparty,
            Seq::Step(1),
            StepPayload::Signature {
                signature: my_conditional,
            },
        ))
        .await?;
    let (their_conditional, their_free_balance) = expect_signatures(&reply)?;
    verify_counterparty(&counterparty, conditional.hash_to_sign(), their_conditional)?;
    conditional.add_signatures(them, my_conditional, their_conditional)?;

    let mut free_balance = ctx.free_balance_commitment(&channel);
    verify_counterparty(&counterparty, free_balance.hash_to_sign(), their_free_balance)?;
    let my_free_balance = fx.sign(free_balance.hash_to_sign()).await?;
    free_balance.add_signatures(them, my_free_balance, their_free_balance)?;

    let app_identity_hash = app.identity_hash();
    fx.persist(PersistCommand::CreateInstance {
        channel: channel.clone(),
        app_identity_hash,
        free_balance_update: free_balance,
        conditional,
    })
    .await?;

    let ack = fx
        .send_and_wait(ctx.message(
            counterparty,
            Seq::Unassigned,
            StepPayload::Signature {
                signature: my_free_balance,
            },
        ))
        .await?;
    expect_persisted(&ack)?;

    Ok(ProtocolOutput {
        channel,
        app_identity_hash: Some(app_identity_hash),
    })
}

pub(crate) async fn respond(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &InstallParams,
    msg: &ProtocolMessage,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let them = counterparty.signer_address();
    let (channel, app) = prepare(ctx, fx, params).await?;

    let mut conditional = ctx.conditional_commitment(&channel, &app);
    let their_conditional = expect_signature(msg)?;
    verify_counterparty(&counterparty, conditional.hash_to_sign(), their_conditional)?;
    let my_conditional = fx.sign(conditional.hash_to_sign()).await?;
    conditional.add_signatures(them, my_conditional, their_conditional)?;

    let mut free_balance = ctx.free_balance_commitment(&channel);
    let my_free_balance = fx.sign(free_balance.hash_to_sign()).await?;

    let reply = fx
        .send_and_wait(ctx.message(
            counterparty,
            Seq::Unassigned,
            StepPayload::Signatures {
                signature: my_conditional,
                signature2: my_free_balance,
            },
        ))
        .await?;
    let their_free_balance = expect_signature(&reply)?;
    verify_counterparty(&counterparty, free_balance.hash_to_sign(), their_free_balance)?;
    free_balance.add_signatures(them, my_free_balance, their_free_balance)?;

    let app_identity_hash = app.identity_hash();
    fx.persist(PersistCommand::CreateInstance {
        channel: channel.clone(),
        app_identity_hash,
        free_balance_update: free_balance,
        conditional,
    })
    .await?;

    fx.send(ctx.message(counterparty, Seq::Unassigned, StepPayload::DataPersisted))
        .await?;

    Ok(ProtocolOutput {
        channel,
        app_identity_hash: Some(app_identity_hash),
    })
}
