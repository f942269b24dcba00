//! TakeAction: both sides apply the same action to an installed app and sign
//! the resulting state.

use super::{
    context::{expect_signature, verify_counterparty, Context},
    Effects, PersistCommand, ProtocolError, ProtocolOutput,
};
use crate::{
    channel::{AppInstance, ModelError, StateChannel},
    commitment::Commitment,
    messages::{ProtocolMessage, Seq, StepPayload, TakeActionParams},
};

async fn prepare(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &TakeActionParams,
) -> Result<(StateChannel, AppInstance), ProtocolError> {
    let channel = ctx.load_channel().await?;
    let app = channel.get_app_instance(&params.app_identity_hash)?;

    let state = ctx.app_logic.apply_action(app, &params.action).await?;
    let version_number = app
        .latest_version_number()
        .checked_add(1)
        .ok_or(ModelError::Overflow)?;
    let next = channel.apply_action(
        &params.app_identity_hash,
        params.action.clone(),
        state,
        version_number,
        params.state_timeout,
    )?;
    let updated = next.get_app_instance(&params.app_identity_hash)?.clone();

    fx.validate(ctx.validation(Some(&channel), Some(&updated)))
        .await?;
    Ok((next, updated))
}

pub(crate) async fn initiate(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &TakeActionParams,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let (channel, app) = prepare(ctx, fx, params).await?;

    let mut update = ctx.set_state_commitment(&channel, &app);
    let mine = fx.sign(update.hash_to_sign()).await?;

    let reply = fx
        .send_and_wait(ctx.message(
            counterparty,
            Seq::Step(1),
            StepPayload::Signature { signature: mine },
        ))
        .await?;
    let theirs = expect_signature(&reply)?;
    verify_counterparty(&counterparty, update.hash_to_sign(), theirs)?;
    update.add_signatures(counterparty.signer_address(), mine, theirs)?;

    fx.persist(PersistCommand::UpdateInstance {
        channel: channel.clone(),
        app_identity_hash: params.app_identity_hash,
        update,
    })
    .await?;

    Ok(ProtocolOutput {
        channel,
        app_identity_hash: Some(params.app_identity_hash),
    })
}

pub(crate) async fn respond(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &TakeActionParams,
    msg: &ProtocolMessage,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let (channel, app) = prepare(ctx, fx, params).await?;

    let mut update = ctx.set_state_commitment(&channel, &app);
    let theirs = expect_signature(msg)?;
    verify_counterparty(&counterparty, update.hash_to_sign(), theirs)?;
    let mine = fx.sign(update.hash_to_sign()).await?;
    update.add_signatures(counterparty.signer_address(), mine, theirs)?;

    fx.persist(PersistCommand::UpdateInstance {
        channel: channel.clone(),
        app_identity_hash: params.app_identity_hash,
        update,
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
        app_identity_hash: Some(params.app_identity_hash),
    })
}
