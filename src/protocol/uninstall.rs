//! Uninstall: pay the outcome of an app back into the free balance and drop
//! the app.

use super::{
    context::{expect_signature, verify_counterparty, Context},
    Effects, PersistCommand, ProtocolError, ProtocolOutput,
};
use crate::{
    channel::{compute_free_balance_increments, StateChannel},
    commitment::Commitment,
    messages::{ProtocolMessage, Seq, StepPayload, UninstallParams},
};

async fn prepare(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &UninstallParams,
) -> Result<StateChannel, ProtocolError> {
    let channel = ctx.load_channel().await?;
    let app = channel.get_app_instance(&params.app_identity_hash)?;

    let outcome = ctx.app_logic.compute_outcome(app).await?;
    let increments = compute_free_balance_increments(app.interpreter_params(), &outcome)?;
    let updated = channel
        .free_balance_state()?
        .remove_active_app(params.app_identity_hash)?
        .apply_increments(&increments)?;

    fx.validate(ctx.validation(Some(&channel), Some(app)))
        .await?;
    Ok(channel.uninstall_app(&params.app_identity_hash, updated)?)
}

pub(crate) async fn initiate(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &UninstallParams,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let channel = prepare(ctx, fx, params).await?;

    let mut free_balance = ctx.free_balance_commitment(&channel);
    let mine = fx.sign(free_balance.hash_to_sign()).await?;

    let reply = fx
        .send_and_wait(ctx.message(
            counterparty,
            Seq::Step(1),
            StepPayload::Signature { signature: mine },
        ))
        .await?;
    let theirs = expect_signature(&reply)?;
    verify_counterparty(&counterparty, free_balance.hash_to_sign(), theirs)?;
    free_balance.add_signatures(counterparty.signer_address(), mine, theirs)?;

    fx.persist(PersistCommand::RemoveInstance {
        channel: channel.clone(),
        app_identity_hash: params.app_identity_hash,
        free_balance_update: free_balance,
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
    params: &UninstallParams,
    msg: &ProtocolMessage,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    let channel = prepare(ctx, fx, params).await?;

    let mut free_balance = ctx.free_balance_commitment(&channel);
    let theirs = expect_signature(msg)?;
    verify_counterparty(&counterparty, free_balance.hash_to_sign(), theirs)?;
    let mine = fx.sign(free_balance.hash_to_sign()).await?;
    free_balance.add_signatures(counterparty.signer_address(), mine, theirs)?;

    fx.persist(PersistCommand::RemoveInstance {
        channel: channel.clone(),
        app_identity_hash: params.app_identity_hash,
        free_balance_update: free_balance,
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
