//! Setup: both parties sign the setup commitment and the first free balance
//! update of a new channel.

use super::{
    context::{expect_signatures, verify_counterparty, Context},
    Effects, PersistCommand, ProtocolError, ProtocolOutput,
};
use crate::{
    channel::{CriticalStateChannelAddresses, StateChannel},
    commitment::Commitment,
    messages::{ProtocolMessage, Seq, SetupParams, StepPayload},
};

fn new_channel(ctx: &Context<'_>, params: &SetupParams) -> Result<StateChannel, ProtocolError> {
    let network = &ctx.config.network;
    Ok(StateChannel::setup_channel(
        network.identity_app,
        CriticalStateChannelAddresses {
            proxy_factory: network.proxy_factory,
            multisig_mastercopy: network.multisig_mastercopy,
        },
        params.multisig_address,
        params.initiator_identifier,
        params.responder_identifier,
        &ctx.config.free_balance,
    )?)
}

async fn assert_new(ctx: &Context<'_>, params: &SetupParams) -> Result<(), ProtocolError> {
    match ctx.store.get_state_channel(params.multisig_address).await? {
        Some(_) => Err(ProtocolError::ChannelExists(params.multisig_address)),
        None => Ok(()),
    }
}

pub(crate) async fn initiate(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &SetupParams,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    assert_new(ctx, params).await?;
    let channel = new_channel(ctx, params)?;
    fx.validate(ctx.validation(Some(&channel), None)).await?;

    let mut setup = ctx.setup_commitment(&channel);
    let mut free_balance = ctx.free_balance_commitment(&channel);
    let my_setup = fx.sign(setup.hash_to_sign()).await?;
    let my_free_balance = fx.sign(free_balance.hash_to_sign()).await?;

    let reply = fx
        .send_and_wait(ctx.message(
            counterparty,
            Seq::Step(1),
            StepPayload::Signatures {
                signature: my_setup,
                signature2: my_free_balance,
            },
        ))
        .await?;
    let (their_setup, their_free_balance) = expect_signatures(&reply)?;
    verify_counterparty(&counterparty, setup.hash_to_sign(), their_setup)?;
    verify_counterparty(&counterparty, free_balance.hash_to_sign(), their_free_balance)?;

    let them = counterparty.signer_address();
    setup.add_signatures(them, my_setup, their_setup)?;
    free_balance.add_signatures(them, my_free_balance, their_free_balance)?;

    fx.persist(PersistCommand::CreateChannel {
        channel: channel.clone(),
        setup,
        free_balance_update: free_balance,
    })
    .await?;

    Ok(ProtocolOutput {
        channel,
        app_identity_hash: None,
    })
}

pub(crate) async fn respond(
    ctx: &Context<'_>,
    fx: &mut dyn Effects,
    params: &SetupParams,
    msg: &ProtocolMessage,
) -> Result<ProtocolOutput, ProtocolError> {
    let counterparty = ctx.counterparty()?;
    assert_new(ctx, params).await?;
    let channel = new_channel(ctx, params)?;
    fx.validate(ctx.validation(Some(&channel), None)).await?;

    let mut setup = ctx.setup_commitment(&channel);
    let mut free_balance = ctx.free_balance_commitment(&channel);
    let (their_setup, their_free_balance) = expect_signatures(msg)?;
    verify_counterparty(&counterparty, setup.hash_to_sign(), their_setup)?;
    verify_counterparty(&counterparty, free_balance.hash_to_sign(), their_free_balance)?;

    let my_setup = fx.sign(setup.hash_to_sign()).await?;
    let my_free_balance = fx.sign(free_balance.hash_to_sign()).await?;

    let them = counterparty.signer_address();
    setup.add_signatures(them, my_setup, their_setup)?;
    free_balance.add_signatures(them, my_free_balance, their_free_balance)?;

    fx.persist(PersistCommand::CreateChannel {
        channel: channel.clone(),
        setup,
        free_balance_update: free_balance,
    })
    .await?;

    fx.send(ctx.message(
        counterparty,
        Seq::Unassigned,
        StepPayload::Signatures {
            signature: my_setup,
            signature2: my_free_balance,
        },
    ))
    .await?;

    Ok(ProtocolOutput {
        channel,
        app_identity_hash: None,
    })
}
