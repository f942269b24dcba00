use super::*;
use crate::{
    config::NetworkContext,
    sig::{ChannelSigner, Signer},
};
use rand::{rngs::StdRng, SeedableRng};

fn h(s: &str) -> Hash {
    s.parse().unwrap()
}

fn identity() -> AppIdentity {
    AppIdentity {
        multisig_address: Address([0x11; 20]),
        channel_nonce: 1,
        participants: [Address([0x22; 20]), Address([0x33; 20])],
        app_definition: Address([0x44; 20]),
        default_timeout: 172_800,
    }
}

fn network() -> NetworkContext {
    let mut rng = StdRng::seed_from_u64(0);
    NetworkContext {
        challenge_registry: Address([0x66; 20]),
        conditional_transaction_delegate_target: Address([0x55; 20]),
        multi_asset_multi_party_coin_transfer_interpreter: Address([0x77; 20]),
        ..NetworkContext::random(&mut rng)
    }
}

#[test]
fn identity_hash_vector() {
    assert_eq!(
        identity().hash(),
        h("0xc607d91d0235e68b12e6603c1ce8f92e69ecbe544d892e030085494aa94bd8b5")
    );
}

#[test]
fn identity_hash_depends_on_participant_order() {
    let mut swapped = identity();
    swapped.participants.swap(0, 1);
    assert_ne!(swapped.hash(), identity().hash());
}

#[test]
fn set_state_hash_vector() {
    let state_hash = crate::abiencode::to_hash(&[Token::Uint(5u64.into())]);
    let commitment = SetStateCommitment::new(
        Address([0x66; 20]),
        identity(),
        state_hash,
        1,
        0,
        [Address([0x22; 20]), Address([0x33; 20])],
    );
    assert_eq!(
        commitment.hash_to_sign(),
        h("0x2a857d19384ec5dffb37ee4f6fa0cd54892efa4f3a7e148f83d9beb0918f652a")
    );
}

#[test]
fn setup_hash_vector() {
    let commitment = SetupCommitment::new(
        &network(),
        Address([0x11; 20]),
        [Address([0x22; 20]), Address([0x33; 20])],
        identity().hash(),
    );
    assert_eq!(
        commitment.hash_to_sign(),
        h("0x9379266bb67e607144964c46ebd9f9bfbab8e3cca08cdcdfac476d0e71ca6f0a")
    );
}

/// Whoever assembles, and whichever of the two signs first, the signature of
/// `owners[0]` ends up at position 0.
#[test]
fn signature_order_follows_owner_order() {
    let mut rng = StdRng::seed_from_u64(7);
    let alice = Signer::new(&mut rng);
    let bob = Signer::new(&mut rng);

    for owners in [
        [alice.address(), bob.address()],
        [bob.address(), alice.address()],
    ] {
        let commitment =
            SetupCommitment::new(&network(), Address([0x11; 20]), owners, identity().hash());
        let digest = commitment.hash_to_sign();
        let alice_sig = alice.sign_message(digest).unwrap();
        let bob_sig = bob.sign_message(digest).unwrap();

        let mut at_alice = commitment.clone();
        at_alice
            .add_signatures(bob.address(), alice_sig, bob_sig)
            .unwrap();
        let mut at_bob = commitment.clone();
        at_bob
            .add_signatures(alice.address(), bob_sig, alice_sig)
            .unwrap();

        assert_eq!(at_alice.signatures, at_bob.signatures);
        at_alice.assert_signatures().unwrap();

        let sigs = at_alice.signatures.get().unwrap();
        let first = if owners[0] == alice.address() {
            alice_sig
        } else {
            bob_sig
        };
        assert_eq!(sigs[0], first);
    }
}

#[test]
fn add_signatures_rejects_stranger() {
    let mut rng = StdRng::seed_from_u64(8);
    let alice = Signer::new(&mut rng);
    let bob = Signer::new(&mut rng);
    let mallory = Signer::new(&mut rng);

    let mut commitment = SetupCommitment::new(
        &network(),
        Address([0x11; 20]),
        [alice.address(), bob.address()],
        identity().hash(),
    );
    let digest = commitment.hash_to_sign();
    let err = commitment
        .add_signatures(
            mallory.address(),
            alice.sign_message(digest).unwrap(),
            mallory.sign_message(digest).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, CommitmentError::NotAnOwner(a) if a == mallory.address()));
}

#[test]
fn signed_transaction_requires_valid_signatures() {
    let mut rng = StdRng::seed_from_u64(9);
    let alice = Signer::new(&mut rng);
    let bob = Signer::new(&mut rng);

    let state_hash = crate::abiencode::to_hash(&[Token::Uint(5u64.into())]);
    let mut commitment = SetStateCommitment::new(
        Address([0x66; 20]),
        identity(),
        state_hash,
        1,
        0,
        [alice.address(), bob.address()],
    );
    assert!(matches!(
        commitment.signed_transaction(),
        Err(CommitmentError::MissingSignature(0))
    ));

    let digest = commitment.hash_to_sign();
    let alice_sig = alice.sign_message(digest).unwrap();

    // Bob signs something else.
    let wrong = bob.sign_message(state_hash).unwrap();
    commitment
        .add_signatures(bob.address(), alice_sig, wrong)
        .unwrap();
    assert!(matches!(
        commitment.signed_transaction(),
        Err(CommitmentError::InvalidSignature { position: 1, .. })
    ));

    let bob_sig = bob.sign_message(digest).unwrap();
    commitment
        .add_signatures(bob.address(), alice_sig, bob_sig)
        .unwrap();
    let tx = commitment.signed_transaction().unwrap();
    assert_eq!(tx.to, Address([0x66; 20]));
    assert_eq!(&tx.data[..4], &[0xa6, 0x9a, 0xa2, 0xab]);
}

#[test]
fn conditional_transaction_targets_multisig() {
    let mut rng = StdRng::seed_from_u64(10);
    let alice = Signer::new(&mut rng);
    let bob = Signer::new(&mut rng);

    let mut commitment = ConditionalTransactionCommitment::new(
        &network(),
        Address([0x11; 20]),
        [alice.address(), bob.address()],
        identity().hash(),
        h("0x0101010101010101010101010101010101010101010101010101010101010101"),
        Address([0x99; 20]),
        vec![1, 2, 3],
    );
    let digest = commitment.hash_to_sign();
    commitment
        .add_signatures(
            alice.address(),
            bob.sign_message(digest).unwrap(),
            alice.sign_message(digest).unwrap(),
        )
        .unwrap();

    let tx = commitment.signed_transaction().unwrap();
    assert_eq!(tx.to, Address([0x11; 20]));
    assert_eq!(tx.value, U256::zero());
    // execTransaction(address,uint256,bytes,uint8,bytes[])
    assert_eq!(&tx.data[..4], &[0x58, 0xcb, 0x5e, 0x5a]);
}

#[test]
fn commitments_roundtrip_through_json() {
    let commitment = SetupCommitment::new(
        &network(),
        Address([0x11; 20]),
        [Address([0x22; 20]), Address([0x33; 20])],
        identity().hash(),
    );
    let json = serde_json::to_string(&commitment).unwrap();
    let back: SetupCommitment = serde_json::from_str(&json).unwrap();
    assert_eq!(back, commitment);
    assert_eq!(back.hash_to_sign(), commitment.hash_to_sign());
}
