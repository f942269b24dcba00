use super::*;
use crate::abiencode::{self, Token};
use rand::{rngs::StdRng, SeedableRng};

fn data() -> Hash {
    /*
    ```solidity
    function verify_sig(address signer, bytes memory sig) public pure {
        bytes memory d;
        d = "\xa1\xa2\xa3\xa4";
        require(Sig.verify(abi.encode(d), sig, signer), "invalid signature");
    }
    ```
    */
    abiencode::to_hash(&[Token::Bytes(vec![0xa1, 0xa2, 0xa3, 0xa4])])
}

// Do not use that on any real device, this is just for testing.
const SECRET: [u8; 32] = [
    0x24, 0x4F, 0xFC, 0x73, 0xC4, 0x48, 0xB5, 0x6D, 0xDB, 0xA6, 0xA7, 0xBF, 0xA8, 0xD5, 0x8E, 0xD3,
    0x60, 0x12, 0x61, 0x1D, 0xA8, 0x3D, 0x4C, 0xB8, 0x30, 0x25, 0xEA, 0x12, 0xAC, 0xCF, 0x49, 0xFE,
];

macro_rules! make_compare_hardcoded {
    ($name:ident, $signer:ty, $address:literal, $expected_sig:literal) => {
        #[test]
        fn $name() {
            // This test may break in the future (e.g. if the dependency changes
            // internally), they exist to allow checking if a signature is valid
            // on-chain without needing a real blockchain or ganache.
            let signer = <$signer>::from_secret_bytes(&SECRET).unwrap();
            let sig = signer.sign_eth(data()).unwrap();

            println!("Address: {}", hex::encode(signer.address().0));
            println!("Sig: 0x{}", hex::encode(sig.0));

            let address = $address;
            let expected_sig = $expected_sig;

            // Sanity checks for macro user input
            assert_eq!(address.len(), 20 * 2);
            assert_eq!(expected_sig.len(), 2 + 65 * 2);

            assert_eq!(hex::encode(signer.address().0), address);
            assert_eq!(hex::encode(sig.0), &expected_sig[2..]);
        }
    };
}

macro_rules! make_a_to_b {
    ($name:ident, $signer:ty, $verifier:ty) => {
        #[test]
        fn $name() {
            let mut rng = StdRng::seed_from_u64(0);
            let signer = <$signer>::new(&mut rng);
            let msg = data();
            let sig = signer.sign_eth(msg).unwrap();

            let verifier = <$verifier>::new(&mut rng);
            let address = verifier.recover_signer(msg, sig).unwrap();

            assert_eq!(address, signer.address());
        }
    };
}

// Both backends use RFC 6979 nonces, so the signatures are identical.
make_compare_hardcoded!(
    k256_sign,
    super::k256::Signer,
    "a9572220348b1080264e81c0779f77c144790cd6",
    "0xdb101ce5201d7a04b67bdfe5c50b910524c62c0900c85997fd187a7b4e56aa990f96e031be10092befa49e713218cb14c75a6f6a5aa4699d969f4348f873f0151b"
);

#[cfg(feature = "secp256k1")]
make_compare_hardcoded!(
    secp256k1_sign,
    super::secp256k1::Signer,
    "a9572220348b1080264e81c0779f77c144790cd6",
    "0xdb101ce5201d7a04b67bdfe5c50b910524c62c0900c85997fd187a7b4e56aa990f96e031be10092befa49e713218cb14c75a6f6a5aa4699d969f4348f873f0151b"
);

make_a_to_b!(k256_to_k256, super::k256::Signer, super::k256::Signer);

#[cfg(feature = "secp256k1")]
make_a_to_b!(
    secp256k1_to_secp256k1,
    super::secp256k1::Signer,
    super::secp256k1::Signer
);

#[cfg(feature = "secp256k1")]
make_a_to_b!(
    secp256k1_to_k256,
    super::secp256k1::Signer,
    super::k256::Signer
);

#[cfg(feature = "secp256k1")]
make_a_to_b!(
    k256_to_secp256k1,
    super::k256::Signer,
    super::secp256k1::Signer
);

#[test]
fn verify_rejects_other_signer() {
    let mut rng = StdRng::seed_from_u64(1);
    let alice = Signer::new(&mut rng);
    let bob = Signer::new(&mut rng);

    let sig = alice.sign_message(data()).unwrap();
    verify(alice.address(), data(), sig).unwrap();

    match verify(bob.address(), data(), sig) {
        Err(Error::WrongSigner {
            expected,
            recovered,
        }) => {
            assert_eq!(expected, bob.address());
            assert_eq!(recovered, alice.address());
        }
        other => panic!("expected WrongSigner, got {:?}", other),
    }
}

#[test]
fn verify_rejects_tampered_digest() {
    let mut rng = StdRng::seed_from_u64(2);
    let alice = Signer::new(&mut rng);
    let sig = alice.sign_message(data()).unwrap();

    let mut other = data();
    other.0[0] ^= 1;
    assert!(verify(alice.address(), other, sig).is_err());
}

#[test]
fn invalid_v_is_an_error() {
    let mut rng = StdRng::seed_from_u64(3);
    let alice = Signer::new(&mut rng);
    let mut sig = alice.sign_message(data()).unwrap();
    sig.0[64] = 3;
    assert_eq!(recover_signer(data(), sig), Err(Error::InvalidRecoveryId(3)));
}

#[test]
fn identifier_derives_signer_address() {
    let signer = super::k256::Signer::from_secret_bytes(&SECRET).unwrap();
    let id = signer.identifier();
    assert_eq!(id.signer_address(), signer.address());

    let parsed: Identifier = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
    assert_eq!(parsed.signer_address(), signer.address());

    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(serde_json::from_str::<Identifier>(&json).unwrap(), id);
}

#[test]
fn identifier_rejects_garbage() {
    assert!("0x1234".parse::<Identifier>().is_err());
    assert!(Identifier::from_public_key_bytes(&[0x05; 33]).is_err());
}
