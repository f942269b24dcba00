use super::*;
use types::{Address, U256};

const FREE_BALANCE: &str = "tuple(address[] tokenAddresses, tuple(address to, uint256 amount)[][] balances, bytes32[] activeApps)";

#[test]
fn parse_elementary() {
    assert_eq!("address".parse(), Ok(AbiType::Address));
    assert_eq!("uint".parse(), Ok(AbiType::Uint(256)));
    assert_eq!("uint8".parse(), Ok(AbiType::Uint(8)));
    assert_eq!("bytes32".parse(), Ok(AbiType::FixedBytes(32)));
    assert_eq!("bytes".parse(), Ok(AbiType::Bytes));
    assert_eq!(" bool ".parse(), Ok(AbiType::Bool));
}

#[test]
fn parse_rejects_garbage() {
    assert!(matches!("uint7".parse::<AbiType>(), Err(Error::InvalidType(_))));
    assert!(matches!("bytes33".parse::<AbiType>(), Err(Error::InvalidType(_))));
    assert!(matches!("tuple(uint256".parse::<AbiType>(), Err(Error::InvalidType(_))));
    assert!(matches!("uint256[x]".parse::<AbiType>(), Err(Error::InvalidType(_))));
    assert!(matches!(
        "int256".parse::<AbiType>(),
        Err(Error::TypeNotYetSupported(_))
    ));
}

#[test]
fn parse_nested() {
    let ty: AbiType = FREE_BALANCE.parse().unwrap();
    let coin_transfer = AbiType::Tuple(vec![AbiType::Address, AbiType::Uint(256)]);
    assert_eq!(
        ty,
        AbiType::Tuple(vec![
            AbiType::Array(Box::new(AbiType::Address)),
            AbiType::Array(Box::new(AbiType::Array(Box::new(coin_transfer)))),
            AbiType::Array(Box::new(AbiType::FixedBytes(32))),
        ])
    );
    assert_eq!(
        ty.to_string(),
        "tuple(address[],tuple(address,uint256)[][],bytes32[])"
    );
}

#[test]
fn parse_fixed_array() {
    let ty: AbiType = "tuple(address[2] playerAddrs, uint256 amount, address tokenAddress)"
        .parse()
        .unwrap();
    assert_eq!(
        ty,
        AbiType::Tuple(vec![
            AbiType::FixedArray(Box::new(AbiType::Address), 2),
            AbiType::Uint(256),
            AbiType::Address,
        ])
    );
}

#[test]
fn check_conforming_value() {
    let state = Token::Tuple(vec![
        Token::Array(vec![Token::Address(Address::ZERO)]),
        Token::Array(vec![Token::Array(vec![
            Token::Tuple(vec![Token::Address(Address([1; 20])), Token::Uint(10u64.into())]),
            Token::Tuple(vec![Token::Address(Address([2; 20])), Token::Uint(20u64.into())]),
        ])]),
        Token::Array(vec![]),
    ]);
    check_encoding(FREE_BALANCE, &state).unwrap();
}

#[test]
fn check_rejects_mismatch() {
    let ty: AbiType = "tuple(uint8 a, address b)".parse().unwrap();

    let too_big = Token::Tuple(vec![Token::Uint(U256::from(256)), Token::Address(Address::ZERO)]);
    assert!(matches!(ty.check(&too_big), Err(Error::Mismatch { .. })));

    let wrong_arity = Token::Tuple(vec![Token::Uint(1u64.into())]);
    assert!(matches!(ty.check(&wrong_arity), Err(Error::Mismatch { .. })));

    let wrong_kind = Token::Tuple(vec![Token::Bool(true), Token::Address(Address::ZERO)]);
    assert!(matches!(ty.check(&wrong_kind), Err(Error::Mismatch { .. })));

    let fixed: AbiType = "address[2]".parse().unwrap();
    let short = Token::FixedArray(vec![Token::Address(Address::ZERO)]);
    assert!(fixed.check(&short).is_err());
}

fn nested_tuple(depth: usize) -> String {
    format!("{}uint256{}", "tuple(".repeat(depth), ")".repeat(depth))
}

#[test]
fn parse_limits_nesting() {
    assert!(nested_tuple(MAX_TYPE_DEPTH).parse::<AbiType>().is_ok());
    assert!(matches!(
        nested_tuple(MAX_TYPE_DEPTH + 1).parse::<AbiType>(),
        Err(Error::InvalidType(_))
    ));

    // Short enough to pass the length check, so only the depth stops it.
    let bare = format!("{}uint{}", "(".repeat(1_000), ")".repeat(1_000));
    assert!(bare.len() <= MAX_TYPE_LEN);
    assert!(matches!(bare.parse::<AbiType>(), Err(Error::InvalidType(_))));

    let arrays = format!("uint256{}", "[]".repeat(1_000));
    assert!(matches!(arrays.parse::<AbiType>(), Err(Error::InvalidType(_))));
}

#[test]
fn parse_limits_length() {
    let huge = nested_tuple(100_000);
    assert!(matches!(huge.parse::<AbiType>(), Err(Error::InvalidType(_))));
    assert!(matches!(
        check_encoding(&huge, &Token::Uint(1u64.into())),
        Err(Error::InvalidType(_))
    ));
}
