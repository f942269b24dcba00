//! Standard (non-packed) ABI encoding, `abi.encode(...)` in Solidity.
//!
//! Every value occupies one or more 32 byte slots. Static values are written
//! inline (head), dynamic values (`bytes`, `string`, `T[]` and anything
//! containing them) are written after all heads (tail), with the head holding
//! the offset of the value relative to the start of the enclosing sequence.

use super::{token::Token, types::U256};

/// Size of each slot in bytes.
pub const SLOT_SIZE: usize = 32;

/// Sink for encoded bytes, e.g. a `Vec<u8>` or a running hash.
pub trait Writer {
    fn write(&mut self, slot: &[u8]);
}

impl Writer for Vec<u8> {
    fn write(&mut self, slot: &[u8]) {
        self.extend_from_slice(slot);
    }
}

/// Encode `tokens` as the top level argument list (like the arguments of a
/// function call, or `abi.encode(a, b, c)`).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_sequence(tokens, &mut out);
    out
}

/// [encode] into an arbitrary [Writer].
pub fn to_writer<W: Writer>(tokens: &[Token], writer: &mut W) {
    writer.write(&encode(tokens));
}

/// Encode a function call: 4 byte selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = super::selector(signature).to_vec();
    encode_sequence(args, &mut out);
    out
}

fn head_size(token: &Token) -> usize {
    if token.is_dynamic() {
        return SLOT_SIZE;
    }
    match token {
        Token::FixedArray(items) | Token::Tuple(items) => items.iter().map(head_size).sum(),
        _ => SLOT_SIZE,
    }
}

fn encode_sequence(tokens: &[Token], out: &mut Vec<u8>) {
    let heads_len: usize = tokens.iter().map(head_size).sum();
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            write_uint(out, U256::from(heads_len + tail.len()));
            encode_token(token, &mut tail);
        } else {
            encode_token(token, out);
        }
    }
    out.extend_from_slice(&tail);
}

fn encode_token(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Address(addr) => {
            // Addresses are right aligned (like uints) instead of left aligned
            // like bytesN.
            out.extend_from_slice(&[0u8; SLOT_SIZE - 20]);
            out.extend_from_slice(&addr.0);
        }
        Token::Uint(v) => write_uint(out, *v),
        Token::Bool(b) => write_uint(out, U256::from(u8::from(*b))),
        Token::FixedBytes(bytes) => write_padded(out, bytes),
        Token::Bytes(bytes) => {
            write_uint(out, U256::from(bytes.len()));
            write_padded(out, bytes);
        }
        Token::String(s) => {
            write_uint(out, U256::from(s.len()));
            write_padded(out, s.as_bytes());
        }
        Token::FixedArray(items) | Token::Tuple(items) => encode_sequence(items, out),
        Token::Array(items) => {
            write_uint(out, U256::from(items.len()));
            encode_sequence(items, out);
        }
    }
}

fn write_uint(out: &mut Vec<u8>, v: U256) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Write `bytes` left aligned, zero padded to a multiple of [SLOT_SIZE].
fn write_padded(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    let rem = bytes.len() % SLOT_SIZE;
    if rem != 0 {
        out.resize(out.len() + SLOT_SIZE - rem, 0);
    }
}
