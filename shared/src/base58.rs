//! Base58 and Base58Check encoding, as used for addresses.
//!
//! Leading zero bytes of the input become leading `'1'` characters in the
//! output; the remainder is the big-endian base-58 representation of the
//! integer formed by the non-zero-prefix bytes.

use crate::error::BlockchainError;
use crate::hash::hash256;

const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encodes `data` as a Base58 string.
#[must_use]
pub fn encode(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|&&b| b == 0).count();

    // Repeated long division of the big-endian number `data` by 58; each
    // remainder is the next base-58 digit, least-significant first.
    let mut digits: Vec<u8> = Vec::new();
    let mut number = data[zeros..].to_vec();
    while !number.is_empty() {
        let mut remainder = 0u32;
        let mut quotient = Vec::with_capacity(number.len());
        for &byte in &number {
            let acc = remainder * 256 + u32::from(byte);
            let q = acc / 58;
            remainder = acc % 58;
            if !quotient.is_empty() || q != 0 {
                quotient.push(q as u8);
            }
        }
        digits.push(remainder as u8);
        number = quotient;
    }

    let mut out = String::with_capacity(zeros + digits.len());
    out.extend(std::iter::repeat('1').take(zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}

/// Decodes a Base58 string back into bytes.
///
/// # Errors
///
/// Returns an error if `s` contains a character outside the Base58
/// alphabet.
pub fn decode(s: &str) -> Result<Vec<u8>, BlockchainError> {
    let zeros = s.chars().take_while(|&c| c == '1').count();

    let mut number: Vec<u8> = Vec::new();
    for c in s.chars().skip(zeros) {
        let digit = ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or(BlockchainError::Base58InvalidChar(c))? as u32;

        // number = number * 58 + digit, big-endian byte array.
        let mut carry = digit;
        for byte in number.iter_mut().rev() {
            let acc = u32::from(*byte) * 58 + carry;
            *byte = (acc % 256) as u8;
            carry = acc / 256;
        }
        while carry > 0 {
            number.insert(0, (carry % 256) as u8);
            carry /= 256;
        }
    }

    let mut out = vec![0u8; zeros];
    out.extend(number);
    Ok(out)
}

/// Encodes `payload` with a trailing 4-byte `hash256` checksum, then
/// Base58-encodes the result.
#[must_use]
pub fn check_encode(payload: &[u8]) -> String {
    let checksum = hash256(payload);
    let mut full = payload.to_vec();
    full.extend_from_slice(&checksum[..4]);
    encode(&full)
}

/// Decodes a Base58Check string, verifying the trailing checksum.
///
/// # Errors
///
/// Returns an error if the string is not valid Base58, is too short to
/// contain a checksum, or the checksum does not match.
pub fn check_decode(s: &str) -> Result<Vec<u8>, BlockchainError> {
    let full = decode(s)?;
    if full.len() < 4 {
        return Err(BlockchainError::Base58PayloadTooShort);
    }
    let (payload, checksum) = full.split_at(full.len() - 4);
    let expected = hash256(payload);
    if expected[..4] != *checksum {
        return Err(BlockchainError::Base58ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_arbitrary_bytes() {
        let data = b"hello world, base58!";
        let encoded = encode(data);
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn leading_zero_bytes_become_leading_ones() {
        let data = [0u8, 0, 1, 2, 3];
        let encoded = encode(&data);
        assert!(encoded.starts_with("11"));
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn empty_input_encodes_to_empty_string() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn check_round_trip() {
        let payload = vec![0x00u8; 21];
        let encoded = check_encode(&payload);
        assert_eq!(check_decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn check_decode_rejects_tampered_checksum() {
        let payload = [0x00u8, 1, 2, 3, 4];
        let mut encoded = check_encode(&payload);
        encoded.push('1');
        assert!(check_decode(&encoded).is_err());
    }

    #[test]
    fn rejects_invalid_alphabet_characters() {
        // '0', 'O', 'I', 'l' are excluded from the Base58 alphabet.
        assert!(decode("0").is_err());
        assert!(decode("O").is_err());
    }
}
