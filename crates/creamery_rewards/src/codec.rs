//! # Word Codec
//!
//! Reward specifications arrive, and claim payouts leave, in a 32-byte word
//! layout compatible with contract-style ABI encoders:
//!
//! ```text
//! reward spec:  [min][max][offset=96][len][id_0]...[id_len-1]
//! currency:     [amount]
//! item:         [item_id][amount]
//! legendary:    (empty)
//! ```
//!
//! Every word is a big-endian unsigned integer. Values wider than u128 are
//! rejected rather than truncated.

use crate::catalog::ItemId;
use crate::error::{RewardError, RewardResult};

/// Size of one encoded word.
pub const WORD: usize = 32;

/// Appends `value` as one big-endian word.
pub fn push_word(buf: &mut Vec<u8>, value: u128) {
    buf.extend_from_slice(&[0u8; 16]);
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Reads the word starting at byte `offset`.
///
/// # Errors
///
/// Returns [`RewardError::InvalidConfiguration`] if the data is truncated and
/// [`RewardError::ArithmeticOverflow`] if the word does not fit in a u128.
pub fn read_word(data: &[u8], offset: usize) -> RewardResult<u128> {
    let end = offset
        .checked_add(WORD)
        .ok_or_else(|| RewardError::invalid("truncated reward data"))?;
    let word = data
        .get(offset..end)
        .ok_or_else(|| RewardError::invalid("truncated reward data"))?;

    let (high, low) = word.split_at(16);
    if high.iter().any(|&b| b != 0) {
        return Err(RewardError::ArithmeticOverflow);
    }

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(low);
    Ok(u128::from_be_bytes(bytes))
}

fn read_offset(data: &[u8], offset: usize) -> RewardResult<usize> {
    usize::try_from(read_word(data, offset)?).map_err(|_| RewardError::invalid("truncated reward data"))
}

/// Decoded `(min, max, ids)` triple of a reward specification.
pub type RawRewardSpec = (u128, u128, Vec<ItemId>);

/// Decodes a `(min, max, ids[])` reward specification.
///
/// # Errors
///
/// Returns an error for truncated data, out-of-range words or item ids.
pub fn decode_reward_spec(data: &[u8]) -> RewardResult<RawRewardSpec> {
    let min = read_word(data, 0)?;
    let max = read_word(data, WORD)?;
    let ids_at = read_offset(data, 2 * WORD)?;
    let len = read_offset(data, ids_at)?;

    let body = ids_at
        .checked_add(WORD)
        .ok_or_else(|| RewardError::invalid("truncated reward data"))?;
    let needed = len
        .checked_mul(WORD)
        .and_then(|bytes| bytes.checked_add(body))
        .ok_or_else(|| RewardError::invalid("truncated reward data"))?;
    if data.len() < needed {
        return Err(RewardError::invalid("truncated reward data"));
    }

    let mut ids = Vec::with_capacity(len);
    for i in 0..len {
        let raw = read_word(data, body + i * WORD)?;
        let id = ItemId::try_from(raw).map_err(|_| {
            RewardError::InvalidConfiguration(format!("item id {raw} out of range"))
        })?;
        ids.push(id);
    }

    Ok((min, max, ids))
}

/// Encodes a `(min, max, ids[])` reward specification.
#[must_use]
pub fn encode_reward_spec(min: u128, max: u128, ids: &[ItemId]) -> Vec<u8> {
    let mut buf = Vec::with_capacity((4 + ids.len()) * WORD);
    push_word(&mut buf, min);
    push_word(&mut buf, max);
    push_word(&mut buf, (3 * WORD) as u128);
    push_word(&mut buf, ids.len() as u128);
    for &id in ids {
        push_word(&mut buf, u128::from(id));
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_matches_encode() {
        let data = encode_reward_spec(10, 20, &[1, 2, 3, 4, 5]);
        assert_eq!(data.len(), 9 * WORD);
        assert_eq!(decode_reward_spec(&data).unwrap(), (10, 20, vec![1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_decode_empty_ids() {
        let data = encode_reward_spec(10, 20, &[]);
        assert_eq!(decode_reward_spec(&data).unwrap(), (10, 20, Vec::new()));
    }

    #[test]
    fn test_truncated_data_rejected() {
        let data = encode_reward_spec(10, 20, &[1, 2, 3]);
        let err = decode_reward_spec(&data[..data.len() - 1]).unwrap_err();
        assert_eq!(err, RewardError::invalid("truncated reward data"));
        assert!(decode_reward_spec(&[]).is_err());
    }

    #[test]
    fn test_oversized_word_rejected() {
        let mut data = encode_reward_spec(10, 20, &[1]);
        data[0] = 1;
        assert_eq!(decode_reward_spec(&data), Err(RewardError::ArithmeticOverflow));
    }

    #[test]
    fn test_item_id_out_of_range() {
        let mut data = Vec::new();
        push_word(&mut data, 1);
        push_word(&mut data, 2);
        push_word(&mut data, 96);
        push_word(&mut data, 1);
        push_word(&mut data, u128::from(u32::MAX) + 1);
        assert!(matches!(
            decode_reward_spec(&data),
            Err(RewardError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_huge_length_does_not_allocate() {
        let mut data = Vec::new();
        push_word(&mut data, 1);
        push_word(&mut data, 2);
        push_word(&mut data, 96);
        push_word(&mut data, u128::from(u64::MAX));
        assert!(decode_reward_spec(&data).is_err());
    }
}
