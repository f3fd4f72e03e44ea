//! Bridge Pool and HTLC Contract Encoding
//!
//! Calldata and log decoding for the EVM bridge contracts, built from
//! raw selectors and 32-byte ABI words. Pools announce new HTLCs
//! through two events; each HTLC exposes parameterless getters.

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::rpc::types::Log;
use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;

use crate::domain::htlc::{HtlcStatus, Phase};

/// Emitted by a pool when it funds an HTLC the user can charge.
pub const PROVISIONED_EVENT: &str = "ContractProvisioned(address,uint256)";
/// Emitted by a pool when it mints a signed HTLC.
pub const MINTED_EVENT: &str = "ContractMinted(address,uint256)";

pub const LOCK_TIME_FN: &str = "lockTime()";
pub const STATUS_FN: &str = "status()";
pub const AMOUNT_FN: &str = "amount()";

/// Decimals of the chain's native currency.
pub const NATIVE_DECIMALS: u32 = 18;

/// Topic0 of an event signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// Calldata for a parameterless function.
pub fn calldata(signature: &str) -> Bytes {
    Bytes::copy_from_slice(&keccak256(signature.as_bytes())[..4])
}

/// Topics of both discovery events.
pub fn discovery_topics() -> Vec<B256> {
    vec![event_topic(PROVISIONED_EVENT), event_topic(MINTED_EVENT)]
}

/// Phase announced by a discovery event topic.
pub fn phase_of_topic(topic: &B256) -> Option<Phase> {
    if *topic == event_topic(PROVISIONED_EVENT) {
        Some(Phase::Chargeable)
    } else if *topic == event_topic(MINTED_EVENT) {
        Some(Phase::Signed)
    } else {
        None
    }
}

/// HTLC address and phase carried by a discovery log.
///
/// Logs of other events, or without the indexed address, yield `None`.
pub fn htlc_from_log(log: &Log) -> Option<(Address, Phase)> {
    let topics = log.topics();
    let phase = phase_of_topic(topics.first()?)?;
    let htlc = Address::from_word(*topics.get(1)?);
    Some((htlc, phase))
}

/// First 32-byte word of a call result.
pub fn decode_word(data: &[u8]) -> Result<U256> {
    if data.len() < 32 {
        bail!("expected a 32-byte word, got {} bytes", data.len());
    }
    Ok(U256::from_be_slice(&data[..32]))
}

/// Status word of an HTLC.
pub fn decode_status(data: &[u8]) -> Result<HtlcStatus> {
    let code = decode_word(data)?;
    let code = u64::try_from(code).context("status does not fit in u64")?;
    HtlcStatus::from_code(code).with_context(|| format!("unknown HTLC status {code}"))
}

/// Timestamp word (Unix seconds).
pub fn decode_timestamp(data: &[u8]) -> Result<u64> {
    let value = decode_word(data)?;
    u64::try_from(value).context("timestamp does not fit in u64")
}

/// Scale a raw token amount by `decimals`.
pub fn to_decimal(raw: U256, decimals: u32) -> Result<Decimal> {
    let mantissa = u128::try_from(raw).context("amount does not fit in u128")?;
    let mantissa = i128::try_from(mantissa).context("amount does not fit in i128")?;
    Decimal::try_from_i128_with_scale(mantissa, decimals)
        .with_context(|| format!("amount {raw} with {decimals} decimals is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::LogData;
    use rust_decimal_macros::dec;

    fn log(topics: Vec<B256>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(topics, Bytes::new()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_selectors_match_known_values() {
        assert_eq!(&calldata(AMOUNT_FN)[..], &[0xaa, 0x8c, 0x21, 0x7c]);
        assert_eq!(&calldata(STATUS_FN)[..], &[0x20, 0x0d, 0x2e, 0xd2]);
        assert_eq!(&calldata(LOCK_TIME_FN)[..], &[0x0d, 0x66, 0x80, 0x87]);
    }

    #[test]
    fn test_htlc_from_log() {
        let htlc = Address::repeat_byte(0x11);
        let provisioned = log(vec![event_topic(PROVISIONED_EVENT), htlc.into_word()]);
        let minted = log(vec![event_topic(MINTED_EVENT), htlc.into_word()]);

        assert_eq!(htlc_from_log(&provisioned), Some((htlc, Phase::Chargeable)));
        assert_eq!(htlc_from_log(&minted), Some((htlc, Phase::Signed)));
    }

    #[test]
    fn test_foreign_or_truncated_log_ignored() {
        let other = log(vec![event_topic("Transfer(address,address,uint256)"), B256::ZERO]);
        let truncated = log(vec![event_topic(MINTED_EVENT)]);

        assert_eq!(htlc_from_log(&other), None);
        assert_eq!(htlc_from_log(&truncated), None);
    }

    #[test]
    fn test_decode_status() {
        let word = U256::from(2).to_be_bytes::<32>();
        assert_eq!(decode_status(&word).unwrap(), HtlcStatus::Refunded);

        let word = U256::from(9).to_be_bytes::<32>();
        assert!(decode_status(&word).is_err());
        assert!(decode_status(&[0u8; 8]).is_err());
    }

    #[test]
    fn test_to_decimal_scales() {
        let one_and_half_eth = U256::from(1_500_000_000_000_000_000_u128);
        assert_eq!(to_decimal(one_and_half_eth, 18).unwrap(), dec!(1.5));
        assert_eq!(to_decimal(U256::from(2_500_000), 6).unwrap(), dec!(2.5));
        assert!(to_decimal(U256::MAX, 18).is_err());
    }
}
