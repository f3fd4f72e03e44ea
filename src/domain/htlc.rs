//! Normalized HTLC records shared by both chain families.
//!
//! Collectors translate chain-native contract state into [`HtlcRecord`]
//! so that the reconciliation engine and the metrics derivation never
//! see Archethic JSON or EVM ABI types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Chain a record was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum SourceChain {
    /// The Archethic ledger network.
    Archethic,
    /// An EVM-compatible chain identified by its chain id.
    Evm {
        /// EIP-155 chain id.
        chain_id: u64,
    },
}

impl std::fmt::Display for SourceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archethic => write!(f, "archethic"),
            Self::Evm { chain_id } => write!(f, "evm:{chain_id}"),
        }
    }
}

/// Lifecycle stage of an HTLC at observation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Funded, claim secret not yet revealed.
    Chargeable,
    /// Claim or refund secret revealed.
    Signed,
}

impl Phase {
    /// Both phases, in board order.
    pub const ALL: [Self; 2] = [Self::Chargeable, Self::Signed];

    /// Label value used in metric names and cache keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chargeable => "chargeable",
            Self::Signed => "signed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-chain HTLC status, identical numbering on both families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtlcStatus {
    Pending,
    Withdrawn,
    Refunded,
}

impl HtlcStatus {
    pub const ALL: [Self; 3] = [Self::Pending, Self::Withdrawn, Self::Refunded];

    /// Decode the numeric status code stored by the contracts.
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Withdrawn),
            2 => Some(Self::Refunded),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Withdrawn => "withdrawn",
            Self::Refunded => "refunded",
        }
    }

    /// Withdrawn and refunded contracts never change again.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for HtlcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTLC contract as observed on its home chain.
///
/// `lock_time` holds the Archethic `end_time` or the EVM `lockTime()`,
/// both Unix seconds. Everything after `status` is descriptive payload
/// that the core passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcRecord {
    /// Chain the contract lives on.
    pub source: SourceChain,
    /// Phase the collector observed it in.
    pub phase: Phase,
    /// Chain-native contract address.
    pub address: String,
    /// Expiry, Unix seconds.
    pub lock_time: u64,
    /// Address of the linked contract on the other chain family, if encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_contract: Option<String>,
    /// EVM chain targeted by an Archethic HTLC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_chain_id: Option<u64>,
    /// Contract status.
    pub status: HtlcStatus,
    /// Locked amount, scaled by token decimals.
    pub amount: Decimal,
    /// Token symbol (UCO, ETH, ...).
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,
    /// Creation time, Unix seconds, when the chain exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<u64>,
}

impl HtlcRecord {
    /// Chain identifier consulted by the retired-chain filter.
    ///
    /// Archethic records are identified by the EVM chain they bridge to,
    /// EVM records by their own chain.
    pub const fn chain_id(&self) -> Option<u64> {
        match self.source {
            SourceChain::Archethic => self.counterparty_chain_id,
            SourceChain::Evm { chain_id } => Some(chain_id),
        }
    }

    /// Whether the contract is still pending past its lock time.
    pub fn is_expired_pending(&self, now_secs: u64) -> bool {
        self.status == HtlcStatus::Pending && self.lock_time <= now_secs
    }
}
