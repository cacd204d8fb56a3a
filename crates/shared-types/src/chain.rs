//! # Networks and Contracts
//!
//! The realm game is deployed on two networks. Each deployment is five
//! contracts; the engine addresses them by role and lets the ledger adapter
//! resolve the role to an address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::IdentityError;

/// Ledger contracts by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contract {
    /// Realm NFT: claim, terraform, realm records.
    Realm,
    /// City construction.
    City,
    /// Resource data and collection.
    Data,
    /// Farm construction.
    Farm,
    /// Build queue management.
    Manager,
}

impl Contract {
    /// Short lowercase name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Realm => "realm",
            Self::City => "city",
            Self::Data => "data",
            Self::Farm => "farm",
            Self::Manager => "manager",
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChainId {
    /// Arbitrum One (production).
    #[default]
    Arbitrum,
    /// Rinkeby testnet.
    Rinkeby,
}

impl ChainId {
    /// Hex chain id as reported by wallets.
    pub fn hex_id(&self) -> &'static str {
        match self {
            Self::Arbitrum => "0xa4b1",
            Self::Rinkeby => "0x4",
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arbitrum => "Arbitrum",
            Self::Rinkeby => "Rinkeby",
        }
    }

    /// Block explorer host.
    pub fn explorer(&self) -> &'static str {
        match self {
            Self::Arbitrum => "arbiscan.io",
            Self::Rinkeby => "rinkeby.etherscan.io",
        }
    }

    /// Deployed address of a contract on this network.
    pub fn contract_address(&self, contract: Contract) -> &'static str {
        match (self, contract) {
            (Self::Arbitrum, Contract::City) => "0x1aEb0bb454E7DD0211601CaA16E6D80c4eD05d2b",
            (Self::Arbitrum, Contract::Data) => "0xAae3A78EA8De1b89C64D5c64A26d5b1FC8F91496",
            (Self::Arbitrum, Contract::Farm) => "0x37dB66a2622D83C0523437e6A808FAE3327C5A3E",
            (Self::Arbitrum, Contract::Manager) => "0x4E572433A3Bfa336b6396D13AfC9F69b58252861",
            (Self::Arbitrum, Contract::Realm) => "0x4de95c1E202102E22E801590C51D7B979f167FBB",
            (Self::Rinkeby, Contract::City) => "0x2f4EB55b537142551235FC919A211A5E25c17C91",
            (Self::Rinkeby, Contract::Data) => "0x4900583e87F414e321DACDA0bbe549DfCb4F0617",
            (Self::Rinkeby, Contract::Farm) => "0x65cE994F6D4b0F763E6b62366F1158D1E08Da404",
            (Self::Rinkeby, Contract::Manager) => "0xd7731Da60e06Fc74e43B304977B8b22f75Df6E1b",
            (Self::Rinkeby, Contract::Realm) => "0x24e0d044b9379EaF201266F9f1E8484f057859D1",
        }
    }

    /// Transaction link on the block explorer.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("https://{}/tx/{}", self.explorer(), tx_hash)
    }
}

impl FromStr for ChainId {
    type Err = IdentityError;

    /// Accepts the hex id ("0xa4b1") or the name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0xa4b1" | "arbitrum" => Ok(Self::Arbitrum),
            "0x4" | "rinkeby" => Ok(Self::Rinkeby),
            _ => Err(IdentityError::UnknownChain(s.to_string())),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
