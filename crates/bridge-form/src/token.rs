use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Token standard of a bridgeable asset.
///
/// Unrecognized kinds are kept as [`TokenKind::Unknown`] so they can be
/// rejected explicitly during validation instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TokenKind {
    Eth,
    Erc20,
    Erc721,
    Erc1155,
    Unknown(String),
}

impl TokenKind {
    pub fn is_nft(&self) -> bool {
        matches!(self, TokenKind::Erc721 | TokenKind::Erc1155)
    }

    /// Fungible for balance-validation purposes: spent in token units, fees in native currency.
    pub fn is_fungible(&self) -> bool {
        matches!(self, TokenKind::Erc20 | TokenKind::Erc1155)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TokenKind::Eth => "ETH",
            TokenKind::Erc20 => "ERC20",
            TokenKind::Erc721 => "ERC721",
            TokenKind::Erc1155 => "ERC1155",
            TokenKind::Unknown(kind) => kind,
        }
    }
}

impl From<String> for TokenKind {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "ETH" => TokenKind::Eth,
            "ERC20" => TokenKind::Erc20,
            "ERC721" => TokenKind::Erc721,
            "ERC1155" => TokenKind::Erc1155,
            _ => TokenKind::Unknown(value),
        }
    }
}

impl From<TokenKind> for String {
    fn from(kind: TokenKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token selected in the bridge form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Contract address, or the zero address for the native currency.
    pub address: String,

    #[serde(rename = "type")]
    pub kind: TokenKind,

    /// Absent for non-fungible tokens.
    #[serde(default)]
    pub decimals: Option<u8>,

    pub name: String,

    #[serde(default)]
    pub symbol: String,

    /// Token id, only meaningful for NFTs.
    #[serde(default, with = "token_id")]
    pub id: Option<BigUint>,

    /// Metadata uri, only meaningful for NFTs.
    #[serde(default)]
    pub uri: Option<String>,
}

impl Token {
    /// The native currency of a chain.
    pub fn native(symbol: &str) -> Self {
        Self {
            address: "0x0000000000000000000000000000000000000000".to_string(),
            kind: TokenKind::Eth,
            decimals: Some(18),
            name: "Ether".to_string(),
            symbol: symbol.to_string(),
            id: None,
            uri: None,
        }
    }

    pub fn erc20(address: &str, name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            address: address.to_string(),
            kind: TokenKind::Erc20,
            decimals: Some(decimals),
            name: name.to_string(),
            symbol: symbol.to_string(),
            id: None,
            uri: None,
        }
    }

    pub fn nft(kind: TokenKind, address: &str, name: &str, id: u64, uri: Option<&str>) -> Self {
        Self {
            address: address.to_string(),
            kind,
            decimals: None,
            name: name.to_string(),
            symbol: String::new(),
            id: Some(BigUint::from(id)),
            uri: uri.map(str::to_string),
        }
    }

    pub fn is_native(&self) -> bool {
        self.kind == TokenKind::Eth
    }

    /// Decimals with absent treated as zero.
    pub fn decimals_or_zero(&self) -> u8 {
        self.decimals.unwrap_or(0)
    }

    /// Name plus id for NFTs, for diagnostics.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{}#{}", self.name, id),
            None => self.name.clone(),
        }
    }
}

/// Token ids arrive either as JSON numbers or as decimal strings (ids beyond `u64`).
mod token_id {
    use num_bigint::BigUint;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BigUint>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(n)) => Ok(Some(BigUint::from(n))),
            Some(Repr::Text(s)) => s
                .parse::<BigUint>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid token id {s:?}: {e}"))),
        }
    }

    pub fn serialize<S>(id: &Option<BigUint>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match id {
            Some(id) => serializer.serialize_str(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

/// Normalized balance cache key (`eip155:{chain_id}/{user}/{token}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey(pub String);

impl BalanceKey {
    pub fn new(chain_id: u64, user: &str, token: &str) -> Self {
        Self(format!(
            "eip155:{chain_id}/{}/{}",
            user.to_lowercase(),
            token.to_lowercase()
        ))
    }
}
