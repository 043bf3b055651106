pub mod amount;
pub mod balance;
pub mod config;
pub mod debounce;
pub mod error;
#[cfg(feature = "reqwest")]
pub mod http;
pub mod ipfs;
pub mod metadata;
pub mod store;
pub mod telemetry;
pub mod token;
pub mod validator;

use num_bigint::BigUint;

use error::Error;

// Re-exports for convenience
pub use balance::{Balance, BalanceFetcher, MaxAmountEstimator};
pub use config::Config;
pub use metadata::{AdblockProbe, HttpClient, MetadataFetcher, NftMetadata};
pub use store::Store;
pub use token::{Token, TokenKind};
pub use validator::{AmountValidator, FormView, ValidationContext, ValidationState};

/// Parse what the user typed into the amount field for `token`.
///
/// This is the entry point for turning free text into the smallest-unit
/// amount that [`AmountValidator`] works on.
pub fn entered_amount(input: &str, token: &Token) -> Result<BigUint, Error> {
    Ok(amount::parse_amount(
        input,
        token.decimals_or_zero(),
        &token.kind,
    )?)
}
