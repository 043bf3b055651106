use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::amount::format_with_decimals;
use crate::balance::{Balance, BalanceFetcher, BalanceQuery, MaxAmountEstimator, MaxAmountRequest};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::{Error, ValidationError};
use crate::store::{Store, Subscription};
use crate::token::{BalanceKey, Token, TokenKind};

/// Derived validation flags, recomputed on every relevant change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationState {
    pub validating: bool,
    pub computing_balance: bool,
    pub insufficient_balance: bool,
    pub insufficient_allowance: bool,
    pub error_computing_balance: bool,
}

/// Everything a validation pass looks at, passed explicitly.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub token: Token,
    /// In the token's smallest unit.
    pub entered_amount: BigUint,
    pub account: Option<String>,
    pub recipient: Option<String>,
    pub src_chain_id: Option<u64>,
    pub dest_chain_id: Option<u64>,
    pub eth_balance: BigUint,
    /// Known token balance; fetched when `None`.
    pub token_balance: Option<BigUint>,
    pub allowance: Option<BigUint>,
    pub fee: BigUint,
}

impl ValidationContext {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            entered_amount: BigUint::zero(),
            account: None,
            recipient: None,
            src_chain_id: None,
            dest_chain_id: None,
            eth_balance: BigUint::zero(),
            token_balance: None,
            allowance: None,
            fee: BigUint::zero(),
        }
    }

    fn connected(&self) -> Option<(&str, u64)> {
        let account = self.account.as_deref().filter(|a| !a.is_empty())?;
        Some((account, self.src_chain_id?))
    }

    /// Explicit recipient, else the connected account.
    pub fn resolved_recipient(&self) -> Option<&str> {
        self.recipient
            .as_deref()
            .filter(|r| !r.is_empty())
            .or_else(|| self.account.as_deref().filter(|a| !a.is_empty()))
    }
}

/// Balance rule for a token kind. Returns whether the balance is insufficient.
///
/// Fungible tokens need a non-zero native balance for fees and
/// `entered <= token_balance`. Native and ERC721 transfers are insufficient as
/// soon as `entered >= eth_balance`.
pub fn check_balance(
    kind: &TokenKind,
    entered: &BigUint,
    eth_balance: &BigUint,
    token_balance: Option<&BigUint>,
) -> Result<bool, ValidationError> {
    match kind {
        TokenKind::Erc20 | TokenKind::Erc1155 => {
            Ok(eth_balance.is_zero() || token_balance.is_none_or(|balance| entered > balance))
        }
        TokenKind::Eth | TokenKind::Erc721 => Ok(entered >= eth_balance),
        TokenKind::Unknown(kind) => Err(ValidationError::UnknownTokenKind(kind.clone())),
    }
}

/// Native-currency half of [`check_balance`].
pub fn has_enough_eth(kind: &TokenKind, entered: &BigUint, eth_balance: &BigUint) -> bool {
    match kind {
        TokenKind::Erc20 | TokenKind::Erc1155 => !eth_balance.is_zero(),
        TokenKind::Eth | TokenKind::Erc721 => eth_balance > entered,
        TokenKind::Unknown(_) => false,
    }
}

pub fn valid_input(entered: &BigUint, balance: Option<&BigUint>) -> bool {
    !entered.is_zero() && balance.is_some_and(|balance| entered <= balance)
}

pub fn show_insufficient_balance_alert(state: &ValidationState) -> bool {
    state.insufficient_balance && !state.error_computing_balance && !state.computing_balance
}

pub fn show_invalid_token_alert(state: &ValidationState) -> bool {
    state.error_computing_balance && !state.computing_balance
}

pub fn show_fee(state: &ValidationState) -> bool {
    !show_insufficient_balance_alert(state) && !show_invalid_token_alert(state)
}

/// Render-ready balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceDisplay {
    Unavailable,
    Loading,
    Amount(String),
}

impl fmt::Display for BalanceDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceDisplay::Unavailable => f.write_str("unavailable"),
            BalanceDisplay::Loading => f.write_str("…"),
            BalanceDisplay::Amount(amount) => f.write_str(amount),
        }
    }
}

/// Point-in-time copy of all form stores.
#[derive(Debug, Clone, Default)]
pub struct FormSnapshot {
    pub token: Option<Token>,
    pub entered_amount: BigUint,
    pub token_balance: Option<BigUint>,
    pub eth_balance: BigUint,
    pub connected: bool,
    pub state: ValidationState,
}

/// Presentation flags derived from a [`FormSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub valid_input: bool,
    pub has_enough_eth: bool,
    pub balance: BalanceDisplay,
    pub show_insufficient_balance_alert: bool,
    pub show_invalid_token_alert: bool,
    pub show_fee: bool,
}

impl FormView {
    pub fn from_snapshot(snapshot: &FormSnapshot) -> Self {
        let state = &snapshot.state;
        let enough_eth = snapshot.token.as_ref().is_some_and(|token| {
            has_enough_eth(&token.kind, &snapshot.entered_amount, &snapshot.eth_balance)
        });

        Self {
            valid_input: valid_input(&snapshot.entered_amount, snapshot.token_balance.as_ref()),
            has_enough_eth: enough_eth,
            balance: balance_display(snapshot),
            show_insufficient_balance_alert: show_insufficient_balance_alert(state),
            show_invalid_token_alert: show_invalid_token_alert(state),
            show_fee: show_fee(state),
        }
    }
}

fn balance_display(snapshot: &FormSnapshot) -> BalanceDisplay {
    if !snapshot.connected {
        return BalanceDisplay::Unavailable;
    }
    if snapshot.state.computing_balance {
        return BalanceDisplay::Loading;
    }
    if snapshot.state.error_computing_balance {
        return BalanceDisplay::Unavailable;
    }
    match (&snapshot.token, &snapshot.token_balance) {
        (Some(token), Some(balance)) => {
            let amount = format_with_decimals(balance, token.decimals_or_zero());
            if token.symbol.is_empty() {
                BalanceDisplay::Amount(amount)
            } else {
                BalanceDisplay::Amount(format!("{amount} {}", token.symbol))
            }
        }
        _ => BalanceDisplay::Unavailable,
    }
}

/// Observable state shared with the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct FormStores {
    pub token: Store<Option<Token>>,
    pub entered_amount: Store<BigUint>,
    pub token_balance: Store<Option<BigUint>>,
    pub eth_balance: Store<BigUint>,
    pub connected: Store<bool>,
    pub state: Store<ValidationState>,
}

impl FormStores {
    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            token: self.token.get(),
            entered_amount: self.entered_amount.get(),
            token_balance: self.token_balance.get(),
            eth_balance: self.eth_balance.get(),
            connected: self.connected.get(),
            state: self.state.get(),
        }
    }
}

type ViewCallback = Arc<dyn Fn(&FormView) + Send + Sync>;

fn notifier(stores: &FormStores, f: &ViewCallback) -> impl Fn() + Send + Sync + 'static {
    let stores = stores.clone();
    let f = Arc::clone(f);
    move || f(&FormView::from_snapshot(&stores.snapshot()))
}

/// Subscriptions registered by [`AmountValidator::watch`].
#[derive(Debug)]
pub struct ViewWatch {
    stores: FormStores,
    subscriptions: [Subscription; 6],
}

impl ViewWatch {
    pub fn cancel(self) {
        let [token, amount, balance, eth, connected, state] = self.subscriptions;
        self.stores.token.unsubscribe(token);
        self.stores.entered_amount.unsubscribe(amount);
        self.stores.token_balance.unsubscribe(balance);
        self.stores.eth_balance.unsubscribe(eth);
        self.stores.connected.unsubscribe(connected);
        self.stores.state.unsubscribe(state);
    }
}

/// Validates the amount entered in a bridge form against balances and allowance.
pub struct AmountValidator<B, E> {
    balances: B,
    estimator: E,
    probe_amount: BigUint,
    debouncer: Debouncer,
    stores: FormStores,
    /// (chain, account, token) the cached `token_balance` was looked up for.
    balance_owner: Store<Option<BalanceKey>>,
}

impl<B, E> AmountValidator<B, E>
where
    B: BalanceFetcher,
    E: MaxAmountEstimator,
{
    pub fn new(balances: B, estimator: E) -> Self {
        Self::with_config(balances, estimator, &Config::default())
    }

    pub fn with_config(balances: B, estimator: E, config: &Config) -> Self {
        Self {
            balances,
            estimator,
            probe_amount: BigUint::from(config.max_amount_probe),
            debouncer: Debouncer::new(config.debounce_delay()),
            stores: FormStores::default(),
            balance_owner: Store::new(None),
        }
    }

    pub fn stores(&self) -> &FormStores {
        &self.stores
    }

    pub fn view(&self) -> FormView {
        FormView::from_snapshot(&self.stores.snapshot())
    }

    /// Call `f` with a fresh [`FormView`] after every store update.
    ///
    /// `f` also runs once per store on registration.
    pub fn watch(&self, f: impl Fn(&FormView) + Send + Sync + 'static) -> ViewWatch {
        let f: ViewCallback = Arc::new(f);
        let s = &self.stores;
        let subscriptions = [
            {
                let notify = notifier(s, &f);
                s.token.subscribe(move |_| notify())
            },
            {
                let notify = notifier(s, &f);
                s.entered_amount.subscribe(move |_| notify())
            },
            {
                let notify = notifier(s, &f);
                s.token_balance.subscribe(move |_| notify())
            },
            {
                let notify = notifier(s, &f);
                s.eth_balance.subscribe(move |_| notify())
            },
            {
                let notify = notifier(s, &f);
                s.connected.subscribe(move |_| notify())
            },
            {
                let notify = notifier(s, &f);
                s.state.subscribe(move |_| notify())
            },
        ];

        ViewWatch {
            stores: s.clone(),
            subscriptions,
        }
    }

    /// Run one validation pass and publish the result.
    ///
    /// Without a connected account, source chain or resolvable recipient the
    /// pass is skipped and all flags are cleared. A missing account also
    /// drops the cached balance, so the form shows it as unavailable.
    pub async fn validate(&self, ctx: &ValidationContext) -> Result<ValidationState, Error> {
        let Some((account, src_chain_id)) = ctx.connected() else {
            debug!(token = %ctx.token.label(), "no account or source chain, skipping validation");
            self.stores.connected.set(false);
            self.store_balance(None, None);
            return Ok(self.clear_state());
        };
        if ctx.resolved_recipient().is_none() {
            debug!(token = %ctx.token.label(), "no recipient, skipping validation");
            return Ok(self.clear_state());
        }
        if let TokenKind::Unknown(kind) = &ctx.token.kind {
            error!(token = %ctx.token.label(), kind = %kind, "unknown token kind");
            self.stores.state.set(ValidationState::default());
            return Err(ValidationError::UnknownTokenKind(kind.clone()).into());
        }

        if self.stores.token.get().as_ref() != Some(&ctx.token) {
            self.stores.token.set(Some(ctx.token.clone()));
        }
        let key = BalanceKey::new(src_chain_id, account, &ctx.token.address);
        self.stores.connected.set(true);
        self.stores.eth_balance.set(ctx.eth_balance.clone());
        self.stores.entered_amount.set(ctx.entered_amount.clone());

        let mut state = ValidationState {
            validating: true,
            ..ValidationState::default()
        };
        self.stores.state.set(state);

        let known = if ctx.token.is_native() {
            Some(ctx.eth_balance.clone())
        } else {
            ctx.token_balance
                .clone()
                .or_else(|| self.cached_balance(&key))
        };

        let token_balance = match known {
            Some(balance) => Some(balance),
            None => match self.fetch_balance(&ctx.token, account, src_chain_id).await {
                Ok(balance) => {
                    if balance.is_empty() {
                        state.insufficient_balance = true;
                    }
                    balance.value
                }
                Err(e) => {
                    warn!(token = %ctx.token.label(), error = %e, "failed to fetch balance");
                    state.error_computing_balance = true;
                    None
                }
            },
        };
        self.store_balance(Some(key), token_balance.clone());

        state.insufficient_balance |= check_balance(
            &ctx.token.kind,
            &ctx.entered_amount,
            &ctx.eth_balance,
            token_balance.as_ref(),
        )?;

        if ctx.token.kind == TokenKind::Erc20 {
            state.insufficient_allowance = ctx
                .allowance
                .as_ref()
                .is_some_and(|allowance| &ctx.entered_amount > allowance);
        }

        state.validating = false;
        self.stores.state.set(state);
        debug!(token = %ctx.token.label(), amount = %ctx.entered_amount, ?state, "validated amount");
        Ok(state)
    }

    /// Validate after the debounce quiet period; superseded calls resolve to `None`.
    pub fn validate_debounced(
        self: &Arc<Self>,
        ctx: ValidationContext,
    ) -> JoinHandle<Option<Result<ValidationState, Error>>>
    where
        B: 'static,
        E: 'static,
    {
        let this = Arc::clone(self);
        self.debouncer
            .call(async move { this.validate(&ctx).await })
    }

    /// Set the entered amount to the largest bridgeable amount and re-validate.
    ///
    /// Estimation failures are logged and leave the form untouched (`Ok(None)`).
    pub async fn use_max_amount(&self, ctx: &ValidationContext) -> Result<Option<BigUint>, Error> {
        let (Some((account, src_chain_id)), Some(to)) = (ctx.connected(), ctx.resolved_recipient())
        else {
            debug!(token = %ctx.token.label(), "not connected, cannot compute max amount");
            return Ok(None);
        };

        let balance = if ctx.token.is_native() {
            Some(ctx.eth_balance.clone())
        } else {
            let key = BalanceKey::new(src_chain_id, account, &ctx.token.address);
            ctx.token_balance
                .clone()
                .or_else(|| self.cached_balance(&key))
        };
        let Some(balance) = balance else {
            debug!(token = %ctx.token.label(), "balance unknown, cannot compute max amount");
            return Ok(None);
        };

        let request = MaxAmountRequest {
            to: to.to_string(),
            token: ctx.token.clone(),
            balance: balance.clone(),
            fee: ctx.fee.clone(),
            src_chain_id,
            dest_chain_id: ctx.dest_chain_id,
            amount: self.probe_amount.clone(),
        };

        let max = match self.estimator.max_amount_to_bridge(&request).await {
            Ok(max) => max,
            Err(e) => {
                warn!(token = %ctx.token.label(), error = %e, "failed to compute max amount");
                return Ok(None);
            }
        };

        let ctx = ValidationContext {
            entered_amount: max.clone(),
            token_balance: Some(balance),
            ..ctx.clone()
        };
        self.validate(&ctx).await?;
        Ok(Some(max))
    }

    /// Clear the form after a token, account or network change and re-validate.
    pub async fn reset(&self, ctx: &ValidationContext) -> Result<ValidationState, Error> {
        self.stores.token.set(Some(ctx.token.clone()));
        self.stores.entered_amount.set(BigUint::zero());
        self.store_balance(None, None);
        self.stores.state.set(ValidationState::default());

        if ctx.connected().is_none() {
            debug!(token = %ctx.token.label(), "no connected account, balance unavailable");
            self.stores.connected.set(false);
            return Ok(ValidationState::default());
        }

        let ctx = ValidationContext {
            entered_amount: BigUint::zero(),
            token_balance: None,
            ..ctx.clone()
        };
        self.validate(&ctx).await
    }

    /// The cached token balance, only if it was looked up for `key`.
    fn cached_balance(&self, key: &BalanceKey) -> Option<BigUint> {
        if self.balance_owner.get().as_ref() == Some(key) {
            self.stores.token_balance.get()
        } else {
            None
        }
    }

    fn store_balance(&self, key: Option<BalanceKey>, balance: Option<BigUint>) {
        self.balance_owner.set(key);
        self.stores.token_balance.set(balance);
    }

    fn clear_state(&self) -> ValidationState {
        let state = ValidationState::default();
        self.stores.state.set(state);
        state
    }

    async fn fetch_balance(
        &self,
        token: &Token,
        account: &str,
        src_chain_id: u64,
    ) -> Result<Balance, Error> {
        let query = BalanceQuery {
            user_address: account.to_string(),
            token: token.clone(),
            src_chain_id,
        };
        self.stores.state.update(|s| s.computing_balance = true);
        let result = self.balances.fetch_balance(&query).await;
        self.stores.state.update(|s| s.computing_balance = false);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::balance::{FixedMaxAmount, StaticBalanceSource};

    const USER: &str = "0x1111111111111111111111111111111111111111";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const OTHER: &str = "0x2222222222222222222222222222222222222222";

    fn n(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn usdc() -> Token {
        Token::erc20(USDC, "USD Coin", "USDC", 6)
    }

    fn connected(token: Token) -> ValidationContext {
        ValidationContext {
            account: Some(USER.to_string()),
            src_chain_id: Some(1),
            dest_chain_id: Some(10),
            eth_balance: n(1_000),
            ..ValidationContext::new(token)
        }
    }

    fn validator_with_usdc(balance: u64) -> AmountValidator<StaticBalanceSource, FixedMaxAmount> {
        let mut source = StaticBalanceSource::new();
        source.insert(1, USER, USDC, n(balance));
        AmountValidator::new(source, FixedMaxAmount::new(n(100)))
    }

    struct FailingBalances;

    #[async_trait]
    impl BalanceFetcher for FailingBalances {
        async fn fetch_balance(&self, _query: &BalanceQuery) -> Result<Balance, Error> {
            Err(Error::Balance("rpc unreachable".to_string()))
        }
    }

    struct FailingEstimator;

    #[async_trait]
    impl MaxAmountEstimator for FailingEstimator {
        async fn max_amount_to_bridge(&self, _r: &MaxAmountRequest) -> Result<BigUint, Error> {
            Err(Error::Estimate("gas estimation reverted".to_string()))
        }
    }

    #[test]
    fn test_fungible_balance_rule() {
        for kind in [TokenKind::Erc20, TokenKind::Erc1155] {
            assert!(!check_balance(&kind, &n(10), &n(1), Some(&n(10))).unwrap());
            assert!(check_balance(&kind, &n(11), &n(1), Some(&n(10))).unwrap());
            // no native currency for fees
            assert!(check_balance(&kind, &n(1), &n(0), Some(&n(10))).unwrap());
            assert!(check_balance(&kind, &n(1), &n(1), None).unwrap());
        }
    }

    #[test]
    fn test_native_balance_rule_is_strict() {
        for kind in [TokenKind::Eth, TokenKind::Erc721] {
            assert!(check_balance(&kind, &n(10), &n(10), None).unwrap());
            assert!(!check_balance(&kind, &n(9), &n(10), None).unwrap());
            assert!(check_balance(&kind, &n(11), &n(10), None).unwrap());
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let kind = TokenKind::Unknown("ERC777".to_string());
        assert_eq!(
            check_balance(&kind, &n(1), &n(1), Some(&n(1))),
            Err(ValidationError::UnknownTokenKind("ERC777".to_string()))
        );
    }

    #[test]
    fn test_derived_flags() {
        assert!(valid_input(&n(5), Some(&n(5))));
        assert!(!valid_input(&n(0), Some(&n(5))));
        assert!(!valid_input(&n(6), Some(&n(5))));
        assert!(!valid_input(&n(1), None));

        let insufficient = ValidationState {
            insufficient_balance: true,
            ..ValidationState::default()
        };
        assert!(show_insufficient_balance_alert(&insufficient));
        assert!(!show_fee(&insufficient));

        let computing = ValidationState {
            computing_balance: true,
            ..insufficient
        };
        assert!(!show_insufficient_balance_alert(&computing));
        assert!(!show_invalid_token_alert(&computing));
        assert!(show_fee(&computing));

        let errored = ValidationState {
            error_computing_balance: true,
            ..insufficient
        };
        assert!(!show_insufficient_balance_alert(&errored));
        assert!(show_invalid_token_alert(&errored));
        assert!(!show_fee(&errored));
    }

    #[tokio::test]
    async fn test_validate_skips_without_account() {
        let validator = validator_with_usdc(500);
        let ctx = ValidationContext {
            entered_amount: n(10),
            ..ValidationContext::new(usdc())
        };
        let state = validator.validate(&ctx).await.unwrap();
        assert_eq!(state, ValidationState::default());
        assert!(validator.balances.lookups().is_empty());

        let no_chain = ValidationContext {
            src_chain_id: None,
            ..connected(usdc())
        };
        assert_eq!(validator.validate(&no_chain).await.unwrap(), ValidationState::default());
        assert!(validator.balances.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_validate_fetches_unknown_balance_once() {
        let validator = validator_with_usdc(500);
        let ctx = ValidationContext {
            entered_amount: n(200),
            ..connected(usdc())
        };

        let state = validator.validate(&ctx).await.unwrap();
        assert!(!state.insufficient_balance);
        assert_eq!(validator.stores().token_balance.get(), Some(n(500)));

        let over = ValidationContext {
            entered_amount: n(501),
            ..ctx
        };
        let state = validator.validate(&over).await.unwrap();
        assert!(state.insufficient_balance);
        assert_eq!(validator.balances.lookups().len(), 1);
    }

    fn validator_with_two_accounts() -> AmountValidator<StaticBalanceSource, FixedMaxAmount> {
        let mut source = StaticBalanceSource::new();
        source.insert(1, USER, USDC, n(500));
        source.insert(1, OTHER, USDC, n(5));
        AmountValidator::new(source, FixedMaxAmount::new(n(100)))
    }

    #[tokio::test]
    async fn test_account_change_refetches_balance() {
        let validator = validator_with_two_accounts();
        let ctx = ValidationContext {
            entered_amount: n(100),
            ..connected(usdc())
        };
        assert!(!validator.validate(&ctx).await.unwrap().insufficient_balance);

        let switched = ValidationContext {
            account: Some(OTHER.to_string()),
            ..ctx
        };
        assert!(validator.validate(&switched).await.unwrap().insufficient_balance);
        assert_eq!(validator.stores().token_balance.get(), Some(n(5)));
        assert_eq!(
            validator.balances.lookups(),
            vec![
                BalanceKey::new(1, USER, USDC),
                BalanceKey::new(1, OTHER, USDC)
            ]
        );
    }

    #[tokio::test]
    async fn test_chain_change_refetches_balance() {
        let validator = validator_with_two_accounts();
        let ctx = ValidationContext {
            entered_amount: n(100),
            ..connected(usdc())
        };
        assert!(!validator.validate(&ctx).await.unwrap().insufficient_balance);

        let other_chain = ValidationContext {
            src_chain_id: Some(10),
            ..ctx
        };
        assert!(validator.validate(&other_chain).await.unwrap().insufficient_balance);
        assert_eq!(validator.stores().token_balance.get(), None);
        assert_eq!(validator.balances.lookups().len(), 2);
        assert_eq!(validator.balances.lookups()[1], BalanceKey::new(10, USER, USDC));
    }

    #[tokio::test]
    async fn test_disconnect_drops_cached_balance() {
        let validator = validator_with_usdc(500);
        let ctx = ValidationContext {
            entered_amount: n(10),
            ..connected(usdc())
        };
        validator.validate(&ctx).await.unwrap();
        assert_eq!(validator.view().balance.to_string(), "0.0005 USDC");

        let disconnected = ValidationContext {
            account: None,
            ..ctx
        };
        let state = validator.validate(&disconnected).await.unwrap();
        assert_eq!(state, ValidationState::default());
        assert!(!validator.stores().connected.get());
        assert_eq!(validator.stores().token_balance.get(), None);
        assert_eq!(validator.view().balance, BalanceDisplay::Unavailable);
    }

    #[tokio::test]
    async fn test_validate_zero_fetched_balance_is_insufficient() {
        let validator = validator_with_usdc(0);
        let ctx = ValidationContext {
            entered_amount: n(0),
            ..connected(usdc())
        };
        let state = validator.validate(&ctx).await.unwrap();
        assert!(state.insufficient_balance);
        assert!(validator.view().show_insufficient_balance_alert);
    }

    #[tokio::test]
    async fn test_validate_native_uses_eth_balance() {
        let validator = validator_with_usdc(0);
        let ctx = ValidationContext {
            entered_amount: n(1_000),
            ..connected(Token::native("ETH"))
        };
        assert!(validator.validate(&ctx).await.unwrap().insufficient_balance);

        let ctx = ValidationContext {
            entered_amount: n(999),
            ..ctx
        };
        assert!(!validator.validate(&ctx).await.unwrap().insufficient_balance);
        assert!(validator.balances.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_validate_unknown_kind_fails() {
        let validator = validator_with_usdc(500);
        let mut token = usdc();
        token.kind = TokenKind::Unknown("ERC777".to_string());
        let result = validator.validate(&connected(token)).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::UnknownTokenKind(_)))
        ));
    }

    #[tokio::test]
    async fn test_validate_allowance() {
        let validator = validator_with_usdc(500);
        let ctx = ValidationContext {
            entered_amount: n(300),
            allowance: Some(n(200)),
            ..connected(usdc())
        };
        let state = validator.validate(&ctx).await.unwrap();
        assert!(state.insufficient_allowance);
        assert!(!state.insufficient_balance);

        let ctx = ValidationContext {
            allowance: Some(n(300)),
            ..ctx
        };
        assert!(!validator.validate(&ctx).await.unwrap().insufficient_allowance);
    }

    #[tokio::test]
    async fn test_balance_fetch_failure_shows_invalid_token() {
        let validator = AmountValidator::new(FailingBalances, FixedMaxAmount::new(n(0)));
        let ctx = ValidationContext {
            entered_amount: n(1),
            ..connected(usdc())
        };
        let state = validator.validate(&ctx).await.unwrap();
        assert!(state.error_computing_balance);
        assert!(!state.computing_balance);

        let view = validator.view();
        assert!(view.show_invalid_token_alert);
        assert!(!view.show_insufficient_balance_alert);
        assert_eq!(view.balance, BalanceDisplay::Unavailable);
    }

    #[tokio::test]
    async fn test_reset_clears_amount_and_refetches() {
        let validator = validator_with_usdc(500);
        let ctx = ValidationContext {
            entered_amount: n(42),
            ..connected(usdc())
        };
        validator.validate(&ctx).await.unwrap();
        assert_eq!(validator.stores().entered_amount.get(), n(42));

        validator.reset(&ctx).await.unwrap();
        assert!(validator.stores().entered_amount.get().is_zero());
        validator.reset(&ctx).await.unwrap();
        assert!(validator.stores().entered_amount.get().is_zero());

        assert_eq!(validator.balances.lookups().len(), 3);
        assert_eq!(
            validator.view().balance,
            BalanceDisplay::Amount("0.0005 USDC".to_string())
        );
    }

    #[tokio::test]
    async fn test_reset_native_does_not_fetch() {
        let validator = validator_with_usdc(500);
        validator.reset(&connected(Token::native("ETH"))).await.unwrap();
        assert!(validator.balances.lookups().is_empty());
        assert!(validator.stores().entered_amount.get().is_zero());
    }

    #[tokio::test]
    async fn test_reset_without_account_is_unavailable() {
        let validator = validator_with_usdc(500);
        let state = validator.reset(&ValidationContext::new(usdc())).await.unwrap();
        assert_eq!(state, ValidationState::default());
        assert!(validator.balances.lookups().is_empty());
        assert_eq!(validator.view().balance, BalanceDisplay::Unavailable);
        assert_eq!(validator.view().balance.to_string(), "unavailable");
    }

    #[tokio::test]
    async fn test_use_max_amount_revalidates() {
        let validator = validator_with_usdc(500);
        let ctx = connected(Token::native("ETH"));

        let max = validator.use_max_amount(&ctx).await.unwrap();
        assert_eq!(max, Some(n(900)));
        assert_eq!(validator.stores().entered_amount.get(), n(900));

        let view = validator.view();
        assert!(view.valid_input);
        assert!(view.has_enough_eth);
        assert!(view.show_fee);
    }

    #[tokio::test]
    async fn test_use_max_amount_ignores_other_accounts_balance() {
        let validator = validator_with_two_accounts();
        validator.validate(&connected(usdc())).await.unwrap();
        assert_eq!(validator.stores().token_balance.get(), Some(n(500)));

        let switched = ValidationContext {
            account: Some(OTHER.to_string()),
            ..connected(usdc())
        };
        assert_eq!(validator.use_max_amount(&switched).await.unwrap(), None);
        assert_eq!(validator.stores().entered_amount.get(), n(0));

        validator.validate(&switched).await.unwrap();
        assert_eq!(validator.use_max_amount(&switched).await.unwrap(), Some(n(5)));
        assert_eq!(validator.stores().entered_amount.get(), n(5));
    }

    #[tokio::test]
    async fn test_use_max_amount_tolerates_estimator_failure() {
        let mut source = StaticBalanceSource::new();
        source.insert(1, USER, USDC, n(500));
        let validator = AmountValidator::new(source, FailingEstimator);
        let ctx = ValidationContext {
            entered_amount: n(7),
            ..connected(usdc())
        };
        validator.validate(&ctx).await.unwrap();
        let before = validator.stores().snapshot();

        assert_eq!(validator.use_max_amount(&ctx).await.unwrap(), None);

        let after = validator.stores().snapshot();
        assert_eq!(after.entered_amount, before.entered_amount);
        assert_eq!(after.state, before.state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_validation_runs_last_call() {
        let validator = Arc::new(validator_with_usdc(500));

        let mut handles = Vec::new();
        for amount in [1u64, 20, 300] {
            let ctx = ValidationContext {
                entered_amount: n(amount),
                ..connected(usdc())
            };
            handles.push(validator.validate_debounced(ctx));
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        let mut executed = 0;
        for handle in handles {
            if let Some(result) = handle.await.unwrap() {
                result.unwrap();
                executed += 1;
            }
        }

        assert_eq!(executed, 1);
        assert_eq!(validator.stores().entered_amount.get(), n(300));
        assert_eq!(validator.balances.lookups().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_emits_views() {
        let validator = validator_with_usdc(500);
        let views = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&views);
        let watch = validator.watch(move |view| sink.lock().unwrap().push(view.clone()));

        let ctx = ValidationContext {
            entered_amount: n(100),
            ..connected(usdc())
        };
        validator.validate(&ctx).await.unwrap();

        let last = views.lock().unwrap().last().cloned().unwrap();
        assert!(last.valid_input);
        assert_eq!(last.balance.to_string(), "0.0005 USDC");

        let seen = views.lock().unwrap().len();
        watch.cancel();
        validator.reset(&ctx).await.unwrap();
        assert_eq!(views.lock().unwrap().len(), seen);
    }
}
