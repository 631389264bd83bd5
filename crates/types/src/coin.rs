use alloy_primitives::U256;

use crate::proto::Coin;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinAmountError {
    #[error("invalid coin amount {0:?}")]
    Invalid(String),
    #[error("coin amount {0:?} does not fit in 256 bits")]
    Overflow(String),
    #[error("denom {0:?} appears more than once")]
    DuplicateDenom(String),
}

/// Parses a decimal coin amount.
///
/// Only plain ascii digits are accepted; anything that passes the digit
/// check but cannot be represented is an overflow.
pub fn parse_amount(raw: &str) -> Result<U256, CoinAmountError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoinAmountError::Invalid(raw.to_owned()));
    }
    U256::from_str_radix(raw, 10).map_err(|_| CoinAmountError::Overflow(raw.to_owned()))
}

/// Total amount of `denom` in a coin list. Other denoms are ignored.
pub fn amount_of(coins: &[Coin], denom: &str) -> Result<U256, CoinAmountError> {
    let mut matching = coins.iter().filter(|coin| coin.denom == denom);
    let Some(first) = matching.next() else {
        return Ok(U256::ZERO);
    };
    if matching.next().is_some() {
        return Err(CoinAmountError::DuplicateDenom(denom.to_owned()));
    }
    parse_amount(&first.amount)
}
