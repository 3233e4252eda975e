mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{div_round_half_up, Money, MoneyConversionError, BASIS_POINTS, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
