/// Exchange identifier as callers spell it (e.g. "NASDAQ", "LSE")
pub type Exchange = String;

/// Normalizes an exchange identifier for comparison against capability sets.
pub fn normalize_exchange(exchange: &str) -> Exchange {
    exchange.trim().to_ascii_uppercase()
}

/// Normalizes a ticker symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
