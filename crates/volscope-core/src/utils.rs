//! Utility functions shared by the CLI and the exchange adapters

/// Default quote currency appended to bare base symbols.
pub const DEFAULT_QUOTE: &str = "USDT";

/// Normalize user input into an exchange symbol.
///
/// - Trims whitespace and uppercases: " pepe " -> "PEPE"
/// - Appends the default quote when missing: "PEPE" -> "PEPEUSDT"
/// - Leaves already-quoted symbols alone: "BTCUSDT" -> "BTCUSDT"
pub fn normalize_symbol(input: &str) -> String {
    let upper = input.trim().to_uppercase();
    if upper.is_empty() || upper.ends_with(DEFAULT_QUOTE) {
        upper
    } else {
        format!("{}{}", upper, DEFAULT_QUOTE)
    }
}

/// Parse a symbol list (one per line or comma-separated, `#` comments allowed)
/// into normalized, de-duplicated exchange symbols in first-seen order.
pub fn parse_symbol_list(content: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for raw in line.split(',') {
            let symbol = normalize_symbol(raw);
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
    }
    symbols
}
