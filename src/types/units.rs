//! Unit Conversion Utilities
//!
//! All amounts are carried in wei.

/// Amount in wei
pub type Wei = u128;

pub const WEI_PER_GWEI: Wei = 1_000_000_000;
pub const WEI_PER_ETH: Wei = 1_000_000_000_000_000_000;

/// Convert wei to an ETH string with 18 decimals (e.g., "0.001000000000000000")
pub fn wei_to_eth_string(wei: Wei) -> String {
    format!("{}.{:018}", wei / WEI_PER_ETH, wei % WEI_PER_ETH)
}

/// Human-readable wei amount, e.g. "1000000000 wei (0.000000001000000000 ETH)"
pub fn wei_to_display(wei: Wei) -> String {
    format!("{} wei ({} ETH)", wei, wei_to_eth_string(wei))
}

/// Parse a decimal wei amount, allowing `_` separators
pub fn parse_wei(s: &str) -> Option<Wei> {
    s.trim().replace('_', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wei_to_eth() {
        assert_eq!(wei_to_eth_string(0), "0.000000000000000000");
        assert_eq!(wei_to_eth_string(1), "0.000000000000000001");
        assert_eq!(wei_to_eth_string(WEI_PER_ETH), "1.000000000000000000");
        assert_eq!(
            wei_to_eth_string(1_500_000_000_000_000_000),
            "1.500000000000000000"
        );
    }

    #[test]
    fn test_parse_wei() {
        assert_eq!(parse_wei("1000"), Some(1000));
        assert_eq!(parse_wei("1_000_000"), Some(1_000_000));
        assert_eq!(parse_wei("  42 "), Some(42));
        assert_eq!(parse_wei("-1"), None);
    }
}
