//! Static coin metadata: exchange tickers, display names and categories.

/// Coin id → base ticker on the USDT spot markets.
pub const COIN_SYMBOLS: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("solana", "SOL"),
    ("cardano", "ADA"),
    ("polkadot", "DOT"),
    ("avalanche", "AVAX"),
    ("polygon", "MATIC"),
    ("chainlink", "LINK"),
    ("stellar", "XLM"),
    ("cosmos", "ATOM"),
    ("algorand", "ALGO"),
    ("near", "NEAR"),
    ("aptos", "APT"),
    ("sui", "SUI"),
    ("arbitrum", "ARB"),
    ("optimism", "OP"),
    ("uniswap", "UNI"),
    ("aave", "AAVE"),
    ("binancecoin", "BNB"),
    ("ripple", "XRP"),
    ("dogecoin", "DOGE"),
    ("shiba-inu", "SHIB"),
    ("tron", "TRX"),
    ("litecoin", "LTC"),
];

/// The quote asset every pair is priced in.
pub const QUOTE_ASSET: &str = "USDT";

/// The mapped ticker, if the coin is in [`COIN_SYMBOLS`].
pub fn known_ticker(coin_id: &str) -> Option<&'static str> {
    COIN_SYMBOLS
        .iter()
        .find(|(id, _)| *id == coin_id)
        .map(|(_, ticker)| *ticker)
}

/// The mapped ticker, or the upper-cased id as a best guess.
pub fn ticker(coin_id: &str) -> String {
    known_ticker(coin_id)
        .map(str::to_string)
        .unwrap_or_else(|| coin_id.to_uppercase())
}

/// `<TICKER>USDT`, the spot pair both exchanges use.
pub fn usdt_pair(ticker: &str) -> String {
    format!("{ticker}{QUOTE_ASSET}")
}

/// Human-readable name for a lowercase ticker.
pub fn display_name(ticker: &str) -> String {
    let name = match ticker {
        "btc" => "Bitcoin",
        "eth" => "Ethereum",
        "sol" => "Solana",
        "ada" => "Cardano",
        "dot" => "Polkadot",
        "avax" => "Avalanche",
        "matic" => "Polygon",
        "link" => "Chainlink",
        "xlm" => "Stellar",
        "atom" => "Cosmos",
        "algo" => "Algorand",
        "near" => "NEAR Protocol",
        "apt" => "Aptos",
        "sui" => "Sui",
        "arb" => "Arbitrum",
        "op" => "Optimism",
        "uni" => "Uniswap",
        "aave" => "Aave",
        "bnb" => "BNB",
        "xrp" => "XRP",
        "doge" => "Dogecoin",
        "shib" => "Shiba Inu",
        "trx" => "TRON",
        "ltc" => "Litecoin",
        "bch" => "Bitcoin Cash",
        "etc" => "Ethereum Classic",
        "xmr" => "Monero",
        "usdc" => "USD Coin",
        "usdt" => "Tether",
        "dai" => "Dai",
        "wbtc" => "Wrapped Bitcoin",
        "steth" => "Lido Staked Ether",
        "pepe" => "Pepe",
        "wif" => "dogwifhat",
        "bonk" => "Bonk",
        "inj" => "Injective",
        "sei" => "Sei",
        "tia" => "Celestia",
        "jto" => "Jito",
        "pyth" => "Pyth Network",
        "rune" => "THORChain",
        "ftm" => "Fantom",
        "one" => "Harmony",
        "vet" => "VeChain",
        "grt" => "The Graph",
        "sand" => "The Sandbox",
        "mana" => "Decentraland",
        "axs" => "Axie Infinity",
        "imx" => "Immutable X",
        "ape" => "ApeCoin",
        "ldo" => "Lido DAO",
        "mkr" => "Maker",
        "comp" => "Compound",
        "snx" => "Synthetix",
        "crv" => "Curve DAO",
        "1inch" => "1inch",
        "sushi" => "SushiSwap",
        "cake" => "PancakeSwap",
        _ if ticker.len() <= 4 => return ticker.to_uppercase(),
        _ => return capitalize(ticker),
    };
    name.to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Sector label for a lowercase ticker.
pub fn category(ticker: &str) -> &'static str {
    match ticker {
        "btc" | "eth" | "sol" | "ada" | "avax" | "algo" | "near" | "apt" | "sui" | "trx"
        | "ftm" | "one" => "Layer 1",
        "matic" | "arb" | "op" | "imx" => "Layer 2",
        "dot" | "atom" => "Layer 0",
        "uni" | "aave" | "mkr" | "comp" | "snx" | "crv" | "1inch" | "sushi" | "cake" | "ldo" => {
            "DeFi"
        }
        "link" | "pyth" => "Oracle",
        "xlm" | "xrp" | "ltc" | "bch" => "Payment",
        "doge" | "shib" | "pepe" | "wif" | "bonk" => "Meme",
        "usdc" | "usdt" | "dai" => "Stablecoin",
        _ => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickers_fall_back_to_upper_case() {
        assert_eq!(ticker("shiba-inu"), "SHIB");
        assert_eq!(ticker("pepe"), "PEPE");
        assert_eq!(known_ticker("pepe"), None);
        assert_eq!(usdt_pair("BTC"), "BTCUSDT");
    }

    #[test]
    fn names_and_categories() {
        assert_eq!(display_name("near"), "NEAR Protocol");
        assert_eq!(display_name("wld"), "WLD");
        assert_eq!(display_name("render"), "Render");
        assert_eq!(category("arb"), "Layer 2");
        assert_eq!(category("render"), "Other");
    }
}
