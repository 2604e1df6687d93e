use alloy_primitives::{keccak256, Address};

/// Deterministic account address for a named actor or contract.
pub fn labeled(label: &str) -> Address {
    Address::from_word(keccak256(label.as_bytes()))
}

/// Address of the `index`-th simulated account.
pub fn account(index: u32) -> Address {
    labeled(&format!("account/{index}"))
}
