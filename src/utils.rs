//! Identifier minting
use bech32::Bech32m;
use uuid7::uuid7;

pub const USER_HRP: &str = "user_";
pub const SERVICE_HRP: &str = "svc_";
pub const TASK_HRP: &str = "task_";

// construct a unique, time-ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Key for per-user append-only trees: `{owner}/{seq}` with the sequence
/// zero-padded so lexicographic order matches insertion order.
pub fn seq_key(owner: &str, seq: u64) -> String {
    format!("{owner}/{seq:020}")
}

pub fn owner_prefix(owner: &str) -> String {
    format!("{owner}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_keys_sort_numerically() {
        let a = seq_key("user_1abc", 9);
        let b = seq_key("user_1abc", 10);

        assert!(a < b);
        assert!(a.starts_with(&owner_prefix("user_1abc")));
    }
}
