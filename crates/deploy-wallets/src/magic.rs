use alloy_primitives::{keccak256, FixedBytes};

/// The 8-byte wire tag used to tell the execution engine what kind of account it is dealing
/// with. A wire contract with the engine: values here must match exactly what it expects.
pub type SenderTypeTag = FixedBytes<8>;

/// The low 8 bytes of `keccak256(label)` — i.e. the least-significant 8 bytes of the 32-byte
/// hash when the hash is read as a big-endian integer.
fn keccak8(label: &str) -> SenderTypeTag {
    let hash = keccak256(label.as_bytes());
    SenderTypeTag::from_slice(&hash[24..32])
}

fn or_tags(a: SenderTypeTag, b: SenderTypeTag) -> SenderTypeTag {
    let mut out = [0u8; 8];
    for i in 0..8 {
        out[i] = a[i] | b[i];
    }
    SenderTypeTag::from(out)
}

pub fn custom() -> SenderTypeTag {
    keccak8("custom")
}

pub fn private_key() -> SenderTypeTag {
    keccak8("private-key")
}

pub fn multisig() -> SenderTypeTag {
    keccak8("multisig")
}

pub fn hardware_wallet() -> SenderTypeTag {
    or_tags(keccak8("hardware-wallet"), private_key())
}

pub fn governance() -> SenderTypeTag {
    keccak8("governance")
}

pub fn in_memory() -> SenderTypeTag {
    or_tags(keccak8("in-memory"), private_key())
}

pub fn gnosis_safe() -> SenderTypeTag {
    or_tags(keccak8("gnosis-safe"), multisig())
}

pub fn ledger() -> SenderTypeTag {
    or_tags(keccak8("ledger"), hardware_wallet())
}

pub fn trezor() -> SenderTypeTag {
    or_tags(keccak8("trezor"), hardware_wallet())
}

pub fn oz_governor() -> SenderTypeTag {
    or_tags(keccak8("oz-governor"), governance())
}

/// The wire tag for an [`deploy_config::Account`] variant.
pub fn tag_for(account: &deploy_config::Account) -> SenderTypeTag {
    use deploy_config::Account;
    match account {
        Account::PrivateKey { .. } => in_memory(),
        Account::Safe { .. } => gnosis_safe(),
        Account::Ledger { .. } => ledger(),
        Account::Trezor { .. } => trezor(),
        Account::OzGovernor { .. } => oz_governor(),
    }
}
