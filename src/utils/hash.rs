const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over `bytes`.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Index key of a fixed-width string: trailing NUL padding is ignored so that
/// a decoded value hashes the same as the one that was inserted.
pub fn hash_string(s: &str) -> i64 {
    let trimmed = s.trim_end_matches('\0');
    fnv1a_64(trimmed.as_bytes()) as i64
}
