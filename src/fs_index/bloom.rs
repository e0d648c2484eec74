//! Fixed-size Bloom filter with three double-hashed probes.

pub const BITS_PER_ENTRY: usize = 12;
pub const MIN_BITS: usize = 1 << 12;
pub const MAX_BITS: usize = 1 << 25;
pub const HASH_COUNT: u32 = 3;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a
pub fn fnv1a32(value: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for byte in value.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Secondary hash (murmur3 finalizer over a djb2 accumulator), forced odd so
/// every probe step visits distinct bits of a power-of-two table.
fn secondary_hash(value: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in value.as_bytes() {
        hash = hash.wrapping_mul(33) ^ u32::from(*byte);
    }
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;
    hash | 1
}

#[derive(Debug, Clone)]
pub struct BloomFilter {
    words: Vec<u64>,
    bit_count: usize,
}

impl BloomFilter {
    /// Size the filter for `expected` entries, clamped to `[2^12, 2^25]` bits.
    pub fn with_expected(expected: usize) -> Self {
        let wanted = expected.saturating_mul(BITS_PER_ENTRY).max(1);
        let bit_count = wanted
            .checked_next_power_of_two()
            .unwrap_or(MAX_BITS)
            .clamp(MIN_BITS, MAX_BITS);
        Self {
            words: vec![0; bit_count / 64],
            bit_count,
        }
    }

    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    fn positions(&self, value: &str) -> [usize; HASH_COUNT as usize] {
        let h1 = fnv1a32(value);
        let h2 = secondary_hash(value);
        let mask = self.bit_count - 1;
        let mut out = [0usize; HASH_COUNT as usize];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (h1.wrapping_add((i as u32).wrapping_mul(h2)) as usize) & mask;
        }
        out
    }

    pub fn insert(&mut self, value: &str) {
        for bit in self.positions(value) {
            self.words[bit / 64] |= 1u64 << (bit % 64);
        }
    }

    pub fn might_contain(&self, value: &str) -> bool {
        self.positions(value)
            .into_iter()
            .all(|bit| self.words[bit / 64] & (1u64 << (bit % 64)) != 0)
    }
}
