use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::seed::{SeedHash, ServerSeed};

// Deterministic keystream using the provably-fair HMAC construction:
// block b = HMAC-SHA256(key = server_seed, msg = "{client_seed}:{nonce}:{b}")
// Blocks are consumed front to back; the next block is derived on exhaustion.

pub type HmacSha256 = Hmac<Sha256>;

const BLOCK_LEN: usize = 32;

pub struct ProvablyFairRng<'a> {
    pub server_seed: &'a ServerSeed,
    pub client_seed: &'a str,
    pub nonce: u64,
}

impl<'a> ProvablyFairRng<'a> {
    pub fn new(server_seed: &'a ServerSeed, client_seed: &'a str, nonce: u64) -> Self {
        Self {
            server_seed,
            client_seed,
            nonce,
        }
    }

    pub fn server_seed_hash(&self) -> SeedHash {
        self.server_seed.hash()
    }

    pub fn keystream(&self) -> Keystream {
        Keystream::new(self.server_seed, self.client_seed, self.nonce)
    }
}

/// Pseudo-random byte reader over the HMAC block sequence.
pub struct Keystream {
    mac: HmacSha256,
    prefix: String,
    block: u64,
    buffer: [u8; BLOCK_LEN],
    cursor: usize,
}

impl Keystream {
    pub fn new(server_seed: &ServerSeed, client_seed: &str, nonce: u64) -> Self {
        let mac =
            HmacSha256::new_from_slice(server_seed.as_bytes()).expect("HMAC accepts any key length");
        let mut stream = Self {
            mac,
            prefix: format!("{client_seed}:{nonce}:"),
            block: 0,
            buffer: [0u8; BLOCK_LEN],
            cursor: 0,
        };
        stream.buffer = stream.derive_block(0);
        stream
    }

    fn derive_block(&self, block: u64) -> [u8; BLOCK_LEN] {
        let mut mac = self.mac.clone();
        mac.update(self.prefix.as_bytes());
        mac.update(block.to_string().as_bytes());
        mac.finalize().into_bytes().into()
    }

    fn refill(&mut self) {
        self.block += 1;
        self.buffer = self.derive_block(self.block);
        self.cursor = 0;
    }

    /// Index of the HMAC block currently being read.
    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn fill(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            if self.cursor == BLOCK_LEN {
                self.refill();
            }
            let take = (BLOCK_LEN - self.cursor).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.buffer[self.cursor..self.cursor + take]);
            self.cursor += take;
            written += take;
        }
    }

    pub fn read(&mut self, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        self.fill(&mut out);
        out
    }

    /// Next 4 bytes, big-endian.
    pub fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    /// Uniform draw in `[0, n)` by rejection sampling, so no residue class is
    /// favoured. `n` must be non-zero.
    pub fn uniform(&mut self, n: u32) -> u32 {
        assert!(n > 0, "uniform range must be non-empty");
        let span = 1u64 << 32;
        let zone = span - span % n as u64;
        loop {
            let v = self.next_u32() as u64;
            if v < zone {
                return (v % n as u64) as u32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> ServerSeed {
        ServerSeed::from_bytes([1u8; 32])
    }

    #[test]
    fn test_determinism() {
        let s = seed();
        let rng1 = ProvablyFairRng::new(&s, "client", 1);
        let rng2 = ProvablyFairRng::new(&s, "client", 1);
        assert_eq!(rng1.server_seed_hash(), rng2.server_seed_hash());
        assert_eq!(rng1.keystream().read(100), rng2.keystream().read(100));
    }

    #[test]
    fn test_nonce_changes_stream() {
        let s = seed();
        let a = ProvablyFairRng::new(&s, "client", 1).keystream().read(32);
        let b = ProvablyFairRng::new(&s, "client", 2).keystream().read(32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_refill_is_seamless() {
        let s = seed();
        let whole = Keystream::new(&s, "c", 9).read(80);
        let mut pieces = Keystream::new(&s, "c", 9);
        let mut joined = pieces.read(30);
        joined.extend(pieces.read(3));
        joined.extend(pieces.read(47));
        assert_eq!(whole, joined);
        assert_eq!(pieces.block(), 2);
    }

    #[test]
    fn test_first_block_is_plain_hmac() {
        let s = seed();
        let mut mac = HmacSha256::new_from_slice(s.as_bytes()).unwrap();
        mac.update(b"client:5:0");
        let expected = mac.finalize().into_bytes().to_vec();
        assert_eq!(Keystream::new(&s, "client", 5).read(32), expected);
    }

    #[test]
    fn test_uniform_in_range() {
        let s = seed();
        let mut ks = Keystream::new(&s, "c", 1);
        for n in 1..=64u32 {
            assert!(ks.uniform(n) < n);
        }
    }
}
