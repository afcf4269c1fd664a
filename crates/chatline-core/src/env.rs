//! Clock and entropy for the contract network.
//!
//! Everything the network draws from the outside world goes through
//! [`Environment`]: message timestamps, signing-key seeds, alias numbers and
//! room channels. `SystemEnv` in the server backs it with the OS; `SimEnv` in
//! the harness backs it with a virtual clock and a seeded RNG, so a run
//! replays exactly from its seed.
//!
//! Implementations must keep `now_millis` monotonic and must not share state
//! between instances that were not cloned from each other.

/// Random identifiers drawn before giving up on finding an unused one.
pub const MAX_ID_DRAWS: usize = 16;

/// Draw with `draw` until a value is not `taken`, at most [`MAX_ID_DRAWS`]
/// times. Returns `None` if every draw was taken.
pub fn draw_unused<T>(draw: impl FnMut() -> T, taken: impl Fn(&T) -> bool) -> Option<T> {
    std::iter::repeat_with(draw).take(MAX_ID_DRAWS).find(|candidate| !taken(candidate))
}

/// Abstract environment providing time and randomness.
///
/// Key aliases, signing keys and room channels are all drawn from
/// `random_bytes`, and message timestamps from `now_millis`.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls return values >= previous calls.
    fn now_millis(&self) -> u64;

    /// Fill `buffer` with random bytes.
    ///
    /// # Security
    ///
    /// Production implementations MUST use OS entropy (`getrandom`); the
    /// bytes seed Ed25519 signing keys. Simulation implementations MUST use a
    /// seeded RNG and the seed MUST be logged for reproducibility.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64` built from 8 random bytes.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Random `u128` built from 16 random bytes.
    ///
    /// Used for room channels.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}
