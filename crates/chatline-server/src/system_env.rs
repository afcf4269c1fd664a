//! Production `Environment` using the system clock and OS randomness.

use std::time::{SystemTime, UNIX_EPOCH};

use chatline_core::env::Environment;

/// Production environment using wall-clock time and `getrandom`.
///
/// Key aliases, signing keys and room channels all draw from the OS RNG.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Environment backed by the OS clock and RNG.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Never fails on supported platforms
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_time_is_wall_clock() {
        let env = SystemEnv::new();

        let t1 = env.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t2 = env.now_millis();

        // Later than 2020-01-01
        assert!(t1 > 1_577_836_800_000);
        assert!(t2 >= t1);
    }

    #[test]
    fn key_seeds_differ_between_draws() {
        let env = SystemEnv::new();

        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        env.random_bytes(&mut first);
        env.random_bytes(&mut second);

        assert_ne!(first, second);
        assert_ne!(env.random_u128(), env.random_u128());
    }
}
