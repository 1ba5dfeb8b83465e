//! Session key generation.

use lorahub_packet::Aes128Key;
use rand::Rng;

/// The pair of AES keys a device shares with the network for one session.
///
/// - `nwk_skey` signs every frame (MIC) and encrypts MAC commands.
/// - `app_skey` encrypts application payloads end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKeys {
    pub app_skey: Aes128Key,
    pub nwk_skey: Aes128Key,
}

impl SessionKeys {
    /// Draws a fresh pair of independent random keys.
    ///
    /// Used when personalizing a device: the keys are generated here,
    /// stored in the registry, and provisioned on the device.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        // `random()` fills the whole array: 128 bits per key.
        let app: [u8; 16] = rng.random();
        let nwk: [u8; 16] = rng.random();
        Self {
            app_skey: Aes128Key::new(app),
            nwk_skey: Aes128Key::new(nwk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keys_are_distinct() {
        let a = SessionKeys::generate();
        let b = SessionKeys::generate();

        assert_ne!(a.app_skey, a.nwk_skey, "the two keys must be independent");
        assert_ne!(a, b, "each session gets fresh keys");
    }
}
