//! Random alphanumeric tokens for upload names and download file names.
//!
//! These are collision-resistant labels, not secrets.

use rand::distributions::Alphanumeric;
use rand::Rng;

pub const DEFAULT_ID_LENGTH: usize = 21;

pub fn generate(length: usize) -> String {
    generate_with(&mut rand::thread_rng(), length)
}

pub fn generate_default() -> String {
    generate(DEFAULT_ID_LENGTH)
}

/// Draws `length` characters uniformly, with replacement, from `[A-Za-z0-9]`.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn produces_exact_length_from_alphabet() {
        for length in [0usize, 1, 8, 21, 64, 257] {
            let id = generate(length);
            assert_eq!(id.chars().count(), length);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn default_length_is_21() {
        assert_eq!(generate_default().len(), DEFAULT_ID_LENGTH);
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let first = generate_with(&mut rng, 16);
        let mut rng_again = ChaCha20Rng::seed_from_u64(42);
        assert_eq!(first, generate_with(&mut rng_again, 16));
    }

    #[test]
    fn covers_all_character_classes() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let sample = generate_with(&mut rng, 4096);
        assert!(sample.chars().any(|c| c.is_ascii_uppercase()));
        assert!(sample.chars().any(|c| c.is_ascii_lowercase()));
        assert!(sample.chars().any(|c| c.is_ascii_digit()));
    }
}
