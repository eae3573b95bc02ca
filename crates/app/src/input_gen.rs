//! Sample input generation for link tests.
//!
//! When no input file is specified, we generate one. Most of it is readable
//! text so damage in `output.txt` can be spotted by eye, with some sections
//! that stress the framing:
//! - Numbered text lines (position of a lost or garbled block is obvious)
//! - Bursts of the marker byte values (start, end, stuffing)
//! - Random bytes

use linksim_core::framing::{END_MARKER, START_MARKER, STUFF_BYTE};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SECTION_SIZE: usize = 512;

/// Generate sample link test data.
///
/// # Arguments
/// - `seed`: random seed for determinism
/// - `size_bytes`: exact size of generated data
pub fn generate_sample_data(seed: u64, size_bytes: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(size_bytes + SECTION_SIZE);
    let mut line_no = 0u32;

    while data.len() < size_bytes {
        match rng.gen_range(0..10) {
            // 70% numbered text lines
            0..=6 => {
                let end = data.len() + SECTION_SIZE;
                while data.len() < end {
                    line_no += 1;
                    data.extend_from_slice(format!("{line_no:05} ").as_bytes());
                    data.extend_from_slice(&text_line(&mut rng));
                    data.push(b'\n');
                }
            }

            // 20% marker values
            7..=8 => {
                let markers = [START_MARKER, END_MARKER, STUFF_BYTE];
                for _ in 0..SECTION_SIZE {
                    data.push(markers[rng.gen_range(0..markers.len())]);
                }
            }

            // 10% random bytes
            _ => {
                for _ in 0..SECTION_SIZE {
                    data.push(rng.gen());
                }
            }
        }
    }

    data.truncate(size_bytes);
    data
}

fn text_line(rng: &mut ChaCha8Rng) -> Vec<u8> {
    let alphabet = b"abcdefghijklmnopqrstuvwxyz";
    let words = rng.gen_range(4..=10);
    let mut line = Vec::new();

    for w in 0..words {
        if w > 0 {
            line.push(b' ');
        }
        for _ in 0..rng.gen_range(2..=8) {
            line.push(alphabet[rng.gen_range(0..alphabet.len())]);
        }
    }
    line.push(b'.');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sample_data() {
        let data = generate_sample_data(42, 1000);
        assert_eq!(data.len(), 1000);
    }

    #[test]
    fn test_determinism() {
        let data1 = generate_sample_data(12345, 5000);
        let data2 = generate_sample_data(12345, 5000);

        assert_eq!(data1, data2);
    }

    #[test]
    fn test_different_seeds() {
        let data1 = generate_sample_data(1, 1000);
        let data2 = generate_sample_data(2, 1000);

        assert_ne!(data1, data2);
    }

    #[test]
    fn test_various_sizes() {
        for size in [0, 1, 100, 1000, 10000] {
            let data = generate_sample_data(999, size);
            assert_eq!(data.len(), size);
        }
    }

    #[test]
    fn test_contains_marker_sections() {
        let data = generate_sample_data(7, 50_000);
        assert!(data.contains(&START_MARKER));
        assert!(data.contains(&END_MARKER));
        assert!(data.contains(&b'\n'));
    }
}
