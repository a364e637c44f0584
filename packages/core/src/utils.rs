// ABOUTME: Shared utility functions for PMStation
// ABOUTME: Random identifier generation for projects and stage records

use rand::Rng;

const CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generate a random alphanumeric identifier of the given length
pub fn generate_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Generate a unique project ID (12-character format)
pub fn generate_project_id() -> String {
    generate_id(12)
}
