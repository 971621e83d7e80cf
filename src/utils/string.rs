//! String utility functions

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random alphanumeric token of `len` characters
///
/// # Arguments
///
/// * `len` - Number of characters
///
/// # Returns
///
/// A string drawn uniformly from `[A-Za-z0-9]`
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
