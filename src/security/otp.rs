use rand::rngs::OsRng;
use rand::Rng;

/// Number of digits in a verification code
pub const CODE_LENGTH: usize = 6;

// One past the largest code value; codes are drawn from 000000-999999
const CODE_SPACE: u32 = 1_000_000;

/// Generate a random verification code.
///
/// Codes are drawn uniformly from the full 6-digit space using the operating
/// system RNG and zero-padded, so "004217" is as likely as "999999".
pub fn generate_code() -> String {
    let mut rng = OsRng;
    let value = rng.gen_range(0..CODE_SPACE);
    format!("{:0width$}", value, width = CODE_LENGTH)
}
