//! Random, cluster-legal resource names.

use rand::RngCore;

/// Prefix carried by every generated name.
pub const NAME_PREFIX: &str = "kubench";

// DNS-1123 label alphabet, minus uppercase.
const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const GROUP_LEN: usize = 8;

/// Generate a DNS-1123 label of the form `kubench-XXXXXXXX-XXXXXXXX`.
///
/// Two 8-character lowercase alphanumeric groups give enough entropy to
/// avoid collisions across a benchmark run; the fixed prefix keeps generated
/// objects recognizable in `kubectl` output.
pub fn generate_name(rng: &mut impl RngCore) -> String {
    format!("{NAME_PREFIX}-{}-{}", group(rng), group(rng))
}

fn group(rng: &mut impl RngCore) -> String {
    (0..GROUP_LEN)
        .map(|_| CHARS[rng.next_u32() as usize % CHARS.len()] as char)
        .collect()
}
