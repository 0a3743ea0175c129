use rand::RngCore;
use rand::rngs::OsRng;

/// Hex string of `len` bytes drawn from the OS CSPRNG.
pub fn random_hex(len: usize) -> String {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
