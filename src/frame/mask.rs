//! Utility functions for masking frame payload data.

use rand;

/// Generates a random masking key.
pub fn gen_mask() -> [u8; 4] {
	rand::random()
}

/// XORs `data` against the 4-byte key, cycling the key. Applying the same
/// key twice restores the original bytes, so this both masks and unmasks.
pub fn mask_data(mask: [u8; 4], data: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(data.len());
	let zip_iter = data.iter().zip(mask.iter().cycle());
	for (&buf_item, &key_item) in zip_iter {
		out.push(buf_item ^ key_item);
	}
	out
}
