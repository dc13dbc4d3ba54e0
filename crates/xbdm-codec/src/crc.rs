//! Reflected CRC-32 for `xbupdate!sysfileupd` uploads.
//!
//! `init 0xFFFFFFFF`, `poly 0xEDB88320` (reflected), **no final XOR** — unlike
//! the common CRC-32/ISO-HDLC variant, which XORs the final register with
//! `0xFFFFFFFF`. The uploader computes this no-final-XOR variant client-side
//! when tagging an upload; the server verifies against it and rejects the
//! file on mismatch.
//!
//! Expressed as a `crc::Algorithm` rather than hand-rolled, the way a file
//! transfer protocol reaching for the `crc` crate would for its own frame
//! checksums.

use crc::{Algorithm, Crc};

/// `poly 0xEDB88320` reflected is `poly 0x04C11DB7` in the crate's normal
/// (MSB-first) convention.
const XBUPDATE_CRC32: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x04C1_1DB7,
    init: 0xFFFF_FFFF,
    refin: true,
    refout: true,
    xorout: 0x0000_0000,
    // `check`/`residue` are catalog metadata only, not consulted by `Crc::new`;
    // this variant isn't a named catalog entry so they're left at zero.
    check: 0x0000_0000,
    residue: 0x0000_0000,
};

/// An incremental CRC-32 accumulator for a single `xbupdate` upload; fed one
/// chunk at a time as bytes arrive at the receive-mode sink.
#[derive(Debug)]
pub struct XbupdateCrc32 {
    digest: crc::Digest<'static, u32>,
}

impl Default for XbupdateCrc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl XbupdateCrc32 {
    pub fn new() -> Self {
        static CRC: Crc<u32> = Crc::<u32>::new(&XBUPDATE_CRC32);
        Self { digest: CRC.digest() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

/// One-shot helper for tests and small buffers.
pub fn crc32_xbupdate(bytes: &[u8]) -> u32 {
    let mut acc = XbupdateCrc32::new();
    acc.update(bytes);
    acc.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_one_shot() {
        let whole = crc32_xbupdate(b"HELLO WORLD");
        let mut acc = XbupdateCrc32::new();
        acc.update(b"HELLO ");
        acc.update(b"WORLD");
        assert_eq!(acc.finalize(), whole);
    }

    #[test]
    fn differs_from_standard_iso_hdlc_crc32_by_the_final_xor() {
        let standard = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(b"data");
        let ours = crc32_xbupdate(b"data");
        assert_eq!(ours, standard ^ 0xFFFF_FFFF);
    }
}
