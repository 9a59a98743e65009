// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Checksum reported by the device for each file in a LIST reply.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 (Ethernet polynomial, reflected, inverted) of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
