//! # Record Parser Module
//!
//! The vectorized inner loop: scans a byte buffer of whole
//! `name;temperature\n` records and folds each one into a
//! [`StationTable`](crate::table::StationTable) with **zero allocation**.
//!
//! ## Contract
//!
//! The caller hands over a buffer whose record data begins at a record
//! boundary and ends exactly after a newline, plus at least
//! [`SLACK_BYTES`] of readable, zeroed slack after the data — vector loads
//! may overshoot the last record by up to `SLACK_BYTES - 1` bytes. Records
//! never straddle a buffer; the chunk worker guarantees both properties.
//!
//! ## Inner loop
//!
//! Per record:
//!
//! 1. **Name scan.** Vector-width blocks are compared lane-wise against `;`.
//!    A zero mask stages the whole block in the name scratchpad and the scan
//!    advances; a non-zero mask locates the semicolon at the lowest set bit,
//!    and lanes at or past it are zeroed by a lane-index compare so the
//!    masked block doubles as zero-padded key material.
//! 2. **Key materialization.** By total name length: ≤ 16 the masked block
//!    is the key; ≤ 32 the key is the staged 32 bytes; otherwise bytes
//!    `[len, 128)` of the scratchpad are zeroed and the full 128-byte block
//!    is the key.
//! 3. **Temperature.** Bytes up to the newline fold into a signed integer in
//!    tenths: `-` flips the sign, `.` is skipped, digits shift-accumulate.
//!    Exactly one fractional digit is assumed; validation stays off the hot
//!    path.
//!
//! ## Portability
//!
//! Three tiers, selected once per parser:
//!
//! - **AVX2, 32-byte lanes** — the fast path on x86_64 machines that
//!   advertise it (runtime-detected).
//! - **SSE2, 16-byte lanes** — every other x86_64 machine; SSE2 is
//!   unconditionally available on that target.
//! - **Scalar** — all remaining targets: a plain `memchr` per record.
//!
//! All tiers produce byte-identical aggregation results; the unit tests
//! hold them to that.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use crate::table::{Key16, Key32, Key128, KeyBlock, StationTable};
use memchr::memchr;

/// Readable slack the caller must keep zeroed past the record data.
pub const SLACK_BYTES: usize = 32;

/// Widest legal station name in bytes.
pub const MAX_NAME_BYTES: usize = 100;

/// Widest legal record: name, `;`, `-99.9`, `\n`.
pub const MAX_RECORD_BYTES: usize = MAX_NAME_BYTES + 7;

/// Scratchpad capacity; equals the widest key block.
#[cfg(target_arch = "x86_64")]
const SCRATCH_BYTES: usize = 128;

// ------------------------------------------------------------------------------------------------
// Parser state
// ------------------------------------------------------------------------------------------------

/// Staging area for names wider than one vector block. Block stores land at
/// 16-byte offsets, so the 32-byte alignment keeps them aligned.
#[cfg(target_arch = "x86_64")]
#[repr(C, align(32))]
struct NameScratch([u8; SCRATCH_BYTES]);

/// Reusable per-worker parser. Holds the name scratchpad so the hot loop
/// never allocates, plus the vector tier picked at construction.
pub struct RecordParser {
    #[cfg(target_arch = "x86_64")]
    scratch: NameScratch,

    /// AVX2 advertised by the running CPU.
    #[cfg(target_arch = "x86_64")]
    wide_lanes: bool,
}

impl RecordParser {
    /// Creates a parser with a zeroed scratchpad; probes the CPU once for
    /// the widest usable vector tier.
    pub fn new() -> Self {
        Self {
            #[cfg(target_arch = "x86_64")]
            scratch: NameScratch([0u8; SCRATCH_BYTES]),
            #[cfg(target_arch = "x86_64")]
            wide_lanes: std::arch::is_x86_feature_detected!("avx2"),
        }
    }

    /// Parses every record in `buf[..data_len]` into `table`.
    ///
    /// # Contract
    /// - `buf[..data_len]` begins at a record boundary and ends exactly
    ///   after a newline, or is empty.
    /// - `buf.len() >= data_len + SLACK_BYTES`, slack zeroed by the caller.
    #[inline]
    pub fn parse(&mut self, buf: &[u8], data_len: usize, table: &mut StationTable) {
        assert!(buf.len() >= data_len + SLACK_BYTES);
        debug_assert!(data_len == 0 || buf[data_len - 1] == b'\n');

        #[cfg(target_arch = "x86_64")]
        // SAFETY: the length assertion above bounds every vector load either
        // implementation performs (see the per-load notes in each variant),
        // and `parse_avx2` only runs after the feature probe in `new()`.
        unsafe {
            if self.wide_lanes {
                parse_avx2(buf, data_len, table, &mut self.scratch);
            } else {
                parse_sse2(buf, data_len, table, &mut self.scratch);
            }
        }

        #[cfg(not(target_arch = "x86_64"))]
        parse_scalar(buf, data_len, table);
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------------------------------------
// AVX2 variant (x86_64, runtime-detected)
// ------------------------------------------------------------------------------------------------

/// Vector lane width of the AVX2 variant.
#[cfg(target_arch = "x86_64")]
const WIDE_LANES: usize = 32;

/// AVX2 record loop, 32-byte blocks. Same structure as [`parse_sse2`] with
/// double the lane width: most names resolve on the very first load.
///
/// # Safety
///
/// Caller must guarantee `buf.len() >= data_len + SLACK_BYTES` and that the
/// running CPU supports AVX2. The first load of a record starts at most at
/// `data_len - 1` and spans `SLACK_BYTES`, so it stays inside `buf`;
/// follow-up loads re-check their end against `data_len + SLACK_BYTES`
/// before advancing.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn parse_avx2(
    buf: &[u8],
    data_len: usize,
    table: &mut StationTable,
    scratch: &mut NameScratch,
) {
    use core::arch::x86_64::{
        __m128i, __m256i, _mm256_and_si256, _mm256_castsi256_si128, _mm256_cmpeq_epi8,
        _mm256_cmpgt_epi8, _mm256_loadu_si256, _mm256_movemask_epi8, _mm256_set1_epi8,
        _mm256_setr_epi8, _mm256_store_si256, _mm_store_si128,
    };

    // SAFETY: AVX2 is guaranteed by the caller; load bounds are justified at
    // each site.
    unsafe {
        let semicolons = _mm256_set1_epi8(b';' as i8);
        let lane_index = _mm256_setr_epi8(
            0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
            24, 25, 26, 27, 28, 29, 30, 31,
        );

        let base = buf.as_ptr();
        let mut cursor = 0usize;

        'records: while cursor < data_len {
            // A lone newline is only legal as the single byte of an
            // otherwise empty file; skip it rather than scan for a name.
            if buf[cursor] == b'\n' {
                cursor += 1;
                continue;
            }

            // --- name scan ---
            let mut scan = cursor;
            let mut staged = 0usize;
            let (name_len, tail_block) = loop {
                // Load bound: `scan <= data_len - 1` on the first iteration,
                // and re-checked before every advance below.
                let block = _mm256_loadu_si256(base.add(scan) as *const __m256i);
                let hits = _mm256_movemask_epi8(_mm256_cmpeq_epi8(block, semicolons)) as u32;
                if hits != 0 {
                    let offset = hits.trailing_zeros() as usize;
                    // Keep lanes below the semicolon index, zero the rest.
                    let keep = _mm256_cmpgt_epi8(_mm256_set1_epi8(offset as i8), lane_index);
                    break (staged + offset, _mm256_and_si256(block, keep));
                }

                // Semicolon not in this block. Bail out if the next load
                // would leave the buffer or the name would overflow the
                // scratchpad — both impossible for conforming input.
                if staged + WIDE_LANES > SCRATCH_BYTES - WIDE_LANES
                    || scan + 2 * WIDE_LANES > data_len + SLACK_BYTES
                {
                    debug_assert!(false, "record without a semicolon in legal reach");
                    match memchr(b'\n', &buf[scan..data_len]) {
                        Some(at) => {
                            cursor = scan + at + 1;
                            continue 'records;
                        }
                        None => break 'records,
                    }
                }

                // Stage the whole block and keep scanning.
                _mm256_store_si256(scratch.0.as_mut_ptr().add(staged) as *mut __m256i, block);
                staged += WIDE_LANES;
                scan += WIDE_LANES;
            };

            debug_assert!((1..=MAX_NAME_BYTES).contains(&name_len));
            debug_assert_eq!(buf[cursor + name_len], b';');

            // --- temperature ---
            let (temp, next) = scan_temperature(buf, cursor + name_len + 1);
            cursor = next;

            // --- key materialization + update ---
            if staged == 0 {
                if name_len <= Key16::WIDTH {
                    // The low half of the masked block is the Key16.
                    let mut key = Key16::ZERO;
                    _mm_store_si128(
                        key.0.as_mut_ptr() as *mut __m128i,
                        _mm256_castsi256_si128(tail_block),
                    );
                    table.accumulate_narrow(key, temp);
                } else {
                    // The masked block *is* the Key32.
                    let mut key = Key32::ZERO;
                    _mm256_store_si256(key.0.as_mut_ptr() as *mut __m256i, tail_block);
                    table.accumulate_mid(key, temp);
                }
                continue;
            }

            // Multi-block name: park the masked tail after the staged
            // blocks, then cut the key at the routing width.
            _mm256_store_si256(scratch.0.as_mut_ptr().add(staged) as *mut __m256i, tail_block);

            if name_len <= Key32::WIDTH {
                let mut key = Key32::ZERO;
                key.0.copy_from_slice(&scratch.0[..Key32::WIDTH]);
                table.accumulate_mid(key, temp);
            } else {
                scratch.0[name_len..].fill(0);
                let mut key = Key128::ZERO;
                key.0.copy_from_slice(&scratch.0);
                table.accumulate_wide(key, temp);
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// SSE2 variant (x86_64)
// ------------------------------------------------------------------------------------------------

/// Vector lane width of the SSE2 variant.
#[cfg(target_arch = "x86_64")]
const LANES: usize = 16;

/// SSE2 record loop.
///
/// # Safety
///
/// Caller must guarantee `buf.len() >= data_len + SLACK_BYTES`. Every
/// 16-byte load then stays inside `buf`: the first load of a record starts
/// at most at `data_len - 1`, and follow-up loads re-check their end against
/// `data_len + SLACK_BYTES` before advancing.
#[cfg(target_arch = "x86_64")]
unsafe fn parse_sse2(
    buf: &[u8],
    data_len: usize,
    table: &mut StationTable,
    scratch: &mut NameScratch,
) {
    use core::arch::x86_64::{
        __m128i, _mm_and_si128, _mm_cmpeq_epi8, _mm_cmplt_epi8, _mm_loadu_si128,
        _mm_movemask_epi8, _mm_set1_epi8, _mm_setr_epi8, _mm_store_si128,
    };

    // SAFETY: all intrinsics below are SSE2, unconditionally available on
    // x86_64; load bounds are justified at each site.
    unsafe {
        let semicolons = _mm_set1_epi8(b';' as i8);
        let lane_index = _mm_setr_epi8(0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15);

        let base = buf.as_ptr();
        let mut cursor = 0usize;

        'records: while cursor < data_len {
            // A lone newline is only legal as the single byte of an
            // otherwise empty file; skip it rather than scan for a name.
            if buf[cursor] == b'\n' {
                cursor += 1;
                continue;
            }

            // --- name scan ---
            let mut scan = cursor;
            let mut staged = 0usize;
            let (name_len, tail_block) = loop {
                // Load bound: `scan <= data_len - 1` on the first iteration,
                // and re-checked before every advance below.
                let block = _mm_loadu_si128(base.add(scan) as *const __m128i);
                let hits = _mm_movemask_epi8(_mm_cmpeq_epi8(block, semicolons)) as u32;
                if hits != 0 {
                    let offset = hits.trailing_zeros() as usize;
                    // Zero every lane at or past the semicolon; the result
                    // is ready-made zero-padded key material.
                    let keep = _mm_cmplt_epi8(lane_index, _mm_set1_epi8(offset as i8));
                    break (staged + offset, _mm_and_si128(block, keep));
                }

                // Semicolon not in this block. Bail out if the next load
                // would leave the buffer or the name would overflow the
                // scratchpad — both impossible for conforming input.
                if staged + LANES > SCRATCH_BYTES - LANES
                    || scan + 2 * LANES > data_len + SLACK_BYTES
                {
                    debug_assert!(false, "record without a semicolon in legal reach");
                    match memchr(b'\n', &buf[scan..data_len]) {
                        Some(at) => {
                            cursor = scan + at + 1;
                            continue 'records;
                        }
                        None => break 'records,
                    }
                }

                // Stage the whole block and keep scanning.
                _mm_store_si128(scratch.0.as_mut_ptr().add(staged) as *mut __m128i, block);
                staged += LANES;
                scan += LANES;
            };

            debug_assert!((1..=MAX_NAME_BYTES).contains(&name_len));
            debug_assert_eq!(buf[cursor + name_len], b';');

            // --- temperature ---
            let (temp, next) = scan_temperature(buf, cursor + name_len + 1);
            cursor = next;

            // --- key materialization + update ---
            if staged == 0 {
                // Single-block name: the masked block *is* the Key16.
                let mut key = Key16::ZERO;
                _mm_store_si128(key.0.as_mut_ptr() as *mut __m128i, tail_block);
                table.accumulate_narrow(key, temp);
                continue;
            }

            // Multi-block name: park the masked tail after the staged
            // blocks, then cut the key at the routing width.
            _mm_store_si128(scratch.0.as_mut_ptr().add(staged) as *mut __m128i, tail_block);

            if name_len <= Key16::WIDTH {
                let mut key = Key16::ZERO;
                key.0.copy_from_slice(&scratch.0[..Key16::WIDTH]);
                table.accumulate_narrow(key, temp);
            } else if name_len <= Key32::WIDTH {
                let mut key = Key32::ZERO;
                key.0.copy_from_slice(&scratch.0[..Key32::WIDTH]);
                table.accumulate_mid(key, temp);
            } else {
                scratch.0[name_len..].fill(0);
                let mut key = Key128::ZERO;
                key.0.copy_from_slice(&scratch.0);
                table.accumulate_wide(key, temp);
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Scalar fallback
// ------------------------------------------------------------------------------------------------

/// Scalar record loop: `memchr` for the semicolon, zero-padding via
/// [`KeyBlock::from_name`].
///
/// This is the portable reference implementation; the vector variant is
/// required to match it byte-for-byte and the unit tests compare the two.
/// Same contract as [`RecordParser::parse`], minus the slack requirement —
/// the scalar loop never reads past `data_len`.
pub fn parse_scalar(buf: &[u8], data_len: usize, table: &mut StationTable) {
    let mut cursor = 0usize;
    while cursor < data_len {
        if buf[cursor] == b'\n' {
            cursor += 1;
            continue;
        }

        let Some(name_len) = memchr(b';', &buf[cursor..data_len]) else {
            debug_assert!(false, "record without a semicolon");
            break;
        };
        let name = &buf[cursor..cursor + name_len];

        let (temp, next) = scan_temperature(buf, cursor + name_len + 1);
        cursor = next;

        if name_len <= Key16::WIDTH {
            table.accumulate_narrow(Key16::from_name(name), temp);
        } else if name_len <= Key32::WIDTH {
            table.accumulate_mid(Key32::from_name(name), temp);
        } else {
            table.accumulate_wide(Key128::from_name(name), temp);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Temperature scan
// ------------------------------------------------------------------------------------------------

/// Folds the fixed-point temperature starting at `at` and returns the scaled
/// value together with the index one past the record's newline.
///
/// `-` flips the sign, `.` is ignored, everything else is taken as an ASCII
/// digit. Exactly one fractional digit is assumed.
#[inline(always)]
fn scan_temperature(buf: &[u8], at: usize) -> (i32, usize) {
    let mut i = at;
    let mut sign = 1i32;
    let mut value = 0i32;
    loop {
        let byte = buf[i];
        i += 1;
        match byte {
            b'\n' => break,
            b'-' => sign = -1,
            b'.' => {}
            digit => {
                debug_assert!(digit.is_ascii_digit());
                value = value * 10 + (digit - b'0') as i32;
            }
        }
    }
    (sign * value, i)
}
