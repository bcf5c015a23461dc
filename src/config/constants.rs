//! # Tree Shape Constants
//!
//! This module centralizes the parameters that control node fan-out, slot
//! width, and the rebalancing thresholds derived from them. The values are
//! interdependent; changing one affects page layout on disk, so they are
//! documented together and range-checked at compile time.
//!
//! ## Dependency Graph
//!
//! ```text
//! K_KV (19 bytes, slot width)
//!       │
//!       ├─> K_SZ (derived: K_KV - 1 - 7)
//!       │     Inline content prefix kept in an overflow slot: the slot
//!       │     loses 1 byte to the marker and 7 to the overflow handle.
//!       │
//!       └─> K_H (derived: K_KV - 7)
//!             Offset of the overflow handle within a slot.
//!
//! K_DATA (256, data page half-capacity)
//!       │
//!       └─> Data pages hold K_DATA..2*K_DATA items (the sole leaf that is
//!           also the root may hold fewer). A full page overflows at
//!           2*K_DATA items; an extraction below K_DATA triggers the
//!           rotate-then-concatenate protocol.
//!
//! K_INDEX (256, index page half-capacity)
//!       │
//!       └─> Index pages hold K_INDEX..2*K_INDEX entries in steady state.
//!           The top-down policy splits at 2*K_INDEX+1 and rebalances below
//!           K_INDEX on the next descent, so a page may persist one entry
//!           outside the steady band between operations. The root ranges
//!           over 1..=2*K_INDEX+2.
//! ```
//!
//! ## Persisted Format Compatibility
//!
//! All three tunables are baked into the page layout. Trees written with
//! one set of values cannot be opened with another; treat a change like a
//! file-format bump.

/// Data page half-capacity. Valid range 1..=512.
pub const K_DATA: usize = 256;

/// Index page half-capacity. Valid range 2..=2048.
pub const K_INDEX: usize = 256;

/// Width of one key or value slot in a data page, including the leading
/// length/marker byte. Valid range 8..=23.
pub const K_KV: usize = 19;

/// Inline content prefix size of an overflow slot.
pub const K_SZ: usize = K_KV - 1 - 7;

/// Offset of the overflow handle within a slot.
pub const K_H: usize = K_KV - 7;

/// Leading tag byte of an index page.
pub const TAG_INDEX_PAGE: u8 = 0x00;

/// Leading tag byte of a data page.
pub const TAG_DATA_PAGE: u8 = 0x01;

const _: () = assert!(K_DATA >= 1 && K_DATA <= 512, "K_DATA out of range");

const _: () = assert!(K_INDEX >= 2 && K_INDEX <= 2048, "K_INDEX out of range");

const _: () = assert!(K_KV >= 8 && K_KV <= 23, "K_KV out of range");

const _: () = assert!(K_SZ == K_KV - 8, "K_SZ derivation mismatch");

const _: () = assert!(K_H == K_SZ + 1, "overflow handle must follow the prefix");
