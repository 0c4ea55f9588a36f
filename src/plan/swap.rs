//! Swap sizing heuristic

use crate::config::SwapChoice;
use crate::disk::units::{Bytes, GIB};
use crate::system::MemoryInfo;
use serde::Serialize;
use tracing::debug;

/// Extra room required beyond the distribution's own requirement before
/// swap is considered affordable.
pub const SWAP_HEADROOM: Bytes = Bytes::mib(600);

/// Without suspend-to-disk, swap never exceeds this
pub const SWAP_CAP: Bytes = Bytes::gib(8);

/// Suggest a swap size in bytes.
///
/// Ramps quickly up to 8 GiB (twice the RAM up to 4 GiB of RAM), then
/// follows the RAM size. Unless suspend-to-disk is wanted the result is
/// capped at 8 GiB and at 10% of `available`. The overestimation factor is
/// applied between the two caps.
pub fn suggest_swap_size(
    available: Bytes,
    choice: SwapChoice,
    total_ram: Bytes,
    overestimation_factor: f64,
) -> Bytes {
    if !choice.creates_partition() {
        return Bytes::ZERO;
    }
    let suspend = choice.ensures_suspend_to_disk();
    let ram = total_ram.0;

    let mut suggested = if ram <= 4 * GIB {
        ram.saturating_mul(2)
    } else if ram <= 8 * GIB {
        8 * GIB
    } else {
        ram
    };

    if !suspend {
        suggested = suggested.min(SWAP_CAP.0);
    }

    // fudge factor for firmware-reported RAM
    suggested = (suggested as f64 * overestimation_factor.max(0.0)) as u64;

    if !suspend {
        suggested = suggested.min(available.0 / 10);
    }

    debug!(
        "Suggested swap size: {:.2} GiB",
        Bytes(suggested).as_gib_f64()
    );
    Bytes(suggested)
}

/// Whether a swap partition fits, and how large it should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapDecision {
    pub suggested: Bytes,
    pub create: bool,
}

impl SwapDecision {
    pub const NONE: SwapDecision = SwapDecision {
        suggested: Bytes::ZERO,
        create: false,
    };
}

/// Decide on swap given the space left after any reserved regions.
///
/// Swap is created only when `available` strictly exceeds the required
/// space plus [`SWAP_HEADROOM`] plus the suggestion; an exact fit gets none.
pub fn decide_swap(
    available: Bytes,
    choice: SwapChoice,
    required_space: Bytes,
    memory: &MemoryInfo,
) -> SwapDecision {
    if !choice.creates_partition() {
        return SwapDecision::NONE;
    }

    let suggested = suggest_swap_size(
        available,
        choice,
        memory.total_ram,
        memory.overestimation_factor,
    );
    let required = required_space + SWAP_HEADROOM + suggested;

    SwapDecision {
        suggested,
        create: available > required,
    }
}
