/// Default cadence of `tick_all` calls made by the driver (milliseconds)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
/// Upper bound on the tick interval (one minute); anything coarser is almost certainly a typo
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;
/// Default number of idle passes before the driver reports a stall (0 disables detection)
pub const DEFAULT_STALL_PASSES: u32 = 0;
