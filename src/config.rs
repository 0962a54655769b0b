/// Default number of samples held by a single chunk.
pub const DEFAULT_CHUNK_SAMPLES: usize = 360;

/// Upper bound on per-chunk capacity accepted from CHUNK_SIZE.
pub const MAX_CHUNK_SAMPLES: usize = 1024 * 1024;

/// Default retention. Zero means samples are kept forever.
pub const DEFAULT_RETENTION_SECS: u64 = 0;

/// Minimum server version the module loads on.
pub const TIMESERIES_MIN_SUPPORTED_VERSION: &[i64; 3] = &[7, 2, 0];
