pub const KEY_NOT_FOUND: &str = "TSDB: the key does not exist";
pub const DUPLICATE_KEY: &str = "TSDB: key already exists";

pub const INVALID_TIMESTAMP: &str = "TSDB: invalid timestamp";
pub const TIMESTAMP_TOO_OLD: &str =
    "TSDB: timestamp must be higher than the maximum existing timestamp";
pub const INVALID_VALUE: &str = "TSDB: invalid value";
pub const INVALID_RETENTION: &str = "TSDB: invalid RETENTION value";
pub const INVALID_CHUNK_SIZE: &str = "TSDB: invalid CHUNK_SIZE value";
pub const INVALID_LABELS: &str = "TSDB: invalid LABELS list";
pub const DUPLICATE_LABEL: &str = "TSDB: duplicate label name";
pub const INVALID_RESET_BUCKET: &str = "TSDB: invalid RESET bucket value";

pub const UNKNOWN_AGGREGATION_TYPE: &str = "TSDB: unknown AGGREGATION type";
pub const MISSING_AGGREGATION: &str = "TSDB: missing AGGREGATION keyword";
pub const INVALID_BUCKET_SIZE: &str = "TSDB: invalid AGGREGATION bucket size";

pub const RULE_EXISTS: &str = "TSDB: the destination key already has a rule from this source";
pub const DEST_ALREADY_DERIVED: &str = "TSDB: the destination key already has a src rule";
pub const CYCLIC_RULE: &str = "TSDB: the source key is itself a compaction destination";
pub const RULE_NOT_FOUND: &str = "TSDB: compaction rule does not exist";
pub const SAME_SOURCE_AND_DEST: &str =
    "TSDB: the source key and destination key should be different";

pub const INVALID_SELECTOR: &str = "TSDB: invalid series selector";
pub const MISSING_FILTER: &str = "TSDB: no FILTER given";
