mod add;
pub mod arg_parse;
mod create;
mod create_rule;
mod delete_rule;
mod incr_decr_by;
mod info;
mod mrange;
mod query_index;
mod range;

pub use add::*;
pub use create::*;
pub use create_rule::*;
pub use delete_rule::*;
pub use incr_decr_by::*;
pub use info::*;
pub use mrange::*;
pub use query_index::*;
pub use range::*;
