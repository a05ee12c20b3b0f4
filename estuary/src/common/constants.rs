// doc constants
/// Store-native primary identifier field.
pub const DOC_ID: &str = "_id";
/// Generic identifier field expected by the ORM.
pub const ID_FIELD: &str = "id";
pub const RESERVED_FIELDS: [&str; 1] = [DOC_ID];

// criteria constants
pub const WHERE_KEY: &str = "where";
pub const LIMIT_KEY: &str = "limit";
pub const SKIP_KEY: &str = "skip";
pub const SORT_KEY: &str = "sort";
pub const GROUP_BY_KEY: &str = "groupBy";

// schema constants
pub const TYPE_ATTR: &str = "type";
pub const UNIQUE_ATTR: &str = "unique";
pub const INDEX_ATTR: &str = "index";
pub const AUTO_INCREMENT_ATTR: &str = "autoIncrement";

// index constants
pub const UNIQUE_INDEX: &str = "unique";
pub const NON_UNIQUE_INDEX: &str = "non-unique";

pub const ESTUARY_VERSION: &str = env!("CARGO_PKG_VERSION");
