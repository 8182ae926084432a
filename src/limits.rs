use crate::model::Ms;

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 4_000;
pub const MAX_AMENITIES: usize = 64;
pub const MAX_IMAGES: usize = 64;
pub const MAX_LIST_ITEM_LEN: usize = 512;
pub const MAX_GST_PERCENT: u32 = 100;
/// Nightly rate cap in minor units. Keeps a full-length stay's tax math
/// far inside `u64`.
pub const MAX_PRICE: u64 = 10_000_000_000;

pub const MAX_GUEST_FIELD_LEN: usize = 254;
pub const MAX_REASON_LEN: usize = 1_000;

/// Longest stay a single reservation may cover.
pub const MAX_STAY_NIGHTS: usize = 365;
/// Widest window accepted by the unavailable-days query.
pub const MAX_UNAVAILABLE_WINDOW_DAYS: i64 = 731;

/// Valid timestamp range: 1970-01-01 to 9999-12-31.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_799_999;
