use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::models::Timestamp;

pub(crate) fn now_unix() -> Timestamp {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// RFC 3339 rendering of a unix timestamp; `None` when out of range.
pub(crate) fn format_unix(value: Timestamp) -> Option<String> {
    OffsetDateTime::from_unix_timestamp(value).ok().and_then(|dt| dt.format(&Rfc3339).ok())
}
