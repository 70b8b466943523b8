use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::RepurposeError;

pub(crate) fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub(crate) fn rfc3339(ts: OffsetDateTime) -> Result<String, RepurposeError> {
    ts.format(&Rfc3339)
        .map_err(|err| RepurposeError::InvalidArgument(format!("Unformattable timestamp: {err}")))
}

/// Compact UTC stamp safe for file names, e.g. `20261016T093005Z`.
pub(crate) fn file_stamp(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stamp_is_zero_padded_utc() {
        let ts = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(file_stamp(ts), "20231114T221320Z");
    }

    #[test]
    fn rfc3339_formats_utc() {
        let ts = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(rfc3339(ts).unwrap(), "1970-01-01T00:00:00Z");
    }
}
