//! Date helpers used by the recurring-billing request builders.

use error_stack::{report, ResultExt};
use time::{Date, Month};

use crate::errors::{ConnectorError, CustomResult};

/// `MMDDYYYY`, the recurring sub-protocol's date layout.
pub(crate) fn format_mmddyyyy(date: Date) -> String {
    format!(
        "{:02}{:02}{:04}",
        u8::from(date.month()),
        date.day(),
        date.year()
    )
}

/// Advance a date by whole months, clamping to the last day of the target
/// month (Jan 31 + 1 month = Feb 28/29).
pub(crate) fn advance_months(date: Date, months: u32) -> CustomResult<Date, ConnectorError> {
    let zero_based = date.year() * 12 + i32::from(u8::from(date.month())) - 1;
    let target = zero_based
        .checked_add(i32::try_from(months).change_context(ConnectorError::RequestEncodingFailed)?)
        .ok_or_else(|| report!(ConnectorError::RequestEncodingFailed))?;
    let year = target.div_euclid(12);
    let month = Month::try_from((target.rem_euclid(12) + 1) as u8)
        .change_context(ConnectorError::RequestEncodingFailed)?;
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).change_context(ConnectorError::RequestEncodingFailed)
}
