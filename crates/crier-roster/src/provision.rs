//! Daily roster provisioning from the template sheet.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::client::RosterClient;
use crate::error::RosterError;
use crate::layout::{
    COL_CALL_TIME, COL_LOCATION, COL_NAME, COL_PHONE_NUMBER, HEADER, SHEET_TITLE_FORMAT,
    TIMESTAMP_FORMAT, TIME_OF_DAY_FORMAT,
};

/// The title of today's roster sheet under the reference timezone.
pub fn daily_sheet_title(now: DateTime<Utc>, zone: FixedOffset) -> String {
    now.with_timezone(&zone)
        .format(SHEET_TITLE_FORMAT)
        .to_string()
}

/// Find or create today's roster sheet, returning its title.
///
/// When the sheet is missing it is materialized from the template: one row
/// per template recipient, with the scheduled call instant computed from the
/// template's time-of-day plus today's date in the reference timezone, and
/// empty status columns. Template rows missing identity fields or carrying a
/// malformed time-of-day are skipped with a warning rather than aborting the
/// whole day.
pub async fn ensure_daily_sheet(
    client: &RosterClient,
    template: &str,
    now: DateTime<Utc>,
    zone: FixedOffset,
) -> Result<String, RosterError> {
    let title = daily_sheet_title(now, zone);

    if client.sheet_exists(&title).await? {
        debug!(sheet = %title, "daily sheet already exists");
        return Ok(title);
    }

    info!(sheet = %title, template, "daily sheet not found, provisioning from template");

    let template_rows = client.rows(template).await?;
    let today = now.with_timezone(&zone).date_naive();

    let mut values: Vec<Vec<String>> =
        vec![HEADER.iter().map(|h| h.to_string()).collect()];

    for row in &template_rows {
        let (Some(name), Some(phone), Some(location), Some(time_of_day)) = (
            row.cell(COL_NAME),
            row.cell(COL_PHONE_NUMBER),
            row.cell(COL_LOCATION),
            row.cell(COL_CALL_TIME),
        ) else {
            warn!(row = row.index, "skipping template row with missing fields");
            continue;
        };

        let time = match NaiveTime::parse_from_str(time_of_day, TIME_OF_DAY_FORMAT) {
            Ok(t) => t,
            Err(e) => {
                warn!(row = row.index, time_of_day, error = %e, "skipping template row with invalid call time");
                continue;
            }
        };

        let scheduled = today.and_time(time).format(TIMESTAMP_FORMAT).to_string();

        values.push(vec![
            name.to_string(),
            phone.to_string(),
            location.to_string(),
            scheduled,
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ]);
    }

    let recipients = values.len() - 1;
    client.add_sheet(&title).await?;
    client.append_rows(&title, values).await?;

    info!(sheet = %title, recipients, "provisioned daily sheet");
    Ok(title)
}
