use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use super::ApiError;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("Invalid regex")
    })
}

#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    address.len() <= 254 && email_regex().is_match(address)
}

/// Splits a comma-separated recipient list into unique, valid addresses.
///
/// Every entry must be an address, so an empty entry (`"a@x.io,"`) rejects
/// the whole list.
pub fn validate_recipients(raw: &str) -> Result<Vec<String>, ApiError> {
    let entries: Vec<&str> = raw.split(',').map(str::trim).collect();

    if !entries.iter().all(|entry| is_valid_email(entry)) {
        return Err(ApiError::bad_request("Invalid list of recipients"));
    }

    let recipients: BTreeSet<String> = entries.into_iter().map(str::to_string).collect();
    Ok(recipients.into_iter().collect())
}

/// Accepts `text/csv` with any parameters (`; charset=utf-8`).
pub fn validate_csv_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    let is_csv = content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .is_some_and(|mime| mime.essence_str() == CSV_CONTENT_TYPE);

    if is_csv {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Invalid content type of source file: {}. Expected {}",
            content_type.unwrap_or("none"),
            CSV_CONTENT_TYPE
        )))
    }
}
