use crate::domain::record::MailRecord;

use mailparse::MailParseError;

/// Builds a record from a raw RFC 5322 header block. Values are RFC 2047
/// decoded and unfolded; the first occurrence of a repeated header wins.
pub fn record_from_header_block(raw: &[u8]) -> Result<MailRecord, MailParseError> {
    let (headers, _) = mailparse::parse_headers(raw)?;
    Ok(headers
        .iter()
        .map(|h| (h.get_key(), h.get_value().trim().to_string()))
        .collect())
}
