use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::{MessageParser, PartType};

use crate::error::DecodeError;
use super::common::{BodyPart, DecodedMessage};

/// Decodes a raw RFC 822 message into its date and body parts.
///
/// A missing or unreadable `Date:` header is not an error: the message comes back
/// with `timestamp: None` and the caller decides what to do with it.
pub fn decode(raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or(DecodeError::Unparseable)?;

    let timestamp = match message.date() {
        Some(date) => DateTime::from_timestamp(date.to_timestamp(), 0),
        None => parse_date_from_raw_headers(&String::from_utf8_lossy(raw)),
    };

    let parts = message
        .parts
        .iter()
        .enumerate()
        .filter_map(|(index, part)| match &part.body {
            PartType::Multipart(_) => None,
            PartType::Text(text) | PartType::Html(text) if !message.attachments.contains(&index) => {
                Some(BodyPart::Inline(text.to_string()))
            }
            _ => Some(BodyPart::Other),
        })
        .collect::<Vec<_>>();

    debug!("Decoded message: date={:?}, {} part(s)", timestamp, parts.len());

    Ok(DecodedMessage { timestamp, parts })
}

fn parse_date_from_raw_headers(email_content: &str) -> Option<DateTime<Utc>> {
    for line in email_content.lines().take(50) {
        if line.is_empty() {
            break; // end of headers
        }

        if let Some(date_part) = line.strip_prefix("Date: ") {
            if let Ok(parsed_date) = DateTime::parse_from_rfc2822(date_part.trim()) {
                return Some(parsed_date.with_timezone(&Utc));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plain_message() {
        let raw = b"From: tracker@example.com\r\n\
Date: Fri, 01 Mar 2024 09:00:00 +0000\r\n\
Subject: Location\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Current location: Spain\r\n";

        let decoded = decode(raw).unwrap();
        assert_eq!(decoded.timestamp, Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
        assert_eq!(decoded.parts.len(), 1);
        assert!(matches!(&decoded.parts[0], BodyPart::Inline(text) if text.contains("Spain")));
    }

    #[test]
    fn test_multipart_with_attachment() {
        let raw = b"From: tracker@example.com\r\n\
Date: Fri, 01 Mar 2024 22:00:00 +0100\r\n\
Subject: Location\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Now in Andorra\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
Content-Disposition: attachment; filename=\"track.txt\"\r\n\
\r\n\
Andorra Andorra\r\n\
--XYZ--\r\n";

        let decoded = decode(raw).unwrap();
        assert_eq!(decoded.timestamp, Some(Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap()));

        let inline: Vec<_> = decoded.parts.iter().filter(|p| matches!(p, BodyPart::Inline(_))).collect();
        assert_eq!(inline.len(), 1);
        assert!(decoded.parts.contains(&BodyPart::Other));
    }

    #[test]
    fn test_missing_date() {
        let raw = b"From: tracker@example.com\r\nSubject: Location\r\n\r\nSpain\r\n";
        let decoded = decode(raw).unwrap();
        assert!(decoded.timestamp.is_none());
    }

    #[test]
    fn test_raw_header_fallback() {
        let headers = "Subject: x\r\nDate: Sat, 02 Mar 2024 10:30:00 +0000\r\n\r\nbody";
        assert_eq!(
            parse_date_from_raw_headers(headers),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 10, 30, 0).unwrap())
        );
        assert_eq!(parse_date_from_raw_headers("Subject: x\r\n\r\nDate: Sat, 02 Mar 2024 10:30:00 +0000"), None);
    }
}
