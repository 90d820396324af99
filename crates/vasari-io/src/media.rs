//! Magic-byte sniffing and `data:` URI encoding.

use crate::error::{IoError, Result, SniffError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Binary formats recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Jpeg,
    Png,
    Bitmap,
    MpegAudio,
    MpegVideo,
}

const SIGNATURES: &[(&[u8], MediaKind)] = &[
    (&[0xFF, 0xD8, 0xFF], MediaKind::Jpeg),
    (&[0x89, 0x50, 0x4E, 0x47], MediaKind::Png),
    (&[0x42, 0x4D], MediaKind::Bitmap),
    (&[0xFF, 0xFB], MediaKind::MpegAudio),
    (&[0x00, 0x00, 0x00], MediaKind::MpegVideo),
];

impl MediaKind {
    pub fn mime(self) -> &'static str {
        match self {
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Png => "image/png",
            MediaKind::Bitmap => "image/bmp",
            MediaKind::MpegAudio => "audio/mpeg",
            MediaKind::MpegVideo => "video/mpeg",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, MediaKind::Jpeg | MediaKind::Png | MediaKind::Bitmap)
    }
}

/// Identify a payload by its magic number.
pub fn sniff(bytes: &[u8]) -> std::result::Result<MediaKind, SniffError> {
    SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, kind)| *kind)
        .ok_or_else(|| SniffError {
            leading: bytes.iter().take(4).copied().collect(),
        })
}

/// Sniff `bytes` and wrap them as a base64 `data:` URI.
pub fn to_data_uri(bytes: &[u8]) -> std::result::Result<String, SniffError> {
    let kind = sniff(bytes)?;
    Ok(format!("data:{};base64,{}", kind.mime(), STANDARD.encode(bytes)))
}

pub fn is_data_uri(source: &str) -> bool {
    source.starts_with("data:")
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decode a `data:<mime>;base64,<payload>` URI. Non-base64 payloads are taken literally.
pub fn decode_data_uri(uri: &str) -> Result<DataUri> {
    let rest = uri.strip_prefix("data:").ok_or(IoError::MalformedDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(IoError::MalformedDataUri)?;
    let (mime, base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let bytes = if base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact)?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok(DataUri {
        mime: mime.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_signatures() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Ok(MediaKind::Jpeg));
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n"), Ok(MediaKind::Png));
        assert_eq!(sniff(b"BM\x00\x00"), Ok(MediaKind::Bitmap));
        assert_eq!(sniff(&[0xFF, 0xFB, 0x90]), Ok(MediaKind::MpegAudio));
        assert_eq!(sniff(&[0, 0, 0, 0x18, b'f']), Ok(MediaKind::MpegVideo));
    }

    #[test]
    fn unknown_format_reports_leading_bytes() {
        let err = sniff(b"GIF89a").unwrap_err();
        assert_eq!(err.leading, b"GIF8".to_vec());
        assert!(to_data_uri(b"").is_err());
    }

    #[test]
    fn data_uri_uses_sniffed_mime() {
        let uri = to_data_uri(b"BMxyz").unwrap();
        assert_eq!(uri, "data:image/bmp;base64,Qk14eXo=");
        let decoded = decode_data_uri(&uri).unwrap();
        assert_eq!(decoded.mime, "image/bmp");
        assert_eq!(decoded.bytes, b"BMxyz");
    }

    #[test]
    fn plain_and_malformed_data_uris() {
        let plain = decode_data_uri("data:text/plain,hello").unwrap();
        assert_eq!(plain.bytes, b"hello");
        assert!(matches!(decode_data_uri("data:nocomma"), Err(IoError::MalformedDataUri)));
        assert!(matches!(decode_data_uri("file.png"), Err(IoError::MalformedDataUri)));
        assert!(matches!(decode_data_uri("data:image/png;base64,@@@"), Err(IoError::Base64(_))));
    }
}
