use crate::domain::error::ErrorResponse;
use crate::domain::MediaTypeProvider;
use image::ImageFormat;
use tracing::debug;

/// Largest accepted payload, inclusive.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// An inbound payload, fully read into memory, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Upload {
    /// Builds an upload from a multipart part. A missing media type is sniffed
    /// from the leading bytes; the bytes themselves are never touched.
    pub fn new(name: String, declared_content_type: Option<String>, data: Vec<u8>) -> Upload {
        let content_type = declared_content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| sniff_content_type(&data));
        Upload {
            name,
            content_type,
            data,
        }
    }

    pub fn validate(self) -> Result<Upload, ErrorResponse> {
        check_size(self.data.len())?;
        Ok(self)
    }
}

fn check_size(len: usize) -> Result<(), ErrorResponse> {
    match len {
        0 => Err(ErrorResponse::validation("file required")),
        n if n > MAX_UPLOAD_BYTES => Err(ErrorResponse::validation("file too large")),
        _ => Ok(()),
    }
}

fn sniff_content_type(data: &[u8]) -> String {
    match image::guess_format(data) {
        Ok(format) => {
            debug!("Sniffed {format:?} from payload without a declared media type");
            format.get_media_type()
        }
        Err(_) => FALLBACK_CONTENT_TYPE.to_string(),
    }
}

impl MediaTypeProvider for ImageFormat {
    fn get_media_type(&self) -> String {
        self.to_mime_type().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn exactly_the_limit_is_accepted() {
        let upload = Upload::new("big.bin".into(), Some("image/png".into()), vec![1; MAX_UPLOAD_BYTES]);
        assert!(upload.validate().is_ok());
    }

    #[test]
    fn one_byte_over_the_limit_is_rejected() {
        let upload = Upload::new(
            "big.bin".into(),
            Some("image/png".into()),
            vec![1; MAX_UPLOAD_BYTES + 1],
        );
        assert_eq!(
            upload.validate(),
            Err(ErrorResponse::validation("file too large"))
        );
    }

    #[test]
    fn empty_payload_is_rejected() {
        let upload = Upload::new("empty.png".into(), Some("image/png".into()), Vec::new());
        assert_eq!(
            upload.validate(),
            Err(ErrorResponse::validation("file required"))
        );
    }

    #[test]
    fn declared_content_type_wins_over_sniffing() {
        let upload = Upload::new("a.png".into(), Some("image/x-custom".into()), PNG_MAGIC.to_vec());
        assert_eq!(upload.content_type, "image/x-custom");
    }

    #[test]
    fn missing_content_type_is_sniffed() {
        let upload = Upload::new("a".into(), None, PNG_MAGIC.to_vec());
        assert_eq!(upload.content_type, "image/png");

        let jpeg = Upload::new("b".into(), Some(" ".into()), vec![0xff, 0xd8, 0xff, 0xe0, 0, 0]);
        assert_eq!(jpeg.content_type, "image/jpeg");
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        let upload = Upload::new("notes.txt".into(), None, b"hello".to_vec());
        assert_eq!(upload.content_type, FALLBACK_CONTENT_TYPE);
        assert_eq!(upload.data, b"hello");
    }
}
