//! Image bytes → data URL, for multimodal generation calls.

use base64::Engine as _;

/// Sniff the mime type from magic bytes; jpeg is the safe default for
/// Telegram photos.
pub fn guess_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if data.starts_with(b"GIF") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

pub fn to_data_url(data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        guess_mime(data),
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_magic_detected() {
        assert_eq!(guess_mime(&[0x89, 0x50, 0x4E, 0x47, 0x0D]), "image/png");
        assert_eq!(guess_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
    }

    #[test]
    fn data_url_shape() {
        let url = to_data_url(&[0xFF, 0xD8]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
