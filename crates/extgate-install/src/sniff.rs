/// ZIP local file header, `PK\x03\x04`.
pub const ZIP_LOCAL_HEADER: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

pub const ZIP_MIME: &str = "application/zip";

/// How many leading bytes [`sniff_mime`] wants to see.
pub const SNIFF_LEN: u64 = 512;

/// Guess a MIME type from leading content bytes.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    match data {
        [] => "application/x-empty",
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] | [0x50, 0x4B, 0x07, 0x08, ..] => {
            ZIP_MIME
        }
        [0x1F, 0x8B, ..] => "application/gzip",
        [0x28, 0xB5, 0x2F, 0xFD, ..] => "application/zstd",
        [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => "application/x-xz",
        [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, ..] => "application/vnd.rar",
        [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, ..] => "application/x-7z-compressed",
        [0x25, 0x50, 0x44, 0x46, 0x2D, ..] => "application/pdf",
        [0x7F, 0x45, 0x4C, 0x46, ..] => "application/x-executable",
        _ if is_tar_header(data) => "application/x-tar",
        _ if is_text(data) => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Whether `data` opens with a ZIP local file header.
pub fn has_zip_signature(data: &[u8]) -> bool {
    data.starts_with(&ZIP_LOCAL_HEADER)
}

fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 512 && data[257..263] == *b"ustar\0"
}

fn is_text(data: &[u8]) -> bool {
    !data.contains(&0) && std::str::from_utf8(data).is_ok()
}
