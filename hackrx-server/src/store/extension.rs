//! Working out which file extension a downloaded document should be stored with

use percent_encoding::percent_decode_str;
use url::Url;

/// Extension used when nothing else tells us what we downloaded.
pub const DEFAULT_EXTENSION: &str = ".pdf";

/// Known `Content-Type`s and the extension their documents get stored with.
const CONTENT_TYPE_EXTENSIONS: [(&str, &str); 22] = [
    ("application/pdf", ".pdf"),
    ("text/plain", ".txt"),
    ("text/html", ".html"),
    ("application/msword", ".doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    ("application/vnd.ms-excel", ".xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    ("application/vnd.ms-powerpoint", ".ppt"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".pptx",
    ),
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/svg+xml", ".svg"),
    ("application/json", ".json"),
    ("application/xml", ".xml"),
    ("text/xml", ".xml"),
    ("text/csv", ".csv"),
    ("application/zip", ".zip"),
    ("application/x-rar-compressed", ".rar"),
    ("application/x-7z-compressed", ".7z"),
    ("message/rfc822", ".eml"),
    ("application/vnd.ms-outlook", ".msg"),
];

/// Determine the extension of a downloaded document.
///
/// Tries, in order, the `Content-Disposition` filename, the `Content-Type`
/// and the extension of the URL path. Returns `None` if none of them help.
pub fn determine_extension(
    url: &Url,
    content_disposition: Option<&str>,
    content_type: Option<&str>,
) -> Option<String> {
    if let Some(extension) = content_disposition.and_then(from_content_disposition) {
        tracing::debug!(%extension, "Extension determined from Content-Disposition");
        return Some(extension);
    }

    if let Some(extension) = content_type.and_then(from_content_type) {
        tracing::debug!(%extension, "Extension determined from Content-Type");
        return Some(extension.to_string());
    }

    if let Some(extension) = from_url_path(url) {
        tracing::debug!(%extension, "Extension determined from URL");
        return Some(extension);
    }

    tracing::debug!("Could not determine file extension, will use default");
    None
}

/// Extension of the `filename` (or `filename*`) parameter of a `Content-Disposition` header.
pub fn from_content_disposition(header: &str) -> Option<String> {
    let lowercase = header.to_ascii_lowercase();
    let start = lowercase.find("filename")? + "filename".len();
    let rest = &header[start..];

    // Skip e.g. the `*` of `filename*=`, but never past the parameter.
    let equals = rest.find(|c: char| matches!(c, '=' | ';' | '\n'))?;
    if !rest[equals..].starts_with('=') {
        return None;
    }
    let value = &rest[equals + 1..];

    let filename = match value.chars().next() {
        Some(quote @ ('"' | '\'')) => match value[1..].find(quote) {
            Some(end) => &value[1..end + 1],
            None => until_separator(value),
        },
        _ => until_separator(value),
    };

    let filename = filename.trim().trim_matches(|c| c == '"' || c == '\'');
    split_extension(filename).map(str::to_string)
}

fn until_separator(value: &str) -> &str {
    let end = value.find([';', '\n']).unwrap_or(value.len());
    &value[..end]
}

/// Extension for a `Content-Type` header value. Parameters like `charset` are ignored.
pub fn from_content_type(header: &str) -> Option<&'static str> {
    let mime = header.split(';').next()?.trim().to_ascii_lowercase();

    CONTENT_TYPE_EXTENSIONS
        .iter()
        .find(|(content_type, _)| *content_type == mime)
        .map(|(_, extension)| *extension)
}

/// Extension of the last segment of the (percent-decoded) URL path.
pub fn from_url_path(url: &Url) -> Option<String> {
    let path = percent_decode_str(url.path()).decode_utf8_lossy();
    split_extension(&path).map(str::to_string)
}

/// Split off the extension of the last path component, including the leading dot.
///
/// Leading dots of a file name don't start an extension, so `.bashrc` has none.
/// Extensions have to be short and alphanumeric to be usable in stored file names.
pub fn split_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let dot = name.rfind('.')?;

    if name[..dot].chars().all(|c| c == '.') {
        return None;
    }

    let extension = &name[dot..];
    let is_usable = extension.len() > 1
        && extension.len() <= 16
        && extension[1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    is_usable.then_some(extension)
}
