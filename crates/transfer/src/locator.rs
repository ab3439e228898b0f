use std::path::PathBuf;

use percent_encoding::percent_decode_str;

use crate::TransferError;

const FILE_SCHEME: &str = "file://";

/// Turns a source locator into a filesystem path.
///
/// Accepts plain paths and `file://` URLs (`file:///tmp/a%20b.bin`).
/// Other URL schemes cannot be opened as a byte source and are rejected.
pub fn resolve_locator(locator: &str) -> Result<PathBuf, TransferError> {
    if locator.is_empty() {
        return Err(TransferError::InvalidLocator("empty locator".into()));
    }

    if let Some(rest) = strip_scheme(locator) {
        // file://host/path is only meaningful for the local host.
        let path = match rest.find('/') {
            Some(0) => rest,
            Some(idx) if &rest[..idx] == "localhost" => &rest[idx..],
            _ => {
                return Err(TransferError::InvalidLocator(format!(
                    "remote file URL not supported: {locator}"
                )));
            }
        };
        let decoded = percent_decode_str(path)
            .decode_utf8()
            .map_err(|_| TransferError::InvalidLocator(format!("bad escape in {locator}")))?;
        return Ok(PathBuf::from(decoded.into_owned()));
    }

    if let Some((scheme, _)) = locator.split_once("://")
        && !scheme.is_empty()
        && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
    {
        return Err(TransferError::InvalidLocator(format!(
            "unsupported scheme {scheme:?}"
        )));
    }

    Ok(PathBuf::from(locator))
}

fn strip_scheme(locator: &str) -> Option<&str> {
    let prefix = locator.get(..FILE_SCHEME.len())?;
    if prefix.eq_ignore_ascii_case(FILE_SCHEME) {
        Some(&locator[FILE_SCHEME.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_passes_through() {
        assert_eq!(
            resolve_locator("/data/video.mp4").unwrap(),
            PathBuf::from("/data/video.mp4")
        );
        assert_eq!(
            resolve_locator("relative/clip.bin").unwrap(),
            PathBuf::from("relative/clip.bin")
        );
    }

    #[test]
    fn file_url_is_decoded() {
        assert_eq!(
            resolve_locator("file:///tmp/my%20clip.mp4").unwrap(),
            PathBuf::from("/tmp/my clip.mp4")
        );
    }

    #[test]
    fn file_url_with_localhost() {
        assert_eq!(
            resolve_locator("FILE://localhost/tmp/a.bin").unwrap(),
            PathBuf::from("/tmp/a.bin")
        );
    }

    #[test]
    fn rejects_empty_and_remote() {
        assert!(resolve_locator("").is_err());
        assert!(resolve_locator("file://server/share/a.bin").is_err());
        assert!(resolve_locator("content://media/external/1").is_err());
    }
}
