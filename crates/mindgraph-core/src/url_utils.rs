use url::Url;

/// Derive the content id from an article URL: its final path segment without
/// the extension.
///
/// Falls back to splitting the raw string if the input cannot be parsed.
pub fn content_id_from_url(input: &str) -> Option<String> {
    let last_segment = match Url::parse(input) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string),
        Err(_) => input
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|s| !s.is_empty()))
            .map(str::to_string),
    }?;

    let stem = match last_segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last_segment.as_str(),
    };

    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
