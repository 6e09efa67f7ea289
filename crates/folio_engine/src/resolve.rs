use url::Url;

/// Query keys kept on image URLs, in output order. They select the encoded
/// image format on hosts that serve several variants from one path.
pub const ALLOWED_QUERY_KEYS: [&str; 2] = ["wx_fmt", "tp"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("cannot resolve {reference:?}: {message}")]
    Invalid { reference: String, message: String },
    #[error("unsupported scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },
}

/// Turns a raw `<img>` reference into a directly fetchable URL.
///
/// `//host/x` takes the scheme of `source`, relative references are joined
/// onto `source`, and the query is reduced to [`ALLOWED_QUERY_KEYS`].
pub fn resolve_image_url(raw: &str, source: &Url) -> Result<Url, ResolveError> {
    let trimmed = raw.trim();
    let invalid = |message: String| ResolveError::Invalid {
        reference: trimmed.to_string(),
        message,
    };
    if trimmed.is_empty() {
        return Err(invalid("empty reference".into()));
    }

    let resolved = if let Some(rest) = trimmed.strip_prefix("//") {
        Url::parse(&format!("{}://{rest}", source.scheme()))
    } else {
        match Url::parse(trimmed) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => source.join(trimmed),
            Err(err) => Err(err),
        }
    }
    .map_err(|err| invalid(err.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => Ok(clean_query(resolved)),
        other => Err(ResolveError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

/// Keeps only the first non-empty value of each allowed key; drops the query
/// entirely when none survive.
pub fn clean_query(mut url: Url) -> Url {
    let kept: Vec<(&str, String)> = ALLOWED_QUERY_KEYS
        .iter()
        .filter_map(|key| {
            url.query_pairs()
                .find(|(k, v)| k == *key && !v.is_empty())
                .map(|(_, v)| (*key, v.into_owned()))
        })
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}
