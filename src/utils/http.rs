use url::Url;

/// Appends path segments to a base URL. Segments are percent-encoded, so owner and repository
/// names can be passed as they are.
pub fn endpoint<I>(base: &Url, segments: I) -> anyhow::Result<Url>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("{base} cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Reads the body of an unsuccessful response for error reporting.
pub async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|error| format!("<cannot read body: {error}>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_with_trailing_slash() {
        let base = Url::parse("https://git.example.com/").unwrap();
        let url = endpoint(&base, ["api", "v1", "repos", "acme", "widgets"]).unwrap();
        assert_eq!(url.as_str(), "https://git.example.com/api/v1/repos/acme/widgets");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("https://example.com/gitea").unwrap();
        let url = endpoint(&base, ["pulls", "1.diff"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/gitea/pulls/1.diff");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let base = Url::parse("https://example.com").unwrap();
        let url = endpoint(&base, ["a b"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/a%20b");
    }
}
