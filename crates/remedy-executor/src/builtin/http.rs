//! Shared plumbing for the HTTP-backed executors

use crate::error::ResolutionError;
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;

pub(super) fn build_client(
    executor: &str,
    verify_tls: bool,
    timeout_secs: u64,
) -> Result<Client, ResolutionError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(!verify_tls)
        .build()
        .map_err(|e| ResolutionError::Construction {
            executor: executor.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a configured API base URL
pub(super) fn parse_base_url(executor: &str, raw: &str) -> Result<Url, ResolutionError> {
    let url = Url::parse(raw).map_err(|e| ResolutionError::invalid(executor, format!("url '{raw}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ResolutionError::invalid(executor, format!("url '{raw}' cannot be a base")));
    }
    Ok(url)
}

/// Append path segments to a base URL
///
/// Each segment is percent-encoded on its own, so `/` inside a segment
/// never introduces a new path level.
pub(super) fn endpoint<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, String> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| format!("url {base} cannot be a base"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Shape a Kubernetes object name must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NameRule {
    /// RFC 1123 label: namespaces
    Label,
    /// RFC 1123 subdomain: most object names
    Subdomain,
}

/// Reject a name that is not a valid RFC 1123 label or subdomain
pub(super) fn check_name(param: &str, value: &str, rule: NameRule) -> Result<(), String> {
    let (max_len, labels): (usize, Vec<&str>) = match rule {
        NameRule::Label => (63, vec![value]),
        NameRule::Subdomain => (253, value.split('.').collect()),
    };
    let valid = !value.is_empty()
        && value.len() <= max_len
        && labels.iter().all(|label| is_label(label));
    if valid {
        Ok(())
    } else {
        Err(format!(
            "invalid parameter: {param} '{value}' is not a valid RFC 1123 {}",
            match rule {
                NameRule::Label => "label",
                NameRule::Subdomain => "subdomain",
            }
        ))
    }
}

fn is_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    let edge = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    label.len() <= 63
        && bytes.first().is_some_and(edge)
        && bytes.last().is_some_and(edge)
        && bytes.iter().all(|b| edge(b) || *b == b'-')
}

pub(super) fn transport_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request to {url} timed out")
    } else if err.is_connect() {
        format!("could not connect to {url}: {err}")
    } else {
        format!("request to {url} failed: {err}")
    }
}

/// Read a response body, mapping read failures to a description
pub(super) async fn read_body(url: &str, response: Response) -> Result<(StatusCode, String), String> {
    let status = response.status();
    match response.text().await {
        Ok(body) => Ok((status, body)),
        Err(e) => Err(transport_error(url, &e)),
    }
}
