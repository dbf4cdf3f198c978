use bytes::Bytes;
use reqwest::header::HeaderMap;

use crate::scenario::ExpectedConditions;

/// Everything the checker looks at, captured once per exchange.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: HeaderMap,
    pub cookies: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    /// Drains the response body and pulls out its `Set-Cookie` pairs.
    ///
    /// # Errors
    ///
    /// Returns the transport error raised while reading the body.
    pub async fn capture(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let cookies = response
            .cookies()
            .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
            .collect();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            cookies,
            body,
        })
    }

    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str(), value))
        })
    }
}

/// Checks status, headers, cookies, then body, stopping at the first
/// mismatch. The error is the human readable reason. A transaction without
/// conditions passes whatever came back.
///
/// # Errors
///
/// Returns the expected-vs-actual message of the first failed condition.
pub fn check_response(
    snapshot: &ResponseSnapshot,
    expect: &ExpectedConditions,
) -> Result<(), String> {
    if expect.is_empty() {
        return Ok(());
    }

    if let Some(status) = expect.status
        && snapshot.status != status
    {
        return Err(format!(
            "Expected status code is {} but it returned as {}.",
            status, snapshot.status
        ));
    }

    for (name, expected) in &expect.headers {
        let actual = snapshot
            .headers
            .get(name.as_str())
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();
        if actual != *expected {
            return Err(format!(
                "Expected {} header value is {} but it returned as {}.",
                name, expected, actual
            ));
        }
    }

    for (name, expected) in &expect.cookies {
        match snapshot
            .cookies
            .iter()
            .find(|(cookie, _)| cookie == name)
        {
            Some((_, actual)) if actual == expected => {}
            Some((_, actual)) => {
                return Err(format!(
                    "Expected {} cookie value is {} but it returned as {}.",
                    name, expected, actual
                ));
            }
            None => return Err(format!("No cookie named {}.", name)),
        }
    }

    if let Some(needle) = expect.body_contains.as_deref()
        && !String::from_utf8_lossy(&snapshot.body).contains(needle)
    {
        return Err(format!("Response does not contain {}.", needle));
    }

    Ok(())
}
