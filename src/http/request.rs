use std::path::Path;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Version};
use url::Url;

use crate::error::{AppError, AppResult, HttpError, ScenarioError};
use crate::report::RequestSummary;
use crate::scenario::{FetchRef, FieldValue, RunConfig, Transaction};
use crate::session::{FileCache, SessionState, resolve};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const FALLBACK_FILE_NAME: &str = "file";

/// Everything a build reads besides the transaction itself.
pub struct BuildContext<'ctx> {
    pub run: &'ctx RunConfig,
    pub session: &'ctx SessionState,
    pub files: &'ctx FileCache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        content: Bytes,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedBody {
    Empty,
    Form(Bytes),
    Multipart(Vec<MultipartField>),
}

/// A fully resolved request. Immutable once built; every replica of a wave
/// turns it into its own `reqwest::Request`.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: PreparedBody,
    /// URL path without the query string; keys the header cache and the
    /// failure report.
    pub path: String,
}

impl PreparedRequest {
    /// Materializes a sendable request on `client`.
    ///
    /// # Errors
    ///
    /// Returns an error when a multipart mime type is invalid or reqwest
    /// rejects the request.
    pub fn to_request(&self, client: &Client) -> AppResult<reqwest::Request> {
        let mut headers = self.headers.clone();
        let mut request_builder = client
            .request(self.method.clone(), self.url.clone())
            .version(self.version);

        request_builder = match &self.body {
            PreparedBody::Empty => request_builder.headers(headers),
            PreparedBody::Form(body) => request_builder.headers(headers).body(body.clone()),
            PreparedBody::Multipart(fields) => {
                // reqwest writes the boundary content type itself.
                headers.remove(CONTENT_TYPE);
                request_builder
                    .headers(headers)
                    .multipart(build_multipart(fields)?)
            }
        };

        request_builder
            .build()
            .map_err(|err| AppError::http(HttpError::BuildRequestFailed { source: err }))
    }

    #[must_use]
    pub fn summary(&self) -> RequestSummary {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = match &self.body {
            PreparedBody::Empty => String::new(),
            PreparedBody::Form(body) => String::from_utf8_lossy(body).into_owned(),
            PreparedBody::Multipart(fields) => fields
                .iter()
                .map(|field| match field {
                    MultipartField::Text { name, value } => format!("{}={}", name, value),
                    MultipartField::File {
                        name,
                        file_name,
                        content,
                        ..
                    } => format!("{}=@{} ({} bytes)", name, file_name, content.len()),
                })
                .collect::<Vec<_>>()
                .join("; "),
        };

        RequestSummary {
            method: self.method.as_str().to_owned(),
            url: self.url.to_string(),
            version: format!("{:?}", self.version),
            headers,
            body,
        }
    }
}

fn build_multipart(fields: &[MultipartField]) -> AppResult<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        match field {
            MultipartField::Text { name, value } => {
                form = form.text(name.clone(), value.clone());
            }
            MultipartField::File {
                name,
                file_name,
                mime,
                content,
            } => {
                // Streams the cached buffer; every replica shares one allocation.
                let length = u64::try_from(content.len()).unwrap_or(u64::MAX);
                let mut part = reqwest::multipart::Part::stream_with_length(
                    reqwest::Body::from(content.clone()),
                    length,
                )
                .file_name(file_name.clone());
                if let Some(mime) = mime {
                    part = part.mime_str(mime).map_err(|err| {
                        AppError::http(HttpError::InvalidMime {
                            field: name.clone(),
                            mime: mime.clone(),
                            source: err,
                        })
                    })?;
                }
                form = form.part(name.clone(), part);
            }
        }
    }
    Ok(form)
}

/// Turns a transaction into a [`PreparedRequest`] against the current
/// session state.
///
/// # Errors
///
/// Any failure is wrapped with the transaction label: an unresolvable fetch,
/// a disk fetch outside a multipart body, multipart data on a verb without a
/// body, or an invalid header name or value.
pub fn build_transaction_request(
    transaction: &Transaction,
    context: &BuildContext<'_>,
) -> AppResult<PreparedRequest> {
    build_request(transaction, context).map_err(|err| {
        AppError::http(HttpError::Transaction {
            label: transaction.label(),
            source: Box::new(err),
        })
    })
}

fn build_request(transaction: &Transaction, context: &BuildContext<'_>) -> AppResult<PreparedRequest> {
    let mut url = context.run.base_url.join(&transaction.path).map_err(|err| {
        AppError::http(HttpError::JoinUrlFailed {
            path: transaction.path.clone(),
            source: err,
        })
    })?;
    let path = url.path().to_owned();
    let multipart = transaction.is_multipart();

    if multipart && !transaction.verb.carries_body() {
        return Err(AppError::scenario(ScenarioError::MultipartWithoutBody {
            verb: transaction.verb.as_str(),
            path: transaction.path.clone(),
        }));
    }

    let mut headers = HeaderMap::new();
    let body = if multipart {
        PreparedBody::Multipart(multipart_fields(transaction, &path, context)?)
    } else {
        let mut pairs = Vec::with_capacity(transaction.body.len());
        for (name, value) in &transaction.body {
            let value = resolve_text(transaction, "body", name, value, &path, context)?;
            pairs.push((name.as_str(), value));
        }

        if transaction.verb.carries_body() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&pairs)
                .finish();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
            PreparedBody::Form(Bytes::from(encoded))
        } else {
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(&pairs);
            }
            PreparedBody::Empty
        }
    };

    if !transaction.options.clear_headers {
        for (name, value) in &context.run.initial_headers {
            headers.append(header_name(name)?, header_value(name, value)?);
        }
    }
    for (name, value) in &transaction.headers {
        let value = resolve_text(transaction, "header", name, value, &path, context)?;
        headers.insert(header_name(name)?, header_value(name, &value)?);
    }

    let cookies = collect_cookies(transaction, &path, context)?;
    if !cookies.is_empty() {
        let joined = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert(COOKIE, header_value("Cookie", &joined)?);
    }

    Ok(PreparedRequest {
        method: transaction.verb.method(),
        url,
        version: context.run.protocol.version(),
        headers,
        body,
        path,
    })
}

fn multipart_fields(
    transaction: &Transaction,
    path: &str,
    context: &BuildContext<'_>,
) -> AppResult<Vec<MultipartField>> {
    let mut fields = Vec::with_capacity(transaction.body.len());
    for (name, value) in &transaction.body {
        let field = match value {
            FieldValue::Fetch(FetchRef::FromDisk { path: file, mime }) => MultipartField::File {
                name: name.clone(),
                file_name: base_name(file),
                mime: mime.clone(),
                content: context.files.load(file).map_err(AppError::fetch)?,
            },
            FieldValue::Literal(_) | FieldValue::Fetch(_) => MultipartField::Text {
                name: name.clone(),
                value: resolve_text(transaction, "body", name, value, path, context)?,
            },
        };
        fields.push(field);
    }
    Ok(fields)
}

/// Ordered cookie list: initial cookies, then the session jar, then the
/// transaction's own. A later source replaces an earlier cookie of the same
/// name in place.
fn collect_cookies(
    transaction: &Transaction,
    path: &str,
    context: &BuildContext<'_>,
) -> AppResult<Vec<(String, String)>> {
    let mut cookies: Vec<(String, String)> = Vec::new();
    if !transaction.options.clear_cookies {
        for (name, value) in &context.run.initial_cookies {
            upsert_cookie(&mut cookies, name.clone(), value.clone());
        }
        for (name, value) in context.session.cookies() {
            upsert_cookie(&mut cookies, name, value);
        }
    }
    for (name, value) in &transaction.cookies {
        let value = resolve_text(transaction, "cookie", name, value, path, context)?;
        upsert_cookie(&mut cookies, name.clone(), value);
    }
    Ok(cookies)
}

fn upsert_cookie(cookies: &mut Vec<(String, String)>, name: String, value: String) {
    match cookies.iter_mut().find(|(existing, _)| *existing == name) {
        Some(entry) => entry.1 = value,
        None => cookies.push((name, value)),
    }
}

/// Resolves a literal or a cookie/header fetch to text. Disk fetches are
/// only meaningful as multipart file parts.
fn resolve_text(
    transaction: &Transaction,
    context_name: &'static str,
    field: &str,
    value: &FieldValue,
    path: &str,
    context: &BuildContext<'_>,
) -> AppResult<String> {
    match value {
        FieldValue::Literal(text) => Ok(text.clone()),
        FieldValue::Fetch(FetchRef::FromDisk { .. }) => {
            Err(AppError::scenario(ScenarioError::DiskFetchNotAllowed {
                context: context_name,
                field: field.to_owned(),
                verb: transaction.verb.as_str(),
                path: transaction.path.clone(),
            }))
        }
        FieldValue::Fetch(fetch) => {
            let bytes = resolve(fetch, path, context.session, context.files)
                .map_err(AppError::fetch)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .and_then(|value| value.to_str())
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_owned()
}

fn header_name(name: &str) -> AppResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
        AppError::http(HttpError::InvalidHeaderName {
            name: name.to_owned(),
            source: err,
        })
    })
}

fn header_value(name: &str, value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| {
        AppError::http(HttpError::InvalidHeaderValue {
            name: name.to_owned(),
            source: err,
        })
    })
}
