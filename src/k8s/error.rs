use kube::config::KubeconfigError;
use kube::core::gvk::ParseGroupVersionError;
use kube::core::ErrorResponse;
use std::fmt::{Display, Formatter};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const REASON_EXPIRED: &str = "Expired";
const REASON_BAD_REQUEST: &str = "BadRequest";
const REASON_NOT_FOUND: &str = "NotFound";

#[derive(thiserror::Error, Debug)]
pub enum K8sError {
    #[error("{0}")]
    Api(ApiStatus),

    #[error("{message}")]
    Server { kind: ErrorKind, message: String },

    #[error("{0}")]
    SelectorMismatch(String),

    #[error("the kube client returned an error: `{0}`")]
    Transport(#[source] kube::Error),

    #[error("it is not possible to read kubeconfig: `{0}`")]
    UnableToSetupClientKubeconfig(#[from] KubeconfigError),

    #[error("it is not possible to build the request: {0}")]
    BuildRequest(String),

    #[error("error parsing GroupVersion: `{0}`")]
    ParseGroupVersion(#[from] ParseGroupVersionError),

    #[error("invalid list metadata: {0}")]
    InvalidMetadata(String),

    #[error("error decoding collection: `{0}`")]
    Decode(#[from] serde_json::Error),

    #[error("visitor aborted the traversal: {0}")]
    Visitor(#[source] BoxError),
}

/// Condition reported by the API server for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested resource version or continue token is no longer served.
    Expired,
    BadRequest,
    NotFound,
    Other,
}

/// What a list caller should do with a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListErrorDisposition {
    /// Terminal. The traversal must be restarted from an empty continue token.
    Expired,
    /// The message is enriched with the resource and selector and the error is returned.
    SelectorMismatch,
    /// Returned untouched.
    Other,
}

/// Structured `Status` payload returned by the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiStatus {
    pub status: String,
    pub message: String,
    pub reason: String,
    pub code: u16,
}

impl ApiStatus {
    pub fn kind(&self) -> ErrorKind {
        match self.reason.as_str() {
            REASON_EXPIRED => ErrorKind::Expired,
            REASON_BAD_REQUEST => ErrorKind::BadRequest,
            REASON_NOT_FOUND => ErrorKind::NotFound,
            _ => match self.code {
                400 => ErrorKind::BadRequest,
                404 => ErrorKind::NotFound,
                _ => ErrorKind::Other,
            },
        }
    }
}

impl Display for ApiStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ErrorResponse> for ApiStatus {
    fn from(value: ErrorResponse) -> Self {
        Self {
            status: value.status,
            message: value.message,
            reason: value.reason,
            code: value.code,
        }
    }
}

impl From<kube::Error> for K8sError {
    fn from(value: kube::Error) -> Self {
        match value {
            kube::Error::Api(response) => K8sError::Api(response.into()),
            other => K8sError::Transport(other),
        }
    }
}

impl K8sError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            K8sError::Api(status) => status.kind(),
            K8sError::Server { kind, .. } => *kind,
            _ => ErrorKind::Other,
        }
    }

    /// Structured status payload, when the server returned one.
    pub fn status(&self) -> Option<&ApiStatus> {
        match self {
            K8sError::Api(status) => Some(status),
            _ => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.kind() == ErrorKind::Expired
    }

    /// Wraps any caller error so it can abort a traversal.
    pub fn visitor<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        K8sError::Visitor(err.into())
    }

    /// Rewrites a selector/not-found failure so it names the listed resource and selector.
    ///
    /// A structured status keeps its code and reason, only the message changes. Any other error is
    /// flattened into [K8sError::SelectorMismatch] carrying the same text.
    pub fn describe_list_failure(self, resource: &str, label_selector: &str) -> Self {
        match self {
            K8sError::Api(mut status) => {
                status.message = list_failure_message(resource, label_selector, &status.message);
                K8sError::Api(status)
            }
            other => K8sError::SelectorMismatch(list_failure_message(
                resource,
                label_selector,
                &other.to_string(),
            )),
        }
    }
}

/// Decides how a failed list request is surfaced. Nothing is retried.
pub fn classify(err: &K8sError) -> ListErrorDisposition {
    match err.kind() {
        ErrorKind::Expired => ListErrorDisposition::Expired,
        ErrorKind::BadRequest | ErrorKind::NotFound => ListErrorDisposition::SelectorMismatch,
        ErrorKind::Other => ListErrorDisposition::Other,
    }
}

fn list_failure_message(resource: &str, label_selector: &str, original: &str) -> String {
    if label_selector.is_empty() {
        format!("unable to list {resource:?}: {original}")
    } else {
        format!("unable to find {resource:?} that match the selector {label_selector:?}: {original}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    pub(crate) fn api_error(reason: &str, code: u16, message: &str) -> K8sError {
        K8sError::Api(ApiStatus {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    #[rstest]
    #[case::expired(api_error("Expired", 410, "too old"), ListErrorDisposition::Expired)]
    #[case::gone_is_not_expired(api_error("Gone", 410, "gone"), ListErrorDisposition::Other)]
    #[case::bad_request(api_error("BadRequest", 400, "bad"), ListErrorDisposition::SelectorMismatch)]
    #[case::not_found(api_error("NotFound", 404, "nope"), ListErrorDisposition::SelectorMismatch)]
    #[case::unknown_reason_404(api_error("", 404, "nope"), ListErrorDisposition::SelectorMismatch)]
    #[case::unknown_reason_400(api_error("Whatever", 400, "x"), ListErrorDisposition::SelectorMismatch)]
    #[case::forbidden(api_error("Forbidden", 403, "no"), ListErrorDisposition::Other)]
    #[case::server_not_found(
        K8sError::Server { kind: ErrorKind::NotFound, message: "missing".to_string() },
        ListErrorDisposition::SelectorMismatch
    )]
    #[case::server_expired(
        K8sError::Server { kind: ErrorKind::Expired, message: "old".to_string() },
        ListErrorDisposition::Expired
    )]
    #[case::visitor(K8sError::visitor("stop"), ListErrorDisposition::Other)]
    #[case::metadata(K8sError::InvalidMetadata("x".to_string()), ListErrorDisposition::Other)]
    fn test_classify(#[case] err: K8sError, #[case] expected: ListErrorDisposition) {
        assert_eq!(classify(&err), expected);
    }

    #[test]
    fn test_kube_api_error_is_structured() {
        let err: K8sError = kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "the resourceVersion is too old".to_string(),
            reason: "Expired".to_string(),
            code: 410,
        })
        .into();

        assert!(err.is_expired());
        assert_eq!(err.status().map(|s| s.code), Some(410));
        assert_eq!(err.to_string(), "the resourceVersion is too old");
    }

    #[test]
    fn test_describe_structured_failure_with_selector() {
        let err = api_error("NotFound", 404, "the server could not find the requested resource")
            .describe_list_failure("pods", "app=foo");

        let status = err.status().expect("status must be preserved");
        assert_eq!(status.code, 404);
        assert_eq!(status.reason, "NotFound");
        assert_eq!(
            status.message,
            r#"unable to find "pods" that match the selector "app=foo": the server could not find the requested resource"#
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_describe_structured_failure_without_selector() {
        let err = api_error("BadRequest", 400, "invalid").describe_list_failure("pods", "");

        assert_matches!(err, K8sError::Api(status) => {
            assert_eq!(status.message, r#"unable to list "pods": invalid"#);
            assert_eq!(status.code, 400);
        });
    }

    #[test]
    fn test_describe_unstructured_failure() {
        let err = K8sError::Server {
            kind: ErrorKind::NotFound,
            message: "no such kind".to_string(),
        }
        .describe_list_failure("widgets", "tier=web");

        assert_matches!(err, K8sError::SelectorMismatch(msg) => {
            assert_eq!(
                msg,
                r#"unable to find "widgets" that match the selector "tier=web": no such kind"#
            );
        });
    }

    #[test]
    fn test_quoted_resource_is_escaped() {
        let err = K8sError::Server {
            kind: ErrorKind::BadRequest,
            message: "bad".to_string(),
        }
        .describe_list_failure("we\"ird", "");

        assert_eq!(err.to_string(), r#"unable to list "we\"ird": bad"#);
    }
}
