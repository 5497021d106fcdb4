use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Query parameters whose values are credentials.
const REDACTED_PARAMS: &[&str] = &["token", "code", "state"];

/// Fairing to log one line per HTTP request with timing
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let duration = request.local_cache(Instant::now).elapsed();
        let uri = request.uri();
        let target = match uri.query() {
            Some(query) => format!("{}?{}", uri.path(), redact_query(query.as_str())),
            None => uri.path().to_string(),
        };

        log::info!(
            "{} {} -> {} ({:.2}ms)",
            request.method(),
            target,
            response.status().code,
            duration.as_secs_f64() * 1000.0
        );
    }
}

fn redact_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if REDACTED_PARAMS.contains(&key) => format!("{key}=[redacted]"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_redacted() {
        assert_eq!(
            redact_query("token=abc.def&page=2"),
            "token=[redacted]&page=2"
        );
        assert_eq!(
            redact_query("state=xyz&code=4/0Ab"),
            "state=[redacted]&code=[redacted]"
        );
    }

    #[test]
    fn other_params_pass_through() {
        assert_eq!(redact_query("page=1&limit=10"), "page=1&limit=10");
        assert_eq!(redact_query("flag"), "flag");
    }
}
