use crate::endpoint::Endpoint;

pub const HTTP_VERSION: &str = "HTTP/1.1";

const HEADER_HOST: &str = "Host";
const HEADER_USER_AGENT: &str = "User-Agent";

/// Renders the GET request for `target`.
///
/// No `Connection` header is sent: HTTP/1.1 connections are persistent by
/// default and the pool relies on that.
#[must_use]
pub fn render_request(target: &Endpoint, user_agent: &str) -> String {
    let headers = [(HEADER_HOST, target.host()), (HEADER_USER_AGENT, user_agent)];

    let mut request = format!("GET {} {HTTP_VERSION}\r\n", target.path());
    for (name, value) in headers {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Scheme;

    #[test]
    fn test_render_request_exact_bytes() {
        let target = Endpoint::new(Scheme::Https, "example.org", 443, "/a?b=1");
        assert_eq!(
            render_request(&target, "EweFetch/1.0"),
            "GET /a?b=1 HTTP/1.1\r\nHost: example.org\r\nUser-Agent: EweFetch/1.0\r\n\r\n"
        );
    }
}
