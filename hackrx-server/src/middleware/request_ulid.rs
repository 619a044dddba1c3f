//! Middleware for generating [ulid::Ulid]s on requests.

use http::Request;
use tower_http::request_id::{MakeRequestId, RequestId};
use ulid::Ulid;

/// Make/generate ulid on requests.
#[derive(Copy, Clone, Debug)]
pub struct MakeRequestUlid;

/// Implement the trait for producing a request ID from the incoming request.
/// In our case, we want to generate a new UUID-like request ID.
impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _: &Request<B>) -> Option<RequestId> {
        let req_id = Ulid::new().to_string().parse().ok()?;
        Some(RequestId::new(req_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_ulids() {
        let request = Request::new(());
        let id = MakeRequestUlid.make_request_id(&request).unwrap();
        let id = id.header_value().to_str().unwrap();

        assert!(id.parse::<Ulid>().is_ok());
    }
}
