use dashmap::DashMap;
use uuid::Uuid;

/// Opaque per-request key, carried in the request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// How the client reached the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOrigin {
    pub scheme: String,
    pub host: String,
}

impl ClientOrigin {
    /// Gateway base URL as seen by the client, always with a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}/", self.scheme, self.host)
    }
}

/// Client origins of in-flight requests, consumed once by the response side
#[derive(Debug, Default)]
pub struct RequestContextRegistry {
    entries: DashMap<RequestId, ClientOrigin>,
}

impl RequestContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, id: RequestId, origin: ClientOrigin) {
        self.entries.insert(id, origin);
    }

    /// Remove and return the entry for `id`
    pub fn take(&self, id: &RequestId) -> Option<ClientOrigin> {
        self.entries.remove(id).map(|(_, origin)| origin)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(host: &str) -> ClientOrigin {
        ClientOrigin {
            scheme: "http".to_string(),
            host: host.to_string(),
        }
    }

    #[test]
    fn test_take_is_read_once() {
        let registry = RequestContextRegistry::new();
        let id = RequestId::new();
        registry.put(id, origin("gateway.local"));

        assert_eq!(registry.take(&id), Some(origin("gateway.local")));
        assert_eq!(registry.take(&id), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_requests_from_same_peer_do_not_collide() {
        let registry = RequestContextRegistry::new();
        let first = RequestId::new();
        let second = RequestId::new();
        registry.put(first, origin("one.local"));
        registry.put(second, origin("two.local:8080"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.take(&first).unwrap().host, "one.local");
        assert_eq!(registry.take(&second).unwrap().host, "two.local:8080");
    }

    #[test]
    fn test_base_url() {
        let origin = ClientOrigin {
            scheme: "https".to_string(),
            host: "registry.example.com".to_string(),
        };
        assert_eq!(origin.base_url(), "https://registry.example.com/");
    }
}
