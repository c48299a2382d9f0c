use std::{fmt, slice::Iter};

/// A metric name.
///
/// A name is an ordered sequence of string segments, such as `["http", "server", "requests"]`.
/// Two names are equal when their segment sequences are equal, which makes `MetricName` suitable
/// as a registry key.  Names order lexicographically by segment.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct MetricName {
    segments: Vec<String>,
}

impl MetricName {
    /// Creates a `MetricName` from a sequence of segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetricName { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Creates a `MetricName` from the classic group/type/name/scope quadruple.
    ///
    /// The scope, when present, is placed before the name, so that metrics sharing a scope sort
    /// together.
    pub fn from_parts<G, T, N>(group: G, kind: T, name: N, scope: Option<&str>) -> Self
    where
        G: Into<String>,
        T: Into<String>,
        N: Into<String>,
    {
        let mut segments = vec![group.into(), kind.into()];
        if let Some(scope) = scope {
            segments.push(scope.to_string());
        }
        segments.push(name.into());
        MetricName { segments }
    }

    /// Appends a segment to this name.
    pub fn append<S>(mut self, segment: S) -> Self
    where
        S: Into<String>,
    {
        self.segments.push(segment.into());
        self
    }

    /// Segments of this name.
    pub fn segments(&self) -> Iter<'_, String> {
        self.segments.iter()
    }

    /// The last segment of this name, if any.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The name formed by every segment except the last one.
    pub fn parent(&self) -> MetricName {
        let end = self.segments.len().saturating_sub(1);
        MetricName { segments: self.segments[..end].to_vec() }
    }

    /// Whether or not this name begins with every segment of `prefix`.
    pub fn starts_with(&self, prefix: &MetricName) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Joins the segments of this name with `separator`.
    pub fn join(&self, separator: &str) -> String {
        self.segments.join(separator)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("."))
    }
}

impl From<String> for MetricName {
    fn from(name: String) -> MetricName {
        MetricName { segments: vec![name] }
    }
}

impl From<&str> for MetricName {
    fn from(name: &str) -> MetricName {
        MetricName { segments: vec![name.to_string()] }
    }
}

impl<const N: usize> From<[&str; N]> for MetricName {
    fn from(segments: [&str; N]) -> MetricName {
        MetricName::new(segments)
    }
}

impl From<Vec<String>> for MetricName {
    fn from(segments: Vec<String>) -> MetricName {
        MetricName { segments }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::MetricName;

    #[test]
    fn equal_segments_are_equal_names() {
        let a = MetricName::new(["db", "pool", "connections"]);
        let b = MetricName::from(["db", "pool", "connections"]);
        let c = MetricName::new(["db", "pool", "waits"]);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut map = HashMap::new();
        map.insert(a.clone(), 1);
        assert_eq!(map.get(&b), Some(&1));
        assert_eq!(map.get(&c), None);
    }

    #[test]
    fn segment_boundaries_matter() {
        // Same joined string, different segments.
        let a = MetricName::new(["a.b", "c"]);
        let b = MetricName::new(["a", "b.c"]);
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn from_parts_places_scope_before_name() {
        let name = MetricName::from_parts("com.example", "Server", "requests", Some("v1"));
        assert_eq!(name.join("/"), "com.example/Server/v1/requests");
        assert_eq!(name.leaf(), Some("requests"));
        assert_eq!(name.parent(), MetricName::new(["com.example", "Server", "v1"]));

        let unscoped = MetricName::from_parts("com.example", "Server", "requests", None);
        assert_eq!(unscoped.to_string(), "com.example.Server.requests");
        assert_eq!(
            unscoped.segments().map(String::as_str).collect::<Vec<_>>(),
            ["com.example", "Server", "requests"]
        );
    }

    #[test]
    fn prefix_matching_and_ordering() {
        let prefix = MetricName::new(["http"]);
        let name = MetricName::from("http").append("latency");
        assert!(name.starts_with(&prefix));
        assert!(!prefix.starts_with(&name));

        let mut names = vec![
            MetricName::new(["b"]),
            MetricName::new(["a", "z"]),
            MetricName::new(["a"]),
        ];
        names.sort();
        assert_eq!(
            names,
            vec![MetricName::new(["a"]), MetricName::new(["a", "z"]), MetricName::new(["b"])]
        );
    }
}
