//! The proxy's public domain and the URLs built under it.

use url::Url;

use crate::addressing::Label;
use crate::config::DomainConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicDomain {
    name: String,
    scheme: String,
    port: Option<u16>,
}

impl PublicDomain {
    pub fn new(name: impl Into<String>, scheme: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            name: name.into().trim_end_matches('.').to_ascii_lowercase(),
            scheme: scheme.into(),
            port,
        }
    }

    pub fn from_config(config: &DomainConfig) -> Self {
        Self::new(config.name.trim(), config.scheme.clone(), config.port)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// `<label>.<domain>[:port]`
    pub fn host_for(&self, label: &Label) -> String {
        match self.port {
            Some(port) => format!("{}.{}:{}", label, self.name, port),
            None => format!("{}.{}", label, self.name),
        }
    }

    /// `target` moved under the proxy domain: same path, query and fragment,
    /// public scheme and labelled host.
    pub fn url_for(&self, label: &Label, target: &Url) -> String {
        let mut url = format!("{}://{}{}", self.scheme, self.host_for(label), target.path());
        if let Some(query) = target.query() {
            url.push('?');
            url.push_str(query);
        }
        if let Some(fragment) = target.fragment() {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }

    /// Whether `url` already points at `<label>.<domain>`.
    pub fn is_proxied(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        host.strip_suffix(self.name.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|label| !label.is_empty() && !label.contains('.'))
    }

    /// Leading DNS label of a Host header value, port ignored.
    pub fn label_from_host(host: &str) -> Option<&str> {
        let first = host.split('.').next()?;
        let label = first.split(':').next()?.trim();
        (!label.is_empty()).then_some(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        Label::new(s)
    }

    #[test]
    fn builds_hosts() {
        let domain = PublicDomain::new("Proxy.Example.com.", "https", None);
        assert_eq!(domain.name(), "proxy.example.com");
        assert_eq!(domain.host_for(&label("abc")), "abc.proxy.example.com");

        let domain = PublicDomain::new("localhost", "http", Some(8080));
        assert_eq!(domain.host_for(&label("abc")), "abc.localhost:8080");
    }

    #[test]
    fn url_keeps_path_query_and_fragment() {
        let domain = PublicDomain::new("proxy.example.com", "https", None);
        let target = Url::parse("http://other.example:8080/v2/token?scope=pull&x=1#top").unwrap();
        assert_eq!(
            domain.url_for(&label("L"), &target),
            "https://L.proxy.example.com/v2/token?scope=pull&x=1#top"
        );

        let bare = Url::parse("https://other.example").unwrap();
        assert_eq!(domain.url_for(&label("L"), &bare), "https://L.proxy.example.com/");
    }

    #[test]
    fn recognises_urls_already_under_the_domain() {
        let domain = PublicDomain::new("proxy.example.com", "https", None);
        let proxied = |s: &str| domain.is_proxied(&Url::parse(s).unwrap());

        assert!(proxied("https://abc.proxy.example.com/one"));
        assert!(proxied("http://ABC.Proxy.Example.com:8443/"));
        assert!(!proxied("https://proxy.example.com/"));
        assert!(!proxied("https://a.b.proxy.example.com/"));
        assert!(!proxied("https://abcproxy.example.com/"));
        assert!(!proxied("https://other.example/"));
    }

    #[test]
    fn extracts_leading_label() {
        assert_eq!(PublicDomain::label_from_host("abc.proxy.example.com"), Some("abc"));
        assert_eq!(PublicDomain::label_from_host("abc.proxy.example.com:8443"), Some("abc"));
        assert_eq!(PublicDomain::label_from_host("abc:8080"), Some("abc"));
        assert_eq!(PublicDomain::label_from_host(".proxy.example.com"), None);
        assert_eq!(PublicDomain::label_from_host(""), None);
    }
}
