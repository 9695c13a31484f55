//! Pod, namespace and stack recovery from a process environment block.

/// Variables that carry the namespace explicitly, in priority order.
const NAMESPACE_KEYS: [&str; 2] = ["KUBERNETES_NAMESPACE", "POD_NAMESPACE"];

/// Variables that carry a logical stack identifier, in priority order.
const STACK_KEYS: [&str; 3] = ["SERVICE_NAME", "APP_NAME", "STACK_ID"];

const SERVICE_HOST_SUFFIX: &str = "_SERVICE_HOST";
const SERVICE_MARKER: &str = "_SERVICE_";
const KUBERNETES_SERVICE_PREFIX: &str = "kubernetes";

/// Decoded `KEY=VALUE` entries of one process, in block order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Environment {
    entries: Vec<(String, String)>,
}

impl Environment {
    /// Decodes a NUL-separated environment block.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Entries without `=` are
    /// skipped; the value keeps any further `=` characters.
    pub fn parse(block: &[u8]) -> Self {
        let entries = block
            .split(|b| *b == 0)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let entry = String::from_utf8_lossy(entry);
                entry
                    .split_once('=')
                    .map(|(key, value)| (key.to_string(), value.to_string()))
            })
            .collect();
        Self { entries }
    }

    /// Value of `key`; a later duplicate overrides an earlier one.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Pod name; Kubernetes sets a pod's hostname to its name.
    pub fn pod_name(&self) -> Option<String> {
        non_empty(self.get("HOSTNAME"))
    }

    /// Namespace from explicit variables, falling back to service discovery
    /// variables injected by the kubelet.
    pub fn namespace(&self) -> Option<String> {
        NAMESPACE_KEYS
            .iter()
            .find_map(|key| non_empty(self.get(key)))
            .or_else(|| self.namespace_from_service_links())
    }

    /// Stack identifier from explicit variables, falling back to the pod name
    /// prefix before its first `-`.
    pub fn stack_id(&self, pod_name: Option<&str>) -> Option<String> {
        STACK_KEYS
            .iter()
            .find(|key| self.contains_key(key))
            .and_then(|key| non_empty(self.get(key)))
            .or_else(|| pod_name.and_then(|pod| non_empty(pod.split('-').next())))
    }

    /// Guesses the namespace from `<PREFIX>_SERVICE_*` keys.
    ///
    /// Only attempted when at least one `*_SERVICE_HOST` variable exists. The
    /// first key in block order containing `_SERVICE_` whose prefix is not
    /// `kubernetes` wins.
    fn namespace_from_service_links(&self) -> Option<String> {
        if !self.keys().any(|key| key.ends_with(SERVICE_HOST_SUFFIX)) {
            return None;
        }

        self.keys()
            .filter(|key| key.contains(SERVICE_MARKER))
            .filter_map(|key| key.split('_').next())
            .map(str::to_lowercase)
            .find(|candidate| !candidate.is_empty() && candidate != KUBERNETES_SERVICE_PREFIX)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn env(vars: &[&str]) -> Environment {
        let mut block = Vec::new();
        for var in vars {
            block.extend_from_slice(var.as_bytes());
            block.push(0);
        }
        Environment::parse(&block)
    }

    #[test]
    fn parse_skips_entries_without_separator() {
        let env = Environment::parse(b"PATH=/usr/bin\0garbage\0\0EMPTY=\0OPTS=a=b\0");
        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        assert_eq!(env.get("garbage"), None);
        assert_eq!(env.get("EMPTY"), Some(""));
        assert_eq!(env.get("OPTS"), Some("a=b"));
        assert_eq!(env.keys().count(), 3);
    }

    #[test]
    fn parse_replaces_invalid_utf8() {
        let env = Environment::parse(b"HOSTNAME=app-\xff1\0");
        assert_eq!(env.get("HOSTNAME"), Some("app-\u{fffd}1"));
    }

    #[test]
    fn later_duplicate_overrides_earlier() {
        let env = env(&["HOSTNAME=first", "HOSTNAME=second"]);
        assert_eq!(env.pod_name().as_deref(), Some("second"));
    }

    #[test]
    fn pod_name_comes_from_hostname() {
        assert_eq!(
            env(&["HOSTNAME=inference-5d9c7-x2x"]).pod_name().as_deref(),
            Some("inference-5d9c7-x2x")
        );
        assert_eq!(env(&["HOSTNAME="]).pod_name(), None);
        assert_eq!(env(&["PATH=/bin"]).pod_name(), None);
    }

    #[test]
    fn explicit_namespace_variables_take_priority() {
        let env = env(&[
            "POD_NAMESPACE=from-downward-api",
            "KUBERNETES_NAMESPACE=explicit",
            "KUBERNETES_SERVICE_HOST=10.0.0.1",
            "FOO_SERVICE_HOST=10.0.0.2",
        ]);
        assert_eq!(env.namespace().as_deref(), Some("explicit"));
    }

    #[test]
    fn pod_namespace_used_when_kubernetes_namespace_missing() {
        let env = env(&["POD_NAMESPACE=ml-team"]);
        assert_eq!(env.namespace().as_deref(), Some("ml-team"));
    }

    #[test]
    fn namespace_guessed_from_service_links() {
        let env = env(&["FOO_SERVICE_HOST=10.0.0.2", "FOO_SERVICE_PORT=80"]);
        assert_eq!(env.namespace().as_deref(), Some("foo"));
    }

    #[test]
    fn kubernetes_service_alone_yields_no_namespace() {
        let env = env(&[
            "KUBERNETES_SERVICE_HOST=10.0.0.1",
            "KUBERNETES_SERVICE_PORT=443",
        ]);
        assert_eq!(env.namespace(), None);
    }

    #[test]
    fn first_service_link_in_block_order_wins() {
        let env = env(&[
            "KUBERNETES_SERVICE_HOST=10.0.0.1",
            "REDIS_MASTER_SERVICE_HOST=10.0.0.3",
            "API_SERVICE_HOST=10.0.0.4",
        ]);
        assert_eq!(env.namespace().as_deref(), Some("redis"));
    }

    #[test]
    fn service_links_need_a_service_host_variable() {
        let env = env(&["FOO_SERVICE_PORT=80"]);
        assert_eq!(env.namespace(), None);
    }

    #[test]
    fn stack_id_prefers_explicit_variables_in_order() {
        let app = env(&["STACK_ID=stack", "APP_NAME=app", "HOSTNAME=pod-1"]);
        assert_eq!(app.stack_id(Some("pod-1")).as_deref(), Some("app"));

        let svc = env(&["STACK_ID=stack", "SERVICE_NAME=svc"]);
        assert_eq!(svc.stack_id(None).as_deref(), Some("svc"));
    }

    #[test]
    fn stack_id_falls_back_to_pod_name_prefix() {
        let env = env(&["HOSTNAME=myapp-7f8b9"]);
        let pod = env.pod_name();
        assert_eq!(env.stack_id(pod.as_deref()).as_deref(), Some("myapp"));
    }

    #[test]
    fn stack_id_absent_without_any_source() {
        assert_eq!(env(&["PATH=/bin"]).stack_id(None), None);
        assert_eq!(env(&[]).stack_id(Some("-leading-dash")), None);
    }
}
