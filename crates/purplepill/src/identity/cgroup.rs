//! Container id recovery from `/proc/<pid>/cgroup`.

use std::sync::LazyLock;

use regex::Regex;

/// Runtime specific cgroup patterns, highest priority first.
static RUNTIME_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        // containerd behind the CRI plugin (systemd cgroup driver)
        Regex::new(r"cri-containerd-([a-f0-9]{64})").expect("valid regex"),
        Regex::new(r"containerd://([a-f0-9]{64})").expect("valid regex"),
        Regex::new(r"docker-([a-f0-9]{64})").expect("valid regex"),
        Regex::new(r"crio-([a-f0-9]{64})").expect("valid regex"),
    ]
});

static KUBEPODS_SCOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-f0-9]{64})\.scope").expect("valid regex"));

const KUBEPODS_MARKER: &str = "kubepods";

/// Extracts the container id from cgroup membership text.
///
/// The first matching runtime pattern wins regardless of where in the text
/// it occurs. A bare `<id>.scope` is only trusted inside a `kubepods` hierarchy.
pub fn container_id(cgroup: &str) -> Option<String> {
    RUNTIME_PATTERNS
        .iter()
        .find_map(|pattern| capture_id(pattern, cgroup))
        .or_else(|| {
            cgroup
                .contains(KUBEPODS_MARKER)
                .then(|| capture_id(&KUBEPODS_SCOPE, cgroup))
                .flatten()
        })
}

fn capture_id(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
