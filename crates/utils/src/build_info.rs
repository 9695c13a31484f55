/// Git metadata captured by the build script, absent when building outside a checkout.
pub(crate) struct BuildInfo {
    pub commit_sha1: Option<&'static str>,
    pub branch: Option<&'static str>,
    dirty_flag: Option<&'static str>,
}

impl BuildInfo {
    pub fn git_dirty(&self) -> bool {
        is_dirty(self.dirty_flag)
    }
}

pub(crate) const BUILD_INFO: BuildInfo = BuildInfo {
    commit_sha1: option_env!("VERGEN_GIT_SHA"),
    branch: option_env!("VERGEN_GIT_BRANCH"),
    dirty_flag: option_env!("VERGEN_GIT_DIRTY"),
};

fn is_dirty(flag: Option<&str>) -> bool {
    flag == Some("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_true_marks_the_tree_dirty() {
        assert!(is_dirty(Some("true")));
        assert!(!is_dirty(Some("false")));
        assert!(!is_dirty(None));
    }

    #[test]
    fn build_info_reflects_the_build_environment() {
        assert_eq!(
            BUILD_INFO.git_dirty(),
            option_env!("VERGEN_GIT_DIRTY") == Some("true")
        );
    }
}
