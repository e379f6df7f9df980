//! Process metadata concealment
//!
//! Line-oriented reads of files such as `/proc/self/maps` list every loaded
//! module. A line naming a concealed module is replaced by an empty line;
//! the decision is stateless and made per line.

use crate::concealment::policy::ConcealmentPolicy;
use std::borrow::Cow;
use tracing::trace;

/// Paths whose reads go through [`MetadataFilter`]
pub const METADATA_PATHS: &[&str] = &[
    "/proc/self/maps",
    "/proc/self/smaps",
    "/proc/self/mounts",
    "/proc/self/mountinfo",
];

#[derive(Debug, Clone)]
pub struct MetadataFilter {
    /// Lowercased, non-blank patterns
    patterns: Vec<String>,
}

impl MetadataFilter {
    pub fn new(policy: &ConcealmentPolicy) -> Self {
        Self {
            patterns: policy
                .module_patterns
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether a read of `path` should be filtered at all
    pub fn applies_to(path: &str) -> bool {
        if METADATA_PATHS.contains(&path) {
            return true;
        }
        // /proc/<pid>/maps of the own process
        path.strip_prefix("/proc/")
            .and_then(|rest| rest.split_once('/'))
            .map(|(pid, file)| {
                pid.bytes().all(|b| b.is_ascii_digit())
                    && matches!(file, "maps" | "smaps" | "mounts" | "mountinfo")
            })
            .unwrap_or(false)
    }

    pub fn is_concealed(&self, line: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let lowered = line.to_lowercase();
        self.patterns.iter().any(|p| lowered.contains(p.as_str()))
    }

    /// Filter one line of a metadata read
    pub fn filter_line<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if self.is_concealed(line) {
            trace!(target: "idveil::concealment", "Blanked metadata line");
            Cow::Borrowed("")
        } else {
            Cow::Borrowed(line)
        }
    }

    /// Filter a whole read, line by line, keeping line count and endings
    pub fn filter_content(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        for chunk in content.split_inclusive('\n') {
            let (line, ending) = match chunk.strip_suffix('\n') {
                Some(line) => (line, "\n"),
                None => (chunk, ""),
            };
            out.push_str(&self.filter_line(line));
            out.push_str(ending);
        }
        out
    }
}
