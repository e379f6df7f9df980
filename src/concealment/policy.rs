use serde::{Deserialize, Serialize};

/// Namespace and package tables driving concealment
///
/// # Example TOML
/// ```toml
/// [concealment]
/// allowlist_prefixes = ["java.", "android."]
/// symbol_patterns = ['de\.robv\.android\.xposed', 'LSPHooker_']
/// module_patterns = ["xposed", "lspd"]
/// hidden_packages = ["org.lsposed.manager"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcealmentPolicy {
    /// Frames whose symbol starts with one of these are never removed
    pub allowlist_prefixes: Vec<String>,

    /// Regular expressions matched against frame symbols
    pub symbol_patterns: Vec<String>,

    /// Case-insensitive substrings matched against metadata lines
    pub module_patterns: Vec<String>,

    /// Package identities hidden from package queries (case-insensitive)
    pub hidden_packages: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ConcealmentPolicy {
    fn default() -> Self {
        Self {
            allowlist_prefixes: strings(&[
                "java.",
                "javax.",
                "sun.",
                "libcore.",
                "dalvik.",
                "android.",
                "androidx.",
                "kotlin.",
                "kotlinx.",
                "com.android.internal.",
                "com.idveil.app.",
            ]),
            symbol_patterns: strings(&[
                r"de\.robv\.android\.xposed",
                r"io\.github\.libxposed",
                r"io\.github\.lsposed",
                r"org\.lsposed",
                r"LSPHooker_",
                r"EdHooker_",
                r"com\.elderdrivers\.riru",
                r"me\.weishu\.epic",
                r"com\.swift\.sandhook",
                r"top\.canyie\.pine",
                r"idveil::(interception|resolver|concealment|engine)",
            ]),
            // readLine carries no path, so these also see app data; keep
            // them to tokens that only occur in module file names
            module_patterns: strings(&[
                "xposed",
                "lspd",
                "lsposed",
                "libriru",
                "zygisk",
                "sandhook",
                "libpine",
                "frida-agent",
                "frida-gadget",
                "libsubstrate",
                "libidveil",
            ]),
            hidden_packages: strings(&[
                "de.robv.android.xposed.installer",
                "org.lsposed.manager",
                "io.github.lsposed.manager",
                "org.meowcat.edxposed.manager",
                "com.topjohnwu.magisk",
                "com.idveil.app",
            ]),
        }
    }
}

impl ConcealmentPolicy {
    /// Policy that conceals nothing
    pub fn empty() -> Self {
        Self {
            allowlist_prefixes: Vec::new(),
            symbol_patterns: Vec::new(),
            module_patterns: Vec::new(),
            hidden_packages: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(p) = self.module_patterns.iter().find(|p| p.trim().is_empty()) {
            return Err(format!("module pattern must not be blank: {:?}", p));
        }
        if let Some(p) = self.allowlist_prefixes.iter().find(|p| p.is_empty()) {
            return Err(format!("allowlist prefix must not be empty: {:?}", p));
        }
        for pattern in &self.symbol_patterns {
            regex::Regex::new(pattern)
                .map_err(|e| format!("invalid symbol pattern {:?}: {}", pattern, e))?;
        }
        Ok(())
    }
}
