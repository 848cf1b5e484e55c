//! Resource access policy
//!
//! Governs what `resources/read` may touch: allowed URI schemes, an optional
//! host allowlist for http(s), filesystem roots for `file`, deny globs, and
//! length/egress caps. Globs are compiled to anchored regexes at
//! construction, matching against a normalized forward-slash path, so policy
//! evaluation never touches the filesystem.

use regex::Regex;

use crate::errors::WardenError;

/// Defaults mirror the construction-time envelope.
pub const DEFAULT_MAX_URI_LENGTH: usize = 2_048;
pub const DEFAULT_MAX_PATH_LENGTH: usize = 1_024;
pub const DEFAULT_MAX_READ_BYTES: u64 = 10_000_000;

/// Resource access policy. Build with [`ResourcePolicyBuilder`].
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    allowed_schemes: Vec<String>,
    allowed_hosts: Option<Vec<String>>,
    root_dirs: Vec<String>,
    deny_globs: Vec<String>,
    compiled_deny: Vec<Regex>,
    pub max_path_length: usize,
    pub max_uri_length: usize,
    pub max_read_bytes: u64,
}

impl Default for ResourcePolicy {
    /// Fail-closed default: `file` reads are denied until roots are
    /// configured, http(s) is allowed to any host.
    fn default() -> Self {
        ResourcePolicyBuilder::new()
            .allow_schemes(["file", "http", "https"])
            .build()
            .expect("default policy must build")
    }
}

impl ResourcePolicy {
    pub fn builder() -> ResourcePolicyBuilder {
        ResourcePolicyBuilder::new()
    }

    pub fn scheme_allowed(&self, scheme: &str) -> bool {
        self.allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }

    /// Host allowlist check for http(s) URIs; ports are ignored when the
    /// allowlist entry carries none (so default ports compare equal).
    pub fn host_allowed(&self, host: &str, port: Option<u16>) -> bool {
        let allowed = match &self.allowed_hosts {
            None => return true,
            Some(list) => list,
        };
        allowed.iter().any(|entry| match entry.split_once(':') {
            Some((h, p)) => h.eq_ignore_ascii_case(host) && p.parse::<u16>().ok() == port,
            None => entry.eq_ignore_ascii_case(host),
        })
    }

    /// Whether a normalized forward-slash path sits under one of the
    /// configured roots. A path equal to a root passes; there is no implicit
    /// root when none are configured.
    pub fn path_within_roots(&self, normalized: &str) -> bool {
        self.root_dirs.iter().any(|root| {
            normalized == root || normalized.starts_with(&format!("{}/", root))
        })
    }

    /// Whether a normalized path matches any deny glob.
    pub fn path_denied(&self, normalized: &str) -> bool {
        self.compiled_deny.iter().any(|re| re.is_match(normalized))
    }

    pub fn root_dirs(&self) -> &[String] {
        &self.root_dirs
    }

    pub fn deny_globs(&self) -> &[String] {
        &self.deny_globs
    }
}

/// Builder validating its inputs on `build`.
#[derive(Debug, Clone, Default)]
pub struct ResourcePolicyBuilder {
    allowed_schemes: Vec<String>,
    allowed_hosts: Option<Vec<String>>,
    root_dirs: Vec<String>,
    deny_globs: Vec<String>,
    max_path_length: Option<usize>,
    max_uri_length: Option<usize>,
    max_read_bytes: Option<u64>,
}

impl ResourcePolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_schemes = schemes.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    pub fn root_dir(mut self, dir: impl Into<String>) -> Self {
        self.root_dirs.push(dir.into());
        self
    }

    pub fn deny_glob(mut self, glob: impl Into<String>) -> Self {
        self.deny_globs.push(glob.into());
        self
    }

    pub fn max_path_length(mut self, len: usize) -> Self {
        self.max_path_length = Some(len);
        self
    }

    pub fn max_uri_length(mut self, len: usize) -> Self {
        self.max_uri_length = Some(len);
        self
    }

    pub fn max_read_bytes(mut self, bytes: u64) -> Self {
        self.max_read_bytes = Some(bytes);
        self
    }

    pub fn build(self) -> Result<ResourcePolicy, WardenError> {
        if self.allowed_schemes.is_empty() {
            return Err(WardenError::InvalidResourcePolicy {
                message: "at least one allowed scheme is required".to_string(),
            });
        }
        let mut root_dirs = Vec::with_capacity(self.root_dirs.len());
        for dir in &self.root_dirs {
            let normalized = normalize_slashes(dir);
            if !is_absolute_normalized(&normalized) {
                return Err(WardenError::InvalidResourcePolicy {
                    message: format!("root dir must be absolute: {}", dir),
                });
            }
            root_dirs.push(normalized.trim_end_matches('/').to_string());
        }
        let mut compiled_deny = Vec::with_capacity(self.deny_globs.len());
        for glob in &self.deny_globs {
            let pattern = glob_to_regex(glob);
            let regex = Regex::new(&pattern).map_err(|e| WardenError::InvalidGlob {
                glob: glob.clone(),
                message: e.to_string(),
            })?;
            compiled_deny.push(regex);
        }
        Ok(ResourcePolicy {
            allowed_schemes: self.allowed_schemes,
            allowed_hosts: self.allowed_hosts,
            root_dirs,
            deny_globs: self.deny_globs,
            compiled_deny,
            max_path_length: self.max_path_length.unwrap_or(DEFAULT_MAX_PATH_LENGTH),
            max_uri_length: self.max_uri_length.unwrap_or(DEFAULT_MAX_URI_LENGTH),
            max_read_bytes: self.max_read_bytes.unwrap_or(DEFAULT_MAX_READ_BYTES),
        })
    }
}

/// Translate a glob into an anchored regex over forward-slash paths.
///
/// `**` crosses separators, `*` stays within a segment, `?` matches one
/// non-separator character; everything else is literal.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    out.push_str(".*");
                    i += 2;
                    // Collapse "**/" so that "**/x" also matches "x"
                    if chars.get(i) == Some(&'/') && out.ends_with(".*") {
                        out.push_str("/?");
                        i += 1;
                    }
                    continue;
                }
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            c => {
                if "\\.^$|()[]{}+".contains(c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Normalize a raw path: forward slashes, `.` and `..` resolved lexically,
/// relative paths joined onto `base_dir`.
pub fn normalize_path(raw: &str, base_dir: Option<&str>) -> String {
    let slashed = normalize_slashes(raw);
    let joined = if is_absolute_normalized(&slashed) {
        slashed
    } else {
        let base = base_dir
            .map(normalize_slashes)
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .map(|p| normalize_slashes(&p.to_string_lossy()))
                    .unwrap_or_else(|_| "/".to_string())
            });
        format!("{}/{}", base.trim_end_matches('/'), slashed)
    };

    // Lexical resolution; ".." at the root stays at the root
    let absolute = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if absolute {
        format!("/{}", segments.join("/"))
    } else {
        segments.join("/")
    }
}

fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

fn is_absolute_normalized(path: &str) -> bool {
    path.starts_with('/')
        || (path.len() >= 2 && path.as_bytes()[1] == b':' && path.as_bytes()[0].is_ascii_alphabetic())
}
